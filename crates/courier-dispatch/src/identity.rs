//! Stream identity derivation.

use courier_core::command::{Command, identity_value};

use crate::error::DispatchError;

/// Where a command's aggregate identity comes from: a field of the command,
/// optionally behind a fixed per-aggregate prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRoute {
    field: String,
    prefix: Option<String>,
}

impl IdentityRoute {
    /// Identity read from `field` with no prefix.
    #[must_use]
    pub fn field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            prefix: None,
        }
    }

    /// Prepend `prefix` to every derived identity.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// The command field the identity is read from.
    #[must_use]
    pub fn identity_field(&self) -> &str {
        &self.field
    }

    /// The configured prefix, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Derives the stream identity for `command`.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::InvalidIdentity` if the field is missing,
    /// blank, or not a string or number.
    pub fn derive<C: Command>(&self, command: &C) -> Result<String, DispatchError> {
        let value =
            identity_value(command, &self.field).ok_or_else(|| DispatchError::InvalidIdentity {
                command_type: C::COMMAND_TYPE,
                field: self.field.clone(),
            })?;

        Ok(match &self.prefix {
            Some(prefix) => format!("{prefix}{value}"),
            None => value,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Debug, Serialize)]
    struct Register {
        uuid: String,
    }

    impl Command for Register {
        const COMMAND_TYPE: &'static str = "example.register";
    }

    #[test]
    fn test_prefix_is_prepended_to_field_value() {
        let route = IdentityRoute::field("uuid").with_prefix("example-prefix-");
        assert_eq!(route.prefix(), Some("example-prefix-"));

        let identity = route
            .derive(&Register {
                uuid: "abc".to_owned(),
            })
            .unwrap();

        assert_eq!(identity, "example-prefix-abc");
    }

    #[test]
    fn test_unprefixed_identity_is_the_field_value() {
        let route = IdentityRoute::field("uuid");
        assert_eq!(route.identity_field(), "uuid");
        assert_eq!(route.prefix(), None);

        let identity = route
            .derive(&Register {
                uuid: "abc".to_owned(),
            })
            .unwrap();

        assert_eq!(identity, "abc");
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let route = IdentityRoute::field("uuid").with_prefix("p-");
        let command = Register {
            uuid: "abc".to_owned(),
        };

        assert_eq!(
            route.derive(&command).unwrap(),
            route.derive(&command).unwrap()
        );
    }

    #[test]
    fn test_empty_value_is_invalid_identity() {
        let route = IdentityRoute::field("uuid").with_prefix("p-");

        let result = route.derive(&Register {
            uuid: String::new(),
        });

        match result {
            Err(DispatchError::InvalidIdentity {
                command_type,
                field,
            }) => {
                assert_eq!(command_type, "example.register");
                assert_eq!(field, "uuid");
            }
            other => panic!("expected InvalidIdentity, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_field_is_invalid_identity() {
        let route = IdentityRoute::field("account_id");

        let result = route.derive(&Register {
            uuid: "abc".to_owned(),
        });

        assert!(matches!(result, Err(DispatchError::InvalidIdentity { .. })));
    }
}
