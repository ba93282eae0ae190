//! Command abstractions.
//!
//! A command is an immutable request addressed to exactly one aggregate
//! instance. Routing is keyed by [`Command::COMMAND_TYPE`]; the owning
//! aggregate's stream identity is read out of the command's serialized form
//! by field name, which keeps identity derivation a pure function of the
//! command value.

use serde::Serialize;
use serde_json::Value;

/// Trait that all commands implement.
pub trait Command: Serialize + Send + Sync + std::fmt::Debug + 'static {
    /// Unique type name for this command, used as the routing key.
    const COMMAND_TYPE: &'static str;

    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str {
        Self::COMMAND_TYPE
    }
}

/// Reads `field` from a command and renders it as an identity fragment.
///
/// Strings are used as-is and numbers are rendered in their canonical JSON
/// form. Returns `None` when the command cannot be serialized, the field is
/// absent, or the value is blank, null, boolean, or structured.
pub fn identity_value<C: Command>(command: &C, field: &str) -> Option<String> {
    let Ok(Value::Object(fields)) = serde_json::to_value(command) else {
        return None;
    };

    match fields.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Debug, Serialize)]
    struct OpenAccount {
        account_id: String,
        owner: Option<String>,
        branch: u32,
        flags: Vec<String>,
    }

    impl Command for OpenAccount {
        const COMMAND_TYPE: &'static str = "ledger.open_account";
    }

    fn open_account(account_id: &str) -> OpenAccount {
        OpenAccount {
            account_id: account_id.to_owned(),
            owner: None,
            branch: 42,
            flags: vec!["vip".to_owned()],
        }
    }

    #[test]
    fn test_identity_value_reads_string_field() {
        let command = open_account("acc-1");

        assert_eq!(
            identity_value(&command, "account_id").as_deref(),
            Some("acc-1")
        );
        assert_eq!(command.command_type(), "ledger.open_account");
    }

    #[test]
    fn test_identity_value_renders_numbers() {
        let command = open_account("acc-1");

        assert_eq!(identity_value(&command, "branch").as_deref(), Some("42"));
    }

    #[test]
    fn test_identity_value_rejects_blank_missing_and_structured_values() {
        let command = open_account("   ");

        assert_eq!(identity_value(&command, "account_id"), None);
        assert_eq!(identity_value(&command, "owner"), None);
        assert_eq!(identity_value(&command, "flags"), None);
        assert_eq!(identity_value(&command, "missing"), None);
    }
}
