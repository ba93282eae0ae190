//! Read-side handlers for the ledger demo.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use courier_core::repository::StoredEvent;
use courier_dispatch::{EventHandler, HandlerContext, HandlerError};
use tracing::info;

use crate::ledger::AccountEvent;

/// Balance per account stream, kept current by a strong handler.
#[derive(Debug, Clone, Default)]
pub struct BalanceProjection {
    balances: Arc<Mutex<HashMap<String, u64>>>,
}

impl BalanceProjection {
    /// Projected balance of `stream_id`, if the account has been seen.
    #[must_use]
    pub fn balance(&self, stream_id: &str) -> Option<u64> {
        self.balances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(stream_id)
            .copied()
    }
}

#[async_trait]
impl EventHandler for BalanceProjection {
    async fn handle(&self, event: &StoredEvent, _ctx: &HandlerContext) -> Result<(), HandlerError> {
        let mut balances = self
            .balances
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let balance = balances.entry(event.stream_id.clone()).or_default();
        match event.decode::<AccountEvent>()? {
            AccountEvent::AccountOpened { .. } => {}
            AccountEvent::FundsDeposited { amount } => *balance = balance.saturating_add(amount),
            AccountEvent::FundsWithdrawn { amount } => {
                *balance = balance.checked_sub(amount).ok_or_else(|| {
                    HandlerError::Failed(format!(
                        "projected balance of {} would go negative",
                        event.stream_id
                    ))
                })?;
            }
        }
        Ok(())
    }
}

/// Logs every ledger event; registered as eventual.
#[derive(Debug, Default)]
pub struct AuditLog;

#[async_trait]
impl EventHandler for AuditLog {
    async fn handle(&self, event: &StoredEvent, ctx: &HandlerContext) -> Result<(), HandlerError> {
        info!(
            handler = ctx.handler_name(),
            correlation_id = %event.correlation_id,
            event_type = %event.event_type,
            "audit"
        );
        Ok(())
    }
}
