//! Courier ledger demo entry point.

use std::error::Error;
use std::sync::Arc;

use courier_dispatch::{
    DispatchOptions, DispatcherConfig, HandlerRegistration, IdentityRoute, Router,
};
use courier_event_store::InMemoryEventRepository;
use tracing_subscriber::EnvFilter;

mod ledger;
mod projections;

use ledger::{
    ACCOUNT_OPENED, ACCOUNT_PREFIX, Account, Deposit, FUNDS_DEPOSITED, FUNDS_WITHDRAWN,
    LedgerError, OpenAccount, Withdraw,
};
use projections::{AuditLog, BalanceProjection};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Courier ledger demo");

    // Read configuration from environment.
    let config = DispatcherConfig::from_env()?;

    let balances = BalanceProjection::default();
    let router = Router::builder(Arc::new(InMemoryEventRepository::new()))
        .with_config(config)
        .route::<OpenAccount, Account>(
            IdentityRoute::field("account_id").with_prefix(ACCOUNT_PREFIX),
        )
        .route::<Deposit, Account>(
            IdentityRoute::field("account_id").with_prefix(ACCOUNT_PREFIX),
        )
        .route::<Withdraw, Account>(
            IdentityRoute::field("account_id").with_prefix(ACCOUNT_PREFIX),
        )
        .handler(
            HandlerRegistration::strong("balance_projection").handles([
                ACCOUNT_OPENED,
                FUNDS_DEPOSITED,
                FUNDS_WITHDRAWN,
            ]),
            balances.clone(),
        )
        .handler(
            HandlerRegistration::eventual("audit_log").handles([
                ACCOUNT_OPENED,
                FUNDS_DEPOSITED,
                FUNDS_WITHDRAWN,
            ]),
            AuditLog,
        )
        .build()?;

    let account_id = uuid::Uuid::new_v4().to_string();
    let stream_id = format!("{ACCOUNT_PREFIX}{account_id}");

    router
        .dispatch(
            OpenAccount {
                account_id: account_id.clone(),
                owner: "Ada".to_owned(),
            },
            DispatchOptions::strong(),
        )
        .await?;

    // Strong: the projection has caught up when this returns.
    let outcome = router
        .dispatch(
            Deposit {
                account_id: account_id.clone(),
                amount: 100,
            },
            DispatchOptions::strong().include_execution_result(),
        )
        .await?;
    if let Some(result) = outcome.execution_result() {
        tracing::info!(
            aggregate_uuid = %result.aggregate_uuid,
            aggregate_version = result.aggregate_version,
            projected_balance = ?balances.balance(&stream_id),
            "deposit applied"
        );
    }

    // Eventual: returns as soon as the event is stored.
    router
        .dispatch(
            Withdraw {
                account_id: account_id.clone(),
                amount: 40,
            },
            DispatchOptions::default(),
        )
        .await?;

    match router
        .dispatch(
            Withdraw {
                account_id: account_id.clone(),
                amount: 1_000,
            },
            DispatchOptions::strong(),
        )
        .await
    {
        Err(err) => match err.execution_error::<LedgerError>() {
            Some(rejection) => tracing::info!(%rejection, "withdrawal rejected"),
            None => return Err(err.into()),
        },
        Ok(_) => tracing::warn!("oversized withdrawal was accepted"),
    }

    let (account, version) = router.aggregate_state::<Account>(&stream_id).await?;
    tracing::info!(
        stream_id = %stream_id,
        version,
        balance = account.balance(),
        open = account.is_open(),
        "final account state"
    );

    Ok(())
}
