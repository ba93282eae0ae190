//! Ledger domain: a bank account aggregate and its commands.

use courier_core::aggregate::{Aggregate, Decision, Handle};
use courier_core::command::Command;
use courier_core::event::DomainEvent;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ACCOUNT_OPENED: &str = "ledger.account_opened";
pub const FUNDS_DEPOSITED: &str = "ledger.funds_deposited";
pub const FUNDS_WITHDRAWN: &str = "ledger.funds_withdrawn";

/// Stream prefix for account streams.
pub const ACCOUNT_PREFIX: &str = "account-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccountEvent {
    AccountOpened { account_id: String, owner: String },
    FundsDeposited { amount: u64 },
    FundsWithdrawn { amount: u64 },
}

impl DomainEvent for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::AccountOpened { .. } => ACCOUNT_OPENED,
            Self::FundsDeposited { .. } => FUNDS_DEPOSITED,
            Self::FundsWithdrawn { .. } => FUNDS_WITHDRAWN,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("account is already open")]
    AlreadyOpen,

    #[error("account is not open")]
    NotOpen,

    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },

    #[error("deposit of {amount} would overflow balance {balance}")]
    BalanceOverflow { balance: u64, amount: u64 },
}

#[derive(Debug, Default)]
pub struct Account {
    open: bool,
    balance: u64,
}

impl Account {
    #[must_use]
    pub fn balance(&self) -> u64 {
        self.balance
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl Aggregate for Account {
    const AGGREGATE_TYPE: &'static str = "account";
    type Event = AccountEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AccountEvent::AccountOpened { .. } => self.open = true,
            AccountEvent::FundsDeposited { amount } => {
                self.balance = self.balance.saturating_add(*amount);
            }
            AccountEvent::FundsWithdrawn { amount } => {
                self.balance = self.balance.saturating_sub(*amount);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenAccount {
    pub account_id: String,
    pub owner: String,
}

impl Command for OpenAccount {
    const COMMAND_TYPE: &'static str = "ledger.open_account";
}

impl Handle<OpenAccount> for Account {
    fn execute(&self, command: &OpenAccount) -> Result<Decision<AccountEvent>, LedgerError> {
        if self.open {
            return Err(LedgerError::AlreadyOpen);
        }
        Ok(AccountEvent::AccountOpened {
            account_id: command.account_id.clone(),
            owner: command.owner.clone(),
        }
        .into())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Deposit {
    pub account_id: String,
    pub amount: u64,
}

impl Command for Deposit {
    const COMMAND_TYPE: &'static str = "ledger.deposit";
}

impl Handle<Deposit> for Account {
    fn execute(&self, command: &Deposit) -> Result<Decision<AccountEvent>, LedgerError> {
        if !self.open {
            return Err(LedgerError::NotOpen);
        }
        if self.balance.checked_add(command.amount).is_none() {
            return Err(LedgerError::BalanceOverflow {
                balance: self.balance,
                amount: command.amount,
            });
        }
        // A zero deposit changes nothing.
        Ok((command.amount > 0)
            .then_some(AccountEvent::FundsDeposited {
                amount: command.amount,
            })
            .into())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Withdraw {
    pub account_id: String,
    pub amount: u64,
}

impl Command for Withdraw {
    const COMMAND_TYPE: &'static str = "ledger.withdraw";
}

impl Handle<Withdraw> for Account {
    fn execute(&self, command: &Withdraw) -> Result<Decision<AccountEvent>, LedgerError> {
        if !self.open {
            return Err(LedgerError::NotOpen);
        }
        if command.amount > self.balance {
            return Err(LedgerError::InsufficientFunds {
                balance: self.balance,
                requested: command.amount,
            });
        }
        Ok(AccountEvent::FundsWithdrawn {
            amount: command.amount,
        }
        .into())
    }
}
