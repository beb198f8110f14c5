//! Group account entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use famledger_core::{AccountId, DomainError, DomainResult, Entity, Money, UserId};

/// Account lifecycle.
///
/// Active → Suspended | Closed; both are terminal for balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Active,
    Suspended,
    Closed,
}

/// A shared pooled account.
///
/// The balance is mutated only through the ledger engine, which appends a
/// transaction row for every committed delta; `balance` and the sum of
/// completed rows are two representations of the same invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub account_number: String,
    pub name: String,
    pub purpose: Option<String>,
    pub status: AccountStatus,
    pub balance: Money,
    pub created_by: UserId,
    /// Optional 4-digit code required before withdrawals.
    pub access_code: Option<String>,
    /// Day-of-month (1..=28) for the configured auto-transfer, if any.
    pub auto_transfer_day: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl Account {
    /// Open a new account with a zero balance.
    pub fn open(
        account_number: String,
        name: impl Into<String>,
        purpose: Option<String>,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("account name must not be empty"));
        }

        Ok(Self {
            id: AccountId::new(),
            account_number,
            name,
            purpose,
            status: AccountStatus::Active,
            balance: Money::ZERO,
            created_by,
            access_code: None,
            auto_transfer_day: None,
            created_at: now,
            version: 0,
        })
    }

    /// Invariant helper: whether this account accepts balance mutation.
    pub fn ensure_active(&self) -> DomainResult<()> {
        if self.status != AccountStatus::Active {
            return Err(DomainError::invalid_state(format!(
                "account {} is {:?}",
                self.account_number, self.status
            )));
        }
        Ok(())
    }

    /// Set or clear the withdrawal access code. Must be exactly 4 ASCII digits.
    pub fn set_access_code(&mut self, code: Option<String>) -> DomainResult<()> {
        if let Some(ref c) = code {
            if c.len() != 4 || !c.bytes().all(|b| b.is_ascii_digit()) {
                return Err(DomainError::validation(
                    "access code must be exactly 4 digits",
                ));
            }
        }
        self.access_code = code;
        Ok(())
    }

    /// Verify the provided code against the configured one.
    ///
    /// Accounts without a code skip the check entirely.
    pub fn verify_access_code(&self, provided: Option<&str>) -> DomainResult<()> {
        let Some(ref expected) = self.access_code else {
            return Ok(());
        };
        match provided {
            Some(code) if code == expected => Ok(()),
            _ => Err(DomainError::permission_denied("invalid access code")),
        }
    }

    pub fn set_auto_transfer_day(&mut self, day: Option<u8>) -> DomainResult<()> {
        if let Some(d) = day {
            if !(1..=28).contains(&d) {
                return Err(DomainError::validation(
                    "auto-transfer day must be between 1 and 28",
                ));
            }
        }
        self.auto_transfer_day = day;
        Ok(())
    }

    /// Increase the balance, returning the new value.
    pub fn credit(&mut self, amount: Money) -> DomainResult<Money> {
        if !amount.is_positive() {
            return Err(DomainError::validation("amount must be positive"));
        }
        self.balance = self.balance.checked_add(amount)?;
        Ok(self.balance)
    }

    /// Decrease the balance, returning the new value.
    ///
    /// Overdrafts are rejected; the account is left untouched.
    pub fn debit(&mut self, amount: Money) -> DomainResult<Money> {
        if !amount.is_positive() {
            return Err(DomainError::validation("amount must be positive"));
        }
        if amount > self.balance {
            return Err(DomainError::insufficient_funds(format!(
                "available {}, requested {}",
                self.balance, amount
            )));
        }
        self.balance = self.balance.checked_sub(amount)?;
        Ok(self.balance)
    }

    pub fn suspend(&mut self) -> DomainResult<()> {
        self.ensure_active()?;
        self.status = AccountStatus::Suspended;
        Ok(())
    }

    /// Close the account. Only reachable from Active; Closed is terminal.
    pub fn close(&mut self) -> DomainResult<()> {
        self.ensure_active()?;
        self.status = AccountStatus::Closed;
        Ok(())
    }
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
