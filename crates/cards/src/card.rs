//! Prepaid card entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use famledger_core::{AccountId, CardId, DomainError, DomainResult, Entity, Money, UserId};

/// Card lifecycle.
///
/// Active ⇄ Suspended is a manual toggle; Blocked and Expired are terminal
/// and reject every charge/use call and every further transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Active,
    Suspended,
    Blocked,
    Expired,
}

impl CardStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, CardStatus::Blocked | CardStatus::Expired)
    }
}

/// Which kind of account funds auto-recharges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundingSourceKind {
    Personal,
    Group,
}

/// Reference to the external account that funds recharges.
///
/// The core records the reference and amount only; it never moves money
/// between the funding source and the card itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingSource {
    pub kind: FundingSourceKind,
    pub id: AccountId,
}

/// A child-held stored-value card managed and funded by a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepaidCard {
    pub id: CardId,
    pub card_number: String,
    pub name: String,
    pub child_id: UserId,
    pub parent_id: UserId,
    pub balance: Money,
    pub daily_limit: Money,
    pub monthly_limit: Option<Money>,
    pub status: CardStatus,
    pub auto_charge_enabled: bool,
    pub auto_charge_amount: Money,
    pub auto_charge_threshold: Money,
    pub funding_source: Option<FundingSource>,
    pub low_balance_alert: Option<Money>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl PrepaidCard {
    pub fn issue(
        card_number: String,
        name: impl Into<String>,
        child_id: UserId,
        parent_id: UserId,
        daily_limit: Money,
        monthly_limit: Option<Money>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if !daily_limit.is_positive() {
            return Err(DomainError::validation("daily limit must be positive"));
        }
        if let Some(m) = monthly_limit {
            if m < daily_limit {
                return Err(DomainError::validation(
                    "monthly limit must not be below the daily limit",
                ));
            }
        }

        Ok(Self {
            id: CardId::new(),
            card_number,
            name: name.into(),
            child_id,
            parent_id,
            balance: Money::ZERO,
            daily_limit,
            monthly_limit,
            status: CardStatus::Active,
            auto_charge_enabled: false,
            auto_charge_amount: Money::ZERO,
            auto_charge_threshold: Money::ZERO,
            funding_source: None,
            low_balance_alert: None,
            created_at: now,
            version: 0,
        })
    }

    /// Invariant helper: whether charge/use calls may proceed.
    pub fn ensure_usable(&self) -> DomainResult<()> {
        if self.status != CardStatus::Active {
            return Err(DomainError::invalid_state(format!(
                "card {} is {:?}",
                self.card_number, self.status
            )));
        }
        Ok(())
    }

    pub fn suspend(&mut self) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invalid_state(format!(
                "card status {:?} is terminal",
                self.status
            )));
        }
        if self.status != CardStatus::Active {
            return Err(DomainError::invalid_state("card is not active"));
        }
        self.status = CardStatus::Suspended;
        Ok(())
    }

    pub fn resume(&mut self) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invalid_state(format!(
                "card status {:?} is terminal",
                self.status
            )));
        }
        if self.status != CardStatus::Suspended {
            return Err(DomainError::invalid_state("card is not suspended"));
        }
        self.status = CardStatus::Active;
        Ok(())
    }

    /// Configure auto-recharge. Requires a funding source and positive
    /// amount/threshold when enabling.
    pub fn configure_auto_charge(
        &mut self,
        enabled: bool,
        amount: Money,
        threshold: Money,
        funding_source: Option<FundingSource>,
    ) -> DomainResult<()> {
        if enabled {
            if !amount.is_positive() {
                return Err(DomainError::validation(
                    "auto-charge amount must be positive",
                ));
            }
            if threshold.is_negative() {
                return Err(DomainError::validation(
                    "auto-charge threshold must not be negative",
                ));
            }
            if funding_source.is_none() {
                return Err(DomainError::validation(
                    "auto-charge requires a funding source",
                ));
            }
        }
        self.auto_charge_enabled = enabled;
        self.auto_charge_amount = amount;
        self.auto_charge_threshold = threshold;
        self.funding_source = funding_source;
        Ok(())
    }

    /// Whether the current balance should trigger an auto-recharge signal.
    pub fn needs_auto_charge(&self) -> bool {
        self.auto_charge_enabled
            && self.funding_source.is_some()
            && self.balance <= self.auto_charge_threshold
    }

    /// Whether the current balance should trigger a low-balance alert.
    pub fn below_alert_threshold(&self) -> bool {
        self.low_balance_alert
            .is_some_and(|threshold| self.balance <= threshold)
    }

    /// Increase the balance (top-up), returning the new value.
    pub fn credit(&mut self, amount: Money) -> DomainResult<Money> {
        if !amount.is_positive() {
            return Err(DomainError::validation("amount must be positive"));
        }
        self.balance = self.balance.checked_add(amount)?;
        Ok(self.balance)
    }

    /// Decrease the balance (spend), returning the new value.
    ///
    /// The limit decision happens in the engine before this is called, but
    /// the overdraft guard is kept here as the entity's own invariant.
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
}

impl Entity for PrepaidCard {
    type Id = CardId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
