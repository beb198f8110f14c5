//! Immutable ledger rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use famledger_core::{AccountId, Money, TransactionId, UserId};

/// What kind of balance-changing event a row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    TransferIn,
    TransferOut,
    AutoTransfer,
    Interest,
    Fee,
}

impl TransactionType {
    /// Whether rows of this type add to the balance.
    pub fn is_credit(self) -> bool {
        matches!(
            self,
            TransactionType::Deposit
                | TransactionType::TransferIn
                | TransactionType::AutoTransfer
                | TransactionType::Interest
        )
    }

    /// The signed delta a row of this type contributes to the balance.
    pub fn signed(self, amount: Money) -> Money {
        if self.is_credit() {
            amount
        } else {
            amount.negated()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

/// The other side of a transfer/withdrawal, as free-text descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterparty {
    pub name: String,
    pub bank: Option<String>,
    pub account_number: Option<String>,
}

/// One immutable, timestamped ledger row with a post-event balance snapshot.
///
/// Rows are created Completed by the engine and never updated or deleted
/// afterwards. `amount` is always positive; the sign of the delta comes from
/// `tx_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub actor_id: UserId,
    pub tx_type: TransactionType,
    pub amount: Money,
    pub balance_after: Money,
    pub counterparty: Option<Counterparty>,
    pub status: TransactionStatus,
    /// Globally unique reference number.
    pub reference: String,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a finalized (Completed) row.
    #[allow(clippy::too_many_arguments)]
    pub fn completed(
        account_id: AccountId,
        actor_id: UserId,
        tx_type: TransactionType,
        amount: Money,
        balance_after: Money,
        counterparty: Option<Counterparty>,
        reference: String,
        note: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            account_id,
            actor_id,
            tx_type,
            amount,
            balance_after,
            counterparty,
            status: TransactionStatus::Completed,
            reference,
            note,
            occurred_at,
        }
    }

    /// The signed delta this row contributed to the account balance.
    pub fn signed_amount(&self) -> Money {
        self.tx_type.signed(self.amount)
    }
}
