//! Card spend (usage) rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use famledger_core::{CardId, CardUsageId, Money};

/// Usage row lifecycle. Approved rows are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageStatus {
    Approved,
    Pending,
    Cancelled,
    Refunded,
}

/// Optional parent sign-off attached to a usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentApproval {
    Pending,
    Approved,
    Rejected,
}

/// One immutable spend row, chronologically ordered per card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardUsage {
    pub id: CardUsageId,
    pub card_id: CardId,
    pub amount: Money,
    pub merchant_name: String,
    pub category: Option<String>,
    pub balance_after: Money,
    /// Globally unique approval number.
    pub approval_number: String,
    pub status: UsageStatus,
    pub parent_approval: Option<ParentApproval>,
    pub occurred_at: DateTime<Utc>,
}

impl CardUsage {
    /// Build an approved spend row.
    pub fn approved(
        card_id: CardId,
        amount: Money,
        merchant_name: impl Into<String>,
        category: Option<String>,
        balance_after: Money,
        approval_number: String,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CardUsageId::new(),
            card_id,
            amount,
            merchant_name: merchant_name.into(),
            category,
            balance_after,
            approval_number,
            status: UsageStatus::Approved,
            parent_approval: None,
            occurred_at,
        }
    }
}
