//! Card top-up (charge) rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use famledger_core::{CardChargeId, CardId, Money};

use crate::card::FundingSourceKind;

/// How the charge was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeKind {
    Manual,
    Auto,
    Scheduled,
}

/// One immutable top-up row. Charges are funding events, not spend, so no
/// daily/monthly cap applies to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardCharge {
    pub id: CardChargeId,
    pub card_id: CardId,
    pub amount: Money,
    pub source_kind: Option<FundingSourceKind>,
    pub source_id: Option<String>,
    pub description: Option<String>,
    pub balance_after: Money,
    pub kind: ChargeKind,
    pub occurred_at: DateTime<Utc>,
}

impl CardCharge {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        card_id: CardId,
        amount: Money,
        source_kind: Option<FundingSourceKind>,
        source_id: Option<String>,
        description: Option<String>,
        balance_after: Money,
        kind: ChargeKind,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CardChargeId::new(),
            card_id,
            amount,
            source_kind,
            source_id,
            description,
            balance_after,
            kind,
            occurred_at,
        }
    }
}
