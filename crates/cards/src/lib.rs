//! Prepaid allowance-card domain: a child-held, parent-funded stored-value
//! card with daily/monthly spend caps.
//!
//! Structurally mirrors the group-account ledger: the card balance is
//! mutated only through the card engine, which appends an immutable charge
//! or usage row for every committed delta.

pub mod card;
pub mod charge;
pub mod number;
pub mod usage;

pub use card::{CardStatus, FundingSource, FundingSourceKind, PrepaidCard};
pub use charge::{CardCharge, ChargeKind};
pub use number::{approval_number, card_number, CARD_BIN_PREFIX};
pub use usage::{CardUsage, ParentApproval, UsageStatus};
