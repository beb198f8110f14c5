//! Spending-limit enforcement.
//!
//! Pure functions over a candidate operation and the ledger history: no
//! store access, no clocks of its own. Windows are wall-clock calendar
//! boundaries (day starts at 00:00, month at the 1st), not rolling
//! durations.

pub mod decision;
pub mod window;

pub use decision::{check_spend, DenyReason, LimitDecision, SpendCheck};
pub use window::{
    remaining_daily, remaining_monthly, same_day, same_month, spent_in_month, spent_on_day,
};
