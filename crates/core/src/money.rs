//! Fixed-point money.
//!
//! Amounts are stored in the currency's smallest unit as a signed `i64`
//! (e.g. won/cents). All arithmetic is checked; overflow is rejected rather
//! than wrapped.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A fixed-point monetary amount in minor units.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition; overflow is a validation error.
    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    /// Checked subtraction; underflow is a validation error.
    pub fn checked_sub(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount underflow"))
    }

    /// Saturating addition for running totals that must never fail.
    pub fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    /// Saturating sum for reporting aggregates over many rows.
    ///
    /// Totals are widened to i128 internally so a pathological row count
    /// cannot wrap; the result clamps at i64 bounds.
    pub fn sum<I: IntoIterator<Item = Money>>(amounts: I) -> Money {
        let total: i128 = amounts.into_iter().map(|m| m.0 as i128).sum();
        Money(total.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// The additive inverse (used for signed ledger deltas).
    pub fn negated(self) -> Money {
        Money(self.0.saturating_neg())
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
