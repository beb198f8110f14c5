//! Allow/deny decision for a candidate spend.

use serde::{Deserialize, Serialize};

use famledger_core::Money;

/// Inputs to a spend check, already reduced to window sums by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendCheck {
    pub available: Money,
    pub amount: Money,
    pub daily_limit: Money,
    pub spent_today: Money,
    pub monthly_limit: Option<Money>,
    pub spent_this_month: Money,
}

/// Why a spend was denied. The first failing check wins, evaluated in
/// balance → daily → monthly order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum DenyReason {
    InsufficientBalance { available: Money, requested: Money },
    DailyLimitExceeded { limit: Money, spent: Money, requested: Money },
    MonthlyLimitExceeded { limit: Money, spent: Money, requested: Money },
}

impl DenyReason {
    pub fn describe(&self) -> String {
        match self {
            DenyReason::InsufficientBalance { available, requested } => {
                format!("available {available}, requested {requested}")
            }
            DenyReason::DailyLimitExceeded { limit, spent, requested } => {
                format!("daily limit {limit}, spent today {spent}, requested {requested}")
            }
            DenyReason::MonthlyLimitExceeded { limit, spent, requested } => {
                format!("monthly limit {limit}, spent this month {spent}, requested {requested}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitDecision {
    Allow,
    Deny(DenyReason),
}

impl LimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, LimitDecision::Allow)
    }
}

/// Evaluate a candidate spend against balance and calendar-window caps.
///
/// - No IO
/// - No panics
/// - First failing check wins: balance, then daily, then monthly.
pub fn check_spend(check: SpendCheck) -> LimitDecision {
    let SpendCheck {
        available,
        amount,
        daily_limit,
        spent_today,
        monthly_limit,
        spent_this_month,
    } = check;

    if amount > available {
        return LimitDecision::Deny(DenyReason::InsufficientBalance {
            available,
            requested: amount,
        });
    }

    // Compare in i128 so a cap near i64::MAX cannot overflow the sum.
    let would_spend_today = spent_today.minor() as i128 + amount.minor() as i128;
    if would_spend_today > daily_limit.minor() as i128 {
        return LimitDecision::Deny(DenyReason::DailyLimitExceeded {
            limit: daily_limit,
            spent: spent_today,
            requested: amount,
        });
    }

    if let Some(limit) = monthly_limit {
        let would_spend_month = spent_this_month.minor() as i128 + amount.minor() as i128;
        if would_spend_month > limit.minor() as i128 {
            return LimitDecision::Deny(DenyReason::MonthlyLimitExceeded {
                limit,
                spent: spent_this_month,
                requested: amount,
            });
        }
    }

    LimitDecision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn base_check() -> SpendCheck {
        SpendCheck {
            available: Money::from_minor(20_000),
            amount: Money::from_minor(5_000),
            daily_limit: Money::from_minor(10_000),
            spent_today: Money::ZERO,
            monthly_limit: None,
            spent_this_month: Money::ZERO,
        }
    }

    #[test]
    fn spend_within_all_caps_is_allowed() {
        assert!(check_spend(base_check()).is_allowed());
    }

    #[test]
    fn balance_check_wins_over_limit_checks() {
        // Breaches balance AND daily limit: balance must be reported.
        let check = SpendCheck {
            available: Money::from_minor(1_000),
            amount: Money::from_minor(15_000),
            ..base_check()
        };
        match check_spend(check) {
            LimitDecision::Deny(DenyReason::InsufficientBalance { available, requested }) => {
                assert_eq!(available, Money::from_minor(1_000));
                assert_eq!(requested, Money::from_minor(15_000));
            }
            other => panic!("expected insufficient balance, got {other:?}"),
        }
    }

    #[test]
    fn daily_cap_counts_prior_same_day_spend() {
        let check = SpendCheck {
            amount: Money::from_minor(5_000),
            spent_today: Money::from_minor(6_000),
            ..base_check()
        };
        assert!(matches!(
            check_spend(check),
            LimitDecision::Deny(DenyReason::DailyLimitExceeded { .. })
        ));
    }

    #[test]
    fn exact_daily_limit_is_allowed() {
        let check = SpendCheck {
            amount: Money::from_minor(4_000),
            spent_today: Money::from_minor(6_000),
            ..base_check()
        };
        assert!(check_spend(check).is_allowed());
    }

    #[test]
    fn monthly_cap_applies_only_when_configured() {
        let unlimited = SpendCheck {
            spent_this_month: Money::from_minor(1_000_000),
            ..base_check()
        };
        assert!(check_spend(unlimited).is_allowed());

        let capped = SpendCheck {
            monthly_limit: Some(Money::from_minor(100_000)),
            spent_this_month: Money::from_minor(98_000),
            ..base_check()
        };
        assert!(matches!(
            check_spend(capped),
            LimitDecision::Deny(DenyReason::MonthlyLimitExceeded { .. })
        ));
    }

    proptest! {
        /// Approved spend never pushes the day's total past the daily cap.
        #[test]
        fn daily_total_never_exceeds_cap(
            daily_limit in 1i64..100_000,
            amounts in prop::collection::vec(1i64..20_000, 1..40),
        ) {
            let mut spent_today = Money::ZERO;
            let available = Money::from_minor(i64::MAX / 2);

            for a in amounts {
                let check = SpendCheck {
                    available,
                    amount: Money::from_minor(a),
                    daily_limit: Money::from_minor(daily_limit),
                    spent_today,
                    monthly_limit: None,
                    spent_this_month: Money::ZERO,
                };
                if check_spend(check).is_allowed() {
                    spent_today = spent_today.checked_add(Money::from_minor(a)).unwrap();
                }
                prop_assert!(spent_today.minor() <= daily_limit);
            }
        }
    }
}
