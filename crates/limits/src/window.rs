//! Calendar-window sums over ledger history.

use chrono::{DateTime, Datelike, Utc};

use famledger_core::Money;

/// Whether two instants fall on the same calendar day (00:00 boundary).
pub fn same_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

/// Whether two instants fall in the same calendar month.
pub fn same_month(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

/// Sum of amounts stamped on the same calendar day as `as_of`.
pub fn spent_on_day<I>(entries: I, as_of: DateTime<Utc>) -> Money
where
    I: IntoIterator<Item = (DateTime<Utc>, Money)>,
{
    Money::sum(
        entries
            .into_iter()
            .filter(|(at, _)| same_day(*at, as_of))
            .map(|(_, amount)| amount),
    )
}

/// Sum of amounts stamped in the same calendar month as `as_of`.
pub fn spent_in_month<I>(entries: I, as_of: DateTime<Utc>) -> Money
where
    I: IntoIterator<Item = (DateTime<Utc>, Money)>,
{
    Money::sum(
        entries
            .into_iter()
            .filter(|(at, _)| same_month(*at, as_of))
            .map(|(_, amount)| amount),
    )
}

/// Headroom left under a daily cap; never negative.
pub fn remaining_daily(daily_limit: Money, spent_today: Money) -> Money {
    let remaining = daily_limit.minor() - spent_today.minor();
    Money::from_minor(remaining.max(0))
}

/// Headroom left under an optional monthly cap.
///
/// `None` means the cap is not configured and spend is unbounded at this
/// window.
pub fn remaining_monthly(monthly_limit: Option<Money>, spent_this_month: Money) -> Option<Money> {
    monthly_limit.map(|limit| {
        let remaining = limit.minor() - spent_this_month.minor();
        Money::from_minor(remaining.max(0))
    })
}
