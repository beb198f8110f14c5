//! Prepaid-card engine.
//!
//! Charges top the balance up; uses spend it down after a balance → daily →
//! monthly limit check over the card's approved usage history. A denied
//! spend leaves no trace: no balance change, no usage row. Auto-recharge is
//! a signal to the parent, never a money movement performed here.

use std::sync::Arc;

use famledger_cards::{
    approval_number, card_number, CardCharge, CardUsage, ChargeKind, FundingSource, PrepaidCard,
    UsageStatus,
};
use famledger_core::{CardId, Clock, DomainError, DomainResult, ExpectedVersion, Money, UserId};
use famledger_limits::{check_spend, spent_in_month, spent_on_day, LimitDecision, SpendCheck};
use famledger_notify::{Notification, NotificationKind, NotificationSink};

use crate::locks::{hold, LockRegistry};
use crate::store::CardStore;

const NUMBER_RETRIES: usize = 5;

pub struct CardEngine {
    cards: Arc<CardStore>,
    locks: Arc<LockRegistry>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl CardEngine {
    pub fn new(
        cards: Arc<CardStore>,
        locks: Arc<LockRegistry>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cards,
            locks,
            notifier,
            clock,
        }
    }

    /// Issue a card for `child`, managed and funded by `parent`.
    pub fn issue_card(
        &self,
        parent: UserId,
        child: UserId,
        name: &str,
        daily_limit: Money,
        monthly_limit: Option<Money>,
    ) -> DomainResult<PrepaidCard> {
        let now = self.clock.now();
        let mut last = DomainError::conflict("card number generation exhausted");
        for _ in 0..NUMBER_RETRIES {
            let card = PrepaidCard::issue(
                card_number(),
                name,
                child,
                parent,
                daily_limit,
                monthly_limit,
                now,
            )?;
            match self.cards.insert_card(card) {
                Ok(stored) => {
                    tracing::info!(card = %stored.id, number = %stored.card_number, "card issued");
                    return Ok(stored);
                }
                Err(DomainError::AlreadyExists(msg)) => {
                    last = DomainError::AlreadyExists(msg);
                }
                Err(other) => return Err(other),
            }
        }
        Err(last)
    }

    /// Top the card balance up. Only the managing parent may charge.
    ///
    /// Charges are funding events: no daily/monthly cap applies.
    pub fn charge(
        &self,
        card_id: CardId,
        actor: UserId,
        amount: Money,
        kind: ChargeKind,
        description: Option<String>,
    ) -> DomainResult<(PrepaidCard, CardCharge)> {
        if !amount.is_positive() {
            return Err(DomainError::validation("charge amount must be positive"));
        }

        let lock = self.locks.target_lock(card_id.into());
        let _guard = hold(&lock);

        let mut card = self.cards.get_card(card_id)?;
        self.require_parent(&card, actor)?;
        card.ensure_usable()?;
        let expected = ExpectedVersion::Exact(card.version);
        let balance_after = card.credit(amount)?;

        let (source_kind, source_id) = match card.funding_source {
            Some(FundingSource { kind, id }) => (Some(kind), Some(id.to_string())),
            None => (None, None),
        };
        let row = CardCharge::new(
            card_id,
            amount,
            source_kind,
            source_id,
            description,
            balance_after,
            kind,
            self.clock.now(),
        );
        let (card, row) = self.cards.commit_charge(card, expected, row)?;

        tracing::info!(card = %card_id, amount = %amount, kind = ?kind, "card charged");
        Ok((card, row))
    }

    /// Spend from the card at a merchant. Only the card-holding child may
    /// use the card.
    ///
    /// The spend is checked against balance, then the daily cap, then the
    /// monthly cap over approved usages in the current calendar windows. A
    /// denial has no side effects. An approved spend that leaves the balance
    /// at or below the auto-charge threshold signals the parent; the engine
    /// never moves funding money itself.
    pub fn use_card(
        &self,
        card_id: CardId,
        actor: UserId,
        amount: Money,
        merchant: &str,
        category: Option<String>,
    ) -> DomainResult<(PrepaidCard, CardUsage)> {
        if !amount.is_positive() {
            return Err(DomainError::validation("usage amount must be positive"));
        }
        if merchant.trim().is_empty() {
            return Err(DomainError::validation("merchant name must not be empty"));
        }

        let lock = self.locks.target_lock(card_id.into());
        let _guard = hold(&lock);

        let mut card = self.cards.get_card(card_id)?;
        if card.child_id != actor {
            return Err(DomainError::permission_denied(
                "only the card holder may spend from the card",
            ));
        }
        card.ensure_usable()?;

        let now = self.clock.now();
        let approved: Vec<(chrono::DateTime<chrono::Utc>, Money)> = self
            .cards
            .usages_for(card_id)?
            .into_iter()
            .filter(|u| u.status == UsageStatus::Approved)
            .map(|u| (u.occurred_at, u.amount))
            .collect();
        let check = SpendCheck {
            available: card.balance,
            amount,
            daily_limit: card.daily_limit,
            spent_today: spent_on_day(approved.iter().copied(), now),
            monthly_limit: card.monthly_limit,
            spent_this_month: spent_in_month(approved.iter().copied(), now),
        };
        if let LimitDecision::Deny(reason) = check_spend(check) {
            tracing::info!(card = %card_id, amount = %amount, reason = ?reason, "spend denied");
            return Err(DomainError::insufficient_funds(reason.describe()));
        }

        let expected = ExpectedVersion::Exact(card.version);
        let balance_after = card.debit(amount)?;

        let mut last = DomainError::conflict("approval number generation exhausted");
        let mut committed = None;
        for _ in 0..NUMBER_RETRIES {
            let row = CardUsage::approved(
                card_id,
                amount,
                merchant,
                category.clone(),
                balance_after,
                approval_number(),
                now,
            );
            match self.cards.commit_usage(card.clone(), expected, row) {
                Ok(done) => {
                    committed = Some(done);
                    break;
                }
                Err(DomainError::AlreadyExists(msg)) => {
                    last = DomainError::AlreadyExists(msg);
                }
                Err(other) => return Err(other),
            }
        }
        let (card, row) = committed.ok_or(last)?;

        self.signal_balance_state(&card, &row);
        tracing::info!(
            card = %card_id,
            approval = %row.approval_number,
            amount = %amount,
            "spend approved"
        );
        Ok((card, row))
    }

    pub fn card(&self, card_id: CardId, actor: UserId) -> DomainResult<PrepaidCard> {
        let card = self.cards.get_card(card_id)?;
        self.require_parent_or_child(&card, actor)?;
        Ok(card)
    }

    pub fn cards_for_user(&self, user: UserId) -> DomainResult<Vec<PrepaidCard>> {
        self.cards.cards_for_user(user)
    }

    /// Sum of approved spend in the current calendar day.
    pub fn today_usage(&self, card_id: CardId, actor: UserId) -> DomainResult<Money> {
        let card = self.cards.get_card(card_id)?;
        self.require_parent_or_child(&card, actor)?;
        Ok(spent_on_day(
            self.approved_entries(card_id)?,
            self.clock.now(),
        ))
    }

    /// Sum of approved spend in the current calendar month.
    pub fn monthly_usage(&self, card_id: CardId, actor: UserId) -> DomainResult<Money> {
        let card = self.cards.get_card(card_id)?;
        self.require_parent_or_child(&card, actor)?;
        Ok(spent_in_month(
            self.approved_entries(card_id)?,
            self.clock.now(),
        ))
    }

    /// Usage rows newest first.
    pub fn usage_history(
        &self,
        card_id: CardId,
        actor: UserId,
        offset: usize,
        limit: usize,
    ) -> DomainResult<Vec<CardUsage>> {
        let card = self.cards.get_card(card_id)?;
        self.require_parent_or_child(&card, actor)?;
        let rows = self.cards.usages_for(card_id)?;
        Ok(rows.into_iter().rev().skip(offset).take(limit).collect())
    }

    /// Charge rows newest first.
    pub fn charge_history(
        &self,
        card_id: CardId,
        actor: UserId,
        offset: usize,
        limit: usize,
    ) -> DomainResult<Vec<CardCharge>> {
        let card = self.cards.get_card(card_id)?;
        self.require_parent_or_child(&card, actor)?;
        let rows = self.cards.charges_for(card_id)?;
        Ok(rows.into_iter().rev().skip(offset).take(limit).collect())
    }

    /// Suspend the card. The child is notified.
    pub fn suspend_card(&self, card_id: CardId, actor: UserId) -> DomainResult<PrepaidCard> {
        let lock = self.locks.target_lock(card_id.into());
        let _guard = hold(&lock);

        let mut card = self.cards.get_card(card_id)?;
        self.require_parent(&card, actor)?;
        let expected = ExpectedVersion::Exact(card.version);
        card.suspend()?;
        let card = self.cards.update_card(card, expected)?;

        self.notifier.deliver(Notification {
            recipient_id: card.child_id,
            kind: NotificationKind::CardSuspended,
            title: "Card suspended".to_string(),
            body: format!("Card {} was suspended", card.card_number),
            related_entity: Some(card.id.to_string()),
        });
        tracing::info!(card = %card_id, "card suspended");
        Ok(card)
    }

    pub fn resume_card(&self, card_id: CardId, actor: UserId) -> DomainResult<PrepaidCard> {
        let lock = self.locks.target_lock(card_id.into());
        let _guard = hold(&lock);

        let mut card = self.cards.get_card(card_id)?;
        self.require_parent(&card, actor)?;
        let expected = ExpectedVersion::Exact(card.version);
        card.resume()?;
        let card = self.cards.update_card(card, expected)?;
        tracing::info!(card = %card_id, "card resumed");
        Ok(card)
    }

    /// Configure the auto-recharge policy.
    pub fn configure_auto_charge(
        &self,
        card_id: CardId,
        actor: UserId,
        enabled: bool,
        amount: Money,
        threshold: Money,
        funding_source: Option<FundingSource>,
    ) -> DomainResult<PrepaidCard> {
        let lock = self.locks.target_lock(card_id.into());
        let _guard = hold(&lock);

        let mut card = self.cards.get_card(card_id)?;
        self.require_parent(&card, actor)?;
        let expected = ExpectedVersion::Exact(card.version);
        card.configure_auto_charge(enabled, amount, threshold, funding_source)?;
        self.cards.update_card(card, expected)
    }

    /// Set or clear the low-balance alert threshold.
    pub fn set_low_balance_alert(
        &self,
        card_id: CardId,
        actor: UserId,
        threshold: Option<Money>,
    ) -> DomainResult<PrepaidCard> {
        if let Some(t) = threshold {
            if t.is_negative() {
                return Err(DomainError::validation(
                    "alert threshold must not be negative",
                ));
            }
        }

        let lock = self.locks.target_lock(card_id.into());
        let _guard = hold(&lock);

        let mut card = self.cards.get_card(card_id)?;
        self.require_parent(&card, actor)?;
        let expected = ExpectedVersion::Exact(card.version);
        card.low_balance_alert = threshold;
        self.cards.update_card(card, expected)
    }

    fn approved_entries(
        &self,
        card_id: CardId,
    ) -> DomainResult<Vec<(chrono::DateTime<chrono::Utc>, Money)>> {
        Ok(self
            .cards
            .usages_for(card_id)?
            .into_iter()
            .filter(|u| u.status == UsageStatus::Approved)
            .map(|u| (u.occurred_at, u.amount))
            .collect())
    }

    fn signal_balance_state(&self, card: &PrepaidCard, row: &CardUsage) {
        if card.needs_auto_charge() {
            self.notifier.deliver(Notification {
                recipient_id: card.parent_id,
                kind: NotificationKind::AutoChargeRequested,
                title: "Auto-recharge requested".to_string(),
                body: format!(
                    "Card {} fell to {}; recharge of {} requested",
                    card.card_number, card.balance, card.auto_charge_amount
                ),
                related_entity: Some(card.id.to_string()),
            });
        } else if card.below_alert_threshold() {
            self.notifier.deliver(Notification {
                recipient_id: card.parent_id,
                kind: NotificationKind::LowBalance,
                title: "Low card balance".to_string(),
                body: format!("Card {} balance is down to {}", card.card_number, card.balance),
                related_entity: Some(row.id.to_string()),
            });
        }
    }

    fn require_parent(&self, card: &PrepaidCard, actor: UserId) -> DomainResult<()> {
        if card.parent_id != actor {
            return Err(DomainError::permission_denied(
                "only the managing parent may do this",
            ));
        }
        Ok(())
    }

    fn require_parent_or_child(&self, card: &PrepaidCard, actor: UserId) -> DomainResult<()> {
        if card.parent_id != actor && card.child_id != actor {
            return Err(DomainError::permission_denied(
                "card is visible to its parent and holder only",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use famledger_cards::FundingSourceKind;
    use famledger_core::{AccountId, FixedClock};
    use famledger_notify::InMemorySink;

    struct Fixture {
        engine: CardEngine,
        sink: Arc<InMemorySink>,
        clock: Arc<FixedClock>,
        parent: UserId,
        child: UserId,
    }

    fn fixture() -> Fixture {
        let sink = Arc::new(InMemorySink::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 6, 15, 10, 0, 0).unwrap(),
        ));
        let engine = CardEngine::new(
            Arc::new(CardStore::new()),
            Arc::new(LockRegistry::new()),
            sink.clone(),
            clock.clone(),
        );
        Fixture {
            engine,
            sink,
            clock,
            parent: UserId::new(),
            child: UserId::new(),
        }
    }

    fn issue(f: &Fixture, daily: i64, monthly: Option<i64>) -> PrepaidCard {
        f.engine
            .issue_card(
                f.parent,
                f.child,
                "allowance card",
                Money::from_minor(daily),
                monthly.map(Money::from_minor),
            )
            .unwrap()
    }

    #[test]
    fn issues_with_bin_prefix_and_zero_balance() {
        let f = fixture();
        let card = issue(&f, 10_000, None);
        assert!(card.card_number.starts_with("9410"));
        assert_eq!(card.balance, Money::ZERO);
    }

    #[test]
    fn daily_limit_denies_without_side_effects() {
        let f = fixture();
        let card = issue(&f, 10_000, None);
        f.engine
            .charge(card.id, f.parent, Money::from_minor(20_000), ChargeKind::Manual, None)
            .unwrap();

        // 6,000 fits under the 10,000 daily cap.
        let (card_after, row) = f
            .engine
            .use_card(card.id, f.child, Money::from_minor(6_000), "GS25", None)
            .unwrap();
        assert_eq!(card_after.balance, Money::from_minor(14_000));
        assert_eq!(row.balance_after, Money::from_minor(14_000));

        // 5,000 more would breach the cap: denied, balance and history
        // untouched.
        let err = f
            .engine
            .use_card(card.id, f.child, Money::from_minor(5_000), "CU", None)
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientFunds(_)));
        let current = f.engine.card(card.id, f.child).unwrap();
        assert_eq!(current.balance, Money::from_minor(14_000));
        assert_eq!(
            f.engine.usage_history(card.id, f.child, 0, 10).unwrap().len(),
            1
        );
    }

    #[test]
    fn daily_window_resets_at_midnight() {
        let f = fixture();
        let card = issue(&f, 10_000, None);
        f.engine
            .charge(card.id, f.parent, Money::from_minor(50_000), ChargeKind::Manual, None)
            .unwrap();

        f.engine
            .use_card(card.id, f.child, Money::from_minor(10_000), "GS25", None)
            .unwrap();
        assert!(f
            .engine
            .use_card(card.id, f.child, Money::from_minor(1), "CU", None)
            .is_err());

        f.clock.advance(Duration::days(1));
        f.engine
            .use_card(card.id, f.child, Money::from_minor(10_000), "CU", None)
            .unwrap();
        assert_eq!(
            f.engine.today_usage(card.id, f.child).unwrap(),
            Money::from_minor(10_000)
        );
    }

    #[test]
    fn monthly_limit_spans_days() {
        let f = fixture();
        let card = issue(&f, 10_000, Some(15_000));
        f.engine
            .charge(card.id, f.parent, Money::from_minor(50_000), ChargeKind::Manual, None)
            .unwrap();

        f.engine
            .use_card(card.id, f.child, Money::from_minor(10_000), "GS25", None)
            .unwrap();
        f.clock.advance(Duration::days(1));

        // Daily window is fresh but the month already carries 10,000.
        let err = f
            .engine
            .use_card(card.id, f.child, Money::from_minor(6_000), "CU", None)
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientFunds(_)));
        f.engine
            .use_card(card.id, f.child, Money::from_minor(5_000), "CU", None)
            .unwrap();

        // Next month the window is clear again.
        f.clock.set(Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap());
        f.engine
            .use_card(card.id, f.child, Money::from_minor(8_000), "CU", None)
            .unwrap();
        assert_eq!(
            f.engine.monthly_usage(card.id, f.child).unwrap(),
            Money::from_minor(8_000)
        );
    }

    #[test]
    fn only_child_spends_only_parent_charges() {
        let f = fixture();
        let card = issue(&f, 10_000, None);

        let err = f
            .engine
            .charge(card.id, f.child, Money::from_minor(5_000), ChargeKind::Manual, None)
            .unwrap_err();
        assert!(matches!(err, DomainError::PermissionDenied(_)));

        f.engine
            .charge(card.id, f.parent, Money::from_minor(5_000), ChargeKind::Manual, None)
            .unwrap();
        let err = f
            .engine
            .use_card(card.id, f.parent, Money::from_minor(1_000), "GS25", None)
            .unwrap_err();
        assert!(matches!(err, DomainError::PermissionDenied(_)));

        let err = f.engine.card(card.id, UserId::new()).unwrap_err();
        assert!(matches!(err, DomainError::PermissionDenied(_)));
    }

    #[test]
    fn suspended_card_rejects_spend_and_notifies_child() {
        let f = fixture();
        let card = issue(&f, 10_000, None);
        f.engine
            .charge(card.id, f.parent, Money::from_minor(5_000), ChargeKind::Manual, None)
            .unwrap();
        f.sink.take();

        f.engine.suspend_card(card.id, f.parent).unwrap();
        let sent = f.sink.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::CardSuspended);
        assert_eq!(sent[0].recipient_id, f.child);

        let err = f
            .engine
            .use_card(card.id, f.child, Money::from_minor(1_000), "GS25", None)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));

        f.engine.resume_card(card.id, f.parent).unwrap();
        f.engine
            .use_card(card.id, f.child, Money::from_minor(1_000), "GS25", None)
            .unwrap();
    }

    #[test]
    fn spend_below_threshold_requests_auto_charge() {
        let f = fixture();
        let card = issue(&f, 10_000, None);
        f.engine
            .charge(card.id, f.parent, Money::from_minor(12_000), ChargeKind::Manual, None)
            .unwrap();
        f.engine
            .configure_auto_charge(
                card.id,
                f.parent,
                true,
                Money::from_minor(10_000),
                Money::from_minor(5_000),
                Some(FundingSource {
                    kind: FundingSourceKind::Group,
                    id: AccountId::new(),
                }),
            )
            .unwrap();
        f.sink.take();

        // 12,000 - 8,000 = 4,000 <= threshold 5,000: signal fires.
        f.engine
            .use_card(card.id, f.child, Money::from_minor(8_000), "GS25", None)
            .unwrap();
        let sent = f.sink.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::AutoChargeRequested);
        assert_eq!(sent[0].recipient_id, f.parent);

        // The engine signalled only; no balance change beyond the spend.
        let current = f.engine.card(card.id, f.parent).unwrap();
        assert_eq!(current.balance, Money::from_minor(4_000));
    }

    #[test]
    fn low_balance_alert_fires_when_auto_charge_disabled() {
        let f = fixture();
        let card = issue(&f, 10_000, None);
        f.engine
            .charge(card.id, f.parent, Money::from_minor(10_000), ChargeKind::Manual, None)
            .unwrap();
        f.engine
            .set_low_balance_alert(card.id, f.parent, Some(Money::from_minor(3_000)))
            .unwrap();
        f.sink.take();

        f.engine
            .use_card(card.id, f.child, Money::from_minor(8_000), "GS25", None)
            .unwrap();
        let sent = f.sink.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::LowBalance);
    }

    #[test]
    fn auto_charge_records_funding_source_on_charge_rows() {
        let f = fixture();
        let card = issue(&f, 10_000, None);
        let source = FundingSource {
            kind: FundingSourceKind::Group,
            id: AccountId::new(),
        };
        f.engine
            .configure_auto_charge(
                card.id,
                f.parent,
                true,
                Money::from_minor(10_000),
                Money::ZERO,
                Some(source),
            )
            .unwrap();

        f.engine
            .charge(card.id, f.parent, Money::from_minor(10_000), ChargeKind::Auto, None)
            .unwrap();
        let rows = f.engine.charge_history(card.id, f.parent, 0, 10).unwrap();
        assert_eq!(rows[0].kind, ChargeKind::Auto);
        assert_eq!(rows[0].source_kind, Some(FundingSourceKind::Group));
        assert_eq!(rows[0].source_id, Some(source.id.to_string()));
    }

    #[test]
    fn histories_are_newest_first() {
        let f = fixture();
        let card = issue(&f, 50_000, None);
        f.engine
            .charge(card.id, f.parent, Money::from_minor(30_000), ChargeKind::Manual, None)
            .unwrap();
        for amount in [1_000, 2_000, 3_000] {
            f.engine
                .use_card(card.id, f.child, Money::from_minor(amount), "GS25", None)
                .unwrap();
        }

        let rows = f.engine.usage_history(card.id, f.parent, 0, 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].amount, Money::from_minor(3_000));
        assert_eq!(rows[1].amount, Money::from_minor(2_000));
    }
}
