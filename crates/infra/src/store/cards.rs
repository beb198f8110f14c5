//! Prepaid-card store: cards plus their charge/usage rows.
//!
//! Mirrors the account store: a card's balance write commits together with
//! its charge or usage row under one write lock.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use famledger_core::{CardId, DomainError, DomainResult, ExpectedVersion, UserId};
use famledger_cards::{CardCharge, CardUsage, PrepaidCard};

#[derive(Debug, Default)]
struct CardState {
    cards: HashMap<CardId, PrepaidCard>,
    /// card_number → id (uniqueness index).
    numbers: HashMap<String, CardId>,
    charges: HashMap<CardId, Vec<CardCharge>>,
    usages: HashMap<CardId, Vec<CardUsage>>,
    /// Approval-number uniqueness index.
    approvals: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct CardStore {
    inner: RwLock<CardState>,
}

impl CardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_card(&self, card: PrepaidCard) -> DomainResult<PrepaidCard> {
        let mut state = self.inner.write().map_err(|_| super::poisoned())?;

        if state.numbers.contains_key(&card.card_number) {
            return Err(DomainError::already_exists(format!(
                "card number {}",
                card.card_number
            )));
        }
        if state.cards.contains_key(&card.id) {
            return Err(DomainError::already_exists(format!("card {}", card.id)));
        }

        state.numbers.insert(card.card_number.clone(), card.id);
        state.charges.insert(card.id, Vec::new());
        state.usages.insert(card.id, Vec::new());
        state.cards.insert(card.id, card.clone());
        Ok(card)
    }

    pub fn get_card(&self, id: CardId) -> DomainResult<PrepaidCard> {
        let state = self.inner.read().map_err(|_| super::poisoned())?;
        state
            .cards
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("card {id}")))
    }

    /// Cards held by a child or managed by a parent.
    pub fn cards_for_user(&self, user: UserId) -> DomainResult<Vec<PrepaidCard>> {
        let state = self.inner.read().map_err(|_| super::poisoned())?;
        let mut cards: Vec<PrepaidCard> = state
            .cards
            .values()
            .filter(|c| c.child_id == user || c.parent_id == user)
            .cloned()
            .collect();
        cards.sort_by_key(|c| c.created_at);
        Ok(cards)
    }

    /// Write back a mutated card (status/settings changes without a row).
    pub fn update_card(
        &self,
        card: PrepaidCard,
        expected: ExpectedVersion,
    ) -> DomainResult<PrepaidCard> {
        let mut state = self.inner.write().map_err(|_| super::poisoned())?;
        let current = state
            .cards
            .get(&card.id)
            .ok_or_else(|| DomainError::not_found(format!("card {}", card.id)))?
            .version;

        if !expected.matches(current) {
            return Err(DomainError::conflict(format!(
                "card {} expected {expected:?}, found {current}",
                card.id
            )));
        }

        let mut stored = card;
        stored.version = current + 1;
        state.cards.insert(stored.id, stored.clone());
        Ok(stored)
    }

    /// Atomically write the topped-up balance and append its charge row.
    pub fn commit_charge(
        &self,
        card: PrepaidCard,
        expected: ExpectedVersion,
        charge: CardCharge,
    ) -> DomainResult<(PrepaidCard, CardCharge)> {
        if charge.card_id != card.id {
            return Err(DomainError::validation("charge targets a different card"));
        }

        let mut state = self.inner.write().map_err(|_| super::poisoned())?;
        let current = state
            .cards
            .get(&card.id)
            .ok_or_else(|| DomainError::not_found(format!("card {}", card.id)))?
            .version;

        if !expected.matches(current) {
            return Err(DomainError::conflict(format!(
                "card {} expected {expected:?}, found {current}",
                card.id
            )));
        }

        let mut stored = card;
        stored.version = current + 1;
        state.charges.entry(stored.id).or_default().push(charge.clone());
        state.cards.insert(stored.id, stored.clone());
        Ok((stored, charge))
    }

    /// Atomically write the spent-down balance and append its usage row.
    ///
    /// Fails with `AlreadyExists` on an approval-number collision (caller
    /// regenerates and retries).
    pub fn commit_usage(
        &self,
        card: PrepaidCard,
        expected: ExpectedVersion,
        usage: CardUsage,
    ) -> DomainResult<(PrepaidCard, CardUsage)> {
        if usage.card_id != card.id {
            return Err(DomainError::validation("usage targets a different card"));
        }

        let mut state = self.inner.write().map_err(|_| super::poisoned())?;
        let current = state
            .cards
            .get(&card.id)
            .ok_or_else(|| DomainError::not_found(format!("card {}", card.id)))?
            .version;

        if !expected.matches(current) {
            return Err(DomainError::conflict(format!(
                "card {} expected {expected:?}, found {current}",
                card.id
            )));
        }
        if state.approvals.contains(&usage.approval_number) {
            return Err(DomainError::already_exists(format!(
                "approval number {}",
                usage.approval_number
            )));
        }

        let mut stored = card;
        stored.version = current + 1;
        state.approvals.insert(usage.approval_number.clone());
        state.usages.entry(stored.id).or_default().push(usage.clone());
        state.cards.insert(stored.id, stored.clone());
        Ok((stored, usage))
    }

    pub fn charges_for(&self, id: CardId) -> DomainResult<Vec<CardCharge>> {
        let state = self.inner.read().map_err(|_| super::poisoned())?;
        if !state.cards.contains_key(&id) {
            return Err(DomainError::not_found(format!("card {id}")));
        }
        Ok(state.charges.get(&id).cloned().unwrap_or_default())
    }

    pub fn usages_for(&self, id: CardId) -> DomainResult<Vec<CardUsage>> {
        let state = self.inner.read().map_err(|_| super::poisoned())?;
        if !state.cards.contains_key(&id) {
            return Err(DomainError::not_found(format!("card {id}")));
        }
        Ok(state.usages.get(&id).cloned().unwrap_or_default())
    }
}
