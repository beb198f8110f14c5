//! Account + transaction store.
//!
//! Accounts and their ledger rows live under a single `RwLock` so a balance
//! write and its row append commit atomically with respect to readers.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use famledger_core::{AccountId, DomainError, DomainResult, ExpectedVersion, UserId};
use famledger_ledger::{Account, Transaction};

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<AccountId, Account>,
    /// account_number → id (uniqueness index).
    numbers: HashMap<String, AccountId>,
    /// Append-only rows per account, in commit order.
    rows: HashMap<AccountId, Vec<Transaction>>,
    /// Reference-number uniqueness index.
    references: HashSet<String>,
}

/// In-memory account/ledger repository.
#[derive(Debug, Default)]
pub struct LedgerStore {
    inner: RwLock<LedgerState>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly opened account.
    ///
    /// Fails with `AlreadyExists` when the generated account number
    /// collides; callers retry with a new candidate.
    pub fn insert_account(&self, account: Account) -> DomainResult<Account> {
        let mut state = self.inner.write().map_err(|_| super::poisoned())?;

        if state.numbers.contains_key(&account.account_number) {
            return Err(DomainError::already_exists(format!(
                "account number {}",
                account.account_number
            )));
        }
        if state.accounts.contains_key(&account.id) {
            return Err(DomainError::already_exists(format!("account {}", account.id)));
        }

        state
            .numbers
            .insert(account.account_number.clone(), account.id);
        state.rows.insert(account.id, Vec::new());
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    pub fn get_account(&self, id: AccountId) -> DomainResult<Account> {
        let state = self.inner.read().map_err(|_| super::poisoned())?;
        state
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("account {id}")))
    }

    pub fn find_by_number(&self, number: &str) -> DomainResult<Option<Account>> {
        let state = self.inner.read().map_err(|_| super::poisoned())?;
        Ok(state
            .numbers
            .get(number)
            .and_then(|id| state.accounts.get(id))
            .cloned())
    }

    /// Accounts created by `user`, oldest first.
    pub fn accounts_created_by(&self, user: UserId) -> DomainResult<Vec<Account>> {
        let state = self.inner.read().map_err(|_| super::poisoned())?;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| a.created_by == user)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    /// Write back a mutated account (settings/status changes without a row).
    pub fn update_account(
        &self,
        account: Account,
        expected: ExpectedVersion,
    ) -> DomainResult<Account> {
        let mut state = self.inner.write().map_err(|_| super::poisoned())?;
        let current = state
            .accounts
            .get(&account.id)
            .ok_or_else(|| DomainError::not_found(format!("account {}", account.id)))?
            .version;

        if !expected.matches(current) {
            return Err(DomainError::conflict(format!(
                "account {} expected {expected:?}, found {current}",
                account.id
            )));
        }

        let mut stored = account;
        stored.version = current + 1;
        state.accounts.insert(stored.id, stored.clone());
        Ok(stored)
    }

    /// Atomically write the mutated balance and append its ledger row.
    ///
    /// Readers holding the store's read lock see either both or neither.
    /// Fails with `AlreadyExists` on a reference-number collision (caller
    /// regenerates and retries) and `Conflict` on a stale version.
    pub fn commit(
        &self,
        account: Account,
        expected: ExpectedVersion,
        row: Transaction,
    ) -> DomainResult<(Account, Transaction)> {
        if row.account_id != account.id {
            return Err(DomainError::validation(
                "transaction row targets a different account",
            ));
        }

        let mut state = self.inner.write().map_err(|_| super::poisoned())?;
        let current = state
            .accounts
            .get(&account.id)
            .ok_or_else(|| DomainError::not_found(format!("account {}", account.id)))?
            .version;

        if !expected.matches(current) {
            return Err(DomainError::conflict(format!(
                "account {} expected {expected:?}, found {current}",
                account.id
            )));
        }
        if state.references.contains(&row.reference) {
            return Err(DomainError::already_exists(format!(
                "transaction reference {}",
                row.reference
            )));
        }

        let mut stored = account;
        stored.version = current + 1;
        state.references.insert(row.reference.clone());
        state.rows.entry(stored.id).or_default().push(row.clone());
        state.accounts.insert(stored.id, stored.clone());
        Ok((stored, row))
    }

    /// All rows for an account in commit (chronological) order.
    pub fn rows_for(&self, id: AccountId) -> DomainResult<Vec<Transaction>> {
        let state = self.inner.read().map_err(|_| super::poisoned())?;
        if !state.accounts.contains_key(&id) {
            return Err(DomainError::not_found(format!("account {id}")));
        }
        Ok(state.rows.get(&id).cloned().unwrap_or_default())
    }
}
