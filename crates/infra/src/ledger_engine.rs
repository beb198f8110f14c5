//! Group-account ledger engine.
//!
//! Every balance mutation runs under the account's serializing lock and
//! commits the new balance together with its immutable transaction row. The
//! store's version check backs the lock up; a conflict there means a writer
//! bypassed the lock discipline and must not win.

use std::sync::Arc;

use famledger_core::{AccountId, Clock, DomainError, DomainResult, ExpectedVersion, Money, UserId};
use famledger_ledger::{
    account_number, reference_number, Account, Counterparty, Transaction, TransactionStatus,
    TransactionType,
};
use famledger_membership::{Capability, Membership, Role, RolePolicy};
use famledger_notify::{Notification, NotificationKind, NotificationSink};

use crate::locks::{hold, LockRegistry};
use crate::store::{LedgerStore, MembershipStore};

/// Attempts at a fresh generated number before giving up on a collision.
const NUMBER_RETRIES: usize = 5;

/// Aggregates over an account's completed rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountStats {
    pub balance: Money,
    pub total_deposited: Money,
    pub total_withdrawn: Money,
    pub transaction_count: usize,
}

pub struct LedgerEngine {
    accounts: Arc<LedgerStore>,
    memberships: Arc<MembershipStore>,
    policy: RolePolicy,
    locks: Arc<LockRegistry>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    /// Completed transactions at or above this amount notify the account
    /// creator. `None` disables the signal.
    large_tx_threshold: Option<Money>,
}

impl LedgerEngine {
    pub fn new(
        accounts: Arc<LedgerStore>,
        memberships: Arc<MembershipStore>,
        policy: RolePolicy,
        locks: Arc<LockRegistry>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        large_tx_threshold: Option<Money>,
    ) -> Self {
        Self {
            accounts,
            memberships,
            policy,
            locks,
            notifier,
            clock,
            large_tx_threshold,
        }
    }

    /// Open a new group account. The creator becomes its first Admin.
    pub fn open_account(
        &self,
        creator: UserId,
        name: &str,
        purpose: Option<String>,
    ) -> DomainResult<(Account, Membership)> {
        let now = self.clock.now();
        let account = self.insert_with_fresh_number(name, purpose, creator, now)?;

        let membership = self.memberships.insert(Membership::new_active(
            account.id,
            creator,
            name,
            Role::Admin,
            now,
        ))?;

        tracing::info!(
            account = %account.id,
            number = %account.account_number,
            "account opened"
        );
        Ok((account, membership))
    }

    /// Credit the account and append the deposit row.
    ///
    /// Any active member may deposit, whatever their role; the amount is
    /// also added to the member's running contribution total. `source`
    /// describes where the money came from (the member's own bank account,
    /// typically) and lands on the row as its counterparty.
    pub fn deposit(
        &self,
        account_id: AccountId,
        actor: UserId,
        amount: Money,
        source: Option<Counterparty>,
        note: Option<String>,
    ) -> DomainResult<(Account, Transaction)> {
        if !amount.is_positive() {
            return Err(DomainError::validation("deposit amount must be positive"));
        }
        let membership = self.active_membership(account_id, actor)?;

        let lock = self.locks.target_lock((account_id).into());
        let _guard = hold(&lock);

        let mut account = self.accounts.get_account(account_id)?;
        account.ensure_active()?;
        let expected = ExpectedVersion::Exact(account.version);
        let balance_after = account.credit(amount)?;

        let (account, row) = self.commit_with_fresh_reference(
            account,
            expected,
            actor,
            TransactionType::Deposit,
            amount,
            balance_after,
            source,
            note,
        )?;

        // The row is already committed; the contribution bookkeeping must
        // never fail the deposit after that point. The store update is
        // saturating, and a membership that vanished mid-flight is only
        // logged.
        if let Err(err) = self.memberships.add_contribution(membership.id, amount) {
            tracing::warn!(
                membership = %membership.id,
                error = %err,
                "contribution total not updated"
            );
        }

        self.signal_large_transaction(&account, &row);
        tracing::info!(
            account = %account_id,
            reference = %row.reference,
            amount = %amount,
            "deposit committed"
        );
        Ok((account, row))
    }

    /// Debit the account and append the withdrawal row.
    ///
    /// Requires the Withdraw capability and, when the account has an access
    /// code configured, the matching code. On any failure the balance is
    /// untouched and no row is written.
    pub fn withdraw(
        &self,
        account_id: AccountId,
        actor: UserId,
        amount: Money,
        access_code: Option<&str>,
        counterparty: Option<Counterparty>,
        note: Option<String>,
    ) -> DomainResult<(Account, Transaction)> {
        if !amount.is_positive() {
            return Err(DomainError::validation(
                "withdrawal amount must be positive",
            ));
        }
        self.require(account_id, actor, Capability::Withdraw)?;

        let lock = self.locks.target_lock(account_id.into());
        let _guard = hold(&lock);

        let mut account = self.accounts.get_account(account_id)?;
        account.ensure_active()?;
        account.verify_access_code(access_code)?;
        let expected = ExpectedVersion::Exact(account.version);
        let balance_after = account.debit(amount)?;

        let (account, row) = self.commit_with_fresh_reference(
            account,
            expected,
            actor,
            TransactionType::Withdrawal,
            amount,
            balance_after,
            counterparty,
            note,
        )?;

        self.signal_large_transaction(&account, &row);
        tracing::info!(
            account = %account_id,
            reference = %row.reference,
            amount = %amount,
            "withdrawal committed"
        );
        Ok((account, row))
    }

    pub fn account(&self, account_id: AccountId, actor: UserId) -> DomainResult<Account> {
        self.require(account_id, actor, Capability::View)?;
        self.accounts.get_account(account_id)
    }

    /// A page of the account's history, newest first.
    pub fn history(
        &self,
        account_id: AccountId,
        actor: UserId,
        offset: usize,
        limit: usize,
    ) -> DomainResult<Vec<Transaction>> {
        self.require(account_id, actor, Capability::ViewTransactions)?;
        let rows = self.accounts.rows_for(account_id)?;
        Ok(rows
            .into_iter()
            .rev()
            .skip(offset)
            .take(limit)
            .collect())
    }

    /// Balance and lifetime totals, summed from Completed rows only.
    pub fn stats(&self, account_id: AccountId, actor: UserId) -> DomainResult<AccountStats> {
        self.require(account_id, actor, Capability::View)?;
        let account = self.accounts.get_account(account_id)?;
        let rows = self.accounts.rows_for(account_id)?;

        let completed = rows
            .iter()
            .filter(|r| r.status == TransactionStatus::Completed);
        let mut total_deposited = Money::ZERO;
        let mut total_withdrawn = Money::ZERO;
        let mut transaction_count = 0usize;
        for row in completed {
            transaction_count += 1;
            if row.tx_type.is_credit() {
                total_deposited = total_deposited.checked_add(row.amount)?;
            } else {
                total_withdrawn = total_withdrawn.checked_add(row.amount)?;
            }
        }

        Ok(AccountStats {
            balance: account.balance,
            total_deposited,
            total_withdrawn,
            transaction_count,
        })
    }

    /// Set or clear the withdrawal access code.
    pub fn set_access_code(
        &self,
        account_id: AccountId,
        actor: UserId,
        code: Option<String>,
    ) -> DomainResult<Account> {
        self.require(account_id, actor, Capability::ManageSettings)?;

        let lock = self.locks.target_lock(account_id.into());
        let _guard = hold(&lock);

        let mut account = self.accounts.get_account(account_id)?;
        let expected = ExpectedVersion::Exact(account.version);
        account.set_access_code(code)?;
        self.accounts.update_account(account, expected)
    }

    pub fn set_auto_transfer_day(
        &self,
        account_id: AccountId,
        actor: UserId,
        day: Option<u8>,
    ) -> DomainResult<Account> {
        self.require(account_id, actor, Capability::ManageSettings)?;

        let lock = self.locks.target_lock(account_id.into());
        let _guard = hold(&lock);

        let mut account = self.accounts.get_account(account_id)?;
        let expected = ExpectedVersion::Exact(account.version);
        account.set_auto_transfer_day(day)?;
        self.accounts.update_account(account, expected)
    }

    pub fn suspend_account(&self, account_id: AccountId, actor: UserId) -> DomainResult<Account> {
        self.require(account_id, actor, Capability::ManageSettings)?;

        let lock = self.locks.target_lock(account_id.into());
        let _guard = hold(&lock);

        let mut account = self.accounts.get_account(account_id)?;
        let expected = ExpectedVersion::Exact(account.version);
        account.suspend()?;
        let account = self.accounts.update_account(account, expected)?;
        tracing::info!(account = %account_id, "account suspended");
        Ok(account)
    }

    /// Close the account. Creator only, and the balance must be withdrawn
    /// to zero first. Holding the DeleteAccount capability is necessary but
    /// not sufficient: a later-invited Admin still cannot close an account
    /// they did not create.
    pub fn close_account(&self, account_id: AccountId, actor: UserId) -> DomainResult<Account> {
        self.require(account_id, actor, Capability::DeleteAccount)?;

        let lock = self.locks.target_lock(account_id.into());
        let _guard = hold(&lock);

        let mut account = self.accounts.get_account(account_id)?;
        if account.created_by != actor {
            return Err(DomainError::permission_denied(
                "only the account creator may close the account",
            ));
        }
        if account.balance != Money::ZERO {
            return Err(DomainError::invalid_state(format!(
                "account still holds {}; withdraw the balance before closing",
                account.balance
            )));
        }
        let expected = ExpectedVersion::Exact(account.version);
        account.close()?;
        let account = self.accounts.update_account(account, expected)?;
        tracing::info!(account = %account_id, "account closed");
        Ok(account)
    }

    fn insert_with_fresh_number(
        &self,
        name: &str,
        purpose: Option<String>,
        creator: UserId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> DomainResult<Account> {
        let mut last = DomainError::conflict("account number generation exhausted");
        for _ in 0..NUMBER_RETRIES {
            let account = Account::open(account_number(), name, purpose.clone(), creator, now)?;
            match self.accounts.insert_account(account) {
                Ok(stored) => return Ok(stored),
                Err(DomainError::AlreadyExists(msg)) => {
                    last = DomainError::AlreadyExists(msg);
                }
                Err(other) => return Err(other),
            }
        }
        Err(last)
    }

    #[allow(clippy::too_many_arguments)]
    fn commit_with_fresh_reference(
        &self,
        account: Account,
        expected: ExpectedVersion,
        actor: UserId,
        tx_type: TransactionType,
        amount: Money,
        balance_after: Money,
        counterparty: Option<Counterparty>,
        note: Option<String>,
    ) -> DomainResult<(Account, Transaction)> {
        let now = self.clock.now();
        let mut last = DomainError::conflict("reference number generation exhausted");
        for _ in 0..NUMBER_RETRIES {
            let row = Transaction::completed(
                account.id,
                actor,
                tx_type,
                amount,
                balance_after,
                counterparty.clone(),
                reference_number(),
                note.clone(),
                now,
            );
            match self.accounts.commit(account.clone(), expected, row) {
                Ok(done) => return Ok(done),
                Err(DomainError::AlreadyExists(msg)) => {
                    last = DomainError::AlreadyExists(msg);
                }
                Err(other) => return Err(other),
            }
        }
        Err(last)
    }

    fn signal_large_transaction(&self, account: &Account, row: &Transaction) {
        let Some(threshold) = self.large_tx_threshold else {
            return;
        };
        if row.amount < threshold {
            return;
        }
        self.notifier.deliver(Notification {
            recipient_id: account.created_by,
            kind: NotificationKind::LargeTransaction,
            title: "Large transaction".to_string(),
            body: format!(
                "{:?} of {} on account {}",
                row.tx_type, row.amount, account.account_number
            ),
            related_entity: Some(row.id.to_string()),
        });
    }

    fn active_membership(&self, account: AccountId, user: UserId) -> DomainResult<Membership> {
        self.memberships.find_active(account, user)?.ok_or_else(|| {
            DomainError::permission_denied(format!("no active membership on account {account}"))
        })
    }

    fn require(
        &self,
        account: AccountId,
        user: UserId,
        capability: Capability,
    ) -> DomainResult<Membership> {
        let membership = self.active_membership(account, user)?;
        if !self.policy.allows(membership.role, capability) {
            return Err(DomainError::permission_denied(format!(
                "role {:?} lacks {capability:?}",
                membership.role
            )));
        }
        Ok(membership)
    }
}
