//! Membership store.
//!
//! Enforces the one-live-membership-per-(account, resolved user) invariant
//! at the storage boundary: both insert and update re-check it, so the
//! invariant holds regardless of which service path mutated the record.

use std::collections::HashMap;
use std::sync::RwLock;

use famledger_core::{
    AccountId, DomainError, DomainResult, ExpectedVersion, MembershipId, Money, UserId,
};
use famledger_membership::{Membership, MembershipStatus, Role};

#[derive(Debug, Default)]
pub struct MembershipStore {
    inner: RwLock<HashMap<MembershipId, Membership>>,
}

impl MembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_duplicate(
        memberships: &HashMap<MembershipId, Membership>,
        candidate: &Membership,
    ) -> bool {
        let Some(user) = candidate.user_id else {
            return false;
        };
        if !candidate.is_live() {
            return false;
        }
        memberships.values().any(|m| {
            m.id != candidate.id
                && m.account_id == candidate.account_id
                && m.user_id == Some(user)
                && m.is_live()
        })
    }

    pub fn insert(&self, membership: Membership) -> DomainResult<Membership> {
        let mut memberships = self.inner.write().map_err(|_| super::poisoned())?;

        if memberships.contains_key(&membership.id) {
            return Err(DomainError::already_exists(format!(
                "membership {}",
                membership.id
            )));
        }
        if Self::live_duplicate(&memberships, &membership) {
            return Err(DomainError::already_exists(format!(
                "user already has a live membership on account {}",
                membership.account_id
            )));
        }

        memberships.insert(membership.id, membership.clone());
        Ok(membership)
    }

    pub fn get(&self, id: MembershipId) -> DomainResult<Membership> {
        let memberships = self.inner.read().map_err(|_| super::poisoned())?;
        memberships
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("membership {id}")))
    }

    pub fn update(
        &self,
        membership: Membership,
        expected: ExpectedVersion,
    ) -> DomainResult<Membership> {
        let mut memberships = self.inner.write().map_err(|_| super::poisoned())?;
        let current = memberships
            .get(&membership.id)
            .ok_or_else(|| DomainError::not_found(format!("membership {}", membership.id)))?
            .version;

        if !expected.matches(current) {
            return Err(DomainError::conflict(format!(
                "membership {} expected {expected:?}, found {current}",
                membership.id
            )));
        }
        if Self::live_duplicate(&memberships, &membership) {
            return Err(DomainError::already_exists(format!(
                "user already has a live membership on account {}",
                membership.account_id
            )));
        }

        let mut stored = membership;
        stored.version = current + 1;
        memberships.insert(stored.id, stored.clone());
        Ok(stored)
    }

    /// Atomically add a completed deposit to a member's contribution total.
    ///
    /// Saturating: the caller's deposit is already committed, so the total
    /// must absorb the amount rather than fail.
    pub fn add_contribution(&self, id: MembershipId, amount: Money) -> DomainResult<Membership> {
        let mut memberships = self.inner.write().map_err(|_| super::poisoned())?;
        let membership = memberships
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("membership {id}")))?;

        membership.record_contribution(amount);
        membership.version += 1;
        Ok(membership.clone())
    }

    /// The Active membership of `user` on `account`, if any.
    pub fn find_active(
        &self,
        account: AccountId,
        user: UserId,
    ) -> DomainResult<Option<Membership>> {
        let memberships = self.inner.read().map_err(|_| super::poisoned())?;
        Ok(memberships
            .values()
            .find(|m| {
                m.account_id == account
                    && m.user_id == Some(user)
                    && m.status == MembershipStatus::Active
            })
            .cloned())
    }

    /// A Pending or Active membership of `user` on `account`, if any.
    pub fn find_live(&self, account: AccountId, user: UserId) -> DomainResult<Option<Membership>> {
        let memberships = self.inner.read().map_err(|_| super::poisoned())?;
        Ok(memberships
            .values()
            .find(|m| m.account_id == account && m.user_id == Some(user) && m.is_live())
            .cloned())
    }

    /// All memberships of an account, oldest invite first.
    pub fn for_account(&self, account: AccountId) -> DomainResult<Vec<Membership>> {
        let memberships = self.inner.read().map_err(|_| super::poisoned())?;
        let mut result: Vec<Membership> = memberships
            .values()
            .filter(|m| m.account_id == account)
            .cloned()
            .collect();
        result.sort_by_key(|m| m.invited_at);
        Ok(result)
    }

    pub fn count_active_admins(&self, account: AccountId) -> DomainResult<usize> {
        let memberships = self.inner.read().map_err(|_| super::poisoned())?;
        Ok(memberships
            .values()
            .filter(|m| {
                m.account_id == account
                    && m.status == MembershipStatus::Active
                    && m.role == Role::Admin
            })
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn second_live_membership_for_same_user_is_rejected() {
        let store = MembershipStore::new();
        let account = AccountId::new();
        let user = UserId::new();

        store
            .insert(Membership::new_active(account, user, "A", Role::Admin, Utc::now()))
            .unwrap();

        let dup = Membership::invite_user(account, user, user, "A again", Role::Member, Utc::now());
        let err = store.insert(dup).unwrap_err();
        assert!(matches!(err, DomainError::AlreadyExists(_)));
    }

    #[test]
    fn left_membership_frees_the_slot() {
        let store = MembershipStore::new();
        let account = AccountId::new();
        let user = UserId::new();

        let mut m = store
            .insert(Membership::new_active(account, user, "A", Role::Member, Utc::now()))
            .unwrap();
        m.leave().unwrap();
        store.update(m, ExpectedVersion::Any).unwrap();

        // Re-inviting the same user now succeeds.
        let again =
            Membership::invite_user(account, user, user, "A again", Role::Member, Utc::now());
        assert!(store.insert(again).is_ok());
    }

    #[test]
    fn contribution_update_is_atomic_and_bumps_version() {
        let store = MembershipStore::new();
        let account = AccountId::new();
        let user = UserId::new();
        let m = store
            .insert(Membership::new_active(account, user, "A", Role::Member, Utc::now()))
            .unwrap();

        let updated = store.add_contribution(m.id, Money::from_minor(10_000)).unwrap();
        assert_eq!(updated.contributed, Money::from_minor(10_000));
        assert_eq!(updated.version, m.version + 1);
    }

    #[test]
    fn stale_update_is_a_conflict() {
        let store = MembershipStore::new();
        let account = AccountId::new();
        let user = UserId::new();
        let m = store
            .insert(Membership::new_active(account, user, "A", Role::Member, Utc::now()))
            .unwrap();

        store.add_contribution(m.id, Money::from_minor(1)).unwrap();

        // `m` still carries the pre-contribution version.
        let err = store
            .update(m.clone(), ExpectedVersion::Exact(m.version))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }
}
