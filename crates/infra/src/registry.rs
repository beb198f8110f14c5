//! Membership registry service: invitations, role checks, lifecycle.
//!
//! Orchestration only: load, run the pure domain state machine, persist,
//! notify. All dependencies are constructor-injected.

use std::sync::Arc;

use famledger_core::{
    AccountId, Clock, DomainError, DomainResult, ExpectedVersion, MembershipId, UserId,
};
use famledger_membership::{Capability, Membership, MembershipStatus, Role, RolePolicy};
use famledger_notify::{Notification, NotificationKind, NotificationSink};

use crate::store::{LedgerStore, MembershipStore};

/// Who is being invited.
#[derive(Debug, Clone)]
pub enum Invitee {
    /// No account in the system yet; identified by name + phone until the
    /// invite is redeemed.
    Unresolved { name: String, phone: String },
    /// An existing user, pending their acceptance.
    User { id: UserId, name: String },
}

pub struct MembershipRegistry {
    accounts: Arc<LedgerStore>,
    memberships: Arc<MembershipStore>,
    policy: RolePolicy,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl MembershipRegistry {
    pub fn new(
        accounts: Arc<LedgerStore>,
        memberships: Arc<MembershipStore>,
        policy: RolePolicy,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            accounts,
            memberships,
            policy,
            notifier,
            clock,
        }
    }

    /// Whether `user` holds an Active membership on `account` granting
    /// `capability`. Absence of a membership (or a non-Active one) is a
    /// plain `false`, never an error.
    pub fn authorize(
        &self,
        account: AccountId,
        user: UserId,
        capability: Capability,
    ) -> DomainResult<bool> {
        Ok(self
            .memberships
            .find_active(account, user)?
            .is_some_and(|m| self.policy.allows(m.role, capability)))
    }

    /// The Active membership of `user` on `account`, or `PermissionDenied`
    /// when it is missing or its role lacks `capability`.
    pub fn require(
        &self,
        account: AccountId,
        user: UserId,
        capability: Capability,
    ) -> DomainResult<Membership> {
        let membership = self
            .memberships
            .find_active(account, user)?
            .ok_or_else(|| {
                DomainError::permission_denied(format!("no active membership on account {account}"))
            })?;
        if !self.policy.allows(membership.role, capability) {
            return Err(DomainError::permission_denied(format!(
                "role {:?} lacks {capability:?}",
                membership.role
            )));
        }
        Ok(membership)
    }

    /// Invite someone onto the account with the given role.
    pub fn invite(
        &self,
        account_id: AccountId,
        actor: UserId,
        invitee: Invitee,
        role: Role,
    ) -> DomainResult<Membership> {
        self.accounts.get_account(account_id)?;
        self.require(account_id, actor, Capability::ManageMembers)?;
        let now = self.clock.now();

        let membership = match invitee {
            Invitee::Unresolved { name, phone } => {
                Membership::invite_unresolved(account_id, actor, name, phone, role, now)
            }
            Invitee::User { id, name } => {
                if self.memberships.find_live(account_id, id)?.is_some() {
                    return Err(DomainError::already_exists(format!(
                        "user {id} already has a live membership on account {account_id}"
                    )));
                }
                Membership::invite_user(account_id, actor, id, name, role, now)
            }
        };

        let membership = self.memberships.insert(membership)?;
        tracing::info!(
            account = %account_id,
            membership = %membership.id,
            role = ?role,
            "membership invited"
        );

        if let Some(user) = membership.user_id {
            self.notifier.deliver(Notification {
                recipient_id: user,
                kind: NotificationKind::InviteReceived,
                title: "Account invitation".to_string(),
                body: format!("You were invited to shared account {account_id}"),
                related_entity: Some(membership.id.to_string()),
            });
        }

        Ok(membership)
    }

    /// Redeem an invite token: bind the user, activate the membership and
    /// create the reciprocal record on the accepting user's own account.
    pub fn accept_invite(
        &self,
        membership_id: MembershipId,
        user: UserId,
        token: &str,
    ) -> DomainResult<Membership> {
        let mut membership = self.memberships.get(membership_id)?;
        let version = membership.version;
        let now = self.clock.now();

        membership.accept(user, token, now)?;
        let membership = self
            .memberships
            .update(membership, ExpectedVersion::Exact(version))?;

        tracing::info!(
            account = %membership.account_id,
            membership = %membership.id,
            "invite accepted"
        );

        self.create_reciprocal(&membership, user, now);

        self.notifier.deliver(Notification {
            recipient_id: membership.invited_by,
            kind: NotificationKind::InviteAccepted,
            title: "Invitation accepted".to_string(),
            body: format!("{} joined account {}", membership.invitee_name, membership.account_id),
            related_entity: Some(membership.id.to_string()),
        });

        Ok(membership)
    }

    /// Symmetric family-graph convenience: when U accepts A's invite, A gets
    /// an Active Member-role membership on the first account U created where
    /// A holds no live membership. The role is fixed, not independently
    /// chosen.
    fn create_reciprocal(&self, accepted: &Membership, user: UserId, now: chrono::DateTime<chrono::Utc>) {
        let inviter = accepted.invited_by;
        if inviter == user {
            return;
        }
        let Ok(own_accounts) = self.accounts.accounts_created_by(user) else {
            return;
        };
        for account in own_accounts {
            match self.memberships.find_live(account.id, inviter) {
                Ok(Some(_)) => continue,
                Ok(None) => {
                    let reciprocal = Membership::new_active(
                        account.id,
                        inviter,
                        "family member",
                        Role::Member,
                        now,
                    );
                    // Best-effort: a race losing to a concurrent insert just
                    // means the reciprocal record already exists.
                    if let Ok(created) = self.memberships.insert(reciprocal) {
                        tracing::info!(
                            account = %account.id,
                            membership = %created.id,
                            "reciprocal membership created"
                        );
                    }
                    return;
                }
                Err(_) => return,
            }
        }
    }

    /// Decline an invite.
    pub fn reject_invite(
        &self,
        membership_id: MembershipId,
        user: UserId,
        token: &str,
    ) -> DomainResult<Membership> {
        let mut membership = self.memberships.get(membership_id)?;
        let version = membership.version;
        membership.reject(user, token)?;
        self.memberships
            .update(membership, ExpectedVersion::Exact(version))
    }

    /// Administratively suspend an active member.
    pub fn suspend_member(
        &self,
        account_id: AccountId,
        actor: UserId,
        member_user: UserId,
    ) -> DomainResult<Membership> {
        self.require(account_id, actor, Capability::ManageMembers)?;
        let mut membership = self.active_membership_of(account_id, member_user)?;
        self.guard_last_admin(account_id, &membership)?;

        let version = membership.version;
        membership.suspend()?;
        let membership = self
            .memberships
            .update(membership, ExpectedVersion::Exact(version))?;
        tracing::info!(account = %account_id, member = %member_user, "membership suspended");
        Ok(membership)
    }

    /// Remove a member from the account (marks the record Left).
    pub fn remove_member(
        &self,
        account_id: AccountId,
        actor: UserId,
        member_user: UserId,
    ) -> DomainResult<Membership> {
        self.require(account_id, actor, Capability::ManageMembers)?;
        let mut membership = self.active_membership_of(account_id, member_user)?;
        self.guard_last_admin(account_id, &membership)?;

        let version = membership.version;
        membership.leave()?;
        let membership = self
            .memberships
            .update(membership, ExpectedVersion::Exact(version))?;
        tracing::info!(account = %account_id, member = %member_user, "membership removed");
        Ok(membership)
    }

    /// A member voluntarily leaves.
    pub fn leave(&self, account_id: AccountId, user: UserId) -> DomainResult<Membership> {
        let mut membership = self.active_membership_of(account_id, user)?;
        self.guard_last_admin(account_id, &membership)?;

        let version = membership.version;
        membership.leave()?;
        self.memberships
            .update(membership, ExpectedVersion::Exact(version))
    }

    pub fn members_of(&self, account_id: AccountId) -> DomainResult<Vec<Membership>> {
        self.accounts.get_account(account_id)?;
        self.memberships.for_account(account_id)
    }

    fn active_membership_of(
        &self,
        account_id: AccountId,
        user: UserId,
    ) -> DomainResult<Membership> {
        self.memberships
            .find_active(account_id, user)?
            .ok_or_else(|| {
                DomainError::not_found(format!(
                    "no active membership for user {user} on account {account_id}"
                ))
            })
    }

    /// Taking the last Active Admin off an account would leave it
    /// permanently unmanageable.
    fn guard_last_admin(&self, account_id: AccountId, target: &Membership) -> DomainResult<()> {
        if target.role == Role::Admin
            && target.status == MembershipStatus::Active
            && self.memberships.count_active_admins(account_id)? <= 1
        {
            return Err(DomainError::invalid_state(
                "cannot remove the last admin of an account",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use famledger_core::FixedClock;
    use famledger_ledger::{account_number, Account};
    use famledger_notify::InMemorySink;
    use chrono::{TimeZone, Utc};

    struct Fixture {
        registry: MembershipRegistry,
        accounts: Arc<LedgerStore>,
        memberships: Arc<MembershipStore>,
        sink: Arc<InMemorySink>,
        clock: Arc<FixedClock>,
    }

    fn fixture() -> Fixture {
        let accounts = Arc::new(LedgerStore::new());
        let memberships = Arc::new(MembershipStore::new());
        let sink = Arc::new(InMemorySink::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 4, 1, 10, 0, 0).unwrap(),
        ));
        let registry = MembershipRegistry::new(
            accounts.clone(),
            memberships.clone(),
            RolePolicy::standard(),
            sink.clone(),
            clock.clone(),
        );
        Fixture {
            registry,
            accounts,
            memberships,
            sink,
            clock,
        }
    }

    /// Create an account with `owner` as its Active Admin.
    fn seed_account(f: &Fixture, owner: UserId, name: &str) -> Account {
        let account = Account::open(
            account_number(),
            name,
            None,
            owner,
            f.clock.now(),
        )
        .unwrap();
        let account = f.accounts.insert_account(account).unwrap();
        f.memberships
            .insert(Membership::new_active(
                account.id,
                owner,
                "owner",
                Role::Admin,
                f.clock.now(),
            ))
            .unwrap();
        account
    }

    #[test]
    fn invite_requires_manage_members() {
        let f = fixture();
        let owner = UserId::new();
        let account = seed_account(&f, owner, "family");

        // A Viewer cannot invite.
        let viewer = UserId::new();
        f.memberships
            .insert(Membership::new_active(
                account.id,
                viewer,
                "viewer",
                Role::Viewer,
                f.clock.now(),
            ))
            .unwrap();

        let err = f
            .registry
            .invite(
                account.id,
                viewer,
                Invitee::User {
                    id: UserId::new(),
                    name: "X".to_string(),
                },
                Role::Member,
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::PermissionDenied(_)));

        // The owner can.
        let m = f
            .registry
            .invite(
                account.id,
                owner,
                Invitee::User {
                    id: UserId::new(),
                    name: "Jin".to_string(),
                },
                Role::Member,
            )
            .unwrap();
        assert_eq!(m.status, MembershipStatus::Pending);
    }

    #[test]
    fn inviting_an_existing_live_member_is_rejected() {
        let f = fixture();
        let owner = UserId::new();
        let account = seed_account(&f, owner, "family");
        let invitee = UserId::new();

        f.registry
            .invite(
                account.id,
                owner,
                Invitee::User {
                    id: invitee,
                    name: "Jin".to_string(),
                },
                Role::Member,
            )
            .unwrap();

        let err = f
            .registry
            .invite(
                account.id,
                owner,
                Invitee::User {
                    id: invitee,
                    name: "Jin".to_string(),
                },
                Role::Member,
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyExists(_)));
    }

    #[test]
    fn accept_invite_activates_and_notifies_inviter() {
        let f = fixture();
        let owner = UserId::new();
        let account = seed_account(&f, owner, "family");
        let invitee = UserId::new();

        let m = f
            .registry
            .invite(
                account.id,
                owner,
                Invitee::User {
                    id: invitee,
                    name: "Jin".to_string(),
                },
                Role::Member,
            )
            .unwrap();
        f.sink.take();

        let accepted = f
            .registry
            .accept_invite(m.id, invitee, &m.invite_token)
            .unwrap();
        assert_eq!(accepted.status, MembershipStatus::Active);
        assert_eq!(accepted.joined_at, Some(f.clock.now()));

        let sent = f.sink.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::InviteAccepted);
        assert_eq!(sent[0].recipient_id, owner);
    }

    #[test]
    fn accept_twice_fails_with_invalid_state() {
        let f = fixture();
        let owner = UserId::new();
        let account = seed_account(&f, owner, "family");
        let invitee = UserId::new();

        let m = f
            .registry
            .invite(
                account.id,
                owner,
                Invitee::User {
                    id: invitee,
                    name: "Jin".to_string(),
                },
                Role::Member,
            )
            .unwrap();

        f.registry
            .accept_invite(m.id, invitee, &m.invite_token)
            .unwrap();
        let err = f
            .registry
            .accept_invite(m.id, invitee, &m.invite_token)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn expired_invite_cannot_be_accepted() {
        let f = fixture();
        let owner = UserId::new();
        let account = seed_account(&f, owner, "family");
        let invitee = UserId::new();

        let m = f
            .registry
            .invite(
                account.id,
                owner,
                Invitee::User {
                    id: invitee,
                    name: "Jin".to_string(),
                },
                Role::Member,
            )
            .unwrap();

        f.clock.advance(chrono::Duration::days(8));
        let err = f
            .registry
            .accept_invite(m.id, invitee, &m.invite_token)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn acceptance_creates_reciprocal_membership_on_accepters_account() {
        let f = fixture();
        let owner = UserId::new();
        let account = seed_account(&f, owner, "parents");

        // The invitee has an account of their own.
        let invitee = UserId::new();
        let own_account = seed_account(&f, invitee, "mine");

        let m = f
            .registry
            .invite(
                account.id,
                owner,
                Invitee::User {
                    id: invitee,
                    name: "Jin".to_string(),
                },
                Role::Member,
            )
            .unwrap();
        f.registry
            .accept_invite(m.id, invitee, &m.invite_token)
            .unwrap();

        // The inviter now holds an Active Member membership back on the
        // accepting user's account (role fixed, not chosen).
        let reciprocal = f
            .memberships
            .find_active(own_account.id, owner)
            .unwrap()
            .expect("reciprocal membership");
        assert_eq!(reciprocal.role, Role::Member);
    }

    #[test]
    fn unresolved_invite_binds_redeeming_user() {
        let f = fixture();
        let owner = UserId::new();
        let account = seed_account(&f, owner, "family");

        let m = f
            .registry
            .invite(
                account.id,
                owner,
                Invitee::Unresolved {
                    name: "Grandma".to_string(),
                    phone: "010-9999-0000".to_string(),
                },
                Role::Viewer,
            )
            .unwrap();
        assert!(m.user_id.is_none());
        // No notification possible for an unresolved invitee.
        assert!(f.sink.take().is_empty());

        let redeemer = UserId::new();
        let accepted = f
            .registry
            .accept_invite(m.id, redeemer, &m.invite_token)
            .unwrap();
        assert_eq!(accepted.user_id, Some(redeemer));
    }

    #[test]
    fn last_admin_cannot_be_removed_or_leave() {
        let f = fixture();
        let owner = UserId::new();
        let account = seed_account(&f, owner, "family");

        let err = f.registry.leave(account.id, owner).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));

        // With a second admin, leaving works.
        let second = UserId::new();
        f.memberships
            .insert(Membership::new_active(
                account.id,
                second,
                "co-admin",
                Role::Admin,
                f.clock.now(),
            ))
            .unwrap();
        f.registry.leave(account.id, owner).unwrap();
    }

    #[test]
    fn suspend_member_requires_manage_members_and_active_target() {
        let f = fixture();
        let owner = UserId::new();
        let account = seed_account(&f, owner, "family");
        let member = UserId::new();
        f.memberships
            .insert(Membership::new_active(
                account.id,
                member,
                "kid",
                Role::Member,
                f.clock.now(),
            ))
            .unwrap();

        let suspended = f
            .registry
            .suspend_member(account.id, owner, member)
            .unwrap();
        assert_eq!(suspended.status, MembershipStatus::Suspended);

        // Suspended member no longer authorizes.
        assert!(!f
            .registry
            .authorize(account.id, member, Capability::View)
            .unwrap());

        // Suspending again: no active membership to act on.
        let err = f
            .registry
            .suspend_member(account.id, owner, member)
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn authorize_is_false_never_error_for_strangers() {
        let f = fixture();
        let owner = UserId::new();
        let account = seed_account(&f, owner, "family");

        let stranger = UserId::new();
        assert!(!f
            .registry
            .authorize(account.id, stranger, Capability::View)
            .unwrap());
        assert!(f
            .registry
            .authorize(account.id, owner, Capability::DeleteAccount)
            .unwrap());
    }
}
