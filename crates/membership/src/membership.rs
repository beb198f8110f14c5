//! Membership entity and its invitation state machine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use famledger_core::{AccountId, DomainError, DomainResult, Entity, MembershipId, Money, UserId};

use crate::role::Role;

/// Invite tokens stay redeemable for this many days.
pub const INVITE_VALIDITY_DAYS: i64 = 7;

/// Membership lifecycle.
///
/// Pending → Active | Rejected; Active → Suspended | Left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Pending,
    Active,
    Rejected,
    Suspended,
    Left,
}

/// The record binding a user (or unresolved invitee) to a group account.
///
/// A Pending membership may have no resolved `user_id` yet: admins can invite
/// by name + phone before the invitee holds an account in the system. The
/// user is bound at acceptance time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub account_id: AccountId,
    pub user_id: Option<UserId>,
    pub invitee_name: String,
    pub invitee_phone: Option<String>,
    pub invited_by: UserId,
    pub role: Role,
    pub status: MembershipStatus,
    /// Cumulative amount this member has deposited into the account.
    pub contributed: Money,
    pub monthly_target: Option<Money>,
    pub invite_token: String,
    pub invite_expires_at: DateTime<Utc>,
    pub invited_at: DateTime<Utc>,
    pub joined_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Membership {
    /// Invite someone who has no resolved user account yet (name + phone).
    pub fn invite_unresolved(
        account_id: AccountId,
        invited_by: UserId,
        invitee_name: impl Into<String>,
        invitee_phone: impl Into<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new_pending(
            account_id,
            invited_by,
            None,
            invitee_name.into(),
            Some(invitee_phone.into()),
            role,
            now,
        )
    }

    /// Invite an existing user (pending their acceptance).
    pub fn invite_user(
        account_id: AccountId,
        invited_by: UserId,
        user_id: UserId,
        invitee_name: impl Into<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new_pending(
            account_id,
            invited_by,
            Some(user_id),
            invitee_name.into(),
            None,
            role,
            now,
        )
    }

    fn new_pending(
        account_id: AccountId,
        invited_by: UserId,
        user_id: Option<UserId>,
        invitee_name: String,
        invitee_phone: Option<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MembershipId::new(),
            account_id,
            user_id,
            invitee_name,
            invitee_phone,
            invited_by,
            role,
            status: MembershipStatus::Pending,
            contributed: Money::ZERO,
            monthly_target: None,
            invite_token: fresh_token(),
            invite_expires_at: now + Duration::days(INVITE_VALIDITY_DAYS),
            invited_at: now,
            joined_at: None,
            version: 0,
        }
    }

    /// A membership created directly Active, skipping the invite handshake.
    ///
    /// Used for the account creator's Admin membership and for the reciprocal
    /// record inserted on invite acceptance.
    pub fn new_active(
        account_id: AccountId,
        user_id: UserId,
        display_name: impl Into<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MembershipId::new(),
            account_id,
            user_id: Some(user_id),
            invitee_name: display_name.into(),
            invitee_phone: None,
            invited_by: user_id,
            role,
            status: MembershipStatus::Active,
            contributed: Money::ZERO,
            monthly_target: None,
            invite_token: fresh_token(),
            invite_expires_at: now,
            invited_at: now,
            joined_at: Some(now),
            version: 0,
        }
    }

    /// Whether this record still occupies the (account, user) slot.
    ///
    /// Pending and Active memberships block a second invite for the same
    /// resolved user; Rejected/Suspended/Left do not.
    pub fn is_live(&self) -> bool {
        matches!(
            self.status,
            MembershipStatus::Pending | MembershipStatus::Active
        )
    }

    /// Accept the invite: bind the user, stamp the join time, go Active.
    pub fn accept(
        &mut self,
        user: UserId,
        token: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != MembershipStatus::Pending {
            return Err(DomainError::invalid_state(format!(
                "invite is not pending (status {:?})",
                self.status
            )));
        }
        if let Some(bound) = self.user_id {
            if bound != user {
                return Err(DomainError::permission_denied(
                    "invite is addressed to another user",
                ));
            }
        }
        if self.invite_token != token {
            return Err(DomainError::invalid_state("invite token mismatch"));
        }
        if now > self.invite_expires_at {
            return Err(DomainError::invalid_state("invite token expired"));
        }

        self.user_id = Some(user);
        self.status = MembershipStatus::Active;
        self.joined_at = Some(now);
        Ok(())
    }

    /// Decline the invite.
    pub fn reject(&mut self, user: UserId, token: &str) -> DomainResult<()> {
        if self.status != MembershipStatus::Pending {
            return Err(DomainError::invalid_state(format!(
                "invite is not pending (status {:?})",
                self.status
            )));
        }
        if let Some(bound) = self.user_id {
            if bound != user {
                return Err(DomainError::permission_denied(
                    "invite is addressed to another user",
                ));
            }
        }
        if self.invite_token != token {
            return Err(DomainError::invalid_state("invite token mismatch"));
        }

        self.status = MembershipStatus::Rejected;
        Ok(())
    }

    /// Administrative suspension of an active member.
    pub fn suspend(&mut self) -> DomainResult<()> {
        if self.status != MembershipStatus::Active {
            return Err(DomainError::invalid_state(format!(
                "only active memberships can be suspended (status {:?})",
                self.status
            )));
        }
        self.status = MembershipStatus::Suspended;
        Ok(())
    }

    /// The member leaves (or is removed from) the account.
    pub fn leave(&mut self) -> DomainResult<()> {
        if self.status != MembershipStatus::Active {
            return Err(DomainError::invalid_state(format!(
                "only active memberships can leave (status {:?})",
                self.status
            )));
        }
        self.status = MembershipStatus::Left;
        Ok(())
    }

    /// Add a completed deposit to the member's running contribution total.
    ///
    /// Infallible: the deposit was already committed by the time this runs,
    /// so the total saturates instead of erroring, and a status change that
    /// raced the deposit does not void the bookkeeping.
    pub fn record_contribution(&mut self, amount: Money) {
        self.contributed = self.contributed.saturating_add(amount);
    }

    pub fn set_monthly_target(&mut self, target: Option<Money>) -> DomainResult<()> {
        if let Some(t) = target {
            if !t.is_positive() {
                return Err(DomainError::validation(
                    "monthly contribution target must be positive",
                ));
            }
        }
        self.monthly_target = target;
        Ok(())
    }
}

impl Entity for Membership {
    type Id = MembershipId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

fn fresh_token() -> String {
    Uuid::now_v7().simple().to_string()
}
