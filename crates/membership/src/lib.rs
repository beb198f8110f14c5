//! Membership registry domain: who may act on a shared account.
//!
//! Pure domain logic only: role/capability policy, the membership state
//! machine and invite-token checks. Lookup, uniqueness and locking live in
//! the infra layer.

pub mod membership;
pub mod role;

pub use membership::{Membership, MembershipStatus, INVITE_VALIDITY_DAYS};
pub use role::{Capability, Role, RolePolicy};
