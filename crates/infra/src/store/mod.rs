//! In-memory repositories.
//!
//! Intended for tests/dev and as the reference persistence semantics: every
//! write goes through an optimistic version check, unique generated
//! identifiers are enforced by index maps, and a balance mutation commits
//! together with its ledger row under one write lock so readers never see
//! one without the other.

pub mod cards;
pub mod ledger;
pub mod memberships;

pub use cards::CardStore;
pub use ledger::LedgerStore;
pub use memberships::MembershipStore;

use famledger_core::DomainError;

/// Poisoned-lock mapping shared by the stores.
///
/// A poisoned store lock means a writer panicked mid-commit; surfacing a
/// retryable conflict is the safest contract for callers.
pub(crate) fn poisoned() -> DomainError {
    DomainError::conflict("store lock poisoned")
}
