//! `famledger-infra` — in-memory persistence and the service engines.
//!
//! Domain crates stay pure; this crate composes them behind
//! constructor-injected services:
//!
//! - [`store`]: in-memory repositories with optimistic version checks and
//!   atomic balance+row commits
//! - [`locks`]: per-account/card serialization of read-modify-write cycles
//! - [`registry::MembershipRegistry`]: invitations, role checks, membership
//!   lifecycle
//! - [`ledger_engine::LedgerEngine`]: group-account deposits, withdrawals,
//!   history and stats
//! - [`card_engine::CardEngine`]: prepaid-card charges, limit-checked spend,
//!   auto-recharge signaling

pub mod card_engine;
pub mod ledger_engine;
pub mod locks;
pub mod registry;
pub mod store;


pub use card_engine::CardEngine;
pub use ledger_engine::{AccountStats, LedgerEngine};
pub use locks::LockRegistry;
pub use registry::{Invitee, MembershipRegistry};
pub use store::{CardStore, LedgerStore, MembershipStore};
