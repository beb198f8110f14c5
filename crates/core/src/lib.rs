//! `famledger-core` — domain foundation building blocks.
//!
//! Pure domain primitives only: ids, money, errors, time and the entity
//! trait. No storage, locking or IO concerns live here.

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;

pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::{Entity, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{
    AccountId, CardChargeId, CardId, CardUsageId, MembershipId, TransactionId, UserId,
};
pub use money::Money;
