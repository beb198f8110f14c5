//! Group (pooled) account domain: the account entity, the immutable
//! transaction ledger row and identifier generation.
//!
//! Pure domain logic only. Atomicity, uniqueness of generated numbers and
//! authorization live in the infra layer.

pub mod account;
pub mod number;
pub mod transaction;

pub use account::{Account, AccountStatus};
pub use number::{account_number, reference_number, ACCOUNT_NUMBER_PREFIX};
pub use transaction::{Counterparty, Transaction, TransactionStatus, TransactionType};
