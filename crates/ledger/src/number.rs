//! Generated identifiers: account numbers and transaction references.
//!
//! Numbers carry a fixed institution prefix followed by digits and must be
//! globally unique; the store enforces uniqueness and the engines retry a
//! bounded number of times on collision.

use uuid::Uuid;

/// 3-digit institution prefix for group accounts.
pub const ACCOUNT_NUMBER_PREFIX: &str = "301";

/// Candidate account number: prefix + 11 digits.
pub fn account_number() -> String {
    format!("{ACCOUNT_NUMBER_PREFIX}{}", digits(11))
}

/// Candidate transaction reference: `TXN` + 16 digits.
pub fn reference_number() -> String {
    format!("TXN{}", digits(16))
}

/// Pseudo-random digit string derived from a fresh UUIDv7.
///
/// The v7 timestamp prefix plus random tail keeps candidates effectively
/// unique; collisions are still checked by the store.
fn digits(n: usize) -> String {
    let mut value = Uuid::now_v7().as_u128();
    let mut out = String::with_capacity(n);
    for _ in 0..n {
        out.push(char::from(b'0' + (value % 10) as u8));
        value /= 10;
    }
    out
}
