//! Generated card identifiers.

use uuid::Uuid;

/// BIN-style prefix for allowance cards.
pub const CARD_BIN_PREFIX: &str = "9410";

/// Candidate card number: BIN prefix + 12 digits (16 total).
pub fn card_number() -> String {
    format!("{CARD_BIN_PREFIX}{}", digits(12))
}

/// Candidate usage approval number: `AP` + 12 digits.
pub fn approval_number() -> String {
    format!("AP{}", digits(12))
}

fn digits(n: usize) -> String {
    let mut value = Uuid::now_v7().as_u128();
    let mut out = String::with_capacity(n);
    for _ in 0..n {
        out.push(char::from(b'0' + (value % 10) as u8));
        value /= 10;
    }
    out
}
