//! Random identifiers for records and transaction tokens.
//!
//! Identifiers carry 128 bits of OS-seeded randomness, so two calls
//! colliding is not a practical concern and no coordination between
//! processes is needed.

use rand::RngCore;

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A new record id: 32 lowercase hex characters.
pub fn new_record_id() -> String {
    random_hex(16)
}

/// A new transaction token: `0x` followed by 64 lowercase hex characters.
pub fn new_tx_token() -> String {
    format!("0x{}", random_hex(32))
}

/// Ids are used as file names, so only `[0-9A-Za-z_-]` is accepted.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
