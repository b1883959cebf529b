//! Block hashing and the nonce search.
//!
//! A block's hash is `SHA256(sender || receiver || amount || nonce)` over the
//! decimal renderings of the numbers, hex-encoded. The difficulty filter
//! requires the final hex digit to fall in `0..=4`, so a random nonce passes
//! with probability 5/16 and the search finishes after ~3.2 attempts on
//! average.

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::LedgerError;
use paxbank_types::Transfer;

/// Previous-hash value of the genesis block.
pub const GENESIS_HASH: &str = "0";

/// Computes the hex SHA-256 digest of a transfer's hashed fields.
///
/// `prev_hash` is deliberately not part of the input; the chain link is a
/// separate field checked at append time.
pub fn transfer_hash(sender_id: u64, receiver_id: u64, amount: i64, nonce: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{sender_id}{receiver_id}{amount}{nonce}").as_bytes());
    hex::encode(hasher.finalize())
}

/// True when the final hex digit is in `0..=4`.
pub fn meets_difficulty(hash: &str) -> bool {
    matches!(hash.as_bytes().last(), Some(b'0'..=b'4'))
}

/// Searches for a nonce whose hash passes the difficulty filter.
///
/// Nonces are 32 random hex characters, so concurrent proposers for the same
/// `(sender, receiver, amount)` almost surely produce distinct values.
/// Returns `(nonce, hash)`.
pub fn search_nonce(sender_id: u64, receiver_id: u64, amount: i64) -> (String, String) {
    let mut rng = rand::thread_rng();
    loop {
        let mut raw = [0u8; 16];
        rng.fill_bytes(&mut raw);
        let nonce = hex::encode(raw);
        let hash = transfer_hash(sender_id, receiver_id, amount, &nonce);
        if meets_difficulty(&hash) {
            return (nonce, hash);
        }
    }
}

/// Recomputes and checks a value's hash and difficulty digit.
///
/// Acceptors run this on every inbound ACCEPT/DECISION; a mismatch is a
/// protocol violation.
pub fn verify_transfer(value: &Transfer) -> Result<(), LedgerError> {
    let computed = transfer_hash(value.sender_id, value.receiver_id, value.amount, &value.nonce);
    if computed != value.hash {
        return Err(LedgerError::HashMismatch {
            carried: value.hash.clone(),
            computed,
        });
    }
    if !meets_difficulty(&value.hash) {
        return Err(LedgerError::DifficultyNotMet(value.hash.clone()));
    }
    Ok(())
}
