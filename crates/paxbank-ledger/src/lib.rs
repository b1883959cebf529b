//! paxbank ledger
//!
//! The hash-linked chain of transfer blocks and the per-account balance
//! table, together with the proof-of-work-style nonce search:
//! - [`hash`]: SHA-256 block hashing and the difficulty filter
//! - [`Chain`]: ordered blocks with the prev-hash link invariant
//! - [`Ledger`]: chain + balances, the state a committed transfer mutates

#![forbid(unsafe_code)]

pub mod hash;

mod chain;
mod ledger;

pub use chain::Chain;
pub use ledger::Ledger;

use thiserror::Error;

/// Validation errors for inbound transfer values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Recomputed hash does not match the hash carried in the value.
    #[error("hash mismatch: value carries {carried}, computed {computed}")]
    HashMismatch { carried: String, computed: String },

    /// Hash does not end in the required digit range.
    #[error("hash {0} does not meet the difficulty filter")]
    DifficultyNotMet(String),
}
