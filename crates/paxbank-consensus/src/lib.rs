//! paxbank consensus
//!
//! Per-slot Paxos over the replicated transfer log. Each depth (slot) runs
//! an independent instance of the classical protocol:
//!
//! 1. **Prepare/Promise**: a proposer claims a ballot; acceptors promise not
//!    to accept anything lower and report their last accepted pair
//! 2. **Accept/Accepted**: the proposer pushes a value (a carried-over one
//!    when any promise reported an earlier acceptance, a fresh transfer
//!    otherwise)
//! 3. **Decision**: the value is learned, appended to the chain as
//!    COMMITTED, and applied to the balance table exactly once per peer
//!
//! All of a peer's mutable state sits behind one mutex ([`PeerState`]), and
//! every mutation that a reply depends on is persisted before the reply goes
//! out, so a crash-restart can never un-promise or un-accept.

#![forbid(unsafe_code)]

mod engine;
mod state;

pub use engine::{select_carryover, ConsensusEngine};
pub use state::{PeerState, PrepareReply};

use thiserror::Error;

use paxbank_types::Block;

/// Result of one proposer round.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    /// The value committed at this slot. Not necessarily the transfer the
    /// caller asked for: a carried-over value from an earlier ballot wins
    /// over the local transfer.
    Decided(Block),
    /// Fewer than a majority of promises; the proposer was not elected.
    NotElected { promises: usize },
    /// Elected, but fewer than a majority accepted the value.
    NotAccepted { accepted: usize },
}

/// Proposer-side errors. Protocol-level failures are [`RoundOutcome`]s, not
/// errors; these are the conditions that stop a round before it starts, plus
/// real storage faults.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// This peer is in the failed state.
    #[error("process is failed; run fixProcess first")]
    Failed,

    /// Transfers can only be initiated from the local account.
    #[error("transfer must be sent from this node's account {local}, not {sender}")]
    NotProposer { sender: u64, local: u64 },

    /// The local balance does not cover the transfer.
    #[error("insufficient funds: balance {balance}, transfer {amount}")]
    InsufficientFunds { balance: i64, amount: i64 },

    /// Durable state could not be written.
    #[error(transparent)]
    Storage(#[from] paxbank_storage::StorageError),
}
