//! Core data types for the paxbank replicated ledger.
//!
//! These are the plain values shared by every other crate:
//! - [`Ballot`]: totally ordered proposal identifier
//! - [`Transfer`]: a proposed money transfer carried through consensus
//! - [`Block`]: a transfer plus its commit tag, as stored in the chain

#![forbid(unsafe_code)]

mod ballot;
mod block;

pub use ballot::Ballot;
pub use block::{Block, BlockTag, Transfer};

/// Number of peers in the fixed cluster.
pub const NUM_PEERS: u64 = 5;

/// Starting balance of every account.
pub const INITIAL_BALANCE: i64 = 100;
