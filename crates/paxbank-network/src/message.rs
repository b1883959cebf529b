//! Wire protocol messages.
//!
//! One JSON object per connection, tagged by `type`. Ballots serialize as
//! 3-element arrays; an unset `accepted_num`/`accepted_val` pair serializes
//! as `null` so the proposer can tell "no carryover" from a real value.

use serde::{Deserialize, Serialize};

use paxbank_types::{Ballot, Transfer};

/// Requests a peer can receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Phase-1a: claim leadership for the ballot's slot.
    #[serde(rename = "PREPARE")]
    Prepare { ballot: Ballot },

    /// Phase-2a: ask the acceptor to accept a value.
    #[serde(rename = "ACCEPT")]
    Accept { ballot: Ballot, value: Transfer },

    /// Learn phase: the value is decided, apply it.
    #[serde(rename = "DECISION")]
    Decision { ballot: Ballot, value: Transfer },
}

/// Responses a peer can return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Phase-1b: promise, reporting any previously accepted pair.
    #[serde(rename = "PROMISE")]
    Promise {
        accepted_num: Option<Ballot>,
        accepted_val: Option<Transfer>,
    },

    /// Phase-2b: the value was accepted.
    #[serde(rename = "ACCEPTED")]
    Accepted,

    /// Ballot too low (or value failed validation).
    #[serde(rename = "REJECT")]
    Reject,

    /// Decision acknowledged.
    #[serde(rename = "ACK")]
    Ack,
}

impl Request {
    /// Short message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Prepare { .. } => "PREPARE",
            Self::Accept { .. } => "ACCEPT",
            Self::Decision { .. } => "DECISION",
        }
    }

    /// Ballot carried by the request.
    pub fn ballot(&self) -> Ballot {
        match self {
            Self::Prepare { ballot }
            | Self::Accept { ballot, .. }
            | Self::Decision { ballot, .. } => *ballot,
        }
    }
}

impl Response {
    /// Short message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Promise { .. } => "PROMISE",
            Self::Accepted => "ACCEPTED",
            Self::Reject => "REJECT",
            Self::Ack => "ACK",
        }
    }
}
