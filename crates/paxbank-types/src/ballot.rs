//! Ballot numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A ballot is the `(seq, node, depth)` triple identifying one proposal
/// attempt. Ballots are compared lexicographically; the derived `Ord` on the
/// tuple struct gives exactly that order.
///
/// `depth` rides along so a ballot is unique across slots, but ballots from
/// different depths never meet at the same acceptor map entry.
///
/// Serializes as a 3-element JSON array `[seq, node, depth]`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Ballot(pub i64, pub i64, pub i64);

impl Ballot {
    /// The null ballot, strictly less than any real ballot.
    pub const NULL: Ballot = Ballot(-1, -1, -1);

    /// Creates a ballot for a proposal attempt.
    pub fn new(seq: i64, node: i64, depth: i64) -> Self {
        Ballot(seq, node, depth)
    }

    /// Per-depth attempt counter at the proposer.
    pub fn seq(&self) -> i64 {
        self.0
    }

    /// Id of the proposing node.
    pub fn node(&self) -> i64 {
        self.1
    }

    /// Slot this ballot belongs to.
    pub fn depth(&self) -> i64 {
        self.2
    }

    /// True for [`Ballot::NULL`].
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl Default for Ballot {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for Ballot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.0, self.1, self.2)
    }
}
