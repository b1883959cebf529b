//! The peer's mutable state and the per-slot acceptor rules.

use std::collections::BTreeMap;

use paxbank_ledger::{Chain, Ledger};
use paxbank_storage::Snapshot;
use paxbank_types::{Ballot, Block, Transfer};

/// Outcome of a PREPARE at the acceptor.
#[derive(Debug, Clone, PartialEq)]
pub enum PrepareReply {
    /// Ballot was promised; the last accepted pair rides along (both `None`
    /// when nothing was ever accepted at this depth).
    Promised {
        accepted_num: Option<Ballot>,
        accepted_val: Option<Transfer>,
    },
    /// Ballot was at or below the current promise.
    Rejected,
}

/// Everything a peer holds: the ledger plus the per-slot Paxos variables.
///
/// Guarded by one peer-wide mutex at the engine level; all methods here
/// assume they run under it. Per-slot entries are created lazily on first
/// touch and only ever move upward (promised and accepted ballots are
/// non-decreasing per depth).
#[derive(Debug, Clone, PartialEq)]
pub struct PeerState {
    ledger: Ledger,
    seq: BTreeMap<u64, i64>,
    promised: BTreeMap<u64, Ballot>,
    accepted_ballot: BTreeMap<u64, Ballot>,
    accepted_value: BTreeMap<u64, Transfer>,
    num_peers: u64,
}

impl PeerState {
    pub fn new(num_peers: u64) -> Self {
        Self {
            ledger: Ledger::new(num_peers),
            seq: BTreeMap::new(),
            promised: BTreeMap::new(),
            accepted_ballot: BTreeMap::new(),
            accepted_value: BTreeMap::new(),
            num_peers,
        }
    }

    /// Rehydrates a peer from its snapshot. `null` per-slot entries stay
    /// unset rather than becoming zero ballots.
    pub fn from_snapshot(snapshot: Snapshot, num_peers: u64) -> Self {
        let ledger = Ledger::from_parts(
            Chain::from_blocks(snapshot.blockchain),
            snapshot.table,
            num_peers,
        );
        Self {
            ledger,
            seq: snapshot.seq_num,
            promised: unwrap_set(snapshot.promised_ballot),
            accepted_ballot: unwrap_set(snapshot.accepted_ballot),
            accepted_value: snapshot
                .accepted_val
                .into_iter()
                .filter_map(|(depth, value)| value.map(|value| (depth, value)))
                .collect(),
            num_peers,
        }
    }

    /// The durable image of this state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            table: self.ledger.balances().clone(),
            blockchain: self.ledger.chain().blocks().to_vec(),
            seq_num: self.seq.clone(),
            promised_ballot: wrap_set(&self.promised),
            accepted_ballot: wrap_set(&self.accepted_ballot),
            accepted_val: self
                .accepted_value
                .iter()
                .map(|(depth, value)| (*depth, Some(value.clone())))
                .collect(),
        }
    }

    /// Wipes the in-memory state back to defaults (failProcess).
    pub fn clear(&mut self) {
        *self = Self::new(self.num_peers);
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Highest promised ballot at `depth`, NULL when never touched.
    pub fn promised(&self, depth: u64) -> Ballot {
        self.promised.get(&depth).copied().unwrap_or(Ballot::NULL)
    }

    /// Last accepted pair at `depth`.
    pub fn accepted(&self, depth: u64) -> (Option<Ballot>, Option<Transfer>) {
        (
            self.accepted_ballot.get(&depth).copied(),
            self.accepted_value.get(&depth).cloned(),
        )
    }

    /// Forms the next ballot for a proposal attempt at `depth`: the per-depth
    /// counter starts at 0 on first use and increments on every retry.
    pub fn next_ballot(&mut self, node_id: u64, depth: u64) -> Ballot {
        let seq = self
            .seq
            .entry(depth)
            .and_modify(|seq| *seq += 1)
            .or_insert(0);
        Ballot::new(*seq, node_id as i64, depth as i64)
    }

    /// Records a promise locally without the PREPARE exchange. The proposer
    /// acts as an acceptor for its own ballot before contacting anyone.
    pub fn record_promise(&mut self, depth: u64, ballot: Ballot) {
        let entry = self.promised.entry(depth).or_insert(Ballot::NULL);
        if ballot > *entry {
            *entry = ballot;
        }
    }

    /// PREPARE(b) at depth d: promise iff `b > promised[d]`.
    pub fn on_prepare(&mut self, ballot: Ballot) -> PrepareReply {
        let depth = ballot.depth() as u64;
        if ballot > self.promised(depth) {
            self.promised.insert(depth, ballot);
            let (accepted_num, accepted_val) = self.accepted(depth);
            PrepareReply::Promised {
                accepted_num,
                accepted_val,
            }
        } else {
            PrepareReply::Rejected
        }
    }

    /// ACCEPT(b, v) at depth d: accept iff `b >= promised[d]`. A first
    /// acceptance at the chain tip also appends a TENTATIVE block.
    ///
    /// Returns true when accepted; the caller must persist before replying.
    pub fn on_accept(&mut self, ballot: Ballot, value: Transfer) -> bool {
        let depth = ballot.depth() as u64;
        if ballot < self.promised(depth) {
            return false;
        }
        self.accepted_ballot.insert(depth, ballot);
        self.accepted_value.insert(depth, value.clone());
        if self.ledger.depth() == depth {
            self.ledger.append(Block::tentative(value));
        }
        true
    }

    /// DECISION(b, v) at depth d. Promotes the TENTATIVE block at d (or
    /// replaces it, if a lower-ballot acceptance left a different value
    /// there), appends a fresh COMMITTED block when d is the tip, and leaves
    /// the chain alone on a duplicate decide.
    ///
    /// Returns true when a block was promoted or appended by this call: the
    /// transfer is applied to the balance table exactly in that case, so
    /// each decide settles once per peer.
    pub fn on_decision(&mut self, ballot: Ballot, value: Transfer) -> bool {
        let depth = ballot.depth() as u64;
        let chain_len = self.ledger.depth();

        if chain_len == depth + 1 {
            let existing = match self.ledger.block_at(depth) {
                Some(block) => block,
                None => return false,
            };
            if existing.is_committed() {
                // duplicate decide
                return false;
            }
            if existing.value == value {
                self.ledger.promote_at(depth);
            } else {
                // the tentative value was superseded by the decided one
                self.ledger.replace_at(depth, Block::committed(value));
            }
            if let Some(block) = self.ledger.block_at(depth).cloned() {
                self.ledger.apply_transfer(&block);
            }
            true
        } else if chain_len == depth {
            let block = Block::committed(value);
            self.ledger.append(block.clone());
            self.ledger.apply_transfer(&block);
            true
        } else {
            false
        }
    }
}

fn unwrap_set(map: BTreeMap<u64, Option<Ballot>>) -> BTreeMap<u64, Ballot> {
    map.into_iter()
        .filter_map(|(depth, ballot)| ballot.map(|ballot| (depth, ballot)))
        .collect()
}

fn wrap_set(map: &BTreeMap<u64, Ballot>) -> BTreeMap<u64, Option<Ballot>> {
    map.iter()
        .map(|(depth, ballot)| (*depth, Some(*ballot)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use paxbank_types::{INITIAL_BALANCE, NUM_PEERS};

    fn value_at(state: &PeerState, sender: u64, receiver: u64, amount: i64) -> Transfer {
        state.ledger().compose(sender, receiver, amount)
    }

    #[test]
    fn test_prepare_promises_higher_ballots_only() {
        let mut state = PeerState::new(NUM_PEERS);

        let low = Ballot::new(0, 1, 0);
        let high = Ballot::new(0, 2, 0);

        assert!(matches!(state.on_prepare(low), PrepareReply::Promised { .. }));
        assert_eq!(state.promised(0), low);

        // equal ballot is rejected, promise unchanged
        assert_eq!(state.on_prepare(low), PrepareReply::Rejected);
        assert_eq!(state.promised(0), low);

        // node id breaks the tie upward
        assert!(matches!(state.on_prepare(high), PrepareReply::Promised { .. }));
        assert_eq!(state.promised(0), high);

        // and lower again is rejected
        assert_eq!(state.on_prepare(low), PrepareReply::Rejected);
    }

    #[test]
    fn test_prepare_reports_accepted_pair() {
        let mut state = PeerState::new(NUM_PEERS);
        let value = value_at(&state, 1, 2, 10);

        let b1 = Ballot::new(0, 1, 0);
        assert!(state.on_accept(b1, value.clone()));

        let b2 = Ballot::new(1, 3, 0);
        match state.on_prepare(b2) {
            PrepareReply::Promised {
                accepted_num,
                accepted_val,
            } => {
                assert_eq!(accepted_num, Some(b1));
                assert_eq!(accepted_val, Some(value));
            }
            other => panic!("expected promise, got {other:?}"),
        }
    }

    #[test]
    fn test_accept_honors_promise() {
        let mut state = PeerState::new(NUM_PEERS);
        let value = value_at(&state, 1, 2, 10);

        let promised = Ballot::new(2, 4, 0);
        assert!(matches!(
            state.on_prepare(promised),
            PrepareReply::Promised { .. }
        ));

        // below the promise: rejected, nothing recorded
        assert!(!state.on_accept(Ballot::new(1, 5, 0), value.clone()));
        assert_eq!(state.accepted(0), (None, None));
        assert_eq!(state.ledger().depth(), 0);

        // at the promise: accepted, tentative block appended at the tip
        assert!(state.on_accept(promised, value.clone()));
        assert_eq!(state.accepted(0).0, Some(promised));
        assert_eq!(state.ledger().depth(), 1);
        assert!(!state.ledger().block_at(0).unwrap().is_committed());

        // tentative blocks do not move balances
        assert_eq!(state.ledger().balance(1), INITIAL_BALANCE);
    }

    #[test]
    fn test_accept_does_not_append_off_tip() {
        let mut state = PeerState::new(NUM_PEERS);
        let value = value_at(&state, 1, 2, 10);

        // accept at depth 1 while the chain is empty: record, no append
        assert!(state.on_accept(Ballot::new(0, 1, 1), value.clone()));
        assert_eq!(state.ledger().depth(), 0);
        assert_eq!(state.accepted(1).1, Some(value));
    }

    #[test]
    fn test_decision_promotes_tentative_and_applies_once() {
        let mut state = PeerState::new(NUM_PEERS);
        let value = value_at(&state, 1, 2, 10);
        let ballot = Ballot::new(0, 1, 0);

        assert!(state.on_accept(ballot, value.clone()));
        assert!(state.on_decision(ballot, value.clone()));

        assert!(state.ledger().block_at(0).unwrap().is_committed());
        assert_eq!(state.ledger().balance(1), 90);
        assert_eq!(state.ledger().balance(2), 110);

        // duplicate decide: chain and balances unchanged
        assert!(!state.on_decision(ballot, value));
        assert_eq!(state.ledger().depth(), 1);
        assert_eq!(state.ledger().balance(1), 90);
    }

    #[test]
    fn test_decision_appends_when_nothing_accepted() {
        let mut state = PeerState::new(NUM_PEERS);
        let value = value_at(&state, 3, 4, 5);

        assert!(state.on_decision(Ballot::new(1, 3, 0), value.clone()));
        let block = state.ledger().block_at(0).unwrap();
        assert!(block.is_committed());
        assert_eq!(block.value, value);
        assert_eq!(state.ledger().balance(3), 95);
        assert_eq!(state.ledger().balance(4), 105);
    }

    #[test]
    fn test_decision_replaces_superseded_tentative() {
        let mut state = PeerState::new(NUM_PEERS);
        let stale = value_at(&state, 1, 2, 10);
        let decided = value_at(&state, 3, 4, 5);

        // a lower-ballot acceptance left a different tentative value
        assert!(state.on_accept(Ballot::new(0, 1, 0), stale));
        assert!(state.on_decision(Ballot::new(1, 2, 0), decided.clone()));

        let block = state.ledger().block_at(0).unwrap();
        assert!(block.is_committed());
        assert_eq!(block.value, decided);
        // only the decided transfer touched the balances
        assert_eq!(state.ledger().balance(1), INITIAL_BALANCE);
        assert_eq!(state.ledger().balance(3), 95);
    }

    #[test]
    fn test_decision_for_future_depth_is_ignored() {
        let mut state = PeerState::new(NUM_PEERS);
        let value = value_at(&state, 1, 2, 10);

        assert!(!state.on_decision(Ballot::new(0, 1, 3), value));
        assert_eq!(state.ledger().depth(), 0);
        assert_eq!(state.ledger().balance(1), INITIAL_BALANCE);
    }

    #[test]
    fn test_next_ballot_counts_per_depth() {
        let mut state = PeerState::new(NUM_PEERS);

        assert_eq!(state.next_ballot(2, 0), Ballot::new(0, 2, 0));
        assert_eq!(state.next_ballot(2, 0), Ballot::new(1, 2, 0));
        // a different depth starts its own counter
        assert_eq!(state.next_ballot(2, 1), Ballot::new(0, 2, 1));
        assert_eq!(state.next_ballot(2, 0), Ballot::new(2, 2, 0));
    }

    #[test]
    fn test_record_promise_is_monotonic() {
        let mut state = PeerState::new(NUM_PEERS);
        let high = Ballot::new(3, 1, 0);
        let low = Ballot::new(1, 1, 0);

        state.record_promise(0, high);
        state.record_promise(0, low);
        assert_eq!(state.promised(0), high);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut state = PeerState::new(NUM_PEERS);
        let value = value_at(&state, 1, 2, 10);
        let ballot = Ballot::new(0, 1, 0);

        state.next_ballot(1, 0);
        assert!(state.on_accept(ballot, value.clone()));
        assert!(state.on_decision(ballot, value));
        // a promise at a later depth with nothing accepted there
        assert!(matches!(
            state.on_prepare(Ballot::new(0, 4, 1)),
            PrepareReply::Promised { .. }
        ));

        let restored = PeerState::from_snapshot(state.snapshot(), NUM_PEERS);
        assert_eq!(restored, state);
        assert_eq!(restored.accepted(1), (None, None));
        assert_eq!(restored.promised(1), Ballot::new(0, 4, 1));
    }

    #[test]
    fn test_clear_resets_to_defaults() {
        let mut state = PeerState::new(NUM_PEERS);
        let value = value_at(&state, 1, 2, 10);
        let ballot = Ballot::new(0, 1, 0);
        assert!(state.on_accept(ballot, value.clone()));
        assert!(state.on_decision(ballot, value));

        state.clear();
        assert_eq!(state, PeerState::new(NUM_PEERS));
    }
}
