//! The consensus engine: acceptor dispatch plus the proposer round driver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use paxbank_ledger::hash::verify_transfer;
use paxbank_network::{Request, Response, Transport};
use paxbank_storage::Store;
use paxbank_types::{Ballot, Block, Transfer};

use crate::state::{PeerState, PrepareReply};
use crate::{ConsensusError, RoundOutcome};

/// One peer's consensus component.
///
/// Owns the peer-wide mutex over [`PeerState`] and the durable store, and
/// drives the transport for proposer rounds. Inbound messages run through
/// [`ConsensusEngine::handle_request`] on their connection's task; the
/// mutation, its persist, and the reply happen in that order, so anything a
/// peer has said on the wire survives a crash.
pub struct ConsensusEngine {
    node_id: u64,
    state: Mutex<PeerState>,
    store: Store,
    transport: Transport,
    failed: Arc<AtomicBool>,
}

impl ConsensusEngine {
    pub fn new(
        node_id: u64,
        state: PeerState,
        store: Store,
        transport: Transport,
        failed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            node_id,
            state: Mutex::new(state),
            store,
            transport,
            failed,
        }
    }

    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Runs a read-only closure under the peer mutex (chain/balance views).
    pub fn with_state<R>(&self, f: impl FnOnce(&PeerState) -> R) -> R {
        f(&self.state.lock())
    }

    /// Acceptor entry point for one inbound request.
    ///
    /// Returning `None` closes the connection without a reply: malformed
    /// ballots, decided values failing the hash check, or a persist failure
    /// (replying without durability would break the recovery guarantee).
    pub fn handle_request(&self, request: Request) -> Option<Response> {
        let ballot = request.ballot();
        if ballot.depth() < 0 {
            warn!(%ballot, "request with invalid depth");
            return None;
        }
        let depth = ballot.depth() as u64;

        match request {
            Request::Prepare { ballot } => {
                let mut state = self.state.lock();
                match state.on_prepare(ballot) {
                    PrepareReply::Promised {
                        accepted_num,
                        accepted_val,
                    } => {
                        if !self.persist_locked(&state) {
                            return None;
                        }
                        info!(%ballot, depth, "promised");
                        Some(Response::Promise {
                            accepted_num,
                            accepted_val,
                        })
                    }
                    PrepareReply::Rejected => {
                        debug!(%ballot, depth, promised = %state.promised(depth), "rejecting prepare");
                        Some(Response::Reject)
                    }
                }
            }
            Request::Accept { ballot, value } => {
                if let Err(err) = verify_transfer(&value) {
                    warn!(%ballot, error = %err, "rejecting accept with invalid value");
                    return Some(Response::Reject);
                }
                let mut state = self.state.lock();
                if state.on_accept(ballot, value) {
                    if !self.persist_locked(&state) {
                        return None;
                    }
                    info!(%ballot, depth, "accepted");
                    Some(Response::Accepted)
                } else {
                    debug!(%ballot, depth, promised = %state.promised(depth), "rejecting accept");
                    Some(Response::Reject)
                }
            }
            Request::Decision { ballot, value } => {
                if let Err(err) = verify_transfer(&value) {
                    warn!(%ballot, error = %err, "dropping decision with invalid value");
                    return None;
                }
                let mut state = self.state.lock();
                let applied = state.on_decision(ballot, value);
                if !self.persist_locked(&state) {
                    return None;
                }
                if applied {
                    info!(depth, "decision applied");
                } else {
                    debug!(depth, "duplicate decision ignored");
                }
                Some(Response::Ack)
            }
        }
    }

    /// Runs one full proposer round for a local transfer at the current
    /// chain tip. Blocks (asynchronously) until the round decides or aborts;
    /// a retry after an abort forms a fresh ballot at whatever depth the
    /// chain has reached by then.
    pub async fn propose(
        &self,
        sender_id: u64,
        receiver_id: u64,
        amount: i64,
    ) -> Result<RoundOutcome, ConsensusError> {
        if self.is_failed() {
            return Err(ConsensusError::Failed);
        }
        if sender_id != self.node_id {
            return Err(ConsensusError::NotProposer {
                sender: sender_id,
                local: self.node_id,
            });
        }

        let others = self.transport.peers().others(self.node_id);
        let majority = self.transport.peers().majority();

        // Phase 0: funds check, ballot formation, self-promise. The promise
        // is durable before any peer hears the ballot.
        let (ballot, depth) = {
            let mut state = self.state.lock();
            let balance = state.ledger().balance(sender_id);
            if balance < amount {
                return Err(ConsensusError::InsufficientFunds { balance, amount });
            }
            let depth = state.ledger().depth();
            let ballot = state.next_ballot(self.node_id, depth);
            state.record_promise(depth, ballot);
            self.store.persist(&state.snapshot())?;
            (ballot, depth)
        };
        info!(%ballot, depth, "starting proposal round");

        // Phase 1: prepare. Unreachable peers and rejections count as
        // missing votes; all peers are attempted before the tally.
        let mut promises: Vec<(Option<Ballot>, Option<Transfer>)> = Vec::new();
        for peer in &others {
            match self.transport.send(*peer, &Request::Prepare { ballot }).await {
                Ok(Response::Promise {
                    accepted_num,
                    accepted_val,
                }) => promises.push((accepted_num, accepted_val)),
                Ok(reply) => debug!(peer, reply = reply.name(), "prepare not promised"),
                Err(err) => debug!(peer, error = %err, "prepare unanswered"),
            }
        }

        let votes = 1 + promises.len();
        if votes < majority {
            info!(%ballot, votes, majority, "not elected");
            return Ok(RoundOutcome::NotElected { promises: votes });
        }

        // Phase 2: value selection. Any reported acceptance forces the
        // highest-ballot carryover; only a clean slate lets the proposer
        // compose its own transfer and mine a nonce for it.
        let value = match select_carryover(&promises) {
            Some(value) => {
                info!(%ballot, depth, "re-proposing carried-over value");
                value
            }
            None => {
                let state = self.state.lock();
                state.ledger().compose(sender_id, receiver_id, amount)
            }
        };

        // Phase 3: accept.
        let mut accepted = 1usize;
        for peer in &others {
            let request = Request::Accept {
                ballot,
                value: value.clone(),
            };
            match self.transport.send(*peer, &request).await {
                Ok(Response::Accepted) => accepted += 1,
                Ok(reply) => debug!(peer, reply = reply.name(), "accept refused"),
                Err(err) => debug!(peer, error = %err, "accept unanswered"),
            }
        }
        if accepted < majority {
            info!(%ballot, accepted, majority, "value not accepted by a majority");
            return Ok(RoundOutcome::NotAccepted { accepted });
        }

        // Phase 4: decision. Fire-and-forget towards the peers, then the
        // local apply + persist.
        for peer in &others {
            let request = Request::Decision {
                ballot,
                value: value.clone(),
            };
            if let Err(err) = self.transport.send(*peer, &request).await {
                debug!(peer, error = %err, "decision not acknowledged");
            }
        }

        {
            let mut state = self.state.lock();
            state.on_decision(ballot, value.clone());
            self.store.persist(&state.snapshot())?;
        }

        info!(%ballot, depth, "decided");
        Ok(RoundOutcome::Decided(Block::committed(value)))
    }

    /// failProcess: one last persist, then wipe memory and go dark. The
    /// listener keeps the port but drops connections while the flag is set.
    pub fn fail_process(&self) {
        let mut state = self.state.lock();
        if let Err(err) = self.store.persist(&state.snapshot()) {
            error!(error = %err, "persist on failProcess failed");
        }
        state.clear();
        self.failed.store(true, Ordering::SeqCst);
        info!("process failed");
    }

    /// fixProcess: reload the snapshot and resume serving. Recovery is
    /// opportunistic: missed decisions are re-learned through carried-over
    /// values or late DECISIONs, not pulled.
    pub fn fix_process(&self) {
        let num_peers = self.transport.peers().len() as u64;
        let mut state = self.state.lock();
        *state = match self.store.load() {
            Some(snapshot) => PeerState::from_snapshot(snapshot, num_peers),
            None => PeerState::new(num_peers),
        };
        self.failed.store(false, Ordering::SeqCst);
        info!(depth = state.ledger().depth(), "process fixed");
    }

    fn persist_locked(&self, state: &PeerState) -> bool {
        match self.store.persist(&state.snapshot()) {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "persist failed, dropping reply");
                false
            }
        }
    }
}

/// Picks the value the proposer is obliged to re-propose: the one paired
/// with the highest reported `accepted_num`, or `None` when every promise
/// was clean.
pub fn select_carryover(promises: &[(Option<Ballot>, Option<Transfer>)]) -> Option<Transfer> {
    promises
        .iter()
        .filter_map(|(num, val)| match (num, val) {
            (Some(num), Some(val)) => Some((*num, val)),
            _ => None,
        })
        .max_by_key(|(num, _)| *num)
        .map(|(_, val)| val.clone())
}
