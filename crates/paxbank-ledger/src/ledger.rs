//! Chain plus balance table.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use paxbank_types::{Block, Transfer, INITIAL_BALANCE};

use crate::chain::Chain;
use crate::hash::search_nonce;

/// The replicated application state: the committed chain and the balance
/// table it has produced.
///
/// Balances change only through [`Ledger::apply_transfer`], and only for
/// committed blocks. There is deliberately no funds check here: sufficiency
/// is the initiating proposer's concern, and acceptors apply decided
/// transfers unconditionally, so a balance can go negative when two
/// concurrent transfers from one sender both commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    chain: Chain,
    balances: BTreeMap<u64, i64>,
}

impl Ledger {
    /// Fresh ledger: empty chain, every account at the initial balance.
    pub fn new(num_peers: u64) -> Self {
        Self::from_parts(Chain::new(), BTreeMap::new(), num_peers)
    }

    /// Restores a ledger from persisted state. An empty balance table (no
    /// snapshot, or one written before any transfer) falls back to the
    /// initial balances.
    pub fn from_parts(chain: Chain, mut balances: BTreeMap<u64, i64>, num_peers: u64) -> Self {
        if balances.is_empty() {
            balances = (1..=num_peers).map(|id| (id, INITIAL_BALANCE)).collect();
        }
        Self { chain, balances }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn balances(&self) -> &BTreeMap<u64, i64> {
        &self.balances
    }

    pub fn balance(&self, id: u64) -> i64 {
        self.balances.get(&id).copied().unwrap_or(0)
    }

    /// Current chain length; the slot the next proposal targets.
    pub fn depth(&self) -> u64 {
        self.chain.depth()
    }

    /// Hash of the last block, or `"0"` for an empty chain.
    pub fn prev_hash(&self) -> String {
        self.chain.prev_hash()
    }

    pub fn block_at(&self, depth: u64) -> Option<&Block> {
        self.chain.get(depth)
    }

    /// Composes a fresh proposal value on top of the current tail: links
    /// `prev_hash`, then searches for a nonce passing the difficulty filter.
    pub fn compose(&self, sender_id: u64, receiver_id: u64, amount: i64) -> Transfer {
        let (nonce, hash) = search_nonce(sender_id, receiver_id, amount);
        Transfer {
            sender_id,
            receiver_id,
            amount,
            prev_hash: self.prev_hash(),
            nonce,
            hash,
        }
    }

    pub fn append(&mut self, block: Block) {
        self.chain.push(block);
    }

    pub fn promote_at(&mut self, depth: u64) -> bool {
        self.chain.promote(depth)
    }

    pub fn replace_at(&mut self, depth: u64, block: Block) -> bool {
        self.chain.replace(depth, block)
    }

    /// Debits the sender and credits the receiver. Committed blocks only;
    /// tentative blocks have no balance effect.
    pub fn apply_transfer(&mut self, block: &Block) {
        if !block.is_committed() {
            return;
        }
        let value = &block.value;
        *self.balances.entry(value.sender_id).or_insert(0) -= value.amount;
        *self.balances.entry(value.receiver_id).or_insert(0) += value.amount;
    }

    /// One line per block, oldest first.
    pub fn format_chain(&self) -> String {
        let mut out = String::new();
        for (i, block) in self.chain.blocks().iter().enumerate() {
            let value = &block.value;
            let _ = writeln!(
                out,
                "[{i}] {} -> {} amount = {} hash = {} prev = {} ({})",
                value.sender_id,
                value.receiver_id,
                value.amount,
                value.hash,
                value.prev_hash,
                block.tag.as_str(),
            );
        }
        out
    }

    /// Balance table in id order, `{1: 100, 2: 110, ...}`.
    pub fn format_balances(&self) -> String {
        let entries: Vec<String> = self
            .balances
            .iter()
            .map(|(id, balance)| format!("{id}: {balance}"))
            .collect();
        format!("{{{}}}", entries.join(", "))
    }
}
