//! paxbank node
//!
//! One peer of the replicated bank ledger, wiring the components together:
//!
//! ```text
//! +--------------------+
//! |        Node        |
//! +--------------------+
//! |  +-------------+   |
//! |  |  Consensus  |   |  <- per-slot Paxos rounds
//! |  +-------------+   |
//! |  +-------------+   |
//! |  |   Network   |   |  <- point-to-point request/response
//! |  +-------------+   |
//! |  +-------------+   |
//! |  |   Storage   |   |  <- node_<id>_state.json snapshot
//! |  +-------------+   |
//! |  +-------------+   |
//! |  |   Ledger    |   |  <- chain + balances
//! |  +-------------+   |
//! +--------------------+
//! ```
//!
//! The binary runs a stdin REPL (`moneyTransfer`, `failProcess`,
//! `fixProcess`, `printBlockchain`, `printBalance`) on the main task and
//! serves consensus traffic in the background.

#![forbid(unsafe_code)]

pub mod repl;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use paxbank_consensus::{ConsensusEngine, ConsensusError, PeerState, RoundOutcome};
use paxbank_network::{Handler, Listener, NetConfig, NetworkError, PeerTable, Transport};
use paxbank_storage::{StorageError, Store};
use paxbank_types::Block;

/// Node errors.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// This peer's id; also the account it may initiate transfers from.
    pub node_id: u64,

    /// Directory holding the snapshot file.
    pub data_dir: PathBuf,

    /// Static cluster membership.
    pub peers: PeerTable,

    /// Transport timing (artificial delay, reply timeout).
    pub net: NetConfig,
}

impl NodeConfig {
    /// Defaults: current directory, the standard 5-peer localhost table,
    /// 3 s link delay.
    pub fn new(node_id: u64) -> Self {
        Self {
            node_id,
            data_dir: PathBuf::from("."),
            peers: PeerTable::standard(),
            net: NetConfig::default(),
        }
    }

    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.data_dir = data_dir;
        self
    }

    pub fn with_peers(mut self, peers: PeerTable) -> Self {
        self.peers = peers;
        self
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.net.send_delay = delay;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.net.reply_timeout = timeout;
        self
    }
}

/// A running peer: consensus engine plus its listener.
pub struct Node {
    config: NodeConfig,
    engine: Arc<ConsensusEngine>,
    failed: Arc<AtomicBool>,
}

impl Node {
    /// Builds the peer, loading any existing snapshot from the data
    /// directory.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        std::fs::create_dir_all(&config.data_dir)?;

        let num_peers = config.peers.len() as u64;
        let store = Store::new(&config.data_dir, config.node_id);
        let state = match store.load() {
            Some(snapshot) => PeerState::from_snapshot(snapshot, num_peers),
            None => PeerState::new(num_peers),
        };

        let transport = Transport::new(config.peers.clone(), config.net.clone());
        let failed = Arc::new(AtomicBool::new(false));
        let engine = Arc::new(ConsensusEngine::new(
            config.node_id,
            state,
            store,
            transport,
            failed.clone(),
        ));

        Ok(Self {
            config,
            engine,
            failed,
        })
    }

    /// Binds this peer's listen address and starts serving consensus
    /// traffic in the background. Returns once the socket is bound.
    pub async fn start(&self) -> Result<JoinHandle<()>, NodeError> {
        let addr = self
            .config
            .peers
            .addr(self.config.node_id)
            .ok_or_else(|| {
                NodeError::Config(format!(
                    "node id {} missing from the peer table",
                    self.config.node_id
                ))
            })?;

        let listener = Listener::bind(addr).await?;
        let bound = listener.local_addr()?;

        let engine = self.engine.clone();
        let handler: Handler = Arc::new(move |request| engine.handle_request(request));
        let task = listener.spawn(handler, self.failed.clone());

        info!(node = self.config.node_id, addr = %bound, "listening");
        Ok(task)
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn engine(&self) -> &ConsensusEngine {
        &self.engine
    }

    pub fn node_id(&self) -> u64 {
        self.config.node_id
    }

    pub fn is_failed(&self) -> bool {
        self.engine.is_failed()
    }

    /// Runs one proposer round for a local transfer.
    pub async fn money_transfer(
        &self,
        sender_id: u64,
        receiver_id: u64,
        amount: i64,
    ) -> Result<RoundOutcome, ConsensusError> {
        self.engine.propose(sender_id, receiver_id, amount).await
    }

    pub fn fail_process(&self) {
        self.engine.fail_process();
    }

    pub fn fix_process(&self) {
        self.engine.fix_process();
    }

    /// Current chain length.
    pub fn depth(&self) -> u64 {
        self.engine.with_state(|state| state.ledger().depth())
    }

    pub fn balance(&self, id: u64) -> i64 {
        self.engine.with_state(|state| state.ledger().balance(id))
    }

    pub fn block_at(&self, depth: u64) -> Option<Block> {
        self.engine
            .with_state(|state| state.ledger().block_at(depth).cloned())
    }

    /// Rendered chain, one line per block.
    pub fn print_blockchain(&self) -> String {
        self.engine.with_state(|state| state.ledger().format_chain())
    }

    /// Rendered balance table.
    pub fn print_balance(&self) -> String {
        self.engine
            .with_state(|state| state.ledger().format_balances())
    }
}
