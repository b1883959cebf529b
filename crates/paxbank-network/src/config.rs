//! Peer table and transport configuration.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

/// Static peer membership: id -> address. The cluster is fixed for the
/// lifetime of the process; there is no discovery or dynamic membership.
#[derive(Debug, Clone)]
pub struct PeerTable {
    peers: BTreeMap<u64, SocketAddr>,
}

impl PeerTable {
    pub fn new(peers: BTreeMap<u64, SocketAddr>) -> Self {
        Self { peers }
    }

    /// The reference deployment: peers 1..=5 on localhost ports 8001..8005.
    pub fn standard() -> Self {
        let peers = (1..=5u64)
            .map(|id| {
                let addr: SocketAddr = format!("127.0.0.1:{}", 8000 + id).parse().unwrap();
                (id, addr)
            })
            .collect();
        Self { peers }
    }

    pub fn addr(&self, id: u64) -> Option<SocketAddr> {
        self.peers.get(&id).copied()
    }

    /// All peer ids except `self_id`, in id order.
    pub fn others(&self, self_id: u64) -> Vec<u64> {
        self.peers.keys().copied().filter(|id| *id != self_id).collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Votes needed to decide, counting the proposer's self-vote.
    pub fn majority(&self) -> usize {
        self.len() / 2 + 1
    }
}

/// Transport timing knobs.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Artificial delay applied before every outbound send. Models slow
    /// links; concurrent-proposer behavior depends on it being non-zero in
    /// a real deployment, so it is configurable but defaults to 3 s.
    pub send_delay: Duration,

    /// Timeout covering connect plus the wait for the single response.
    pub reply_timeout: Duration,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            send_delay: Duration::from_secs(3),
            reply_timeout: Duration::from_secs(5),
        }
    }
}

impl NetConfig {
    /// Sets the artificial pre-send delay.
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    /// Sets the reply timeout.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }
}
