//! Outbound sends and the inbound listener.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, error, warn};

use crate::config::{NetConfig, PeerTable};
use crate::error::{NetworkError, NetworkResult};
use crate::message::{Request, Response};

/// Inbound request handler. Runs on the connection's task; returning `None`
/// closes the connection without a reply (the protocol-violation path).
pub type Handler = Arc<dyn Fn(Request) -> Option<Response> + Send + Sync>;

/// Outbound side of the transport: one fresh connection per request.
#[derive(Debug, Clone)]
pub struct Transport {
    peers: PeerTable,
    config: NetConfig,
}

impl Transport {
    pub fn new(peers: PeerTable, config: NetConfig) -> Self {
        Self { peers, config }
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Sends one request and awaits its single response.
    ///
    /// The artificial link delay runs first, then connect + write + read
    /// race the reply timeout. Every error outcome means "no vote" to the
    /// caller; nothing here is fatal.
    pub async fn send(&self, peer: u64, request: &Request) -> NetworkResult<Response> {
        let addr = self.peers.addr(peer).ok_or(NetworkError::UnknownPeer(peer))?;

        debug!(peer, message = request.name(), ballot = %request.ballot(), "sending");
        tokio::time::sleep(self.config.send_delay).await;

        let exchange = async {
            let stream = TcpStream::connect(addr).await?;
            let mut framed = Framed::new(stream, LinesCodec::new());

            framed.send(serde_json::to_string(request)?).await?;

            let line = framed
                .next()
                .await
                .ok_or(NetworkError::ConnectionClosed(peer))??;
            let response: Response = serde_json::from_str(&line)?;
            Ok::<Response, NetworkError>(response)
        };

        match tokio::time::timeout(self.config.reply_timeout, exchange).await {
            Ok(Ok(response)) => {
                debug!(peer, message = response.name(), "received");
                Ok(response)
            }
            Ok(Err(err)) => {
                debug!(peer, error = %err, "send failed");
                Err(err)
            }
            Err(_) => {
                debug!(peer, "send timed out");
                Err(NetworkError::Timeout(peer))
            }
        }
    }
}

/// Inbound side: accepts connections and dispatches each to the handler on
/// its own task, so one slow peer cannot block the others.
pub struct Listener {
    inner: tokio::net::TcpListener,
}

impl Listener {
    /// Binds with `SO_REUSEADDR` so a repaired peer can rebind its port
    /// immediately after a restart.
    pub async fn bind(addr: SocketAddr) -> NetworkResult<Self> {
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        Ok(Self {
            inner: socket.listen(1024)?,
        })
    }

    pub fn local_addr(&self) -> NetworkResult<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Runs the accept loop on a background task.
    ///
    /// While `failed` is set the listener keeps accepting but drops every
    /// connection unread, which makes the peer indistinguishable from a
    /// crashed process.
    pub fn spawn(self, handler: Handler, failed: Arc<AtomicBool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.inner.accept().await {
                    Ok((stream, addr)) => {
                        if failed.load(Ordering::SeqCst) {
                            drop(stream);
                            continue;
                        }
                        debug!(%addr, "accepted connection");
                        let handler = handler.clone();
                        tokio::spawn(handle_connection(stream, handler));
                    }
                    Err(err) => {
                        error!(error = %err, "accept failed");
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                }
            }
        })
    }
}

/// Reads the one request off a connection, runs the handler, writes the one
/// response. Malformed input or a `None` from the handler closes the
/// connection without a reply.
async fn handle_connection(stream: TcpStream, handler: Handler) {
    let mut framed = Framed::new(stream, LinesCodec::new());

    let line = match framed.next().await {
        Some(Ok(line)) => line,
        Some(Err(err)) => {
            warn!(error = %err, "failed to read request");
            return;
        }
        None => return,
    };

    let request: Request = match serde_json::from_str(&line) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "malformed request, closing without reply");
            return;
        }
    };

    let Some(response) = handler(request) else {
        return;
    };

    let json = match serde_json::to_string(&response) {
        Ok(json) => json,
        Err(err) => {
            error!(error = %err, "failed to encode response");
            return;
        }
    };

    if let Err(err) = framed.send(json).await {
        debug!(error = %err, "failed to write response");
    }
}
