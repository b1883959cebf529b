//! Request/response round trips over localhost.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use paxbank_network::{
    Handler, Listener, NetConfig, NetworkError, PeerTable, Request, Response, Transport,
};
use paxbank_types::Ballot;

fn fast_config() -> NetConfig {
    NetConfig::default()
        .with_send_delay(Duration::ZERO)
        .with_reply_timeout(Duration::from_secs(2))
}

async fn spawn_peer(handler: Handler, failed: Arc<AtomicBool>) -> std::net::SocketAddr {
    let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    listener.spawn(handler, failed);
    addr
}

fn table_with(id: u64, addr: std::net::SocketAddr) -> PeerTable {
    let mut peers = BTreeMap::new();
    peers.insert(id, addr);
    PeerTable::new(peers)
}

#[tokio::test]
async fn test_request_response_round_trip() {
    let handler: Handler = Arc::new(|request| match request {
        Request::Prepare { ballot } => {
            assert_eq!(ballot, Ballot::new(0, 1, 0));
            Some(Response::Promise {
                accepted_num: None,
                accepted_val: None,
            })
        }
        _ => Some(Response::Reject),
    });
    let addr = spawn_peer(handler, Arc::new(AtomicBool::new(false))).await;

    let transport = Transport::new(table_with(2, addr), fast_config());
    let response = transport
        .send(
            2,
            &Request::Prepare {
                ballot: Ballot::new(0, 1, 0),
            },
        )
        .await
        .unwrap();

    assert_eq!(
        response,
        Response::Promise {
            accepted_num: None,
            accepted_val: None,
        }
    );
}

#[tokio::test]
async fn test_unreachable_peer_is_an_error() {
    // nothing is listening on this address
    let transport = Transport::new(
        table_with(3, "127.0.0.1:47".parse().unwrap()),
        fast_config(),
    );
    let result = transport
        .send(
            3,
            &Request::Prepare {
                ballot: Ballot::new(0, 1, 0),
            },
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_unknown_peer_is_an_error() {
    let transport = Transport::new(PeerTable::standard(), fast_config());
    let result = transport
        .send(
            9,
            &Request::Prepare {
                ballot: Ballot::new(0, 1, 0),
            },
        )
        .await;
    assert!(matches!(result, Err(NetworkError::UnknownPeer(9))));
}

#[tokio::test]
async fn test_failed_peer_drops_connections_unread() {
    let handler: Handler = Arc::new(|_| panic!("handler must not run while failed"));
    let failed = Arc::new(AtomicBool::new(true));
    let addr = spawn_peer(handler, failed.clone()).await;

    let transport = Transport::new(table_with(4, addr), fast_config());
    let result = transport
        .send(
            4,
            &Request::Prepare {
                ballot: Ballot::new(0, 1, 0),
            },
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_handler_none_closes_without_reply() {
    let handler: Handler = Arc::new(|_| None);
    let addr = spawn_peer(handler, Arc::new(AtomicBool::new(false))).await;

    let transport = Transport::new(table_with(5, addr), fast_config());
    let result = transport
        .send(
            5,
            &Request::Prepare {
                ballot: Ballot::new(0, 1, 0),
            },
        )
        .await;
    assert!(matches!(result, Err(NetworkError::ConnectionClosed(5))));
}
