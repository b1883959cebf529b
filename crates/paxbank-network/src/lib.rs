//! paxbank network
//!
//! Point-to-point transport for the consensus protocol. Every exchange is
//! one connection carrying one newline-terminated JSON request and at most
//! one JSON response:
//! - [`Transport::send`] opens a fresh connection, applies the artificial
//!   link delay, and awaits the single response under a timeout
//! - [`Listener`] accepts inbound connections and hands each request to the
//!   registered handler on its own task
//!
//! A peer in the failed state keeps its listener socket open but drops every
//! connection unread, so from the outside it looks crashed.

#![forbid(unsafe_code)]

mod config;
mod error;
mod message;
mod transport;

pub use config::{NetConfig, PeerTable};
pub use error::{NetworkError, NetworkResult};
pub use message::{Request, Response};
pub use transport::{Handler, Listener, Transport};
