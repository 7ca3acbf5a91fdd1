pub use self::{
    crawl::{DEFAULT_JOIN_INTERVAL, DEFAULT_WALK_INTERVAL, DEFAULT_WALK_SATURATION},
    socket::SocketTrait,
};
pub(crate) use self::{crawl::CrawlConfig, handler::DhtHandler, socket::Socket};

use crate::routing::node::Contact;
use std::{
    io,
    net::{SocketAddr, SocketAddrV4},
};
use thiserror::Error;
use tokio::sync::oneshot;

mod crawl;
mod engine;
mod handler;
mod socket;
mod timer;

/// Snapshot of the crawler's internal state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct State {
    /// Number of contacts currently in the routing table.
    pub node_count: usize,
    /// Maximum number of contacts the routing table holds.
    pub capacity: usize,
    /// Whether the walk is running (it pauses while the table is saturated).
    pub walking: bool,
}

/// What the crawler observed on the network.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CrawlEvent {
    /// Usable contacts received in a response: not ourselves and with a non-zero port.
    /// Those whose id was already in the routing table are included too.
    NodesDiscovered(Vec<Contact>),
    /// Somebody asked for peers of this info-hash (40 uppercase hex characters). A
    /// weak signal: the hash may not even exist.
    InfoHashObserved(String),
    /// A peer at `addr` announced that it holds `info_hash`.
    InfoHashConfirmed { info_hash: String, addr: SocketAddr },
}

/// Task that our crawler will execute immediately.
pub(crate) enum OneshotTask {
    /// Get the local address the socket is bound to.
    GetLocalAddr(oneshot::Sender<SocketAddr>),
    /// Retrieve a snapshot of the crawler state.
    GetState(oneshot::Sender<State>),
    /// Retrieve the contacts of the routing table, oldest first.
    LoadContacts(oneshot::Sender<Vec<Contact>>),
    /// Stop crawling and exit the worker.
    Shutdown,
}

/// Task that our crawler will execute some time later.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ScheduledTask {
    /// Query the bootstrap routers.
    Join,
    /// Query the next contact from the routing table.
    Walk,
}

#[derive(Error, Debug)]
pub(crate) enum WorkerError {
    #[error("invalid bencode data")]
    InvalidBencode(#[source] serde_bencode::Error),
    #[error("announce with an invalid token")]
    InvalidToken,
    #[error("announce with an invalid port")]
    InvalidPort,
    #[error("socket error")]
    SocketError(#[from] io::Error),
}

/// Resolve `host:port` strings, keeping the IPv4 results only.
pub(crate) async fn resolve(routers: &[String]) -> Vec<SocketAddrV4> {
    let mut addrs: Vec<_> =
        futures_util::future::join_all(routers.iter().map(tokio::net::lookup_host))
            .await
            .into_iter()
            .filter_map(|result| result.ok())
            .flatten()
            .filter_map(|addr| match addr {
                SocketAddr::V4(addr) => Some(addr),
                SocketAddr::V6(_) => None,
            })
            .collect();

    addrs.sort();
    addrs.dedup();
    addrs
}
