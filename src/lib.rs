//! Crawler for the Bittorrent Mainline Distributed Hash Table.
//!
//! The crawler takes part in the DHT just enough to be asked things: it answers
//! `ping`, `find_node`, `get_peers` and `announce_peer` queries and keeps exploring the
//! network with `find_node` queries of its own. What it learns comes out as a stream of
//! [`CrawlEvent`]s, most notably the info-hashes peers announce they hold.
//!
//! It stores no peers and answers every `get_peers` with nodes only.

pub mod router;

mod builder;
mod compact;
mod id;
mod message;
mod routing;
mod token;
mod worker;

pub use crate::builder::{Crawler, CrawlerBuilder, Error};
pub use crate::id::{Distance, Id, InfoHash, LengthError, NodeId, ID_LEN};
pub use crate::routing::{node::Contact, table::DEFAULT_CAPACITY};
pub use crate::token::DEFAULT_ROTATION_INTERVAL;
pub use crate::worker::{
    CrawlEvent, SocketTrait, State, DEFAULT_JOIN_INTERVAL, DEFAULT_WALK_INTERVAL,
    DEFAULT_WALK_SATURATION,
};

/// Port the crawler conventionally listens on.
pub const DEFAULT_PORT: u16 = 4048;
