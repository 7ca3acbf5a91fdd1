//! Some known public DHT routers.

pub const BITTORRENT_DHT: &str = "router.bittorrent.com:6881";
pub const TRANSMISSION_DHT: &str = "dht.transmissionbt.com:6881";

/// Routers the crawler joins through unless told otherwise.
pub const DEFAULT_ROUTERS: &[&str] = &[BITTORRENT_DHT, TRANSMISSION_DHT];
