use crate::id::NodeId;
use std::{
    fmt::{self, Debug, Formatter},
    hash::{Hash, Hasher},
    net::{SocketAddr, SocketAddrV4},
};

/// Remote participant of the DHT: node id + its socket address.
///
/// Two contacts are equal when their ids are equal, regardless of their address.
#[derive(Copy, Clone)]
pub struct Contact {
    pub id: NodeId,
    pub addr: SocketAddrV4,
}

impl Contact {
    pub fn new(id: NodeId, addr: SocketAddrV4) -> Self {
        Self { id, addr }
    }

    /// Whether this contact can be stored in a routing table owned by `this_node_id`:
    /// it must not be ourselves and must have a non-zero port.
    pub fn is_valid_for(&self, this_node_id: NodeId) -> bool {
        self.id != this_node_id && is_valid_port(self.addr.port())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(self.addr)
    }
}

impl Eq for Contact {}

impl PartialEq for Contact {
    fn eq(&self, other: &Contact) -> bool {
        self.id == other.id
    }
}

impl Hash for Contact {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.id.hash(state);
    }
}

impl Debug for Contact {
    fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
        f.debug_struct("Contact")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .finish()
    }
}

/// Ports 1..=65535 are usable, 0 is not.
pub(crate) fn is_valid_port(port: u16) -> bool {
    port != 0
}
