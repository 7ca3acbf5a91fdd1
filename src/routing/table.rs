use super::node::Contact;
use crate::id::NodeId;
use std::collections::{vec_deque, HashSet, VecDeque};

/// Default maximum number of contacts kept in the table.
pub const DEFAULT_CAPACITY: usize = 600;

/// Number of contacts advertised in replies to `find_node` and `get_peers`.
pub const REPLY_NODE_COUNT: usize = 8;

/// Bounded, insertion-ordered store of contacts learned from responses.
///
/// Unlike a Kademlia bucket table this keeps no liveness information and does not sort
/// by distance: the crawler consumes contacts in the order they arrived (see
/// [`RoutingTable::shift`]) and evicts the oldest one when it runs out of room.
pub struct RoutingTable {
    node_id: NodeId,
    capacity: usize,
    // Invariant: `ids` holds exactly the ids of `nodes`.
    nodes: VecDeque<Contact>,
    ids: HashSet<NodeId>,
}

impl RoutingTable {
    /// Create a new RoutingTable with the given node id as our id.
    pub fn new(node_id: NodeId, capacity: usize) -> RoutingTable {
        RoutingTable {
            node_id,
            capacity,
            nodes: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
        }
    }

    /// Return the node id of the RoutingTable.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add the contact to the end of the table.
    ///
    /// Contacts with our own id or an unusable port are rejected, and a contact whose id
    /// is already present is ignored (its position is not refreshed). When the table is
    /// full the oldest contact is evicted to make room.
    ///
    /// Returns whether the contact was inserted.
    pub fn add(&mut self, contact: Contact) -> bool {
        if !contact.is_valid_for(self.node_id) || self.ids.contains(&contact.id) {
            return false;
        }

        if self.nodes.len() >= self.capacity {
            if let Some(evicted) = self.shift() {
                log::trace!("Evicted {:?} from full routing table", evicted);
            }
        }

        self.ids.insert(contact.id);
        self.nodes.push_back(contact);

        true
    }

    /// Remove and return the oldest contact.
    pub fn shift(&mut self) -> Option<Contact> {
        let contact = self.nodes.pop_front()?;
        self.ids.remove(&contact.id);
        Some(contact)
    }

    /// Up to `count` contacts, oldest first.
    ///
    /// This stands in for "the closest contacts we know of". We harvest rather than
    /// route, so no XOR ordering is done.
    pub fn first(&self, count: usize) -> Vec<Contact> {
        self.nodes.iter().take(count).copied().collect()
    }

    /// Iterator over all contacts, oldest first.
    pub fn nodes(&self) -> vec_deque::Iter<'_, Contact> {
        self.nodes.iter()
    }
}

// ----------------------------------------------------------------------------//
