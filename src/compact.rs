//! Compact representation

use crate::id::ID_LEN;
use std::{
    convert::TryInto,
    net::{Ipv4Addr, SocketAddrV4},
};

const SOCKET_ADDR_V4_LEN: usize = 6;
const CONTACT_V4_LEN: usize = ID_LEN + SOCKET_ADDR_V4_LEN;

/// Serialize/deserialize `Vec` of `Contact` in compact format.
pub(crate) mod nodes_v4 {
    use crate::{id::NodeId, routing::node::Contact};
    use serde::{
        de::{Deserialize, Deserializer, Error as _},
        ser::Serializer,
    };
    use serde_bytes::ByteBuf;
    use std::convert::TryFrom;

    pub(crate) fn serialize<S>(nodes: &[Contact], s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_bytes(&encode(nodes))
    }

    pub(crate) fn deserialize<'de, D>(d: D) -> Result<Vec<Contact>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let buffer = ByteBuf::deserialize(d)?;
        let chunks = buffer.chunks_exact(super::CONTACT_V4_LEN);

        if !chunks.remainder().is_empty() {
            let msg = format!("multiple of {}", super::CONTACT_V4_LEN);
            return Err(D::Error::invalid_length(buffer.len(), &msg.as_ref()));
        }

        let nodes = chunks
            .filter_map(|chunk| {
                let id = NodeId::try_from(&chunk[..super::ID_LEN]).ok()?;
                let addr = super::decode_socket_addr(&chunk[super::ID_LEN..])?;

                Some(Contact { id, addr })
            })
            .collect();

        Ok(nodes)
    }

    fn encode(nodes: &[Contact]) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(nodes.len() * super::CONTACT_V4_LEN);

        for node in nodes {
            buffer.extend(node.id.as_ref());
            buffer.extend(super::encode_socket_addr(&node.addr));
        }

        buffer
    }
}

/// Same as `nodes_v4` but for an optional field. Pair with
/// `#[serde(default, skip_serializing_if = "Option::is_none")]`.
pub(crate) mod optional_nodes_v4 {
    use crate::routing::node::Contact;
    use serde::{Deserializer, Serializer};

    pub(crate) fn serialize<S>(nodes: &Option<Vec<Contact>>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match nodes {
            Some(nodes) => super::nodes_v4::serialize(nodes, s),
            None => s.serialize_none(),
        }
    }

    pub(crate) fn deserialize<'de, D>(d: D) -> Result<Option<Vec<Contact>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        super::nodes_v4::deserialize(d).map(Some)
    }
}

fn decode_socket_addr(src: &[u8]) -> Option<SocketAddrV4> {
    if src.len() != SOCKET_ADDR_V4_LEN {
        return None;
    }

    let addr: [u8; 4] = src.get(..4)?.try_into().ok()?;
    let port = u16::from_be_bytes(src.get(4..)?.try_into().ok()?);

    Some(SocketAddrV4::new(Ipv4Addr::from(addr), port))
}

fn encode_socket_addr(addr: &SocketAddrV4) -> [u8; SOCKET_ADDR_V4_LEN] {
    let mut buffer = [0u8; SOCKET_ADDR_V4_LEN];
    buffer[..4].copy_from_slice(&addr.ip().octets());
    buffer[4..].copy_from_slice(&addr.port().to_be_bytes());
    buffer
}
