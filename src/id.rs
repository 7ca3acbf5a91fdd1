use rand::{
    distributions::{Distribution, Standard},
    Rng,
};
use serde::{Deserialize, Serialize};
use std::{
    convert::{TryFrom, TryInto},
    fmt,
    ops::BitXor,
};
use thiserror::Error;

/// Length of a node id or an info-hash.
pub const ID_LEN: usize = 20;

/// Number of leading bytes of the target that `Id::neighbor` keeps.
pub const NEIGHBOR_PREFIX_LEN: usize = ID_LEN / 2;

/// 160-bit identifier of nodes and objects on the DHT.
///
/// Ids carry no order of their own. To compare how close two ids are, use
/// [`Id::distance`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Id(#[serde(with = "byte_array")] [u8; ID_LEN]);

impl Id {
    /// Uniformly random id.
    pub fn random() -> Self {
        rand::random()
    }

    /// XOR distance between the two ids.
    pub fn distance(&self, other: &Id) -> Distance {
        Distance((*self ^ *other).0)
    }

    /// Synthesize an id that looks topologically close to `target`: the leading
    /// `NEIGHBOR_PREFIX_LEN` bytes come from `target`, the rest from `this`.
    ///
    /// Replying with such an id makes the remote node more likely to keep us in its
    /// routing table and to keep talking to us.
    pub fn neighbor(target: Id, this: Id) -> Self {
        let mut bytes = this.0;
        bytes[..NEIGHBOR_PREFIX_LEN].copy_from_slice(&target.0[..NEIGHBOR_PREFIX_LEN]);
        Self(bytes)
    }
}

impl AsRef<[u8]> for Id {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Id> for [u8; ID_LEN] {
    fn from(id: Id) -> [u8; ID_LEN] {
        id.0
    }
}

impl From<[u8; ID_LEN]> for Id {
    fn from(bytes: [u8; ID_LEN]) -> Id {
        Self(bytes)
    }
}

#[derive(Debug, Error)]
#[error("invalid id length")]
pub struct LengthError;

impl<'a> TryFrom<&'a [u8]> for Id {
    type Error = LengthError;

    fn try_from(slice: &'a [u8]) -> Result<Self, Self::Error> {
        Ok(Self(slice.try_into().map_err(|_| LengthError)?))
    }
}

impl BitXor for Id {
    type Output = Self;

    fn bitxor(mut self, rhs: Self) -> Self {
        for (src, dst) in rhs.0.iter().zip(self.0.iter_mut()) {
            *dst ^= *src;
        }

        self
    }
}

impl Distribution<Id> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Id {
        Id(rng.gen())
    }
}

impl fmt::LowerHex for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }

        Ok(())
    }
}

impl fmt::UpperHex for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02X}", b)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:x}", self)
    }
}

/// XOR distance between two ids, ordered as an unsigned big-endian integer. Smaller
/// is closer.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Distance([u8; ID_LEN]);

mod byte_array {
    use super::ID_LEN;
    use serde::{
        de::{Deserialize, Deserializer, Error},
        ser::{Serialize, Serializer},
    };
    use serde_bytes::{ByteBuf, Bytes};
    use std::convert::TryInto;

    pub(super) fn serialize<S: Serializer>(bytes: &[u8; ID_LEN], s: S) -> Result<S::Ok, S::Error> {
        Bytes::new(bytes.as_ref()).serialize(s)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; ID_LEN], D::Error> {
        let buf = ByteBuf::deserialize(d)?.into_vec();
        let len = buf.len();

        buf.try_into()
            .map_err(|_| D::Error::invalid_length(len, &"20 bytes"))
    }
}

// ----------------------------------------------------------------------------//

/// Bittorrent `NodeId`.
pub type NodeId = Id;

/// Bittorrent `InfoHash`.
pub type InfoHash = Id;

// ----------------------------------------------------------------------------//
