// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Protocol tags for the translated protocols.

use std::fmt::{Display, Formatter};
use std::ops::{Index, IndexMut};

/// The L4 protocols the translator handles.  Everything else is classified as
/// unsupported at parse time and dropped.
///
/// The discriminants are the IANA protocol numbers so the tag round-trips
/// with the IPv4 header's protocol field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Proto {
    /// ICMP (protocol number 1).  The echo identifier plays the role of the
    /// L4 port in translation state.
    Icmp = 1,
    /// TCP (protocol number 6).
    Tcp = 6,
    /// UDP (protocol number 17).
    Udp = 17,
}

impl Proto {
    /// All translated protocols, in table-index order.
    pub const ALL: [Proto; 3] = [Proto::Icmp, Proto::Tcp, Proto::Udp];

    /// The IANA protocol number of this tag.
    #[must_use]
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Dense index into per-protocol tables.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Proto::Icmp => 0,
            Proto::Tcp => 1,
            Proto::Udp => 2,
        }
    }
}

/// Error for protocol numbers outside the translated set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unsupported ip protocol number {0}")]
pub struct UnsupportedProto(pub u8);

impl TryFrom<u8> for Proto {
    type Error = UnsupportedProto;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Proto::Icmp),
            6 => Ok(Proto::Tcp),
            17 => Ok(Proto::Udp),
            other => Err(UnsupportedProto(other)),
        }
    }
}

impl Display for Proto {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Proto::Icmp => write!(f, "ICMP"),
            Proto::Tcp => write!(f, "TCP"),
            Proto::Udp => write!(f, "UDP"),
        }
    }
}

/// A fixed three-slot container indexed by [`Proto`].
///
/// Used for the per-protocol translation tables and port maps.
#[derive(Debug, Default)]
pub struct PerProto<T>([T; 3]);

impl<T> PerProto<T> {
    /// Build a [`PerProto`] by calling `f` once per protocol.
    pub fn new_with(mut f: impl FnMut(Proto) -> T) -> Self {
        Self([f(Proto::Icmp), f(Proto::Tcp), f(Proto::Udp)])
    }

    /// Iterate over `(proto, slot)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Proto, &T)> {
        Proto::ALL.into_iter().map(|p| (p, &self.0[p.index()]))
    }
}

impl<T> Index<Proto> for PerProto<T> {
    type Output = T;

    fn index(&self, proto: Proto) -> &T {
        &self.0[proto.index()]
    }
}

impl<T> IndexMut<Proto> for PerProto<T> {
    fn index_mut(&mut self, proto: Proto) -> &mut T {
        &mut self.0[proto.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proto_numbers_round_trip() {
        for proto in Proto::ALL {
            assert_eq!(Proto::try_from(proto.number()), Ok(proto));
        }
        assert_eq!(Proto::try_from(89), Err(UnsupportedProto(89)));
    }

    #[test]
    fn per_proto_indexing() {
        let mut slots = PerProto::new_with(|p| p.number());
        assert_eq!(slots[Proto::Icmp], 1);
        assert_eq!(slots[Proto::Udp], 17);
        slots[Proto::Tcp] = 99;
        assert_eq!(slots[Proto::Tcp], 99);
        assert_eq!(slots.iter().count(), 3);
    }
}
