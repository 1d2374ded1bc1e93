// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `ICMPv4` header type and manipulation.
//!
//! Translation state keys ICMP flows by the echo identifier, so only echo
//! request and echo reply expose one.  Other ICMP message types return
//! `None` from [`Icmp4::identifier`] and are dropped by the engine.

use etherparse::{Icmpv4Header, Icmpv4Type};

/// An `ICMPv4` header.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icmp4(pub(crate) Icmpv4Header);

impl Icmp4 {
    /// The echo identifier, for echo request/reply messages.
    #[must_use]
    pub fn identifier(&self) -> Option<u16> {
        match &self.0.icmp_type {
            Icmpv4Type::EchoRequest(echo) | Icmpv4Type::EchoReply(echo) => Some(echo.id),
            _ => None,
        }
    }

    /// Rewrite the echo identifier.  Returns `false` for message types that
    /// carry none.
    pub fn set_identifier(&mut self, id: u16) -> bool {
        match &mut self.0.icmp_type {
            Icmpv4Type::EchoRequest(echo) | Icmpv4Type::EchoReply(echo) => {
                echo.id = id;
                true
            }
            _ => false,
        }
    }

    /// Recompute and store the checksum over `payload`.
    pub fn update_checksum(&mut self, payload: &[u8]) {
        self.0.checksum = self.0.icmp_type.calc_checksum(payload);
    }

    /// The stored checksum.
    #[must_use]
    pub fn checksum(&self) -> u16 {
        self.0.checksum
    }
}
