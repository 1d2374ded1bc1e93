// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ethernet header type and manipulation.

pub mod mac;

use crate::eth::mac::Mac;
use etherparse::{EtherType, Ethernet2Header};

/// An ethernet header.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eth(pub(crate) Ethernet2Header);

impl Eth {
    /// Length of an ethernet header in bytes.
    pub const LEN: usize = Ethernet2Header::LEN;

    /// Assemble an ethernet header from its parts.
    #[must_use]
    pub fn new(source: Mac, destination: Mac, ether_type: EtherType) -> Self {
        Self(Ethernet2Header {
            source: source.0,
            destination: destination.0,
            ether_type,
        })
    }

    /// Get the source [`Mac`] of the header.
    #[must_use]
    pub fn source(&self) -> Mac {
        Mac(self.0.source)
    }

    /// Get the destination [`Mac`] of the header.
    #[must_use]
    pub fn destination(&self) -> Mac {
        Mac(self.0.destination)
    }

    /// Set the source [`Mac`] of the header.
    pub fn set_source(&mut self, mac: Mac) -> &mut Self {
        self.0.source = mac.0;
        self
    }

    /// Set the destination [`Mac`] of the header.
    pub fn set_destination(&mut self, mac: Mac) -> &mut Self {
        self.0.destination = mac.0;
        self
    }

    /// The ethertype following this header (the VLAN tag's ethertype for
    /// tagged frames).
    #[must_use]
    pub fn ether_type(&self) -> EtherType {
        self.0.ether_type
    }

    pub(crate) fn set_ether_type(&mut self, ether_type: EtherType) {
        self.0.ether_type = ether_type;
    }

    pub(crate) fn to_bytes(&self) -> [u8; Ethernet2Header::LEN] {
        self.0.to_bytes()
    }
}
