// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! VLAN tag type and manipulation.

use etherparse::{EtherType, SingleVlanHeader, VlanId, VlanPcp};

/// Error for VLAN identifiers outside the 12-bit space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid vlan id {0}")]
pub struct InvalidVlanId(pub u16);

/// An 802.1Q VLAN tag.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vlan(pub(crate) SingleVlanHeader);

impl Vlan {
    /// Length of a VLAN tag in bytes.
    pub const LEN: usize = SingleVlanHeader::LEN;

    /// Assemble a tag with the given id, priority zero, carrying `ether_type`.
    #[allow(clippy::unwrap_used)] // zero is always a valid priority
    pub fn new(vid: u16, ether_type: EtherType) -> Result<Self, InvalidVlanId> {
        let vlan_id = VlanId::try_new(vid).map_err(|_| InvalidVlanId(vid))?;
        Ok(Self(SingleVlanHeader {
            pcp: VlanPcp::try_new(0).unwrap(),
            drop_eligible_indicator: false,
            vlan_id,
            ether_type,
        }))
    }

    /// The VLAN identifier.
    #[must_use]
    pub fn vid(&self) -> u16 {
        self.0.vlan_id.value()
    }

    /// Rewrite the VLAN identifier, keeping priority and inner ethertype.
    pub fn set_vid(&mut self, vid: u16) -> Result<(), InvalidVlanId> {
        self.0.vlan_id = VlanId::try_new(vid).map_err(|_| InvalidVlanId(vid))?;
        Ok(())
    }

    /// The ethertype of the encapsulated payload.
    #[must_use]
    pub fn ether_type(&self) -> EtherType {
        self.0.ether_type
    }

    pub(crate) fn to_bytes(&self) -> [u8; SingleVlanHeader::LEN] {
        self.0.to_bytes()
    }
}
