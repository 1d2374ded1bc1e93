// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! UDP header type and manipulation.

use crate::ipv4::Ipv4;
use etherparse::UdpHeader;

/// Error computing a UDP checksum (payload too large for the pseudo header).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("udp payload too large for checksum computation")]
pub struct UdpChecksumError;

/// A UDP header.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Udp(pub(crate) UdpHeader);

impl Udp {
    /// Get the source port of the header.
    #[must_use]
    pub fn source(&self) -> u16 {
        self.0.source_port
    }

    /// Get the destination port of the header.
    #[must_use]
    pub fn destination(&self) -> u16 {
        self.0.destination_port
    }

    /// Set the source port of the header.
    pub fn set_source(&mut self, port: u16) -> &mut Self {
        self.0.source_port = port;
        self
    }

    /// Set the destination port of the header.
    pub fn set_destination(&mut self, port: u16) -> &mut Self {
        self.0.destination_port = port;
        self
    }

    /// Recompute and store the checksum over the IPv4 pseudo header and
    /// `payload`.
    pub fn update_checksum(&mut self, ip: &Ipv4, payload: &[u8]) -> Result<(), UdpChecksumError> {
        self.0.checksum = self
            .0
            .calc_checksum_ipv4(ip.inner(), payload)
            .map_err(|_| UdpChecksumError)?;
        Ok(())
    }

    /// The stored checksum.
    #[must_use]
    pub fn checksum(&self) -> u16 {
        self.0.checksum
    }
}
