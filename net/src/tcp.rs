// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! TCP header type and manipulation.

use crate::ipv4::Ipv4;
use etherparse::TcpHeader;

/// Error computing a TCP checksum (payload too large for the pseudo header).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tcp payload too large for checksum computation")]
pub struct TcpChecksumError;

/// A TCP header.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tcp(pub(crate) TcpHeader);

impl Tcp {
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

    /// Whether the FIN flag is set.
    #[must_use]
    pub fn fin(&self) -> bool {
        self.0.fin
    }

    /// Whether the RST flag is set.
    #[must_use]
    pub fn rst(&self) -> bool {
        self.0.rst
    }

    /// Whether the SYN flag is set.
    #[must_use]
    pub fn syn(&self) -> bool {
        self.0.syn
    }

    /// Whether the ACK flag is set.
    #[must_use]
    pub fn ack(&self) -> bool {
        self.0.ack
    }

    /// Set or clear the SYN flag.
    pub fn set_syn(&mut self, syn: bool) -> &mut Self {
        self.0.syn = syn;
        self
    }

    /// Set or clear the ACK flag.
    pub fn set_ack(&mut self, ack: bool) -> &mut Self {
        self.0.ack = ack;
        self
    }

    /// Set or clear the FIN flag.
    pub fn set_fin(&mut self, fin: bool) -> &mut Self {
        self.0.fin = fin;
        self
    }

    /// Set or clear the RST flag.
    pub fn set_rst(&mut self, rst: bool) -> &mut Self {
        self.0.rst = rst;
        self
    }

    /// Recompute and store the checksum over the IPv4 pseudo header and
    /// `payload`.
    pub fn update_checksum(&mut self, ip: &Ipv4, payload: &[u8]) -> Result<(), TcpChecksumError> {
        self.0.checksum = self
            .0
            .calc_checksum_ipv4(ip.inner(), payload)
            .map_err(|_| TcpChecksumError)?;
        Ok(())
    }

    /// The stored checksum.
    #[must_use]
    pub fn checksum(&self) -> u16 {
        self.0.checksum
    }
}
