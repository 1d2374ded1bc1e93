// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Parsed-frame model.
//!
//! [`Packet`] owns one fully parsed ethernet frame: the L2/L3/L4 headers the
//! translator rewrites plus the opaque payload bytes.  Frames the translator
//! cannot handle fail to parse with a [`ParseError`] that carries enough
//! context (the destination [`Mac`]) for the caller to decide between drop
//! and sideband delivery.

pub mod test_utils;

use crate::eth::Eth;
use crate::eth::mac::Mac;
use crate::icmp4::Icmp4;
use crate::ip::Proto;
use crate::ipv4::Ipv4;
use crate::tcp::Tcp;
use crate::udp::Udp;
use crate::vlan::{InvalidVlanId, Vlan};
use etherparse::{EtherType, Ethernet2Header, Icmpv4Header, Ipv4Header, SingleVlanHeader, TcpHeader, UdpHeader};
use std::net::Ipv4Addr;
use tracing::trace;

/// Reasons a frame cannot be turned into a [`Packet`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The frame ended inside the named header.
    #[error("frame truncated in {0} header")]
    Truncated(&'static str),
    /// The frame does not carry IPv4.  ARP, LLDP and friends land here; they
    /// may still be wanted by a local host stack.
    #[error("unsupported ethertype {ether_type:#06x}")]
    NotIpv4 {
        /// The unsupported ethertype.
        ether_type: u16,
        /// Destination MAC of the frame, for the sideband decision.
        dst_mac: Mac,
    },
    /// IPv4 payload protocol outside {ICMP, TCP, UDP}.
    #[error("unsupported ip protocol {proto}")]
    UnsupportedProto {
        /// The raw protocol number.
        proto: u8,
        /// Destination MAC of the frame, for the sideband decision.
        dst_mac: Mac,
    },
    /// A fragment past the first: no L4 header to rewrite.
    #[error("non-first ip fragment")]
    Fragment,
}

/// The parsed L4 header of a [`Packet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// A TCP segment.
    Tcp(Tcp),
    /// A UDP datagram.
    Udp(Udp),
    /// An `ICMPv4` message.
    Icmp4(Icmp4),
}

/// Per-packet metadata consumed by the egress path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketMeta {
    /// When set, the L4 checksum is left for NIC TX offload instead of being
    /// computed in software.
    pub offload_l4_checksum: bool,
}

/// Error recomputing a packet's checksums.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("checksum computation failed: {0}")]
pub struct ChecksumError(&'static str);

/// An owned, fully parsed IPv4 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    eth: Eth,
    vlan: Option<Vlan>,
    ipv4: Ipv4,
    transport: Transport,
    payload: Vec<u8>,
    meta: PacketMeta,
}

impl Packet {
    /// Parse an ethernet frame.
    pub fn parse(frame: &[u8]) -> Result<Packet, ParseError> {
        let (eth, rest) =
            Ethernet2Header::from_slice(frame).map_err(|_| ParseError::Truncated("ethernet"))?;
        let dst_mac = Mac(eth.destination);

        let (vlan, ether_type, rest) = if eth.ether_type == EtherType::VLAN_TAGGED_FRAME {
            let (vlan, rest) =
                SingleVlanHeader::from_slice(rest).map_err(|_| ParseError::Truncated("vlan"))?;
            (Some(Vlan(vlan.clone())), vlan.ether_type, rest)
        } else {
            (None, eth.ether_type, rest)
        };

        if ether_type != EtherType::IPV4 {
            trace!("frame carries ethertype {:#06x}, not ipv4", ether_type.0);
            return Err(ParseError::NotIpv4 {
                ether_type: ether_type.0,
                dst_mac,
            });
        }

        let (ipv4, rest) =
            Ipv4Header::from_slice(rest).map_err(|_| ParseError::Truncated("ipv4"))?;
        if ipv4.fragment_offset.value() != 0 {
            trace!("non-first fragment, no l4 header to read");
            return Err(ParseError::Fragment);
        }

        let proto =
            Proto::try_from(ipv4.protocol.0).map_err(|e| ParseError::UnsupportedProto {
                proto: e.0,
                dst_mac,
            })?;

        let (transport, rest) = match proto {
            Proto::Tcp => {
                let (tcp, rest) =
                    TcpHeader::from_slice(rest).map_err(|_| ParseError::Truncated("tcp"))?;
                (Transport::Tcp(Tcp(tcp)), rest)
            }
            Proto::Udp => {
                let (udp, rest) =
                    UdpHeader::from_slice(rest).map_err(|_| ParseError::Truncated("udp"))?;
                (Transport::Udp(Udp(udp)), rest)
            }
            Proto::Icmp => {
                let (icmp, rest) =
                    Icmpv4Header::from_slice(rest).map_err(|_| ParseError::Truncated("icmp"))?;
                (Transport::Icmp4(Icmp4(icmp)), rest)
            }
        };

        Ok(Packet {
            eth: Eth(eth),
            vlan,
            ipv4: Ipv4(ipv4),
            transport,
            payload: rest.to_vec(),
            meta: PacketMeta::default(),
        })
    }

    /// Serialize the frame back to wire format.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            Eth::LEN + Vlan::LEN + self.ipv4.header_len() + 60 + self.payload.len(),
        );
        out.extend_from_slice(&self.eth.to_bytes());
        if let Some(vlan) = &self.vlan {
            out.extend_from_slice(&vlan.to_bytes());
        }
        out.extend_from_slice(&self.ipv4.0.to_bytes());
        match &self.transport {
            Transport::Tcp(tcp) => out.extend_from_slice(&tcp.0.to_bytes()),
            Transport::Udp(udp) => out.extend_from_slice(&udp.0.to_bytes()),
            Transport::Icmp4(icmp) => out.extend_from_slice(&icmp.0.to_bytes()),
        }
        out.extend_from_slice(&self.payload);
        out
    }

    /// The translated protocol of this packet.
    #[must_use]
    pub fn proto(&self) -> Proto {
        match &self.transport {
            Transport::Tcp(_) => Proto::Tcp,
            Transport::Udp(_) => Proto::Udp,
            Transport::Icmp4(_) => Proto::Icmp,
        }
    }

    /// The ethernet header.
    #[must_use]
    pub fn eth(&self) -> &Eth {
        &self.eth
    }

    /// The ethernet header, mutably.
    pub fn eth_mut(&mut self) -> &mut Eth {
        &mut self.eth
    }

    /// The IPv4 header.
    #[must_use]
    pub fn ipv4(&self) -> &Ipv4 {
        &self.ipv4
    }

    /// The IPv4 header, mutably.
    pub fn ipv4_mut(&mut self) -> &mut Ipv4 {
        &mut self.ipv4
    }

    /// The L4 header.
    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// The L4 header, mutably.
    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    /// The VLAN tag, if the frame carries one.
    #[must_use]
    pub fn vlan(&self) -> Option<&Vlan> {
        self.vlan.as_ref()
    }

    /// The payload bytes after the L4 header.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Per-packet metadata.
    #[must_use]
    pub fn meta(&self) -> &PacketMeta {
        &self.meta
    }

    /// Per-packet metadata, mutably.
    pub fn meta_mut(&mut self) -> &mut PacketMeta {
        &mut self.meta
    }

    /// The L4 source "port": TCP/UDP source port, ICMP echo identifier.
    #[must_use]
    pub fn l4_source(&self) -> Option<u16> {
        match &self.transport {
            Transport::Tcp(tcp) => Some(tcp.source()),
            Transport::Udp(udp) => Some(udp.source()),
            Transport::Icmp4(icmp) => icmp.identifier(),
        }
    }

    /// The L4 destination "port": TCP/UDP destination port, ICMP echo
    /// identifier (the identifier serves both directions).
    #[must_use]
    pub fn l4_destination(&self) -> Option<u16> {
        match &self.transport {
            Transport::Tcp(tcp) => Some(tcp.destination()),
            Transport::Udp(udp) => Some(udp.destination()),
            Transport::Icmp4(icmp) => icmp.identifier(),
        }
    }

    /// Rewrite the L4 source "port".  Returns `false` for ICMP messages
    /// without an identifier.
    pub fn set_l4_source(&mut self, port: u16) -> bool {
        match &mut self.transport {
            Transport::Tcp(tcp) => {
                tcp.set_source(port);
                true
            }
            Transport::Udp(udp) => {
                udp.set_source(port);
                true
            }
            Transport::Icmp4(icmp) => icmp.set_identifier(port),
        }
    }

    /// Rewrite the L4 destination "port".  Returns `false` for ICMP messages
    /// without an identifier.
    pub fn set_l4_destination(&mut self, port: u16) -> bool {
        match &mut self.transport {
            Transport::Tcp(tcp) => {
                tcp.set_destination(port);
                true
            }
            Transport::Udp(udp) => {
                udp.set_destination(port);
                true
            }
            Transport::Icmp4(icmp) => icmp.set_identifier(port),
        }
    }

    /// Source IPv4 address.
    #[must_use]
    pub fn src_addr(&self) -> Ipv4Addr {
        self.ipv4.source()
    }

    /// Destination IPv4 address.
    #[must_use]
    pub fn dst_addr(&self) -> Ipv4Addr {
        self.ipv4.destination()
    }

    /// Re-tag the frame for an egress port: `vid == 0` strips any tag,
    /// non-zero rewrites the existing tag or pushes a new one.
    pub fn retag_vlan(&mut self, vid: u16) -> Result<(), InvalidVlanId> {
        if vid == 0 {
            if self.vlan.take().is_some() {
                self.eth.set_ether_type(EtherType::IPV4);
            }
            return Ok(());
        }
        match &mut self.vlan {
            Some(vlan) => vlan.set_vid(vid)?,
            None => {
                self.vlan = Some(Vlan::new(vid, EtherType::IPV4)?);
                self.eth.set_ether_type(EtherType::VLAN_TAGGED_FRAME);
            }
        }
        Ok(())
    }

    /// Recompute checksums after header rewrites.  The IPv4 header checksum
    /// is always refreshed; the L4 checksum only when `l4` is set (the
    /// engine clears it when the NIC offloads TX checksums).
    pub fn update_checksums(&mut self, l4: bool) -> Result<(), ChecksumError> {
        self.ipv4.update_checksum();
        if !l4 {
            return Ok(());
        }
        match &mut self.transport {
            Transport::Tcp(tcp) => tcp
                .update_checksum(&self.ipv4, &self.payload)
                .map_err(|_| ChecksumError("tcp")),
            Transport::Udp(udp) => udp
                .update_checksum(&self.ipv4, &self.payload)
                .map_err(|_| ChecksumError("udp")),
            Transport::Icmp4(icmp) => {
                icmp.update_checksum(&self.payload);
                Ok(())
            }
        }
    }
}
