// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Frame builders for tests.
//!
//! These produce wire-valid frames (consistent lengths and checksums) so
//! engine tests can assert on rewritten output byte-for-byte.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc, clippy::cast_possible_truncation)]

use crate::eth::Eth;
use crate::eth::mac::Mac;
use crate::icmp4::Icmp4;
use crate::ipv4::Ipv4;
use crate::packet::{Packet, PacketMeta, Transport};
use crate::tcp::Tcp;
use crate::udp::Udp;
use etherparse::{
    EtherType, IcmpEchoHeader, Icmpv4Header, Icmpv4Type, IpNumber, Ipv4Header, TcpHeader,
    UdpHeader,
};
use std::net::Ipv4Addr;

const PAYLOAD: &[u8] = b"0123456789abcdef";

fn ipv4_header(proto: IpNumber, l4_len: usize, src: Ipv4Addr, dst: Ipv4Addr) -> Ipv4Header {
    let mut ip = Ipv4Header::new(
        (l4_len + PAYLOAD.len()) as u16,
        64,
        proto,
        src.octets(),
        dst.octets(),
    )
    .unwrap();
    ip.header_checksum = ip.calc_header_checksum();
    ip
}

/// Build a UDP/IPv4 frame.
#[must_use]
pub fn udp_frame(
    src_mac: Mac,
    dst_mac: Mac,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
) -> Packet {
    let ip = ipv4_header(IpNumber::UDP, 8, src_ip, dst_ip);
    let mut udp = UdpHeader {
        source_port: src_port,
        destination_port: dst_port,
        length: (8 + PAYLOAD.len()) as u16,
        checksum: 0,
    };
    udp.checksum = udp.calc_checksum_ipv4(&ip, PAYLOAD).unwrap();
    Packet {
        eth: Eth::new(src_mac, dst_mac, EtherType::IPV4),
        vlan: None,
        ipv4: Ipv4(ip),
        transport: Transport::Udp(Udp(udp)),
        payload: PAYLOAD.to_vec(),
        meta: PacketMeta::default(),
    }
}

/// Build a TCP/IPv4 frame; `flags` mutates the header before checksumming
/// (set SYN/FIN/RST there).
#[must_use]
pub fn tcp_frame(
    src_mac: Mac,
    dst_mac: Mac,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    flags: impl FnOnce(&mut Tcp),
) -> Packet {
    let mut tcp = Tcp(TcpHeader::new(src_port, dst_port, 1000, 64240));
    flags(&mut tcp);
    let ip = ipv4_header(IpNumber::TCP, tcp.0.header_len(), src_ip, dst_ip);
    tcp.0.checksum = tcp.0.calc_checksum_ipv4(&ip, PAYLOAD).unwrap();
    Packet {
        eth: Eth::new(src_mac, dst_mac, EtherType::IPV4),
        vlan: None,
        ipv4: Ipv4(ip),
        transport: Transport::Tcp(tcp),
        payload: PAYLOAD.to_vec(),
        meta: PacketMeta::default(),
    }
}

/// Build an ICMP echo request (or reply) frame keyed by `identifier`.
#[must_use]
pub fn icmp_echo_frame(
    src_mac: Mac,
    dst_mac: Mac,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    identifier: u16,
    reply: bool,
) -> Packet {
    let echo = IcmpEchoHeader {
        id: identifier,
        seq: 1,
    };
    let icmp_type = if reply {
        Icmpv4Type::EchoReply(echo)
    } else {
        Icmpv4Type::EchoRequest(echo)
    };
    let mut icmp = Icmpv4Header::new(icmp_type);
    icmp.checksum = icmp.icmp_type.calc_checksum(PAYLOAD);
    let ip = ipv4_header(IpNumber::ICMP, icmp.header_len(), src_ip, dst_ip);
    Packet {
        eth: Eth::new(src_mac, dst_mac, EtherType::IPV4),
        vlan: None,
        ipv4: Ipv4(ip),
        transport: Transport::Icmp4(Icmp4(icmp)),
        payload: PAYLOAD.to_vec(),
        meta: PacketMeta::default(),
    }
}

/// Tag a frame with a VLAN id.
#[must_use]
pub fn with_vlan(mut packet: Packet, vid: u16) -> Packet {
    packet.retag_vlan(vid).unwrap();
    packet
}
