// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The per-packet translation engine.
//!
//! Invoked once per packet per direction, as a classifier returning a
//! [`Verdict`].  The engine never blocks: lookups are wait free, and only an
//! allocation on a lookup miss takes the pair mutex.  Per-packet failures
//! are counted on the ingress port and resolved to [`Verdict::Drop`]; they
//! never surface as errors.

use crate::Direction;
use crate::allocator::allocate;
use crate::port::{NatPair, NatPort, Settings};
use crate::portmap::PortMapEntry;
use crate::tables::Tuple;
use crate::time::Timestamp;
use net::eth::mac::Mac;
use net::ip::Proto;
use net::packet::{Packet, ParseError, Transport};
use std::net::Ipv4Addr;
use tracing::trace;

/// The classifier's decision for one packet.  The discriminants are the
/// splitter output indices and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Verdict {
    /// Drop the packet.
    Drop = 0,
    /// Send the rewritten packet out the egress port.
    Send = 1,
    /// Deliver the packet, unmodified, to the sideband interface.
    Sideband = 2,
}

impl Verdict {
    /// The splitter output index for this verdict.
    #[must_use]
    pub fn output(self) -> usize {
        self as usize
    }
}

/// Classify one raw frame travelling through `pair` in `direction`.
///
/// Parses the frame, runs [`translate`], and on [`Verdict::Send`] replaces
/// `frame` with the rewritten bytes.  Frames that do not parse as
/// translatable IPv4 go to the sideband when one exists and the frame is
/// addressed to this port (the local host stack may want ARP and friends);
/// otherwise they are dropped.
pub fn classify_frame(
    pair: &NatPair,
    direction: Direction,
    frame: &mut Vec<u8>,
    settings: &Settings,
    now: Timestamp,
) -> Verdict {
    let ingress = pair.ingress(direction);
    let mut packet = match Packet::parse(frame) {
        Ok(packet) => packet,
        Err(ParseError::NotIpv4 { dst_mac, .. })
        | Err(ParseError::UnsupportedProto { dst_mac, .. })
            if wants_sideband(ingress, dst_mac) =>
        {
            ingress.stats.to_sideband.bump();
            return Verdict::Sideband;
        }
        Err(error) => {
            trace!("port {}: dropping unparsable frame: {error}", ingress.index());
            ingress.stats.malformed.bump();
            return Verdict::Drop;
        }
    };

    let verdict = translate(pair, direction, &mut packet, settings, now);
    if verdict == Verdict::Send {
        *frame = packet.serialize();
    }
    verdict
}

fn wants_sideband(ingress: &NatPort, dst_mac: Mac) -> bool {
    ingress.has_sideband() && (dst_mac == ingress.mac() || dst_mac.is_broadcast())
}

/// Translate one parsed packet in place.
pub fn translate(
    pair: &NatPair,
    direction: Direction,
    packet: &mut Packet,
    settings: &Settings,
    now: Timestamp,
) -> Verdict {
    let ingress = pair.ingress(direction);
    ingress.arp.learn(packet.src_addr(), packet.eth().source());

    match direction {
        Direction::Pri2Pub => private_to_public(pair, packet, settings, now),
        Direction::Pub2Pri => public_to_private(pair, packet, settings, now),
    }
}

fn private_to_public(
    pair: &NatPair,
    packet: &mut Packet,
    settings: &Settings,
    now: Timestamp,
) -> Verdict {
    let ingress = pair.private();
    let egress = pair.public();

    if !ingress.subnet().contains(packet.src_addr()) {
        trace!(
            "port {}: source {} outside private subnet",
            ingress.index(),
            packet.src_addr()
        );
        ingress.stats.spoofed.bump();
        return Verdict::Drop;
    }

    let Some(src_port) = packet.l4_source() else {
        ingress.stats.malformed.bump();
        return Verdict::Drop;
    };
    let proto = packet.proto();
    let key = Tuple::new(packet.src_addr(), src_port);

    let target = match ingress.fwd.lookup(proto, &key) {
        Some(target) => target,
        None => match allocate(pair, proto, key, now) {
            Ok(port) => Tuple::new(egress.subnet().addr(), port),
            Err(_) => {
                ingress.stats.port_exhausted.bump();
                return Verdict::Drop;
            }
        },
    };

    // A private-side rule can bind a flow to the local stack.
    if target.is_sideband() {
        ingress.stats.to_sideband.bump();
        return Verdict::Sideband;
    }

    let entry = egress.portmap().entry(proto, target.port);
    entry.touch(now);
    account_teardown(packet, entry, Direction::Pri2Pub);

    packet.ipv4_mut().set_source(target.addr);
    if !packet.set_l4_source(target.port) {
        ingress.stats.malformed.bump();
        return Verdict::Drop;
    }

    let dst_addr = packet.dst_addr();
    finish_egress(ingress, egress, packet, dst_addr, settings)
}

fn public_to_private(
    pair: &NatPair,
    packet: &mut Packet,
    settings: &Settings,
    now: Timestamp,
) -> Verdict {
    let ingress = pair.public();
    let egress = pair.private();

    let Some(dst_port) = packet.l4_destination() else {
        ingress.stats.malformed.bump();
        return Verdict::Drop;
    };
    let proto = packet.proto();
    let key = Tuple::new(packet.dst_addr(), dst_port);

    let Some(target) = ingress.fwd.lookup(proto, &key) else {
        // Unsolicited inbound.  Frames addressed to this host itself may
        // still belong to the local stack.
        if wants_sideband(ingress, packet.eth().destination()) {
            ingress.stats.to_sideband.bump();
            return Verdict::Sideband;
        }
        trace!("port {}: unmapped inbound {key}", ingress.index());
        ingress.stats.unmapped.bump();
        return Verdict::Drop;
    };

    // Static sideband rule: deliver to the local stack, no rewrite.
    if target.is_sideband() {
        ingress.stats.to_sideband.bump();
        return Verdict::Sideband;
    }

    let entry = ingress.portmap().entry(proto, key.port);
    entry.touch(now);
    account_teardown(packet, entry, Direction::Pub2Pri);

    packet.ipv4_mut().set_destination(target.addr);
    if !packet.set_l4_destination(target.port) {
        ingress.stats.malformed.bump();
        return Verdict::Drop;
    }

    finish_egress(ingress, egress, packet, target.addr, settings)
}

fn account_teardown(packet: &Packet, entry: &PortMapEntry, direction: Direction) {
    if entry.is_static() {
        return;
    }
    if let Transport::Tcp(tcp) = packet.transport() {
        if tcp.rst() {
            entry.record_rst();
        } else if tcp.fin() {
            entry.record_fin(direction);
        }
    }
}

/// Resolve L2 addressing, VLAN tagging and checksums for the egress port.
fn finish_egress(
    ingress: &NatPort,
    egress: &NatPort,
    packet: &mut Packet,
    dst_addr: Ipv4Addr,
    settings: &Settings,
) -> Verdict {
    // Destinations outside the egress subnet route via the default next
    // hop.  The engine never generates ARP requests: an unresolved next hop
    // means drop.
    let next_hop = if egress.subnet().contains(dst_addr) {
        Some(dst_addr)
    } else {
        egress.gateway()
    };
    let dst_mac = next_hop.and_then(|hop| egress.arp.lookup(hop));
    let Some(dst_mac) = dst_mac else {
        trace!("port {}: no l2 address for {dst_addr}", egress.index());
        ingress.stats.unresolved.bump();
        return Verdict::Drop;
    };

    packet
        .eth_mut()
        .set_source(egress.mac())
        .set_destination(dst_mac);

    if packet.retag_vlan(egress.vlan()).is_err() {
        ingress.stats.malformed.bump();
        return Verdict::Drop;
    }

    if !settings.no_calculate_checksum {
        // The NIC cannot offload ICMP checksums; compute those in software
        // even when TCP/UDP are offloaded.
        let l4_in_software = !settings.hw_checksum || packet.proto() == Proto::Icmp;
        packet.meta_mut().offload_l4_checksum = !l4_in_software;
        if packet.update_checksums(l4_in_software).is_err() {
            ingress.stats.malformed.bump();
            return Verdict::Drop;
        }
    }

    ingress.stats.translated.bump();
    Verdict::Send
}
