// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Runtime state of ports and pairs.
//!
//! All tables are created once, at startup, and never resized.  A port
//! navigates to its opposite through the owning [`NatPair`] by index, so
//! there are no ownership cycles.

use crate::Direction;
use crate::portmap::PortMap;
use crate::stats::PortStats;
use crate::tables::{ArpTable, TranslationTable, Tuple};
use crate::time::{Clock, Timestamp};
use config::{ForwardedPort, PairConfig, PortConfig, ValidatedConfig};
use net::eth::mac::Mac;
use net::ipv4::addr::Ipv4Subnet;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Which side of a pair a port is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// The private (internal) network side.
    Private,
    /// The public (shared address) side.
    Public,
}

/// Process-level feature flags, written once at startup and read-only
/// afterwards.  Workers receive this as part of an immutable snapshot, not
/// through mutable globals.
#[derive(Debug, Clone, Copy, Default)]
pub struct Settings {
    /// Skip all checksum work on modified packets.
    pub no_calculate_checksum: bool,
    /// Never offload L4 checksums to the NIC, even when it could.
    pub no_hw_tx_checksum: bool,
    /// Resolved at wiring time: the NICs can offload TX checksums and the
    /// opt-out above is not set.
    pub hw_checksum: bool,
    /// Set during config validation: some rule forwards to a sideband.
    pub needs_sideband: bool,
    /// Emit dropped/forwarded packets to the dump sink.
    pub debug_dump: bool,
}

/// Runtime state of one network port.
#[derive(Debug)]
pub struct NatPort {
    index: u16,
    kind: PortKind,
    subnet: Ipv4Subnet,
    vlan: u16,
    mac: Mac,
    gateway: Option<Ipv4Addr>,
    sideband_name: Option<String>,
    forward_ports: Vec<ForwardedPort>,
    /// Forward map for packets arriving at this port.
    pub fwd: TranslationTable,
    /// ARP cache learned from frames received on this port.
    pub arp: ArpTable,
    /// Public ports only: allocation metadata per `(protocol, port)`.
    portmap: Option<PortMap>,
    /// Ingress counters.
    pub stats: PortStats,
}

impl NatPort {
    fn new(cfg: &PortConfig, kind: PortKind, mac: Mac) -> NatPort {
        NatPort {
            index: cfg.index,
            kind,
            subnet: cfg.subnet,
            vlan: cfg.vlan,
            mac,
            gateway: cfg.gateway,
            sideband_name: cfg.sideband_name.clone(),
            forward_ports: cfg.forward_ports.clone(),
            fwd: TranslationTable::new(),
            arp: ArpTable::new(),
            portmap: (kind == PortKind::Public).then(PortMap::new),
            stats: PortStats::default(),
        }
    }

    /// Port index in the dataplane runtime.
    #[must_use]
    pub fn index(&self) -> u16 {
        self.index
    }

    /// Which side of the pair this is.
    #[must_use]
    pub fn kind(&self) -> PortKind {
        self.kind
    }

    /// The subnet this port faces.
    #[must_use]
    pub fn subnet(&self) -> Ipv4Subnet {
        self.subnet
    }

    /// This port's VLAN tag; 0 when untagged.
    #[must_use]
    pub fn vlan(&self) -> u16 {
        self.vlan
    }

    /// This port's own MAC address.
    #[must_use]
    pub fn mac(&self) -> Mac {
        self.mac
    }

    /// Default next hop for destinations outside the subnet.
    #[must_use]
    pub fn gateway(&self) -> Option<Ipv4Addr> {
        self.gateway
    }

    /// Name of the sideband interface, when configured.
    #[must_use]
    pub fn sideband_name(&self) -> Option<&str> {
        self.sideband_name.as_deref()
    }

    /// Whether a sideband interface is configured on this port.
    #[must_use]
    pub fn has_sideband(&self) -> bool {
        self.sideband_name.as_deref().is_some_and(|name| !name.is_empty())
    }

    /// The normalized forwarding rules of this port.
    #[must_use]
    pub fn forward_ports(&self) -> &[ForwardedPort] {
        &self.forward_ports
    }

    /// The port map.
    ///
    /// # Panics
    ///
    /// Panics if called on a private port; only public ports allocate one.
    #[must_use]
    #[allow(clippy::expect_used)] // structural invariant, not data-dependent
    pub fn portmap(&self) -> &PortMap {
        self.portmap
            .as_ref()
            .expect("port map is only present on public ports")
    }
}

/// A (private, public) port pair sharing translation state.
#[derive(Debug)]
pub struct NatPair {
    ports: [NatPort; 2],
    /// The pair mutex.  Guards `last_port` and serializes allocator claims
    /// and maintenance sweeps; never taken on the pure lookup path.
    pub(crate) last_port: Mutex<u16>,
}

const PRIVATE: usize = 0;
const PUBLIC: usize = 1;

impl NatPair {
    /// Build the runtime state for one validated pair: allocate lookup maps
    /// on both ports and the public port map, then install the static
    /// forwarding entries.
    #[must_use]
    pub fn new(cfg: &PairConfig, private_mac: Mac, public_mac: Mac, now: Timestamp) -> NatPair {
        let pair = NatPair {
            ports: [
                NatPort::new(&cfg.private, PortKind::Private, private_mac),
                NatPort::new(&cfg.public, PortKind::Public, public_mac),
            ],
            last_port: Mutex::new(crate::portmap::PORT_START),
        };
        pair.install_forwarding_entries(now);
        pair
    }

    /// The private port.
    #[must_use]
    pub fn private(&self) -> &NatPort {
        &self.ports[PRIVATE]
    }

    /// The public port.
    #[must_use]
    pub fn public(&self) -> &NatPort {
        &self.ports[PUBLIC]
    }

    /// The port a packet travelling in `direction` arrives on.
    #[must_use]
    pub fn ingress(&self, direction: Direction) -> &NatPort {
        match direction {
            Direction::Pri2Pub => self.private(),
            Direction::Pub2Pri => self.public(),
        }
    }

    /// The port a packet travelling in `direction` leaves through.
    #[must_use]
    pub fn egress(&self, direction: Direction) -> &NatPort {
        match direction {
            Direction::Pri2Pub => self.public(),
            Direction::Pub2Pri => self.private(),
        }
    }

    /// The opposite port of `port`'s side.
    #[must_use]
    pub fn opposite(&self, kind: PortKind) -> &NatPort {
        match kind {
            PortKind::Private => self.public(),
            PortKind::Public => self.private(),
        }
    }

    /// Pre-populate tables from the static forwarding rules.
    ///
    /// Every rule puts `(subnet address, listen port) -> destination` into
    /// the owning port's forward map.  Rules pointing at an internal host
    /// additionally get the symmetric private-side entry; sideband rules do
    /// not (their destination is the local stack, not a translatable host).
    /// On the public side the slot at the listen port is pinned static so
    /// the allocator and maintenance never touch it.
    fn install_forwarding_entries(&self, now: Timestamp) {
        for kind in [PortKind::Private, PortKind::Public] {
            let port = match kind {
                PortKind::Private => self.private(),
                PortKind::Public => self.public(),
            };
            let opposite = self.opposite(kind);
            for rule in port.forward_ports() {
                let key = Tuple::new(port.subnet().addr(), rule.port);
                let value = Tuple::new(rule.destination.addr, rule.destination.port);
                port.fwd.insert(rule.protocol.0, key, value);
                if !rule.to_sideband {
                    opposite.fwd.insert(rule.protocol.0, value, key);
                }
                if kind == PortKind::Public {
                    port.portmap()
                        .entry(rule.protocol.0, rule.port)
                        .claim(rule.destination.addr, now, true);
                }
                debug!("installed static forwarding entry on port {}: {rule}", port.index());
            }
        }
    }
}

/// The engine root: every pair's state plus the startup snapshot shared by
/// all packet workers.
#[derive(Debug)]
pub struct Nat {
    pairs: Vec<Arc<NatPair>>,
    settings: Settings,
    clock: Arc<Clock>,
}

impl Nat {
    /// Build the engine from a validated configuration.  `mac_of` resolves a
    /// port index to its MAC address (backed by the dataplane runtime).
    #[must_use]
    pub fn new(
        config: &ValidatedConfig,
        settings: Settings,
        mut mac_of: impl FnMut(u16) -> Mac,
    ) -> Nat {
        let clock = Arc::new(Clock::new());
        let now = clock.now();
        let pairs = config
            .pairs
            .iter()
            .map(|pair| {
                let private_mac = mac_of(pair.private.index);
                let public_mac = mac_of(pair.public.index);
                Arc::new(NatPair::new(pair, private_mac, public_mac, now))
            })
            .collect();
        Nat {
            pairs,
            settings,
            clock,
        }
    }

    /// The configured pairs, in document order.
    #[must_use]
    pub fn pairs(&self) -> &[Arc<NatPair>] {
        &self.pairs
    }

    /// The startup feature-flag snapshot.
    #[must_use]
    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// The engine clock, shared with classifiers and the maintenance task.
    #[must_use]
    pub fn clock(&self) -> &Arc<Clock> {
        &self.clock
    }
}
