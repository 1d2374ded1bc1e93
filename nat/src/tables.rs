// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Concurrent lookup tables: per-protocol forward maps and the ARP cache.

use ahash::RandomState;
use dashmap::DashMap;
use net::eth::mac::Mac;
use net::ip::{PerProto, Proto};
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;

/// Half of a flow key: one endpoint's address and L4 port.  The protocol is
/// not part of the tuple; the tables are indexed per protocol.  For ICMP the
/// port is the echo identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tuple {
    /// The endpoint address.
    pub addr: Ipv4Addr,
    /// The endpoint L4 port (ICMP echo identifier for ICMP).
    pub port: u16,
}

impl Tuple {
    /// Assemble a tuple.
    #[must_use]
    pub fn new(addr: Ipv4Addr, port: u16) -> Tuple {
        Tuple { addr, port }
    }

    /// Whether the address is `0.0.0.0`, the sideband marker in forwarding
    /// rule entries.
    #[must_use]
    pub fn is_sideband(&self) -> bool {
        self.addr.is_unspecified()
    }
}

impl Display for Tuple {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

/// The per-protocol forward maps of one port.
///
/// Lookups run wait free on the hot path; writes happen either under the
/// pair mutex (allocator, maintenance) or at startup, one writer per key.
#[derive(Debug, Default)]
pub struct TranslationTable {
    maps: PerProto<DashMap<Tuple, Tuple, RandomState>>,
}

impl TranslationTable {
    /// Allocate empty maps for all protocols.
    #[must_use]
    pub fn new() -> TranslationTable {
        TranslationTable {
            maps: PerProto::new_with(|_| DashMap::with_hasher(RandomState::new())),
        }
    }

    /// Look up the rewrite target for `key`.
    #[must_use]
    pub fn lookup(&self, proto: Proto, key: &Tuple) -> Option<Tuple> {
        self.maps[proto].get(key).map(|entry| *entry.value())
    }

    /// Store `key -> value`.
    pub fn insert(&self, proto: Proto, key: Tuple, value: Tuple) {
        self.maps[proto].insert(key, value);
    }

    /// Remove `key`, returning its value if present.
    pub fn remove(&self, proto: Proto, key: &Tuple) -> Option<Tuple> {
        self.maps[proto].remove(key).map(|(_, value)| value)
    }

    /// Number of entries for `proto`.
    #[must_use]
    pub fn len(&self, proto: Proto) -> usize {
        self.maps[proto].len()
    }

    /// Whether the table holds no entry for any protocol.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        Proto::ALL.iter().all(|p| self.maps[*p].is_empty())
    }

    /// Snapshot the entries for `proto`.  Not for the hot path; used by
    /// tests and diagnostics.
    #[must_use]
    pub fn entries(&self, proto: Proto) -> Vec<(Tuple, Tuple)> {
        self.maps[proto]
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }
}

/// The ARP cache of one port, learned from received frames.
#[derive(Debug, Default)]
pub struct ArpTable {
    map: DashMap<Ipv4Addr, Mac, RandomState>,
}

impl ArpTable {
    /// Allocate an empty cache.
    #[must_use]
    pub fn new() -> ArpTable {
        ArpTable {
            map: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Record that `addr` was seen speaking with source MAC `mac`.
    pub fn learn(&self, addr: Ipv4Addr, mac: Mac) {
        self.map.insert(addr, mac);
    }

    /// The MAC for `addr`, if one has been learned.  Readers tolerate a
    /// miss; the engine drops rather than generate ARP requests.
    #[must_use]
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<Mac> {
        self.map.get(&addr).map(|entry| *entry.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_insert_remove() {
        let table = TranslationTable::new();
        let key = Tuple::new(Ipv4Addr::new(10, 0, 0, 7), 5555);
        let value = Tuple::new(Ipv4Addr::new(203, 0, 113, 5), 1024);

        assert_eq!(table.lookup(Proto::Tcp, &key), None);
        table.insert(Proto::Tcp, key, value);
        assert_eq!(table.lookup(Proto::Tcp, &key), Some(value));
        // Protocols index separate maps.
        assert_eq!(table.lookup(Proto::Udp, &key), None);

        assert_eq!(table.remove(Proto::Tcp, &key), Some(value));
        assert_eq!(table.lookup(Proto::Tcp, &key), None);
    }

    #[test]
    fn arp_learn_and_miss() {
        let arp = ArpTable::new();
        let ip = Ipv4Addr::new(10, 0, 0, 7);
        let mac = Mac([0x02, 0, 0, 0, 0, 7]);

        assert_eq!(arp.lookup(ip), None);
        arp.learn(ip, mac);
        assert_eq!(arp.lookup(ip), Some(mac));

        let newer = Mac([0x02, 0, 0, 0, 0, 8]);
        arp.learn(ip, newer);
        assert_eq!(arp.lookup(ip), Some(newer));
    }
}
