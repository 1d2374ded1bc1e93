// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-port packet accounting.
//!
//! Per-packet failures are never surfaced as errors: the engine counts them
//! and drops the packet.  Counters are relaxed atomics; exactness under
//! contention is not required.

use std::sync::atomic::{AtomicU64, Ordering};

/// One relaxed counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Add one.
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters for one port's ingress processing.
#[derive(Debug, Default)]
pub struct PortStats {
    /// Packets translated and sent out the opposite port.
    pub translated: Counter,
    /// Packets diverted to the sideband interface.
    pub to_sideband: Counter,
    /// Inbound packets with no matching mapping.
    pub unmapped: Counter,
    /// New flows dropped because no public port was reusable.
    pub port_exhausted: Counter,
    /// Parse failures, unsupported protocols, fragments without port info,
    /// checksum failures.
    pub malformed: Counter,
    /// Private-side packets whose source lies outside the private subnet.
    pub spoofed: Counter,
    /// Packets whose next hop could not be resolved via ARP.
    pub unresolved: Counter,
}
