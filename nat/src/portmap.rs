// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Dense public-side port map.
//!
//! One entry per `(protocol, public port)`, indexed directly by the 16-bit
//! port number.  The dense layout gives O(1) access from the hot path and a
//! cheap linear sweep for the allocator's reuse scan; do not replace it with
//! a hash map.
//!
//! All fields are atomics: the hot path refreshes `last_used` and accounts
//! TCP teardown without taking any lock.  Structural changes (claim, clear)
//! happen under the pair mutex in the allocator and the maintenance sweep.

use crate::Direction;
use crate::time::Timestamp;
use net::ip::{PerProto, Proto};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// First allocatable public port (well-known ports are never allocated).
pub const PORT_START: u16 = 1024;
/// Last allocatable public port.
pub const PORT_END: u16 = u16::MAX;

/// Idle time after which a dynamic mapping is reclaimed by maintenance.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);
/// Quarantine after a port is freed before it may be handed out again.
/// Protects against stale retransmissions from the old peer being read as
/// traffic on the reassigned port.
pub const PORT_REUSE_TIMEOUT: Duration = Duration::from_secs(1);

const TERMINATION_BOTH: u8 = Direction::Pri2Pub as u8 | Direction::Pub2Pri as u8;

/// Liveness and ownership metadata for one public `(protocol, port)` slot.
#[derive(Debug, Default)]
pub struct PortMapEntry {
    last_used: AtomicU64,
    private_addr: AtomicU32,
    fin_seen: AtomicU8,
    termination: AtomicU8,
    is_static: AtomicBool,
}

impl PortMapEntry {
    /// The internal host bound to this slot, if any.
    #[must_use]
    pub fn private_addr(&self) -> Option<Ipv4Addr> {
        match self.private_addr.load(Ordering::Acquire) {
            0 => None,
            raw => Some(Ipv4Addr::from(raw)),
        }
    }

    /// When the slot last carried a packet; [`Timestamp::NEVER`] if it never
    /// did.
    #[must_use]
    pub fn last_used(&self) -> Timestamp {
        Timestamp::from_millis(self.last_used.load(Ordering::Acquire))
    }

    /// Whether this slot backs a static forwarding rule.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.is_static.load(Ordering::Acquire)
    }

    /// Refresh the last-used time.  Hot path; no lock.
    pub fn touch(&self, now: Timestamp) {
        self.last_used.store(now.as_millis(), Ordering::Release);
    }

    /// Bind the slot.  Called under the pair mutex (allocator) or at
    /// startup (static rules).  A sideband-bound static rule binds the slot
    /// with the unspecified address.
    pub fn claim(&self, private_addr: Ipv4Addr, now: Timestamp, is_static: bool) {
        self.fin_seen.store(0, Ordering::Release);
        self.termination.store(0, Ordering::Release);
        self.is_static.store(is_static, Ordering::Release);
        self.last_used.store(now.as_millis(), Ordering::Release);
        self.private_addr
            .store(u32::from(private_addr), Ordering::Release);
    }

    /// Free the slot, preserving `last_used` so the reuse quarantine keeps
    /// counting from the last packet.
    pub fn clear(&self) {
        self.private_addr.store(0, Ordering::Release);
        self.fin_seen.store(0, Ordering::Release);
        self.termination.store(0, Ordering::Release);
        self.is_static.store(false, Ordering::Release);
    }

    /// Account a FIN observed travelling in `direction`.
    pub fn record_fin(&self, direction: Direction) {
        self.fin_seen.fetch_add(1, Ordering::AcqRel);
        self.termination
            .fetch_or(direction.bits(), Ordering::AcqRel);
    }

    /// Account an RST: the flow is dead, the entry immediately eligible for
    /// reclamation.
    pub fn record_rst(&self) {
        self.fin_seen.store(2, Ordering::Release);
        self.termination.store(TERMINATION_BOTH, Ordering::Release);
    }

    /// Observed FIN count (may transiently lag the true count, never leads
    /// it).
    #[must_use]
    pub fn fin_seen(&self) -> u8 {
        self.fin_seen.load(Ordering::Acquire)
    }

    /// Both sides have closed: two FINs with both directions observed, or an
    /// RST.
    #[must_use]
    pub fn teardown_complete(&self) -> bool {
        self.fin_seen.load(Ordering::Acquire) >= 2
            && self.termination.load(Ordering::Acquire) == TERMINATION_BOTH
    }

    /// Whether the allocator may hand this slot out at `now`: never static,
    /// and either untouched or past the reuse quarantine.  A still-mapped
    /// slot past the quarantine is reusable too; the allocator evicts the
    /// stale mapping when claiming it.
    #[must_use]
    pub fn reusable(&self, now: Timestamp) -> bool {
        if self.is_static() {
            return false;
        }
        let last_used = self.last_used();
        if last_used == Timestamp::NEVER && self.private_addr().is_none() {
            return true;
        }
        now.saturating_since(last_used) >= PORT_REUSE_TIMEOUT
    }

    /// Whether maintenance should reclaim this slot at `now`.
    #[must_use]
    pub fn reclaimable(&self, now: Timestamp) -> bool {
        !self.is_static()
            && self.private_addr().is_some()
            && (self.teardown_complete()
                || now.saturating_since(self.last_used()) >= CONNECTION_TIMEOUT)
    }
}

/// The dense per-protocol port maps of a public port.
#[derive(Debug)]
pub struct PortMap {
    slots: PerProto<Box<[PortMapEntry]>>,
}

impl Default for PortMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PortMap {
    /// Allocate empty maps covering ports `0..=PORT_END`.
    #[must_use]
    pub fn new() -> PortMap {
        PortMap {
            slots: PerProto::new_with(|_| {
                (0..=usize::from(PORT_END))
                    .map(|_| PortMapEntry::default())
                    .collect()
            }),
        }
    }

    /// The entry for `(proto, port)`.
    #[must_use]
    pub fn entry(&self, proto: Proto, port: u16) -> &PortMapEntry {
        &self.slots[proto][usize::from(port)]
    }
}
