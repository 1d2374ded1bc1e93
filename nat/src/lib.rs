// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

//! Stateful Network Address Translation for port pairs.
//!
//! Each configured pair of interfaces shares one public address: outbound
//! flows from the private network are rewritten to `(public address,
//! allocated port)`, inbound traffic is matched against the same state and
//! rewritten back.  Static forwarding rules expose selected public ports to
//! internal hosts or to a local host stack over a sideband interface.
//!
//! The hot path is lock free: forward lookups hit concurrent maps, the
//! public port map is a dense array of atomically updated entries.  Only the
//! allocator (on a lookup miss) and the maintenance sweep take the pair
//! mutex.

pub mod allocator;
pub mod engine;
pub mod maintenance;
pub mod port;
pub mod portmap;
pub mod stats;
pub mod tables;
pub mod time;


pub use engine::{Verdict, classify_frame, translate};
pub use port::{Nat, NatPair, NatPort, PortKind, Settings};

/// Direction of travel through a pair.
///
/// The discriminants are also the direction bits recorded in a port map
/// entry when a FIN is observed, so "both directions FINed" is a plain
/// bit-or.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    /// Private network towards the public network.
    Pri2Pub = 0x0f,
    /// Public network towards the private network.
    Pub2Pri = 0xf0,
}

impl Direction {
    /// The direction bits recorded in teardown state.
    #[must_use]
    pub fn bits(self) -> u8 {
        self as u8
    }
}
