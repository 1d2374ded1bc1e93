// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Public-side port allocation.
//!
//! Allocation only runs when a private-to-public packet misses the forward
//! map, off the pure lookup path.  It takes the pair mutex, scans the dense
//! port map from the pair's `last_port` cursor (wrapping at the end of the
//! window) and claims the first reusable slot.  The scan is bounded by one
//! full sweep; if nothing is reusable the flow is dropped rather than reuse
//! a port early.

use crate::port::NatPair;
use crate::portmap::{PORT_END, PORT_START};
use crate::tables::Tuple;
use crate::time::Timestamp;
use net::ip::Proto;
use std::sync::PoisonError;
use tracing::{debug, trace};

/// No reusable slot in the whole window: the new flow is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("public port space exhausted")]
pub struct PortExhausted;

/// Allocate a public port for the new outbound flow identified by
/// `private_key`, insert the symmetric forward-map entries on both ports,
/// and return the allocated port.
///
/// Both map entries are written before this returns, so the mapping is
/// visible before the packet that triggered it is dispatched.
pub fn allocate(
    pair: &NatPair,
    proto: Proto,
    private_key: Tuple,
    now: Timestamp,
) -> Result<u16, PortExhausted> {
    let mut last_port = pair
        .last_port
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    let public = pair.public();
    let private = pair.private();
    let portmap = public.portmap();
    let span = usize::from(PORT_END - PORT_START) + 1;

    let mut port = (*last_port).clamp(PORT_START, PORT_END);
    for _ in 0..span {
        let entry = portmap.entry(proto, port);
        if entry.reusable(now) {
            // The slot may still carry a mapping that idled past the reuse
            // quarantine; evict it so the port is not doubly mapped.
            if entry.private_addr().is_some() {
                let stale_key = Tuple::new(public.subnet().addr(), port);
                if let Some(stale_value) = public.fwd.remove(proto, &stale_key) {
                    private.fwd.remove(proto, &stale_value);
                    debug!("evicted stale {proto} mapping {stale_key} -> {stale_value}");
                }
            }

            entry.claim(private_key.addr, now, false);
            let public_tuple = Tuple::new(public.subnet().addr(), port);
            public.fwd.insert(proto, public_tuple, private_key);
            private.fwd.insert(proto, private_key, public_tuple);

            *last_port = if port == PORT_END { PORT_START } else { port + 1 };
            trace!("allocated {proto} port {port} for {private_key}");
            return Ok(port);
        }
        port = if port == PORT_END { PORT_START } else { port + 1 };
    }

    debug!("{proto} port allocation failed for {private_key}: window exhausted");
    Err(PortExhausted)
}
