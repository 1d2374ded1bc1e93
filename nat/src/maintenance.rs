// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Background reclamation of idle and torn-down entries.
//!
//! One periodic task sweeps every pair's public port map under the pair
//! mutex.  The sweep need not be exact: readers tolerate a transient lag
//! between the forward maps and `last_used`, because a stale hit's response
//! arrives before the sweep revisits the slot.

use crate::port::NatPair;
use crate::portmap::{PORT_END, PORT_START};
use crate::tables::Tuple;
use crate::time::{Clock, Timestamp};
use net::ip::Proto;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

/// Sweep one pair at `now`, reclaiming every dynamic entry that completed
/// TCP teardown or idled past the connection timeout.  Returns how many
/// entries were reclaimed.
pub fn sweep(pair: &NatPair, now: Timestamp) -> usize {
    let _last_port = pair
        .last_port
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    let public = pair.public();
    let private = pair.private();
    let portmap = public.portmap();
    let mut reclaimed = 0;

    for proto in Proto::ALL {
        for port in PORT_START..=PORT_END {
            let entry = portmap.entry(proto, port);
            if !entry.reclaimable(now) {
                continue;
            }

            let public_key = Tuple::new(public.subnet().addr(), port);
            if let Some(private_value) = public.fwd.remove(proto, &public_key) {
                private.fwd.remove(proto, &private_value);
            }
            // Keep last_used: the reuse quarantine counts from the last
            // packet, not from the sweep.
            entry.clear();
            reclaimed += 1;
        }
    }

    if reclaimed > 0 {
        debug!("maintenance reclaimed {reclaimed} entries");
    }
    reclaimed
}

/// Handle of the background maintenance task.
#[derive(Debug)]
pub struct Maintainer {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Maintainer {
    /// Default sweep period.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    /// Spawn a thread sweeping every pair each `interval`.
    #[must_use]
    pub fn spawn(pairs: Vec<Arc<NatPair>>, clock: Arc<Clock>, interval: Duration) -> Maintainer {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("nat-maintenance".to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::Acquire) {
                    std::thread::sleep(interval);
                    let now = clock.now();
                    for pair in &pairs {
                        sweep(pair, now);
                    }
                }
            })
            .unwrap_or_else(|error| panic!("failed to spawn maintenance thread: {error}"));
        Maintainer { stop, handle }
    }

    /// Stop the task and wait for it to exit.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Release);
        if self.handle.join().is_err() {
            warn!("maintenance thread panicked");
        }
    }
}
