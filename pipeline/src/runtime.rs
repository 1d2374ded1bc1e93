// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The dataplane runtime contract and the splitter callback objects.

use nat::time::Clock;
use nat::{Direction, NatPair, Settings, Verdict, classify_frame};
use net::eth::mac::Mac;
use std::sync::Arc;
use tracing::trace;

/// The flow-graph runtime the core is wired into.
///
/// Handles are opaque: a [`DataplaneRuntime::Flow`] names one edge of the
/// graph and is consumed by the stage it is attached to.  Every method may
/// fail; any failure during graph construction is fatal at startup.
pub trait DataplaneRuntime {
    /// One edge of the flow graph.
    type Flow;
    /// A sideband (host stack) device bound to a port.
    type Sideband;
    /// The runtime's error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Receive from a NIC port.
    fn rx(&mut self, port_index: u16) -> Result<Self::Flow, Self::Error>;

    /// Send a flow out a NIC port.
    fn tx(&mut self, flow: Self::Flow, port_index: u16) -> Result<(), Self::Error>;

    /// Split a flow into `outputs` legs; the classifier picks the leg per
    /// packet.
    fn splitter(
        &mut self,
        flow: Self::Flow,
        classifier: Box<dyn Classifier>,
        outputs: usize,
    ) -> Result<Vec<Self::Flow>, Self::Error>;

    /// Merge two flows into one.
    fn merger(&mut self, left: Self::Flow, right: Self::Flow)
    -> Result<Self::Flow, Self::Error>;

    /// Terminate a flow, discarding its packets.
    fn stop(&mut self, flow: Self::Flow) -> Result<(), Self::Error>;

    /// Create a sideband device named `name` bound to a port.
    fn create_sideband(
        &mut self,
        port_index: u16,
        name: &str,
    ) -> Result<Self::Sideband, Self::Error>;

    /// Receive traffic the host stack emits on a sideband device.
    fn rx_sideband(&mut self, sideband: &Self::Sideband) -> Result<Self::Flow, Self::Error>;

    /// Deliver a flow into a sideband device.
    fn tx_sideband(
        &mut self,
        flow: Self::Flow,
        sideband: &Self::Sideband,
    ) -> Result<(), Self::Error>;

    /// The MAC address of a NIC port.
    fn mac_of(&self, port_index: u16) -> Mac;

    /// Whether all the given ports can offload TX checksums.
    fn hw_tx_checksum_capable(&self, ports: &[u16]) -> bool;
}

/// Per-packet callback attached to a splitter.  Returns the output index to
/// route the frame to.
pub trait Classifier: Send + Sync {
    /// Classify (and possibly rewrite) one frame.
    fn classify(&self, frame: &mut Vec<u8>) -> usize;
}

/// Debug emission of dropped packets.  The sink's format is its own concern;
/// the default discards everything.
pub trait DumpSink: Send + Sync {
    /// Record one dropped frame.
    fn dump(&self, pair_index: usize, direction: Direction, frame: &[u8]);
}

/// The do-nothing [`DumpSink`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDump;

impl DumpSink for NoDump {
    fn dump(&self, _pair_index: usize, _direction: Direction, _frame: &[u8]) {}
}

/// The splitter callback for one pair and direction.  Owns everything the
/// engine needs per packet, including the pair index as opaque handler
/// context.
pub struct TranslationHandler {
    pair: Arc<NatPair>,
    pair_index: usize,
    direction: Direction,
    settings: Settings,
    clock: Arc<Clock>,
    dump: Arc<dyn DumpSink>,
}

impl TranslationHandler {
    /// Assemble a handler for `direction` of the pair at `pair_index`.
    #[must_use]
    pub fn new(
        pair: Arc<NatPair>,
        pair_index: usize,
        direction: Direction,
        settings: Settings,
        clock: Arc<Clock>,
        dump: Arc<dyn DumpSink>,
    ) -> TranslationHandler {
        TranslationHandler {
            pair,
            pair_index,
            direction,
            settings,
            clock,
            dump,
        }
    }

    /// The pair this handler serves.
    #[must_use]
    pub fn pair_index(&self) -> usize {
        self.pair_index
    }

    /// The direction this handler serves.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl Classifier for TranslationHandler {
    fn classify(&self, frame: &mut Vec<u8>) -> usize {
        let verdict = classify_frame(
            &self.pair,
            self.direction,
            frame,
            &self.settings,
            self.clock.now(),
        );
        if verdict == Verdict::Drop {
            trace!(
                "pair {} {:?}: dropping frame of {} bytes",
                self.pair_index,
                self.direction,
                frame.len()
            );
            if self.settings.debug_dump {
                self.dump.dump(self.pair_index, self.direction, frame);
            }
        }
        verdict.output()
    }
}
