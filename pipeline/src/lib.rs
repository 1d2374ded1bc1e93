// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

//! # Flow graph wiring
//!
//! This crate connects the translation engine to a dataplane runtime.  The
//! runtime itself (NIC receive/send primitives, the flow-graph scheduler,
//! sideband device plumbing) is an external collaborator reached through the
//! [`DataplaneRuntime`] trait; [`build_flows`] assembles, for every
//! configured pair, the graph
//!
//! ```text
//! rx(public)  -> splitter(pub2pri) -> { drop, send, sideband? }
//! rx(private) -> splitter(pri2pub) -> { drop, send, sideband? }
//! tx(private) <- merge(sideband rx?, pub2pri send)
//! tx(public)  <- merge(sideband rx?, pri2pub send)
//! ```
//!
//! The splitter output indices are part of the runtime contract:
//! 0 = drop, 1 = send, 2 = sideband.  A port without a sideband requests
//! only two outputs.

mod runtime;
mod wiring;

pub use runtime::{Classifier, DataplaneRuntime, DumpSink, NoDump, TranslationHandler};
pub use wiring::{StartupFlags, WiringError, build_flows};
