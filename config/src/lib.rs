// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

//! Configuration model for the NAT dataplane.
//!
//! The external model mirrors the JSON configuration document field for
//! field.  [`Config::validate`] checks the structural invariants the
//! translation engine depends on (VLAN symmetry within a pair, forwarding
//! rule sanity, subnet containment), normalizes the forwarding rules, and
//! produces the immutable [`ValidatedConfig`] snapshot handed to the rest of
//! the system at startup.  File I/O and argument parsing belong to the host
//! binary.

pub mod errors;
pub mod model;
mod validate;

pub use errors::ConfigError;
pub use model::{Config, ForwardedPort, HostPort, PortConfig, PortPairConfig};
pub use validate::{PairConfig, ValidatedConfig};
