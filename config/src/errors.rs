// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Type for configuration / validation failures.
//! Any result returned by the parsing or validation methods in this crate is
//! a `ConfigError`.

use net::ipv4::addr::Ipv4Subnet;
use std::net::Ipv4Addr;
use thiserror::Error;

/// The reasons why we may reject a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to parse configuration document: {0}")]
    Parse(String),
    #[error(
        "private port {private_index} and public port {public_index} differ in vlan tagging; \
         transition between vlan-enabled and vlan-disabled networks is not supported"
    )]
    VlanAsymmetry {
        private_index: u16,
        public_index: u16,
    },
    #[error("port {0} forwards to 0.0.0.0 but has no \"kni-name\" setting")]
    SidebandNameMissing(u16),
    #[error(
        "forwarding to address 0.0.0.0 delivers to the sideband interface and requires the \
         destination port to equal the forwarded port; got {listen} and {destination}"
    )]
    SidebandPortMismatch { listen: u16, destination: u16 },
    #[error(
        "port {0}: only sideband forwarding is allowed on a private port; translated \
         connections from private to public network need no forwarding rules"
    )]
    ForwardOnPrivate(u16),
    #[error("forwarding destination {destination} should be within subnet {subnet}")]
    DestinationOutsideSubnet {
        destination: Ipv4Addr,
        subnet: Ipv4Subnet,
    },
    #[error("bad protocol name: {0}")]
    BadProtocol(String),
}
