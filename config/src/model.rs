// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! External configuration model, mirroring the JSON document.

use crate::errors::ConfigError;
use net::ip::Proto;
use net::ipv4::addr::Ipv4Subnet;
use serde::Deserialize;
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;

/// Top level of the configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The configured port pairs, in document order.
    #[serde(rename = "port-pairs")]
    pub port_pairs: Vec<PortPairConfig>,
}

/// One (private, public) interface pair.
#[derive(Debug, Clone, Deserialize)]
pub struct PortPairConfig {
    /// The private side of the pair.
    #[serde(rename = "private-port")]
    pub private: PortConfig,
    /// The public side of the pair.
    #[serde(rename = "public-port")]
    pub public: PortConfig,
}

/// Configuration of one network port.
#[derive(Debug, Clone, Deserialize)]
pub struct PortConfig {
    /// Port index in the dataplane runtime.
    pub index: u16,
    /// The subnet this port faces.  On the public side this is usually the
    /// single-host subnet holding the shared public address.
    pub subnet: Ipv4Subnet,
    /// 802.1Q tag for this port's network; 0 means untagged.
    #[serde(rename = "vlan-tag", default)]
    pub vlan: u16,
    /// Name of the sideband (KNI-style) interface towards the local host
    /// stack, when one is wanted.
    #[serde(rename = "kni-name", default)]
    pub sideband_name: Option<String>,
    /// Default next hop for destinations outside `subnet`.  Without one such
    /// packets cannot be resolved and are dropped.
    #[serde(default)]
    pub gateway: Option<Ipv4Addr>,
    /// Static forwarding rules exposing selected ports.
    #[serde(rename = "forward-ports", default)]
    pub forward_ports: Vec<ForwardedPort>,
}

/// A static forwarding rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForwardedPort {
    /// The public-side L4 port to listen on.
    pub port: u16,
    /// Where matching traffic is delivered.  Address `0.0.0.0` means the
    /// local sideband interface; port 0 means "same as `port`" and is
    /// normalized away during validation.
    pub destination: HostPort,
    /// The rule's protocol; only TCP and UDP can be forwarded.
    pub protocol: FwdProto,
    /// Set by validation for sideband-bound rules.
    #[serde(skip)]
    pub to_sideband: bool,
}

impl Display for ForwardedPort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "port {} -> {} ({})",
            self.port, self.destination, self.protocol.0
        )
    }
}

/// An `address:port` endpoint as written in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPort {
    /// The IPv4 address part.
    pub addr: Ipv4Addr,
    /// The port part; 0 when omitted.
    pub port: u16,
}

impl Display for HostPort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

impl std::str::FromStr for HostPort {
    type Err = ConfigError;

    /// Parse `A.B.C.D:P`; the port may be omitted (with or without the
    /// trailing colon) and defaults to zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, port_str) = match s.split_once(':') {
            Some((addr, port)) => (addr, port),
            None => (s, ""),
        };
        let addr = addr_str
            .parse::<Ipv4Addr>()
            .map_err(|_| ConfigError::Parse(format!("bad ipv4 address: {addr_str}")))?;
        let port = if port_str.is_empty() {
            0
        } else {
            port_str
                .parse::<u16>()
                .map_err(|_| ConfigError::Parse(format!("bad port number: {port_str}")))?
        };
        Ok(HostPort { addr, port })
    }
}

impl<'de> Deserialize<'de> for HostPort {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Protocol of a forwarding rule.  Unlike the packet path, which also
/// translates ICMP, a rule can only name TCP or UDP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FwdProto(pub Proto);

impl<'de> Deserialize<'de> for FwdProto {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "TCP" => Ok(FwdProto(Proto::Tcp)),
            "UDP" => Ok(FwdProto(Proto::Udp)),
            other => Err(serde::de::Error::custom(ConfigError::BadProtocol(
                other.to_string(),
            ))),
        }
    }
}

impl Config {
    /// Parse a JSON configuration document.  Unknown fields are ignored;
    /// missing required fields are reported as [`ConfigError::Parse`].
    pub fn from_json(document: &str) -> Result<Config, ConfigError> {
        serde_json::from_str(document).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
