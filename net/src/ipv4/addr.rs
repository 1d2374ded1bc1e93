// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! IPv4 subnet type.

use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 subnet as an address plus netmask.
///
/// Membership is `(x & mask) == (addr & mask)`.  A single host is written
/// with a full mask (`/32`); the single-host form is also what a bare
/// address string parses to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Subnet {
    addr: Ipv4Addr,
    mask: u32,
}

/// Errors which can occur while parsing a subnet string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubnetParseError {
    /// The address part is not a valid IPv4 address.
    #[error("invalid ipv4 address in subnet: {0}")]
    BadAddress(String),
    /// The prefix length is not in `0..=32`.
    #[error("invalid prefix length in subnet: {0}")]
    BadPrefixLen(String),
}

impl Ipv4Subnet {
    /// Assemble a subnet from an address and a prefix length.
    ///
    /// # Errors
    ///
    /// Fails if `prefix_len > 32`.
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Result<Self, SubnetParseError> {
        if prefix_len > 32 {
            return Err(SubnetParseError::BadPrefixLen(prefix_len.to_string()));
        }
        let mask = if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix_len))
        };
        Ok(Self { addr, mask })
    }

    /// The single-host subnet containing exactly `addr`.
    #[must_use]
    pub fn host(addr: Ipv4Addr) -> Self {
        Self {
            addr,
            mask: u32::MAX,
        }
    }

    /// The subnet's address (not masked).
    #[must_use]
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    /// The subnet's netmask in host order.
    #[must_use]
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Whether `addr` lies within this subnet.
    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        (u32::from(addr) & self.mask) == (u32::from(self.addr) & self.mask)
    }

    /// Number of leading ones in the mask.
    #[must_use]
    pub fn prefix_len(&self) -> u8 {
        #[allow(clippy::cast_possible_truncation)] // leading_ones is at most 32
        {
            self.mask.leading_ones() as u8
        }
    }
}

impl Display for Ipv4Subnet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len())
    }
}

impl FromStr for Ipv4Subnet {
    type Err = SubnetParseError;

    /// Parse `A.B.C.D/N` (CIDR) or a bare `A.B.C.D` (implicit `/32`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((addr_str, len_str)) => {
                let addr = addr_str
                    .parse::<Ipv4Addr>()
                    .map_err(|_| SubnetParseError::BadAddress(addr_str.to_string()))?;
                let prefix_len = len_str
                    .parse::<u8>()
                    .map_err(|_| SubnetParseError::BadPrefixLen(len_str.to_string()))?;
                Self::new(addr, prefix_len)
            }
            None => {
                let addr = s
                    .parse::<Ipv4Addr>()
                    .map_err(|_| SubnetParseError::BadAddress(s.to_string()))?;
                Ok(Self::host(addr))
            }
        }
    }
}

impl serde::Serialize for Ipv4Subnet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Ipv4Subnet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cidr_and_bare_address() {
        let net: Ipv4Subnet = "10.0.0.0/24".parse().unwrap();
        assert_eq!(net.addr(), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(net.mask(), 0xffff_ff00);
        assert_eq!(net.to_string(), "10.0.0.0/24");

        let host: Ipv4Subnet = "203.0.113.5".parse().unwrap();
        assert_eq!(host.mask(), u32::MAX);
        assert_eq!(host.to_string(), "203.0.113.5/32");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("10.0.0.0/33".parse::<Ipv4Subnet>().is_err());
        assert!("10.0.0/24".parse::<Ipv4Subnet>().is_err());
        assert!("banana".parse::<Ipv4Subnet>().is_err());
    }

    #[test]
    fn membership() {
        let net: Ipv4Subnet = "10.0.0.0/24".parse().unwrap();
        assert!(net.contains(Ipv4Addr::new(10, 0, 0, 7)));
        assert!(net.contains(Ipv4Addr::new(10, 0, 0, 255)));
        assert!(!net.contains(Ipv4Addr::new(10, 0, 1, 1)));

        let all: Ipv4Subnet = "0.0.0.0/0".parse().unwrap();
        assert!(all.contains(Ipv4Addr::new(8, 8, 8, 8)));

        let host = Ipv4Subnet::host(Ipv4Addr::new(203, 0, 113, 5));
        assert!(host.contains(Ipv4Addr::new(203, 0, 113, 5)));
        assert!(!host.contains(Ipv4Addr::new(203, 0, 113, 6)));
    }

    #[test]
    fn display_parse_round_trip() {
        bolero::check!()
            .with_type::<([u8; 4], u8)>()
            .for_each(|&(octets, len)| {
                let net = Ipv4Subnet::new(Ipv4Addr::from(octets), len % 33).unwrap();
                let reparsed: Ipv4Subnet = net.to_string().parse().unwrap();
                assert_eq!(reparsed, net);
            });
    }

    #[test]
    fn serde_round_trip() {
        let net: Ipv4Subnet = serde_json::from_str("\"192.0.2.0/28\"").unwrap();
        assert_eq!(net.prefix_len(), 28);
        assert_eq!(serde_json::to_string(&net).unwrap(), "\"192.0.2.0/28\"");
    }
}
