// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration validation and normalization.

use crate::errors::ConfigError;
use crate::model::{Config, PortConfig};
use std::net::Ipv4Addr;
use tracing::debug;

/// One validated pair, with normalized forwarding rules.
#[derive(Debug, Clone)]
pub struct PairConfig {
    /// The private side of the pair.
    pub private: PortConfig,
    /// The public side of the pair.
    pub public: PortConfig,
}

/// The immutable configuration snapshot produced by [`Config::validate`].
///
/// Handed to the engine and the pipeline wiring at startup; never mutated
/// afterwards.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    /// The validated pairs, in document order.
    pub pairs: Vec<PairConfig>,
    /// Whether any sideband-bound forwarding rule exists, i.e. whether the
    /// runtime must support sideband devices at all.
    pub needs_sideband: bool,
}

impl Config {
    /// Validate the document and normalize it into a [`ValidatedConfig`].
    ///
    /// Checks, in order, for every pair: VLAN symmetry, then every
    /// forwarding rule (private side first): sideband rules must name a
    /// sideband interface and listen on the destination port; the private
    /// side admits only sideband rules; public rules must point inside the
    /// private subnet and get their destination port defaulted to the
    /// listen port.
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let mut needs_sideband = false;
        let mut pairs = Vec::with_capacity(self.port_pairs.len());

        for pair in self.port_pairs {
            let mut private = pair.private;
            let mut public = pair.public;

            if (private.vlan == 0) != (public.vlan == 0) {
                return Err(ConfigError::VlanAsymmetry {
                    private_index: private.index,
                    public_index: public.index,
                });
            }

            let private_subnet = private.subnet;
            for (is_private, port) in [(true, &mut private), (false, &mut public)] {
                for rule in &mut port.forward_ports {
                    if rule.destination.addr == Ipv4Addr::UNSPECIFIED {
                        if port.sideband_name.as_deref().is_none_or(str::is_empty) {
                            return Err(ConfigError::SidebandNameMissing(port.index));
                        }
                        if rule.destination.port != rule.port {
                            return Err(ConfigError::SidebandPortMismatch {
                                listen: rule.port,
                                destination: rule.destination.port,
                            });
                        }
                        rule.to_sideband = true;
                        needs_sideband = true;
                    } else if is_private {
                        return Err(ConfigError::ForwardOnPrivate(port.index));
                    } else {
                        if !private_subnet.contains(rule.destination.addr) {
                            return Err(ConfigError::DestinationOutsideSubnet {
                                destination: rule.destination.addr,
                                subnet: private_subnet,
                            });
                        }
                        if rule.destination.port == 0 {
                            rule.destination.port = rule.port;
                        }
                    }
                    debug!("validated forwarding rule on port {}: {rule}", port.index);
                }
            }

            pairs.push(PairConfig { private, public });
        }

        Ok(ValidatedConfig {
            pairs,
            needs_sideband,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> Config {
        Config::from_json(&value.to_string()).unwrap()
    }

    fn pair(private: serde_json::Value, public: serde_json::Value) -> Config {
        config(json!({"port-pairs": [{"private-port": private, "public-port": public}]}))
    }

    #[test]
    fn accepts_minimal_pair() {
        let validated = pair(
            json!({"index": 0, "subnet": "10.0.0.0/24"}),
            json!({"index": 1, "subnet": "203.0.113.5"}),
        )
        .validate()
        .unwrap();
        assert_eq!(validated.pairs.len(), 1);
        assert!(!validated.needs_sideband);
    }

    #[test]
    fn rejects_vlan_asymmetry_either_way() {
        for (private_vlan, public_vlan) in [(0, 200), (100, 0)] {
            let err = pair(
                json!({"index": 0, "subnet": "10.0.0.0/24", "vlan-tag": private_vlan}),
                json!({"index": 1, "subnet": "203.0.113.5", "vlan-tag": public_vlan}),
            )
            .validate()
            .unwrap_err();
            assert_eq!(
                err,
                ConfigError::VlanAsymmetry {
                    private_index: 0,
                    public_index: 1
                }
            );
        }
    }

    #[test]
    fn accepts_symmetric_vlans() {
        assert!(
            pair(
                json!({"index": 0, "subnet": "10.0.0.0/24", "vlan-tag": 100}),
                json!({"index": 1, "subnet": "203.0.113.5", "vlan-tag": 200}),
            )
            .validate()
            .is_ok()
        );
    }

    #[test]
    fn sideband_rule_requires_name_and_matching_port() {
        let err = pair(
            json!({"index": 0, "subnet": "10.0.0.0/24"}),
            json!({
                "index": 1,
                "subnet": "203.0.113.5",
                "forward-ports": [{"port": 67, "destination": "0.0.0.0:67", "protocol": "UDP"}]
            }),
        )
        .validate()
        .unwrap_err();
        assert_eq!(err, ConfigError::SidebandNameMissing(1));

        let err = pair(
            json!({"index": 0, "subnet": "10.0.0.0/24"}),
            json!({
                "index": 1,
                "subnet": "203.0.113.5",
                "kni-name": "nat0",
                "forward-ports": [{"port": 67, "destination": "0.0.0.0:68", "protocol": "UDP"}]
            }),
        )
        .validate()
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::SidebandPortMismatch {
                listen: 67,
                destination: 68
            }
        );
    }

    #[test]
    fn sideband_rule_sets_flags() {
        let validated = pair(
            json!({"index": 0, "subnet": "10.0.0.0/24"}),
            json!({
                "index": 1,
                "subnet": "203.0.113.5",
                "kni-name": "nat0",
                "forward-ports": [{"port": 67, "destination": "0.0.0.0:67", "protocol": "UDP"}]
            }),
        )
        .validate()
        .unwrap();
        assert!(validated.needs_sideband);
        assert!(validated.pairs[0].public.forward_ports[0].to_sideband);
    }

    #[test]
    fn sideband_rule_allowed_on_private_port() {
        let validated = pair(
            json!({
                "index": 0,
                "subnet": "10.0.0.0/24",
                "kni-name": "nat1",
                "forward-ports": [{"port": 53, "destination": "0.0.0.0:53", "protocol": "UDP"}]
            }),
            json!({"index": 1, "subnet": "203.0.113.5"}),
        )
        .validate()
        .unwrap();
        assert!(validated.needs_sideband);
        assert!(validated.pairs[0].private.forward_ports[0].to_sideband);
    }

    #[test]
    fn rejects_non_sideband_rule_on_private_port() {
        let err = pair(
            json!({
                "index": 0,
                "subnet": "10.0.0.0/24",
                "forward-ports": [{"port": 22, "destination": "10.0.0.9:22", "protocol": "TCP"}]
            }),
            json!({"index": 1, "subnet": "203.0.113.5"}),
        )
        .validate()
        .unwrap_err();
        assert_eq!(err, ConfigError::ForwardOnPrivate(0));
    }

    #[test]
    fn rejects_destination_outside_private_subnet() {
        let err = pair(
            json!({"index": 0, "subnet": "10.0.0.0/24"}),
            json!({
                "index": 1,
                "subnet": "203.0.113.5",
                "forward-ports": [{"port": 22, "destination": "192.168.1.9:22", "protocol": "TCP"}]
            }),
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, ConfigError::DestinationOutsideSubnet { .. }));
    }

    #[test]
    fn defaults_destination_port_to_listen_port() {
        let validated = pair(
            json!({"index": 0, "subnet": "10.0.0.0/24"}),
            json!({
                "index": 1,
                "subnet": "203.0.113.5",
                "forward-ports": [{"port": 8080, "destination": "10.0.0.9", "protocol": "TCP"}]
            }),
        )
        .validate()
        .unwrap();
        assert_eq!(
            validated.pairs[0].public.forward_ports[0].destination.port,
            8080
        );
    }
}
