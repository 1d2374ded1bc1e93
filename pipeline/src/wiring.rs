// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-pair flow graph assembly.

use crate::runtime::{Classifier, DataplaneRuntime, DumpSink, TranslationHandler};
use config::ValidatedConfig;
use nat::{Direction, Nat, Settings};
use std::sync::Arc;
use tracing::{debug, info};

/// Process-level flags supplied by the host binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartupFlags {
    /// Skip all checksum work on modified packets.
    pub no_calculate_checksum: bool,
    /// Never offload L4 checksums to the NIC.
    pub no_hw_tx_checksum: bool,
    /// Emit dropped packets to the dump sink.
    pub debug_dump: bool,
}

/// A failure while constructing the flow graph.  Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum WiringError<E: std::error::Error + Send + Sync + 'static> {
    /// The dataplane runtime rejected a graph operation.
    #[error("dataplane runtime failure during graph construction: {0}")]
    Runtime(#[from] E),
    /// The runtime's splitter did not honor the requested output count.
    #[error("runtime splitter returned {got} outputs, expected {expected}")]
    SplitterOutputs {
        /// Requested output count.
        expected: usize,
        /// What the runtime returned.
        got: usize,
    },
}

struct SplitterLegs<F> {
    send: F,
    sideband: Option<F>,
}

/// Split `flow` through `classifier`, terminate the drop leg, and hand back
/// the send leg plus the optional sideband leg.
fn split_and_stop<R: DataplaneRuntime>(
    runtime: &mut R,
    flow: R::Flow,
    classifier: Box<dyn Classifier>,
    with_sideband: bool,
) -> Result<SplitterLegs<R::Flow>, WiringError<R::Error>> {
    let expected = if with_sideband { 3 } else { 2 };
    let mut legs = runtime.splitter(flow, classifier, expected)?;
    if legs.len() != expected {
        return Err(WiringError::SplitterOutputs {
            expected,
            got: legs.len(),
        });
    }
    let sideband = if with_sideband { legs.pop() } else { None };
    let (Some(send), Some(drop_leg)) = (legs.pop(), legs.pop()) else {
        return Err(WiringError::SplitterOutputs {
            expected,
            got: 0,
        });
    };
    runtime.stop(drop_leg)?;
    Ok(SplitterLegs { send, sideband })
}

/// Build the translation state and the full flow graph for every configured
/// pair.
///
/// Resolves port MACs and the hardware checksum capability from the runtime,
/// builds the engine state (lookup maps, port maps, static forwarding
/// entries), then wires receivers, splitters, sideband legs, mergers and
/// senders.  Returns the engine root; spawn
/// [`nat::maintenance::Maintainer`] on its pairs to run reclamation.
pub fn build_flows<R: DataplaneRuntime>(
    runtime: &mut R,
    config: &ValidatedConfig,
    flags: StartupFlags,
    dump: Arc<dyn DumpSink>,
) -> Result<Nat, WiringError<R::Error>> {
    let all_ports: Vec<u16> = config
        .pairs
        .iter()
        .flat_map(|pair| [pair.private.index, pair.public.index])
        .collect();
    let hw_capable = runtime.hw_tx_checksum_capable(&all_ports);
    let settings = Settings {
        no_calculate_checksum: flags.no_calculate_checksum,
        no_hw_tx_checksum: flags.no_hw_tx_checksum,
        hw_checksum: hw_capable && !flags.no_hw_tx_checksum,
        needs_sideband: config.needs_sideband,
        debug_dump: flags.debug_dump,
    };
    debug!("wiring {} pairs, settings {settings:?}", config.pairs.len());

    let nat = Nat::new(config, settings, |index| runtime.mac_of(index));

    for (pair_index, pair) in nat.pairs().iter().enumerate() {
        let private_index = pair.private().index();
        let public_index = pair.public().index();

        let handler = |direction| {
            Box::new(TranslationHandler::new(
                Arc::clone(pair),
                pair_index,
                direction,
                settings,
                Arc::clone(nat.clock()),
                Arc::clone(&dump),
            )) as Box<dyn Classifier>
        };

        // Public to private half.
        let public_rx = runtime.rx(public_index)?;
        let public_legs = split_and_stop(
            runtime,
            public_rx,
            handler(Direction::Pub2Pri),
            pair.public().has_sideband(),
        )?;
        let from_public_sideband = match (pair.public().sideband_name(), public_legs.sideband) {
            (Some(name), Some(leg)) => {
                let device = runtime.create_sideband(public_index, name)?;
                runtime.tx_sideband(leg, &device)?;
                Some(runtime.rx_sideband(&device)?)
            }
            _ => None,
        };

        // Private to public half.
        let private_rx = runtime.rx(private_index)?;
        let private_legs = split_and_stop(
            runtime,
            private_rx,
            handler(Direction::Pri2Pub),
            pair.private().has_sideband(),
        )?;
        let from_private_sideband = match (pair.private().sideband_name(), private_legs.sideband) {
            (Some(name), Some(leg)) => {
                let device = runtime.create_sideband(private_index, name)?;
                runtime.tx_sideband(leg, &device)?;
                Some(runtime.rx_sideband(&device)?)
            }
            _ => None,
        };

        // Traffic the public host stack emits merges with translated
        // private-side traffic heading out; symmetric for the other side.
        let to_public = match from_public_sideband {
            Some(sideband_rx) => runtime.merger(sideband_rx, private_legs.send)?,
            None => private_legs.send,
        };
        let to_private = match from_private_sideband {
            Some(sideband_rx) => runtime.merger(sideband_rx, public_legs.send)?,
            None => public_legs.send,
        };

        runtime.tx(to_private, private_index)?;
        runtime.tx(to_public, public_index)?;

        info!("wired pair {pair_index}: ports {private_index} <-> {public_index}");
    }

    Ok(nat)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::runtime::NoDump;
    use config::Config;
    use nat::Verdict;
    use net::eth::mac::Mac;
    use net::packet::Packet;
    use net::packet::test_utils::udp_frame;
    use serde_json::json;
    use std::collections::HashMap;
    use std::net::Ipv4Addr;

    /// What a mock flow handle currently points at.
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Node {
        Rx(u16),
        SplitterLeg { splitter: usize, output: usize },
        SidebandRx(usize),
        Merger(Box<Node>, Box<Node>),
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
    #[error("mock runtime failure injected at {0}")]
    struct MockFailure(&'static str);

    /// Records the constructed graph and keeps the classifiers so tests can
    /// drive packets through them.
    #[derive(Default)]
    struct MockRuntime {
        splitters: Vec<(Box<dyn Classifier>, usize)>,
        stopped: Vec<Node>,
        senders: Vec<(Node, u16)>,
        sidebands: Vec<(u16, String)>,
        sideband_senders: Vec<(Node, usize)>,
        macs: HashMap<u16, Mac>,
        hw_capable: bool,
        fail_at: Option<&'static str>,
    }

    impl MockRuntime {
        fn with_macs(macs: &[(u16, Mac)]) -> MockRuntime {
            MockRuntime {
                macs: macs.iter().copied().collect(),
                ..MockRuntime::default()
            }
        }

        fn maybe_fail(&self, site: &'static str) -> Result<(), MockFailure> {
            if self.fail_at == Some(site) {
                return Err(MockFailure(site));
            }
            Ok(())
        }
    }

    impl DataplaneRuntime for MockRuntime {
        type Flow = Node;
        type Sideband = usize;
        type Error = MockFailure;

        fn rx(&mut self, port_index: u16) -> Result<Node, MockFailure> {
            self.maybe_fail("rx")?;
            Ok(Node::Rx(port_index))
        }

        fn tx(&mut self, flow: Node, port_index: u16) -> Result<(), MockFailure> {
            self.maybe_fail("tx")?;
            self.senders.push((flow, port_index));
            Ok(())
        }

        fn splitter(
            &mut self,
            _flow: Node,
            classifier: Box<dyn Classifier>,
            outputs: usize,
        ) -> Result<Vec<Node>, MockFailure> {
            self.maybe_fail("splitter")?;
            let splitter = self.splitters.len();
            self.splitters.push((classifier, outputs));
            Ok((0..outputs)
                .map(|output| Node::SplitterLeg { splitter, output })
                .collect())
        }

        fn merger(&mut self, left: Node, right: Node) -> Result<Node, MockFailure> {
            self.maybe_fail("merger")?;
            Ok(Node::Merger(Box::new(left), Box::new(right)))
        }

        fn stop(&mut self, flow: Node) -> Result<(), MockFailure> {
            self.maybe_fail("stop")?;
            self.stopped.push(flow);
            Ok(())
        }

        fn create_sideband(&mut self, port_index: u16, name: &str) -> Result<usize, MockFailure> {
            self.maybe_fail("create_sideband")?;
            self.sidebands.push((port_index, name.to_string()));
            Ok(self.sidebands.len() - 1)
        }

        fn rx_sideband(&mut self, sideband: &usize) -> Result<Node, MockFailure> {
            self.maybe_fail("rx_sideband")?;
            Ok(Node::SidebandRx(*sideband))
        }

        fn tx_sideband(&mut self, flow: Node, sideband: &usize) -> Result<(), MockFailure> {
            self.maybe_fail("tx_sideband")?;
            self.sideband_senders.push((flow, *sideband));
            Ok(())
        }

        fn mac_of(&self, port_index: u16) -> Mac {
            self.macs.get(&port_index).copied().unwrap_or(Mac::ZERO)
        }

        fn hw_tx_checksum_capable(&self, _ports: &[u16]) -> bool {
            self.hw_capable
        }
    }

    const PRIVATE_MAC: Mac = Mac([0x02, 0, 0, 0, 0, 0x01]);
    const PUBLIC_MAC: Mac = Mac([0x02, 0, 0, 0, 0, 0x02]);
    const HOST_MAC: Mac = Mac([0x02, 0, 0, 0, 0, 0x07]);

    fn plain_config() -> ValidatedConfig {
        Config::from_json(
            &json!({
                "port-pairs": [{
                    "private-port": {"index": 0, "subnet": "10.0.0.0/24"},
                    "public-port": {"index": 1, "subnet": "203.0.113.5", "gateway": "203.0.113.1"}
                }]
            })
            .to_string(),
        )
        .unwrap()
        .validate()
        .unwrap()
    }

    fn sideband_config() -> ValidatedConfig {
        Config::from_json(
            &json!({
                "port-pairs": [{
                    "private-port": {"index": 0, "subnet": "10.0.0.0/24"},
                    "public-port": {
                        "index": 1,
                        "subnet": "203.0.113.5",
                        "kni-name": "nat0",
                        "forward-ports": [
                            {"port": 67, "destination": "0.0.0.0:67", "protocol": "UDP"}
                        ]
                    }
                }]
            })
            .to_string(),
        )
        .unwrap()
        .validate()
        .unwrap()
    }

    #[test]
    fn wires_plain_pair_without_mergers() {
        let mut runtime =
            MockRuntime::with_macs(&[(0, PRIVATE_MAC), (1, PUBLIC_MAC)]);
        let nat = build_flows(
            &mut runtime,
            &plain_config(),
            StartupFlags::default(),
            Arc::new(NoDump),
        )
        .unwrap();

        assert_eq!(nat.pairs().len(), 1);
        assert_eq!(nat.pairs()[0].private().mac(), PRIVATE_MAC);
        assert_eq!(nat.pairs()[0].public().mac(), PUBLIC_MAC);

        // Two splitters, both with exactly two outputs.
        assert_eq!(runtime.splitters.len(), 2);
        assert!(runtime.splitters.iter().all(|(_, outputs)| *outputs == 2));

        // Both drop legs are terminated.
        assert_eq!(
            runtime.stopped,
            vec![
                Node::SplitterLeg { splitter: 0, output: 0 },
                Node::SplitterLeg { splitter: 1, output: 0 },
            ]
        );

        // The send legs feed the opposite ports directly, no mergers.
        assert_eq!(
            runtime.senders,
            vec![
                (Node::SplitterLeg { splitter: 0, output: 1 }, 0),
                (Node::SplitterLeg { splitter: 1, output: 1 }, 1),
            ]
        );
        assert!(runtime.sidebands.is_empty());
    }

    #[test]
    fn wires_public_sideband_legs_and_merger() {
        let mut runtime =
            MockRuntime::with_macs(&[(0, PRIVATE_MAC), (1, PUBLIC_MAC)]);
        let nat = build_flows(
            &mut runtime,
            &sideband_config(),
            StartupFlags::default(),
            Arc::new(NoDump),
        )
        .unwrap();
        assert!(nat.settings().needs_sideband);

        // The public splitter requests the sideband leg, the private one
        // does not.
        assert_eq!(runtime.splitters[0].1, 3);
        assert_eq!(runtime.splitters[1].1, 2);

        // One sideband device, fed from the public splitter's third leg.
        assert_eq!(runtime.sidebands, vec![(1, "nat0".to_string())]);
        assert_eq!(
            runtime.sideband_senders,
            vec![(Node::SplitterLeg { splitter: 0, output: 2 }, 0)]
        );

        // tx(public) takes the merge of the sideband return traffic and the
        // private splitter's send leg; tx(private) is unmerged.
        assert_eq!(
            runtime.senders,
            vec![
                (Node::SplitterLeg { splitter: 0, output: 1 }, 0),
                (
                    Node::Merger(
                        Box::new(Node::SidebandRx(0)),
                        Box::new(Node::SplitterLeg { splitter: 1, output: 1 }),
                    ),
                    1
                ),
            ]
        );
    }

    #[test]
    fn classifiers_translate_and_route() {
        let mut runtime =
            MockRuntime::with_macs(&[(0, PRIVATE_MAC), (1, PUBLIC_MAC)]);
        let nat = build_flows(
            &mut runtime,
            &plain_config(),
            StartupFlags::default(),
            Arc::new(NoDump),
        )
        .unwrap();
        let pair = &nat.pairs()[0];
        pair.public()
            .arp
            .learn(Ipv4Addr::new(203, 0, 113, 1), Mac([2, 0, 0, 0, 0, 0xfe]));

        // Splitter 0 is public-to-private, splitter 1 private-to-public.
        let (pri2pub, _) = &runtime.splitters[1];
        let mut frame = udp_frame(
            HOST_MAC,
            PRIVATE_MAC,
            Ipv4Addr::new(10, 0, 0, 7),
            Ipv4Addr::new(8, 8, 8, 8),
            5555,
            53,
        )
        .serialize();
        assert_eq!(pri2pub.classify(&mut frame), Verdict::Send.output());
        let rewritten = Packet::parse(&frame).unwrap();
        assert_eq!(rewritten.src_addr(), Ipv4Addr::new(203, 0, 113, 5));

        // An unsolicited inbound frame lands on the drop leg.
        let (pub2pri, _) = &runtime.splitters[0];
        let mut frame = udp_frame(
            Mac([2, 0, 0, 0, 0, 0xee]),
            PUBLIC_MAC,
            Ipv4Addr::new(9, 9, 9, 9),
            Ipv4Addr::new(203, 0, 113, 5),
            1234,
            4000,
        )
        .serialize();
        assert_eq!(pub2pri.classify(&mut frame), Verdict::Drop.output());
        assert_eq!(pair.public().stats.unmapped.get(), 1);
    }

    #[test]
    fn wires_every_pair_independently() {
        let mut runtime = MockRuntime::with_macs(&[
            (0, PRIVATE_MAC),
            (1, PUBLIC_MAC),
            (2, Mac([2, 0, 0, 0, 0, 3])),
            (3, Mac([2, 0, 0, 0, 0, 4])),
        ]);
        let config = Config::from_json(
            &json!({
                "port-pairs": [
                    {
                        "private-port": {"index": 0, "subnet": "10.0.0.0/24"},
                        "public-port": {"index": 1, "subnet": "203.0.113.5"}
                    },
                    {
                        "private-port": {"index": 2, "subnet": "172.16.0.0/16"},
                        "public-port": {"index": 3, "subnet": "198.51.100.9"}
                    }
                ]
            })
            .to_string(),
        )
        .unwrap()
        .validate()
        .unwrap();

        let nat = build_flows(
            &mut runtime,
            &config,
            StartupFlags::default(),
            Arc::new(NoDump),
        )
        .unwrap();

        assert_eq!(nat.pairs().len(), 2);
        assert_eq!(runtime.splitters.len(), 4);
        assert_eq!(runtime.stopped.len(), 4);
        // Each pair's senders target its own ports.
        let sender_ports: Vec<u16> = runtime.senders.iter().map(|(_, port)| *port).collect();
        assert_eq!(sender_ports, vec![0, 1, 2, 3]);
    }

    #[test]
    fn hw_checksum_capability_is_resolved_into_settings() {
        let mut runtime =
            MockRuntime::with_macs(&[(0, PRIVATE_MAC), (1, PUBLIC_MAC)]);
        runtime.hw_capable = true;
        let nat = build_flows(
            &mut runtime,
            &plain_config(),
            StartupFlags::default(),
            Arc::new(NoDump),
        )
        .unwrap();
        assert!(nat.settings().hw_checksum);

        // The opt-out wins over capability.
        let mut runtime =
            MockRuntime::with_macs(&[(0, PRIVATE_MAC), (1, PUBLIC_MAC)]);
        runtime.hw_capable = true;
        let flags = StartupFlags {
            no_hw_tx_checksum: true,
            ..StartupFlags::default()
        };
        let nat = build_flows(&mut runtime, &plain_config(), flags, Arc::new(NoDump)).unwrap();
        assert!(!nat.settings().hw_checksum);
    }

    #[test]
    fn runtime_failures_are_fatal() {
        for site in ["rx", "splitter", "stop", "tx", "create_sideband"] {
            let mut runtime =
                MockRuntime::with_macs(&[(0, PRIVATE_MAC), (1, PUBLIC_MAC)]);
            runtime.fail_at = Some(site);
            let config = if site == "create_sideband" {
                sideband_config()
            } else {
                plain_config()
            };
            let result = build_flows(
                &mut runtime,
                &config,
                StartupFlags::default(),
                Arc::new(NoDump),
            );
            assert!(
                matches!(result, Err(WiringError::Runtime(MockFailure(s))) if s == site),
                "expected fatal error at {site}"
            );
        }
    }
}
