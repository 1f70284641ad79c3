//! Conversion from fetched API objects into the core evaluation model.
//!
//! The conversion is strict where the evaluation semantics depend on it:
//! nil-vs-empty selector distinctions are preserved, and policy ports whose
//! protocol is missing are rejected rather than silently defaulted.

use netpol_check_core as model;
use netpol_check_core::labels::{Expression, Operator};
use netpol_check_core::{
    DestinationPort, Direction, IpBlock, Peer, PolicyPort, PortId, Protocol, Rule,
};

use crate::{
    IntOrString, LabelSelector, LabelSelectorRequirement, Namespace, NetworkPolicy,
    NetworkPolicyPeer, NetworkPolicyPort, Pod,
};

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The API server materializes the TCP default server-side, so this only
    /// fires on genuinely malformed input.
    #[error("policy port in {policy} has no protocol")]
    InvalidPolicyPort { policy: String },

    #[error("invalid protocol in {owner}: {source}")]
    InvalidProtocol {
        owner: String,
        #[source]
        source: model::InvalidProtocol,
    },

    #[error("port number {port} in {owner} is out of range")]
    PortOutOfRange { owner: String, port: i32 },

    #[error("unknown selector operator {operator:?} in {owner}")]
    UnknownOperator { owner: String, operator: String },
}

/// Converts a fetched `NetworkPolicy` into the engine's model.
pub fn network_policy(np: NetworkPolicy) -> Result<model::NetworkPolicy, ConvertError> {
    let namespace = np.metadata.namespace.unwrap_or_default();
    let name = np.metadata.name.unwrap_or_default();
    let qualified = format!("{namespace}/{name}");

    let spec = np.spec.unwrap_or_default();

    let types = spec
        .policy_types
        .unwrap_or_default()
        .into_iter()
        .filter_map(|t| match t.as_str() {
            "Ingress" => Some(Direction::Ingress),
            "Egress" => Some(Direction::Egress),
            unknown => {
                tracing::warn!(policy = %qualified, policy_type = %unknown, "ignoring unknown policy type");
                None
            }
        })
        .collect();

    let ingress = spec
        .ingress
        .unwrap_or_default()
        .into_iter()
        .map(|r| rule(r.from, r.ports, &qualified))
        .collect::<Result<Vec<_>, _>>()?;

    let egress = spec
        .egress
        .unwrap_or_default()
        .into_iter()
        .map(|r| rule(r.to, r.ports, &qualified))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(model::NetworkPolicy {
        pod_selector: selector(spec.pod_selector, &qualified)?,
        namespace,
        name,
        types,
        ingress,
        egress,
    })
}

/// Converts a fetched `Pod` into the engine's workload model, flattening
/// every container's declared ports.
pub fn workload(pod: Pod) -> Result<model::Workload, ConvertError> {
    let namespace = pod.metadata.namespace.unwrap_or_default();
    let name = pod.metadata.name.unwrap_or_default();
    let qualified = format!("{namespace}/{name}");

    let spec = pod.spec.unwrap_or_default();
    let status = pod.status.unwrap_or_default();

    let mut ports = Vec::new();
    for container in spec.containers {
        for port in container.ports.unwrap_or_default() {
            // Unlike policy ports, a container port's protocol defaults to
            // TCP.
            let protocol = match port.protocol {
                None => Protocol::Tcp,
                Some(p) => p.parse().map_err(|source| ConvertError::InvalidProtocol {
                    owner: qualified.clone(),
                    source,
                })?,
            };

            ports.push(DestinationPort {
                in_cluster: true,
                name: port.name.unwrap_or_default(),
                number: port_number(port.container_port, &qualified)?,
                protocol,
            });
        }
    }

    Ok(model::Workload {
        name,
        labels: pod.metadata.labels.into(),
        node: spec.node_name.unwrap_or_default(),
        ip: status.pod_ip.unwrap_or_default(),
        phase: status.phase.unwrap_or_default(),
        ports,
    })
}

pub fn namespace(ns: Namespace) -> model::Namespace {
    model::Namespace {
        name: ns.metadata.name.unwrap_or_default(),
        labels: ns.metadata.labels.into(),
    }
}

/// Converts a label selector, preserving present-but-empty clause lists; the
/// caller tracks whole-selector absence with `Option`.
pub fn selector(sel: LabelSelector, owner: &str) -> Result<model::Selector, ConvertError> {
    let exprs = sel
        .match_expressions
        .map(|exprs| {
            exprs
                .into_iter()
                .map(|req| expression(req, owner))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    Ok(model::Selector::new(sel.match_labels, exprs))
}

fn expression(req: LabelSelectorRequirement, owner: &str) -> Result<Expression, ConvertError> {
    let operator = match req.operator.as_str() {
        "In" => Operator::In,
        "NotIn" => Operator::NotIn,
        "Exists" => Operator::Exists,
        "DoesNotExist" => Operator::DoesNotExist,
        unknown => {
            return Err(ConvertError::UnknownOperator {
                owner: owner.to_string(),
                operator: unknown.to_string(),
            })
        }
    };

    Ok(Expression::new(
        req.key,
        operator,
        req.values.map(|vs| vs.into_iter().collect()),
    ))
}

fn rule(
    peers: Option<Vec<NetworkPolicyPeer>>,
    ports: Option<Vec<NetworkPolicyPort>>,
    policy: &str,
) -> Result<Rule, ConvertError> {
    let peers = peers
        .unwrap_or_default()
        .into_iter()
        .map(|p| peer(p, policy))
        .collect::<Result<Vec<_>, _>>()?;

    let ports = ports
        .unwrap_or_default()
        .into_iter()
        .map(|p| policy_port(p, policy))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Rule { peers, ports })
}

fn peer(peer: NetworkPolicyPeer, policy: &str) -> Result<Peer, ConvertError> {
    // "If this field is set then neither of the other fields can be."
    if let Some(block) = peer.ip_block {
        return Ok(Peer::IpBlock(IpBlock {
            cidr: block.cidr,
            except: block.except.unwrap_or_default(),
        }));
    }

    Ok(Peer::Selectors {
        namespaces: peer
            .namespace_selector
            .map(|s| selector(s, policy))
            .transpose()?,
        pods: peer.pod_selector.map(|s| selector(s, policy)).transpose()?,
    })
}

fn policy_port(port: NetworkPolicyPort, policy: &str) -> Result<PolicyPort, ConvertError> {
    let protocol = port
        .protocol
        .ok_or_else(|| ConvertError::InvalidPolicyPort {
            policy: policy.to_string(),
        })?
        .parse::<Protocol>()
        .map_err(|source| ConvertError::InvalidProtocol {
            owner: policy.to_string(),
            source,
        })?;

    let id = port
        .port
        .map(|p| match p {
            IntOrString::Int(number) => port_number(number, policy).map(PortId::Number),
            IntOrString::String(name) => Ok(PortId::Name(name)),
        })
        .transpose()?;

    let end_port = port.end_port.map(|p| port_number(p, policy)).transpose()?;

    Ok(PolicyPort {
        protocol,
        port: id,
        end_port,
    })
}

fn port_number(number: i32, owner: &str) -> Result<u16, ConvertError> {
    u16::try_from(number).map_err(|_| ConvertError::PortOutOfRange {
        owner: owner.to_string(),
        port: number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Container, ContainerPort, IPBlock, NetworkPolicyIngressRule, NetworkPolicySpec, ObjectMeta,
        PodSpec, PodStatus,
    };
    use std::collections::BTreeMap;

    fn meta(namespace: &str, name: &str) -> ObjectMeta {
        ObjectMeta {
            namespace: Some(namespace.to_string()),
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        }
    }

    fn tcp_policy_port(port: Option<IntOrString>) -> NetworkPolicyPort {
        NetworkPolicyPort {
            port,
            end_port: None,
            protocol: Some("TCP".to_string()),
        }
    }

    #[test]
    fn preserves_nil_vs_empty_peer_selectors() {
        let np = NetworkPolicy {
            metadata: meta("ns-one", "peers"),
            spec: Some(NetworkPolicySpec {
                policy_types: Some(vec!["Ingress".to_string()]),
                ingress: Some(vec![NetworkPolicyIngressRule {
                    from: Some(vec![
                        NetworkPolicyPeer {
                            namespace_selector: None,
                            pod_selector: Some(LabelSelector::default()),
                            ip_block: None,
                        },
                        NetworkPolicyPeer {
                            namespace_selector: Some(LabelSelector::default()),
                            pod_selector: None,
                            ip_block: None,
                        },
                    ]),
                    ports: None,
                }]),
                ..NetworkPolicySpec::default()
            }),
        };

        let policy = network_policy(np).unwrap();
        assert_eq!(policy.ingress.len(), 1);

        match &policy.ingress[0].peers[0] {
            Peer::Selectors { namespaces, pods } => {
                assert!(namespaces.is_none());
                assert!(pods.as_ref().map_or(false, |s| s.selects_all()));
            }
            peer => panic!("unexpected peer {peer:?}"),
        }
        match &policy.ingress[0].peers[1] {
            Peer::Selectors { namespaces, pods } => {
                assert!(namespaces.as_ref().map_or(false, |s| s.selects_all()));
                assert!(pods.is_none());
            }
            peer => panic!("unexpected peer {peer:?}"),
        }
    }

    #[test]
    fn ip_block_peer_wins_over_selectors() {
        let converted = peer(
            NetworkPolicyPeer {
                ip_block: Some(IPBlock {
                    cidr: "10.0.0.0/8".to_string(),
                    except: Some(vec!["10.0.0.1".to_string()]),
                }),
                namespace_selector: None,
                pod_selector: None,
            },
            "ns-one/policy",
        )
        .unwrap();

        assert_eq!(
            converted,
            Peer::IpBlock(IpBlock {
                cidr: "10.0.0.0/8".to_string(),
                except: vec!["10.0.0.1".to_string()],
            }),
        );
    }

    #[test]
    fn policy_port_requires_a_protocol() {
        let err = policy_port(
            NetworkPolicyPort {
                port: Some(IntOrString::Int(80)),
                end_port: None,
                protocol: None,
            },
            "ns-one/policy",
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidPolicyPort { .. }));
    }

    #[test]
    fn policy_port_forms() {
        assert_eq!(
            policy_port(tcp_policy_port(None), "p").unwrap(),
            PolicyPort {
                protocol: Protocol::Tcp,
                port: None,
                end_port: None,
            },
        );

        assert_eq!(
            policy_port(tcp_policy_port(Some(IntOrString::Int(80))), "p").unwrap(),
            PolicyPort {
                protocol: Protocol::Tcp,
                port: Some(PortId::Number(80)),
                end_port: None,
            },
        );

        assert_eq!(
            policy_port(
                tcp_policy_port(Some(IntOrString::String("http".to_string()))),
                "p",
            )
            .unwrap(),
            PolicyPort {
                protocol: Protocol::Tcp,
                port: Some(PortId::Name("http".to_string())),
                end_port: None,
            },
        );

        let range = NetworkPolicyPort {
            port: Some(IntOrString::Int(8000)),
            end_port: Some(9000),
            protocol: Some("UDP".to_string()),
        };
        assert_eq!(
            policy_port(range, "p").unwrap(),
            PolicyPort {
                protocol: Protocol::Udp,
                port: Some(PortId::Number(8000)),
                end_port: Some(9000),
            },
        );
    }

    #[test]
    fn out_of_range_port_numbers_are_rejected() {
        let err = policy_port(tcp_policy_port(Some(IntOrString::Int(70000))), "p").unwrap_err();
        assert!(matches!(err, ConvertError::PortOutOfRange { port: 70000, .. }));

        let err = policy_port(tcp_policy_port(Some(IntOrString::Int(-1))), "p").unwrap_err();
        assert!(matches!(err, ConvertError::PortOutOfRange { port: -1, .. }));
    }

    #[test]
    fn unknown_policy_types_are_skipped() {
        let np = NetworkPolicy {
            metadata: meta("ns-one", "types"),
            spec: Some(NetworkPolicySpec {
                policy_types: Some(vec![
                    "Ingress".to_string(),
                    "Sideways".to_string(),
                    "Egress".to_string(),
                ]),
                ..NetworkPolicySpec::default()
            }),
        };

        let policy = network_policy(np).unwrap();
        assert_eq!(policy.types, vec![Direction::Ingress, Direction::Egress]);
    }

    #[test]
    fn unknown_selector_operator_is_an_error() {
        let err = selector(
            LabelSelector {
                match_expressions: Some(vec![LabelSelectorRequirement {
                    key: "zone".to_string(),
                    operator: "Near".to_string(),
                    values: None,
                }]),
                match_labels: None,
            },
            "ns-one/policy",
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::UnknownOperator { .. }));
    }

    #[test]
    fn workload_flattens_container_ports() {
        let pod = Pod {
            metadata: ObjectMeta {
                labels: Some(BTreeMap::from([(
                    "app".to_string(),
                    "graphql".to_string(),
                )])),
                ..meta("ns-one", "pod-one")
            },
            spec: Some(PodSpec {
                node_name: Some("node-a".to_string()),
                containers: vec![
                    Container {
                        name: "main".to_string(),
                        ports: Some(vec![ContainerPort {
                            name: Some("http".to_string()),
                            container_port: 8080,
                            // Defaults to TCP.
                            protocol: None,
                            ..ContainerPort::default()
                        }]),
                        ..Container::default()
                    },
                    Container {
                        name: "sidecar".to_string(),
                        ports: Some(vec![ContainerPort {
                            container_port: 9090,
                            protocol: Some("UDP".to_string()),
                            ..ContainerPort::default()
                        }]),
                        ..Container::default()
                    },
                ],
                ..PodSpec::default()
            }),
            status: Some(PodStatus {
                pod_ip: Some("10.0.0.7".to_string()),
                phase: Some("Running".to_string()),
                ..PodStatus::default()
            }),
        };

        let workload = super::workload(pod).unwrap();
        assert_eq!(workload.name, "pod-one");
        assert_eq!(workload.node, "node-a");
        assert_eq!(workload.ip, "10.0.0.7");
        assert_eq!(workload.phase, "Running");
        assert_eq!(
            workload.ports,
            vec![
                DestinationPort {
                    in_cluster: true,
                    name: "http".to_string(),
                    number: 8080,
                    protocol: Protocol::Tcp,
                },
                DestinationPort {
                    in_cluster: true,
                    name: String::new(),
                    number: 9090,
                    protocol: Protocol::Udp,
                },
            ],
        );
    }
}
