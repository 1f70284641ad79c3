use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::network::InvalidCidr;
use crate::policy::{Direction, NetworkPolicy, Peer, Rule};
use crate::port::{port_contains, DestinationPort};
use crate::side::ConnectionSide;

/// A single policy's contribution to one direction of the verdict.
///
/// The ordinals are load-bearing: contributions combine by maximum, so an
/// Allow from any applicable policy dominates Denies from the rest.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EvalResult {
    NoMatch = 0,
    Deny = 1,
    Allow = 2,
}

/// One policy's attributed result.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyResult {
    pub policy: Arc<NetworkPolicy>,
    pub result: EvalResult,
}

/// The decomposed verdict for one destination port.
#[derive(Clone, Debug, PartialEq)]
pub struct PortResult {
    pub to_port: DestinationPort,
    pub egress: Vec<PolicyResult>,
    pub ingress: Vec<PolicyResult>,
    pub egress_allowed: bool,
    pub ingress_allowed: bool,
    pub allowed: bool,
}

/// An out-of-band diagnostic emitted during evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// Both sides sit on the same node, where kubernetes admits traffic
    /// without consulting policies. Evaluation continues as if that shortcut
    /// did not exist.
    SameNode { node: String },
}

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// A policy carried an ipBlock the matcher could not evaluate. Inputs
    /// are validated before evaluation starts, so this indicates malformed
    /// policy content and aborts the run.
    #[error("error evaluating ipBlock of {namespace}/{name} against {other}: {source}")]
    Cidr {
        namespace: String,
        name: String,
        other: String,
        #[source]
        source: InvalidCidr,
    },
}

/// Evaluates every destination port exposed by `dest`, attributing each
/// policy's contribution in both directions.
///
/// Port results are emitted in the destination's port order; attributions in
/// each direction follow the side's policy order.
pub fn eval_connection(
    source: &ConnectionSide,
    dest: &ConnectionSide,
    mut notice: impl FnMut(Notice),
) -> Result<Vec<PortResult>, EvalError> {
    if let Some(node) = source.node() {
        if dest.is_on_node(node) {
            notice(Notice::SameNode {
                node: node.to_string(),
            });
        }
    }

    let mut results = Vec::with_capacity(dest.ports().len());
    for to_port in dest.ports() {
        debug!(port.name = %to_port.name, port.number = to_port.number, "evaluating port");

        let mut egress = Vec::new();
        if source.is_in_cluster() {
            for policy in source.policies() {
                egress.push(PolicyResult {
                    result: eval_policy(source, policy, dest, to_port, Direction::Egress)?,
                    policy: policy.clone(),
                });
            }
        }

        let mut ingress = Vec::new();
        if dest.is_in_cluster() {
            for policy in dest.policies() {
                ingress.push(PolicyResult {
                    result: eval_policy(dest, policy, source, to_port, Direction::Ingress)?,
                    policy: policy.clone(),
                });
            }
        }

        let egress_allowed = combine_results(&egress);
        let ingress_allowed = combine_results(&ingress);
        results.push(PortResult {
            to_port: to_port.clone(),
            egress,
            ingress,
            egress_allowed,
            ingress_allowed,
            allowed: egress_allowed && ingress_allowed,
        });
    }

    Ok(results)
}

/// Reduces one direction's attributions to a verdict.
///
/// NoMatch, Deny  -> Deny
/// NoMatch, Allow -> Allow
/// Deny, Allow    -> Allow
///
/// The absence of any applicable policy is Allow.
fn combine_results(results: &[PolicyResult]) -> bool {
    match results.iter().map(|r| r.result).max() {
        None | Some(EvalResult::NoMatch) => true,
        Some(max) => max == EvalResult::Allow,
    }
}

/// Applies one policy in one direction. `own` is the side the policy hangs
/// off: the destination for ingress, the source for egress. `other` is the
/// opposite side.
fn eval_policy(
    own: &ConnectionSide,
    policy: &NetworkPolicy,
    other: &ConnectionSide,
    to_port: &DestinationPort,
    direction: Direction,
) -> Result<EvalResult, EvalError> {
    if !policy.describes(direction) {
        trace!(
            policy.namespace = %policy.namespace,
            policy.name = %policy.name,
            %direction,
            "policy does not describe direction",
        );
        return Ok(EvalResult::NoMatch);
    }

    if !own.match_pod_selector(&policy.pod_selector) {
        trace!(
            policy.namespace = %policy.namespace,
            policy.name = %policy.name,
            side = %own.name(),
            "pod selector does not match",
        );
        return Ok(EvalResult::NoMatch);
    }

    for rule in policy.rules(direction) {
        if eval_rule(policy, rule, other, to_port)? {
            return Ok(EvalResult::Allow);
        }
    }

    debug!(
        policy.namespace = %policy.namespace,
        policy.name = %policy.name,
        %direction,
        "denied for lack of a matching rule",
    );
    Ok(EvalResult::Deny)
}

/// Does this rule admit `other` at `to_port`?
///
/// Peers are alternatives only until the first match: once a peer matches,
/// its port list is authoritative for this rule and later peers are not
/// consulted.
fn eval_rule(
    policy: &NetworkPolicy,
    rule: &Rule,
    other: &ConnectionSide,
    to_port: &DestinationPort,
) -> Result<bool, EvalError> {
    for peer in &rule.peers {
        let peer_match = match peer {
            Peer::IpBlock(block) => {
                other
                    .match_ip_block(block)
                    .map_err(|source| EvalError::Cidr {
                        namespace: policy.namespace.clone(),
                        name: policy.name.clone(),
                        other: other.name(),
                        source,
                    })?
            }
            Peer::Selectors { namespaces, pods } => {
                let namespace_match = match namespaces {
                    // Absent: restrict to the policy's own namespace.
                    None => other.is_in_namespace(&policy.namespace),
                    Some(selector) => other.match_namespace_selector(selector),
                };

                let pod_match = match pods {
                    // Absent: any in-cluster workload, never an external
                    // host.
                    None => other.is_in_cluster(),
                    Some(selector) => other.match_pod_selector(selector),
                };

                namespace_match && pod_match
            }
        };

        if peer_match {
            if rule.ports.is_empty() {
                trace!("peer matched with an empty port list; all ports admitted");
                return Ok(true);
            }
            return Ok(rule.ports.iter().any(|p| port_contains(p, to_port)));
        }
    }

    Ok(false)
}

// === impl EvalResult ===

impl fmt::Display for EvalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoMatch => "NoMatch",
            Self::Deny => "Deny",
            Self::Allow => "Allow",
        })
    }
}
