use std::fmt;

use crate::labels::Selector;
use crate::network::IpBlock;
use crate::port::PolicyPort;

/// The direction of traffic a policy describes, relative to the workloads it
/// selects.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Ingress,
    Egress,
}

/// A normalized namespace-scoped network policy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkPolicy {
    pub namespace: String,
    pub name: String,

    /// Selects the workloads this policy applies to.
    pub pod_selector: Selector,

    /// The directions this policy describes. A direction listed here with no
    /// rules denies all traffic in that direction for selected workloads.
    pub types: Vec<Direction>,

    pub ingress: Vec<Rule>,
    pub egress: Vec<Rule>,
}

/// One clause of a policy: the admitted peers and the ports they may reach.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rule {
    pub peers: Vec<Peer>,
    pub ports: Vec<PolicyPort>,
}

/// Who may be on the other end of a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Peer {
    /// An address-based peer. Exclusive with the selector form.
    IpBlock(IpBlock),

    /// A selector-based peer. Absence is semantically distinct from
    /// present-but-empty: an absent namespace selector restricts the peer to
    /// the policy's own namespace, and an absent pod selector admits any
    /// in-cluster workload.
    Selectors {
        namespaces: Option<Selector>,
        pods: Option<Selector>,
    },
}

// === impl NetworkPolicy ===

impl NetworkPolicy {
    pub fn describes(&self, direction: Direction) -> bool {
        self.types.contains(&direction)
    }

    pub fn rules(&self, direction: Direction) -> &[Rule] {
        match direction {
            Direction::Ingress => &self.ingress,
            Direction::Egress => &self.egress,
        }
    }
}

// === impl Direction ===

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ingress => "Ingress",
            Self::Egress => "Egress",
        })
    }
}
