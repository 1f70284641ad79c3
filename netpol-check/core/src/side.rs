use std::net::IpAddr;
use std::sync::Arc;

use crate::labels::{Labels, Selector};
use crate::network::{self, InvalidCidr, IpBlock};
use crate::policy::NetworkPolicy;
use crate::port::{DestinationPort, Protocol};

/// A namespace as the engine sees it.
#[derive(Clone, Debug, Default)]
pub struct Namespace {
    pub name: String,
    pub labels: Labels,
}

/// An in-cluster workload as the engine sees it.
#[derive(Clone, Debug, Default)]
pub struct Workload {
    pub name: String,
    pub labels: Labels,

    /// The node the workload is scheduled on; empty until scheduled.
    pub node: String,

    /// The workload's assigned IP in string form; empty until assigned.
    pub ip: String,

    /// Reported lifecycle phase, used only in diagnostics.
    pub phase: String,

    /// Every port declared by the workload's containers.
    pub ports: Vec<DestinationPort>,
}

#[derive(Debug, thiserror::Error)]
pub enum SideError {
    #[error("{name} has no IP assigned (phase: {phase}); ipBlock rules cannot be evaluated")]
    MissingPodIp { name: String, phase: String },

    #[error("invalid IP {ip:?} on {name}")]
    InvalidIp { ip: String, name: String },

    #[error("invalid port number {0:?}")]
    InvalidPort(String),

    #[error("unable to find port {port:?} on {name}")]
    PortNotFound { port: String, name: String },
}

/// One endpoint of the candidate connection.
///
/// The two variants differ in which capabilities return meaningful answers:
/// an external endpoint has no labels, namespace, or policies, but can still
/// match address-based peers.
#[derive(Clone, Debug)]
pub enum ConnectionSide {
    Workload(WorkloadSide),
    External(ExternalSide),
}

#[derive(Clone, Debug)]
pub struct WorkloadSide {
    namespace: Namespace,
    workload: Workload,
    policies: Vec<Arc<NetworkPolicy>>,
    ports: Vec<DestinationPort>,
    ip: IpAddr,
}

#[derive(Clone, Debug)]
pub struct ExternalSide {
    ip_str: String,
    ip: IpAddr,
    port: DestinationPort,
}

// === impl ConnectionSide ===

impl ConnectionSide {
    /// Builds the in-cluster variant, verifying the workload's IP and
    /// resolving the optional port identifier against its declared ports.
    pub fn workload(
        namespace: Namespace,
        workload: Workload,
        policies: Vec<Arc<NetworkPolicy>>,
        port: Option<&str>,
    ) -> Result<Self, SideError> {
        let name = format!("{}/{}", namespace.name, workload.name);

        if workload.ip.is_empty() {
            // A new pod may not have an IP yet. An expected case, but worth
            // distinguishing from a policy evaluating to Deny.
            return Err(SideError::MissingPodIp {
                name,
                phase: workload.phase.clone(),
            });
        }
        let ip = workload
            .ip
            .parse::<IpAddr>()
            .map_err(|_| SideError::InvalidIp {
                ip: workload.ip.clone(),
                name: name.clone(),
            })?;

        let ports = match port {
            Some(id) => vec![port_from_identifier(&workload, &name, id)?],
            None => workload.ports.clone(),
        };

        Ok(Self::Workload(WorkloadSide {
            namespace,
            workload,
            policies,
            ports,
            ip,
        }))
    }

    /// Builds the external variant from user-supplied address, port, and
    /// protocol.
    pub fn external(ip: &str, port: &str, protocol: Protocol) -> Result<Self, SideError> {
        let number = port
            .parse::<u16>()
            .map_err(|_| SideError::InvalidPort(port.to_string()))?;

        let addr = ip.parse::<IpAddr>().map_err(|_| SideError::InvalidIp {
            ip: ip.to_string(),
            name: ip.to_string(),
        })?;

        Ok(Self::External(ExternalSide {
            ip_str: ip.to_string(),
            ip: addr,
            port: DestinationPort {
                in_cluster: false,
                name: String::new(),
                number,
                protocol,
            },
        }))
    }

    /// A human-readable identifier used only in diagnostics.
    pub fn name(&self) -> String {
        match self {
            Self::Workload(w) => format!("{}/{}", w.namespace.name, w.workload.name),
            Self::External(e) => format!("{}:{}", e.ip_str, e.port.number),
        }
    }

    pub fn match_pod_selector(&self, selector: &Selector) -> bool {
        match self {
            Self::Workload(w) => selector.matches(&w.workload.labels),
            Self::External(_) => false,
        }
    }

    pub fn match_namespace_selector(&self, selector: &Selector) -> bool {
        match self {
            Self::Workload(w) => selector.matches(&w.namespace.labels),
            Self::External(_) => false,
        }
    }

    pub fn match_ip_block(&self, block: &IpBlock) -> Result<bool, InvalidCidr> {
        match self {
            Self::Workload(w) => network::match_ip_block(block, w.ip, &w.workload.ip),
            Self::External(e) => network::match_ip_block(block, e.ip, &e.ip_str),
        }
    }

    pub fn is_in_namespace(&self, name: &str) -> bool {
        match self {
            Self::Workload(w) => w.namespace.name == name,
            Self::External(_) => false,
        }
    }

    pub fn is_on_node(&self, name: &str) -> bool {
        match self {
            Self::Workload(w) => w.workload.node == name,
            Self::External(_) => false,
        }
    }

    pub fn is_in_cluster(&self) -> bool {
        matches!(self, Self::Workload(_))
    }

    /// The node this side is scheduled on, when known.
    pub fn node(&self) -> Option<&str> {
        match self {
            Self::Workload(w) if !w.workload.node.is_empty() => Some(&w.workload.node),
            _ => None,
        }
    }

    pub fn policies(&self) -> &[Arc<NetworkPolicy>] {
        match self {
            Self::Workload(w) => &w.policies,
            Self::External(_) => &[],
        }
    }

    /// The candidate destination ports when this side receives the
    /// connection.
    pub fn ports(&self) -> &[DestinationPort] {
        match self {
            Self::Workload(w) => &w.ports,
            Self::External(e) => std::slice::from_ref(&e.port),
        }
    }
}

/// Resolves a user-supplied port name or number against a workload's
/// declared ports.
fn port_from_identifier(
    workload: &Workload,
    name: &str,
    id: &str,
) -> Result<DestinationPort, SideError> {
    let number = id.parse::<u16>().ok();

    workload
        .ports
        .iter()
        .find(|p| p.name == id || number.map_or(false, |n| p.number == n))
        .cloned()
        .ok_or_else(|| SideError::PortNotFound {
            port: id.to_string(),
            name: name.to_string(),
        })
}
