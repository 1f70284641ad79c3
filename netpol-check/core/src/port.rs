use std::fmt;
use std::str::FromStr;

/// Transport protocol of a policy or destination port.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown protocol {0:?}")]
pub struct InvalidProtocol(pub String);

/// A port identifier in a policy rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortId {
    Number(u16),
    Name(String),
}

/// One port specification from a policy rule.
///
/// An absent `port` admits all ports on the protocol. A named port cannot
/// carry a range; `end_port` is only meaningful with a numeric `port`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyPort {
    pub protocol: Protocol,
    pub port: Option<PortId>,
    pub end_port: Option<u16>,
}

/// A concrete destination port the engine evaluates against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DestinationPort {
    /// Whether this port was discovered on a workload in the cluster rather
    /// than declared for an external endpoint.
    pub in_cluster: bool,
    pub name: String,
    pub number: u16,
    pub protocol: Protocol,
}

/// Does `policy_port` admit `to_port`?
pub fn port_contains(policy_port: &PolicyPort, to_port: &DestinationPort) -> bool {
    if policy_port.protocol != to_port.protocol {
        return false;
    }

    match &policy_port.port {
        // No port means all ports.
        None => true,
        Some(PortId::Name(name)) => name == &to_port.name,
        Some(PortId::Number(number)) => match policy_port.end_port {
            // Inclusive range [port, end_port].
            Some(end) => (*number..=end).contains(&to_port.number),
            None => *number == to_port.number,
        },
    }
}

// === impl Protocol ===

impl FromStr for Protocol {
    type Err = InvalidProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            "sctp" => Ok(Self::Sctp),
            _ => Err(InvalidProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
            Self::Sctp => "SCTP",
        })
    }
}
