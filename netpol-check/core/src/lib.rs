#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Pure NetworkPolicy evaluation.
//!
//! Given a source side, a destination side, and the policies attached to
//! each, this crate decides per destination port whether the cluster's
//! policies admit the connection, attributing every policy's contribution in
//! both directions. It performs no I/O; callers load cluster state up front
//! and render the results however they like.

pub mod eval;
pub mod labels;
pub mod network;
pub mod policy;
pub mod port;
pub mod side;

pub use self::eval::{eval_connection, EvalError, EvalResult, Notice, PolicyResult, PortResult};
pub use self::labels::{Labels, Selector};
pub use self::network::{match_ip_block, InvalidCidr, IpBlock};
pub use self::policy::{Direction, NetworkPolicy, Peer, Rule};
pub use self::port::{port_contains, DestinationPort, InvalidProtocol, PolicyPort, PortId, Protocol};
pub use self::side::{ConnectionSide, Namespace, SideError, Workload};
