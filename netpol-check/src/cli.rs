use clap::{ArgGroup, Parser, Subcommand};

use netpol_check_core::Protocol;

#[derive(Debug, Parser)]
#[clap(
    name = "netpol-check",
    version,
    about = "Evaluate whether NetworkPolicies admit a connection"
)]
pub struct Cli {
    #[clap(long, env = "NETPOL_CHECK_LOG", default_value = "netpol_check=info,warn")]
    pub log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    pub log_format: kubert::LogFormat,

    #[clap(flatten)]
    pub client: kubert::ClientArgs,

    /// Show more detail on NetworkPolicy evaluation. Repeat to also show
    /// policies that did not match.
    #[clap(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Given source and destination, evaluate if NetworkPolicies allow the
    /// source pod to access any ports on the destination.
    Eval(EvalArgs),

    /// List the NetworkPolicies that select a pod.
    Inspect(InspectArgs),
}

#[derive(Debug, clap::Args)]
#[clap(group = ArgGroup::new("destination").required(true).multiple(false))]
pub struct EvalArgs {
    /// Namespace of the pod creating the connection.
    #[clap(long, short = 'n')]
    pub namespace: String,

    /// Name of the pod creating the connection.
    #[clap(long)]
    pub pod: String,

    /// Namespace of the pod receiving the connection.
    #[clap(long)]
    pub to_namespace: String,

    /// Name of the pod receiving the connection.
    #[clap(long, group = "destination")]
    pub to_pod: Option<String>,

    /// IP address of a host outside the cluster receiving the connection.
    #[clap(long, group = "destination", requires = "to_port")]
    pub to_ext_ip: Option<String>,

    /// Protocol of the connection when --to-ext-ip is used (tcp, udp, or
    /// sctp). Defaults to tcp with a warning.
    #[clap(long)]
    pub to_protocol: Option<Protocol>,

    /// Number or name of the port to connect to. When omitted, every port
    /// the destination pod declares is evaluated.
    #[clap(long)]
    pub to_port: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct InspectArgs {
    /// Namespace of the pod.
    #[clap(long, short = 'n')]
    pub namespace: String,

    /// Name of the pod.
    #[clap(long)]
    pub pod: String,
}
