use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::warn;

use netpol_check_core::{eval_connection, ConnectionSide, NetworkPolicy, Notice, Protocol};
use netpol_check_k8s::{convert, Session};

use crate::cli::{EvalArgs, InspectArgs};
use crate::view::{self, Verbosity};

pub struct App {
    session: Session,
    verbosity: Verbosity,
}

// === impl App ===

impl App {
    pub fn new(session: Session, verbosity: Verbosity) -> Self {
        Self { session, verbosity }
    }

    pub async fn check_access(&self, args: EvalArgs) -> Result<()> {
        let source = self
            .workload_side(&args.namespace, &args.pod, None)
            .await
            .context("error loading source")?;

        let dest = match (&args.to_pod, &args.to_ext_ip) {
            (Some(pod), None) => self
                .workload_side(&args.to_namespace, pod, args.to_port.as_deref())
                .await
                .context("error loading destination")?,
            (None, Some(ip)) => {
                // clap enforces both of these; keep honest anyway.
                let port = args
                    .to_port
                    .as_deref()
                    .context("--to-port is required with --to-ext-ip")?;
                let protocol = args.to_protocol.unwrap_or_else(|| {
                    warn!("no protocol specified, defaulting to TCP; use --to-protocol to change");
                    Protocol::Tcp
                });
                ConnectionSide::external(ip, port, protocol)?
            }
            _ => bail!("exactly one of --to-pod and --to-ext-ip is required"),
        };

        let results = eval_connection(&source, &dest, |Notice::SameNode { node }| {
            warn!(
                %node,
                "source and destination share a node, where kubernetes allows \
                 traffic regardless of NetworkPolicies; evaluation continues \
                 as if this were not the case",
            );
        })?;

        let mut stdout = std::io::stdout().lock();
        view::render_check_access(&mut stdout, self.verbosity, &results, &source, &dest)
    }

    pub async fn inspect(&self, args: InspectArgs) -> Result<()> {
        let pod = self.session.pod(&args.namespace, &args.pod).await?;
        let workload = convert::workload(pod)?;

        let matches = self
            .policies(&args.namespace)
            .await?
            .into_iter()
            .filter(|np| np.pod_selector.matches(&workload.labels))
            .collect::<Vec<_>>();

        let mut stdout = std::io::stdout().lock();
        view::render_policy_match(&mut stdout, &matches)
    }

    /// Loads one in-cluster side: the pod, its namespace, and the
    /// namespace's policies.
    async fn workload_side(
        &self,
        namespace: &str,
        pod: &str,
        port: Option<&str>,
    ) -> Result<ConnectionSide> {
        let pod = self.session.pod(namespace, pod).await?;
        let ns = self.session.namespace(namespace).await?;
        let policies = self.policies(namespace).await?;

        let side = ConnectionSide::workload(
            convert::namespace(ns),
            convert::workload(pod)?,
            policies,
            port,
        )?;
        Ok(side)
    }

    async fn policies(&self, namespace: &str) -> Result<Vec<Arc<NetworkPolicy>>> {
        self.session
            .policies(namespace)
            .await?
            .into_iter()
            .map(|np| Ok(Arc::new(convert::network_policy(np)?)))
            .collect()
    }
}
