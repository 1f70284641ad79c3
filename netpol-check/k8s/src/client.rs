use anyhow::{Context, Result};
use kube::{api::ListParams, Api, Client};
use tracing::debug;

use crate::{Namespace, NetworkPolicy, Pod};

/// A read-only session with the cluster's API server.
///
/// All loading happens up front; the evaluation engine never touches the
/// network.
#[derive(Clone)]
pub struct Session {
    client: Client,
}

// === impl Session ===

impl Session {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .with_context(|| format!("error querying pod {namespace}/{name}"))
    }

    pub async fn namespace(&self, name: &str) -> Result<Namespace> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.get(name)
            .await
            .with_context(|| format!("error querying namespace {name}"))
    }

    /// Lists every NetworkPolicy in a namespace; evaluation decides which
    /// apply.
    pub async fn policies(&self, namespace: &str) -> Result<Vec<NetworkPolicy>> {
        let api: Api<NetworkPolicy> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .with_context(|| format!("error querying NetworkPolicies in {namespace}"))?;

        debug!(%namespace, policies = list.items.len(), "loaded NetworkPolicies");
        Ok(list.items)
    }
}
