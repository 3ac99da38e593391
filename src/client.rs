use k8s_openapi::api::core::v1::{Endpoints, Pod};
use kube::{Api, Client};
use tracing::debug;

use crate::error::{PoolError, Result};

/// Thin wrapper around the control-plane client.
///
/// The client is either injected by the caller (tests, custom auth) or
/// resolved from ambient credentials: the in-cluster service account when
/// running inside Kubernetes, kubeconfig otherwise.
pub(crate) struct ClusterClient {
    client: Client,
}

impl ClusterClient {
    pub(crate) async fn from_config(injected: Option<Client>) -> Result<Self> {
        let client = match injected {
            Some(client) => client,
            None => {
                debug!("Resolving Kubernetes credentials from the environment");
                Client::try_default()
                    .await
                    .map_err(PoolError::ClientBuild)?
            }
        };

        Ok(Self { client })
    }

    pub(crate) fn endpoints(&self, namespace: &str) -> Api<Endpoints> {
        Api::namespaced(self.client.clone(), namespace)
    }

    pub(crate) fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}
