use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use kube::Client;

use crate::error::PoolError;
use crate::peer::UpdateFunc;

/// Default bound on the initial cache sync performed by
/// [`Pool::new`](crate::Pool::new).
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Which resource collection is treated as the authoritative source of group
/// membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchMechanism {
    /// Watch the service's `Endpoints`; peers are the addresses of all ready
    /// subsets. Membership then follows the service's readiness gating.
    #[default]
    Endpoints,

    /// Watch `Pods` matching the selector; peers are the IPs of pods whose
    /// `Ready` condition is `True`.
    Pods,
}

impl FromStr for WatchMechanism {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "endpoints" => Ok(WatchMechanism::Endpoints),
            "pods" => Ok(WatchMechanism::Pods),
            _ => Err(PoolError::InvalidMechanism(s.to_string())),
        }
    }
}

impl fmt::Display for WatchMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchMechanism::Endpoints => f.write_str("endpoints"),
            WatchMechanism::Pods => f.write_str("pods"),
        }
    }
}

/// Construction input for [`Pool::new`](crate::Pool::new). Immutable once the
/// pool is built.
#[derive(Clone)]
pub struct Config {
    /// Pre-built Kubernetes client. Leave `None` to resolve credentials from
    /// the ambient environment (in-cluster service account or kubeconfig).
    pub client: Option<Client>,

    /// Called with the full peer list on every membership change.
    pub on_update: UpdateFunc,

    /// Namespace the watched resources live in.
    pub namespace: String,

    /// Label selector picking out the service group, e.g. `"app=my-service"`.
    /// An empty string matches everything in the namespace.
    pub selector: String,

    /// IP address of this instance, used to flag the owning entry in the
    /// delivered peer list.
    pub pod_ip: String,

    /// Port peers expose; combined with each discovered IP to form the
    /// HTTP and gRPC addresses.
    pub pod_port: u16,

    /// Which resource collection to watch for membership changes.
    pub mechanism: WatchMechanism,

    /// How long [`Pool::new`](crate::Pool::new) waits for the initial cache
    /// sync before failing. See [`DEFAULT_SYNC_TIMEOUT`].
    pub sync_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("namespace", &self.namespace)
            .field("selector", &self.selector)
            .field("pod_ip", &self.pod_ip)
            .field("pod_port", &self.pod_port)
            .field("mechanism", &self.mechanism)
            .field("sync_timeout", &self.sync_timeout)
            .field("injected_client", &self.client.is_some())
            .finish_non_exhaustive()
    }
}
