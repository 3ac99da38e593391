use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A single discovered member of the service group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Name of the data center this peer is in. Empty when multi data center
    /// support is not in use.
    pub data_center: String,

    /// IP address of the peer. Unique within one delivered list.
    pub ip_address: String,

    /// HTTP address of the peer, formatted as `http://<ip>:<port>`.
    pub http_address: String,

    /// gRPC address of the peer, formatted as `<ip>:<port>` (no scheme).
    pub grpc_address: String,

    /// True if this entry describes the running process itself.
    pub is_owner: bool,
}

impl PeerInfo {
    /// Build the record for `ip`, deriving the HTTP and gRPC addresses from
    /// the configured port and flagging the entry that matches `self_ip`.
    pub(crate) fn from_address(ip: &str, port: u16, self_ip: &str) -> Self {
        Self {
            data_center: String::new(),
            ip_address: ip.to_string(),
            http_address: format!("http://{}:{}", ip, port),
            grpc_address: format!("{}:{}", ip, port),
            is_owner: ip == self_ip,
        }
    }
}

/// Callback invoked with the full, freshly computed peer list every time
/// group membership changes.
///
/// The callback runs on the pool's watch-processing task, so a callback that
/// blocks delays delivery of subsequent membership updates. Hand the list off
/// to your own executor if you need to do slow work with it.
pub type UpdateFunc = Arc<dyn Fn(Vec<PeerInfo>) + Send + Sync>;
