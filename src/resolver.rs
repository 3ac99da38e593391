//! Pure transforms from cache snapshots to peer lists.
//!
//! Nothing here performs I/O or blocks: the same snapshot always resolves to
//! the same peer list, so reconciliation can run on every watch event.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::{Endpoints, Pod};
use tracing::{debug, error, trace};

use crate::peer::PeerInfo;

/// One raw membership observation: a single address pulled out of the
/// watched collection, before dedup and formatting.
struct MembershipEntry {
    ip: String,
}

/// Resolve the full peer list from an `Endpoints` cache snapshot.
pub(crate) fn peers_from_endpoints(
    objects: &[Arc<Endpoints>],
    self_ip: &str,
    port: u16,
) -> Vec<PeerInfo> {
    let entries = objects
        .iter()
        .flat_map(|endpoints| endpoint_entries(endpoints))
        .collect();

    resolve_peers(entries, self_ip, port)
}

/// Resolve the full peer list from a `Pod` cache snapshot.
pub(crate) fn peers_from_pods(objects: &[Arc<Pod>], self_ip: &str, port: u16) -> Vec<PeerInfo> {
    let entries = objects.iter().filter_map(|pod| pod_entry(pod)).collect();

    resolve_peers(entries, self_ip, port)
}

/// Extract one entry per address of every ready subset.
fn endpoint_entries(endpoints: &Endpoints) -> Vec<MembershipEntry> {
    let name = endpoints.metadata.name.as_deref().unwrap_or("unknown");
    let mut entries = Vec::new();

    for subset in endpoints.subsets.iter().flatten() {
        for address in subset.addresses.iter().flatten() {
            if address.ip.is_empty() {
                error!(
                    "Endpoints '{}' carries an address without an IP, skipping it",
                    name
                );
                continue;
            }

            entries.push(MembershipEntry {
                ip: address.ip.clone(),
            });
        }
    }

    entries
}

/// Extract the entry for a pod, or `None` when the pod is not a usable peer.
fn pod_entry(pod: &Pod) -> Option<MembershipEntry> {
    let name = pod.metadata.name.as_deref().unwrap_or("unknown");

    let status = match &pod.status {
        Some(status) => status,
        None => {
            error!("Pod '{}' has no status, skipping it", name);
            return None;
        }
    };

    if !is_pod_ready(pod) {
        debug!("Pod '{}' is not ready, skipping it", name);
        return None;
    }

    match status.pod_ip.as_deref() {
        Some(ip) if !ip.is_empty() => Some(MembershipEntry { ip: ip.to_string() }),
        _ => {
            error!("Ready pod '{}' has no IP address, skipping it", name);
            None
        }
    }
}

/// True when the pod reports a `Ready` condition with status `True`.
fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|condition| condition.type_ == "Ready" && condition.status == "True")
        })
        .unwrap_or(false)
}

/// Dedup, order and format raw entries into the delivered peer list.
///
/// Duplicate addresses collapse to a single peer (first observation wins)
/// and the result is sorted by IP, so an unchanged snapshot resolves to a
/// positionally identical list on every reconciliation.
fn resolve_peers(entries: Vec<MembershipEntry>, self_ip: &str, port: u16) -> Vec<PeerInfo> {
    let mut peers: BTreeMap<String, PeerInfo> = BTreeMap::new();

    for entry in entries {
        peers.entry(entry.ip).or_insert_with_key(|ip| {
            let peer = PeerInfo::from_address(ip, port, self_ip);
            trace!("Peer: {:?}", peer);
            peer
        });
    }

    peers.into_values().collect()
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::{
        EndpointAddress, EndpointSubset, PodCondition, PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    use super::*;

    fn endpoints(name: &str, ips: &[&str]) -> Arc<Endpoints> {
        Arc::new(Endpoints {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            subsets: Some(vec![subset(ips)]),
            ..Default::default()
        })
    }

    fn subset(ips: &[&str]) -> EndpointSubset {
        EndpointSubset {
            addresses: Some(
                ips.iter()
                    .map(|ip| EndpointAddress {
                        ip: ip.to_string(),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }
    }

    fn pod(name: &str, ip: Option<&str>, ready: bool) -> Arc<Pod> {
        Arc::new(Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                pod_ip: ip.map(|ip| ip.to_string()),
                conditions: Some(vec![PodCondition {
                    type_: "Ready".to_string(),
                    status: if ready { "True" } else { "False" }.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    #[test]
    fn test_resolves_peers_with_owner_flag() {
        let snapshot = vec![endpoints("svc", &["10.0.0.1", "10.0.0.2"])];

        let peers = peers_from_endpoints(&snapshot, "10.0.0.2", 8080);

        assert_eq!(
            peers,
            vec![
                PeerInfo {
                    data_center: String::new(),
                    ip_address: "10.0.0.1".to_string(),
                    http_address: "http://10.0.0.1:8080".to_string(),
                    grpc_address: "10.0.0.1:8080".to_string(),
                    is_owner: false,
                },
                PeerInfo {
                    data_center: String::new(),
                    ip_address: "10.0.0.2".to_string(),
                    http_address: "http://10.0.0.2:8080".to_string(),
                    grpc_address: "10.0.0.2:8080".to_string(),
                    is_owner: true,
                },
            ]
        );
    }

    #[test]
    fn test_no_owner_when_self_not_a_member() {
        let snapshot = vec![endpoints("svc", &["10.0.0.1", "10.0.0.2"])];

        let peers = peers_from_endpoints(&snapshot, "192.168.1.9", 8080);

        assert_eq!(peers.len(), 2);
        assert!(peers.iter().all(|peer| !peer.is_owner));
    }

    #[test]
    fn test_duplicate_addresses_collapse() {
        // The same address showing up in two resources and twice within one
        // subset must still yield a single peer.
        let snapshot = vec![
            endpoints("svc-a", &["10.0.0.1", "10.0.0.1", "10.0.0.2"]),
            endpoints("svc-b", &["10.0.0.1"]),
        ];

        let peers = peers_from_endpoints(&snapshot, "10.0.0.1", 8080);

        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].ip_address, "10.0.0.1");
        assert_eq!(peers[1].ip_address, "10.0.0.2");
        assert_eq!(peers.iter().filter(|peer| peer.is_owner).count(), 1);
    }

    #[test]
    fn test_malformed_address_does_not_abort_resolution() {
        let snapshot = vec![endpoints("svc", &["", "10.0.0.7"])];

        let peers = peers_from_endpoints(&snapshot, "10.0.0.7", 8080);

        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].ip_address, "10.0.0.7");
        assert!(peers[0].is_owner);
    }

    #[test]
    fn test_multiple_subsets_are_flattened() {
        let snapshot = vec![Arc::new(Endpoints {
            metadata: ObjectMeta {
                name: Some("svc".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            subsets: Some(vec![subset(&["10.0.0.1"]), subset(&["10.0.0.2"])]),
            ..Default::default()
        })];

        let peers = peers_from_endpoints(&snapshot, "10.0.0.1", 8080);

        assert_eq!(peers.len(), 2);
    }

    #[test]
    fn test_peer_list_is_sorted_and_stable() {
        let snapshot = vec![endpoints("svc", &["10.0.0.9", "10.0.0.30", "10.0.0.1"])];

        let first = peers_from_endpoints(&snapshot, "10.0.0.9", 8080);
        let second = peers_from_endpoints(&snapshot, "10.0.0.9", 8080);

        let ips: Vec<&str> = first.iter().map(|peer| peer.ip_address.as_str()).collect();
        assert_eq!(ips, vec!["10.0.0.1", "10.0.0.30", "10.0.0.9"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_snapshot_resolves_to_empty_list() {
        let peers = peers_from_endpoints(&[], "10.0.0.1", 8080);

        assert!(peers.is_empty());
    }

    #[test]
    fn test_pod_peers_require_readiness_and_ip() {
        let snapshot = vec![
            pod("ready", Some("10.0.0.1"), true),
            pod("not-ready", Some("10.0.0.2"), false),
            pod("no-ip", None, true),
        ];

        let peers = peers_from_pods(&snapshot, "10.0.0.1", 9090);

        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].ip_address, "10.0.0.1");
        assert_eq!(peers[0].grpc_address, "10.0.0.1:9090");
        assert!(peers[0].is_owner);
    }

    #[test]
    fn test_pod_without_status_is_skipped() {
        let bare = Arc::new(Pod {
            metadata: ObjectMeta {
                name: Some("pending".to_string()),
                ..Default::default()
            },
            ..Default::default()
        });

        let peers = peers_from_pods(&[bare, pod("up", Some("10.0.0.3"), true)], "", 9090);

        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].ip_address, "10.0.0.3");
    }

    #[test]
    fn test_is_pod_ready() {
        assert!(is_pod_ready(&pod("p", Some("10.0.0.1"), true)));
        assert!(!is_pod_ready(&pod("p", Some("10.0.0.1"), false)));

        let no_conditions = Pod {
            status: Some(PodStatus::default()),
            ..Default::default()
        };
        assert!(!is_pod_ready(&no_conditions));

        let other_condition = Pod {
            status: Some(PodStatus {
                conditions: Some(vec![PodCondition {
                    type_: "PodScheduled".to_string(),
                    status: "True".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!is_pod_ready(&other_condition));
    }
}
