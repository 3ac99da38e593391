//! Kubernetes peer discovery for clustered services.
//!
//! Watches a label-selected collection (endpoints or pods) through a cached
//! watch session and invokes a registered callback with the full,
//! deduplicated peer list whenever membership changes. Each instance marks
//! its own entry in the lists it receives, so members can tell themselves
//! apart from their peers.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kube_peers::{Config, Pool, WatchMechanism, DEFAULT_SYNC_TIMEOUT};
//!
//! # async fn run() -> kube_peers::Result<()> {
//! let pool = Pool::new(Config {
//!     client: None,
//!     on_update: Arc::new(|peers| {
//!         for peer in &peers {
//!             println!("peer {} (owner: {})", peer.grpc_address, peer.is_owner);
//!         }
//!     }),
//!     namespace: "default".to_string(),
//!     selector: "app=my-service".to_string(),
//!     pod_ip: "10.0.0.5".to_string(),
//!     pod_port: 8080,
//!     mechanism: WatchMechanism::Endpoints,
//!     sync_timeout: DEFAULT_SYNC_TIMEOUT,
//! })
//! .await?;
//!
//! // ... serve traffic ...
//! pool.close();
//! # Ok(())
//! # }
//! ```

mod client;
mod resolver;

pub mod config;
pub mod error;
pub mod peer;
pub mod pool;

pub use config::{Config, WatchMechanism, DEFAULT_SYNC_TIMEOUT};
pub use error::{PoolError, Result};
pub use peer::{PeerInfo, UpdateFunc};
pub use pool::Pool;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
