use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by [`Pool::new`](crate::Pool::new) and config parsing.
///
/// Once a pool is running, nothing is returned through this type anymore:
/// malformed entries are logged and skipped, and transient watch disruptions
/// are retried internally.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Failed to build Kubernetes client: {0}")]
    ClientBuild(#[source] kube::Error),

    #[error("Timed out waiting for initial cache sync after {0:?}")]
    SyncTimeout(Duration),

    #[error("Watch stream terminated before initial cache sync completed")]
    SyncFailed,

    #[error("Invalid watch mechanism '{0}', expected 'endpoints' or 'pods'")]
    InvalidMechanism(String),
}

pub type Result<T> = std::result::Result<T, PoolError>;
