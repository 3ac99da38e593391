//! Pool controller: owns the background watch task, wires reflector events to
//! the peer resolver, and delivers peer lists to the registered callback.

use std::future::Future;
use std::time::Duration;

use futures::{Stream, StreamExt};
use kube::runtime::watcher::Event;
use kube::runtime::{reflector, watcher, WatchStreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::ClusterClient;
use crate::config::{Config, WatchMechanism};
use crate::error::{PoolError, Result};
use crate::resolver;

/// Live peer-discovery pool.
///
/// Created by [`Pool::new`], which returns once the local cache holds a full
/// copy of the watched collection. From then on a single background task
/// keeps the cache synchronized and invokes the configured callback with a
/// freshly resolved peer list on every membership change.
pub struct Pool {
    shutdown: CancellationToken,
    watch_task: JoinHandle<()>,
}

impl Pool {
    /// Build the control-plane client, start the watch task for the
    /// configured mechanism, and wait for the initial cache sync.
    ///
    /// Blocks only for the bounded sync wait (`conf.sync_timeout`). On
    /// failure the partially started task is torn down before the error is
    /// returned, so no background work outlives an `Err`.
    pub async fn new(conf: Config) -> Result<Self> {
        let client = ClusterClient::from_config(conf.client.clone()).await?;
        let shutdown = CancellationToken::new();

        let watch_task = match conf.mechanism {
            WatchMechanism::Endpoints => {
                start_endpoints_watch(&client, &conf, shutdown.clone()).await?
            }
            WatchMechanism::Pods => start_pods_watch(&client, &conf, shutdown.clone()).await?,
        };

        info!(
            "Peer pool running: watching {} in namespace '{}' (selector '{}')",
            conf.mechanism, conf.namespace, conf.selector
        );

        Ok(Self {
            shutdown,
            watch_task,
        })
    }

    /// Signal the background watch task to stop.
    ///
    /// Does not block: the task observes the signal and exits on its own. A
    /// delivery already in flight may still complete; after that no further
    /// callbacks are invoked. Safe to call more than once.
    pub fn close(&self) {
        debug!("Peer pool close requested");
        self.shutdown.cancel();
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.watch_task.abort();
    }
}

async fn start_endpoints_watch(
    client: &ClusterClient,
    conf: &Config,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>> {
    debug!(
        "Starting endpoints watch in namespace '{}' (selector '{}')",
        conf.namespace, conf.selector
    );

    let api = client.endpoints(&conf.namespace);
    let watch_config = watcher::Config::default().labels(&conf.selector);
    let (store, writer) = reflector::store();
    let stream = reflector(writer, watcher(api, watch_config).default_backoff());

    let reconcile = {
        let store = store.clone();
        let on_update = conf.on_update.clone();
        let pod_ip = conf.pod_ip.clone();
        let pod_port = conf.pod_port;
        move |trigger: &'static str| {
            let peers = resolver::peers_from_endpoints(&store.state(), &pod_ip, pod_port);
            debug!("Resolved {} peers from endpoints cache ({})", peers.len(), trigger);
            on_update(peers);
        }
    };

    let task = tokio::spawn(run_watch_loop(stream, shutdown.clone(), reconcile));
    await_initial_sync(store.wait_until_ready(), conf.sync_timeout, &shutdown, &task).await?;

    Ok(task)
}

async fn start_pods_watch(
    client: &ClusterClient,
    conf: &Config,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>> {
    debug!(
        "Starting pod watch in namespace '{}' (selector '{}')",
        conf.namespace, conf.selector
    );

    let api = client.pods(&conf.namespace);
    let watch_config = watcher::Config::default().labels(&conf.selector);
    let (store, writer) = reflector::store();
    let stream = reflector(writer, watcher(api, watch_config).default_backoff());

    let reconcile = {
        let store = store.clone();
        let on_update = conf.on_update.clone();
        let pod_ip = conf.pod_ip.clone();
        let pod_port = conf.pod_port;
        move |trigger: &'static str| {
            let peers = resolver::peers_from_pods(&store.state(), &pod_ip, pod_port);
            debug!("Resolved {} peers from pod cache ({})", peers.len(), trigger);
            on_update(peers);
        }
    };

    let task = tokio::spawn(run_watch_loop(stream, shutdown.clone(), reconcile));
    await_initial_sync(store.wait_until_ready(), conf.sync_timeout, &shutdown, &task).await?;

    Ok(task)
}

/// Bounded wait for the reflector store to finish its initial sync. Tears the
/// watch task down on failure so `Pool::new` never leaks background work.
async fn await_initial_sync<E>(
    synced: impl Future<Output = std::result::Result<(), E>>,
    sync_timeout: Duration,
    shutdown: &CancellationToken,
    task: &JoinHandle<()>,
) -> Result<()> {
    match tokio::time::timeout(sync_timeout, synced).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => {
            shutdown.cancel();
            task.abort();
            Err(PoolError::SyncFailed)
        }
        Err(_) => {
            shutdown.cancel();
            task.abort();
            Err(PoolError::SyncTimeout(sync_timeout))
        }
    }
}

/// Drive the reflector event stream until it ends or shutdown is signalled.
///
/// Reconciliation policy: every `Apply` and `Delete` reconciles once. The
/// `InitApply` burst of a (re)list is suppressed and folded into the single
/// reconciliation fired on `InitDone`, so consumers see the converged set
/// after every bootstrap or watch recovery instead of one callback per cached
/// object. Stream errors are retried by the watcher itself and only logged
/// here.
async fn run_watch_loop<K, F>(
    stream: impl Stream<Item = std::result::Result<Event<K>, watcher::Error>>,
    shutdown: CancellationToken,
    mut reconcile: F,
) where
    F: FnMut(&'static str),
{
    let mut stream = Box::pin(stream);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Shutdown signal received, stopping watch");
                break;
            }
            event = stream.next() => match event {
                Some(Ok(Event::Init)) => debug!("Cache sync started"),
                Some(Ok(Event::InitApply(_))) => {}
                Some(Ok(Event::InitDone)) => {
                    debug!("Cache sync complete");
                    reconcile("sync");
                }
                Some(Ok(Event::Apply(_))) => reconcile("apply"),
                Some(Ok(Event::Delete(_))) => reconcile("delete"),
                Some(Err(e)) => warn!("Watch stream error: {}", e),
                None => {
                    warn!("Watch stream ended");
                    break;
                }
            }
        }
    }
}
