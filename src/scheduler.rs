//! The refresh scheduler (§4.6): spawns the token worker, the three
//! domain workers, and the foreground consumer, all sharing one
//! `Arc<Session>`, and joins them on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::session::Session;

/// Fixed token-worker cadence (§4.6).
const TOKEN_TICK_SECS: u64 = 10;
/// Foreground consumer cadence (§4.6).
const FOREGROUND_TICK_SECS: u64 = 10;
/// Granularity at which every worker polls the shutdown signal (§5).
const SLEEP_SLICE: Duration = Duration::from_secs(1);

/// Sleeps for `total_secs`, but in 1-second slices so a shutdown signal
/// raised mid-sleep is observed within one slice (§5, §8). Returns `true`
/// if shutdown was observed before the full interval elapsed.
async fn sleep_slices(total_secs: u64, shutdown: &mut watch::Receiver<bool>) -> bool {
    let mut remaining = total_secs;
    loop {
        if *shutdown.borrow() {
            return true;
        }
        if remaining == 0 {
            return false;
        }
        let slice = SLEEP_SLICE.min(Duration::from_secs(remaining));
        tokio::select! {
            _ = tokio::time::sleep(slice) => {
                remaining = remaining.saturating_sub(slice.as_secs().max(1));
            }
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    return true;
                }
            }
        }
    }
}

async fn worker_loop<F, Fut>(
    name: &'static str,
    interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
    mut body: F,
) where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    tracing::info!(target: "vault_agent::scheduler", worker = name, "worker started");
    loop {
        if sleep_slices(interval_secs, &mut shutdown).await {
            break;
        }
        if *shutdown.borrow() {
            break;
        }
        body().await;
    }
    tracing::info!(target: "vault_agent::scheduler", worker = name, "worker stopped");
}

/// Owns the four background workers plus the foreground consumer and
/// drives them to completion.
pub struct Scheduler {
    session: Arc<Session>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    /// Builds a scheduler around an already-logged-in session.
    pub fn new(session: Arc<Session>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            session,
            shutdown_tx,
        }
    }

    /// A handle other code (e.g. a signal handler) can use to request
    /// shutdown.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    /// Starts every enabled worker plus the foreground loop and blocks
    /// until all of them have observed shutdown and returned. Returns
    /// `true` if the token worker hit the fatal auth failure path (the
    /// caller should exit with a non-zero status in that case).
    pub async fn run(&self) -> bool {
        let shutdown_rx = self.shutdown_tx.subscribe();
        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        let fatal = Arc::new(std::sync::atomic::AtomicBool::new(false));

        handles.push(self.spawn_token_worker(shutdown_rx.clone(), fatal.clone()));

        if self.session.config().kv.enabled {
            handles.push(self.spawn_kv_worker(shutdown_rx.clone()));
        }
        if self.session.config().dynamic_db.enabled {
            handles.push(self.spawn_dynamic_db_worker(shutdown_rx.clone()));
        }
        if self.session.config().static_db.enabled {
            handles.push(self.spawn_static_db_worker(shutdown_rx.clone()));
        }

        handles.push(self.spawn_foreground_loop(shutdown_rx));

        for handle in handles {
            let _ = handle.await;
        }

        tracing::info!(target: "vault_agent::scheduler", "all workers joined");
        fatal.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn spawn_token_worker(
        &self,
        shutdown: watch::Receiver<bool>,
        fatal: Arc<std::sync::atomic::AtomicBool>,
    ) -> JoinHandle<()> {
        let session = self.session.clone();
        let shutdown_tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            worker_loop("token", TOKEN_TICK_SECS, shutdown, || {
                let session = session.clone();
                let shutdown_tx = shutdown_tx.clone();
                let fatal = fatal.clone();
                async move {
                    if let Err(e) = session.tick_token().await {
                        if e.is_fatal() {
                            tracing::error!(target: "vault_agent::scheduler", error = %e, "token worker observed fatal auth failure, requesting shutdown");
                            fatal.store(true, std::sync::atomic::Ordering::SeqCst);
                            let _ = shutdown_tx.send(true);
                        }
                    }
                }
            })
            .await;
        })
    }

    fn spawn_kv_worker(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let session = self.session.clone();
        let interval = self.session.config().kv.refresh_interval;
        tokio::spawn(async move {
            worker_loop("kv", interval, shutdown, || {
                let session = session.clone();
                async move {
                    if let Err(e) = session.refresh_kv().await {
                        tracing::warn!(target: "vault_agent::scheduler", worker = "kv", error = %e, "refresh failed");
                    }
                }
            })
            .await;
        })
    }

    fn spawn_dynamic_db_worker(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let session = self.session.clone();
        // Shares the KV refresh interval by design (§4.6) - see DESIGN.md.
        let interval = self.session.config().kv.refresh_interval;
        tokio::spawn(async move {
            worker_loop("dynamic_db", interval, shutdown, || {
                let session = session.clone();
                async move {
                    if let Err(e) = session.refresh_dynamic_db().await {
                        tracing::warn!(target: "vault_agent::scheduler", worker = "dynamic_db", error = %e, "refresh failed");
                    }
                }
            })
            .await;
        })
    }

    fn spawn_static_db_worker(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let session = self.session.clone();
        let interval = self.session.config().kv.refresh_interval * 2;
        tokio::spawn(async move {
            worker_loop("static_db", interval, shutdown, || {
                let session = session.clone();
                async move {
                    if let Err(e) = session.refresh_static_db().await {
                        tracing::warn!(target: "vault_agent::scheduler", worker = "static_db", error = %e, "refresh failed");
                    }
                }
            })
            .await;
        })
    }

    fn spawn_foreground_loop(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let session = self.session.clone();
        tokio::spawn(async move {
            worker_loop("foreground", FOREGROUND_TICK_SECS, shutdown, || {
                let session = session.clone();
                async move {
                    let kv = session.kv_snapshot();
                    let dyn_db = session.dynamic_db_snapshot();
                    let static_db = session.static_db_snapshot();
                    tracing::debug!(
                        target: "vault_agent::foreground",
                        kv_version = kv.version,
                        kv_cached = kv.document.is_some(),
                        dyn_lease_id = %dyn_db.lease_id,
                        dyn_cached = dyn_db.document.is_some(),
                        static_cached = static_db.document.is_some(),
                        "cached secrets status"
                    );
                }
            })
            .await;
        })
    }
}

/// Runs every enabled domain's refresh exactly once and returns, skipping
/// the worker loops entirely. Used by the `--once` CLI flag (§4.11).
pub async fn run_once(session: &Session) {
    if session.config().kv.enabled {
        if let Err(e) = session.refresh_kv().await {
            tracing::warn!(target: "vault_agent::scheduler", worker = "kv", error = %e, "refresh failed");
        }
    }
    if session.config().dynamic_db.enabled {
        if let Err(e) = session.refresh_dynamic_db().await {
            tracing::warn!(target: "vault_agent::scheduler", worker = "dynamic_db", error = %e, "refresh failed");
        }
    }
    if session.config().static_db.enabled {
        if let Err(e) = session.refresh_static_db().await {
            tracing::warn!(target: "vault_agent::scheduler", worker = "static_db", error = %e, "refresh failed");
        }
    }
}
