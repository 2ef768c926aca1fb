//! TTL Sweep Task
//!
//! Background task that periodically removes expired cache entries, so entries
//! nobody reads again do not accumulate.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// A store that can be swept.
pub trait Sweep: Send + Sync + 'static {
    /// Backend name used in log fields.
    fn label(&self) -> &'static str;

    /// Removes expired entries; returns how many were removed.
    fn purge_expired(&self) -> usize;
}

// == Sweeper ==
/// Handle to one store's sweep worker.
///
/// The worker selects on its interval timer and a stop channel. It exits on
/// [`Sweeper::shutdown`] or when the handle is dropped.
#[derive(Debug)]
pub struct Sweeper {
    interval: Duration,
    stop: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Sweeper {
    /// Spawns a sweep worker for `target` on the current tokio runtime.
    ///
    /// Returns `None` when `interval` is zero (sweeping disabled) or when no
    /// runtime is available; in the latter case expired entries are still
    /// purged lazily on access.
    ///
    /// # Example
    /// ```ignore
    /// let sweeper = Sweeper::spawn(store_core, Duration::from_secs(60));
    /// // Later, during shutdown:
    /// sweeper.shutdown().await;
    /// ```
    pub fn spawn(target: Arc<dyn Sweep>, interval: Duration) -> Option<Self> {
        let label = target.label();

        if interval.is_zero() {
            debug!(backend = label, "TTL sweep disabled");
            return None;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(
                    backend = label,
                    "No tokio runtime available; TTL sweep not started, expired entries are purged on access only"
                );
                return None;
            }
        };

        let (stop, mut stop_rx) = watch::channel(false);

        let handle = runtime.spawn(async move {
            info!(
                backend = label,
                interval_ms = interval.as_millis() as u64,
                "Starting TTL sweep task"
            );

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let target = target.clone();
                        match tokio::task::spawn_blocking(move || target.purge_expired()).await {
                            Ok(0) => debug!(backend = label, "TTL sweep: no expired entries found"),
                            Ok(removed) => {
                                info!(backend = label, removed, "TTL sweep: removed expired entries")
                            }
                            Err(err) => {
                                warn!(backend = label, error = %err, "TTL sweep tick failed")
                            }
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }

            info!(backend = label, "TTL sweep task stopped");
        });

        Some(Self {
            interval,
            stop,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True until the worker has exited.
    pub fn is_running(&self) -> bool {
        !self.stop.is_closed()
    }

    /// Signals the worker to stop and waits for it to exit.
    ///
    /// Safe to call any number of times; later calls wait for the first one
    /// to finish and then return.
    pub async fn shutdown(&self) {
        let mut handle = self.handle.lock().await;
        let Some(join) = handle.take() else {
            return;
        };

        let _ = self.stop.send(true);
        if let Err(err) = join.await {
            warn!(error = %err, "TTL sweep task ended abnormally");
        }
    }
}
