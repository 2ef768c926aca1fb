//! Cache Manager
//!
//! The facade configuration owners hold. It wraps one backend chosen from
//! [`CacheConfig`], times every operation, can be switched off and on at
//! runtime, and runs a health probe for operators.

mod health;
mod timing;

pub use health::{HealthReport, HealthStatus, HEALTH_KEY_PREFIX};
pub use timing::{LatencyTracker, PerformanceStats};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::cache::{
    system_clock, CacheBackend, CacheEvent, CacheStats, CacheValue, Clock, EventCallback,
    EventContext, Expiry, FileStore, MemoryStore, NullStore, StoreOptions, TagSet,
};
use crate::config::{BackendKind, CacheConfig};
use crate::error::Result;

// == Manager State ==
struct ManagerState {
    active: Arc<dyn CacheBackend>,
    /// The configured backend while caching is disabled
    parked: Option<Arc<dyn CacheBackend>>,
    enabled: bool,
}

// == Cache Manager ==
pub struct CacheManager {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    state: RwLock<ManagerState>,
    /// Stand-in while disabled; shared so its counters persist across toggles
    null: Arc<NullStore>,
    /// Every registered callback, replayed onto backends built later
    hooks: Mutex<Vec<(CacheEvent, EventCallback)>>,
    latency: Mutex<LatencyTracker>,
}

impl CacheManager {
    // == Constructor ==
    /// Builds the configured backend. Must run inside a tokio runtime for the
    /// background sweep to start.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let null = Arc::new(NullStore::new());

        let state = if config.enabled {
            ManagerState {
                active: build_backend(&config, clock.clone())?,
                parked: None,
                enabled: true,
            }
        } else {
            ManagerState {
                active: null.clone(),
                parked: None,
                enabled: false,
            }
        };

        info!(
            backend = %config.backend,
            enabled = config.enabled,
            policy = %config.eviction_policy,
            "Cache manager initialized"
        );

        Ok(Self {
            latency: Mutex::new(LatencyTracker::new(config.latency_samples)),
            config,
            clock,
            state: RwLock::new(state),
            null,
            hooks: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Name of the backend currently serving requests.
    pub fn backend_name(&self) -> &'static str {
        self.state.read().active.name()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.read().enabled
    }

    fn backend(&self) -> Arc<dyn CacheBackend> {
        self.state.read().active.clone()
    }

    /// Runs `op` against the active backend and records its latency. No
    /// manager lock is held while `op` runs.
    fn timed<T>(&self, op: impl FnOnce(&dyn CacheBackend) -> T) -> T {
        let backend = self.backend();
        let started = Instant::now();
        let out = op(backend.as_ref());
        self.latency.lock().record(started.elapsed());
        out
    }

    // == Consumer Surface ==
    pub fn get(&self, key: &str) -> Option<CacheValue> {
        self.timed(|backend| backend.get(key))
    }

    pub fn set(&self, key: &str, value: CacheValue, expiry: Expiry, tags: TagSet) -> Result<()> {
        self.timed(|backend| backend.set(key, value, expiry, tags))
    }

    pub fn delete(&self, key: &str) -> bool {
        self.timed(|backend| backend.delete(key))
    }

    pub fn clear(&self) {
        self.timed(|backend| backend.clear())
    }

    pub fn exists(&self, key: &str) -> bool {
        self.timed(|backend| backend.exists(key))
    }

    pub fn get_many(&self, keys: &[&str]) -> HashMap<String, CacheValue> {
        self.timed(|backend| backend.get_many(keys))
    }

    pub fn set_many(
        &self,
        items: Vec<(String, CacheValue)>,
        expiry: Expiry,
        tags: &TagSet,
    ) -> Result<()> {
        self.timed(|backend| backend.set_many(items, expiry, tags))
    }

    pub fn delete_many(&self, keys: &[&str]) -> usize {
        self.timed(|backend| backend.delete_many(keys))
    }

    pub fn delete_by_tags(&self, tags: &TagSet) -> usize {
        self.timed(|backend| backend.delete_by_tags(tags))
    }

    pub fn keys(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        self.timed(|backend| backend.keys(pattern))
    }

    pub fn stats(&self) -> CacheStats {
        self.backend().stats()
    }

    /// Resets backend counters and the latency samples.
    pub fn reset_stats(&self) {
        self.backend().reset_stats();
        self.latency.lock().clear();
    }

    pub fn performance(&self) -> PerformanceStats {
        self.latency.lock().summary()
    }

    /// Registers `callback` for `event` on the configured backend and on the
    /// null stand-in, so it keeps firing across enable/disable.
    pub fn on<F>(&self, event: CacheEvent, callback: F)
    where
        F: Fn(&EventContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let callback: EventCallback = Arc::new(callback);
        let state = self.state.read();
        let primary = if state.enabled {
            Some(&state.active)
        } else {
            state.parked.as_ref()
        };
        if let Some(backend) = primary {
            backend.on(event, callback.clone());
        }
        self.null.on(event, callback.clone());
        self.hooks.lock().push((event, callback));
    }

    // == Toggling ==
    /// Restores the parked backend, data intact. If the manager started
    /// disabled, builds a fresh backend from the configuration.
    pub fn enable(&self) -> Result<()> {
        let mut state = self.state.write();
        if state.enabled {
            return Ok(());
        }

        let backend = match state.parked.take() {
            Some(backend) => backend,
            None => {
                let backend = build_backend(&self.config, self.clock.clone())?;
                for (event, callback) in self.hooks.lock().iter() {
                    backend.on(*event, callback.clone());
                }
                backend
            }
        };

        info!(backend = backend.name(), "Cache enabled");
        state.active = backend;
        state.enabled = true;
        Ok(())
    }

    /// Parks the active backend and serves from the null store until
    /// [`enable`](Self::enable). The parked backend's sweep keeps running.
    pub fn disable(&self) {
        let mut state = self.state.write();
        if !state.enabled {
            return;
        }

        let null: Arc<dyn CacheBackend> = self.null.clone();
        let previous = std::mem::replace(&mut state.active, null);
        info!(backend = previous.name(), "Cache disabled");
        state.parked = Some(previous);
        state.enabled = false;
    }

    // == Health ==
    pub fn health_check(&self) -> HealthReport {
        let (backend, enabled) = {
            let state = self.state.read();
            (state.active.clone(), state.enabled)
        };

        let started = Instant::now();
        let (status, error, note) = if !enabled || backend.is_passthrough() {
            (HealthStatus::Disabled, None, None)
        } else {
            match health::probe(backend.as_ref()) {
                Ok(note) => (HealthStatus::Healthy, None, note),
                Err(err) => {
                    warn!(backend = backend.name(), error = %err, "Cache health check failed");
                    (HealthStatus::Unhealthy, Some(err), None)
                }
            }
        };

        HealthReport {
            status,
            backend: backend.name(),
            stats: backend.stats(),
            checked_at: self.clock.now(),
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            error,
            note,
        }
    }

    // == Shutdown ==
    /// Stops the sweep of the active and parked backends; idempotent.
    pub async fn shutdown(&self) {
        let backends: Vec<Arc<dyn CacheBackend>> = {
            let state = self.state.read();
            std::iter::once(state.active.clone())
                .chain(state.parked.clone())
                .collect()
        };

        for backend in backends {
            if let Some(sweeper) = backend.sweeper() {
                sweeper.shutdown().await;
            }
        }
        info!("Cache manager shut down");
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("CacheManager")
            .field("backend", &state.active.name())
            .field("enabled", &state.enabled)
            .field("config", &self.config)
            .finish()
    }
}

/// Builds the backend selected by `config.backend`.
fn build_backend(config: &CacheConfig, clock: Arc<dyn Clock>) -> Result<Arc<dyn CacheBackend>> {
    let options = StoreOptions::new(config.max_size, config.eviction_policy)
        .default_ttl(config.default_ttl)
        .cleanup_interval(config.cleanup_interval)
        .clock(clock);

    let backend: Arc<dyn CacheBackend> = match config.backend {
        BackendKind::Memory => Arc::new(MemoryStore::with_options(options)),
        BackendKind::File => Arc::new(FileStore::open(
            &config.cache_dir,
            StoreOptions {
                max_size: config.max_files,
                ..options
            },
        )?),
        BackendKind::Null => Arc::new(NullStore::new()),
    };
    Ok(backend)
}
