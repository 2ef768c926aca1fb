//! Event Hooks Module
//!
//! Callbacks registered per event type. Stores queue events while holding
//! their lock and dispatch them, in order, once the lock is released, so a
//! callback may safely call back into the store.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{error, warn};

// == Cache Event ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheEvent {
    Hit,
    Miss,
    Set,
    Delete,
    Evict,
    Clear,
    Expire,
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheEvent::Hit => "hit",
            CacheEvent::Miss => "miss",
            CacheEvent::Set => "set",
            CacheEvent::Delete => "delete",
            CacheEvent::Evict => "evict",
            CacheEvent::Clear => "clear",
            CacheEvent::Expire => "expire",
        };
        f.write_str(name)
    }
}

/// What a callback receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext {
    pub event: CacheEvent,
    /// Affected key; `None` for `Clear`
    pub key: Option<String>,
    /// Name of the backend that fired the event
    pub backend: &'static str,
}

/// A registered callback. Returning `Err` (or panicking) is logged and has no
/// effect on the operation that fired the event.
pub type EventCallback = Arc<dyn Fn(&EventContext) -> anyhow::Result<()> + Send + Sync>;

// == Pending Events ==
/// Events collected inside a critical section, dispatched after unlock.
#[derive(Debug, Default)]
pub struct PendingEvents(Vec<(CacheEvent, Option<String>)>);

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: CacheEvent, key: impl Into<String>) {
        self.0.push((event, Some(key.into())));
    }

    pub fn push_keyless(&mut self, event: CacheEvent) {
        self.0.push((event, None));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// == Event Hooks ==
/// Per-store callback registry.
pub struct EventHooks {
    backend: &'static str,
    callbacks: RwLock<HashMap<CacheEvent, Vec<EventCallback>>>,
}

impl EventHooks {
    pub fn new(backend: &'static str) -> Self {
        Self {
            backend,
            callbacks: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `callback` for `event`. Callbacks for the same event run in
    /// registration order.
    pub fn register(&self, event: CacheEvent, callback: EventCallback) {
        self.callbacks.write().entry(event).or_default().push(callback);
    }

    pub fn has_callbacks(&self) -> bool {
        self.callbacks.read().values().any(|cbs| !cbs.is_empty())
    }

    /// Runs the callbacks for every queued event, in queue order.
    pub fn dispatch(&self, pending: PendingEvents) {
        if pending.is_empty() || !self.has_callbacks() {
            return;
        }

        for (event, key) in pending.0 {
            // Snapshot so callbacks can register further hooks without deadlocking
            let callbacks: Vec<EventCallback> = match self.callbacks.read().get(&event) {
                Some(cbs) if !cbs.is_empty() => cbs.clone(),
                _ => continue,
            };

            let ctx = EventContext {
                event,
                key,
                backend: self.backend,
            };

            for callback in callbacks {
                match catch_unwind(AssertUnwindSafe(|| callback(&ctx))) {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        warn!(
                            backend = self.backend,
                            event = %ctx.event,
                            key = ?ctx.key,
                            error = %err,
                            "Cache event callback failed"
                        );
                    }
                    Err(_) => {
                        error!(
                            backend = self.backend,
                            event = %ctx.event,
                            key = ?ctx.key,
                            "Cache event callback panicked"
                        );
                    }
                }
            }
        }
    }
}

impl fmt::Debug for EventHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<CacheEvent, usize> = self
            .callbacks
            .read()
            .iter()
            .map(|(event, cbs)| (*event, cbs.len()))
            .collect();
        f.debug_struct("EventHooks")
            .field("backend", &self.backend)
            .field("callbacks", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<EventContext>>>, EventCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: EventCallback = Arc::new(move |ctx: &EventContext| -> anyhow::Result<()> {
            sink.lock().push(ctx.clone());
            Ok(())
        });
        (seen, callback)
    }

    #[test]
    fn test_dispatch_preserves_order() {
        let hooks = EventHooks::new("memory");
        let (seen, callback) = recorder();
        hooks.register(CacheEvent::Miss, callback.clone());
        hooks.register(CacheEvent::Expire, callback);

        let mut pending = PendingEvents::new();
        pending.push(CacheEvent::Miss, "k");
        pending.push(CacheEvent::Expire, "k");
        hooks.dispatch(pending);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].event, CacheEvent::Miss);
        assert_eq!(seen[1].event, CacheEvent::Expire);
        assert_eq!(seen[1].key.as_deref(), Some("k"));
        assert_eq!(seen[1].backend, "memory");
    }

    #[test]
    fn test_unregistered_events_are_skipped() {
        let hooks = EventHooks::new("memory");
        let (seen, callback) = recorder();
        hooks.register(CacheEvent::Set, callback);

        let mut pending = PendingEvents::new();
        pending.push(CacheEvent::Hit, "a");
        pending.push_keyless(CacheEvent::Clear);
        hooks.dispatch(pending);

        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_failing_callbacks_do_not_stop_dispatch() {
        let hooks = EventHooks::new("memory");
        let (seen, callback) = recorder();
        hooks.register(
            CacheEvent::Set,
            Arc::new(|_: &EventContext| -> anyhow::Result<()> { Err(anyhow::anyhow!("boom")) }),
        );
        hooks.register(
            CacheEvent::Set,
            Arc::new(|_: &EventContext| -> anyhow::Result<()> { panic!("callback panic") }),
        );
        hooks.register(CacheEvent::Set, callback);

        let mut pending = PendingEvents::new();
        pending.push(CacheEvent::Set, "k");
        hooks.dispatch(pending);

        assert_eq!(seen.lock().len(), 1);
    }
}
