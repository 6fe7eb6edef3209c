//! Watch registry — owns one poller per watched key.
//!
//! Registration is create-if-absent under the map's entry lock, so any number
//! of racing `watch` calls for one key start exactly one poller. Later
//! registrations join the key's listener set; the poller stops when its last
//! listener is removed or the registry shuts down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use confwatch_core::{RegistryGateway, WatchKey};

use crate::error::WatchError;
use crate::poller::{
    self, ChangeCallback, ChangeEvent, ListenerId, PollSettings, PollStats, WatchShared,
};

/// Returned by [`WatchRegistry::watch`]; identifies one listener of one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WatchHandle {
    pub key: WatchKey,
    pub listener: ListenerId,
}

/// Point-in-time view of one watched key.
#[derive(Debug, Clone, Serialize)]
pub struct WatchStatus {
    pub key: WatchKey,
    pub listeners: usize,
    #[serde(flatten)]
    pub stats: PollStats,
}

/// How the pollers ended during [`WatchRegistry::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Pollers that observed cancellation and exited within the grace period.
    pub stopped: usize,
    /// Pollers still running at the deadline and aborted.
    pub aborted: usize,
}

struct WatchEntry {
    shared: Arc<WatchShared>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Inner {
    gateway: Arc<dyn RegistryGateway>,
    settings: PollSettings,
    runtime: Handle,
    root: CancellationToken,
    entries: DashMap<WatchKey, WatchEntry>,
    next_listener: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

/// Cheap to clone; clones share the same pollers.
#[derive(Clone)]
pub struct WatchRegistry {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("settings", &self.inner.settings)
            .field("active_pollers", &self.inner.entries.len())
            .field("shut_down", &self.inner.root.is_cancelled())
            .finish()
    }
}

impl WatchRegistry {
    /// Create a registry bound to the current Tokio runtime.
    ///
    /// Pollers are spawned on that runtime even when `watch` is later called
    /// from a plain thread.
    pub fn start(
        gateway: Arc<dyn RegistryGateway>,
        settings: PollSettings,
    ) -> Result<Self, WatchError> {
        let runtime = Handle::try_current().map_err(|_| WatchError::NoRuntime)?;
        Ok(Self {
            inner: Arc::new(Inner {
                gateway,
                settings,
                runtime,
                root: CancellationToken::new(),
                entries: DashMap::new(),
                next_listener: AtomicU64::new(1),
            }),
        })
    }

    pub fn settings(&self) -> PollSettings {
        self.inner.settings
    }

    /// Register `callback` for changes of `key`.
    ///
    /// The first registration for a key spawns its poller; later ones only
    /// add a listener. Every listener is invoked once per detected change.
    pub fn watch<F>(&self, key: WatchKey, callback: F) -> Result<WatchHandle, WatchError>
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.watch_arc(key, Arc::new(callback))
    }

    pub fn watch_arc(
        &self,
        key: WatchKey,
        callback: ChangeCallback,
    ) -> Result<WatchHandle, WatchError> {
        let inner = &self.inner;
        if inner.root.is_cancelled() {
            return Err(WatchError::ShutDown);
        }
        let listener = ListenerId(inner.next_listener.fetch_add(1, Ordering::Relaxed));

        match inner.entries.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                occupied.get().shared.add_listener(listener, callback);
                tracing::debug!(
                    key = %key,
                    listeners = occupied.get().shared.listener_count(),
                    "listener added to existing watch",
                );
            }
            Entry::Vacant(vacant) => {
                // Re-checked under the shard lock: shutdown cancels before it
                // drains, so an insert seen as live here is drained by it.
                if inner.root.is_cancelled() {
                    return Err(WatchError::ShutDown);
                }
                let shared = Arc::new(WatchShared::default());
                shared.add_listener(listener, callback);
                let cancel = inner.root.child_token();
                let task = inner.runtime.spawn(poller::run(
                    key.clone(),
                    inner.gateway.clone(),
                    shared.clone(),
                    inner.settings,
                    cancel.clone(),
                ));
                vacant.insert(WatchEntry {
                    shared,
                    cancel,
                    task,
                });
                tracing::info!(key = %key, "watch registered");
            }
        }

        Ok(WatchHandle { key, listener })
    }

    /// Remove one listener. The key's poller stops when no listeners remain.
    ///
    /// Returns `false` if the handle was already removed.
    pub fn unwatch(&self, handle: &WatchHandle) -> bool {
        let Entry::Occupied(occupied) = self.inner.entries.entry(handle.key.clone()) else {
            return false;
        };
        if !occupied.get().shared.remove_listener(handle.listener) {
            return false;
        }
        if occupied.get().shared.listener_count() == 0 {
            let (_, entry) = occupied.remove_entry();
            entry.cancel.cancel();
            tracing::info!(key = %handle.key, "last listener removed; poller cancelled");
        }
        true
    }

    /// Stop watching `key` regardless of how many listeners it has.
    pub fn unwatch_key(&self, key: &WatchKey) -> bool {
        match self.inner.entries.remove(key) {
            Some((_, entry)) => {
                entry.cancel.cancel();
                tracing::info!(key = %key, "watch removed");
                true
            }
            None => false,
        }
    }

    pub fn is_watching(&self, key: &WatchKey) -> bool {
        self.inner.entries.contains_key(key)
    }

    pub fn listener_count(&self, key: &WatchKey) -> usize {
        self.inner
            .entries
            .get(key)
            .map(|entry| entry.shared.listener_count())
            .unwrap_or(0)
    }

    /// Number of keys with a running poller.
    pub fn active_pollers(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.root.is_cancelled()
    }

    /// Status of every watched key, sorted by key.
    pub fn status(&self) -> Vec<WatchStatus> {
        let mut out: Vec<WatchStatus> = self
            .inner
            .entries
            .iter()
            .map(|entry| WatchStatus {
                key: entry.key().clone(),
                listeners: entry.shared.listener_count(),
                stats: entry.shared.stats(),
            })
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    /// Cancel every poller and wait up to `grace` for them to exit.
    ///
    /// Pollers interrupted mid-wait exit immediately; one blocked inside a
    /// fetch exits as soon as the fetch returns. Anything still running at
    /// the deadline is aborted. New `watch` calls fail afterwards.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        self.inner.root.cancel();

        let keys: Vec<WatchKey> = self
            .inner
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        let mut tasks = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some((_, entry)) = self.inner.entries.remove(&key) {
                tasks.push(entry.task);
            }
        }

        let deadline = tokio::time::Instant::now() + grace;
        let mut report = ShutdownReport::default();
        for mut task in tasks {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(_) => report.stopped += 1,
                Err(_) => {
                    task.abort();
                    report.aborted += 1;
                }
            }
        }
        tracing::info!(
            stopped = report.stopped,
            aborted = report.aborted,
            "watch registry shut down",
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confwatch_core::InMemoryGateway;

    fn registry() -> WatchRegistry {
        WatchRegistry::start(
            Arc::new(InMemoryGateway::new()),
            PollSettings {
                interval: Duration::from_secs(3600),
                fetch_timeout: Duration::from_secs(5),
            },
        )
        .expect("start")
    }

    #[test]
    fn start_outside_runtime_fails() {
        let err = WatchRegistry::start(Arc::new(InMemoryGateway::new()), PollSettings::default())
            .unwrap_err();
        assert!(matches!(err, WatchError::NoRuntime));
    }

    #[tokio::test]
    async fn second_registration_joins_existing_watch() {
        let registry = registry();
        let key = WatchKey::new("t1", "G", "D");
        let first = registry.watch(key.clone(), |_| {}).expect("watch");
        let second = registry.watch(key.clone(), |_| {}).expect("watch");

        assert_ne!(first.listener, second.listener);
        assert_eq!(registry.active_pollers(), 1);
        assert_eq!(registry.listener_count(&key), 2);
    }

    #[tokio::test]
    async fn unwatch_last_listener_removes_key() {
        let registry = registry();
        let key = WatchKey::new("t1", "G", "D");
        let first = registry.watch(key.clone(), |_| {}).expect("watch");
        let second = registry.watch(key.clone(), |_| {}).expect("watch");

        assert!(registry.unwatch(&first));
        assert!(!registry.unwatch(&first), "double unwatch is a no-op");
        assert!(registry.is_watching(&key));

        assert!(registry.unwatch(&second));
        assert!(!registry.is_watching(&key));
        assert_eq!(registry.active_pollers(), 0);
    }

    #[tokio::test]
    async fn watch_after_shutdown_is_rejected() {
        let registry = registry();
        registry
            .watch(WatchKey::new("t1", "G", "D"), |_| {})
            .expect("watch");
        let report = registry.shutdown(Duration::from_secs(1)).await;

        assert_eq!(report, ShutdownReport { stopped: 1, aborted: 0 });
        assert!(registry.is_shut_down());
        let err = registry
            .watch(WatchKey::new("t1", "G", "E"), |_| {})
            .unwrap_err();
        assert!(matches!(err, WatchError::ShutDown));
    }

    #[tokio::test]
    async fn unwatch_key_drops_all_listeners() {
        let registry = registry();
        let key = WatchKey::new("t1", "G", "D");
        let handle = registry.watch(key.clone(), |_| {}).expect("watch");
        registry.watch(key.clone(), |_| {}).expect("watch");

        assert!(registry.unwatch_key(&key));
        assert!(!registry.unwatch_key(&key));
        assert!(!registry.unwatch(&handle));
    }
}
