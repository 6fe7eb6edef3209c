//! Per-key poller: fetch → fingerprint → compare → notify → wait, forever.
//!
//! One task per watch key. The task is the only writer of its key's
//! [`WatchState`], so the fingerprint needs no lock; listeners and counters
//! live in [`WatchShared`] because the registry reads them.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use confwatch_core::{ConfigSnapshot, GatewayError, RegistryGateway, Settings, WatchKey};

use crate::fingerprint::{fingerprint, Fingerprint};

/// Invoked once per detected change. Runs on the poller's task, so it should
/// return quickly; long work belongs on a channel or a spawned task.
pub type ChangeCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Delivered to every listener of a key when its content changes.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub key: WatchKey,
    pub snapshot: ConfigSnapshot,
    pub fingerprint: Fingerprint,
    pub observed_at: DateTime<Utc>,
}

/// Cadence and per-fetch deadline shared by every poller of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(confwatch_core::settings::DEFAULT_POLL_INTERVAL_SECS),
            fetch_timeout: Duration::from_secs(
                confwatch_core::settings::DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
        }
    }
}

impl From<&Settings> for PollSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            interval: settings.poll_interval(),
            fetch_timeout: settings.request_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Fingerprint state machine
// ---------------------------------------------------------------------------

/// What one successful fetch meant for the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First successful fetch since registration; recorded silently.
    Baseline,
    Unchanged,
    Changed,
}

/// Last-known fingerprint of one key. Owned by that key's poller.
#[derive(Debug, Default)]
pub struct WatchState {
    last_fingerprint: Option<Fingerprint>,
}

impl WatchState {
    pub fn last_fingerprint(&self) -> Option<&Fingerprint> {
        self.last_fingerprint.as_ref()
    }

    pub fn observe(&mut self, current: Fingerprint) -> Observation {
        match &self.last_fingerprint {
            None => {
                self.last_fingerprint = Some(current);
                Observation::Baseline
            }
            Some(last) if *last == current => Observation::Unchanged,
            Some(_) => {
                self.last_fingerprint = Some(current);
                Observation::Changed
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Shared per-key record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ListenerId(pub(crate) u64);

/// Counters exposed through `WatchRegistry::status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollStats {
    pub polls: u64,
    pub failures: u64,
    pub consecutive_failures: u64,
    pub changes: u64,
    pub last_fingerprint: Option<String>,
    pub last_change_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Default)]
pub(crate) struct WatchShared {
    listeners: Mutex<Vec<(ListenerId, ChangeCallback)>>,
    stats: Mutex<PollStats>,
}

impl WatchShared {
    pub(crate) fn add_listener(&self, id: ListenerId, callback: ChangeCallback) {
        self.listeners.lock().push((id, callback));
    }

    /// Remove one listener; returns whether it was present.
    pub(crate) fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub(crate) fn stats(&self) -> PollStats {
        self.stats.lock().clone()
    }

    fn snapshot_listeners(&self) -> Vec<ChangeCallback> {
        self.listeners
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Poll loop
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
enum FetchError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("fetch timed out after {0:?}")]
    TimedOut(Duration),

    #[error("previous fetch is still in flight")]
    StillInFlight,

    #[error("fetch task failed: {0}")]
    Join(String),
}

type FetchTask = JoinHandle<Result<ConfigSnapshot, GatewayError>>;

pub(crate) async fn run(
    key: WatchKey,
    gateway: Arc<dyn RegistryGateway>,
    shared: Arc<WatchShared>,
    settings: PollSettings,
    cancel: CancellationToken,
) {
    tracing::info!(key = %key, interval = ?settings.interval, "poller started");
    let mut state = WatchState::default();
    let mut in_flight: Option<FetchTask> = None;

    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = fetch(&key, &gateway, settings.fetch_timeout, &mut in_flight) => outcome,
        };

        match outcome {
            Ok(snapshot) => {
                let current = fingerprint(&snapshot);
                let observation = state.observe(current.clone());
                record_success(&shared, &current, observation);
                match observation {
                    Observation::Baseline => {
                        tracing::debug!(key = %key, fingerprint = %current, "baseline established");
                    }
                    Observation::Unchanged => {}
                    Observation::Changed => {
                        tracing::info!(key = %key, fingerprint = %current, "config change detected");
                        let event = ChangeEvent {
                            key: key.clone(),
                            snapshot,
                            fingerprint: current,
                            observed_at: Utc::now(),
                        };
                        dispatch(&shared, &event);
                    }
                }
            }
            Err(err) => {
                let consecutive = record_failure(&shared, &err);
                tracing::warn!(
                    key = %key,
                    error = %err,
                    consecutive_failures = consecutive,
                    "config fetch failed; retrying after interval",
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(settings.interval) => {}
        }
    }

    tracing::info!(key = %key, "poller stopped");
}

/// Fetch the key's current value on the blocking pool.
///
/// A fetch that outlives `timeout` keeps running detached; until it finishes
/// no new fetch for the key is started, so fetches never overlap.
async fn fetch(
    key: &WatchKey,
    gateway: &Arc<dyn RegistryGateway>,
    timeout: Duration,
    in_flight: &mut Option<FetchTask>,
) -> Result<ConfigSnapshot, FetchError> {
    if let Some(previous) = in_flight.take() {
        if !previous.is_finished() {
            *in_flight = Some(previous);
            return Err(FetchError::StillInFlight);
        }
    }

    let mut task: FetchTask = {
        let gateway = gateway.clone();
        let key = key.clone();
        tokio::task::spawn_blocking(move || gateway.get_config(&key))
    };

    match tokio::time::timeout(timeout, &mut task).await {
        Err(_) => {
            *in_flight = Some(task);
            Err(FetchError::TimedOut(timeout))
        }
        Ok(Err(join)) => Err(FetchError::Join(join.to_string())),
        Ok(Ok(Err(err))) if err.is_not_found() => Ok(ConfigSnapshot::Empty),
        Ok(Ok(result)) => result.map_err(FetchError::from),
    }
}

fn dispatch(shared: &WatchShared, event: &ChangeEvent) {
    for callback in shared.snapshot_listeners() {
        if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
            tracing::error!(key = %event.key, "change listener panicked");
        }
    }
}

fn record_success(shared: &WatchShared, current: &Fingerprint, observation: Observation) {
    let mut stats = shared.stats.lock();
    stats.polls += 1;
    stats.consecutive_failures = 0;
    stats.last_fingerprint = Some(current.to_string());
    if observation == Observation::Changed {
        stats.changes += 1;
        stats.last_change_at = Some(Utc::now());
    }
}

fn record_failure(shared: &WatchShared, err: &FetchError) -> u64 {
    let mut stats = shared.stats.lock();
    stats.polls += 1;
    stats.failures += 1;
    stats.consecutive_failures += 1;
    stats.last_error = Some(err.to_string());
    stats.consecutive_failures
}
