//! # confwatch-engine
//!
//! Change-watch engine and listing aggregation over a [`RegistryGateway`].
//!
//! Start a [`WatchRegistry`] inside a Tokio runtime and call
//! [`WatchRegistry::watch`]; each distinct key gets one background poller that
//! fingerprints the remote value every interval and notifies listeners once
//! per change. [`aggregate`] enumerates groups and data ids across pages.
//!
//! [`RegistryGateway`]: confwatch_core::RegistryGateway

pub mod aggregate;
pub mod client;
pub mod error;
pub mod fingerprint;
pub mod poller;
pub mod registry;

pub use client::ConfigClient;
pub use error::{AggregateError, WatchError};
pub use fingerprint::{fingerprint, Fingerprint};
pub use poller::{ChangeCallback, ChangeEvent, ListenerId, Observation, PollSettings, PollStats, WatchState};
pub use registry::{ShutdownReport, WatchHandle, WatchRegistry, WatchStatus};
