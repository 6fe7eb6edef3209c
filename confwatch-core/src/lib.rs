//! Confwatch core library — domain types, the registry gateway boundary,
//! settings persistence, errors.
//!
//! - [`types`] — newtypes, watch keys, snapshots, paged listing types
//! - [`gateway`] — [`RegistryGateway`] plus HTTP and in-memory implementations
//! - [`settings`] — `~/.confwatch/config.yaml`
//! - [`error`] — [`GatewayError`], [`SettingsError`]

pub mod error;
pub mod gateway;
pub mod settings;
pub mod types;

pub use error::{GatewayError, SettingsError};
pub use gateway::{HttpGateway, InMemoryGateway, RegistryGateway};
pub use settings::Settings;
pub use types::{
    ConfigItem, ConfigSnapshot, CreateOutcome, DataId, Group, Namespace, NamespaceId, PageQuery,
    PageResult, PublishRequest, SearchMode, WatchKey,
};
