//! Registry gateway — the request/response boundary to the remote registry.
//!
//! The trait is blocking and stateless from the caller's point of view, so one
//! instance is shared (behind an `Arc`) by every poller and one-shot caller.
//! Async callers run it inside `spawn_blocking`.

mod http;
mod memory;

pub use http::HttpGateway;
pub use memory::InMemoryGateway;

use crate::error::GatewayError;
use crate::types::{
    ConfigSnapshot, CreateOutcome, Namespace, NamespaceId, PageQuery, PageResult, PublishRequest,
    WatchKey,
};

pub trait RegistryGateway: Send + Sync {
    /// Create a namespace. An existing id is reported as [`CreateOutcome::AlreadyExists`].
    fn create_namespace(
        &self,
        id: &NamespaceId,
        display_name: &str,
        description: &str,
    ) -> Result<CreateOutcome, GatewayError>;

    /// Create or overwrite one configuration entry.
    fn publish_config(&self, request: &PublishRequest) -> Result<(), GatewayError>;

    /// Current value of one entry; [`GatewayError::NotFound`] when absent.
    fn get_config(&self, key: &WatchKey) -> Result<ConfigSnapshot, GatewayError>;

    /// One page of a configuration listing.
    fn list_page(&self, query: &PageQuery) -> Result<PageResult, GatewayError>;

    fn list_namespaces(&self) -> Result<Vec<Namespace>, GatewayError>;
}
