//! `ConfigClient` — the caller-facing façade over an injected gateway.
//!
//! One-shot operations return the gateway's error untouched so its message
//! reaches the caller verbatim. Watching goes through a [`WatchRegistry`]
//! built on the same gateway.

use std::collections::BTreeSet;
use std::sync::Arc;

use confwatch_core::{
    settings::DEFAULT_PAGE_SIZE, ConfigSnapshot, CreateOutcome, GatewayError, Group, Namespace,
    NamespaceId, PageResult, PublishRequest, RegistryGateway, WatchKey,
};

use crate::aggregate;
use crate::error::{AggregateError, WatchError};
use crate::poller::{ChangeEvent, PollSettings};
use crate::registry::{WatchHandle, WatchRegistry};

#[derive(Clone)]
pub struct ConfigClient {
    gateway: Arc<dyn RegistryGateway>,
    page_size: u32,
}

impl ConfigClient {
    pub fn new(gateway: Arc<dyn RegistryGateway>) -> Self {
        Self {
            gateway,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Page size used by the aggregating listings.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn gateway(&self) -> Arc<dyn RegistryGateway> {
        self.gateway.clone()
    }

    /// Start a watch registry sharing this client's gateway.
    pub fn watch_registry(&self, settings: PollSettings) -> Result<WatchRegistry, WatchError> {
        WatchRegistry::start(self.gateway.clone(), settings)
    }

    pub fn create_namespace(
        &self,
        id: &NamespaceId,
        display_name: &str,
        description: &str,
    ) -> Result<CreateOutcome, GatewayError> {
        let outcome = self.gateway.create_namespace(id, display_name, description)?;
        tracing::info!(namespace = %id, outcome = ?outcome, "create namespace");
        Ok(outcome)
    }

    /// Create `id` unless a namespace with that id or display name is already listed.
    pub fn ensure_namespace(&self, id: &NamespaceId) -> Result<CreateOutcome, GatewayError> {
        if id.is_public() {
            return Ok(CreateOutcome::AlreadyExists);
        }
        let exists = self
            .gateway
            .list_namespaces()?
            .iter()
            .any(|ns| ns.id == *id || ns.display_name == id.0);
        if exists {
            return Ok(CreateOutcome::AlreadyExists);
        }
        self.create_namespace(id, &id.0, "")
    }

    pub fn publish(&self, request: &PublishRequest) -> Result<(), GatewayError> {
        self.gateway.publish_config(request)?;
        tracing::info!(key = %request.key, bytes = request.content.len(), "configuration published");
        Ok(())
    }

    pub fn get_config(&self, key: &WatchKey) -> Result<ConfigSnapshot, GatewayError> {
        self.gateway.get_config(key)
    }

    pub fn list_namespaces(&self) -> Result<Vec<Namespace>, GatewayError> {
        self.gateway.list_namespaces()
    }

    pub fn list_all_groups(
        &self,
        namespace: &NamespaceId,
        data_id_pattern: &str,
        group_pattern: &str,
    ) -> Result<BTreeSet<String>, AggregateError> {
        aggregate::list_all_groups(
            self.gateway.as_ref(),
            namespace,
            data_id_pattern,
            group_pattern,
            self.page_size,
        )
    }

    pub fn list_all_data_ids(
        &self,
        namespace: &NamespaceId,
        group: &Group,
    ) -> Result<BTreeSet<String>, AggregateError> {
        aggregate::list_all_data_ids(self.gateway.as_ref(), namespace, group, self.page_size)
    }

    pub fn list_data_ids(
        &self,
        namespace: &NamespaceId,
        group: &Group,
        search_text: &str,
        fuzzy: bool,
        page_no: u32,
        page_size: u32,
    ) -> Result<PageResult, GatewayError> {
        aggregate::list_data_ids(
            self.gateway.as_ref(),
            namespace,
            group,
            search_text,
            fuzzy,
            page_no,
            page_size,
        )
    }

    /// Fire-and-forget registration on `registry`.
    pub fn watch_with<F>(
        &self,
        registry: &WatchRegistry,
        key: WatchKey,
        on_change: F,
    ) -> Result<WatchHandle, WatchError>
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        registry.watch(key, on_change)
    }
}
