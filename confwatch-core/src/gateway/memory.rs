//! In-process registry implementing [`RegistryGateway`].
//!
//! Mirrors the observable behaviour of the HTTP registry (detail payloads,
//! accurate / blur matching, page arithmetic) and adds knobs for driving
//! failure paths: per-key call counters, a count of `get_config` calls to
//! fail, per-page listing failures and a global outage switch.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::Mutex;
use serde_json::json;

use crate::error::GatewayError;
use crate::gateway::RegistryGateway;
use crate::types::{
    ConfigItem, ConfigSnapshot, CreateOutcome, Namespace, NamespaceId, PageQuery, PageResult,
    PublishRequest, SearchMode, WatchKey,
};

const DEFAULT_QUOTA: u32 = 200;

#[derive(Debug, Default)]
pub struct InMemoryGateway {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    namespaces: BTreeMap<NamespaceId, Namespace>,
    configs: BTreeMap<WatchKey, PublishRequest>,
    get_calls: HashMap<WatchKey, usize>,
    fail_gets: usize,
    failing_pages: BTreeSet<u32>,
    outage: Option<String>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `content` under `key` as a plain-text entry.
    pub fn put(&self, key: &WatchKey, content: &str) {
        self.state
            .lock()
            .configs
            .insert(key.clone(), PublishRequest::new(key.clone(), content));
    }

    /// Delete an entry; subsequent reads report `NotFound`.
    pub fn remove(&self, key: &WatchKey) -> bool {
        self.state.lock().configs.remove(key).is_some()
    }

    /// Number of `get_config` calls made for `key`, including failed ones.
    pub fn get_calls(&self, key: &WatchKey) -> usize {
        self.state.lock().get_calls.get(key).copied().unwrap_or(0)
    }

    /// Fail the next `count` `get_config` calls, whichever keys they target.
    pub fn fail_next_gets(&self, count: usize) {
        self.state.lock().fail_gets = count;
    }

    /// Fail every listing request for `page_no`.
    pub fn fail_page(&self, page_no: u32) {
        self.state.lock().failing_pages.insert(page_no);
    }

    /// Fail every operation with `reason` until cleared with `None`.
    pub fn set_outage(&self, reason: Option<&str>) {
        self.state.lock().outage = reason.map(str::to_string);
    }

    fn check_outage(state: &MemoryState, operation: &str) -> Result<(), GatewayError> {
        match &state.outage {
            Some(reason) => Err(GatewayError::Unavailable {
                operation: operation.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl RegistryGateway for InMemoryGateway {
    fn create_namespace(
        &self,
        id: &NamespaceId,
        display_name: &str,
        description: &str,
    ) -> Result<CreateOutcome, GatewayError> {
        let mut state = self.state.lock();
        Self::check_outage(&state, "create namespace")?;
        if id.is_public() || state.namespaces.contains_key(id) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        state.namespaces.insert(
            id.clone(),
            Namespace {
                id: id.clone(),
                display_name: display_name.to_string(),
                description: Some(description.to_string()).filter(|d| !d.is_empty()),
                quota: DEFAULT_QUOTA,
                config_count: 0,
            },
        );
        Ok(CreateOutcome::Created)
    }

    fn publish_config(&self, request: &PublishRequest) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        Self::check_outage(&state, "publish config")?;
        state.configs.insert(request.key.clone(), request.clone());
        Ok(())
    }

    fn get_config(&self, key: &WatchKey) -> Result<ConfigSnapshot, GatewayError> {
        let mut state = self.state.lock();
        *state.get_calls.entry(key.clone()).or_insert(0) += 1;
        Self::check_outage(&state, "get config")?;
        if state.fail_gets > 0 {
            state.fail_gets -= 1;
            return Err(GatewayError::Unavailable {
                operation: format!("get {key}"),
                reason: "injected failure".to_string(),
            });
        }
        let entry = state
            .configs
            .get(key)
            .ok_or_else(|| GatewayError::NotFound { key: key.clone() })?;
        Ok(ConfigSnapshot::Value(json!({
            "dataId": entry.key.data_id.0,
            "group": entry.key.group.0,
            "tenant": entry.key.namespace.0,
            "content": entry.content,
            "type": entry.content_type,
            "desc": entry.description,
            "configTags": entry.tags,
            "appName": entry.app_name,
        })))
    }

    fn list_page(&self, query: &PageQuery) -> Result<PageResult, GatewayError> {
        let state = self.state.lock();
        let operation = format!("list page {} ({query})", query.page_no);
        Self::check_outage(&state, &operation)?;
        if state.failing_pages.contains(&query.page_no) {
            return Err(GatewayError::Status {
                operation,
                status: 500,
                body: "injected page failure".to_string(),
            });
        }
        if query.page_size == 0 {
            return Err(GatewayError::Status {
                operation,
                status: 400,
                body: "pageSize must be positive".to_string(),
            });
        }

        let matching: Vec<&PublishRequest> = state
            .configs
            .values()
            .filter(|entry| entry.key.namespace == query.namespace)
            .filter(|entry| matches_filter(query.search, &query.group, &entry.key.group.0))
            .filter(|entry| matches_filter(query.search, &query.data_id, &entry.key.data_id.0))
            .collect();

        let total = matching.len();
        let size = query.page_size as usize;
        let pages_available = total.div_ceil(size) as u32;
        let skip = (query.page_no.max(1) as usize - 1) * size;
        let page_items = matching
            .into_iter()
            .skip(skip)
            .take(size)
            .map(|entry| ConfigItem {
                id: None,
                data_id: entry.key.data_id.0.clone(),
                group: entry.key.group.0.clone(),
                content: Some(entry.content.clone()),
                tenant: Some(entry.key.namespace.0.clone()),
                app_name: Some(entry.app_name.clone()).filter(|a| !a.is_empty()),
                content_type: Some(entry.content_type.clone()),
            })
            .collect();

        Ok(PageResult {
            total_count: total as u64,
            page_number: query.page_no,
            pages_available,
            page_items,
        })
    }

    fn list_namespaces(&self) -> Result<Vec<Namespace>, GatewayError> {
        let state = self.state.lock();
        Self::check_outage(&state, "list namespaces")?;
        let count = |id: &NamespaceId| {
            state
                .configs
                .keys()
                .filter(|key| &key.namespace == id)
                .count() as u32
        };
        let public = NamespaceId::default();
        let mut out = vec![Namespace {
            id: public.clone(),
            display_name: "public".to_string(),
            description: Some("Public Namespace".to_string()),
            quota: DEFAULT_QUOTA,
            config_count: count(&public),
        }];
        out.extend(state.namespaces.values().map(|ns| Namespace {
            config_count: count(&ns.id),
            ..ns.clone()
        }));
        Ok(out)
    }
}

fn matches_filter(mode: SearchMode, filter: &str, value: &str) -> bool {
    if filter.is_empty() {
        return true;
    }
    match mode {
        SearchMode::Accurate => filter == value,
        SearchMode::Blur => wildcard_match(filter, value),
    }
}

/// `*` matches any run of characters; everything else is literal.
fn wildcard_match(pattern: &str, value: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == value;
    }
    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if value.len() < first.len() + last.len() || !value.starts_with(first) || !value.ends_with(last)
    {
        return false;
    }
    let mut rest = &value[first.len()..value.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    true
}
