//! Nacos v1 REST mapping over a blocking `ureq` agent.

use std::time::Duration;

use serde::Deserialize;

use crate::error::GatewayError;
use crate::gateway::RegistryGateway;
use crate::settings::Settings;
use crate::types::{
    ConfigSnapshot, CreateOutcome, Namespace, NamespaceId, PageQuery, PageResult, PublishRequest,
    WatchKey,
};

const NAMESPACES_PATH: &str = "/nacos/v1/console/namespaces";
const CONFIGS_PATH: &str = "/nacos/v1/cs/configs";

/// HTTP implementation of [`RegistryGateway`].
///
/// Every request carries the agent-wide timeout, so a stalled registry turns
/// into a `Transport` error instead of a hung caller.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct NamespaceEnvelope {
    #[serde(default)]
    data: Vec<Namespace>,
}

impl HttpGateway {
    pub fn new(server_address: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            base_url: server_address.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.server_address, settings.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and return `(status, body)` for any HTTP response.
    ///
    /// Only transport-level failures become errors here; status handling is
    /// left to each operation.
    fn dispatch(
        &self,
        operation: &str,
        request: ureq::Request,
        form: Option<&[(&str, &str)]>,
    ) -> Result<(u16, String), GatewayError> {
        tracing::debug!(operation, url = %request.url(), "registry request");
        let result = match form {
            Some(form) => request.send_form(form),
            None => request.call(),
        };
        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                return Err(GatewayError::Transport {
                    operation: operation.to_string(),
                    source: Box::new(transport),
                })
            }
        };
        let status = response.status();
        let body = response.into_string().map_err(|source| GatewayError::Io {
            operation: operation.to_string(),
            source,
        })?;
        tracing::debug!(operation, status, bytes = body.len(), "registry response");
        Ok((status, body))
    }
}

impl RegistryGateway for HttpGateway {
    fn create_namespace(
        &self,
        id: &NamespaceId,
        display_name: &str,
        description: &str,
    ) -> Result<CreateOutcome, GatewayError> {
        let operation = format!("create namespace '{}'", id.0);
        let request = self
            .agent
            .post(&self.url(NAMESPACES_PATH))
            .query("customNamespaceId", &id.0)
            .query("namespaceName", display_name)
            .query("namespaceDesc", description);
        let (status, body) = self.dispatch(&operation, request, None)?;
        interpret_create(operation, status, body)
    }

    fn publish_config(&self, request: &PublishRequest) -> Result<(), GatewayError> {
        let key = &request.key;
        let operation = format!(
            "publish dataId '{}' in group '{}', namespace {}",
            key.data_id, key.group, key.namespace
        );
        let http = self
            .agent
            .post(&self.url(CONFIGS_PATH))
            .query("dataId", &key.data_id.0)
            .query("group", &key.group.0)
            .query("tenant", &key.namespace.0)
            .query("namespaceId", &key.namespace.0)
            .query("type", &request.content_type)
            .query("desc", &request.description)
            .query("config_tags", &request.tags)
            .query("appName", &request.app_name);
        let (status, body) =
            self.dispatch(&operation, http, Some(&[("content", request.content.as_str())]))?;
        match (status, body.trim()) {
            (200, "true") => Ok(()),
            (200, _) => Err(GatewayError::Rejected { operation, body }),
            _ => Err(GatewayError::Status {
                operation,
                status,
                body,
            }),
        }
    }

    fn get_config(&self, key: &WatchKey) -> Result<ConfigSnapshot, GatewayError> {
        let operation = format!(
            "get dataId '{}' in group '{}', namespace {}",
            key.data_id, key.group, key.namespace
        );
        let request = self
            .agent
            .get(&self.url(CONFIGS_PATH))
            .query("dataId", &key.data_id.0)
            .query("group", &key.group.0)
            .query("tenant", &key.namespace.0)
            .query("show", "all");
        let (status, body) = self.dispatch(&operation, request, None)?;
        match status {
            200 => Ok(parse_snapshot(key, &body)),
            404 => Err(GatewayError::NotFound { key: key.clone() }),
            _ => Err(GatewayError::Status {
                operation,
                status,
                body,
            }),
        }
    }

    fn list_page(&self, query: &PageQuery) -> Result<PageResult, GatewayError> {
        let operation = format!("list page {} ({query})", query.page_no);
        let request = self
            .agent
            .get(&self.url(CONFIGS_PATH))
            .query("search", query.search.as_str())
            .query("pageNo", &query.page_no.to_string())
            .query("pageSize", &query.page_size.to_string())
            .query("namespaceId", &query.namespace.0)
            .query("tenant", &query.namespace.0)
            .query("dataId", &query.data_id)
            .query("group", &query.group);
        let (status, body) = self.dispatch(&operation, request, None)?;
        if status != 200 {
            return Err(GatewayError::Status {
                operation,
                status,
                body,
            });
        }
        serde_json::from_str(&body).map_err(|source| GatewayError::Decode { operation, source })
    }

    fn list_namespaces(&self) -> Result<Vec<Namespace>, GatewayError> {
        let operation = "list namespaces".to_string();
        let request = self.agent.get(&self.url(NAMESPACES_PATH));
        let (status, body) = self.dispatch(&operation, request, None)?;
        if status != 200 {
            return Err(GatewayError::Status {
                operation,
                status,
                body,
            });
        }
        let envelope: NamespaceEnvelope = serde_json::from_str(&body)
            .map_err(|source| GatewayError::Decode { operation, source })?;
        Ok(envelope.data)
    }
}

fn interpret_create(
    operation: String,
    status: u16,
    body: String,
) -> Result<CreateOutcome, GatewayError> {
    let trimmed = body.trim();
    if status == 200 {
        return match trimmed {
            "true" => Ok(CreateOutcome::Created),
            // Older registries answer `false` when the custom id is taken.
            "false" => Ok(CreateOutcome::AlreadyExists),
            _ => Err(GatewayError::Rejected { operation, body }),
        };
    }
    if trimmed.to_ascii_lowercase().contains("exist") {
        return Ok(CreateOutcome::AlreadyExists);
    }
    Err(GatewayError::Status {
        operation,
        status,
        body,
    })
}

/// Blank and unparseable bodies are an empty snapshot, not an error.
fn parse_snapshot(key: &WatchKey, body: &str) -> ConfigSnapshot {
    if body.trim().is_empty() {
        return ConfigSnapshot::Empty;
    }
    match serde_json::from_str(body) {
        Ok(value) => ConfigSnapshot::Value(value),
        Err(err) => {
            tracing::warn!(key = %key, error = %err, "malformed config response, treating as empty");
            ConfigSnapshot::Empty
        }
    }
}
