//! Domain types for the remote configuration registry.
//!
//! Wire-facing structs carry serde renames matching the registry's JSON
//! (camelCase page results, `namespaceShowName` etc.); everything else uses
//! plain snake_case.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of a namespace. The empty id is the registry's public namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespaceId(pub String);

impl NamespaceId {
    pub fn is_public(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_public() {
            f.write_str("public")
        } else {
            self.0.fmt(f)
        }
    }
}

impl From<String> for NamespaceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NamespaceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A configuration group inside a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Group(pub String);

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Group {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Group {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Name of one configuration entry within a (namespace, group).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataId(pub String);

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for DataId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DataId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Watch key and snapshots
// ---------------------------------------------------------------------------

/// The (namespace, group, data id) triple identifying one watchable entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WatchKey {
    #[serde(default)]
    pub namespace: NamespaceId,
    pub group: Group,
    pub data_id: DataId,
}

impl WatchKey {
    pub fn new(
        namespace: impl Into<NamespaceId>,
        group: impl Into<Group>,
        data_id: impl Into<DataId>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            group: group.into(),
            data_id: data_id.into(),
        }
    }
}

impl fmt::Display for WatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.group, self.data_id)
    }
}

/// The value fetched for a key at one poll instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum ConfigSnapshot {
    /// No published content (missing, deleted, blank or unparseable response).
    #[default]
    Empty,
    /// Parsed configuration payload.
    Value(Value),
}

impl ConfigSnapshot {
    pub fn is_empty(&self) -> bool {
        matches!(self, ConfigSnapshot::Empty)
    }

    /// Raw configuration text carried by the snapshot.
    ///
    /// Detail payloads (`show=all`) keep the text under `content`; a bare
    /// JSON string is returned as-is.
    pub fn content(&self) -> Option<&str> {
        match self {
            ConfigSnapshot::Empty => None,
            ConfigSnapshot::Value(Value::String(s)) => Some(s),
            ConfigSnapshot::Value(Value::Object(map)) => map.get("content").and_then(Value::as_str),
            ConfigSnapshot::Value(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Namespaces and publishing
// ---------------------------------------------------------------------------

/// A namespace as reported by the registry console API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    #[serde(rename = "namespace", default)]
    pub id: NamespaceId,
    #[serde(rename = "namespaceShowName", default)]
    pub display_name: String,
    #[serde(rename = "namespaceDesc", default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quota: u32,
    #[serde(rename = "configCount", default)]
    pub config_count: u32,
}

/// Result of a namespace creation attempt that reached the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Everything needed to publish (create or overwrite) one configuration entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub key: WatchKey,
    pub content: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub app_name: String,
}

fn default_content_type() -> String {
    "text".to_string()
}

impl PublishRequest {
    pub fn new(key: WatchKey, content: impl Into<String>) -> Self {
        Self {
            key,
            content: content.into(),
            content_type: default_content_type(),
            description: String::new(),
            tags: String::new(),
            app_name: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Paged listing
// ---------------------------------------------------------------------------

/// How the registry matches the `dataId` / `group` filters of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Exact match; an empty filter matches everything.
    #[default]
    Accurate,
    /// Wildcard match; `*` matches any run of characters.
    Blur,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Accurate => "accurate",
            SearchMode::Blur => "blur",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One paged listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub namespace: NamespaceId,
    pub group: String,
    pub data_id: String,
    pub search: SearchMode,
    pub page_no: u32,
    pub page_size: u32,
}

impl PageQuery {
    /// The same query advanced by one page.
    pub fn next_page(&self) -> Self {
        Self {
            page_no: self.page_no + 1,
            ..self.clone()
        }
    }
}

impl fmt::Display for PageQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "namespace={} group='{}' dataId='{}' search={}",
            self.namespace, self.group, self.data_id, self.search
        )
    }
}

/// One configuration entry as it appears in a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigItem {
    #[serde(default)]
    pub id: Option<String>,
    pub data_id: String,
    pub group: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(rename = "type", default)]
    pub content_type: Option<String>,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub page_number: u32,
    #[serde(default)]
    pub pages_available: u32,
    #[serde(default)]
    pub page_items: Vec<ConfigItem>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn newtype_display() {
        assert_eq!(NamespaceId::from("t1").to_string(), "t1");
        assert_eq!(NamespaceId::default().to_string(), "public");
        assert_eq!(Group::from("G").to_string(), "G");
        assert_eq!(DataId::from("D").to_string(), "D");
    }

    #[test]
    fn watch_key_identity_uses_all_three_fields() {
        let a = WatchKey::new("t1", "G", "D");
        assert_eq!(a, WatchKey::new("t1", "G", "D"));
        assert_ne!(a, WatchKey::new("t2", "G", "D"));
        assert_ne!(a, WatchKey::new("t1", "H", "D"));
        assert_ne!(a, WatchKey::new("t1", "G", "E"));
        assert_eq!(a.to_string(), "t1/G/D");
    }

    #[test]
    fn snapshot_content_reads_detail_payload() {
        let detail = ConfigSnapshot::Value(json!({"dataId": "D", "content": "k=v1"}));
        assert_eq!(detail.content(), Some("k=v1"));
        assert_eq!(ConfigSnapshot::Value(json!("raw")).content(), Some("raw"));
        assert_eq!(ConfigSnapshot::Empty.content(), None);
        assert!(ConfigSnapshot::default().is_empty());
    }

    #[test]
    fn page_result_tolerates_missing_fields() {
        let page: PageResult = serde_json::from_str(r#"{"pageNumber":1}"#).expect("parse");
        assert_eq!(page.page_number, 1);
        assert_eq!(page.pages_available, 0);
        assert!(page.page_items.is_empty());
    }

    #[test]
    fn namespace_parses_console_wire_names() {
        let ns: Namespace = serde_json::from_value(json!({
            "namespace": "t1",
            "namespaceShowName": "Team One",
            "quota": 200,
            "configCount": 3,
            "type": 2
        }))
        .expect("parse");
        assert_eq!(ns.id, NamespaceId::from("t1"));
        assert_eq!(ns.display_name, "Team One");
        assert_eq!(ns.config_count, 3);
        assert_eq!(ns.description, None);
    }

    #[test]
    fn next_page_only_advances_page_number() {
        let q = PageQuery {
            namespace: NamespaceId::from("t1"),
            group: String::new(),
            data_id: "D".into(),
            search: SearchMode::Accurate,
            page_no: 1,
            page_size: 10,
        };
        let next = q.next_page();
        assert_eq!(next.page_no, 2);
        assert_eq!(next.data_id, "D");
    }
}
