//! Subcommand implementations plus the pieces they share: settings-backed
//! session, key arguments and output helpers.

pub mod config;
pub mod daemon;
pub mod data_ids;
pub mod groups;
pub mod namespace;
pub mod watch;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use confwatch_core::{settings, HttpGateway, NamespaceId, Settings, WatchKey};
use confwatch_engine::ConfigClient;

/// Registry group used when `--group` is omitted.
pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";

/// Settings resolved for one invocation.
pub struct Session {
    pub settings: Settings,
}

impl Session {
    pub fn load(server: Option<String>) -> Result<Self> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let mut settings = settings::load_at(&home).with_context(|| {
            format!(
                "failed to load {}",
                settings::settings_path_at(&home).display()
            )
        })?;
        settings.apply_server_override(server);
        Ok(Self { settings })
    }

    pub fn client(&self) -> ConfigClient {
        let gateway = HttpGateway::from_settings(&self.settings);
        ConfigClient::new(Arc::new(gateway)).with_page_size(self.settings.page_size)
    }
}

/// `--namespace / --group / --data-id` triple.
#[derive(Args, Debug, Clone)]
pub struct KeyArgs {
    /// Namespace id; omit for the public namespace.
    #[arg(long, short = 'n', default_value = "")]
    pub namespace: String,

    #[arg(long, short = 'g', default_value = DEFAULT_GROUP)]
    pub group: String,

    #[arg(long = "data-id", short = 'd')]
    pub data_id: String,
}

impl KeyArgs {
    pub fn key(&self) -> WatchKey {
        WatchKey::new(
            namespace_id(&self.namespace),
            self.group.trim(),
            self.data_id.trim(),
        )
    }
}

/// Positional key written as `group/data-id` or `namespace/group/data-id`.
/// The namespace `public` denotes the default namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyArg(pub WatchKey);

impl FromStr for KeyArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').map(str::trim).collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(format!("invalid key '{s}': empty segment"));
        }
        let (namespace, group, data_id) = match parts.as_slice() {
            [group, data_id] => ("", *group, *data_id),
            [namespace, group, data_id] => (*namespace, *group, *data_id),
            _ => {
                return Err(format!(
                    "invalid key '{s}'; expected group/data-id or namespace/group/data-id"
                ))
            }
        };
        Ok(Self(WatchKey::new(namespace_id(namespace), group, data_id)))
    }
}

impl fmt::Display for KeyArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// `public` and the empty string both name the default namespace.
pub fn namespace_id(raw: &str) -> NamespaceId {
    match raw.trim() {
        "public" => NamespaceId::default(),
        other => NamespaceId::from(other),
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?
    );
    Ok(())
}
