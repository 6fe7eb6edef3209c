//! `confwatch groups` — every group in a namespace, aggregated across pages.

use anyhow::{Context, Result};
use clap::Args;

use super::{namespace_id, print_json, Session};

#[derive(Args, Debug)]
pub struct GroupsArgs {
    /// Namespace id; omit for the public namespace.
    #[arg(long, short = 'n', default_value = "")]
    pub namespace: String,

    /// Only groups holding this exact data id.
    #[arg(long = "data-id", default_value = "")]
    pub data_id: String,

    /// Only this exact group (useful to test existence).
    #[arg(long, default_value = "")]
    pub group: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl GroupsArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let namespace = namespace_id(&self.namespace);
        let groups = session
            .client()
            .list_all_groups(&namespace, &self.data_id, &self.group)
            .with_context(|| format!("failed to list groups in namespace '{namespace}'"))?;

        if self.json {
            return print_json(&groups);
        }
        if groups.is_empty() {
            println!("No groups in namespace '{namespace}'.");
            return Ok(());
        }
        for group in groups {
            println!("{group}");
        }
        Ok(())
    }
}
