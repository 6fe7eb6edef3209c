//! `confwatch namespace list` and `confwatch namespace create <id>`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use confwatch_core::CreateOutcome;

use super::{namespace_id, print_json, Session};

#[derive(Subcommand, Debug)]
pub enum NamespaceCommand {
    /// List namespaces known to the registry.
    List {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Create a namespace. Succeeds when it already exists.
    Create(CreateArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Namespace id.
    pub id: String,

    /// Display name; defaults to the id.
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Tabled)]
struct NamespaceRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "configs")]
    configs: u32,
    #[tabled(rename = "quota")]
    quota: u32,
    #[tabled(rename = "description")]
    description: String,
}

pub fn run(session: &Session, command: NamespaceCommand) -> Result<()> {
    match command {
        NamespaceCommand::List { json } => list(session, json),
        NamespaceCommand::Create(args) => create(session, args),
    }
}

fn list(session: &Session, json: bool) -> Result<()> {
    let namespaces = session
        .client()
        .list_namespaces()
        .context("failed to list namespaces")?;
    if json {
        return print_json(&namespaces);
    }
    if namespaces.is_empty() {
        println!("No namespaces.");
        return Ok(());
    }

    let rows: Vec<NamespaceRow> = namespaces
        .into_iter()
        .map(|ns| NamespaceRow {
            id: ns.id.to_string(),
            name: ns.display_name,
            configs: ns.config_count,
            quota: ns.quota,
            description: ns.description.unwrap_or_default(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn create(session: &Session, args: CreateArgs) -> Result<()> {
    let id = namespace_id(&args.id);
    if id.is_public() {
        anyhow::bail!("the public namespace always exists");
    }
    let name = args.name.unwrap_or_else(|| id.0.clone());
    let outcome = session
        .client()
        .create_namespace(&id, &name, &args.description)
        .with_context(|| format!("failed to create namespace '{id}'"))?;
    match outcome {
        CreateOutcome::Created => println!("{} namespace '{id}'", "created".green()),
        CreateOutcome::AlreadyExists => {
            println!("{} namespace '{id}'", "already exists:".yellow())
        }
    }
    Ok(())
}
