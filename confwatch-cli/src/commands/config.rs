//! `confwatch config get` and `confwatch config publish`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use confwatch_core::{ConfigSnapshot, CreateOutcome, PublishRequest};

use super::{print_json, KeyArgs, Session};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the current content of one entry.
    Get(GetArgs),

    /// Create or overwrite one entry.
    Publish(PublishArgs),
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Print the full detail payload as JSON instead of the content.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Content to publish. Mutually exclusive with --file.
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub content: Option<String>,

    /// Read the content from a file.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Content type reported to the registry (text, yaml, json, properties, ...).
    #[arg(long = "type", default_value = "text")]
    pub content_type: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Comma-separated tags.
    #[arg(long, default_value = "")]
    pub tags: String,

    #[arg(long = "app-name", default_value = "")]
    pub app_name: String,

    /// Create the namespace first when it does not exist.
    #[arg(long)]
    pub create_namespace: bool,
}

pub fn run(session: &Session, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Get(args) => get(session, args),
        ConfigCommand::Publish(args) => publish(session, args),
    }
}

fn get(session: &Session, args: GetArgs) -> Result<()> {
    let key = args.key.key();
    let snapshot = session
        .client()
        .get_config(&key)
        .with_context(|| format!("failed to fetch {key}"))?;

    if args.json {
        return print_json(&snapshot);
    }
    match (&snapshot, snapshot.content()) {
        (_, Some(content)) => println!("{content}"),
        (ConfigSnapshot::Empty, None) => eprintln!("{} {key} has no content", "empty:".yellow()),
        (ConfigSnapshot::Value(value), None) => print_json(value)?,
    }
    Ok(())
}

fn publish(session: &Session, args: PublishArgs) -> Result<()> {
    let key = args.key.key();
    let content = match (args.content, args.file) {
        (Some(content), _) => content,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => anyhow::bail!("no content given"),
    };

    let client = session.client();
    if args.create_namespace {
        let outcome = client
            .ensure_namespace(&key.namespace)
            .with_context(|| format!("failed to ensure namespace '{}'", key.namespace))?;
        if outcome == CreateOutcome::Created {
            println!("{} namespace '{}'", "created".green(), key.namespace);
        }
    }

    let request = PublishRequest {
        content_type: args.content_type,
        description: args.description,
        tags: args.tags,
        app_name: args.app_name,
        ..PublishRequest::new(key.clone(), content)
    };
    client
        .publish(&request)
        .with_context(|| format!("failed to publish {key}"))?;
    println!("{} {key}", "published".green());
    Ok(())
}
