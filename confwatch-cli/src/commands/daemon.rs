//! `confwatch daemon` — background watcher lifecycle and control.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use confwatch_core::settings::SERVER_ENV;
use confwatch_daemon::paths::socket_path;
use confwatch_daemon::{
    request_publish, request_status, request_stop, request_unwatch, request_watch,
    start_blocking, DaemonError,
};

use super::KeyArgs;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (watch registry + socket server).
    Start,
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query daemon status over the Unix socket.
    Status {
        /// Emit the raw status JSON.
        #[arg(long)]
        json: bool,
    },
    /// Ask the daemon to watch an entry.
    Watch(KeyArgs),
    /// Ask the daemon to stop watching an entry.
    Unwatch(KeyArgs),
    /// Publish through the daemon, which then watches the entry.
    Publish(DaemonPublishArgs),
}

#[derive(Args, Debug)]
pub struct DaemonPublishArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    pub content: String,
}

#[derive(Tabled)]
struct WatchRow {
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "listeners")]
    listeners: u64,
    #[tabled(rename = "polls")]
    polls: u64,
    #[tabled(rename = "failures")]
    failures: u64,
    #[tabled(rename = "changes")]
    changes: u64,
    #[tabled(rename = "last change")]
    last_change: String,
}

pub fn run(command: DaemonCommand, server: Option<String>) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;

    match command {
        DaemonCommand::Start => {
            if let Some(server) = server {
                std::env::set_var(SERVER_ENV, server);
            }
            start_blocking(&home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status { json } => match request_status(&home) {
            Ok(status) if json => print_pretty(&status)?,
            Ok(status) => print_status(&status),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                let payload = serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                });
                print_pretty(&payload)?;
            }
            Err(err) => return Err(err).context("failed to query daemon status"),
        },
        DaemonCommand::Watch(args) => {
            let key = args.key();
            let reply = request_watch(&home, &key)
                .with_context(|| format!("failed to watch {key} via daemon"))?;
            if reply["added"] == Value::Bool(true) {
                println!("{} {key}", "watching".green());
            } else {
                println!("already watching {key}");
            }
        }
        DaemonCommand::Unwatch(args) => {
            let key = args.key();
            let reply = request_unwatch(&home, &key)
                .with_context(|| format!("failed to unwatch {key} via daemon"))?;
            if reply["removed"] == Value::Bool(true) {
                println!("{} {key}", "stopped watching".green());
            } else {
                println!("{key} was not watched");
            }
        }
        DaemonCommand::Publish(args) => {
            let key = args.key.key();
            request_publish(&home, &key, &args.content)
                .with_context(|| format!("failed to publish {key} via daemon"))?;
            println!("{} {key} (now watched by the daemon)", "published".green());
        }
    }

    Ok(())
}

fn print_pretty(value: &Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to render daemon status JSON")?
    );
    Ok(())
}

fn print_status(status: &Value) {
    println!(
        "confwatch daemon v{} | {} | every {}s | {} changes seen",
        env!("CARGO_PKG_VERSION"),
        status["server"].as_str().unwrap_or("?"),
        status["poll_interval_secs"].as_u64().unwrap_or(0),
        status["changes_total"].as_u64().unwrap_or(0),
    );

    let rows: Vec<WatchRow> = status["watches"]
        .as_array()
        .map(|watches| watches.iter().map(watch_row).collect())
        .unwrap_or_default();
    if rows.is_empty() {
        println!("No watches.");
        return;
    }
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn watch_row(watch: &Value) -> WatchRow {
    let key = &watch["key"];
    let namespace = key["namespace"].as_str().filter(|ns| !ns.is_empty());
    WatchRow {
        key: format!(
            "{}/{}/{}",
            namespace.unwrap_or("public"),
            key["group"].as_str().unwrap_or_default(),
            key["data_id"].as_str().unwrap_or_default(),
        ),
        listeners: watch["listeners"].as_u64().unwrap_or(0),
        polls: watch["polls"].as_u64().unwrap_or(0),
        failures: watch["failures"].as_u64().unwrap_or(0),
        changes: watch["changes"].as_u64().unwrap_or(0),
        last_change: watch["last_change_at"]
            .as_str()
            .unwrap_or("-")
            .to_string(),
    }
}
