//! Confwatch — configuration registry client and change watcher.
//!
//! # Usage
//!
//! ```text
//! confwatch [--server <url>] namespace list|create <id>
//! confwatch config get -n <ns> -g <group> -d <data-id>
//! confwatch config publish -n <ns> -g <group> -d <data-id> <content> [--create-namespace]
//! confwatch groups [-n <ns>] [--json]
//! confwatch data-ids -g <group> [<search>] [--fuzzy] [--all]
//! confwatch watch <ns/group/data-id>...
//! confwatch daemon start|stop|status|watch|unwatch|publish
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    config::ConfigCommand, daemon::DaemonCommand, data_ids::DataIdsArgs, groups::GroupsArgs,
    namespace::NamespaceCommand, watch::WatchArgs, Session,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "confwatch",
    version,
    about = "Read, publish and watch configuration in a remote registry",
    long_about = None,
)]
struct Cli {
    /// Registry address (overrides the settings file and CONFWATCH_SERVER).
    #[arg(long, global = true, value_name = "URL")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List or create namespaces.
    Namespace {
        #[command(subcommand)]
        command: NamespaceCommand,
    },

    /// Read or publish a configuration entry.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// List every group in a namespace, across all listing pages.
    Groups(GroupsArgs),

    /// List data ids in a group.
    DataIds(DataIdsArgs),

    /// Watch entries in the foreground and print each change until Ctrl-C.
    Watch(WatchArgs),

    /// Manage the background watch daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Namespace { command } => {
            commands::namespace::run(&Session::load(cli.server)?, command)
        }
        Commands::Config { command } => commands::config::run(&Session::load(cli.server)?, command),
        Commands::Groups(args) => args.run(&Session::load(cli.server)?),
        Commands::DataIds(args) => args.run(&Session::load(cli.server)?),
        Commands::Watch(args) => args.run(&Session::load(cli.server)?),
        Commands::Daemon { command } => commands::daemon::run(command, cli.server),
    }
}
