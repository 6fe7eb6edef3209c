//! `confwatch watch` — foreground watcher printing one line per change.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use confwatch_engine::{ChangeEvent, PollSettings};

use super::{KeyArg, Session};

/// How long pollers get to finish after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Keys as `group/data-id` or `namespace/group/data-id`.
    #[arg(required = true, value_name = "KEY")]
    pub keys: Vec<KeyArg>,

    /// Poll interval in seconds; defaults to the settings file value.
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Print each change as a JSON line.
    #[arg(long)]
    pub json: bool,
}

impl WatchArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        init_tracing();
        let mut poll = PollSettings::from(&session.settings);
        if let Some(secs) = self.interval {
            poll.interval = Duration::from_secs(secs.max(1));
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        runtime.block_on(self.watch_until_interrupted(session, poll))
    }

    async fn watch_until_interrupted(self, session: &Session, poll: PollSettings) -> Result<()> {
        let registry = session
            .client()
            .watch_registry(poll)
            .context("failed to start watch registry")?;

        let json = self.json;
        for KeyArg(key) in &self.keys {
            registry
                .watch(key.clone(), move |event: &ChangeEvent| print_event(event, json))
                .with_context(|| format!("failed to watch {key}"))?;
        }
        eprintln!(
            "{} {} key(s) every {:?} on {}; Ctrl-C to stop",
            "watching".green(),
            self.keys.len(),
            poll.interval,
            session.settings.server_address,
        );

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")?;
        let report = registry.shutdown(SHUTDOWN_GRACE).await;
        eprintln!(
            "stopped {} poller(s){}",
            report.stopped,
            if report.aborted > 0 {
                format!(", aborted {}", report.aborted)
            } else {
                String::new()
            }
        );
        Ok(())
    }
}

fn print_event(event: &ChangeEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::error!(error = %err, "failed to encode change event"),
        }
        return;
    }

    let when = event.observed_at.format("%Y-%m-%d %H:%M:%S");
    let fingerprint = event.fingerprint.as_str();
    println!(
        "{} {} {}",
        when.to_string().bright_black(),
        event.key.to_string().bold(),
        fingerprint.get(..12).unwrap_or(fingerprint).bright_black(),
    );
    match event.snapshot.content() {
        Some(content) => println!("{content}"),
        None if event.snapshot.is_empty() => println!("{}", "(deleted or empty)".yellow()),
        None => match serde_json::to_string_pretty(&event.snapshot) {
            Ok(body) => println!("{body}"),
            Err(err) => tracing::error!(error = %err, "failed to encode snapshot"),
        },
    }
}

/// Log to stderr so change output on stdout stays clean.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
