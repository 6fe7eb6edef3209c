use std::path::{Path, PathBuf};
use std::time::Duration;

pub use confwatch_core::settings::confwatch_root;

pub const DAEMON_SOCKET: &str = "daemon.sock";

/// Changes kept in memory for `status`.
pub const JOURNAL_CAPACITY: usize = 256;

/// How long pollers get to exit once the daemon is stopping.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub fn socket_path(home: &Path) -> PathBuf {
    confwatch_root(home).join(DAEMON_SOCKET)
}
