//! Confwatch daemon: a long-running watch registry behind a Unix-socket control protocol.

mod error;
pub mod journal;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use journal::{ChangeJournal, JournalEntry};
pub use protocol::{
    request_publish, request_status, request_stop, request_unwatch, request_watch, send_request,
    DaemonRequest, DaemonResponse,
};
pub use runtime::{run, run_with_gateway, start_blocking};
