use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::broadcast;

use confwatch_core::{settings, HttpGateway, PublishRequest, RegistryGateway, Settings, WatchKey};
use confwatch_engine::{ChangeEvent, ConfigClient, PollSettings, WatchHandle, WatchRegistry};

use crate::error::{io_err, DaemonError};
use crate::journal::ChangeJournal;
use crate::paths::{confwatch_root, socket_path, JOURNAL_CAPACITY, SHUTDOWN_GRACE};
use crate::protocol::{DaemonRequest, DaemonResponse};

/// Journal entries included in a `status` response.
const STATUS_RECENT_CHANGES: usize = 20;

/// Everything a socket client can reach.
struct DaemonState {
    home: PathBuf,
    server: String,
    started_at_unix: u64,
    client: ConfigClient,
    registry: WatchRegistry,
    journal: Arc<ChangeJournal>,
    /// The daemon's own listener per watched key.
    handles: Mutex<HashMap<WatchKey, WatchHandle>>,
}

impl DaemonState {
    /// Watch `key` with the logging listener. Returns `false` if already watched.
    fn watch(&self, key: WatchKey) -> Result<bool, DaemonError> {
        let mut handles = self.handles.lock();
        if handles.contains_key(&key) {
            return Ok(false);
        }
        let journal = self.journal.clone();
        let handle = self
            .registry
            .watch(key.clone(), move |event: &ChangeEvent| {
                tracing::info!(
                    key = %event.key,
                    fingerprint = %event.fingerprint,
                    content = event.snapshot.content().unwrap_or(""),
                    "config updated",
                );
                journal.record(event);
            })?;
        handles.insert(key, handle);
        Ok(true)
    }

    fn unwatch(&self, key: &WatchKey) -> bool {
        match self.handles.lock().remove(key) {
            Some(handle) => self.registry.unwatch(&handle),
            None => false,
        }
    }
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon against the registry named in `<home>/.confwatch/config.yaml`.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    let settings = settings::load_at(&home)?;
    let gateway = HttpGateway::from_settings(&settings);
    run_with_gateway(home, Arc::new(gateway), settings).await
}

/// Run the daemon with an explicit gateway until `stop` or Ctrl-C.
pub async fn run_with_gateway(
    home: PathBuf,
    gateway: Arc<dyn RegistryGateway>,
    settings: Settings,
) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let registry = WatchRegistry::start(gateway.clone(), PollSettings::from(&settings))?;
    let state = Arc::new(DaemonState {
        home: home.clone(),
        server: settings.server_address.clone(),
        started_at_unix: unix_seconds_now(),
        client: ConfigClient::new(gateway).with_page_size(settings.page_size),
        registry: registry.clone(),
        journal: Arc::new(ChangeJournal::new(JOURNAL_CAPACITY)),
        handles: Mutex::new(HashMap::new()),
    });

    for key in &settings.watches {
        state.watch(key.clone())?;
    }
    tracing::info!(
        server = %state.server,
        watches = settings.watches.len(),
        interval = ?registry.settings().interval,
        "confwatch daemon started",
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = socket_server_task(state, shutdown.clone(), shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (socket_result, signal_result) = tokio::join!(socket_handle, signal_handle);

    let report = registry.shutdown(SHUTDOWN_GRACE).await;
    tracing::info!(
        stopped = report.stopped,
        aborted = report.aborted,
        "confwatch daemon stopped",
    );

    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn socket_server_task(
    state: Arc<DaemonState>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&state.home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening for control requests");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let state = state.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    let (reader, writer) = stream.into_split();
                    if let Err(err) = handle_client(reader, writer, state, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_client<R, W>(
    reader: R,
    mut writer: W,
    state: Arc<DaemonState>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = match request.cmd.as_str() {
            "status" => DaemonResponse::ok(build_status_payload(&state)),
            "watch" => handle_watch(&state, &request),
            "unwatch" => handle_unwatch(&state, &request),
            "publish" => handle_publish(&state, &request).await,
            "stop" => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
            other => DaemonResponse::error(format!("unknown command '{other}'")),
        };

        write_response(&mut writer, &response).await?;
        if request.cmd == "stop" {
            break;
        }
    }

    Ok(())
}

fn handle_watch(state: &DaemonState, request: &DaemonRequest) -> DaemonResponse {
    let key = match request.watch_key() {
        Ok(key) => key,
        Err(message) => return DaemonResponse::error(message),
    };
    match state.watch(key.clone()) {
        Ok(added) => DaemonResponse::ok(json!({ "key": key, "added": added })),
        Err(err) => DaemonResponse::error(err.to_string()),
    }
}

fn handle_unwatch(state: &DaemonState, request: &DaemonRequest) -> DaemonResponse {
    match request.watch_key() {
        Ok(key) => {
            let removed = state.unwatch(&key);
            DaemonResponse::ok(json!({ "key": key, "removed": removed }))
        }
        Err(message) => DaemonResponse::error(message),
    }
}

async fn handle_publish(state: &DaemonState, request: &DaemonRequest) -> DaemonResponse {
    let key = match request.watch_key() {
        Ok(key) => key,
        Err(message) => return DaemonResponse::error(message),
    };
    let Some(content) = request.content.clone() else {
        return DaemonResponse::error("missing required field 'content'");
    };

    let client = state.client.clone();
    let publish = PublishRequest::new(key.clone(), content);
    let published = tokio::task::spawn_blocking(move || client.publish(&publish))
        .await
        .map_err(|err| DaemonError::Protocol(format!("publish task join error: {err}")))
        .and_then(|result| result.map_err(DaemonError::from));
    if let Err(err) = published {
        return DaemonResponse::error(err.to_string());
    }

    match state.watch(key.clone()) {
        Ok(added) => DaemonResponse::ok(json!({
            "key": key,
            "published": true,
            "watch_added": added,
        })),
        Err(err) => DaemonResponse::error(format!("published, but watch failed: {err}")),
    }
}

fn build_status_payload(state: &DaemonState) -> Value {
    json!({
        "running": true,
        "server": state.server,
        "started_at_unix": state.started_at_unix,
        "poll_interval_secs": state.registry.settings().interval.as_secs(),
        "socket": socket_path(&state.home).display().to_string(),
        "watches": state.registry.status(),
        "changes_total": state.journal.total(),
        "recent_changes": state.journal.recent(STATUS_RECENT_CHANGES),
    })
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = confwatch_root(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    Ok(())
}

async fn write_response<W>(writer: &mut W, response: &DaemonResponse) -> Result<(), DaemonError>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use confwatch_core::InMemoryGateway;
    use tempfile::TempDir;
    use tokio_test::io::Builder;

    fn state(home: &Path) -> Arc<DaemonState> {
        let gateway = Arc::new(InMemoryGateway::new());
        let registry = WatchRegistry::start(gateway.clone(), PollSettings::default())
            .expect("registry");
        Arc::new(DaemonState {
            home: home.to_path_buf(),
            server: "memory".to_string(),
            started_at_unix: 1_000_000,
            client: ConfigClient::new(gateway),
            registry,
            journal: Arc::new(ChangeJournal::new(4)),
            handles: Mutex::new(HashMap::new()),
        })
    }

    async fn exchange(state: Arc<DaemonState>, request: &str, response: &str) {
        let stream = Builder::new()
            .read(request.as_bytes())
            .write(response.as_bytes())
            .build();
        let (reader, writer) = tokio::io::split(stream);
        let (shutdown_tx, _) = broadcast::channel(1);
        handle_client(reader, writer, state, shutdown_tx)
            .await
            .expect("client session");
    }

    #[tokio::test]
    async fn unknown_command_is_reported() {
        let home = TempDir::new().expect("home");
        exchange(
            state(home.path()),
            "{\"cmd\":\"bogus\"}\n",
            "{\"ok\":false,\"error\":\"unknown command 'bogus'\"}\n",
        )
        .await;
    }

    #[tokio::test]
    async fn watch_without_data_id_is_rejected() {
        let home = TempDir::new().expect("home");
        exchange(
            state(home.path()),
            "{\"cmd\":\"watch\",\"group\":\"G\"}\n",
            "{\"ok\":false,\"error\":\"missing required field 'data_id'\"}\n",
        )
        .await;
    }

    #[tokio::test]
    async fn watch_is_idempotent_per_key() {
        let home = TempDir::new().expect("home");
        let state = state(home.path());
        let key = WatchKey::new("t1", "G", "D");

        assert!(state.watch(key.clone()).expect("watch"));
        assert!(!state.watch(key.clone()).expect("watch again"));
        assert_eq!(state.registry.listener_count(&key), 1);

        assert!(state.unwatch(&key));
        assert!(!state.unwatch(&key));
        assert!(!state.registry.is_watching(&key));
    }

    #[tokio::test]
    async fn status_payload_lists_watches_and_changes() {
        let home = TempDir::new().expect("home");
        let state = state(home.path());
        state.watch(WatchKey::new("t1", "G", "D")).expect("watch");

        let payload = build_status_payload(&state);
        assert_eq!(payload["running"], json!(true));
        assert_eq!(payload["started_at_unix"], json!(1_000_000u64));
        assert_eq!(payload["poll_interval_secs"], json!(30));
        assert_eq!(payload["watches"][0]["listeners"], json!(1));
        assert_eq!(payload["watches"][0]["key"]["data_id"], json!("D"));
        assert_eq!(payload["changes_total"], json!(0));
        assert!(payload["recent_changes"].as_array().expect("array").is_empty());
    }

    #[tokio::test]
    async fn publish_writes_then_watches() {
        let home = TempDir::new().expect("home");
        let state = state(home.path());
        let request = DaemonRequest {
            content: Some("k=v1".to_string()),
            ..DaemonRequest::for_key("publish", &WatchKey::new("t1", "G", "D"))
        };

        let response = handle_publish(&state, &request).await;
        assert!(response.ok, "{:?}", response.error);
        let data = response.data.expect("data");
        assert_eq!(data["watch_added"], json!(true));
        assert!(state.registry.is_watching(&WatchKey::new("t1", "G", "D")));
        assert_eq!(
            state
                .client
                .get_config(&WatchKey::new("t1", "G", "D"))
                .expect("get")
                .content(),
            Some("k=v1")
        );
    }

    #[tokio::test]
    async fn publish_requires_content() {
        let home = TempDir::new().expect("home");
        let response = handle_publish(
            &state(home.path()),
            &DaemonRequest::for_key("publish", &WatchKey::new("t1", "G", "D")),
        )
        .await;
        assert_eq!(
            response.error.as_deref(),
            Some("missing required field 'content'")
        );
    }
}
