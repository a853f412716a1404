//! opshell daemon
//!
//! Main process of the opshell desktop shell.
//!
//! Responsibilities:
//! - Maintain the multi-monitor configuration store
//! - Create and place the manager windows
//! - Route messages between the window contents
//! - Negotiate window closing with the contents
//! - Persist the configuration documents

mod close;
mod persist;
mod registry;
mod router;
mod settings;

use anyhow::Result;
use clap::Parser;
use close::{CloseController, CloseHost};
use opshell_core_config::ConfigurationStore;
use opshell_ipc::{AppInfo, BrandInfo, ClientIdentifier, Envelope, DEFAULT_PORT};
use opshell_platform::{SimWindowSystem, WindowSystem, WindowSystemEvent};
use persist::ConfigurationFiles;
use registry::{CloseDecision, ContentGateway, WindowRegistry};
use router::MessageHub;
use settings::Settings;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Events the shell event loop processes.
enum ShellEvent {
    /// A window lifecycle event from the window system.
    WindowSystem(WindowSystemEvent),
}

#[derive(Parser, Debug)]
#[command(name = "opshell", about = "Desktop shell for the opshell management client")]
struct Args {
    /// Run in closed mode: the window layout is fixed.
    #[arg(long)]
    closed_mode: bool,

    /// Path to a settings file, overriding the standard locations.
    #[arg(long)]
    config: Option<PathBuf>,

    /// TCP port to listen on for content windows.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => Settings::load_from_path(path)?,
        None => Settings::load().unwrap_or_else(|e| {
            eprintln!("Failed to load settings: {}. Using defaults.", e);
            Settings::default()
        }),
    };

    let log_level = match settings.behavior.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    // RUST_LOG overrides the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Make sure a crash still ends up in the log.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!("panic in the shell process: {info}");
        default_hook(info);
    }));

    info!("opshell daemon starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let closed_mode = args.closed_mode || settings.session.closed_mode;
    let port = args.port.unwrap_or(settings.behavior.port);

    let (window_system, system_events) = SimWindowSystem::new();
    let window_system = Arc::new(window_system);
    let store = Arc::new(Mutex::new(ConfigurationStore::new(closed_mode)));
    let files = Arc::new(ConfigurationFiles::new());

    let registry = Arc::new(WindowRegistry::new(
        window_system.clone(),
        store.clone(),
        AppInfo {
            app_locale: settings.session.active_language.clone(),
            active_language: Some(settings.session.active_language.clone()),
            user_info: None,
        },
    ));
    registry.set_default_window_size(
        settings.windows.default_width,
        settings.windows.default_height,
    );

    let hub = Arc::new(MessageHub::new(
        registry.clone(),
        store.clone(),
        window_system.clone(),
        files,
        ClientIdentifier {
            client_id: settings.session.client_id.clone(),
            host_name: host_name(),
        },
        BrandInfo {
            brand_name: "opshell".to_string(),
            brand_display_name: "opshell".to_string(),
            landing_image: "landing.png".to_string(),
        },
    ));

    let gateway: Arc<dyn ContentGateway> = hub.clone();
    let host: Arc<dyn CloseHost> = registry.clone();
    registry.inject(gateway, CloseController::new(host));

    // Configuration changes go to disk and to the main window content.
    {
        let mut store = store.lock().unwrap_or_else(|e| e.into_inner());
        let hub_current = hub.clone();
        store.subscribe_current_changed(move |config| {
            hub_current.publish_current_configuration(config);
        });
        let hub_default = hub.clone();
        store.subscribe_default_changed(move |config| {
            hub_default.publish_default_configuration(config);
        });
        let hub_info = hub.clone();
        store.subscribe_manager_info(move |config_id, info| {
            hub_info.publish_manager_info(config_id, info);
        });
    }

    if registry.new_main_manager_window().is_none() {
        error!("could not create the main manager window");
        return Ok(());
    }

    let (event_tx, mut event_rx) = mpsc::channel::<ShellEvent>(100);

    // Forward window system events from the std channel into the loop.
    let forward_handle = spawn_forwarding_thread("winsys-fwd", system_events, event_tx.clone())?;

    // Accept content window connections.
    {
        let hub = hub.clone();
        tokio::spawn(async move {
            run_message_server(port, hub).await;
        });
    }

    info!(port, closed_mode, "opshell daemon ready");

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(ShellEvent::WindowSystem(event)) => {
                        handle_window_system_event(&registry, &hub, &window_system, event);
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    drop(event_rx);
    let _ = forward_handle;
    info!("opshell daemon stopped");
    Ok(())
}

fn handle_window_system_event(
    registry: &Arc<WindowRegistry>,
    hub: &Arc<MessageHub>,
    window_system: &Arc<SimWindowSystem>,
    event: WindowSystemEvent,
) {
    match event {
        WindowSystemEvent::CloseRequested(window) => {
            match registry.handle_close_requested(window) {
                CloseDecision::Allow => {
                    if let Err(e) = window_system.close_window(window) {
                        warn!(window, "failed to close window: {e}");
                    }
                }
                CloseDecision::Prevent => {
                    debug!(window, "close request deferred to negotiation");
                }
            }
        }
        WindowSystemEvent::Closed(window) => {
            registry.handle_window_closed(window);
            hub.detach(window);
        }
        WindowSystemEvent::Moved(window) => {
            registry.record_live_position(window);
        }
        WindowSystemEvent::DisplaysChanged => {
            debug!("display topology changed");
        }
    }
}

/// Spawn a named forwarding thread that receives events from a
/// std::sync::mpsc channel and forwards them to the tokio event loop.
fn spawn_forwarding_thread(
    thread_name: &str,
    receiver: std::sync::mpsc::Receiver<WindowSystemEvent>,
    sender: mpsc::Sender<ShellEvent>,
) -> Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name(thread_name.to_string())
        .spawn(move || {
            while let Ok(event) = receiver.recv() {
                if sender.blocking_send(ShellEvent::WindowSystem(event)).is_err() {
                    break;
                }
            }
        })
        .map_err(|e| anyhow::anyhow!("Failed to spawn {} thread: {}", thread_name, e))
}

async fn run_message_server(port: u16, hub: Arc<MessageHub>) {
    let address = format!("127.0.0.1:{port}");
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {address}: {e}");
            if port == DEFAULT_PORT {
                error!("is another opshell daemon already running?");
            }
            return;
        }
    };
    debug!("listening on {address}");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("failed to accept client connection: {e}");
                continue;
            }
        };
        debug!(%peer, "content connection accepted");
        let hub = hub.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, hub).await {
                warn!("client handler error: {e}");
            }
        });
    }
}

/// Handle one content window connection.
///
/// The first line must attach the connection to a window id; every
/// further line is an event, a synchronous request answered inline, or
/// an asynchronous request answered when its procedure completed.
async fn handle_client(stream: TcpStream, hub: Arc<MessageHub>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    if reader.read_line(&mut line).await? == 0 {
        return Ok(());
    }
    let window = match Envelope::from_line(line.trim()) {
        Ok(Envelope::Attach { window_id }) => window_id,
        Ok(_) => {
            warn!("client did not attach first, dropping connection");
            return Ok(());
        }
        Err(e) => {
            warn!("malformed attach line: {e}");
            return Ok(());
        }
    };

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Envelope>();
    hub.attach(window, outbound_tx.clone());

    // Writer task: pump queued envelopes onto the socket.
    let writer_task = tokio::spawn(async move {
        while let Some(envelope) = outbound_rx.recv().await {
            match envelope.to_line() {
                Ok(mut line) => {
                    line.push('\n');
                    if writer.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("failed to serialize envelope: {e}"),
            }
        }
    });

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match Envelope::from_line(trimmed) {
            Ok(Envelope::Event { message }) => {
                hub.handle_event(window, message).await;
            }
            Ok(Envelope::Sync { id, request }) => {
                let value = hub.handle_sync(window, request);
                let _ = outbound_tx.send(Envelope::Reply { id, value });
            }
            Ok(Envelope::Async { id, request }) => {
                // Long-running procedures must not block this reader;
                // their answers may depend on further inbound messages.
                let hub = hub.clone();
                let outbound_tx = outbound_tx.clone();
                tokio::spawn(async move {
                    let value = hub.handle_async(window, request).await;
                    let _ = outbound_tx.send(Envelope::Reply { id, value });
                });
            }
            Ok(Envelope::Attach { window_id }) => {
                warn!(window, window_id, "connection is already attached");
            }
            Ok(Envelope::Reply { id, .. }) => {
                warn!(window, id, "unexpected reply from content window");
            }
            Err(e) => match classify_unknown_request(trimmed) {
                // A request carrying a message type the protocol does
                // not know still gets a reply so the content does not
                // block on it forever.
                Some(UnknownRequest::Sync { id }) => {
                    error!(window, id, "unknown sync message type: {e}");
                    let _ = outbound_tx.send(Envelope::Reply {
                        id,
                        value: serde_json::Value::Null,
                    });
                }
                Some(UnknownRequest::Async { id }) => {
                    error!(window, id, "unknown async message type: {e}");
                    let outbound_tx = outbound_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        let _ = outbound_tx.send(Envelope::Reply {
                            id,
                            value: serde_json::Value::Null,
                        });
                    });
                }
                None => {
                    error!(window, "malformed message: {e}");
                }
            },
        }
    }

    hub.detach(window);
    writer_task.abort();
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum UnknownRequest {
    Sync { id: u64 },
    Async { id: u64 },
}

/// Extracts the channel and id of a request line the typed protocol
/// could not parse.
fn classify_unknown_request(line: &str) -> Option<UnknownRequest> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    let id = value.get("id")?.as_u64()?;
    match value.get("channel")?.as_str()? {
        "sync" => Some(UnknownRequest::Sync { id }),
        "async" => Some(UnknownRequest::Async { id }),
        _ => None,
    }
}

fn host_name() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sync_message_type_is_classified_for_a_null_reply() {
        let line = r#"{"channel":"sync","id":7,"request":{"messageType":"does-not-exist"}}"#;
        assert!(Envelope::from_line(line).is_err());
        assert_eq!(
            classify_unknown_request(line),
            Some(UnknownRequest::Sync { id: 7 })
        );
    }

    #[test]
    fn unknown_async_message_type_is_classified() {
        let line = r#"{"channel":"async","id":3,"request":{"messageType":"mystery"}}"#;
        assert_eq!(
            classify_unknown_request(line),
            Some(UnknownRequest::Async { id: 3 })
        );
    }

    #[test]
    fn garbage_lines_are_not_classified() {
        assert!(classify_unknown_request("not json").is_none());
        assert!(classify_unknown_request(r#"{"channel":"event","message":{}}"#).is_none());
    }
}
