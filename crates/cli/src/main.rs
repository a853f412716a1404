//! opshell CLI
//!
//! Command-line diagnostics for a running opshell daemon.
//!
//! The CLI attaches to the daemon as if it were a window content and
//! issues synchronous requests, printing the JSON answers. It binds to
//! a window id because every request is answered from the view of the
//! asking window.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opshell_ipc::{Envelope, GetWindowRequestInfo, SyncRequest, DEFAULT_PORT};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(name = "opshell-cli")]
#[command(author, version, about = "Inspect a running opshell daemon")]
struct Cli {
    /// TCP port the daemon listens on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Window id to attach as.
    #[arg(long, default_value_t = 1)]
    window: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query daemon state
    Query {
        #[command(subcommand)]
        what: QueryType,
    },
}

#[derive(Subcommand)]
enum QueryType {
    /// The client identification
    Client,
    /// The application info
    AppInfo,
    /// The default configuration document
    DefaultConfiguration,
    /// All manager windows
    Windows,
    /// The communication rules
    Rules,
    /// The stored UI synchronization state
    UiState,
    /// Whether closed mode is active
    ClosedMode,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let request = match cli.command {
        Commands::Query { what } => match what {
            QueryType::Client => SyncRequest::GetClientIdentification,
            QueryType::AppInfo => SyncRequest::GetAppInfo,
            QueryType::DefaultConfiguration => SyncRequest::GetDefaultConfiguration,
            QueryType::Windows => SyncRequest::GetWindowsInfo(GetWindowRequestInfo {
                include_own_window: true,
                include_detached_event: true,
            }),
            QueryType::Rules => SyncRequest::GetCommunicationRules,
            QueryType::UiState => SyncRequest::GetUiState,
            QueryType::ClosedMode => SyncRequest::IsClosedModeActive,
        },
    };

    let value = send_request(cli.port, cli.window, request).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Attach, send one synchronous request and wait for its reply.
async fn send_request(port: u16, window: u64, request: SyncRequest) -> Result<serde_json::Value> {
    let stream = TcpStream::connect(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to connect to the daemon on port {port} (is it running?)"))?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let attach = Envelope::Attach { window_id: window };
    writer.write_all(wire_line(&attach)?.as_bytes()).await?;

    let request_id = 1;
    let sync = Envelope::Sync {
        id: request_id,
        request,
    };
    writer.write_all(wire_line(&sync)?.as_bytes()).await?;

    // Skip pushed events until the reply with our id arrives.
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            anyhow::bail!("daemon closed the connection before replying");
        }
        match Envelope::from_line(line.trim()) {
            Ok(Envelope::Reply { id, value }) if id == request_id => return Ok(value),
            Ok(_) => continue,
            Err(e) => anyhow::bail!("malformed reply from daemon: {e}"),
        }
    }
}

fn wire_line(envelope: &Envelope) -> Result<String> {
    let mut line = envelope.to_line()?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
