//! opshell message protocol.
//!
//! Window contents connect to the main process over a local TCP socket
//! and exchange newline-delimited JSON envelopes. A content attaches
//! itself to its window first; afterwards it may send events, issue
//! sync/async requests and receive pushed events and replies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod messages;

pub use messages::{
    ActiveLayoutInfo, AppInfo, AsyncRequest, BootstrapInfo, BrandInfo, CaptureWindowInfo,
    CaptureWindowRequestInfo, CertificateAcceptance, CertificateErrorInfo, ClientIdentifier,
    ClientUpdateInfo, ConnectionErrorInfo, EventMessage, GetWindowRequestInfo,
    MultiMonitorConfigurationInfo, ShowBackDropInfo, ShowBackDropReason, ShutdownInfo, SyncData,
    SyncRequest, TraceInfo, TraceType, UserInfo, WindowCloseInfo, WindowInfo,
};

/// TCP port the main process listens on for window contents.
pub const DEFAULT_PORT: u16 = 9723;

/// One line on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "kebab-case")]
pub enum Envelope {
    /// Binds the connection to a window; must be the first line.
    #[serde(rename_all = "camelCase")]
    Attach { window_id: u64 },
    /// Fire-and-forget event.
    Event { message: EventMessage },
    /// Synchronous request; answered inline with the same id.
    Sync { id: u64, request: SyncRequest },
    /// Asynchronous request; answered whenever the procedure finishes.
    Async { id: u64, request: AsyncRequest },
    /// Answer to a sync or async request.
    Reply { id: u64, value: serde_json::Value },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("the first line of a connection must attach a window")]
    NotAttached,
    #[error("window {0} is already attached on another connection")]
    AlreadyAttached(u64),
}

impl Envelope {
    /// Serializes the envelope as a single wire line (no trailing
    /// newline; the transport appends it).
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses one wire line.
    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line.trim())?)
    }
}
