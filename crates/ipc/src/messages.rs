//! The message catalog.
//!
//! Window contents and the main process exchange messages on three
//! channels: fire-and-forget events, synchronous requests answered
//! inline, and asynchronous requests answered when the triggered
//! procedure completes. Tags and payload field names follow the wire
//! schema (kebab-case tags, camelCase payloads).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use opshell_core_config::{
    CommunicationRule, ManagerInfo, ManagerType, MultiMonitorConfiguration, ObjectNode,
};

/// Fire-and-forget messages, both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", content = "data", rename_all = "kebab-case")]
pub enum EventMessage {
    // renderer -> main
    /// First message of the main window's content after sign-in.
    BootstrapApplication(BootstrapInfo),
    StartAdditionalSystemManager,
    /// Detach the event list into its own manager window; the payload
    /// is the event context to show there.
    DetachEventManager(Value),
    ResumeEventManager,
    /// The content finished wiring its message handlers.
    CommunicationChannelReady,
    SendEvent(Value),
    SendObjectToMain(Value),
    SendObjectToWindow {
        #[serde(rename = "destinationWinId")]
        destination_win_id: u64,
        object: Value,
    },
    SendObjectToAllWindows(Value),
    SynchronizeUiState(SyncData),
    /// Payload: whether users may overrule the saved default.
    SaveCurrentConfigurationAsDefault(bool),
    SetActiveLayout(ActiveLayoutInfo),
    SetActiveLanguage(String),
    SetStartupNode(String),
    SetWindowTitle(String),
    EditCommunicationRules,
    SaveCommunicationRules(Vec<CommunicationRule>),
    CloseCommunicationRulesEditor,
    ReloadApplication,
    ReloadPage,
    CanWindowBeClosedReply(WindowCloseInfo),
    ViewCertificate(String),
    ImportCertificate(String),
    AcceptCertificateAndReload(CertificateAcceptance),
    DenyCertificateAndClose(String),
    TestEndpointAddress(String),
    ConfigureEndpointAddress,
    QuitAndInstallUpdate,
    RemindLaterForUpdate(ClientUpdateInfo),

    // main -> renderer
    ManagerInfoCurrentConfigurationChanged(ManagerInfo),
    CurrentMmConfigurationChanged(MultiMonitorConfigurationInfo),
    DefaultMmConfigurationChanged(MultiMonitorConfigurationInfo),
    CanWindowBeClosed(WindowCloseInfo),
    ShowBackDrop(ShowBackDropInfo),
    Focus(bool),
    SendTrace(TraceInfo),
    ConnectionError(ConnectionErrorInfo),
    CertificateError(CertificateErrorInfo),
    UpdateAvailable(ClientUpdateInfo),
}

/// Requests answered inline with a JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", content = "data", rename_all = "kebab-case")]
pub enum SyncRequest {
    GetClientIdentification,
    GetAppInfo,
    GetDefaultConfiguration,
    GetManagerInfoOfCurrentConfiguration,
    IsMainManager,
    IsManagerWithEvent,
    IsDefaultConfigurationChangeAllowed,
    IsCurrentConfigurationChangeAllowed,
    IsUserConfigurationChangeAllowed,
    IsClosedModeActive,
    GetCurrentCertificateError,
    GetCurrentConnectionError,
    SaveEndpointAddress(String),
    ReadEndpointAddress,
    GetClientUpdateInfo,
    GetBrandInfo,
    /// Payload: zoom percentage to apply, or none to only query.
    /// Answered with the applied percentage.
    SetZoom(Option<f64>),
    GetUiState,
    GetCommunicationRules,
    /// Answered with the runtime id of the target window, if a rule
    /// matched.
    MatchCommunicationRules(ObjectNode),
    GetWindowsInfo(GetWindowRequestInfo),
    GetOwnWindowInfo,
}

/// Requests answered once the triggered procedure finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", content = "data", rename_all = "kebab-case")]
pub enum AsyncRequest {
    DoShutdownProcedure(ShutdownInfo),
    ResetToDefaultConfiguration,
    EditEndpointAddress,
    CaptureWindows(CaptureWindowRequestInfo),
}

// ---------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user: String,
    pub user_language: String,
    pub has_configure_right: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapInfo {
    pub user_info: UserInfo,
    pub endpoint_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_configuration: Option<MultiMonitorConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_configuration: Option<MultiMonitorConfiguration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub app_locale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIdentifier {
    pub client_id: String,
    pub host_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiMonitorConfigurationInfo {
    pub client_id: ClientIdentifier,
    pub configuration: MultiMonitorConfiguration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownInfo {
    pub skip_dirty_check: bool,
    pub close_main_window: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowCloseInfo {
    pub context_id: u64,
    #[serde(default)]
    pub can_window_be_closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShowBackDropReason {
    #[serde(rename = "logoff")]
    Logoff,
    #[serde(rename = "close")]
    Close,
    #[serde(rename = "apply-default")]
    ApplyDefault,
    #[serde(rename = "none")]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowBackDropInfo {
    pub show: bool,
    pub reason: ShowBackDropReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveLayoutInfo {
    pub frame_id: String,
    pub view_id: String,
    pub layout_id: String,
}

/// UI state synchronization payload. The state itself stays a free-form
/// JSON object; the router merges it property by property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncData {
    pub send_to_itself: bool,
    pub state: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetWindowRequestInfo {
    pub include_own_window: bool,
    pub include_detached_event: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    pub window_id: u64,
    pub manager_window_id: String,
    pub manager_type: ManagerType,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureWindowRequestInfo {
    pub include_own_window: bool,
    pub include_thumbnail: bool,
    pub include_detached_event: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureWindowInfo {
    pub window_info: WindowInfo,
    pub source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb_nail_data_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandInfo {
    pub brand_name: String,
    pub brand_display_name: String,
    pub landing_image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUpdateInfo {
    pub application_name: String,
    pub current_version: String,
    pub new_version: String,
    pub release_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionErrorInfo {
    pub host_url: String,
    pub error_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateErrorInfo {
    pub host_url: String,
    pub subject_name: String,
    pub serial_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAcceptance {
    pub host_url: String,
    pub persist_acceptance: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceType {
    Info,
    Warn,
    Debug,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceInfo {
    pub trace_type: TraceType,
    pub message: String,
}
