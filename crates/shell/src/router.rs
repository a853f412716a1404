//! Message routing between the shell and the window contents.
//!
//! Each content window attaches over the line-delimited JSON transport
//! and gets an outbound queue here. The hub dispatches the three
//! message channels (events, synchronous requests, asynchronous
//! requests) onto the registry, the configuration store and the window
//! system, and owns the in-flight table for close-negotiation answers.

use crate::persist::ConfigurationFiles;
use crate::registry::{ContentGateway, MainPage, WindowRegistry};
use opshell_core_config::ConfigurationStore;
use opshell_ipc::{
    AsyncRequest, BrandInfo, CertificateErrorInfo, ClientIdentifier, ClientUpdateInfo,
    ConnectionErrorInfo, Envelope, EventMessage, MultiMonitorConfigurationInfo, ShutdownInfo,
    SyncData, SyncRequest, WindowCloseInfo,
};
use opshell_platform::{WindowId, WindowSystem};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Routes messages between content windows and the shell.
pub struct MessageHub {
    registry: Arc<WindowRegistry>,
    store: Arc<Mutex<ConfigurationStore>>,
    window_system: Arc<dyn WindowSystem>,
    files: Arc<ConfigurationFiles>,
    client_id: ClientIdentifier,
    brand: BrandInfo,
    senders: Mutex<HashMap<WindowId, mpsc::UnboundedSender<Envelope>>>,
    /// Every close question carries a fresh context id; answers are
    /// matched back through this table.
    next_context_id: AtomicU64,
    pending_close_answers: Mutex<HashMap<u64, watch::Sender<Option<bool>>>>,
    connection_error: Mutex<Option<ConnectionErrorInfo>>,
    certificate_error: Mutex<Option<CertificateErrorInfo>>,
    update_info: Mutex<Option<ClientUpdateInfo>>,
}

impl MessageHub {
    pub fn new(
        registry: Arc<WindowRegistry>,
        store: Arc<Mutex<ConfigurationStore>>,
        window_system: Arc<dyn WindowSystem>,
        files: Arc<ConfigurationFiles>,
        client_id: ClientIdentifier,
        brand: BrandInfo,
    ) -> Self {
        Self {
            registry,
            store,
            window_system,
            files,
            client_id,
            brand,
            senders: Mutex::new(HashMap::new()),
            next_context_id: AtomicU64::new(1),
            pending_close_answers: Mutex::new(HashMap::new()),
            connection_error: Mutex::new(None),
            certificate_error: Mutex::new(None),
            update_info: Mutex::new(None),
        }
    }

    fn store(&self) -> MutexGuard<'_, ConfigurationStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -----------------------------------------------------------------
    // Attachment
    // -----------------------------------------------------------------

    /// Registers the outbound queue of an attached content window.
    pub fn attach(&self, window: WindowId, sender: mpsc::UnboundedSender<Envelope>) {
        debug!(window, "content window attached");
        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(window, sender);
    }

    pub fn detach(&self, window: WindowId) {
        debug!(window, "content window detached");
        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&window);
    }

    fn send_envelope(&self, window: WindowId, envelope: Envelope) {
        let sender = self
            .senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&window)
            .cloned();
        match sender {
            Some(sender) => {
                if sender.send(envelope).is_err() {
                    warn!(window, "content window queue closed");
                }
            }
            None => debug!(window, "message for unattached window dropped"),
        }
    }

    /// Pushes both configuration documents to the main window and
    /// writes them to disk. Wired as store subscriber at startup.
    pub fn publish_current_configuration(
        &self,
        configuration: &opshell_core_config::MultiMonitorConfiguration,
    ) {
        if let Err(e) = self.files.save_user_configuration(configuration) {
            warn!("failed to persist user configuration: {e}");
        }
        if let Some(main) = self.registry.main_manager_window() {
            self.send_to_window(
                main,
                EventMessage::CurrentMmConfigurationChanged(MultiMonitorConfigurationInfo {
                    client_id: self.client_id.clone(),
                    configuration: configuration.clone(),
                }),
            );
        }
    }

    pub fn publish_default_configuration(
        &self,
        configuration: &opshell_core_config::MultiMonitorConfiguration,
    ) {
        if let Err(e) = self.files.save_default_configuration(configuration) {
            warn!("failed to persist default configuration: {e}");
        }
        if let Some(main) = self.registry.main_manager_window() {
            self.send_to_window(
                main,
                EventMessage::DefaultMmConfigurationChanged(MultiMonitorConfigurationInfo {
                    client_id: self.client_id.clone(),
                    configuration: configuration.clone(),
                }),
            );
        }
    }

    /// Pushes a changed manager definition to the window it belongs to.
    pub fn publish_manager_info(
        &self,
        config_id: &str,
        info: &opshell_core_config::ManagerInfo,
    ) {
        if let Some(window) = self.registry.window_id_for_configuration(config_id) {
            self.send_to_window(
                window,
                EventMessage::ManagerInfoCurrentConfigurationChanged(info.clone()),
            );
        }
    }

    // -----------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------

    pub async fn handle_event(&self, sender: WindowId, message: EventMessage) {
        match message {
            EventMessage::BootstrapApplication(mut bs_info) => {
                // Documents not delivered by the project come from disk.
                if bs_info.default_configuration.is_none() {
                    bs_info.default_configuration = self.files.load_default_configuration();
                }
                if bs_info.user_configuration.is_none() {
                    bs_info.user_configuration = self.files.load_user_configuration();
                }
                self.registry.bootstrap_manager_windows(bs_info);
            }
            EventMessage::StartAdditionalSystemManager => {
                self.registry.new_additional_system_manager_window();
            }
            EventMessage::DetachEventManager(event) => {
                if self.registry.new_event_manager_window().is_some() {
                    if !event.is_null() {
                        if let Some(window) = self.registry.window_for_detached_events() {
                            self.send_to_window(window, EventMessage::SendEvent(event));
                        }
                    }
                }
            }
            EventMessage::ResumeEventManager => {
                if let Some(window) = self.registry.window_for_detached_events() {
                    self.registry.delete_additional_manager_window(window, true);
                    if let Err(e) = self.window_system.close_window(window) {
                        warn!(window, "failed to close event manager: {e}");
                    }
                }
            }
            EventMessage::CommunicationChannelReady => {
                self.registry.set_communication_channel_ready(sender);
            }
            EventMessage::SendEvent(event) => {
                if let Some(window) = self.registry.window_for_events() {
                    self.deliver_and_focus(window, EventMessage::SendEvent(event));
                }
            }
            EventMessage::SendObjectToMain(object) => {
                if let Some(main) = self.registry.main_manager_window() {
                    self.deliver_and_focus(main, EventMessage::SendObjectToMain(object));
                }
            }
            EventMessage::SendObjectToWindow {
                destination_win_id,
                object,
            } => {
                self.deliver_and_focus(
                    destination_win_id,
                    EventMessage::SendObjectToWindow {
                        destination_win_id,
                        object,
                    },
                );
            }
            EventMessage::SendObjectToAllWindows(object) => {
                let mut windows = self.registry.additional_manager_windows();
                if let Some(main) = self.registry.main_manager_window() {
                    windows.insert(0, main);
                }
                for window in windows {
                    self.send_to_window(
                        window,
                        EventMessage::SendObjectToAllWindows(object.clone()),
                    );
                }
            }
            EventMessage::SynchronizeUiState(sync_data) => {
                self.synchronize_ui_state(sender, sync_data);
            }
            EventMessage::SaveCurrentConfigurationAsDefault(overrule_allowed) => {
                if let Err(e) = self.store().save_current_as_default(overrule_allowed) {
                    warn!("current configuration not saved as default: {e}");
                }
            }
            EventMessage::SetActiveLayout(layout) => {
                if let Some(config_id) = self.registry.window_configuration_id(sender) {
                    self.store().set_active_layout(
                        &config_id,
                        &layout.frame_id,
                        &layout.view_id,
                        &layout.layout_id,
                    );
                }
            }
            EventMessage::SetActiveLanguage(language) => {
                self.registry.set_active_language(language);
            }
            EventMessage::SetStartupNode(designation) => {
                if let Some(config_id) = self.registry.window_configuration_id(sender) {
                    self.store().set_startup_node(&config_id, &designation);
                }
            }
            EventMessage::SetWindowTitle(title) => {
                self.registry.set_window_title(sender, title);
            }
            EventMessage::EditCommunicationRules => {
                self.registry.open_rules_editor();
            }
            EventMessage::SaveCommunicationRules(rules) => {
                self.store().save_communication_rules(rules);
            }
            EventMessage::CloseCommunicationRulesEditor => {
                self.registry.close_rules_editor();
            }
            EventMessage::ReloadApplication => {
                if let Some(main) = self.registry.main_manager_window() {
                    self.registry.set_main_page(MainPage::Application);
                    if let Err(e) = self.window_system.reload(main) {
                        warn!("failed to reload application: {e}");
                    }
                }
            }
            EventMessage::ReloadPage => {
                if let Err(e) = self.window_system.reload(sender) {
                    warn!(window = sender, "failed to reload page: {e}");
                }
            }
            EventMessage::CanWindowBeClosedReply(info) => {
                self.resolve_close_answer(info);
            }
            EventMessage::ConfigureEndpointAddress => {
                self.registry.set_main_page(MainPage::EndpointConfiguration);
                if let Some(main) = self.registry.main_manager_window() {
                    if let Err(e) = self.window_system.reload(main) {
                        warn!("failed to load endpoint page: {e}");
                    }
                }
            }
            EventMessage::TestEndpointAddress(address) => {
                info!(%address, "endpoint address test requested");
            }
            EventMessage::ViewCertificate(url)
            | EventMessage::ImportCertificate(url)
            | EventMessage::DenyCertificateAndClose(url) => {
                info!(%url, "certificate operation requested");
            }
            EventMessage::AcceptCertificateAndReload(acceptance) => {
                info!(host_url = %acceptance.host_url, "certificate accepted, reloading");
                self.registry.set_main_page(MainPage::Application);
                if let Some(main) = self.registry.main_manager_window() {
                    let _ = self.window_system.reload(main);
                }
            }
            EventMessage::QuitAndInstallUpdate | EventMessage::RemindLaterForUpdate(_) => {
                info!("client update event received");
            }
            other => {
                // Messages the shell itself sends to contents.
                error!(?other, "unexpected event from content window");
            }
        }
    }

    fn deliver_and_focus(&self, window: WindowId, message: EventMessage) {
        if let Err(e) = self.window_system.restore_and_focus(window) {
            warn!(window, "failed to focus target window: {e}");
        }
        self.send_to_window(window, message);
    }

    /// Merges the incoming state properties over the stored UI state
    /// and forwards the change to the other windows.
    fn synchronize_ui_state(&self, sender: WindowId, sync_data: SyncData) {
        let merged = {
            let mut merged = self
                .registry
                .ui_sync_state()
                .unwrap_or_else(|| json!({}));
            if let (Some(target), Some(incoming)) =
                (merged.as_object_mut(), sync_data.state.as_object())
            {
                for (key, value) in incoming {
                    target.insert(key.clone(), value.clone());
                }
            }
            merged
        };
        self.registry.set_ui_sync_state(Some(merged.clone()));

        let forwarded = SyncData {
            send_to_itself: sync_data.send_to_itself,
            state: merged,
        };
        if let Some(main) = self.registry.main_manager_window() {
            if main != sender {
                self.send_to_window(main, EventMessage::SynchronizeUiState(forwarded.clone()));
            }
        }
        for window in self.registry.additional_manager_windows() {
            if sync_data.send_to_itself || window != sender {
                self.send_to_window(window, EventMessage::SynchronizeUiState(forwarded.clone()));
            }
        }
    }

    fn resolve_close_answer(&self, info: WindowCloseInfo) {
        let sender = self
            .pending_close_answers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&info.context_id);
        match sender {
            Some(answer) => {
                let _ = answer.send(Some(info.can_window_be_closed));
            }
            None => warn!(
                context_id = info.context_id,
                "close answer without pending question"
            ),
        }
    }

    // -----------------------------------------------------------------
    // Synchronous requests
    // -----------------------------------------------------------------

    pub fn handle_sync(&self, sender: WindowId, request: SyncRequest) -> Value {
        match request {
            SyncRequest::GetClientIdentification => to_value(&self.client_id),
            SyncRequest::GetAppInfo => to_value(&self.registry.app_info()),
            SyncRequest::GetDefaultConfiguration => self
                .store()
                .default_configuration()
                .map(to_value)
                .unwrap_or(Value::Null),
            SyncRequest::GetManagerInfoOfCurrentConfiguration => self
                .registry
                .window_configuration_id(sender)
                .and_then(|config_id| self.store().manager_info_of(&config_id))
                .map(|info| to_value(&info))
                .unwrap_or(Value::Null),
            SyncRequest::IsMainManager => {
                Value::Bool(self.registry.is_main_manager_window(sender))
            }
            SyncRequest::IsManagerWithEvent => {
                Value::Bool(self.registry.is_manager_with_event(sender))
            }
            SyncRequest::IsDefaultConfigurationChangeAllowed => {
                Value::Bool(self.store().change_default_configuration_allowed())
            }
            SyncRequest::IsCurrentConfigurationChangeAllowed => {
                Value::Bool(self.store().change_current_configuration_allowed())
            }
            SyncRequest::IsUserConfigurationChangeAllowed => {
                Value::Bool(self.store().user_specific_configuration_allowed())
            }
            SyncRequest::IsClosedModeActive => Value::Bool(self.store().closed_mode()),
            SyncRequest::GetCurrentCertificateError => self
                .certificate_error
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .as_ref()
                .map(to_value)
                .unwrap_or(Value::Null),
            SyncRequest::GetCurrentConnectionError => self
                .connection_error
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .as_ref()
                .map(to_value)
                .unwrap_or(Value::Null),
            SyncRequest::SaveEndpointAddress(address) => {
                Value::Bool(self.files.save_endpoint(&address).is_ok())
            }
            SyncRequest::ReadEndpointAddress => self
                .files
                .read_endpoint()
                .map(Value::String)
                .unwrap_or(Value::Null),
            SyncRequest::GetClientUpdateInfo => self
                .update_info
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .as_ref()
                .map(to_value)
                .unwrap_or(Value::Null),
            SyncRequest::GetBrandInfo => to_value(&self.brand),
            SyncRequest::SetZoom(percent) => {
                match self.window_system.set_zoom(sender, percent) {
                    Ok(applied) => json!(applied),
                    Err(e) => {
                        warn!(window = sender, "failed to set zoom: {e}");
                        Value::Null
                    }
                }
            }
            SyncRequest::GetUiState => self.registry.ui_sync_state().unwrap_or(Value::Null),
            SyncRequest::GetCommunicationRules => self
                .store()
                .communication_rules()
                .map(to_value)
                .unwrap_or(Value::Null),
            SyncRequest::MatchCommunicationRules(node) => self
                .registry
                .window_configuration_id(sender)
                .and_then(|config_id| self.store().match_communication_rules(&config_id, &node))
                .and_then(|target| self.registry.window_id_for_configuration(&target))
                .map(|window| json!(window))
                .unwrap_or(Value::Null),
            SyncRequest::GetWindowsInfo(request) => {
                to_value(&self.registry.windows_info(sender, request))
            }
            SyncRequest::GetOwnWindowInfo => self
                .registry
                .own_window_info(sender)
                .map(|info| to_value(&info))
                .unwrap_or(Value::Null),
        }
    }

    // -----------------------------------------------------------------
    // Asynchronous requests
    // -----------------------------------------------------------------

    pub async fn handle_async(&self, sender: WindowId, request: AsyncRequest) -> Value {
        match request {
            AsyncRequest::DoShutdownProcedure(sd_info) => {
                Value::Bool(self.registry.close_all_windows_with_check(sd_info).await)
            }
            AsyncRequest::ResetToDefaultConfiguration => {
                Value::Bool(self.registry.reset_to_default_configuration().await)
            }
            AsyncRequest::EditEndpointAddress => {
                let done = self
                    .registry
                    .close_all_windows_with_check(ShutdownInfo {
                        skip_dirty_check: false,
                        close_main_window: false,
                    })
                    .await;
                if done {
                    self.registry.set_main_page(MainPage::EndpointConfiguration);
                    if let Some(main) = self.registry.main_manager_window() {
                        if let Err(e) = self.window_system.reload(main) {
                            warn!("failed to load endpoint page: {e}");
                        }
                    }
                }
                Value::Bool(done)
            }
            AsyncRequest::CaptureWindows(request) => {
                to_value(&self.registry.capture_windows(sender, request))
            }
        }
    }
}

impl ContentGateway for MessageHub {
    fn send_to_window(&self, window: WindowId, message: EventMessage) {
        self.send_envelope(window, Envelope::Event { message });
    }

    fn can_window_be_closed(&self, window: WindowId) -> watch::Receiver<Option<bool>> {
        let context_id = self.next_context_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        self.pending_close_answers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(context_id, tx);
        self.send_to_window(
            window,
            EventMessage::CanWindowBeClosed(WindowCloseInfo {
                context_id,
                can_window_be_closed: false,
            }),
        );
        rx
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
