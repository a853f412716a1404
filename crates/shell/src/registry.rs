//! The window registry: owns the live manager windows.
//!
//! Maps native window ids to manager window configuration ids, creates
//! and deletes manager windows through the window system, drives the
//! bootstrap of a saved configuration and decides what happens when the
//! user asks a window to close.

use crate::close::{CloseController, CloseHost};
use opshell_core_config::reconcile::{display_exists, display_matching};
use opshell_core_config::{ConfigurationStore, DisplayInfo, ManagerType, ManagerWindow, Rect};
use opshell_ipc::{
    AppInfo, BootstrapInfo, CaptureWindowInfo, CaptureWindowRequestInfo, EventMessage,
    GetWindowRequestInfo, ShowBackDropInfo, ShowBackDropReason, ShutdownInfo, WindowInfo,
};
use opshell_platform::{WindowId, WindowOptions, WindowSystem};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Interval for re-checking whether a window's communication channel
/// came up before pushing a backdrop command to it.
const BACKDROP_READY_RETRY: Duration = Duration::from_millis(200);

pub const DEFAULT_MANAGER_WINDOW_WIDTH: i32 = 1200;
pub const DEFAULT_MANAGER_WINDOW_HEIGHT: i32 = 800;
pub const DEFAULT_RULES_WINDOW_WIDTH: i32 = 1200;
pub const DEFAULT_RULES_WINDOW_HEIGHT: i32 = 900;

/// What the main window currently has loaded. Close negotiation only
/// asks the content when the application itself is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainPage {
    Application,
    EndpointConfiguration,
    CertificateError,
    ConnectionError,
}

/// Outcome of a user-initiated close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// The caller destroys the window.
    Allow,
    /// The window stays open; negotiation may continue asynchronously.
    Prevent,
}

/// The messaging operations the registry needs from the router.
pub trait ContentGateway: Send + Sync {
    fn send_to_window(&self, window: WindowId, message: EventMessage);

    /// Asks the window's content whether it may be closed. The receiver
    /// holds `None` until the answer arrives.
    fn can_window_be_closed(&self, window: WindowId) -> watch::Receiver<Option<bool>>;
}

struct RegistryState {
    main_window: Option<WindowId>,
    additional_windows: Vec<WindowId>,
    ready_to_communicate: HashMap<WindowId, bool>,
    window_to_config: HashMap<WindowId, String>,
    window_titles: HashMap<WindowId, String>,
    rules_editor_window: Option<WindowId>,
    bootstrap_windows_done: bool,
    main_page: MainPage,
    app_info: AppInfo,
    ui_sync_state: Option<Value>,
    default_window_width: i32,
    default_window_height: i32,
}

pub struct WindowRegistry {
    window_system: Arc<dyn WindowSystem>,
    store: Arc<Mutex<ConfigurationStore>>,
    state: Arc<Mutex<RegistryState>>,
    gateway: OnceLock<Arc<dyn ContentGateway>>,
    close: OnceLock<CloseController>,
}

impl WindowRegistry {
    pub fn new(
        window_system: Arc<dyn WindowSystem>,
        store: Arc<Mutex<ConfigurationStore>>,
        app_info: AppInfo,
    ) -> Self {
        Self {
            window_system,
            store,
            state: Arc::new(Mutex::new(RegistryState {
                main_window: None,
                additional_windows: Vec::new(),
                ready_to_communicate: HashMap::new(),
                window_to_config: HashMap::new(),
                window_titles: HashMap::new(),
                rules_editor_window: None,
                bootstrap_windows_done: false,
                main_page: MainPage::Application,
                app_info,
                ui_sync_state: None,
                default_window_width: DEFAULT_MANAGER_WINDOW_WIDTH,
                default_window_height: DEFAULT_MANAGER_WINDOW_HEIGHT,
            })),
            gateway: OnceLock::new(),
            close: OnceLock::new(),
        }
    }

    /// Wires the router and the close controller in after construction.
    pub fn inject(&self, gateway: Arc<dyn ContentGateway>, close: CloseController) {
        let _ = self.gateway.set(gateway);
        let _ = self.close.set(close);
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn store(&self) -> MutexGuard<'_, ConfigurationStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn gateway(&self) -> &Arc<dyn ContentGateway> {
        self.gateway.get().expect("gateway injected at startup")
    }

    fn close_controller(&self) -> &CloseController {
        self.close.get().expect("close controller injected at startup")
    }

    // -----------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------

    pub fn main_manager_window(&self) -> Option<WindowId> {
        self.state().main_window
    }

    pub fn additional_manager_windows(&self) -> Vec<WindowId> {
        self.state().additional_windows.clone()
    }

    pub fn is_main_manager_window(&self, window: WindowId) -> bool {
        self.state().main_window == Some(window)
    }

    pub fn window_configuration_id(&self, window: WindowId) -> Option<String> {
        self.state().window_to_config.get(&window).cloned()
    }

    pub fn window_id_for_configuration(&self, config_id: &str) -> Option<WindowId> {
        self.state()
            .window_to_config
            .iter()
            .find(|(_, v)| v.as_str() == config_id)
            .map(|(k, _)| *k)
    }

    pub fn window_ids_for_configurations(&self, config_ids: &[String]) -> Vec<WindowId> {
        config_ids
            .iter()
            .filter_map(|id| self.window_id_for_configuration(id))
            .collect()
    }

    pub fn is_ready_to_communicate(&self, window: WindowId) -> bool {
        self.state()
            .ready_to_communicate
            .get(&window)
            .copied()
            .unwrap_or(false)
    }

    pub fn set_communication_channel_ready(&self, window: WindowId) {
        self.state().ready_to_communicate.insert(window, true);
    }

    /// The window whose manager carries the event list, attached or not.
    pub fn window_for_events(&self) -> Option<WindowId> {
        let mappings: Vec<(WindowId, String)> = {
            let state = self.state();
            state
                .window_to_config
                .iter()
                .map(|(k, v)| (*k, v.clone()))
                .collect()
        };
        let store = self.store();
        mappings
            .iter()
            .find(|(_, config_id)| store.is_event_like_manager(config_id))
            .map(|(window, _)| *window)
    }

    /// The detached event manager window, when one is running.
    pub fn window_for_detached_events(&self) -> Option<WindowId> {
        let mappings: Vec<(WindowId, String)> = {
            let state = self.state();
            state
                .window_to_config
                .iter()
                .map(|(k, v)| (*k, v.clone()))
                .collect()
        };
        let store = self.store();
        mappings
            .iter()
            .find(|(_, config_id)| store.is_detached_event_manager(config_id))
            .map(|(window, _)| *window)
    }

    pub fn is_manager_with_event(&self, window: WindowId) -> bool {
        self.window_for_events() == Some(window)
    }

    pub fn bootstrap_windows_done(&self) -> bool {
        self.state().bootstrap_windows_done
    }

    pub fn main_page(&self) -> MainPage {
        self.state().main_page
    }

    pub fn set_main_page(&self, page: MainPage) {
        let mut state = self.state();
        state.main_page = page;
        if let Some(main) = state.main_window {
            state.ready_to_communicate.insert(main, false);
        }
    }

    pub fn app_info(&self) -> AppInfo {
        self.state().app_info.clone()
    }

    pub fn set_active_language(&self, language: String) {
        self.state().app_info.active_language = Some(language);
    }

    pub fn ui_sync_state(&self) -> Option<Value> {
        self.state().ui_sync_state.clone()
    }

    pub fn set_ui_sync_state(&self, state: Option<Value>) {
        self.state().ui_sync_state = state;
    }

    pub fn set_window_title(&self, window: WindowId, title: String) {
        self.state().window_titles.insert(window, title);
    }

    pub fn window_title(&self, window: WindowId) -> String {
        self.state()
            .window_titles
            .get(&window)
            .cloned()
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------
    // Window creation
    // -----------------------------------------------------------------

    /// Overrides the built-in geometry for newly created manager
    /// windows, e.g. from the settings file.
    pub fn set_default_window_size(&self, width: i32, height: i32) {
        let mut state = self.state();
        state.default_window_width = width;
        state.default_window_height = height;
    }

    fn default_bounds(&self) -> Rect {
        let state = self.state();
        Rect::new(0, 0, state.default_window_width, state.default_window_height)
    }

    fn display_for(&self, bounds: &Rect) -> DisplayInfo {
        let displays = self.window_system.displays();
        display_matching(bounds, &displays)
            .cloned()
            .unwrap_or(DisplayInfo {
                id: 0,
                bounds: Rect::new(0, 0, 0, 0),
                work_area: Rect::new(0, 0, 0, 0),
                scale_factor: 1.0,
            })
    }

    /// Creates the main manager window. Called once at startup.
    pub fn new_main_manager_window(&self) -> Option<WindowId> {
        if let Err(e) = self.store().check_for_creation(ManagerType::Main) {
            warn!("main manager window not created: {e}");
            return None;
        }
        let bounds = self.default_bounds();
        let window = match self.window_system.create_window(WindowOptions {
            bounds,
            maximized: false,
            title: String::new(),
        }) {
            Ok(window) => window,
            Err(e) => {
                error!("failed to create main manager window: {e}");
                return None;
            }
        };
        let display = self.display_for(&bounds);
        let config = match self
            .store()
            .new_manager_window(ManagerType::Main, bounds, false, &display)
        {
            Ok(config) => config,
            Err(e) => {
                warn!("main manager window not stored: {e}");
                let _ = self.window_system.close_window(window);
                return None;
            }
        };
        {
            let mut state = self.state();
            state.main_window = Some(window);
            state.ready_to_communicate.insert(window, false);
            state.window_to_config.insert(window, config.id.clone());
        }
        info!(window, config_id = %config.id, "main manager window created");
        Some(window)
    }

    /// Creates an additional system manager window.
    pub fn new_additional_system_manager_window(&self) -> Option<WindowId> {
        self.new_additional_window(ManagerType::System)
    }

    /// Creates the detached event manager window.
    pub fn new_event_manager_window(&self) -> Option<WindowId> {
        self.new_additional_window(ManagerType::Event)
    }

    fn new_additional_window(&self, manager_type: ManagerType) -> Option<WindowId> {
        if !self.store().change_current_configuration_allowed() {
            return None;
        }
        if let Err(e) = self.store().check_for_creation(manager_type) {
            warn!("{manager_type:?} manager window not created: {e}");
            return None;
        }
        let bounds = self.default_bounds();
        let window = match self.window_system.create_window(WindowOptions {
            bounds,
            maximized: false,
            title: String::new(),
        }) {
            Ok(window) => window,
            Err(e) => {
                error!("failed to create {manager_type:?} manager window: {e}");
                return None;
            }
        };
        let display = self.display_for(&bounds);
        let config = match self
            .store()
            .new_manager_window(manager_type, bounds, false, &display)
        {
            Ok(config) => config,
            Err(e) => {
                warn!("{manager_type:?} manager window not stored: {e}");
                let _ = self.window_system.close_window(window);
                return None;
            }
        };
        {
            let mut state = self.state();
            state.additional_windows.push(window);
            state.ready_to_communicate.insert(window, false);
            state.window_to_config.insert(window, config.id.clone());
        }
        info!(window, config_id = %config.id, ?manager_type, "additional manager window created");
        Some(window)
    }

    // -----------------------------------------------------------------
    // Bootstrap
    // -----------------------------------------------------------------

    /// Adopts the configuration documents delivered by the content of
    /// the main window, re-places the main window accordingly and
    /// starts the configured additional manager windows.
    pub fn bootstrap_manager_windows(&self, bs_info: BootstrapInfo) {
        if self.state().bootstrap_windows_done {
            info!("bootstrap already done");
            return;
        }
        info!("bootstrapping manager windows");
        self.state().app_info.user_info = Some(bs_info.user_info.clone());

        let displays = self.window_system.displays();
        self.store().initialize(
            bs_info.default_configuration,
            bs_info.user_configuration,
            bs_info.user_info.has_configure_right,
            &displays,
        );

        let main_config = self.store().current_main_manager().cloned();
        match main_config {
            Some(config) => {
                let main = self.state().main_window;
                if let Some(main) = main {
                    self.state()
                        .window_to_config
                        .insert(main, config.id.clone());
                    if display_exists(&config, &displays) {
                        let bounds =
                            Rect::new(config.x, config.y, config.width, config.height);
                        if let Err(e) =
                            self.window_system.set_bounds(main, bounds, config.maximized)
                        {
                            warn!("failed to place main manager window: {e}");
                        }
                    } else {
                        // The saved display is gone; record where the
                        // window actually is.
                        self.record_live_position(main);
                    }
                    if config.manager.manager_type == ManagerType::MainWoEvent {
                        // The window started as Main; its content needs
                        // the role change.
                        self.store().notify_manager_definition_change(&config.id);
                    }
                }
            }
            None => error!("no main manager definition found"),
        }

        let to_start: Vec<ManagerWindow> = self
            .store()
            .current()
            .windows
            .iter()
            .filter(|w| !w.manager.manager_type.is_main_role())
            .cloned()
            .collect();
        self.start_manager_windows(&to_start);

        self.state().bootstrap_windows_done = true;
        info!("bootstrap done");
    }

    /// Creates live windows for saved manager window entries.
    fn start_manager_windows(&self, windows: &[ManagerWindow]) {
        for config in windows {
            let bounds = Rect::new(config.x, config.y, config.width, config.height);
            let window = match self.window_system.create_window(WindowOptions {
                bounds,
                maximized: config.maximized,
                title: String::new(),
            }) {
                Ok(window) => window,
                Err(e) => {
                    error!(config_id = %config.id, "failed to start manager window: {e}");
                    continue;
                }
            };
            let mut state = self.state();
            state.additional_windows.push(window);
            state.ready_to_communicate.insert(window, false);
            state.window_to_config.insert(window, config.id.clone());
            debug!(window, config_id = %config.id, "manager window started");
        }
    }

    /// Records the window's live geometry into the current
    /// configuration.
    pub fn record_live_position(&self, window: WindowId) {
        let Some(config_id) = self.window_configuration_id(window) else {
            return;
        };
        let Ok(bounds) = self.window_system.bounds(window) else {
            return;
        };
        let maximized = self.window_system.is_maximized(window).unwrap_or(false);
        let display = self.display_for(&bounds);
        self.store()
            .update_position(&config_id, bounds, maximized, &display);
    }

    // -----------------------------------------------------------------
    // Close handling
    // -----------------------------------------------------------------

    /// Decides what happens when the user asks a window to close.
    ///
    /// Returns [`CloseDecision::Allow`] when the caller may destroy the
    /// window. Otherwise the close is either refused outright or a
    /// negotiation with the window's content starts in the background;
    /// its outcome surfaces as a later close request.
    pub fn handle_close_requested(&self, window: WindowId) -> CloseDecision {
        let close = self.close_controller();

        // The rules editor closes without negotiation.
        if self.state().rules_editor_window == Some(window) {
            self.state().rules_editor_window = None;
            return CloseDecision::Allow;
        }

        if !self.is_main_manager_window(window) {
            if close.close_all_windows_invoked() {
                // Part of a running close-all: only windows that
                // answered clean may go.
                if close.is_window_dirty_check_done(window)
                    && close.is_window_dirty(window) == Some(false)
                {
                    self.delete_additional_manager_window(window, false);
                    CloseDecision::Allow
                } else {
                    CloseDecision::Prevent
                }
            } else {
                if !self.store().change_current_configuration_allowed() {
                    return CloseDecision::Prevent;
                }
                if !close.is_window_dirty_check_started(window) {
                    let close = close.clone();
                    tokio::spawn(async move {
                        close.close_window(window).await;
                    });
                    CloseDecision::Prevent
                } else if close.is_window_dirty_check_done(window)
                    && close.is_window_dirty(window) == Some(false)
                {
                    self.delete_additional_manager_window(window, true);
                    CloseDecision::Allow
                } else {
                    CloseDecision::Prevent
                }
            }
        } else if close.close_all_windows_invoked() {
            close.set_do_close_main(true);
            if close.can_main_window_be_closed() {
                self.close_rules_editor();
                self.state().main_window = None;
                CloseDecision::Allow
            } else {
                CloseDecision::Prevent
            }
        } else {
            if !self.store().close_main_window_allowed() {
                return CloseDecision::Prevent;
            }
            // Before bootstrap or while the channel is down there is
            // nobody to ask.
            let skip_dirty_check =
                !(self.state().bootstrap_windows_done && self.is_ready_to_communicate(window));
            let close = close.clone();
            tokio::spawn(async move {
                close.close_all_windows(true, skip_dirty_check).await;
            });
            CloseDecision::Prevent
        }
    }

    /// Drops a closed additional manager window from the registry and
    /// the current configuration.
    pub fn delete_additional_manager_window(&self, window: WindowId, save_user_configuration: bool) {
        let config_id = {
            let mut state = self.state();
            state.additional_windows.retain(|w| *w != window);
            state.ready_to_communicate.remove(&window);
            state.window_titles.remove(&window);
            state.window_to_config.remove(&window)
        };
        if let Some(config_id) = config_id {
            self.store()
                .delete_manager_window(&config_id, save_user_configuration);
        }
    }

    /// Forgets a destroyed window without touching the configuration.
    pub fn handle_window_closed(&self, window: WindowId) {
        let mut state = self.state();
        if state.main_window == Some(window) {
            state.main_window = None;
        }
        if state.rules_editor_window == Some(window) {
            state.rules_editor_window = None;
        }
        state.additional_windows.retain(|w| *w != window);
        state.ready_to_communicate.remove(&window);
        state.window_titles.remove(&window);
        state.window_to_config.remove(&window);
    }

    /// Runs the dirty check over all managers without closing anything.
    pub async fn check_all_managers_for_dirty_state(&self, reason: ShowBackDropReason) -> bool {
        let close = self.close_controller().clone();
        if close.dirty_check_windows_invoked() {
            return false;
        }
        let not_dirty = close
            .check_all_windows(reason, false, Duration::ZERO)
            .await;
        close.clear_dirty_state();
        not_dirty
    }

    /// Closes all windows after a successful dirty check, then resets
    /// the session state for a relogin.
    pub async fn close_all_windows_with_check(&self, sd_info: ShutdownInfo) -> bool {
        let close = self.close_controller().clone();
        let done = close
            .close_all_windows(sd_info.close_main_window, sd_info.skip_dirty_check)
            .await;
        if done {
            self.state().bootstrap_windows_done = false;
            self.store().reset_default_configuration();
        }
        done
    }

    /// Resets the running session back to the default configuration.
    ///
    /// All windows must pass the dirty check first. Windows not present
    /// in the default configuration are closed, the remaining ones are
    /// re-placed, and default windows that are not running are started.
    pub async fn reset_to_default_configuration(&self) -> bool {
        let close = self.close_controller().clone();
        if close.dirty_check_windows_invoked() {
            return false;
        }
        self.store().reset_communication_rules_to_default();

        let not_dirty = close
            .check_all_windows(
                ShowBackDropReason::ApplyDefault,
                false,
                Duration::from_millis(2000),
            )
            .await;
        if not_dirty {
            self.store().align_main_window_id();

            let to_close = {
                let store = self.store();
                store.current_windows_not_in_default()
            };
            for window in self.window_ids_for_configurations(&to_close) {
                self.delete_additional_manager_window(window, false);
                if let Err(e) = self.window_system.close_window(window) {
                    warn!(window, "failed to close manager window: {e}");
                }
            }

            let started = self.store().default_windows_started();
            for config in &started {
                let Some(window) = self.window_id_for_configuration(&config.id) else {
                    continue;
                };
                let bounds = Rect::new(config.x, config.y, config.width, config.height);
                if let Err(e) = self.window_system.set_bounds(window, bounds, config.maximized) {
                    warn!(window, "failed to re-place manager window: {e}");
                }
                let display = self.display_for(&bounds);
                self.store()
                    .update_position(&config.id, bounds, config.maximized, &display);
            }
            self.store().update_startup_nodes_and_layouts(&started);

            let not_started = self.store().default_windows_not_started();
            self.store().add_to_current(&not_started);
            self.start_manager_windows(&not_started);
        }
        close.clear_dirty_state();
        not_dirty
    }

    // -----------------------------------------------------------------
    // Window info
    // -----------------------------------------------------------------

    fn window_info_of(&self, window: WindowId) -> Option<WindowInfo> {
        let config_id = self.window_configuration_id(window)?;
        let manager_type = self.store().manager_window(&config_id)?.manager.manager_type;
        Some(WindowInfo {
            window_id: window,
            manager_window_id: config_id,
            manager_type,
            title: self.window_title(window),
        })
    }

    fn windows_matching(&self, sender: WindowId, include_own: bool, include_detached: bool) -> Vec<WindowId> {
        let (main, additional) = {
            let state = self.state();
            (state.main_window, state.additional_windows.clone())
        };
        let detached = self.window_for_detached_events();
        let mut windows = Vec::new();
        if let Some(main) = main {
            if include_own || main != sender {
                windows.push(main);
            }
        }
        for window in additional {
            if (include_own || window != sender)
                && (include_detached || detached != Some(window))
            {
                windows.push(window);
            }
        }
        windows
    }

    /// Describes the manager windows, filtered from the view of the
    /// requesting window.
    pub fn windows_info(&self, sender: WindowId, request: GetWindowRequestInfo) -> Vec<WindowInfo> {
        self.windows_matching(sender, request.include_own_window, request.include_detached_event)
            .into_iter()
            .filter_map(|window| self.window_info_of(window))
            .collect()
    }

    pub fn own_window_info(&self, window: WindowId) -> Option<WindowInfo> {
        self.window_info_of(window)
    }

    /// Describes the manager windows as capture sources, optionally
    /// with thumbnails.
    pub fn capture_windows(
        &self,
        sender: WindowId,
        request: CaptureWindowRequestInfo,
    ) -> Vec<CaptureWindowInfo> {
        self.windows_matching(sender, request.include_own_window, request.include_detached_event)
            .into_iter()
            .filter_map(|window| {
                let window_info = self.window_info_of(window)?;
                let thumb_nail_data_url = if request.include_thumbnail {
                    self.window_system.capture(window).ok().flatten()
                } else {
                    None
                };
                Some(CaptureWindowInfo {
                    window_info,
                    source_id: format!("window:{window}:0"),
                    thumb_nail_data_url,
                })
            })
            .collect()
    }

    // -----------------------------------------------------------------
    // Communication rules editor
    // -----------------------------------------------------------------

    /// Opens the communication rules editor, restoring the existing
    /// editor window when it is already running.
    pub fn open_rules_editor(&self) -> Option<WindowId> {
        if let Some(window) = self.state().rules_editor_window {
            if let Err(e) = self.window_system.restore_and_focus(window) {
                warn!(window, "failed to focus rules editor: {e}");
            }
            return Some(window);
        }
        let window = match self.window_system.create_window(WindowOptions {
            bounds: Rect::new(0, 0, DEFAULT_RULES_WINDOW_WIDTH, DEFAULT_RULES_WINDOW_HEIGHT),
            maximized: false,
            title: "Communication rules".to_string(),
        }) {
            Ok(window) => window,
            Err(e) => {
                error!("failed to create rules editor window: {e}");
                return None;
            }
        };
        self.state().rules_editor_window = Some(window);
        info!(window, "communication rules editor opened");
        Some(window)
    }

    pub fn close_rules_editor(&self) {
        let window = self.state().rules_editor_window.take();
        if let Some(window) = window {
            if let Err(e) = self.window_system.close_window(window) {
                warn!(window, "failed to close rules editor: {e}");
            }
        }
    }

    pub fn is_rules_editor(&self, window: WindowId) -> bool {
        self.state().rules_editor_window == Some(window)
    }
}

impl CloseHost for WindowRegistry {
    fn can_window_be_closed(&self, window: WindowId) -> watch::Receiver<Option<bool>> {
        // When the main window shows anything but the application there
        // is no content that could hold unsaved data.
        if self.is_main_manager_window(window) && self.main_page() != MainPage::Application {
            let (tx, rx) = watch::channel(Some(true));
            drop(tx);
            return rx;
        }
        self.gateway().can_window_be_closed(window)
    }

    fn restore_and_focus(&self, window: WindowId) {
        if let Err(e) = self.window_system.restore_and_focus(window) {
            warn!(window, "failed to restore window: {e}");
        }
    }

    fn show_backdrop(&self, window: WindowId, info: ShowBackDropInfo) {
        if self.is_ready_to_communicate(window) {
            self.gateway()
                .send_to_window(window, EventMessage::ShowBackDrop(info));
            return;
        }
        // The channel is not up yet; keep retrying until it is.
        let state = Arc::clone(&self.state);
        let gateway = Arc::clone(self.gateway());
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(BACKDROP_READY_RETRY).await;
                let ready = state
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .ready_to_communicate
                    .get(&window)
                    .copied();
                match ready {
                    Some(true) => {
                        gateway.send_to_window(window, EventMessage::ShowBackDrop(info));
                        break;
                    }
                    Some(false) => continue,
                    // The window is gone.
                    None => break,
                }
            }
        });
    }

    fn close_window(&self, window: WindowId) {
        // Destruction funnels through the same decision as an OS close
        // request, so a negotiated close also removes the window's
        // configuration entry and runs the role promotion.
        let is_main = self.is_main_manager_window(window);
        match self.handle_close_requested(window) {
            CloseDecision::Allow => {
                if is_main {
                    info!("closing main manager window, session ends");
                }
                if let Err(e) = self.window_system.close_window(window) {
                    warn!(window, "failed to close window: {e}");
                }
            }
            CloseDecision::Prevent => {
                debug!(window, "window may not be closed");
            }
        }
    }

    fn additional_windows(&self) -> Vec<WindowId> {
        self.additional_manager_windows()
    }

    fn main_window(&self) -> Option<WindowId> {
        self.main_manager_window()
    }
}
