//! The configuration store.
//!
//! [`ConfigurationStore`] owns the default and current multi-monitor
//! configuration documents, enforces the window-set invariants (one
//! main role, one detached event manager, at most ten windows) and
//! performs the role transitions between `Main` and `MainWoEvent`.
//! Interested parties register typed observers; they are called
//! synchronously, in subscription order, from the mutating call.

use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{
    frame_template, new_window_config_id, CommunicationRule, ManagerDefinition, ManagerInfo,
    ManagerWindow, MultiMonitorConfiguration, ObjectNode, ManagerType, MAX_WINDOWS,
};
use crate::reconcile::{reconcile_all, DisplayInfo, Rect};
use crate::rules::match_rules;

/// Why a manager window may not be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CreationError {
    #[error("a main manager window already exists")]
    MainAlreadyExists,
    #[error("a detached event manager window already exists")]
    EventAlreadyExists,
    #[error("the limit of {} manager windows is reached", MAX_WINDOWS)]
    WindowLimitReached,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Creation(#[from] CreationError),
    #[error("changing the default configuration requires the configure right")]
    ConfigureRightRequired,
}

/// Handle for removing a registered observer again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ManagerInfoListener = Box<dyn Fn(&str, &ManagerInfo) + Send>;
type ConfigListener = Box<dyn Fn(&MultiMonitorConfiguration) + Send>;

pub struct ConfigurationStore {
    default: Option<MultiMonitorConfiguration>,
    current: MultiMonitorConfiguration,
    user_has_configure_right: bool,
    closed_mode: bool,
    next_subscription_id: u64,
    manager_info_listeners: Vec<(SubscriptionId, ManagerInfoListener)>,
    current_listeners: Vec<(SubscriptionId, ConfigListener)>,
    default_listeners: Vec<(SubscriptionId, ConfigListener)>,
}

impl ConfigurationStore {
    pub fn new(closed_mode: bool) -> Self {
        Self {
            default: None,
            current: MultiMonitorConfiguration::empty(),
            user_has_configure_right: false,
            closed_mode,
            next_subscription_id: 0,
            manager_info_listeners: Vec::new(),
            current_listeners: Vec::new(),
            default_listeners: Vec::new(),
        }
    }

    /// Adopts the configuration documents delivered at bootstrap.
    ///
    /// Both documents are migrated to the current schema version. The
    /// current configuration becomes the user document when one exists
    /// and user-specific configurations are allowed, otherwise a deep
    /// copy of the default. Every adopted window is reconciled against
    /// the live display list.
    pub fn initialize(
        &mut self,
        mut default: Option<MultiMonitorConfiguration>,
        mut user: Option<MultiMonitorConfiguration>,
        user_has_configure_right: bool,
        displays: &[DisplayInfo],
    ) {
        if let Some(cfg) = default.as_mut() {
            cfg.migrate();
        }
        if let Some(cfg) = user.as_mut() {
            cfg.migrate();
        }

        self.default = default;
        self.user_has_configure_right = user_has_configure_right;
        if self.user_specific_configuration_allowed() && user.is_some() {
            if let Some(user) = user {
                self.current = user;
            }
        } else if let Some(default) = &self.default {
            self.current = default.clone();
        }

        reconcile_all(&mut self.current, displays);
        debug!(
            windows = self.current.windows.len(),
            has_default = self.default.is_some(),
            "configuration store initialized"
        );
    }

    // -----------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------

    fn next_id(&mut self) -> SubscriptionId {
        self.next_subscription_id += 1;
        SubscriptionId(self.next_subscription_id)
    }

    /// A window's manager definition changed (role transition, startup
    /// node, pinned layouts). Called with the window's configuration id.
    pub fn subscribe_manager_info(
        &mut self,
        listener: impl Fn(&str, &ManagerInfo) + Send + 'static,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.manager_info_listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe_manager_info(&mut self, id: SubscriptionId) {
        self.manager_info_listeners.retain(|(sid, _)| *sid != id);
    }

    pub fn subscribe_current_changed(
        &mut self,
        listener: impl Fn(&MultiMonitorConfiguration) + Send + 'static,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.current_listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe_current_changed(&mut self, id: SubscriptionId) {
        self.current_listeners.retain(|(sid, _)| *sid != id);
    }

    pub fn subscribe_default_changed(
        &mut self,
        listener: impl Fn(&MultiMonitorConfiguration) + Send + 'static,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.default_listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe_default_changed(&mut self, id: SubscriptionId) {
        self.default_listeners.retain(|(sid, _)| *sid != id);
    }

    fn notify_manager_info(&self, window_id: &str, info: &ManagerInfo) {
        for (_, listener) in &self.manager_info_listeners {
            listener(window_id, info);
        }
    }

    fn notify_current_changed(&self) {
        for (_, listener) in &self.current_listeners {
            listener(&self.current);
        }
    }

    fn notify_current_changed_if_allowed(&self) {
        if self.change_current_configuration_allowed() {
            self.notify_current_changed();
        }
    }

    fn notify_default_changed(&self) {
        if let Some(default) = &self.default {
            for (_, listener) in &self.default_listeners {
                listener(default);
            }
        }
    }

    /// Pushes the window's manager definition to its subscribers, e.g.
    /// after adopting a saved configuration changed the window's role.
    pub fn notify_manager_definition_change(&self, window_id: &str) {
        if let Some(info) = self.manager_info_of(window_id) {
            self.notify_manager_info(window_id, &info);
        }
    }

    // -----------------------------------------------------------------
    // Permissions
    // -----------------------------------------------------------------

    pub fn closed_mode(&self) -> bool {
        self.closed_mode
    }

    pub fn user_has_configure_right(&self) -> bool {
        self.user_has_configure_right
    }

    pub fn change_default_configuration_allowed(&self) -> bool {
        self.user_has_configure_right && !self.closed_mode
    }

    pub fn user_specific_configuration_allowed(&self) -> bool {
        match &self.default {
            None => true,
            Some(default) => default.overrule_allowed,
        }
    }

    pub fn change_current_configuration_allowed(&self) -> bool {
        if self.closed_mode {
            return false;
        }
        match &self.default {
            None => true,
            Some(default) => default.overrule_allowed || self.user_has_configure_right,
        }
    }

    pub fn close_main_window_allowed(&self) -> bool {
        !self.closed_mode
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    pub fn current(&self) -> &MultiMonitorConfiguration {
        &self.current
    }

    pub fn default_configuration(&self) -> Option<&MultiMonitorConfiguration> {
        self.default.as_ref()
    }

    pub fn is_default_configuration_defined(&self) -> bool {
        self.default.is_some()
    }

    /// Drops the default document (a logoff discards project state).
    pub fn reset_default_configuration(&mut self) {
        self.default = None;
    }

    pub fn manager_window(&self, window_id: &str) -> Option<&ManagerWindow> {
        self.current.windows.iter().find(|w| w.id == window_id)
    }

    pub fn current_main_manager(&self) -> Option<&ManagerWindow> {
        self.current
            .windows
            .iter()
            .find(|w| w.manager.manager_type.is_main_role())
    }

    pub fn default_main_manager(&self) -> Option<&ManagerWindow> {
        self.default
            .as_ref()?
            .windows
            .iter()
            .find(|w| w.manager.manager_type.is_main_role())
    }

    /// Whether the given window currently hosts the event list.
    pub fn is_event_like_manager(&self, window_id: &str) -> bool {
        self.current
            .windows
            .iter()
            .find(|w| w.manager.manager_type.is_event_like())
            .is_some_and(|w| w.id == window_id)
    }

    pub fn is_detached_event_manager(&self, window_id: &str) -> bool {
        self.current
            .windows
            .iter()
            .find(|w| w.manager.manager_type == ManagerType::Event)
            .is_some_and(|w| w.id == window_id)
    }

    pub fn manager_info_of(&self, window_id: &str) -> Option<ManagerInfo> {
        self.manager_window(window_id)
            .map(|w| ManagerInfo::for_definition(&w.manager))
    }

    // -----------------------------------------------------------------
    // Window lifecycle
    // -----------------------------------------------------------------

    /// Checks the window-set invariants for creating a manager of the
    /// given role.
    pub fn check_for_creation(&self, manager_type: ManagerType) -> Result<(), CreationError> {
        if self.current.windows.len() >= MAX_WINDOWS {
            return Err(CreationError::WindowLimitReached);
        }
        if manager_type == ManagerType::Event
            && self
                .current
                .windows
                .iter()
                .any(|w| w.manager.manager_type == ManagerType::Event)
        {
            return Err(CreationError::EventAlreadyExists);
        }
        if manager_type.is_main_role()
            && self
                .current
                .windows
                .iter()
                .any(|w| w.manager.manager_type.is_main_role())
        {
            return Err(CreationError::MainAlreadyExists);
        }
        Ok(())
    }

    /// Adds a new manager window to the current configuration.
    ///
    /// Creating a detached event manager demotes the current `Main` to
    /// `MainWoEvent` and notifies its content. Returns the stored entry.
    pub fn new_manager_window(
        &mut self,
        manager_type: ManagerType,
        bounds: Rect,
        maximized: bool,
        display: &DisplayInfo,
    ) -> Result<ManagerWindow, CreationError> {
        self.check_for_creation(manager_type)?;

        let window = ManagerWindow {
            id: new_window_config_id(),
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            maximized,
            display_id: display.id,
            display_x: display.bounds.x,
            display_y: display.bounds.y,
            display_width: display.bounds.width,
            display_height: display.bounds.height,
            scale_factor: display.scale_factor,
            manager: ManagerDefinition {
                manager_type,
                frames: Some(frame_template(manager_type)),
                startup_node: None,
            },
        };
        self.current.windows.push(window.clone());

        match manager_type {
            ManagerType::System => self.notify_current_changed_if_allowed(),
            ManagerType::Event => {
                self.demote_main_to_main_wo_event();
                self.notify_current_changed_if_allowed();
            }
            ManagerType::Main | ManagerType::MainWoEvent => {}
        }
        debug!(id = %window.id, ?manager_type, "manager window added");
        Ok(window)
    }

    /// Removes a manager window from the current configuration.
    ///
    /// Removing the detached event manager promotes `MainWoEvent` back
    /// to `Main` and notifies its content. Main-role windows are never
    /// removed here; they live for the whole session.
    pub fn delete_manager_window(&mut self, window_id: &str, save_user_configuration: bool) {
        let Some(window) = self.manager_window(window_id) else {
            warn!(window_id, "delete for unknown manager window");
            return;
        };
        match window.manager.manager_type {
            ManagerType::System => {
                self.remove_from_current(window_id);
            }
            ManagerType::Event => {
                self.remove_from_current(window_id);
                self.promote_main_wo_event_to_main();
            }
            ManagerType::Main | ManagerType::MainWoEvent => {}
        }
        if save_user_configuration {
            self.notify_current_changed_if_allowed();
        }
    }

    fn remove_from_current(&mut self, window_id: &str) {
        self.current.windows.retain(|w| w.id != window_id);
    }

    fn demote_main_to_main_wo_event(&mut self) {
        let Some(main) = self
            .current
            .windows
            .iter_mut()
            .find(|w| w.manager.manager_type == ManagerType::Main)
        else {
            return;
        };
        main.manager.manager_type = ManagerType::MainWoEvent;
        let id = main.id.clone();
        let info = ManagerInfo::for_definition(&main.manager);
        self.notify_manager_info(&id, &info);
    }

    fn promote_main_wo_event_to_main(&mut self) {
        let Some(main) = self
            .current
            .windows
            .iter_mut()
            .find(|w| w.manager.manager_type == ManagerType::MainWoEvent)
        else {
            return;
        };
        main.manager.manager_type = ManagerType::Main;
        let id = main.id.clone();
        let info = ManagerInfo::for_definition(&main.manager);
        self.notify_manager_info(&id, &info);
    }

    // -----------------------------------------------------------------
    // Geometry and layout updates
    // -----------------------------------------------------------------

    /// Records the window's live geometry and display snapshot.
    ///
    /// Position and size are not stored while the window is maximized;
    /// the display snapshot is refreshed either way.
    pub fn update_position(
        &mut self,
        window_id: &str,
        bounds: Rect,
        maximized: bool,
        display: &DisplayInfo,
    ) {
        match self.current.windows.iter_mut().find(|w| w.id == window_id) {
            Some(window) => {
                window.maximized = maximized;
                if !maximized {
                    window.x = bounds.x;
                    window.y = bounds.y;
                    window.width = bounds.width;
                    window.height = bounds.height;
                }
                window.display_id = display.id;
                window.display_x = display.bounds.x;
                window.display_y = display.bounds.y;
                window.display_width = display.bounds.width;
                window.display_height = display.bounds.height;
                window.scale_factor = display.scale_factor;
            }
            None => {
                warn!(window_id, "position update for unknown manager window");
                return;
            }
        }
        self.notify_current_changed_if_allowed();
    }

    /// Pins the layout of a view in one of the window's frames,
    /// creating the view entry when it does not exist yet.
    pub fn set_active_layout(&mut self, window_id: &str, frame_id: &str, view_id: &str, layout_id: &str) {
        let Some(window) = self.current.windows.iter_mut().find(|w| w.id == window_id) else {
            warn!(window_id, "active layout for unknown manager window");
            return;
        };
        let Some(frame) = window
            .manager
            .frames
            .as_mut()
            .and_then(|frames| frames.iter_mut().find(|f| f.id == frame_id))
        else {
            return;
        };
        let views = frame.views.get_or_insert_with(Vec::new);
        match views.iter_mut().find(|v| v.id == view_id) {
            Some(view) => view.default_layout = Some(layout_id.to_owned()),
            None => views.push(crate::model::ViewDefinition {
                id: view_id.to_owned(),
                default_layout: Some(layout_id.to_owned()),
            }),
        }
        self.notify_current_changed_if_allowed();
    }

    pub fn set_startup_node(&mut self, window_id: &str, designation: &str) {
        let Some(window) = self.current.windows.iter_mut().find(|w| w.id == window_id) else {
            warn!(window_id, "startup node for unknown manager window");
            return;
        };
        window.manager.startup_node = Some(designation.to_owned());
        self.notify_current_changed_if_allowed();
    }

    /// Re-applies startup nodes and pinned view layouts from saved
    /// manager windows (the default document, on reset) onto the
    /// current ones, notifying each affected window's content.
    pub fn update_startup_nodes_and_layouts(&mut self, saved: &[ManagerWindow]) {
        let mut notifications = Vec::new();
        for saved_win in saved {
            let Some(current) = self
                .current
                .windows
                .iter_mut()
                .find(|w| w.id == saved_win.id)
            else {
                continue;
            };
            current.manager.startup_node = saved_win.manager.startup_node.clone();
            if let (Some(saved_frames), Some(current_frames)) =
                (&saved_win.manager.frames, current.manager.frames.as_mut())
            {
                for saved_frame in saved_frames {
                    let Some(current_frame) =
                        current_frames.iter_mut().find(|f| f.id == saved_frame.id)
                    else {
                        continue;
                    };
                    let (Some(saved_views), Some(current_views)) =
                        (&saved_frame.views, current_frame.views.as_mut())
                    else {
                        continue;
                    };
                    for saved_view in saved_views {
                        if let Some(view) =
                            current_views.iter_mut().find(|v| v.id == saved_view.id)
                        {
                            view.default_layout = saved_view.default_layout.clone();
                        }
                    }
                }
            }
            notifications.push((
                current.id.clone(),
                ManagerInfo::for_definition(&current.manager),
            ));
        }
        for (id, info) in &notifications {
            self.notify_manager_info(id, info);
        }
        self.notify_current_changed_if_allowed();
    }

    // -----------------------------------------------------------------
    // Default configuration
    // -----------------------------------------------------------------

    /// Saves the current configuration as the new default.
    pub fn save_current_as_default(&mut self, overrule_allowed: bool) -> Result<(), StoreError> {
        if !self.user_has_configure_right {
            return Err(StoreError::ConfigureRightRequired);
        }
        let mut copy = self.current.clone();
        copy.overrule_allowed = overrule_allowed;
        self.default = Some(copy);
        self.notify_default_changed();
        Ok(())
    }

    /// Aligns the current main manager's id with the default one.
    ///
    /// Differing ids only exist when the user document was created
    /// before the default one. Returns the aligned id.
    pub fn align_main_window_id(&mut self) -> Option<String> {
        let default_id = self.default_main_manager()?.id.clone();
        let current = self
            .current
            .windows
            .iter_mut()
            .find(|w| w.manager.manager_type.is_main_role())?;
        current.id = default_id.clone();
        Some(default_id)
    }

    // -----------------------------------------------------------------
    // Reset-to-default diffing
    // -----------------------------------------------------------------

    /// Ids of current manager windows that have no counterpart in the
    /// default configuration. Without a default, nothing qualifies.
    pub fn current_windows_not_in_default(&self) -> Vec<String> {
        let Some(default) = &self.default else {
            return Vec::new();
        };
        self.current
            .windows
            .iter()
            .filter(|c| !default.windows.iter().any(|d| d.id == c.id))
            .map(|c| c.id.clone())
            .collect()
    }

    /// Ids of current manager windows that also exist in the default
    /// configuration. Without a default, every current window counts.
    pub fn current_windows_in_default(&self) -> Vec<String> {
        self.current
            .windows
            .iter()
            .filter(|c| match &self.default {
                Some(default) => default.windows.iter().any(|d| d.id == c.id),
                None => true,
            })
            .map(|c| c.id.clone())
            .collect()
    }

    /// Default manager windows that are not part of the current
    /// configuration (not started).
    pub fn default_windows_not_started(&self) -> Vec<ManagerWindow> {
        let Some(default) = &self.default else {
            return Vec::new();
        };
        default
            .windows
            .iter()
            .filter(|d| !self.current.windows.iter().any(|c| c.id == d.id))
            .cloned()
            .collect()
    }

    /// Default manager windows that are already running.
    pub fn default_windows_started(&self) -> Vec<ManagerWindow> {
        let Some(default) = &self.default else {
            return Vec::new();
        };
        default
            .windows
            .iter()
            .filter(|d| self.current.windows.iter().any(|c| c.id == d.id))
            .cloned()
            .collect()
    }

    /// Re-adopts saved manager windows into the current configuration.
    /// An adopted event manager demotes the main window's role.
    pub fn add_to_current(&mut self, windows: &[ManagerWindow]) {
        self.current.windows.extend(windows.iter().cloned());
        if windows
            .iter()
            .any(|w| w.manager.manager_type == ManagerType::Event)
        {
            self.demote_main_to_main_wo_event();
        }
    }

    // -----------------------------------------------------------------
    // Communication rules
    // -----------------------------------------------------------------

    pub fn communication_rules(&self) -> Option<&[CommunicationRule]> {
        self.current.communication_rules.as_deref()
    }

    pub fn save_communication_rules(&mut self, rules: Vec<CommunicationRule>) {
        self.current.communication_rules = Some(rules);
        self.notify_current_changed_if_allowed();
    }

    pub fn reset_communication_rules_to_default(&mut self) {
        let Some(rules) = self
            .default
            .as_ref()
            .and_then(|d| d.communication_rules.clone())
        else {
            return;
        };
        self.current.communication_rules = Some(rules);
        self.notify_current_changed_if_allowed();
    }

    /// Evaluates the communication rules for an object selection made
    /// in the given source window, returning the target window's
    /// configuration id.
    pub fn match_communication_rules(
        &self,
        source_window_id: &str,
        node: &ObjectNode,
    ) -> Option<String> {
        let rules = self.current.communication_rules.as_deref()?;
        if rules.is_empty() {
            return None;
        }
        match_rules(rules, source_window_id, node).map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FilterCriterion, ObjectAttributes, ObjectFilterType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn display() -> DisplayInfo {
        DisplayInfo {
            id: 1,
            bounds: Rect::new(0, 0, 1920, 1080),
            work_area: Rect::new(0, 0, 1920, 1040),
            scale_factor: 1.0,
        }
    }

    fn bounds() -> Rect {
        Rect::new(10, 10, 800, 600)
    }

    fn store_with_main() -> (ConfigurationStore, String) {
        let mut store = ConfigurationStore::new(false);
        let main = store
            .new_manager_window(ManagerType::Main, bounds(), false, &display())
            .unwrap();
        (store, main.id)
    }

    #[test]
    fn only_one_main_role_window() {
        let (store, _) = store_with_main();
        assert_eq!(
            store.check_for_creation(ManagerType::Main),
            Err(CreationError::MainAlreadyExists)
        );
        assert_eq!(
            store.check_for_creation(ManagerType::MainWoEvent),
            Err(CreationError::MainAlreadyExists)
        );
        assert_eq!(store.check_for_creation(ManagerType::System), Ok(()));
        assert_eq!(store.check_for_creation(ManagerType::Event), Ok(()));
    }

    #[test]
    fn only_one_event_window() {
        let (mut store, _) = store_with_main();
        store
            .new_manager_window(ManagerType::Event, bounds(), false, &display())
            .unwrap();
        assert_eq!(
            store.check_for_creation(ManagerType::Event),
            Err(CreationError::EventAlreadyExists)
        );
    }

    #[test]
    fn window_limit_is_enforced() {
        let (mut store, _) = store_with_main();
        for _ in 0..(MAX_WINDOWS - 1) {
            store
                .new_manager_window(ManagerType::System, bounds(), false, &display())
                .unwrap();
        }
        assert_eq!(store.current().windows.len(), MAX_WINDOWS);
        assert_eq!(
            store.check_for_creation(ManagerType::System),
            Err(CreationError::WindowLimitReached)
        );
    }

    #[test]
    fn event_creation_demotes_main() {
        let (mut store, main_id) = store_with_main();
        let notified = Arc::new(AtomicUsize::new(0));
        let notified_clone = notified.clone();
        let expected_id = main_id.clone();
        store.subscribe_manager_info(move |window_id, info| {
            assert_eq!(window_id, expected_id);
            let definition = info.manager_definition.as_ref().unwrap();
            assert_eq!(definition.manager_type, ManagerType::MainWoEvent);
            notified_clone.fetch_add(1, Ordering::SeqCst);
        });

        store
            .new_manager_window(ManagerType::Event, bounds(), false, &display())
            .unwrap();
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.manager_window(&main_id).unwrap().manager.manager_type,
            ManagerType::MainWoEvent
        );
    }

    #[test]
    fn event_deletion_promotes_main_back() {
        let (mut store, main_id) = store_with_main();
        let event = store
            .new_manager_window(ManagerType::Event, bounds(), false, &display())
            .unwrap();
        store.delete_manager_window(&event.id, true);
        assert_eq!(
            store.manager_window(&main_id).unwrap().manager.manager_type,
            ManagerType::Main
        );
        assert!(store.manager_window(&event.id).is_none());
    }

    #[test]
    fn main_role_windows_are_never_deleted() {
        let (mut store, main_id) = store_with_main();
        store.delete_manager_window(&main_id, true);
        assert!(store.manager_window(&main_id).is_some());
    }

    #[test]
    fn update_position_skips_geometry_while_maximized() {
        let (mut store, main_id) = store_with_main();
        let moved_display = DisplayInfo {
            id: 2,
            bounds: Rect::new(1920, 0, 2560, 1440),
            work_area: Rect::new(1920, 0, 2560, 1400),
            scale_factor: 1.5,
        };
        store.update_position(&main_id, Rect::new(2000, 5, 1000, 700), true, &moved_display);

        let window = store.manager_window(&main_id).unwrap();
        assert!(window.maximized);
        assert_eq!((window.x, window.y), (10, 10));
        assert_eq!(window.display_id, 2);
        assert_eq!(window.scale_factor, 1.5);

        store.update_position(&main_id, Rect::new(2000, 5, 1000, 700), false, &moved_display);
        let window = store.manager_window(&main_id).unwrap();
        assert_eq!((window.x, window.y), (2000, 5));
        assert!(!window.maximized);
    }

    #[test]
    fn set_active_layout_creates_missing_view() {
        let (mut store, main_id) = store_with_main();
        store.set_active_layout(&main_id, crate::model::SYSTEM_MANAGER_FRAME_ID, "v1", "2-pane");
        let window = store.manager_window(&main_id).unwrap();
        let frame = window
            .manager
            .frames
            .as_ref()
            .unwrap()
            .iter()
            .find(|f| f.id == crate::model::SYSTEM_MANAGER_FRAME_ID)
            .unwrap();
        let view = frame.views.as_ref().unwrap().iter().find(|v| v.id == "v1").unwrap();
        assert_eq!(view.default_layout.as_deref(), Some("2-pane"));
    }

    #[test]
    fn save_as_default_requires_configure_right() {
        let (mut store, _) = store_with_main();
        assert!(matches!(
            store.save_current_as_default(false),
            Err(StoreError::ConfigureRightRequired)
        ));

        store.initialize(None, None, true, &[display()]);
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        store.subscribe_default_changed(move |cfg| {
            assert!(cfg.overrule_allowed);
            c.fetch_add(1, Ordering::SeqCst);
        });
        store.save_current_as_default(true).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(store.default_configuration().unwrap().overrule_allowed);
    }

    #[test]
    fn permissions_follow_default_and_closed_mode() {
        let mut store = ConfigurationStore::new(false);
        // No default: everything user-side is allowed.
        assert!(store.user_specific_configuration_allowed());
        assert!(store.change_current_configuration_allowed());
        assert!(store.close_main_window_allowed());
        assert!(!store.change_default_configuration_allowed());

        // Restrictive default without overrule, user without rights.
        let mut default = MultiMonitorConfiguration::empty();
        default.overrule_allowed = false;
        store.initialize(Some(default), None, false, &[]);
        assert!(!store.user_specific_configuration_allowed());
        assert!(!store.change_current_configuration_allowed());

        // Closed mode wins over everything.
        let mut closed = ConfigurationStore::new(true);
        closed.initialize(None, None, true, &[]);
        assert!(!closed.change_default_configuration_allowed());
        assert!(!closed.change_current_configuration_allowed());
        assert!(!closed.close_main_window_allowed());
    }

    #[test]
    fn initialize_prefers_user_configuration_when_overruled() {
        let mut default = MultiMonitorConfiguration::empty();
        default.overrule_allowed = true;
        let mut user = MultiMonitorConfiguration::empty();
        user.version = 1;

        let mut store = ConfigurationStore::new(false);
        store.initialize(Some(default), Some(user), false, &[]);
        // Migrated and adopted as current.
        assert_eq!(store.current().version, crate::model::CONFIGURATION_VERSION);
        assert!(store.user_specific_configuration_allowed());
    }

    #[test]
    fn initialize_falls_back_to_default_copy() {
        let (mut seed, _) = store_with_main();
        let default = seed.current().clone();

        let mut store = ConfigurationStore::new(false);
        store.initialize(Some(default.clone()), None, false, &[display()]);
        assert_eq!(store.current().windows.len(), 1);
        // A deep copy: mutating current must not touch default.
        let id = store.current().windows[0].id.clone();
        store.set_startup_node(&id, "Sys1.Node");
        assert!(store.default_configuration().unwrap().windows[0]
            .manager
            .startup_node
            .is_none());
    }

    #[test]
    fn reset_diff_helpers() {
        let mut store = ConfigurationStore::new(false);
        store.initialize(None, None, true, &[display()]);
        let main = store
            .new_manager_window(ManagerType::Main, bounds(), false, &display())
            .unwrap();
        store.save_current_as_default(true).unwrap();
        let extra = store
            .new_manager_window(ManagerType::System, bounds(), false, &display())
            .unwrap();

        assert_eq!(store.current_windows_not_in_default(), vec![extra.id.clone()]);
        assert_eq!(store.current_windows_in_default(), vec![main.id.clone()]);
        assert!(store.default_windows_not_started().is_empty());
        assert_eq!(store.default_windows_started().len(), 1);

        // Remove the main from current: it shows up as not started.
        store.current.windows.retain(|w| w.id != main.id);
        assert_eq!(store.default_windows_not_started().len(), 1);
    }

    #[test]
    fn diff_helpers_without_default() {
        let (store, main_id) = store_with_main();
        assert!(store.current_windows_not_in_default().is_empty());
        assert_eq!(store.current_windows_in_default(), vec![main_id]);
        assert!(store.default_windows_not_started().is_empty());
        assert!(store.default_windows_started().is_empty());
    }

    #[test]
    fn align_main_window_id_adopts_default_id() {
        let (mut store, _) = store_with_main();
        let mut default = store.current().clone();
        default.windows[0].id = "default-main".into();
        default.overrule_allowed = true;
        store.default = Some(default);

        assert_eq!(store.align_main_window_id().as_deref(), Some("default-main"));
        assert_eq!(store.current_main_manager().unwrap().id, "default-main");
    }

    #[test]
    fn add_to_current_with_event_demotes_main() {
        let (mut store, main_id) = store_with_main();
        let event = ManagerWindow {
            id: "saved-event".into(),
            manager: ManagerDefinition {
                manager_type: ManagerType::Event,
                frames: Some(frame_template(ManagerType::Event)),
                startup_node: None,
            },
            ..store.current().windows[0].clone()
        };
        store.add_to_current(&[event]);
        assert_eq!(
            store.manager_window(&main_id).unwrap().manager.manager_type,
            ManagerType::MainWoEvent
        );
        assert_eq!(store.current().windows.len(), 2);
    }

    #[test]
    fn communication_rule_matching_via_store() {
        let (mut store, main_id) = store_with_main();
        let system = store
            .new_manager_window(ManagerType::System, bounds(), false, &display())
            .unwrap();
        store.save_communication_rules(vec![CommunicationRule {
            filter_criteria: FilterCriterion {
                filter_type: ObjectFilterType::ObjectDiscipline,
                filter_instance_type: None,
                filter_value: "42".into(),
                filter_value_descriptor: "Building automation".into(),
            },
            source_window_id: None,
            target_window_id: system.id.clone(),
            is_rule_active: true,
        }]);

        let node = ObjectNode {
            designation: "Sys1.A".into(),
            attributes: ObjectAttributes {
                discipline_id: 42,
                function_name: String::new(),
                managed_type_name: String::new(),
                object_model_name: String::new(),
                type_id: 0,
            },
        };
        assert_eq!(
            store.match_communication_rules(&main_id, &node),
            Some(system.id.clone())
        );
        // The target itself never routes to itself.
        assert_eq!(store.match_communication_rules(&system.id, &node), None);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let (mut store, _) = store_with_main();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let id = store.subscribe_current_changed(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        store.save_communication_rules(Vec::new());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        store.unsubscribe_current_changed(id);
        store.save_communication_rules(Vec::new());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
