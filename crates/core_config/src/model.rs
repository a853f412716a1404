//! Persisted multi-monitor configuration schema.
//!
//! The documents produced here are stored and exchanged as whole JSON
//! blobs, so every struct keeps the camelCase field names of the
//! persisted schema (version 2).

use serde::{Deserialize, Serialize};
use tracing::info;

/// Current schema version of [`MultiMonitorConfiguration`].
pub const CONFIGURATION_VERSION: u32 = 2;

/// Hard cap on the number of manager windows in one configuration.
pub const MAX_WINDOWS: usize = 10;

pub const SUMMARY_BAR_FRAME_ID: &str = "summary-bar";
pub const ABOUT_FRAME_ID: &str = "about-frame-id";
pub const INVESTIGATIVE_FRAME_ID: &str = "investigative";
pub const ACCOUNT_FRAME_ID: &str = "account-frame-id";
pub const NOTIFICATION_CONFIGURATION_FRAME_ID: &str = "notifconfig-frame-id";
pub const EVENT_LIST_FRAME_ID: &str = "event-list";
pub const SYSTEM_MANAGER_FRAME_ID: &str = "system-manager";
pub const OPERATOR_TASK_FRAME_ID: &str = "operator-task";
pub const EASY_NAVIGATION_FRAME_ID: &str = "easy-navigation-bar-frame-id";

/// Role of a manager window.
///
/// At most one window carries a main role (`Main` or `MainWoEvent`) and
/// at most one is a detached `Event` manager. Creating an event manager
/// demotes `Main` to `MainWoEvent`; closing it promotes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagerType {
    #[serde(rename = "main")]
    Main,
    #[serde(rename = "main-wo-event")]
    MainWoEvent,
    #[serde(rename = "system")]
    System,
    #[serde(rename = "event")]
    Event,
}

impl ManagerType {
    /// True for the roles that own the main window.
    pub fn is_main_role(self) -> bool {
        matches!(self, ManagerType::Main | ManagerType::MainWoEvent)
    }

    /// True for the roles that host the event list.
    pub fn is_event_like(self) -> bool {
        matches!(self, ManagerType::Main | ManagerType::Event)
    }
}

/// A view inside a frame, with an optionally pinned layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDefinition {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_layout: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDefinition {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<Vec<ViewDefinition>>,
}

impl FrameDefinition {
    fn empty(id: &str) -> Self {
        Self { id: id.to_owned(), views: Some(Vec::new()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerDefinition {
    pub manager_type: ManagerType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<FrameDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_node: Option<String>,
}

/// Saved state of one manager window: geometry plus a snapshot of the
/// display it was last seen on. The snapshot is what lets the display
/// reconciler re-place the window after monitor changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerWindow {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub maximized: bool,
    pub display_id: i64,
    pub display_x: i32,
    pub display_y: i32,
    pub display_width: i32,
    pub display_height: i32,
    pub scale_factor: f64,
    pub manager: ManagerDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiMonitorConfiguration {
    pub version: u32,
    pub windows: Vec<ManagerWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub communication_rules: Option<Vec<CommunicationRule>>,
    #[serde(default)]
    pub overrule_allowed: bool,
}

impl MultiMonitorConfiguration {
    /// An empty document at the current schema version.
    pub fn empty() -> Self {
        Self {
            version: CONFIGURATION_VERSION,
            windows: Vec::new(),
            communication_rules: Some(Vec::new()),
            overrule_allowed: false,
        }
    }

    /// Migrates an older document in place to the current version.
    ///
    /// Version 1 to 2 only added the optional communication rules, so
    /// the migration is a version bump. Unknown newer versions are
    /// left untouched.
    pub fn migrate(&mut self) {
        if self.version == 1 {
            info!(
                old_version = self.version,
                new_version = CONFIGURATION_VERSION,
                "migrating multi-monitor configuration"
            );
            self.version = CONFIGURATION_VERSION;
        }
    }
}

/// Payload describing a manager to the content of its window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_to_create: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_definition: Option<ManagerDefinition>,
}

impl ManagerInfo {
    /// Builds the info sent to a window content for the given manager
    /// definition, listing the per-role frame template ids.
    pub fn for_definition(definition: &ManagerDefinition) -> Self {
        let frames = frame_template(definition.manager_type);
        Self {
            frames_to_create: Some(frames.iter().map(|f| f.id.clone()).collect()),
            manager_definition: Some(definition.clone()),
        }
    }
}

/// The static per-role frame template.
pub fn frame_template(manager_type: ManagerType) -> Vec<FrameDefinition> {
    let ids: &[&str] = match manager_type {
        ManagerType::Main => &[
            SUMMARY_BAR_FRAME_ID,
            INVESTIGATIVE_FRAME_ID,
            SYSTEM_MANAGER_FRAME_ID,
            ABOUT_FRAME_ID,
            ACCOUNT_FRAME_ID,
            NOTIFICATION_CONFIGURATION_FRAME_ID,
            EVENT_LIST_FRAME_ID,
            OPERATOR_TASK_FRAME_ID,
            EASY_NAVIGATION_FRAME_ID,
        ],
        ManagerType::MainWoEvent => &[
            SUMMARY_BAR_FRAME_ID,
            INVESTIGATIVE_FRAME_ID,
            SYSTEM_MANAGER_FRAME_ID,
            ABOUT_FRAME_ID,
            ACCOUNT_FRAME_ID,
            NOTIFICATION_CONFIGURATION_FRAME_ID,
            OPERATOR_TASK_FRAME_ID,
            EASY_NAVIGATION_FRAME_ID,
        ],
        ManagerType::System => &[
            SYSTEM_MANAGER_FRAME_ID,
            INVESTIGATIVE_FRAME_ID,
            ABOUT_FRAME_ID,
            ACCOUNT_FRAME_ID,
            EASY_NAVIGATION_FRAME_ID,
        ],
        ManagerType::Event => &[
            SUMMARY_BAR_FRAME_ID,
            INVESTIGATIVE_FRAME_ID,
            ABOUT_FRAME_ID,
            EVENT_LIST_FRAME_ID,
        ],
    };
    ids.iter().map(|id| FrameDefinition::empty(id)).collect()
}

/// Generates a fresh configuration id for a manager window.
pub fn new_window_config_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------
// Communication rules
// ---------------------------------------------------------------------

/// Filter dimension of a communication rule criterion.
///
/// Serialized with the display strings the persisted schema uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectFilterType {
    #[serde(rename = "Object function")]
    ObjectFunction,
    #[serde(rename = "Object model")]
    ObjectModel,
    #[serde(rename = "Object type")]
    ObjectType,
    #[serde(rename = "Object discipline")]
    ObjectDiscipline,
    #[serde(rename = "Object instance")]
    ObjectInstance,
    #[serde(rename = "Object managed type")]
    ObjectManagedType,
}

/// Hierarchy scope for instance rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectFilterInstanceType {
    #[serde(rename = "Only instance")]
    OnlyInstance,
    #[serde(rename = "Only children")]
    OnlyChildren,
    #[serde(rename = "Only recursive children")]
    OnlyRecursiveChildren,
    #[serde(rename = "Instance and children")]
    InstanceAndChildren,
    #[serde(rename = "Instance and recursive children")]
    InstanceAndRecursiveChildren,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriterion {
    pub filter_type: ObjectFilterType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_instance_type: Option<ObjectFilterInstanceType>,
    pub filter_value: String,
    pub filter_value_descriptor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationRule {
    pub filter_criteria: FilterCriterion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_window_id: Option<String>,
    pub target_window_id: String,
    pub is_rule_active: bool,
}

/// A system object as selected in a browser tree, the subject of
/// rule matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectNode {
    pub designation: String,
    pub attributes: ObjectAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectAttributes {
    pub discipline_id: i64,
    pub function_name: String,
    pub managed_type_name: String,
    pub object_model_name: String,
    pub type_id: i64,
}
