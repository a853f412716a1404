//! Platform-agnostic multi-monitor configuration engine.
//!
//! This crate owns everything about manager windows that does not need
//! a live window system: the persisted configuration documents and
//! their schema (`model`), the store enforcing the window-set
//! invariants (`store`), reconciliation of saved geometry against the
//! live display list (`reconcile`) and the event communication rules
//! (`rules`).

pub mod model;
pub mod reconcile;
pub mod rules;
pub mod store;

pub use model::{
    frame_template, new_window_config_id, CommunicationRule, FilterCriterion, FrameDefinition,
    ManagerDefinition, ManagerInfo, ManagerType, ManagerWindow, MultiMonitorConfiguration,
    ObjectAttributes, ObjectFilterInstanceType, ObjectFilterType, ObjectNode, ViewDefinition,
    CONFIGURATION_VERSION, MAX_WINDOWS,
};
pub use reconcile::{DisplayInfo, Rect};
pub use store::{ConfigurationStore, CreationError, StoreError, SubscriptionId};
