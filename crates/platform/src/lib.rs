//! opshell platform layer.
//!
//! The shell talks to native windows only through the [`WindowSystem`]
//! trait: creating and closing manager windows, geometry, zoom, page
//! reload, thumbnails and display enumeration. The production embedding
//! provides the native implementation; this crate ships
//! [`SimWindowSystem`], an in-memory window system used by the shell
//! binary when no embedding is attached and by the test suites.

use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

use opshell_core_config::{DisplayInfo, Rect};

/// Runtime identifier of a native window.
pub type WindowId = u64;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("window not found: {0}")]
    WindowNotFound(WindowId),
    #[error("window creation failed: {0}")]
    CreationFailed(String),
}

/// Lifecycle events reported by the window system.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowSystemEvent {
    /// The user asked to close the window (title bar button, Alt+F4).
    /// The shell decides whether the close proceeds.
    CloseRequested(WindowId),
    /// The window is gone.
    Closed(WindowId),
    /// The window was moved or resized.
    Moved(WindowId),
    /// The display topology changed.
    DisplaysChanged,
}

/// Parameters for creating a manager window.
#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub bounds: Rect,
    pub maximized: bool,
    pub title: String,
}

/// The shell's view of the native window system.
pub trait WindowSystem: Send + Sync {
    fn create_window(&self, options: WindowOptions) -> Result<WindowId, PlatformError>;

    /// Destroys the window unconditionally. Close negotiation happens
    /// in the shell before this is called.
    fn close_window(&self, id: WindowId) -> Result<(), PlatformError>;

    /// Brings the window out of the minimized state and focuses it.
    fn restore_and_focus(&self, id: WindowId) -> Result<(), PlatformError>;

    fn bounds(&self, id: WindowId) -> Result<Rect, PlatformError>;
    fn set_bounds(&self, id: WindowId, bounds: Rect, maximized: bool) -> Result<(), PlatformError>;
    fn is_maximized(&self, id: WindowId) -> Result<bool, PlatformError>;

    /// Applies the zoom percentage when given and returns the window's
    /// effective zoom percentage.
    fn set_zoom(&self, id: WindowId, percent: Option<f64>) -> Result<f64, PlatformError>;

    /// Reloads the window's content page.
    fn reload(&self, id: WindowId) -> Result<(), PlatformError>;

    /// Captures a thumbnail of the window as a data URL, when the
    /// window system supports capturing.
    fn capture(&self, id: WindowId) -> Result<Option<String>, PlatformError>;

    fn displays(&self) -> Vec<DisplayInfo>;
}

// ---------------------------------------------------------------------
// In-memory window system
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
struct SimWindow {
    bounds: Rect,
    maximized: bool,
    minimized: bool,
    zoom_percent: f64,
    title: String,
}

struct SimState {
    next_id: WindowId,
    windows: HashMap<WindowId, SimWindow>,
    displays: Vec<DisplayInfo>,
}

/// In-memory [`WindowSystem`].
///
/// Windows are plain records; lifecycle events are delivered through a
/// standard mpsc channel so the shell can bridge them into its event
/// loop with a forwarding thread. Tests drive user interactions with
/// [`SimWindowSystem::request_close`] and
/// [`SimWindowSystem::set_displays`].
pub struct SimWindowSystem {
    state: Mutex<SimState>,
    event_tx: Sender<WindowSystemEvent>,
}

impl SimWindowSystem {
    /// Creates the window system with a single 1920x1080 display at the
    /// origin. Returns the receiving end of the lifecycle events.
    pub fn new() -> (Self, Receiver<WindowSystemEvent>) {
        let display = DisplayInfo {
            id: 1,
            bounds: Rect::new(0, 0, 1920, 1080),
            work_area: Rect::new(0, 0, 1920, 1040),
            scale_factor: 1.0,
        };
        Self::with_displays(vec![display])
    }

    pub fn with_displays(displays: Vec<DisplayInfo>) -> (Self, Receiver<WindowSystemEvent>) {
        let (event_tx, event_rx) = channel();
        let sim = Self {
            state: Mutex::new(SimState {
                next_id: 0,
                windows: HashMap::new(),
                displays,
            }),
            event_tx,
        };
        (sim, event_rx)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, event: WindowSystemEvent) {
        // Receiver dropped means the shell is shutting down.
        let _ = self.event_tx.send(event);
    }

    /// Simulates the user pressing the window's close button.
    pub fn request_close(&self, id: WindowId) {
        self.emit(WindowSystemEvent::CloseRequested(id));
    }

    /// Replaces the display list and reports the topology change.
    pub fn set_displays(&self, displays: Vec<DisplayInfo>) {
        self.lock().displays = displays;
        self.emit(WindowSystemEvent::DisplaysChanged);
    }

    pub fn window_exists(&self, id: WindowId) -> bool {
        self.lock().windows.contains_key(&id)
    }

    pub fn open_window_count(&self) -> usize {
        self.lock().windows.len()
    }

    pub fn title(&self, id: WindowId) -> Option<String> {
        self.lock().windows.get(&id).map(|w| w.title.clone())
    }
}

impl WindowSystem for SimWindowSystem {
    fn create_window(&self, options: WindowOptions) -> Result<WindowId, PlatformError> {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.windows.insert(
            id,
            SimWindow {
                bounds: options.bounds,
                maximized: options.maximized,
                minimized: false,
                zoom_percent: 100.0,
                title: options.title,
            },
        );
        debug!(id, "sim window created");
        Ok(id)
    }

    fn close_window(&self, id: WindowId) -> Result<(), PlatformError> {
        let removed = self.lock().windows.remove(&id);
        if removed.is_none() {
            return Err(PlatformError::WindowNotFound(id));
        }
        debug!(id, "sim window closed");
        self.emit(WindowSystemEvent::Closed(id));
        Ok(())
    }

    fn restore_and_focus(&self, id: WindowId) -> Result<(), PlatformError> {
        let mut state = self.lock();
        let window = state
            .windows
            .get_mut(&id)
            .ok_or(PlatformError::WindowNotFound(id))?;
        window.minimized = false;
        Ok(())
    }

    fn bounds(&self, id: WindowId) -> Result<Rect, PlatformError> {
        self.lock()
            .windows
            .get(&id)
            .map(|w| w.bounds)
            .ok_or(PlatformError::WindowNotFound(id))
    }

    fn set_bounds(&self, id: WindowId, bounds: Rect, maximized: bool) -> Result<(), PlatformError> {
        let mut state = self.lock();
        let window = state
            .windows
            .get_mut(&id)
            .ok_or(PlatformError::WindowNotFound(id))?;
        window.bounds = bounds;
        window.maximized = maximized;
        drop(state);
        self.emit(WindowSystemEvent::Moved(id));
        Ok(())
    }

    fn is_maximized(&self, id: WindowId) -> Result<bool, PlatformError> {
        self.lock()
            .windows
            .get(&id)
            .map(|w| w.maximized)
            .ok_or(PlatformError::WindowNotFound(id))
    }

    fn set_zoom(&self, id: WindowId, percent: Option<f64>) -> Result<f64, PlatformError> {
        let mut state = self.lock();
        let window = state
            .windows
            .get_mut(&id)
            .ok_or(PlatformError::WindowNotFound(id))?;
        if let Some(percent) = percent {
            window.zoom_percent = percent;
        }
        Ok(window.zoom_percent)
    }

    fn reload(&self, id: WindowId) -> Result<(), PlatformError> {
        if !self.lock().windows.contains_key(&id) {
            return Err(PlatformError::WindowNotFound(id));
        }
        debug!(id, "sim window reloaded");
        Ok(())
    }

    fn capture(&self, id: WindowId) -> Result<Option<String>, PlatformError> {
        if !self.lock().windows.contains_key(&id) {
            return Err(PlatformError::WindowNotFound(id));
        }
        // The in-memory system has no pixels to offer.
        Ok(None)
    }

    fn displays(&self) -> Vec<DisplayInfo> {
        self.lock().displays.clone()
    }
}
