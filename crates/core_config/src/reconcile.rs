//! Display reconciliation.
//!
//! Saved window geometry references a display snapshot taken when the
//! window was last positioned. Between sessions the OS may have moved a
//! display's origin or changed its scale factor; reconciliation rewrites
//! the saved geometry against the live display list and refreshes the
//! snapshot. A window whose display no longer exists is left untouched,
//! the caller decides where it goes instead.

use serde::{Deserialize, Serialize};

use crate::model::{ManagerWindow, MultiMonitorConfiguration};

/// A rectangle in virtual-desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Whether the point lies within the rectangle.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Live state of one display as reported by the window system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInfo {
    pub id: i64,
    pub bounds: Rect,
    pub work_area: Rect,
    pub scale_factor: f64,
}

/// Whether the display referenced by the saved snapshot still exists.
pub fn display_exists(window: &ManagerWindow, displays: &[DisplayInfo]) -> bool {
    displays.iter().any(|d| d.id == window.display_id)
}

/// Finds the display whose bounds contain the rectangle's origin,
/// falling back to the first display.
pub fn display_matching<'a>(bounds: &Rect, displays: &'a [DisplayInfo]) -> Option<&'a DisplayInfo> {
    displays
        .iter()
        .find(|d| d.bounds.contains(bounds.x, bounds.y))
        .or_else(|| displays.first())
}

/// Reconciles one saved window against the live display list.
///
/// If the display still exists but was rescaled, the position is scaled
/// about the saved display origin and the size by the scale ratio; if
/// the origin moved, the position is translated by the delta. The saved
/// display snapshot is refreshed afterwards, which makes a second pass
/// a no-op.
pub fn reconcile_window(window: &mut ManagerWindow, displays: &[DisplayInfo]) {
    let Some(display) = displays.iter().find(|d| d.id == window.display_id) else {
        return;
    };

    if (display.scale_factor - window.scale_factor).abs() > f64::EPSILON {
        let ratio = window.scale_factor / display.scale_factor;
        window.x = (f64::from(window.x - window.display_x) * ratio).round() as i32
            + window.display_x;
        window.y = (f64::from(window.y - window.display_y) * ratio).round() as i32
            + window.display_y;
        window.width = (f64::from(window.width) * ratio).round() as i32;
        window.height = (f64::from(window.height) * ratio).round() as i32;
    }
    if display.bounds.x != window.display_x || display.bounds.y != window.display_y {
        window.x += display.bounds.x - window.display_x;
        window.y += display.bounds.y - window.display_y;
    }

    window.display_x = display.bounds.x;
    window.display_y = display.bounds.y;
    window.display_width = display.bounds.width;
    window.display_height = display.bounds.height;
    window.scale_factor = display.scale_factor;
}

/// Reconciles every window of the configuration.
pub fn reconcile_all(config: &mut MultiMonitorConfiguration, displays: &[DisplayInfo]) {
    for window in &mut config.windows {
        reconcile_window(window, displays);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{frame_template, ManagerDefinition, ManagerType};

    fn saved_window(x: i32, y: i32, width: i32, height: i32) -> ManagerWindow {
        ManagerWindow {
            id: "w1".into(),
            x,
            y,
            width,
            height,
            maximized: false,
            display_id: 1,
            display_x: 0,
            display_y: 0,
            display_width: 1920,
            display_height: 1080,
            scale_factor: 1.0,
            manager: ManagerDefinition {
                manager_type: ManagerType::System,
                frames: Some(frame_template(ManagerType::System)),
                startup_node: None,
            },
        }
    }

    fn display(id: i64, x: i32, y: i32, scale: f64) -> DisplayInfo {
        DisplayInfo {
            id,
            bounds: Rect::new(x, y, 1920, 1080),
            work_area: Rect::new(x, y, 1920, 1040),
            scale_factor: scale,
        }
    }

    #[test]
    fn rescale_about_saved_origin() {
        // Display went from 100% to 200% scale; logical geometry halves.
        let mut win = saved_window(100, 50, 800, 600);
        reconcile_window(&mut win, &[display(1, 0, 0, 2.0)]);
        assert_eq!((win.x, win.y), (50, 25));
        assert_eq!((win.width, win.height), (400, 300));
        assert_eq!(win.scale_factor, 2.0);
    }

    #[test]
    fn translate_when_origin_moved() {
        let mut win = saved_window(100, 50, 800, 600);
        reconcile_window(&mut win, &[display(1, 1920, 0, 1.0)]);
        assert_eq!((win.x, win.y), (2020, 50));
        assert_eq!((win.width, win.height), (800, 600));
        assert_eq!((win.display_x, win.display_y), (1920, 0));
    }

    #[test]
    fn rescale_and_translate_combined() {
        let mut win = saved_window(100, 50, 800, 600);
        reconcile_window(&mut win, &[display(1, 1920, 0, 2.0)]);
        // Rescale about the saved origin first, then translate.
        assert_eq!((win.x, win.y), (1970, 25));
        assert_eq!((win.width, win.height), (400, 300));
    }

    #[test]
    fn idempotent_against_same_displays() {
        let displays = [display(1, 1920, 0, 2.0)];
        let mut win = saved_window(100, 50, 800, 600);
        reconcile_window(&mut win, &displays);
        let after_first = win.clone();
        reconcile_window(&mut win, &displays);
        assert_eq!(win, after_first);
    }

    #[test]
    fn missing_display_leaves_window_untouched() {
        let mut win = saved_window(100, 50, 800, 600);
        let before = win.clone();
        reconcile_window(&mut win, &[display(99, 0, 0, 2.0)]);
        assert_eq!(win, before);
        reconcile_window(&mut win, &[]);
        assert_eq!(win, before);
    }

    #[test]
    fn display_matching_falls_back_to_first() {
        let displays = [display(1, 0, 0, 1.0), display(2, 1920, 0, 1.0)];
        let on_second = display_matching(&Rect::new(2000, 10, 100, 100), &displays);
        assert_eq!(on_second.map(|d| d.id), Some(2));
        let off_screen = display_matching(&Rect::new(-5000, 10, 100, 100), &displays);
        assert_eq!(off_screen.map(|d| d.id), Some(1));
    }
}
