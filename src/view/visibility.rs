//! Edge-triggered visibility of the surface inside the host canvas.

use super::geometry::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityChange {
    Hidden,
    Shown,
}

/// Polled once per frame; reports only transitions
#[derive(Debug, Clone)]
pub struct VisibilityMonitor {
    visible: bool,
    active: bool,
}

impl Default for VisibilityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilityMonitor {
    /// Starts visible, matching a freshly attached surface
    pub fn new() -> Self {
        Self { visible: true, active: true }
    }

    /// Compare the surface against the visible region. A missing region counts as visible.
    pub fn tick(&mut self, surface: &Rect, region: Option<&Rect>) -> Option<VisibilityChange> {
        if !self.active {
            return None;
        }

        let now = region.map_or(true, |region| surface.intersects(region));
        if now == self.visible {
            return None;
        }

        self.visible = now;
        Some(if now { VisibilityChange::Shown } else { VisibilityChange::Hidden })
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Stop reporting; later ticks are no-ops
    pub fn cancel(&mut self) {
        self.active = false;
    }
}
