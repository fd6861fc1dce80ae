//! Plain geometry shared by the visibility, fill and hydration checks.

/// Axis-aligned rectangle in canvas or container coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Strict overlap; rectangles that only share an edge do not intersect
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x + self.width > other.x
            && self.x < other.x + other.width
            && self.y + self.height > other.y
            && self.y < other.y + other.height
    }

    /// Grow by `margin` on every side
    pub fn expand(&self, margin: f64) -> Rect {
        Rect {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + margin * 2.0,
            height: self.height + margin * 2.0,
        }
    }
}

/// True when `element` lies within `margin` pixels of `viewport`
pub fn near_visible(viewport: &Rect, element: &Rect, margin: f64) -> bool {
    viewport.expand(margin).intersects(element)
}

/// Scroll container measurements, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollMetrics {
    pub scroll_top: u32,
    pub scroll_height: u32,
    pub client_height: u32,
}

impl ScrollMetrics {
    pub fn new(scroll_top: u32, scroll_height: u32, client_height: u32) -> Self {
        Self { scroll_top, scroll_height, client_height }
    }

    /// Content left below the visible part of the container
    pub fn remaining_below(&self) -> i64 {
        self.scroll_height as i64 - self.scroll_top as i64 - self.client_height as i64
    }

    /// The list is under-filled while at most `margin` pixels remain below
    pub fn near_bottom(&self, margin: u32) -> bool {
        self.remaining_below() <= margin as i64
    }
}

/// What the host reports once per frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameSnapshot {
    /// Surface bounds in canvas coordinates
    pub surface: Rect,
    /// Visible part of the canvas, `None` when the host cannot tell
    pub visible_region: Option<Rect>,
    pub scroll: ScrollMetrics,
}
