/// Viewport geometry module
///
/// - Rectangles, scroll metrics and per-frame snapshots (geometry.rs)
/// - Edge-triggered surface visibility (visibility.rs)

pub mod geometry;
pub mod visibility;
