//! Terminal UI: layout, per-screen rendering and keyboard handling.

pub mod input;
pub mod render;
pub mod styles;
pub mod tabs;
