//! Terminal UI module using ratatui.
//!
//! - `render`: frame rendering, driven by the session state
//! - `input`: keyboard event handling
//! - `styles`: color scheme and text styling

pub mod input;
pub mod render;
pub mod styles;
