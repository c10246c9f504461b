//! Windowing and input for the prism workspace.
//!
//! Wraps winit window creation, Vulkan surface creation, and keyboard state
//! tracking. Everything Vulkan-specific beyond the surface lives in
//! `prism-rhi`.

mod input;
mod window;

pub use input::{InputState, KeyCode};
pub use window::{Surface, Window};
