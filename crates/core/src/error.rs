//! Platform-level error types.

use thiserror::Error;

/// Errors raised outside the graphics layer (windowing, IO, setup).
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or handle access failed
    #[error("window error: {0}")]
    Window(String),

    /// A Vulkan call failed before the RHI error type applies
    #[error("vulkan error: {0}")]
    Vulkan(String),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything that should never happen
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias using the platform [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
