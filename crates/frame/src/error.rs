//! Frame-loop error types.

use thiserror::Error;

/// Errors surfaced by the frame loop.
///
/// Calling `begin_frame` twice or `end_frame` without a frame in progress is
/// a programmer error. It is reported as an error value in every build, never
/// silently ignored.
#[derive(Error, Debug)]
pub enum FrameError {
    /// A graphics-layer failure (submission, presentation, rebuild).
    #[error(transparent)]
    Graphics(#[from] prism_rhi::Error),

    /// `begin_frame` was called while a frame was already being recorded.
    #[error("begin_frame called while a frame is already being recorded")]
    AlreadyRecording,

    /// `end_frame` was called with no frame in progress.
    #[error("end_frame called with no frame in progress")]
    NotRecording,
}

/// Result type alias for frame-loop operations.
pub type Result<T> = std::result::Result<T, FrameError>;
