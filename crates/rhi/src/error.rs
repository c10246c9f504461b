//! Graphics-layer error types.
//!
//! Every failure surfaced by the native API is converted at the call site
//! into one of these variants. All of them are fatal to the frame loop except
//! the out-of-date surface condition, which is not an error at all: it is
//! reported through return values and answered by a swapchain rebuild.

use thiserror::Error;

/// Graphics-layer error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Raw Vulkan failure at an object-creation site
    #[error("vulkan error: {0}")]
    Vulkan(#[from] ash::vk::Result),

    /// The Vulkan library could not be loaded
    #[error("failed to load vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    /// GPU memory allocation failed
    #[error("allocation error: {0}")]
    Allocation(#[from] gpu_allocator::AllocationError),

    /// No physical device satisfies the requirements
    #[error("no suitable GPU found")]
    NoSuitableGpu,

    /// The surface advertises no usable formats or present modes
    #[error("surface negotiation failed: {0}")]
    SurfaceNegotiation(String),

    /// The execution queue rejected a submission
    #[error("queue submission rejected: {0}")]
    Submission(ash::vk::Result),

    /// Acquire or present failed for a reason other than out-of-date
    #[error("presentation failed: {0}")]
    Presentation(ash::vk::Result),

    /// Shader source failed to compile; carries the compiler's message
    #[error("shader compilation failed: {0}")]
    ShaderCompilation(String),

    /// Shader module loading or validation failed
    #[error("shader error: {0}")]
    Shader(String),

    /// Pipeline configuration was rejected
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Buffer creation or upload misuse
    #[error("buffer error: {0}")]
    Buffer(String),
}

/// Result type alias for graphics-layer operations.
pub type Result<T> = std::result::Result<T, Error>;
