//! Frame lifecycle coordination.
//!
//! This crate sequences one frame: acquire a presentable image, hand the
//! caller a recording slot, submit the recorded work with the right
//! semaphore edges, present, and advance to the next slot. A bounded set of
//! frame slots caps how far the CPU can run ahead of the GPU; each slot's
//! fence is the backpressure.
//!
//! The driving state machine lives in [`FrameLoop`]. The GPU side is behind
//! [`FrameBackend`], a closed enum over the swapchain-backed implementation
//! and a headless one used for protocol testing and off-screen runs.

mod backend;
mod error;
mod frame_loop;
mod headless;
mod swapchain_frames;

pub use backend::{AcquireOutcome, FrameBackend, PresentOutcome};
pub use error::{FrameError, Result};
pub use frame_loop::{ActiveFrame, FrameLoop, FrameLoopConfig};
pub use headless::{FrameEvent, HeadlessFrames};
pub use swapchain_frames::{FrameSlot, SwapchainFrames};

/// Default number of frame slots cycled by the loop.
///
/// Two lets the CPU record frame N+1 while the GPU renders frame N. The slot
/// count is independent of the swapchain's negotiated image count.
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;
