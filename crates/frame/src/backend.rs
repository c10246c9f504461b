//! The backend a [`FrameLoop`](crate::FrameLoop) drives.
//!
//! [`FrameBackend`] is a closed enum over the implementations, dispatched by
//! an explicit match per operation. The swapchain variant talks to the real
//! device; the headless variant simulates the protocol and records every
//! operation for verification.

use crate::error::Result;
use crate::headless::HeadlessFrames;
use crate::swapchain_frames::SwapchainFrames;

/// Outcome of an acquire attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is available for rendering.
    Ready {
        /// Index into the presentable image set.
        image_index: u32,
        /// The surface no longer matches the window exactly; the image is
        /// still usable and a rebuild will follow at present time.
        suboptimal: bool,
    },
    /// The surface is out of date; rebuild and skip this frame.
    OutOfDate,
}

/// Outcome of a present request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    /// The image was queued for display.
    Presented,
    /// The image was handed over, but the surface is out of date or
    /// suboptimal and must be rebuilt before the next frame.
    Stale,
}

/// The set of frame backend implementations.
pub enum FrameBackend {
    /// Renders to a window through a swapchain.
    Swapchain(Box<SwapchainFrames>),
    /// No device; simulates the protocol and records events.
    Headless(HeadlessFrames),
}

impl FrameBackend {
    /// Blocks until `slot`'s previous work has completed.
    pub fn wait_fence(&mut self, slot: usize, timeout_ns: u64) -> Result<()> {
        match self {
            FrameBackend::Swapchain(frames) => frames.wait_fence(slot, timeout_ns),
            FrameBackend::Headless(frames) => frames.wait_fence(slot, timeout_ns),
        }
    }

    /// Resets `slot`'s fence to unsignaled.
    pub fn reset_fence(&mut self, slot: usize) -> Result<()> {
        match self {
            FrameBackend::Swapchain(frames) => frames.reset_fence(slot),
            FrameBackend::Headless(frames) => frames.reset_fence(slot),
        }
    }

    /// Requests the next presentable image, signaling `slot`'s acquire
    /// semaphore when it becomes available.
    pub fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome> {
        match self {
            FrameBackend::Swapchain(frames) => frames.acquire(slot),
            FrameBackend::Headless(frames) => frames.acquire(slot),
        }
    }

    /// Resets and begins `slot`'s command buffer.
    pub fn begin_recording(&mut self, slot: usize) -> Result<()> {
        match self {
            FrameBackend::Swapchain(frames) => frames.begin_recording(slot),
            FrameBackend::Headless(frames) => frames.begin_recording(slot),
        }
    }

    /// Finishes recording on `slot`'s command buffer.
    pub fn end_recording(&mut self, slot: usize) -> Result<()> {
        match self {
            FrameBackend::Swapchain(frames) => frames.end_recording(slot),
            FrameBackend::Headless(frames) => frames.end_recording(slot),
        }
    }

    /// Submits `slot`'s recorded work to the execution queue and arms the
    /// slot fence.
    pub fn submit(&mut self, slot: usize) -> Result<()> {
        match self {
            FrameBackend::Swapchain(frames) => frames.submit(slot),
            FrameBackend::Headless(frames) => frames.submit(slot),
        }
    }

    /// Requests presentation of `image_index`, waiting on `slot`'s
    /// rendering-finished semaphore.
    pub fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
        match self {
            FrameBackend::Swapchain(frames) => frames.present(slot, image_index),
            FrameBackend::Headless(frames) => frames.present(slot, image_index),
        }
    }

    /// Tears down and rebuilds the presentable image set at the current size.
    pub fn rebuild(&mut self) -> Result<()> {
        match self {
            FrameBackend::Swapchain(frames) => frames.rebuild(),
            FrameBackend::Headless(frames) => frames.rebuild(),
        }
    }

    /// Notes a new window size; the next acquire reports out of date and the
    /// rebuild picks the size up.
    pub fn handle_resize(&mut self, width: u32, height: u32) {
        match self {
            FrameBackend::Swapchain(frames) => frames.handle_resize(width, height),
            FrameBackend::Headless(_) => {}
        }
    }

    /// Number of frame slots.
    pub fn slot_count(&self) -> usize {
        match self {
            FrameBackend::Swapchain(frames) => frames.slot_count(),
            FrameBackend::Headless(frames) => frames.slot_count(),
        }
    }

    /// Number of presentable images. Independent of the slot count.
    pub fn image_count(&self) -> usize {
        match self {
            FrameBackend::Swapchain(frames) => frames.image_count(),
            FrameBackend::Headless(frames) => frames.image_count(),
        }
    }

    /// The swapchain-backed implementation, when that is what this is.
    pub fn as_swapchain(&self) -> Option<&SwapchainFrames> {
        match self {
            FrameBackend::Swapchain(frames) => Some(frames),
            FrameBackend::Headless(_) => None,
        }
    }

    /// Mutable access to the swapchain-backed implementation.
    pub fn as_swapchain_mut(&mut self) -> Option<&mut SwapchainFrames> {
        match self {
            FrameBackend::Swapchain(frames) => Some(frames),
            FrameBackend::Headless(_) => None,
        }
    }

    /// The headless implementation, when that is what this is.
    pub fn as_headless(&self) -> Option<&HeadlessFrames> {
        match self {
            FrameBackend::Swapchain(_) => None,
            FrameBackend::Headless(frames) => Some(frames),
        }
    }

    /// Mutable access to the headless implementation.
    pub fn as_headless_mut(&mut self) -> Option<&mut HeadlessFrames> {
        match self {
            FrameBackend::Swapchain(_) => None,
            FrameBackend::Headless(frames) => Some(frames),
        }
    }
}
