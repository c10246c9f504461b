//! The per-frame state machine.
//!
//! [`FrameLoop`] owns a [`FrameBackend`] and cycles its frame slots:
//!
//! 1. `begin_frame` waits on the current slot's fence, acquires an image,
//!    and opens the slot's command buffer for recording.
//! 2. The caller records rendering commands.
//! 3. `end_frame` submits with the slot's semaphore edges, presents, and
//!    advances to the next slot.
//!
//! An out-of-date surface is not an error: `begin_frame` rebuilds the image
//! set and returns `None` for that tick, and a stale present triggers the
//! same rebuild after the frame's content is discarded. Every other native
//! failure propagates as a fatal error.
//!
//! # Example
//!
//! ```
//! use prism_frame::{FrameBackend, FrameLoop, HeadlessFrames};
//!
//! # fn main() -> prism_frame::Result<()> {
//! let backend = FrameBackend::Headless(HeadlessFrames::new(2, 3));
//! let mut frames = FrameLoop::new(backend);
//!
//! for _ in 0..3 {
//!     let Some(frame) = frames.begin_frame()? else {
//!         // Surface was rebuilt; try again next tick
//!         continue;
//!     };
//!     // record commands for frame.slot targeting frame.image_index ...
//!     assert!(frame.slot < frames.slot_count());
//!     frames.end_frame()?;
//! }
//! # Ok(())
//! # }
//! ```

use tracing::debug;

use crate::backend::{AcquireOutcome, FrameBackend, PresentOutcome};
use crate::error::{FrameError, Result};

/// Tuning knobs for the frame loop.
#[derive(Clone, Copy, Debug)]
pub struct FrameLoopConfig {
    /// How long `begin_frame` may block on the slot fence, in nanoseconds.
    pub fence_timeout_ns: u64,
}

impl Default for FrameLoopConfig {
    fn default() -> Self {
        Self {
            // Effectively wait forever
            fence_timeout_ns: u64::MAX,
        }
    }
}

/// Handle to the frame currently being recorded.
///
/// `slot` indexes per-slot resources (command buffer, semaphores, fence);
/// `image_index` indexes the presentable image set. The two counters have
/// different cardinalities and are never interchangeable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveFrame {
    /// Index of the frame slot in use.
    pub slot: usize,
    /// Index of the acquired presentable image.
    pub image_index: u32,
}

/// Loop state between calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoopState {
    Idle,
    Recording { image_index: u32 },
}

/// Sequences frames over a [`FrameBackend`].
///
/// Single-threaded by design: one CPU thread drives the loop, and the fence
/// wait in `begin_frame` is its only blocking call.
pub struct FrameLoop {
    backend: FrameBackend,
    fence_timeout_ns: u64,
    current_slot: usize,
    state: LoopState,
}

impl FrameLoop {
    /// Creates a frame loop with the default configuration.
    pub fn new(backend: FrameBackend) -> Self {
        Self::with_config(backend, FrameLoopConfig::default())
    }

    /// Creates a frame loop with an explicit configuration.
    pub fn with_config(backend: FrameBackend, config: FrameLoopConfig) -> Self {
        Self {
            backend,
            fence_timeout_ns: config.fence_timeout_ns,
            current_slot: 0,
            state: LoopState::Idle,
        }
    }

    /// The backend being driven.
    #[inline]
    pub fn backend(&self) -> &FrameBackend {
        &self.backend
    }

    /// Mutable access to the backend.
    #[inline]
    pub fn backend_mut(&mut self) -> &mut FrameBackend {
        &mut self.backend
    }

    /// Index of the slot the next (or current) frame uses.
    #[inline]
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Number of frame slots being cycled.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.backend.slot_count()
    }

    /// Notes a new window size. The next `begin_frame` rebuilds the image
    /// set and skips its frame.
    pub fn handle_resize(&mut self, width: u32, height: u32) {
        self.backend.handle_resize(width, height);
    }

    /// Starts a frame on the current slot.
    ///
    /// Blocks on the slot's completion fence, then acquires an image with
    /// the slot's acquire semaphore. On success the slot's command buffer is
    /// reset and opened, and the returned [`ActiveFrame`] carries the slot
    /// and image indices.
    ///
    /// Returns `Ok(None)` when the surface was out of date: the image set
    /// has been rebuilt, no frame is in progress, and the caller should try
    /// again next tick.
    ///
    /// # Errors
    ///
    /// [`FrameError::AlreadyRecording`] when a frame is already in progress;
    /// otherwise any fatal graphics failure (fence wait, acquire, rebuild).
    pub fn begin_frame(&mut self) -> Result<Option<ActiveFrame>> {
        if let LoopState::Recording { .. } = self.state {
            return Err(FrameError::AlreadyRecording);
        }

        let slot = self.current_slot;
        self.backend.wait_fence(slot, self.fence_timeout_ns)?;

        match self.backend.acquire(slot)? {
            AcquireOutcome::OutOfDate => {
                debug!("Acquire reported out of date, rebuilding image set");
                self.backend.rebuild()?;
                Ok(None)
            }
            AcquireOutcome::Ready {
                image_index,
                suboptimal,
            } => {
                // Slot indices and image indices have different ranges; the
                // acquired index must address the image set, never the slots
                debug_assert!(
                    (image_index as usize) < self.backend.image_count(),
                    "acquired image index {} out of range for {} images",
                    image_index,
                    self.backend.image_count()
                );

                if suboptimal {
                    debug!("Acquire reported a suboptimal surface");
                }

                // Only reset the fence once work will definitely be submitted
                // on this slot; resetting earlier could deadlock a skipped
                // frame's next wait
                self.backend.reset_fence(slot)?;
                self.backend.begin_recording(slot)?;

                self.state = LoopState::Recording { image_index };
                Ok(Some(ActiveFrame { slot, image_index }))
            }
        }
    }

    /// Finishes the frame in progress: submit, present, advance.
    ///
    /// The submission waits on the slot's acquire semaphore at the
    /// color-attachment-output stage, signals its rendering-finished
    /// semaphore, and arms its completion fence. Presentation waits on the
    /// rendering-finished semaphore. A stale present rebuilds the image set;
    /// the frame's content is discarded, not retried.
    ///
    /// # Errors
    ///
    /// [`FrameError::NotRecording`] when no frame is in progress, and any
    /// fatal submission or presentation failure.
    pub fn end_frame(&mut self) -> Result<()> {
        let LoopState::Recording { image_index } = self.state else {
            return Err(FrameError::NotRecording);
        };

        let slot = self.current_slot;
        self.backend.end_recording(slot)?;
        self.backend.submit(slot)?;

        match self.backend.present(slot, image_index)? {
            PresentOutcome::Stale => {
                debug!("Present reported a stale surface, rebuilding image set");
                self.backend.rebuild()?;
            }
            PresentOutcome::Presented => {}
        }

        self.current_slot = (self.current_slot + 1) % self.backend.slot_count();
        self.state = LoopState::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessFrames;

    fn headless_loop(slots: usize, images: usize) -> FrameLoop {
        FrameLoop::new(FrameBackend::Headless(HeadlessFrames::new(slots, images)))
    }

    #[test]
    fn begin_twice_is_an_error() {
        let mut frames = headless_loop(2, 3);
        frames.begin_frame().unwrap().unwrap();
        assert!(matches!(
            frames.begin_frame(),
            Err(FrameError::AlreadyRecording)
        ));
    }

    #[test]
    fn end_without_begin_is_an_error() {
        let mut frames = headless_loop(2, 3);
        assert!(matches!(frames.end_frame(), Err(FrameError::NotRecording)));
    }

    #[test]
    fn end_after_skipped_frame_is_an_error() {
        let mut frames = headless_loop(2, 3);
        frames
            .backend_mut()
            .as_headless_mut()
            .unwrap()
            .script_acquire(AcquireOutcome::OutOfDate);

        assert!(frames.begin_frame().unwrap().is_none());
        assert!(matches!(frames.end_frame(), Err(FrameError::NotRecording)));
    }

    #[test]
    fn default_config_waits_forever() {
        assert_eq!(FrameLoopConfig::default().fence_timeout_ns, u64::MAX);
    }
}
