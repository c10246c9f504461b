//! The swapchain-backed frame backend.
//!
//! Owns the frame slots (command buffer + synchronization bundle per slot)
//! and the swapchain they render into. All slots are created together at
//! construction and destroyed together; the set is never resized.
//!
//! # Synchronization
//!
//! ```text
//! 1. wait on the slot's in-flight fence  (CPU waits for the slot's last use)
//! 2. acquire an image                    (signals image_available)
//! 3. reset the fence, record commands
//! 4. submit: wait image_available at color-attachment-output,
//!            signal render_finished, arm the in-flight fence
//! 5. present: wait render_finished
//! ```
//!
//! Rendering for a frame therefore never starts before the presentation
//! engine has released the acquired image; the edge is the semaphore, not a
//! CPU wait.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use prism_rhi::Error;
use prism_rhi::command::{CommandBuffer, CommandPool};
use prism_rhi::device::Device;
use prism_rhi::submit::{PresentRequest, SubmitRequest};
use prism_rhi::swapchain::Swapchain;
use prism_rhi::sync::{Fence, Semaphore};

use crate::backend::{AcquireOutcome, PresentOutcome};
use crate::error::Result;

/// Per-slot rendering resources.
///
/// Each slot owns a command buffer, an "image acquired" semaphore, a
/// "rendering finished" semaphore, and a CPU-waitable completion fence. The
/// fence starts signaled so the slot's first use does not block.
pub struct FrameSlot {
    /// Command buffer re-recorded each time the slot is used.
    command_buffer: CommandBuffer,
    /// Signaled when the presentation engine releases an image to this slot.
    image_available: Semaphore,
    /// Signaled when this slot's rendering completes.
    render_finished: Semaphore,
    /// Armed at submit; gates the next reuse of this slot.
    in_flight: Fence,
}

impl FrameSlot {
    fn new(device: Arc<Device>, command_pool: &CommandPool) -> prism_rhi::Result<Self> {
        let command_buffer = CommandBuffer::new(device.clone(), command_pool)?;
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            command_buffer,
            image_available,
            render_finished,
            in_flight,
        })
    }

    /// The slot's command buffer.
    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    /// The slot's "image acquired" semaphore.
    #[inline]
    pub fn image_available(&self) -> &Semaphore {
        &self.image_available
    }

    /// The slot's "rendering finished" semaphore.
    #[inline]
    pub fn render_finished(&self) -> &Semaphore {
        &self.render_finished
    }

    /// The slot's completion fence.
    #[inline]
    pub fn in_flight(&self) -> &Fence {
        &self.in_flight
    }
}

/// Frame backend that renders through a swapchain.
pub struct SwapchainFrames {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// The presentable image set.
    swapchain: Swapchain,
    /// Surface handle, needed for rebuilds. The owning `Surface` must
    /// outlive this backend.
    surface: vk::SurfaceKHR,
    /// Fixed set of frame slots, cycled round-robin by the loop.
    slots: Vec<FrameSlot>,
    /// Latest known window size, used at rebuild time.
    extent: (u32, u32),
    /// Set on resize; surfaces as an out-of-date acquire.
    pending_resize: bool,
}

impl SwapchainFrames {
    /// Creates `frames_in_flight` slots over `swapchain`.
    ///
    /// # Errors
    ///
    /// Fails when slot resource creation is rejected.
    pub fn new(
        device: Arc<Device>,
        command_pool: &CommandPool,
        swapchain: Swapchain,
        surface: vk::SurfaceKHR,
        frames_in_flight: usize,
    ) -> Result<Self> {
        let mut slots = Vec::with_capacity(frames_in_flight);
        for i in 0..frames_in_flight {
            slots.push(FrameSlot::new(device.clone(), command_pool)?);
            debug!("Created frame slot {}", i);
        }

        let extent = swapchain.extent();

        info!(
            "Frame backend created: {} slots over {} swapchain images",
            frames_in_flight,
            swapchain.image_count()
        );

        Ok(Self {
            device,
            swapchain,
            surface,
            slots,
            extent: (extent.width, extent.height),
            pending_resize: false,
        })
    }

    /// The swapchain this backend renders into.
    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// The slot at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }

    /// Reference to the device.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub(crate) fn wait_fence(&mut self, slot: usize, timeout_ns: u64) -> Result<()> {
        self.slots[slot].in_flight.wait(timeout_ns)?;
        Ok(())
    }

    pub(crate) fn reset_fence(&mut self, slot: usize) -> Result<()> {
        self.slots[slot].in_flight.reset()?;
        Ok(())
    }

    pub(crate) fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome> {
        // A resized window invalidates the current image set the same way an
        // out-of-date acquire does
        if self.pending_resize {
            debug!("Pending resize, treating acquire as out of date");
            return Ok(AcquireOutcome::OutOfDate);
        }

        match self
            .swapchain
            .acquire_next_image(self.slots[slot].image_available.handle())
        {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Surface out of date during acquire");
                Ok(AcquireOutcome::OutOfDate)
            }
            Err(e) => Err(Error::Presentation(e).into()),
        }
    }

    pub(crate) fn begin_recording(&mut self, slot: usize) -> Result<()> {
        let command_buffer = &self.slots[slot].command_buffer;
        command_buffer.reset()?;
        command_buffer.begin()?;
        Ok(())
    }

    pub(crate) fn end_recording(&mut self, slot: usize) -> Result<()> {
        self.slots[slot].command_buffer.end()?;
        Ok(())
    }

    pub(crate) fn submit(&mut self, slot: usize) -> Result<()> {
        let frame = &self.slots[slot];

        let wait_semaphores = [frame.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame.render_finished.handle()];
        let command_buffers = [frame.command_buffer.handle()];

        self.device.submit(&SubmitRequest {
            wait_semaphores: &wait_semaphores,
            wait_stages: &wait_stages,
            signal_semaphores: &signal_semaphores,
            command_buffers: &command_buffers,
            fence: frame.in_flight.handle(),
        })?;

        Ok(())
    }

    pub(crate) fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
        let wait_semaphores = [self.slots[slot].render_finished.handle()];

        let result = self.swapchain.present(
            self.device.present_queue(),
            &PresentRequest {
                wait_semaphores: &wait_semaphores,
                image_index,
            },
        );

        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => {
                debug!("Surface suboptimal during present");
                Ok(PresentOutcome::Stale)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Surface out of date during present");
                Ok(PresentOutcome::Stale)
            }
            Err(e) => Err(Error::Presentation(e).into()),
        }
    }

    pub(crate) fn rebuild(&mut self) -> Result<()> {
        // recreate() waits for device idle before tearing anything down
        self.swapchain
            .recreate(self.surface, self.extent.0, self.extent.1)?;
        self.pending_resize = false;
        Ok(())
    }

    pub(crate) fn handle_resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            debug!("Ignoring resize to zero dimensions");
            return;
        }
        if (width, height) != self.extent {
            debug!(
                "Resize noted: {}x{} -> {}x{}",
                self.extent.0, self.extent.1, width, height
            );
            self.extent = (width, height);
            self.pending_resize = true;
        }
    }

    /// Number of frame slots.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of presentable images.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }
}
