//! Queue submission and presentation requests.
//!
//! Both operations take an explicit configuration struct with named defaults
//! rather than a chain of mutating calls: the caller fills in the fields it
//! cares about and leaves the rest to `Default`. The structs borrow their
//! slices, so building a request allocates nothing.
//!
//! # Example
//!
//! ```no_run
//! use ash::vk;
//! use prism_rhi::submit::SubmitRequest;
//!
//! # fn example(
//! #     device: &prism_rhi::device::Device,
//! #     cmd: vk::CommandBuffer,
//! #     acquired: vk::Semaphore,
//! #     finished: vk::Semaphore,
//! #     fence: vk::Fence,
//! # ) -> prism_rhi::Result<()> {
//! device.submit(&SubmitRequest {
//!     wait_semaphores: &[acquired],
//!     wait_stages: &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
//!     signal_semaphores: &[finished],
//!     command_buffers: &[cmd],
//!     fence,
//! })?;
//! # Ok(())
//! # }
//! ```

use ash::vk;

/// One unit of recorded work for the graphics queue.
///
/// `wait_semaphores` and `wait_stages` are parallel slices: the queue waits
/// on semaphore `i` at stage `wait_stages[i]`. The fence, when not null, is
/// signaled once all command buffers have executed.
#[derive(Clone, Copy, Default)]
pub struct SubmitRequest<'a> {
    /// Semaphores the queue must wait on before executing.
    pub wait_semaphores: &'a [vk::Semaphore],
    /// Pipeline stage at which each wait semaphore blocks; same length as
    /// `wait_semaphores`.
    pub wait_stages: &'a [vk::PipelineStageFlags],
    /// Semaphores signaled when execution completes.
    pub signal_semaphores: &'a [vk::Semaphore],
    /// Recorded command buffers to execute.
    pub command_buffers: &'a [vk::CommandBuffer],
    /// Fence to arm for CPU-side completion tracking; null for none.
    pub fence: vk::Fence,
}

/// A request to hand an acquired image back to the display subsystem.
#[derive(Clone, Copy, Default)]
pub struct PresentRequest<'a> {
    /// Semaphores presentation must wait on (typically "rendering finished").
    pub wait_semaphores: &'a [vk::Semaphore],
    /// Index of the swapchain image to present.
    pub image_index: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_request_defaults_are_empty() {
        let request = SubmitRequest::default();
        assert!(request.wait_semaphores.is_empty());
        assert!(request.wait_stages.is_empty());
        assert!(request.signal_semaphores.is_empty());
        assert!(request.command_buffers.is_empty());
        assert_eq!(request.fence, vk::Fence::null());
    }

    #[test]
    fn present_request_defaults_to_image_zero() {
        let request = PresentRequest::default();
        assert!(request.wait_semaphores.is_empty());
        assert_eq!(request.image_index, 0);
    }
}
