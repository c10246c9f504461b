//! Synchronization primitives.
//!
//! - [`Semaphore`] orders work between queue operations on the GPU; the CPU
//!   never observes it directly.
//! - [`Fence`] lets the host wait for GPU work to complete; it is the only
//!   CPU-side backpressure mechanism in the frame loop.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::Result;

/// Vulkan semaphore wrapper.
///
/// Created unsignaled; typical uses are "image acquired" (signaled by the
/// presentation engine) and "rendering finished" (signaled by the graphics
/// queue, waited on by present).
pub struct Semaphore {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan semaphore handle.
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new semaphore in the unsignaled state.
    ///
    /// # Errors
    ///
    /// Fails when semaphore creation is rejected.
    pub fn new(device: Arc<Device>) -> Result<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        debug!("Created semaphore");

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Vulkan fence wrapper.
///
/// A frame slot's fence is created signaled so the first wait on that slot
/// returns immediately.
pub struct Fence {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan fence handle.
    fence: vk::Fence,
}

impl Fence {
    /// Creates a new fence.
    ///
    /// # Arguments
    ///
    /// * `signaled` - create the fence already signaled. Use this for fences
    ///   that are waited on before the first submission that would arm them.
    ///
    /// # Errors
    ///
    /// Fails when fence creation is rejected.
    pub fn new(device: Arc<Device>, signaled: bool) -> Result<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);

        let fence = unsafe { device.handle().create_fence(&create_info, None)? };

        debug!(
            "Created fence ({})",
            if signaled { "signaled" } else { "unsignaled" }
        );

        Ok(Self { device, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence is signaled or `timeout_ns` elapses.
    ///
    /// Use `u64::MAX` to wait indefinitely.
    ///
    /// # Errors
    ///
    /// Fails on timeout (`vk::Result::TIMEOUT`) or device loss.
    pub fn wait(&self, timeout_ns: u64) -> Result<()> {
        let fences = [self.fence];
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&fences, true, timeout_ns)?
        };
        Ok(())
    }

    /// Resets the fence to the unsignaled state.
    ///
    /// The fence must not be armed by an in-flight submission.
    ///
    /// # Errors
    ///
    /// Fails when the reset is rejected.
    pub fn reset(&self) -> Result<()> {
        let fences = [self.fence];
        unsafe { self.device.handle().reset_fences(&fences)? };
        Ok(())
    }

    /// Non-blocking check of the fence state.
    pub fn is_signaled(&self) -> bool {
        let status = unsafe { self.device.handle().get_fence_status(self.fence) };
        matches!(status, Ok(true))
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semaphore_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
    }

    #[test]
    fn fence_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Fence>();
    }
}
