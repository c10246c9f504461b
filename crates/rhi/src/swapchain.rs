//! Swapchain management: surface negotiation, the presentable image set, and
//! atomic teardown/rebuild on resize.
//!
//! # Overview
//!
//! [`Swapchain`] owns the swappable images and their views for one window
//! surface. Negotiation picks a color format (preferring sRGB), a present
//! mode (preferring low-latency mailbox, falling back to the always-available
//! FIFO mode), and a concrete extent clamped to the surface limits. The whole
//! image set is destroyed and rebuilt wholesale by [`Swapchain::recreate`]
//! when the surface goes out of date.
//!
//! Acquire and present intentionally return raw `vk::Result` codes: the
//! frame layer is the one place that decides which codes are recoverable
//! (out-of-date, suboptimal) and which are fatal.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::submit::PresentRequest;

/// What the surface supports for swapchain creation.
#[derive(Debug, Clone)]
pub struct SwapchainSupport {
    /// Surface capabilities (image count and extent limits, transforms).
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format / color-space pairs.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// Queries surface support for a physical device.
    ///
    /// # Errors
    ///
    /// Fails when any surface query is rejected.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> Result<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Surface support: {} formats, {} present modes, image count {}..{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            capabilities.max_image_count
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }
}

/// The negotiated swapchain parameters.
///
/// Produced by [`negotiate_surface`]; negotiation is a pure function of the
/// support data and requested size, which keeps rebuilds at an unchanged
/// window size structurally identical.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceSelection {
    /// Chosen surface format and color space.
    pub format: vk::SurfaceFormatKHR,
    /// Chosen present mode.
    pub present_mode: vk::PresentModeKHR,
    /// Concrete image extent.
    pub extent: vk::Extent2D,
    /// Number of images to request.
    pub image_count: u32,
}

/// Negotiates format, present mode, extent, and image count for a surface.
///
/// # Errors
///
/// Returns [`Error::SurfaceNegotiation`] when the surface advertises no
/// formats or no present modes.
pub fn negotiate_surface(
    support: &SwapchainSupport,
    width: u32,
    height: u32,
) -> Result<SurfaceSelection> {
    if support.formats.is_empty() {
        return Err(Error::SurfaceNegotiation(
            "surface advertises no formats".to_string(),
        ));
    }
    if support.present_modes.is_empty() {
        return Err(Error::SurfaceNegotiation(
            "surface advertises no present modes".to_string(),
        ));
    }

    Ok(SurfaceSelection {
        format: choose_surface_format(&support.formats),
        present_mode: choose_present_mode(&support.present_modes),
        extent: choose_extent(&support.capabilities, width, height),
        image_count: choose_image_count(&support.capabilities),
    })
}

/// Vulkan swapchain wrapper.
///
/// Owns the swapchain handle and the image views; the images themselves
/// belong to the swapchain and die with it.
///
/// Not thread-safe; the single render thread is the only user.
pub struct Swapchain {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Swapchain extension loader.
    swapchain_loader: ash::khr::swapchain::Device,
    /// Surface extension loader, kept so rebuilds can re-query support.
    surface_loader: ash::khr::surface::Instance,
    /// Swapchain handle.
    swapchain: vk::SwapchainKHR,
    /// Presentable images, owned by the swapchain.
    images: Vec<vk::Image>,
    /// One view per presentable image.
    image_views: Vec<vk::ImageView>,
    /// Negotiated image format.
    format: vk::Format,
    /// Negotiated color space.
    color_space: vk::ColorSpaceKHR,
    /// Negotiated extent.
    extent: vk::Extent2D,
    /// Negotiated present mode.
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Builds a swapchain for `surface` at the requested size.
    ///
    /// # Errors
    ///
    /// Fails when surface queries fail, negotiation finds no usable
    /// format/present mode, or swapchain/image-view creation is rejected.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        Self::build(
            device,
            swapchain_loader,
            surface_loader,
            surface,
            width,
            height,
            vk::SwapchainKHR::null(),
        )
    }

    /// Shared construction path for `new` and `recreate`.
    #[allow(clippy::too_many_arguments)]
    fn build(
        device: Arc<Device>,
        swapchain_loader: ash::khr::swapchain::Device,
        surface_loader: ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self> {
        let support = SwapchainSupport::query(device.physical_device(), surface, &surface_loader)?;
        let selection = negotiate_surface(&support, width, height)?;

        info!(
            "Creating swapchain: {}x{}, {:?}/{:?}, {:?}, {} images",
            selection.extent.width,
            selection.extent.height,
            selection.format.format,
            selection.format.color_space,
            selection.present_mode,
            selection.image_count
        );

        // unwrap is fine here: device creation requires complete families
        let families = device.queue_families();
        let graphics_family = families.graphics_family.unwrap();
        let present_family = families.present_family.unwrap();
        let family_indices = [graphics_family, present_family];

        let (sharing_mode, family_indices_slice) = if graphics_family != present_family {
            debug!(
                "CONCURRENT sharing between graphics ({}) and present ({}) families",
                graphics_family, present_family
            );
            (vk::SharingMode::CONCURRENT, family_indices.as_slice())
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(selection.image_count)
            .image_format(selection.format.format)
            .image_color_space(selection.format.color_space)
            .image_extent(selection.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(family_indices_slice)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(selection.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None)? };

        let images = unsafe { swapchain_loader.get_swapchain_images(swapchain)? };
        info!("Swapchain created with {} images", images.len());

        let image_views = create_image_views(&device, &images, selection.format.format)?;

        Ok(Self {
            device,
            swapchain_loader,
            surface_loader,
            swapchain,
            images,
            image_views,
            format: selection.format.format,
            color_space: selection.format.color_space,
            extent: selection.extent,
            present_mode: selection.present_mode,
        })
    }

    /// Tears down the image set and rebuilds it for the current window size.
    ///
    /// Blocks on `device.wait_idle()` first, so no in-flight work can still
    /// reference the old images. Call after acquire or present reports the
    /// surface out of date or suboptimal, or after a window resize.
    ///
    /// # Errors
    ///
    /// Fails when the idle wait or the rebuild itself is rejected.
    pub fn recreate(&mut self, surface: vk::SurfaceKHR, width: u32, height: u32) -> Result<()> {
        self.device.wait_idle()?;

        info!("Recreating swapchain at {}x{}", width, height);

        self.destroy_image_views();

        let old_swapchain = self.swapchain;
        let mut rebuilt = Self::build(
            self.device.clone(),
            self.swapchain_loader.clone(),
            self.surface_loader.clone(),
            surface,
            width,
            height,
            old_swapchain,
        )?;

        unsafe {
            self.swapchain_loader.destroy_swapchain(old_swapchain, None);
        }

        self.swapchain = rebuilt.swapchain;
        self.images = std::mem::take(&mut rebuilt.images);
        self.image_views = std::mem::take(&mut rebuilt.image_views);
        self.format = rebuilt.format;
        self.color_space = rebuilt.color_space;
        self.extent = rebuilt.extent;
        self.present_mode = rebuilt.present_mode;

        // Null out the temporary's handle so its Drop does not double-free
        rebuilt.swapchain = vk::SwapchainKHR::null();

        Ok(())
    }

    /// Requests the next presentable image index.
    ///
    /// `semaphore` is signaled when the presentation engine releases the
    /// image; queue work targeting the image must wait on it.
    ///
    /// Returns `(image_index, suboptimal)` on success. The raw error code is
    /// returned unmapped so the caller can recover from
    /// `ERROR_OUT_OF_DATE_KHR` and treat everything else as fatal.
    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
    ) -> std::result::Result<(u32, bool), vk::Result> {
        unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Hands an acquired image back to the display queue.
    ///
    /// Returns `true` when the surface is suboptimal and should be rebuilt.
    /// As with acquire, the raw error code is returned for the caller to
    /// classify.
    pub fn present(
        &self,
        queue: vk::Queue,
        request: &PresentRequest<'_>,
    ) -> std::result::Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [request.image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(request.wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Returns the negotiated image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the negotiated color space.
    #[inline]
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.color_space
    }

    /// Returns the negotiated extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the negotiated present mode.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Number of presentable images. Independent of the frame-slot count.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// The presentable image at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image(&self, index: usize) -> vk::Image {
        self.images[index]
    }

    /// The image view at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image_view(&self, index: usize) -> vk::ImageView {
        self.image_views[index]
    }

    /// All presentable images.
    #[inline]
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// All image views.
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    fn destroy_image_views(&mut self) {
        for &view in &self.image_views {
            unsafe {
                self.device.handle().destroy_image_view(view, None);
            }
        }
        self.image_views.clear();
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_image_views();

        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            info!(
                "Swapchain destroyed ({}x{}, {} images)",
                self.extent.width,
                self.extent.height,
                self.images.len()
            );
        }
    }
}

/// Picks the surface format, preferring B8G8R8A8_SRGB with the sRGB
/// nonlinear color space and falling back to the first advertised pair.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    if let Some(&format) = preferred {
        debug!("Selected surface format B8G8R8A8_SRGB / SRGB_NONLINEAR");
        return format;
    }

    warn!("Preferred sRGB format unavailable, using {:?}", formats[0].format);
    formats[0]
}

/// Picks the present mode: MAILBOX when available (low latency, no tearing),
/// otherwise FIFO, which the API guarantees.
fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        debug!("Selected MAILBOX present mode");
        return vk::PresentModeKHR::MAILBOX;
    }

    debug!("Selected FIFO present mode");
    vk::PresentModeKHR::FIFO
}

/// Picks the image extent: the surface-dictated extent when fixed, otherwise
/// the requested size clamped to the advertised limits.
fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Picks the image count: one above the minimum, clamped to the maximum when
/// the surface declares one (0 means unlimited).
fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;

    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

/// Creates one color view per presentable image.
fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());

    for &image in images {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let view = unsafe { device.handle().create_image_view(&create_info, None)? };

        views.push(view);
    }

    debug!("Created {} image views", views.len());
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn support_with(
        formats: Vec<vk::SurfaceFormatKHR>,
        present_modes: Vec<vk::PresentModeKHR>,
    ) -> SwapchainSupport {
        SwapchainSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 4,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                ..Default::default()
            },
            formats,
            present_modes,
        }
    }

    fn srgb_format() -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn unorm_format() -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn format_selection_prefers_srgb() {
        let formats = vec![unorm_format(), srgb_format()];
        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(selected.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn format_selection_falls_back_to_first() {
        let formats = vec![unorm_format()];
        assert_eq!(choose_surface_format(&formats).format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn present_mode_prefers_mailbox() {
        let modes = vec![
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let modes = vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn extent_uses_surface_dictated_size() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        };
        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!((extent.width, extent.height), (1920, 1080));
    }

    #[test]
    fn extent_clamps_to_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 2000,
                height: 2000,
            },
            ..Default::default()
        };

        let too_big = choose_extent(&capabilities, 3000, 3000);
        assert_eq!((too_big.width, too_big.height), (2000, 2000));

        let too_small = choose_extent(&capabilities, 50, 50);
        assert_eq!((too_small.width, too_small.height), (100, 100));

        let in_range = choose_extent(&capabilities, 800, 600);
        assert_eq!((in_range.width, in_range.height), (800, 600));
    }

    #[test]
    fn image_count_prefers_one_above_minimum() {
        let capped = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capped), 2);

        let unlimited = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&unlimited), 3);
    }

    #[test]
    fn negotiation_fails_without_formats() {
        let support = support_with(vec![], vec![vk::PresentModeKHR::FIFO]);
        assert!(matches!(
            negotiate_surface(&support, 800, 600),
            Err(Error::SurfaceNegotiation(_))
        ));
    }

    #[test]
    fn negotiation_fails_without_present_modes() {
        let support = support_with(vec![srgb_format()], vec![]);
        assert!(matches!(
            negotiate_surface(&support, 800, 600),
            Err(Error::SurfaceNegotiation(_))
        ));
    }

    #[test]
    fn negotiation_is_deterministic_for_equal_inputs() {
        let support = support_with(
            vec![unorm_format(), srgb_format()],
            vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        );

        let first = negotiate_surface(&support, 1280, 720).unwrap();
        let second = negotiate_surface(&support, 1280, 720).unwrap();
        assert_eq!(first.format.format, second.format.format);
        assert_eq!(first.format.color_space, second.format.color_space);
        assert_eq!(first.present_mode, second.present_mode);
        assert_eq!(first.extent.width, second.extent.width);
        assert_eq!(first.extent.height, second.extent.height);
        assert_eq!(first.image_count, second.image_count);

        assert_eq!(first.format.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(first.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(first.image_count, 3);
        assert_eq!(first.extent.width, 1280);
    }
}
