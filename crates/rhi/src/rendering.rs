//! Dynamic rendering configuration (Vulkan 1.3).
//!
//! [`RenderingConfig`] and [`ColorAttachment`] are configuration structs with
//! named defaults that expand into a `vk::RenderingInfo`. The expansion goes
//! through [`RenderingBundle`], which owns the attachment info arrays the
//! final structure borrows.

use ash::vk;

/// Configuration for one color attachment.
///
/// Defaults: `COLOR_ATTACHMENT_OPTIMAL` layout, clear on load to opaque
/// black, store on end.
#[derive(Clone)]
pub struct ColorAttachment {
    /// The image view to render to.
    pub image_view: vk::ImageView,
    /// Image layout during rendering.
    pub layout: vk::ImageLayout,
    /// How attachment contents are initialized.
    pub load_op: vk::AttachmentLoadOp,
    /// How attachment contents are handled after rendering.
    pub store_op: vk::AttachmentStoreOp,
    /// Clear color used when `load_op` is CLEAR.
    pub clear_color: [f32; 4],
}

impl ColorAttachment {
    /// Creates a color attachment with default settings.
    pub fn new(image_view: vk::ImageView) -> Self {
        Self {
            image_view,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Sets the clear color.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Loads existing contents instead of clearing.
    pub fn load(mut self) -> Self {
        self.load_op = vk::AttachmentLoadOp::LOAD;
        self
    }

    /// Expands to the Vulkan attachment info.
    fn to_attachment_info(&self) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.image_view)
            .image_layout(self.layout)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            })
    }
}

/// Complete configuration for one dynamic rendering pass.
#[derive(Clone, Default)]
pub struct RenderingConfig {
    /// Color attachments for this pass.
    pub color_attachments: Vec<ColorAttachment>,
    /// Region rendered to.
    pub render_area: vk::Rect2D,
}

impl RenderingConfig {
    /// Creates a configuration covering `width` x `height` from the origin.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            color_attachments: Vec::new(),
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D { width, height },
            },
        }
    }

    /// Creates a configuration covering `extent` from the origin.
    pub fn from_extent(extent: vk::Extent2D) -> Self {
        Self::new(extent.width, extent.height)
    }

    /// Adds a color attachment.
    pub fn with_color_attachment(mut self, attachment: ColorAttachment) -> Self {
        self.color_attachments.push(attachment);
        self
    }

    /// Returns the render area extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.render_area.extent
    }

    /// Expands the configuration into a bundle whose lifetime covers the
    /// borrowed attachment arrays.
    pub fn build(&self) -> RenderingBundle {
        RenderingBundle {
            color_attachments: self
                .color_attachments
                .iter()
                .map(|a| a.to_attachment_info())
                .collect(),
            render_area: self.render_area,
        }
    }
}

/// Owns the attachment arrays a `vk::RenderingInfo` borrows.
pub struct RenderingBundle {
    color_attachments: Vec<vk::RenderingAttachmentInfo<'static>>,
    render_area: vk::Rect2D,
}

impl RenderingBundle {
    /// The `vk::RenderingInfo` referencing this bundle's data; valid as long
    /// as the bundle lives.
    pub fn info(&self) -> vk::RenderingInfo<'_> {
        vk::RenderingInfo::default()
            .render_area(self.render_area)
            .layer_count(1)
            .color_attachments(&self.color_attachments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_attachment_defaults() {
        let attachment = ColorAttachment::new(vk::ImageView::null());
        assert_eq!(attachment.layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(attachment.clear_color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn load_helper_switches_load_op() {
        let attachment = ColorAttachment::new(vk::ImageView::null()).load();
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::LOAD);
    }

    #[test]
    fn config_covers_requested_area() {
        let config = RenderingConfig::new(1920, 1080)
            .with_color_attachment(ColorAttachment::new(vk::ImageView::null()));
        assert_eq!(config.extent().width, 1920);
        assert_eq!(config.color_attachments.len(), 1);

        let bundle = config.build();
        let info = bundle.info();
        assert_eq!(info.render_area.extent.height, 1080);
        assert_eq!(info.layer_count, 1);
        assert_eq!(info.color_attachment_count, 1);
    }
}
