//! Demo renderer: a tinted triangle through the full stack.
//!
//! Exists to exercise the wrapper layers end to end, not to render anything
//! interesting: instance, device, swapchain, pipeline with shaders compiled
//! from GLSL at startup, per-slot uniform buffers, and the frame loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use tracing::info;

use prism_core::Timer;
use prism_frame::{
    ActiveFrame, DEFAULT_FRAMES_IN_FLIGHT, FrameBackend, FrameLoop, SwapchainFrames,
};
use prism_platform::{Surface, Window};
use prism_rhi::buffer::{Buffer, BufferUsage};
use prism_rhi::command::CommandPool;
use prism_rhi::descriptor::{
    DescriptorPool, DescriptorSetLayout, uniform_buffer_binding, write_uniform_buffer,
};
use prism_rhi::device::Device;
use prism_rhi::instance::Instance;
use prism_rhi::physical_device::select_physical_device;
use prism_rhi::pipeline::{CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use prism_rhi::rendering::{ColorAttachment, RenderingConfig};
use prism_rhi::shader::{Shader, ShaderStage};
use prism_rhi::swapchain::Swapchain;
use prism_rhi::vertex::Vertex;
use prism_rhi::vk;

const VERT_SHADER: &str = include_str!("../shaders/triangle.vert");
const FRAG_SHADER: &str = include_str!("../shaders/triangle.frag");

const TRIANGLE: [Vertex; 3] = [
    Vertex::new([0.0, -0.5, 0.0], [1.0, 0.2, 0.2]),
    Vertex::new([0.5, 0.5, 0.0], [0.2, 1.0, 0.2]),
    Vertex::new([-0.5, 0.5, 0.0], [0.2, 0.2, 1.0]),
];

/// Per-frame fragment shader parameters.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct TintParams {
    tint: [f32; 4],
}

/// Owns every GPU resource of the demo.
///
/// Fields are declared in destruction order: the frame loop (swapchain and
/// slots) goes first, then device-owned objects, then the surface, and the
/// device and instance last.
pub struct Renderer {
    frames: FrameLoop,
    uniform_buffers: Vec<Buffer>,
    descriptor_sets: Vec<vk::DescriptorSet>,
    _descriptor_pool: DescriptorPool,
    _descriptor_set_layout: DescriptorSetLayout,
    vertex_buffer: Buffer,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    _command_pool: CommandPool,
    _surface: Surface,
    device: Arc<Device>,
    _instance: Instance,
    timer: Timer,
}

impl Renderer {
    /// Brings up the whole stack against `window`.
    pub fn new(window: &Window) -> Result<Self> {
        let instance =
            Instance::new(cfg!(debug_assertions)).context("instance creation failed")?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .context("surface creation failed")?;

        let physical_device =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())
                .context("device selection failed")?;

        let device = Device::new(&instance, &physical_device).context("device creation failed")?;

        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            window.width(),
            window.height(),
        )
        .context("swapchain creation failed")?;

        // Selection guarantees a graphics family exists
        let graphics_family = device.queue_families().graphics_family.unwrap();
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;

        let vertex_shader = Shader::from_glsl_source(
            device.clone(),
            VERT_SHADER,
            "triangle.vert",
            ShaderStage::Vertex,
            "main",
        )?;
        let fragment_shader = Shader::from_glsl_source(
            device.clone(),
            FRAG_SHADER,
            "triangle.frag",
            ShaderStage::Fragment,
            "main",
        )?;

        let descriptor_set_layout = DescriptorSetLayout::new(
            device.clone(),
            &[uniform_buffer_binding(0, vk::ShaderStageFlags::FRAGMENT)],
        )?;

        let pipeline_layout =
            PipelineLayout::new(device.clone(), &[descriptor_set_layout.handle()], &[])?;

        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .cull_mode(CullMode::None)
            .color_attachment_format(swapchain.format())
            .build(device.clone(), &pipeline_layout)?;

        let vertex_buffer = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(&TRIANGLE),
        )?;

        let slot_count = DEFAULT_FRAMES_IN_FLIGHT;
        let mut uniform_buffers = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            uniform_buffers.push(Buffer::new(
                device.clone(),
                BufferUsage::Uniform,
                std::mem::size_of::<TintParams>() as vk::DeviceSize,
            )?);
        }

        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(slot_count as u32)];
        let descriptor_pool =
            DescriptorPool::new(device.clone(), slot_count as u32, &pool_sizes)?;

        let layouts = vec![descriptor_set_layout.handle(); slot_count];
        let descriptor_sets = descriptor_pool.allocate(&layouts)?;
        for (set, buffer) in descriptor_sets.iter().zip(&uniform_buffers) {
            write_uniform_buffer(&device, *set, 0, buffer.handle());
        }

        let backend = SwapchainFrames::new(
            device.clone(),
            &command_pool,
            swapchain,
            surface.handle(),
            slot_count,
        )?;
        let frames = FrameLoop::new(FrameBackend::Swapchain(Box::new(backend)));

        info!("Renderer initialized");

        Ok(Self {
            frames,
            uniform_buffers,
            descriptor_sets,
            _descriptor_pool: descriptor_pool,
            _descriptor_set_layout: descriptor_set_layout,
            vertex_buffer,
            pipeline,
            pipeline_layout,
            _command_pool: command_pool,
            _surface: surface,
            device,
            _instance: instance,
            timer: Timer::new(),
        })
    }

    /// Notes a window resize; the image set is rebuilt on the next frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.frames.handle_resize(width, height);
    }

    /// Renders one frame, or skips it while the surface resynchronizes.
    pub fn render_frame(&mut self) -> Result<()> {
        let Some(frame) = self.frames.begin_frame()? else {
            return Ok(());
        };

        self.update_tint(frame.slot)?;
        self.record(frame)?;

        self.frames.end_frame()?;
        Ok(())
    }

    /// Uploads this slot's tint, pulsing with wall time.
    ///
    /// Safe to write here: `begin_frame` already waited on the slot's fence.
    fn update_tint(&mut self, slot: usize) -> Result<()> {
        let t = self.timer.elapsed_secs();
        let pulse = 0.75 + 0.25 * (t * 2.0).sin();
        let params = TintParams {
            tint: [pulse, pulse, pulse, 1.0],
        };
        self.uniform_buffers[slot].upload(0, bytemuck::bytes_of(&params))?;
        Ok(())
    }

    /// Records the triangle pass into the active slot's command buffer.
    fn record(&self, frame: ActiveFrame) -> Result<()> {
        // The loop was built with a swapchain backend in `new`
        let backend = self.frames.backend().as_swapchain().unwrap();
        let swapchain = backend.swapchain();
        let cmd = backend.slot(frame.slot).command_buffer();
        let image = swapchain.image(frame.image_index as usize);
        let extent = swapchain.extent();

        cmd.transition_image_layout(
            image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );

        let config = RenderingConfig::from_extent(extent).with_color_attachment(
            ColorAttachment::new(swapchain.image_view(frame.image_index as usize))
                .with_clear_color([0.02, 0.02, 0.05, 1.0]),
        );
        let bundle = config.build();

        cmd.begin_rendering(&bundle.info());

        cmd.set_viewport(&vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        cmd.set_scissor(&vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        });

        cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle());
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline_layout.handle(),
            0,
            &[self.descriptor_sets[frame.slot]],
            &[],
        );
        cmd.bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
        cmd.draw(TRIANGLE.len() as u32, 1, 0, 0);

        cmd.end_rendering();

        cmd.transition_image_layout(
            image,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        );

        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Let all in-flight frames finish before fields start dropping
        if let Err(e) = self.device.wait_idle() {
            tracing::error!("Failed to wait for device idle during teardown: {:?}", e);
        }
    }
}
