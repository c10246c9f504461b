//! Shader module management.
//!
//! Shaders enter the pipeline two ways:
//! - precompiled SPIR-V ([`Shader::from_spirv_bytes`], [`Shader::from_spirv_file`])
//! - GLSL source compiled at pipeline-build time through shaderc
//!   ([`Shader::from_glsl_source`], [`Shader::from_glsl_file`])
//!
//! GLSL compilation failures surface as [`Error::ShaderCompilation`] with the
//! compiler's message attached.

use std::ffi::CString;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{Error, Result};

/// Shader stage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader stage
    Vertex,
    /// Fragment shader stage
    Fragment,
    /// Compute shader stage
    Compute,
    /// Geometry shader stage
    Geometry,
}

impl ShaderStage {
    /// Converts to Vulkan shader stage flags.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
            ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
            ShaderStage::Geometry => vk::ShaderStageFlags::GEOMETRY,
        }
    }

    /// Converts to the shaderc shader kind.
    pub fn to_shaderc_kind(self) -> shaderc::ShaderKind {
        match self {
            ShaderStage::Vertex => shaderc::ShaderKind::Vertex,
            ShaderStage::Fragment => shaderc::ShaderKind::Fragment,
            ShaderStage::Compute => shaderc::ShaderKind::Compute,
            ShaderStage::Geometry => shaderc::ShaderKind::Geometry,
        }
    }

    /// Human-readable stage name.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
            ShaderStage::Geometry => "geometry",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Vulkan shader module wrapper.
///
/// Immutable after creation; holds the stage and entry point needed to build
/// a pipeline stage description.
pub struct Shader {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan shader module handle.
    module: vk::ShaderModule,
    /// Stage this module is for.
    stage: ShaderStage,
    /// Entry point function name.
    entry_point: CString,
}

impl Shader {
    /// Creates a shader module from a SPIR-V file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or the SPIR-V is rejected.
    pub fn from_spirv_file(
        device: Arc<Device>,
        path: &Path,
        stage: ShaderStage,
        entry_point: &str,
    ) -> Result<Self> {
        debug!("Loading {} shader from {:?}", stage, path);

        let bytes = std::fs::read(path)
            .map_err(|e| Error::Shader(format!("failed to read shader file {:?}: {}", path, e)))?;

        Self::from_spirv_bytes(device, &bytes, stage, entry_point)
    }

    /// Creates a shader module from SPIR-V bytes.
    ///
    /// # Errors
    ///
    /// Fails when the byte length is not 4-byte aligned, the entry point
    /// contains null bytes, or module creation is rejected.
    pub fn from_spirv_bytes(
        device: Arc<Device>,
        bytes: &[u8],
        stage: ShaderStage,
        entry_point: &str,
    ) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            return Err(Error::Shader(format!(
                "SPIR-V code must be 4-byte aligned, got {} bytes",
                bytes.len()
            )));
        }

        let code: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Self::from_spirv_words(device, &code, stage, entry_point)
    }

    /// Compiles GLSL source to SPIR-V and creates the shader module.
    ///
    /// `name` labels the source in compiler diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShaderCompilation`] with the compiler's message when
    /// the source does not compile.
    pub fn from_glsl_source(
        device: Arc<Device>,
        source: &str,
        name: &str,
        stage: ShaderStage,
        entry_point: &str,
    ) -> Result<Self> {
        let compiler = shaderc::Compiler::new()
            .map_err(|e| Error::ShaderCompilation(format!("compiler init failed: {}", e)))?;

        let artifact = compiler
            .compile_into_spirv(source, stage.to_shaderc_kind(), name, entry_point, None)
            .map_err(|e| Error::ShaderCompilation(e.to_string()))?;

        if artifact.get_num_warnings() > 0 {
            tracing::warn!(
                "{} shader '{}': {}",
                stage,
                name,
                artifact.get_warning_messages().trim_end()
            );
        }

        info!("Compiled {} shader '{}'", stage, name);

        Self::from_spirv_words(device, artifact.as_binary(), stage, entry_point)
    }

    /// Reads a GLSL file and compiles it to a shader module.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or compilation fails.
    pub fn from_glsl_file(
        device: Arc<Device>,
        path: &Path,
        stage: ShaderStage,
        entry_point: &str,
    ) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Shader(format!("failed to read shader file {:?}: {}", path, e)))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self::from_glsl_source(device, &source, &name, stage, entry_point)
    }

    /// Shared module-creation path for the SPIR-V and GLSL constructors.
    fn from_spirv_words(
        device: Arc<Device>,
        code: &[u32],
        stage: ShaderStage,
        entry_point: &str,
    ) -> Result<Self> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);

        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };

        let entry_point_cstring = CString::new(entry_point)
            .map_err(|e| Error::Shader(format!("invalid entry point name: {}", e)))?;

        debug!("Created {} shader module, entry '{}'", stage, entry_point);

        Ok(Self {
            device,
            module,
            stage,
            entry_point: entry_point_cstring,
        })
    }

    /// Returns the Vulkan shader module handle.
    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Returns the shader stage.
    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Returns the entry point name.
    #[inline]
    pub fn entry_point(&self) -> &std::ffi::CStr {
        &self.entry_point
    }

    /// Builds the pipeline stage description for this shader.
    ///
    /// The returned structure borrows from this shader and must not outlive it.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(&self.entry_point)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.module, None);
        }
        debug!("Destroyed {} shader module", self.stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_to_vk_mapping() {
        assert_eq!(ShaderStage::Vertex.to_vk_stage(), vk::ShaderStageFlags::VERTEX);
        assert_eq!(
            ShaderStage::Fragment.to_vk_stage(),
            vk::ShaderStageFlags::FRAGMENT
        );
        assert_eq!(
            ShaderStage::Compute.to_vk_stage(),
            vk::ShaderStageFlags::COMPUTE
        );
        assert_eq!(
            ShaderStage::Geometry.to_vk_stage(),
            vk::ShaderStageFlags::GEOMETRY
        );
    }

    #[test]
    fn stage_to_shaderc_mapping() {
        assert_eq!(
            ShaderStage::Vertex.to_shaderc_kind(),
            shaderc::ShaderKind::Vertex
        );
        assert_eq!(
            ShaderStage::Fragment.to_shaderc_kind(),
            shaderc::ShaderKind::Fragment
        );
    }

    #[test]
    fn stage_display_uses_name() {
        assert_eq!(format!("{}", ShaderStage::Vertex), "vertex");
        assert_eq!(ShaderStage::Fragment.name(), "fragment");
    }
}
