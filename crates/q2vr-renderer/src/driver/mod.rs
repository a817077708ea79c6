//! Graphics driver abstraction
//!
//! The narrow immediate-mode API the renderer core is written against.
//! Only [`crate::state::GlContext`] holds a driver; everything else goes
//! through the context so the cached state always matches the driver.

mod glow_backend;
mod headless;

pub use glow_backend::GlowDriver;
pub use headless::{ClearRecord, DrawRecord, HeadlessCounters, HeadlessDriver};

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

/// GL_NO_ERROR
pub const NO_ERROR: u32 = 0;
/// GL_INVALID_ENUM
pub const INVALID_ENUM: u32 = 0x0500;
/// GL_INVALID_VALUE
pub const INVALID_VALUE: u32 = 0x0501;
/// GL_INVALID_OPERATION
pub const INVALID_OPERATION: u32 = 0x0502;
/// GL_OUT_OF_MEMORY
pub const OUT_OF_MEMORY: u32 = 0x0505;

macro_rules! gl_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// Handle 0: "none" / the default object.
            pub const NONE: $name = $name(0);

            #[inline]
            pub fn is_none(self) -> bool {
                self.0 == 0
            }
        }
    };
}

gl_handle!(
    /// Texture object name.
    TextureId
);
gl_handle!(
    /// Renderbuffer object name.
    RenderbufferId
);
gl_handle!(
    /// Framebuffer object name. 0 is the window back buffer.
    FramebufferId
);
gl_handle!(
    /// Shader stage object name.
    ShaderId
);
gl_handle!(
    /// Linked program name.
    ProgramId
);

/// Uniform location inside a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// Server-side capabilities tracked by the state cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Blend,
    DepthTest,
    StencilTest,
    ScissorTest,
    CullFace,
    Fog,
    AlphaTest,
    PolygonOffsetFill,
}

impl Capability {
    pub const COUNT: usize = 8;

    pub const ALL: [Capability; Capability::COUNT] = [
        Capability::Blend,
        Capability::DepthTest,
        Capability::StencilTest,
        Capability::ScissorTest,
        Capability::CullFace,
        Capability::Fog,
        Capability::AlphaTest,
        Capability::PolygonOffsetFill,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Capability::Blend => "GL_BLEND",
            Capability::DepthTest => "GL_DEPTH_TEST",
            Capability::StencilTest => "GL_STENCIL_TEST",
            Capability::ScissorTest => "GL_SCISSOR_TEST",
            Capability::CullFace => "GL_CULL_FACE",
            Capability::Fog => "GL_FOG",
            Capability::AlphaTest => "GL_ALPHA_TEST",
            Capability::PolygonOffsetFill => "GL_POLYGON_OFFSET_FILL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LEqual,
    Greater,
    NotEqual,
    GEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Front,
    Back,
    FrontAndBack,
}

/// Color attachment storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorFormat {
    #[default]
    Rgba8,
    Rgba16F,
    Srgb8Alpha8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

bitflags! {
    /// Buffers selected by a clear.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearBuffers: u32 {
        const COLOR = 0x0000_4000;
        const DEPTH = 0x0000_0100;
        const STENCIL = 0x0000_0400;
        const ALL = Self::COLOR.bits() | Self::DEPTH.bits() | Self::STENCIL.bits();
    }
}

/// Immutable driver limits and extension support, queried once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverCaps {
    pub max_texture_units: u32,
    pub max_texture_size: i32,
    pub framebuffer_object: bool,
    pub packed_depth_stencil: bool,
}

impl Default for DriverCaps {
    fn default() -> Self {
        Self {
            max_texture_units: 4,
            max_texture_size: 4096,
            framebuffer_object: true,
            packed_depth_stencil: true,
        }
    }
}

/// One corner of a textured quad (triangle strip order).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub texcoord: [f32; 2],
}

impl QuadVertex {
    pub const fn new(x: f32, y: f32, z: f32, s: f32, t: f32) -> Self {
        Self { position: [x, y, z], texcoord: [s, t] }
    }
}

/// Full-screen quad in normalized device coordinates.
pub const FULLSCREEN_QUAD: [QuadVertex; 4] = [
    QuadVertex::new(-1.0, -1.0, 0.0, 0.0, 0.0),
    QuadVertex::new(-1.0, 1.0, 0.0, 0.0, 1.0),
    QuadVertex::new(1.0, -1.0, 0.0, 1.0, 0.0),
    QuadVertex::new(1.0, 1.0, 0.0, 1.0, 1.0),
];

/// The immediate-mode graphics API consumed by the renderer core.
///
/// Texture image and parameter calls act on the texture bound to the active
/// unit; attachment calls act on the bound framebuffer.
pub trait GlDriver {
    fn caps(&self) -> DriverCaps;

    /// Return and clear the oldest pending error code (0 when none).
    fn get_error(&mut self) -> u32;

    // ---- fixed state ----
    fn set_capability(&mut self, cap: Capability, enabled: bool);
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, texture: TextureId);
    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor);
    fn depth_func(&mut self, func: CompareFunc);
    fn depth_mask(&mut self, write: bool);
    fn depth_range(&mut self, near: f32, far: f32);
    fn alpha_func(&mut self, func: CompareFunc, reference: f32);
    fn cull_face(&mut self, face: Face);
    fn polygon_offset(&mut self, factor: f32, units: f32);
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&mut self, rgba: [f32; 4]);
    fn clear(&mut self, buffers: ClearBuffers);

    // ---- textures ----
    fn create_texture(&mut self) -> Option<TextureId>;
    fn delete_texture(&mut self, texture: TextureId);
    fn tex_storage_2d(&mut self, width: i32, height: i32, format: ColorFormat);
    fn tex_filter(&mut self, bilinear: bool);
    fn tex_clamp_to_edge(&mut self);
    fn tex_max_level(&mut self, level: i32);

    // ---- renderbuffers ----
    fn create_renderbuffer(&mut self) -> Option<RenderbufferId>;
    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId);
    fn renderbuffer_depth_stencil(&mut self, renderbuffer: RenderbufferId, width: i32, height: i32);

    // ---- framebuffers ----
    fn create_framebuffer(&mut self) -> Option<FramebufferId>;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);
    fn bind_framebuffer(&mut self, framebuffer: FramebufferId);
    fn attach_color_texture(&mut self, texture: TextureId);
    fn attach_depth_stencil(&mut self, renderbuffer: RenderbufferId);
    fn framebuffer_complete(&mut self) -> bool;

    // ---- shaders ----
    fn create_shader(&mut self, stage: ShaderStage) -> Option<ShaderId>;
    fn shader_source(&mut self, shader: ShaderId, source: &str);
    fn compile_shader(&mut self, shader: ShaderId);
    fn shader_compile_status(&mut self, shader: ShaderId) -> bool;
    fn shader_info_log(&mut self, shader: ShaderId) -> String;
    fn delete_shader(&mut self, shader: ShaderId);

    fn create_program(&mut self) -> Option<ProgramId>;
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId);
    fn bind_attrib_location(&mut self, program: ProgramId, index: u32, name: &str);
    fn link_program(&mut self, program: ProgramId);
    fn program_link_status(&mut self, program: ProgramId) -> bool;
    fn program_info_log(&mut self, program: ProgramId) -> String;
    fn delete_program(&mut self, program: ProgramId);
    fn use_program(&mut self, program: ProgramId);
    fn get_uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    fn uniform_1i(&mut self, location: UniformLocation, value: i32);
    fn uniform_1f(&mut self, location: UniformLocation, value: f32);
    fn uniform_2f(&mut self, location: UniformLocation, x: f32, y: f32);
    fn uniform_4f(&mut self, location: UniformLocation, value: [f32; 4]);
    fn uniform_matrix_4(&mut self, location: UniformLocation, value: &[f32; 16]);

    // ---- drawing ----
    fn draw_quad(&mut self, vertices: &[QuadVertex; 4]);
    fn finish(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_indices_are_dense() {
        for (i, cap) in Capability::ALL.iter().enumerate() {
            assert_eq!(cap.index(), i);
        }
    }

    #[test]
    fn test_quad_vertex_layout() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 20);
        let bytes: &[u8] = bytemuck::cast_slice(&FULLSCREEN_QUAD);
        assert_eq!(bytes.len(), 80);
    }

    #[test]
    fn test_handle_none() {
        assert!(TextureId::NONE.is_none());
        assert!(!FramebufferId(3).is_none());
        assert_eq!(ClearBuffers::ALL.bits(), 0x4500);
    }
}
