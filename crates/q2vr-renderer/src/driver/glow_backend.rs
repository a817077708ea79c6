//! OpenGL 3.3 core driver on top of `glow`
//!
//! The platform layer creates the context and hands it over. Alpha test and
//! fog have no core-profile switch; they are accepted and kept in the state
//! cache only, and reach the shaders as uniforms.

use std::num::NonZeroU32;

use glow::{HasContext, PixelUnpackData};

use super::*;

/// Texture units the renderer uses.
const MAX_TEXTURE_UNITS: u32 = 4;

fn blend_factor(f: BlendFactor) -> u32 {
    match f {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcColor => glow::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstColor => glow::DST_COLOR,
    }
}

fn compare_func(f: CompareFunc) -> u32 {
    match f {
        CompareFunc::Never => glow::NEVER,
        CompareFunc::Less => glow::LESS,
        CompareFunc::Equal => glow::EQUAL,
        CompareFunc::LEqual => glow::LEQUAL,
        CompareFunc::Greater => glow::GREATER,
        CompareFunc::NotEqual => glow::NOTEQUAL,
        CompareFunc::GEqual => glow::GEQUAL,
        CompareFunc::Always => glow::ALWAYS,
    }
}

fn capability(cap: Capability) -> Option<u32> {
    match cap {
        Capability::Blend => Some(glow::BLEND),
        Capability::DepthTest => Some(glow::DEPTH_TEST),
        Capability::StencilTest => Some(glow::STENCIL_TEST),
        Capability::ScissorTest => Some(glow::SCISSOR_TEST),
        Capability::CullFace => Some(glow::CULL_FACE),
        Capability::PolygonOffsetFill => Some(glow::POLYGON_OFFSET_FILL),
        Capability::Fog | Capability::AlphaTest => None,
    }
}

/// Formats as (internal format, pixel format, pixel type).
fn color_format(f: ColorFormat) -> (i32, u32, u32) {
    match f {
        ColorFormat::Rgba8 => (glow::RGBA8 as i32, glow::RGBA, glow::UNSIGNED_BYTE),
        ColorFormat::Rgba16F => (glow::RGBA16F as i32, glow::RGBA, glow::HALF_FLOAT),
        ColorFormat::Srgb8Alpha8 => (glow::SRGB8_ALPHA8 as i32, glow::RGBA, glow::UNSIGNED_BYTE),
    }
}

fn texture(id: TextureId) -> Option<glow::NativeTexture> {
    NonZeroU32::new(id.0).map(glow::NativeTexture)
}

fn renderbuffer(id: RenderbufferId) -> Option<glow::NativeRenderbuffer> {
    NonZeroU32::new(id.0).map(glow::NativeRenderbuffer)
}

fn framebuffer(id: FramebufferId) -> Option<glow::NativeFramebuffer> {
    NonZeroU32::new(id.0).map(glow::NativeFramebuffer)
}

fn shader(id: ShaderId) -> Option<glow::NativeShader> {
    NonZeroU32::new(id.0).map(glow::NativeShader)
}

fn program(id: ProgramId) -> Option<glow::NativeProgram> {
    NonZeroU32::new(id.0).map(glow::NativeProgram)
}

fn uniform(loc: UniformLocation) -> glow::NativeUniformLocation {
    glow::NativeUniformLocation(loc.0)
}

pub struct GlowDriver {
    gl: glow::Context,
    caps: DriverCaps,
    /// Lazily created quad geometry.
    quad: Option<(glow::NativeVertexArray, glow::NativeBuffer)>,
}

impl GlowDriver {
    /// Wrap a context that is current on the calling thread.
    pub fn new(gl: glow::Context) -> Self {
        // SAFETY: the caller guarantees the context is current.
        let caps = unsafe {
            let version = gl.version();
            let extensions = gl.supported_extensions();
            let modern = version.major >= 3;
            DriverCaps {
                max_texture_units: (gl.get_parameter_i32(glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS).max(1) as u32)
                    .min(MAX_TEXTURE_UNITS),
                max_texture_size: gl.get_parameter_i32(glow::MAX_TEXTURE_SIZE),
                framebuffer_object: modern
                    || extensions.contains("GL_ARB_framebuffer_object")
                    || extensions.contains("GL_EXT_framebuffer_object"),
                packed_depth_stencil: modern || extensions.contains("GL_EXT_packed_depth_stencil"),
            }
        };
        log::debug!(target: "q2vr", "GL caps: {:?}", caps);
        Self { gl, caps, quad: None }
    }

    pub fn context(&self) -> &glow::Context {
        &self.gl
    }

    fn quad_geometry(&mut self) -> Option<(glow::NativeVertexArray, glow::NativeBuffer)> {
        if self.quad.is_none() {
            // SAFETY: context is current.
            unsafe {
                let vao = self.gl.create_vertex_array().ok()?;
                let vbo = self.gl.create_buffer().ok()?;
                self.gl.bind_vertex_array(Some(vao));
                self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
                self.gl.buffer_data_u8_slice(
                    glow::ARRAY_BUFFER,
                    bytemuck::cast_slice(&FULLSCREEN_QUAD),
                    glow::DYNAMIC_DRAW,
                );
                let stride = std::mem::size_of::<QuadVertex>() as i32;
                self.gl.enable_vertex_attrib_array(0);
                self.gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
                self.gl.enable_vertex_attrib_array(1);
                self.gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, stride, 12);
                self.quad = Some((vao, vbo));
            }
        }
        self.quad
    }
}

impl Drop for GlowDriver {
    fn drop(&mut self) {
        if let Some((vao, vbo)) = self.quad.take() {
            // SAFETY: context is current.
            unsafe {
                self.gl.delete_vertex_array(vao);
                self.gl.delete_buffer(vbo);
            }
        }
    }
}

// SAFETY (all methods): GlDriver is only driven from the render thread that
// owns the current context.
impl GlDriver for GlowDriver {
    fn caps(&self) -> DriverCaps {
        self.caps
    }

    fn get_error(&mut self) -> u32 {
        unsafe { self.gl.get_error() }
    }

    fn set_capability(&mut self, cap: Capability, enabled: bool) {
        let Some(cap) = capability(cap) else { return };
        unsafe {
            if enabled {
                self.gl.enable(cap);
            } else {
                self.gl.disable(cap);
            }
        }
    }

    fn active_texture(&mut self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) }
    }

    fn bind_texture(&mut self, tex: TextureId) {
        unsafe { self.gl.bind_texture(glow::TEXTURE_2D, texture(tex)) }
    }

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        unsafe { self.gl.blend_func(blend_factor(src), blend_factor(dst)) }
    }

    fn depth_func(&mut self, func: CompareFunc) {
        unsafe { self.gl.depth_func(compare_func(func)) }
    }

    fn depth_mask(&mut self, write: bool) {
        unsafe { self.gl.depth_mask(write) }
    }

    fn depth_range(&mut self, near: f32, far: f32) {
        unsafe { self.gl.depth_range_f32(near, far) }
    }

    fn alpha_func(&mut self, _func: CompareFunc, _reference: f32) {}

    fn cull_face(&mut self, face: Face) {
        let face = match face {
            Face::Front => glow::FRONT,
            Face::Back => glow::BACK,
            Face::FrontAndBack => glow::FRONT_AND_BACK,
        };
        unsafe { self.gl.cull_face(face) }
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        unsafe { self.gl.polygon_offset(factor, units) }
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) }
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        unsafe { self.gl.clear_color(rgba[0], rgba[1], rgba[2], rgba[3]) }
    }

    fn clear(&mut self, buffers: ClearBuffers) {
        unsafe { self.gl.clear(buffers.bits()) }
    }

    fn create_texture(&mut self) -> Option<TextureId> {
        unsafe { self.gl.create_texture().ok().map(|t| TextureId(t.0.get())) }
    }

    fn delete_texture(&mut self, tex: TextureId) {
        if let Some(t) = texture(tex) {
            unsafe { self.gl.delete_texture(t) }
        }
    }

    fn tex_storage_2d(&mut self, width: i32, height: i32, format: ColorFormat) {
        let (internal, pixel_format, ty) = color_format(format);
        unsafe {
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal,
                width,
                height,
                0,
                pixel_format,
                ty,
                PixelUnpackData::Slice(None),
            );
        }
    }

    fn tex_filter(&mut self, bilinear: bool) {
        let filter = (if bilinear { glow::LINEAR } else { glow::NEAREST }) as i32;
        unsafe {
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter);
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter);
        }
    }

    fn tex_clamp_to_edge(&mut self) {
        unsafe {
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
        }
    }

    fn tex_max_level(&mut self, level: i32) {
        unsafe { self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAX_LEVEL, level) }
    }

    fn create_renderbuffer(&mut self) -> Option<RenderbufferId> {
        unsafe { self.gl.create_renderbuffer().ok().map(|r| RenderbufferId(r.0.get())) }
    }

    fn delete_renderbuffer(&mut self, rb: RenderbufferId) {
        if let Some(r) = renderbuffer(rb) {
            unsafe { self.gl.delete_renderbuffer(r) }
        }
    }

    fn renderbuffer_depth_stencil(&mut self, rb: RenderbufferId, width: i32, height: i32) {
        unsafe {
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, renderbuffer(rb));
            self.gl.renderbuffer_storage(glow::RENDERBUFFER, glow::DEPTH24_STENCIL8, width, height);
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, None);
        }
    }

    fn create_framebuffer(&mut self) -> Option<FramebufferId> {
        if !self.caps.framebuffer_object {
            return None;
        }
        unsafe { self.gl.create_framebuffer().ok().map(|f| FramebufferId(f.0.get())) }
    }

    fn delete_framebuffer(&mut self, fb: FramebufferId) {
        if let Some(f) = framebuffer(fb) {
            unsafe { self.gl.delete_framebuffer(f) }
        }
    }

    fn bind_framebuffer(&mut self, fb: FramebufferId) {
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer(fb)) }
    }

    fn attach_color_texture(&mut self, tex: TextureId) {
        unsafe {
            self.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                texture(tex),
                0,
            );
        }
    }

    fn attach_depth_stencil(&mut self, rb: RenderbufferId) {
        unsafe {
            self.gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::DEPTH_STENCIL_ATTACHMENT,
                glow::RENDERBUFFER,
                renderbuffer(rb),
            );
        }
    }

    fn framebuffer_complete(&mut self) -> bool {
        unsafe { self.gl.check_framebuffer_status(glow::FRAMEBUFFER) == glow::FRAMEBUFFER_COMPLETE }
    }

    fn create_shader(&mut self, stage: ShaderStage) -> Option<ShaderId> {
        let ty = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe { self.gl.create_shader(ty).ok().map(|s| ShaderId(s.0.get())) }
    }

    fn shader_source(&mut self, id: ShaderId, source: &str) {
        if let Some(s) = shader(id) {
            unsafe { self.gl.shader_source(s, source) }
        }
    }

    fn compile_shader(&mut self, id: ShaderId) {
        if let Some(s) = shader(id) {
            unsafe { self.gl.compile_shader(s) }
        }
    }

    fn shader_compile_status(&mut self, id: ShaderId) -> bool {
        shader(id).map(|s| unsafe { self.gl.get_shader_compile_status(s) }).unwrap_or(false)
    }

    fn shader_info_log(&mut self, id: ShaderId) -> String {
        shader(id).map(|s| unsafe { self.gl.get_shader_info_log(s) }).unwrap_or_default()
    }

    fn delete_shader(&mut self, id: ShaderId) {
        if let Some(s) = shader(id) {
            unsafe { self.gl.delete_shader(s) }
        }
    }

    fn create_program(&mut self) -> Option<ProgramId> {
        unsafe { self.gl.create_program().ok().map(|p| ProgramId(p.0.get())) }
    }

    fn attach_shader(&mut self, prog: ProgramId, id: ShaderId) {
        if let (Some(p), Some(s)) = (program(prog), shader(id)) {
            unsafe { self.gl.attach_shader(p, s) }
        }
    }

    fn bind_attrib_location(&mut self, prog: ProgramId, index: u32, name: &str) {
        if let Some(p) = program(prog) {
            unsafe { self.gl.bind_attrib_location(p, index, name) }
        }
    }

    fn link_program(&mut self, prog: ProgramId) {
        if let Some(p) = program(prog) {
            unsafe { self.gl.link_program(p) }
        }
    }

    fn program_link_status(&mut self, prog: ProgramId) -> bool {
        program(prog).map(|p| unsafe { self.gl.get_program_link_status(p) }).unwrap_or(false)
    }

    fn program_info_log(&mut self, prog: ProgramId) -> String {
        program(prog).map(|p| unsafe { self.gl.get_program_info_log(p) }).unwrap_or_default()
    }

    fn delete_program(&mut self, prog: ProgramId) {
        if let Some(p) = program(prog) {
            unsafe { self.gl.delete_program(p) }
        }
    }

    fn use_program(&mut self, prog: ProgramId) {
        unsafe { self.gl.use_program(program(prog)) }
    }

    fn get_uniform_location(&mut self, prog: ProgramId, name: &str) -> Option<UniformLocation> {
        let p = program(prog)?;
        unsafe { self.gl.get_uniform_location(p, name).map(|l| UniformLocation(l.0)) }
    }

    fn uniform_1i(&mut self, loc: UniformLocation, value: i32) {
        unsafe { self.gl.uniform_1_i32(Some(&uniform(loc)), value) }
    }

    fn uniform_1f(&mut self, loc: UniformLocation, value: f32) {
        unsafe { self.gl.uniform_1_f32(Some(&uniform(loc)), value) }
    }

    fn uniform_2f(&mut self, loc: UniformLocation, x: f32, y: f32) {
        unsafe { self.gl.uniform_2_f32(Some(&uniform(loc)), x, y) }
    }

    fn uniform_4f(&mut self, loc: UniformLocation, v: [f32; 4]) {
        unsafe { self.gl.uniform_4_f32(Some(&uniform(loc)), v[0], v[1], v[2], v[3]) }
    }

    fn uniform_matrix_4(&mut self, loc: UniformLocation, value: &[f32; 16]) {
        unsafe { self.gl.uniform_matrix_4_f32_slice(Some(&uniform(loc)), false, value) }
    }

    fn draw_quad(&mut self, vertices: &[QuadVertex; 4]) {
        let Some((vao, vbo)) = self.quad_geometry() else {
            log::warn!(target: "q2vr", "draw_quad: unable to create quad geometry");
            return;
        };
        unsafe {
            self.gl.bind_vertex_array(Some(vao));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            self.gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, 0, bytemuck::cast_slice(vertices));
            self.gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);
        }
    }

    fn finish(&mut self) {
        unsafe { self.gl.finish() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_formats() {
        assert_eq!(color_format(ColorFormat::Rgba8), (glow::RGBA8 as i32, glow::RGBA, glow::UNSIGNED_BYTE));
        assert_eq!(color_format(ColorFormat::Rgba16F).2, glow::HALF_FLOAT);
        assert_eq!(color_format(ColorFormat::Srgb8Alpha8).0, glow::SRGB8_ALPHA8 as i32);
    }

    #[test]
    fn test_blend_factors() {
        assert_eq!(blend_factor(BlendFactor::One), glow::ONE);
        assert_eq!(blend_factor(BlendFactor::OneMinusSrcAlpha), glow::ONE_MINUS_SRC_ALPHA);
    }
}
