// state.rs -- GPU state record and binding cache
//
// GlContext owns the driver. Every state change goes through a setter that
// compares against the cached value and only reaches the driver on change.
// A cached `None` means "unknown", so the next set always goes through.

use q2vr_common::common::{com_error, vid_printf};
use q2vr_common::q_shared::{VidDef, ERR_FATAL, PRINT_ALERT, PRINT_ALL};

use crate::driver::*;
use crate::framebuffer::FboView;
use crate::math::{self, Mat4};
use crate::RenderError;

pub const MAX_TEXTURE_UNITS: usize = 4;

/// Deepest push the matrix stacks accept (the stack holds this many entries
/// including the base).
pub const MAX_MATRIX_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixMode {
    Projection,
    ModelView,
    Texture,
    Color,
}

impl MatrixMode {
    pub const COUNT: usize = 4;

    pub const ALL: [MatrixMode; MatrixMode::COUNT] =
        [MatrixMode::Projection, MatrixMode::ModelView, MatrixMode::Texture, MatrixMode::Color];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// A bounded matrix stack. Never empty; the base entry cannot be popped.
#[derive(Debug, Clone)]
pub struct MatrixStack {
    stack: Vec<Mat4>,
}

impl MatrixStack {
    fn new() -> Self {
        Self { stack: vec![math::IDENTITY] }
    }

    pub fn top(&self) -> &Mat4 {
        // never empty
        &self.stack[self.stack.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Mat4 {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    /// Number of pushes currently outstanding.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }
}

/// The GPU state record.
pub struct GlContext<D: GlDriver> {
    driver: D,
    caps: DriverCaps,

    current_unit: Option<u32>,
    textures: [Option<TextureId>; MAX_TEXTURE_UNITS],
    texture_enabled: [bool; MAX_TEXTURE_UNITS],

    enabled: [Option<bool>; Capability::COUNT],
    blend: Option<(BlendFactor, BlendFactor)>,
    depth_func: Option<CompareFunc>,
    alpha_func: Option<(CompareFunc, f32)>,
    cull_face: Option<Face>,
    depth_mask: Option<bool>,
    depth_range: Option<(f32, f32)>,
    polygon_offset: Option<(f32, f32)>,
    clear_color: Option<[f32; 4]>,
    viewport: Option<[i32; 4]>,
    program: Option<ProgramId>,

    /// Active framebuffer. Weak: the owning feature keeps the objects alive.
    framebuffer: Option<FboView>,

    matrix_mode: MatrixMode,
    matrices: [MatrixStack; MatrixMode::COUNT],

    /// Clears issued since the last [`GlContext::take_clear_count`].
    clear_count: u32,

    /// Logical size of the current render target, used by 2D and HUD code.
    pub vid: VidDef,
}

impl<D: GlDriver> GlContext<D> {
    pub fn new(driver: D) -> Self {
        let caps = driver.caps();
        Self {
            driver,
            caps,
            current_unit: None,
            textures: [None; MAX_TEXTURE_UNITS],
            texture_enabled: [false; MAX_TEXTURE_UNITS],
            enabled: [None; Capability::COUNT],
            blend: None,
            depth_func: None,
            alpha_func: None,
            cull_face: None,
            depth_mask: None,
            depth_range: None,
            polygon_offset: None,
            clear_color: None,
            viewport: None,
            program: None,
            framebuffer: None,
            matrix_mode: MatrixMode::ModelView,
            matrices: [MatrixStack::new(), MatrixStack::new(), MatrixStack::new(), MatrixStack::new()],
            clear_count: 0,
            vid: VidDef::default(),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Raw driver access. The cache can no longer vouch for the driver state
    /// afterwards, so every cached value is forgotten.
    pub fn driver_mut(&mut self) -> &mut D {
        self.invalidate();
        &mut self.driver
    }

    pub fn caps(&self) -> DriverCaps {
        self.caps
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Forget every cached value. The next setter call reaches the driver.
    pub fn invalidate(&mut self) {
        self.current_unit = None;
        self.textures = [None; MAX_TEXTURE_UNITS];
        self.enabled = [None; Capability::COUNT];
        self.blend = None;
        self.depth_func = None;
        self.alpha_func = None;
        self.cull_face = None;
        self.depth_mask = None;
        self.depth_range = None;
        self.polygon_offset = None;
        self.clear_color = None;
        self.viewport = None;
        self.program = None;
        self.framebuffer = None;
    }

    /// Put every cached value, and the driver, into a known state.
    pub fn set_default_state(&mut self) {
        self.invalidate();

        self.set_clear_color([1.0, 0.0, 0.5, 0.5]);
        self.set_cull_face(Face::Front);

        for cap in Capability::ALL {
            self.set_enabled(cap, matches!(cap, Capability::DepthTest | Capability::CullFace));
        }

        self.blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        self.set_depth_func(CompareFunc::LEqual);
        self.set_alpha_func(CompareFunc::Greater, 0.666);
        self.set_depth_mask(true);
        self.set_depth_range(0.0, 1.0);
        self.set_polygon_offset(0.0, 0.0);

        let units = self.texture_unit_count();
        for unit in (0..units).rev() {
            // unit < texture_unit_count, cannot fail
            let _ = self.mbind(unit, TextureId::NONE);
            self.texture_enabled[unit as usize] = unit == 0;
        }

        for stack in self.matrices.iter_mut() {
            stack.stack.truncate(1);
            *stack.top_mut() = math::IDENTITY;
        }
        self.matrix_mode = MatrixMode::ModelView;

        self.use_program(ProgramId::NONE);
        self.bind_framebuffer(FboView::default());
    }

    // ================================================================
    // Textures
    // ================================================================

    pub fn texture_unit_count(&self) -> u32 {
        self.caps.max_texture_units.min(MAX_TEXTURE_UNITS as u32)
    }

    /// Select the active texture unit.
    pub fn select_texture(&mut self, unit: u32) -> Result<(), RenderError> {
        if unit >= self.texture_unit_count() {
            vid_printf(PRINT_ALERT, &format!("Attempted selection of unsupported texture unit GL_TEXTURE{}\n", unit));
            return Err(RenderError::UnsupportedTextureUnit(unit));
        }
        if self.current_unit == Some(unit) {
            return Ok(());
        }
        self.driver.active_texture(unit);
        self.current_unit = Some(unit);
        Ok(())
    }

    pub fn current_texture_unit(&self) -> Option<u32> {
        self.current_unit
    }

    /// Bind `texture` on the current unit (unit 0 if none selected yet).
    pub fn bind(&mut self, texture: TextureId) {
        let unit = match self.current_unit {
            Some(unit) => unit,
            None => {
                // unit 0 always exists
                let _ = self.select_texture(0);
                0
            }
        };
        let slot = &mut self.textures[unit as usize];
        if *slot == Some(texture) {
            return;
        }
        self.driver.bind_texture(texture);
        *slot = Some(texture);
    }

    /// Bind `texture` on `unit`.
    pub fn mbind(&mut self, unit: u32, texture: TextureId) -> Result<(), RenderError> {
        self.select_texture(unit)?;
        self.bind(texture);
        Ok(())
    }

    /// Cached binding for a unit. `None` = unknown, `Some(TextureId::NONE)` = unbound.
    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.textures.get(unit as usize).copied().flatten()
    }

    pub fn enable_texture(&mut self, unit: u32) -> Result<(), RenderError> {
        self.select_texture(unit)?;
        self.texture_enabled[unit as usize] = true;
        Ok(())
    }

    pub fn disable_texture(&mut self, unit: u32) -> Result<(), RenderError> {
        self.select_texture(unit)?;
        self.texture_enabled[unit as usize] = false;
        Ok(())
    }

    pub fn texture_enabled(&self, unit: u32) -> bool {
        self.texture_enabled.get(unit as usize).copied().unwrap_or(false)
    }

    // ================================================================
    // Capabilities and fixed state
    // ================================================================

    pub fn enable(&mut self, cap: Capability) {
        self.set_enabled(cap, true);
    }

    pub fn disable(&mut self, cap: Capability) {
        self.set_enabled(cap, false);
    }

    pub fn set_enabled(&mut self, cap: Capability, enabled: bool) {
        let slot = &mut self.enabled[cap.index()];
        if *slot == Some(enabled) {
            return;
        }
        self.driver.set_capability(cap, enabled);
        *slot = Some(enabled);
    }

    pub fn is_enabled(&self, cap: Capability) -> Option<bool> {
        self.enabled[cap.index()]
    }

    pub fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        if self.blend == Some((src, dst)) {
            return;
        }
        self.driver.blend_func(src, dst);
        self.blend = Some((src, dst));
    }

    pub fn blend_factors(&self) -> Option<(BlendFactor, BlendFactor)> {
        self.blend
    }

    pub fn set_depth_func(&mut self, func: CompareFunc) {
        if self.depth_func == Some(func) {
            return;
        }
        self.driver.depth_func(func);
        self.depth_func = Some(func);
    }

    pub fn set_alpha_func(&mut self, func: CompareFunc, reference: f32) {
        if self.alpha_func == Some((func, reference)) {
            return;
        }
        self.driver.alpha_func(func, reference);
        self.alpha_func = Some((func, reference));
    }

    pub fn alpha_func(&self) -> Option<(CompareFunc, f32)> {
        self.alpha_func
    }

    pub fn set_cull_face(&mut self, face: Face) {
        if self.cull_face == Some(face) {
            return;
        }
        self.driver.cull_face(face);
        self.cull_face = Some(face);
    }

    pub fn set_depth_mask(&mut self, write: bool) {
        if self.depth_mask == Some(write) {
            return;
        }
        self.driver.depth_mask(write);
        self.depth_mask = Some(write);
    }

    pub fn set_depth_range(&mut self, near: f32, far: f32) {
        if self.depth_range == Some((near, far)) {
            return;
        }
        self.driver.depth_range(near, far);
        self.depth_range = Some((near, far));
    }

    pub fn set_polygon_offset(&mut self, factor: f32, units: f32) {
        if self.polygon_offset == Some((factor, units)) {
            return;
        }
        self.driver.polygon_offset(factor, units);
        self.polygon_offset = Some((factor, units));
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        if self.clear_color == Some(rgba) {
            return;
        }
        self.driver.clear_color(rgba);
        self.clear_color = Some(rgba);
    }

    pub fn clear_color(&self) -> Option<[f32; 4]> {
        self.clear_color
    }

    pub fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        let rect = [x, y, width, height];
        if self.viewport == Some(rect) {
            return;
        }
        self.driver.viewport(x, y, width, height);
        self.viewport = Some(rect);
    }

    pub fn viewport(&self) -> Option<[i32; 4]> {
        self.viewport
    }

    pub fn use_program(&mut self, program: ProgramId) {
        if self.program == Some(program) {
            return;
        }
        self.driver.use_program(program);
        self.program = Some(program);
    }

    // ================================================================
    // Framebuffers
    // ================================================================

    /// Make `view` the active framebuffer. Does not touch the viewport.
    pub fn bind_framebuffer(&mut self, view: FboView) {
        let known = self.framebuffer.map(|f| f.framebuffer);
        if known != Some(view.framebuffer) {
            self.driver.bind_framebuffer(view.framebuffer);
        }
        self.framebuffer = Some(view);
    }

    /// The active framebuffer, or the window target if never bound.
    pub fn current_framebuffer(&self) -> FboView {
        self.framebuffer.unwrap_or_default()
    }

    /// Point the viewport and logical size at a framebuffer's dimensions.
    pub fn fit_viewport(&mut self, view: FboView) {
        self.set_viewport(0, 0, view.width, view.height);
        self.vid.width = view.width;
        self.vid.height = view.height;
    }

    pub fn create_framebuffer(&mut self) -> Option<FramebufferId> {
        self.driver.create_framebuffer()
    }

    pub fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        if framebuffer.is_none() {
            return;
        }
        self.driver.delete_framebuffer(framebuffer);
        // the driver falls back to the window target
        if self.framebuffer.map(|f| f.framebuffer) == Some(framebuffer) {
            self.framebuffer = Some(FboView::default());
        }
    }

    pub fn attach_color_texture(&mut self, texture: TextureId) {
        self.driver.attach_color_texture(texture);
    }

    pub fn attach_depth_stencil(&mut self, renderbuffer: RenderbufferId) {
        self.driver.attach_depth_stencil(renderbuffer);
    }

    pub fn framebuffer_complete(&mut self) -> bool {
        self.driver.framebuffer_complete()
    }

    pub fn clear(&mut self, buffers: ClearBuffers) {
        self.driver.clear(buffers);
        self.clear_count += 1;
    }

    /// Clears since the previous call (per-frame statistics).
    pub fn take_clear_count(&mut self) -> u32 {
        std::mem::take(&mut self.clear_count)
    }

    // ================================================================
    // Texture and renderbuffer objects
    // ================================================================

    pub fn create_texture(&mut self) -> Option<TextureId> {
        self.driver.create_texture()
    }

    pub fn delete_texture(&mut self, texture: TextureId) {
        if texture.is_none() {
            return;
        }
        self.driver.delete_texture(texture);
        for slot in self.textures.iter_mut() {
            if *slot == Some(texture) {
                *slot = Some(TextureId::NONE);
            }
        }
    }

    /// Allocate storage for the texture bound on the current unit.
    pub fn tex_storage_2d(&mut self, width: i32, height: i32, format: ColorFormat) {
        self.driver.tex_storage_2d(width, height, format);
    }

    pub fn tex_filter(&mut self, bilinear: bool) {
        self.driver.tex_filter(bilinear);
    }

    pub fn tex_clamp_to_edge(&mut self) {
        self.driver.tex_clamp_to_edge();
    }

    pub fn tex_max_level(&mut self, level: i32) {
        self.driver.tex_max_level(level);
    }

    pub fn create_renderbuffer(&mut self) -> Option<RenderbufferId> {
        self.driver.create_renderbuffer()
    }

    pub fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        if !renderbuffer.is_none() {
            self.driver.delete_renderbuffer(renderbuffer);
        }
    }

    pub fn renderbuffer_depth_stencil(&mut self, renderbuffer: RenderbufferId, width: i32, height: i32) {
        self.driver.renderbuffer_depth_stencil(renderbuffer, width, height);
    }

    // ================================================================
    // Shaders
    // ================================================================

    pub fn create_shader(&mut self, stage: ShaderStage) -> Option<ShaderId> {
        self.driver.create_shader(stage)
    }

    pub fn shader_source(&mut self, shader: ShaderId, source: &str) {
        self.driver.shader_source(shader, source);
    }

    pub fn compile_shader(&mut self, shader: ShaderId) {
        self.driver.compile_shader(shader);
    }

    pub fn shader_compile_status(&mut self, shader: ShaderId) -> bool {
        self.driver.shader_compile_status(shader)
    }

    pub fn shader_info_log(&mut self, shader: ShaderId) -> String {
        self.driver.shader_info_log(shader)
    }

    pub fn delete_shader(&mut self, shader: ShaderId) {
        if !shader.is_none() {
            self.driver.delete_shader(shader);
        }
    }

    pub fn create_program(&mut self) -> Option<ProgramId> {
        self.driver.create_program()
    }

    pub fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        self.driver.attach_shader(program, shader);
    }

    pub fn bind_attrib_location(&mut self, program: ProgramId, index: u32, name: &str) {
        self.driver.bind_attrib_location(program, index, name);
    }

    pub fn link_program(&mut self, program: ProgramId) {
        self.driver.link_program(program);
    }

    pub fn program_link_status(&mut self, program: ProgramId) -> bool {
        self.driver.program_link_status(program)
    }

    pub fn program_info_log(&mut self, program: ProgramId) -> String {
        self.driver.program_info_log(program)
    }

    pub fn delete_program(&mut self, program: ProgramId) {
        if program.is_none() {
            return;
        }
        self.driver.delete_program(program);
        if self.program == Some(program) {
            self.program = Some(ProgramId::NONE);
        }
    }

    pub fn get_uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.driver.get_uniform_location(program, name)
    }

    pub fn uniform_1i(&mut self, location: Option<UniformLocation>, value: i32) {
        if let Some(loc) = location {
            self.driver.uniform_1i(loc, value);
        }
    }

    pub fn uniform_1f(&mut self, location: Option<UniformLocation>, value: f32) {
        if let Some(loc) = location {
            self.driver.uniform_1f(loc, value);
        }
    }

    pub fn uniform_2f(&mut self, location: Option<UniformLocation>, x: f32, y: f32) {
        if let Some(loc) = location {
            self.driver.uniform_2f(loc, x, y);
        }
    }

    pub fn uniform_4f(&mut self, location: Option<UniformLocation>, value: [f32; 4]) {
        if let Some(loc) = location {
            self.driver.uniform_4f(loc, value);
        }
    }

    pub fn uniform_matrix_4(&mut self, location: Option<UniformLocation>, value: &Mat4) {
        if let Some(loc) = location {
            self.driver.uniform_matrix_4(loc, math::as_slice(value));
        }
    }

    // ================================================================
    // Drawing and errors
    // ================================================================

    pub fn draw_quad(&mut self, vertices: &[QuadVertex; 4]) {
        self.driver.draw_quad(vertices);
    }

    pub fn finish(&mut self) {
        self.driver.finish();
    }

    /// Query the driver error and log it with `context`.
    pub fn check_error(&mut self, context: &str) -> Result<(), RenderError> {
        let code = self.driver.get_error();
        if code == NO_ERROR {
            return Ok(());
        }
        let err = RenderError::Driver { code, context: context.to_string() };
        vid_printf(PRINT_ALL, &format!("{}\n", err));
        Err(err)
    }

    /// Drain stale driver errors without reporting them.
    pub fn drain_errors(&mut self) {
        // bounded: a broken driver could report forever
        for _ in 0..32 {
            if self.driver.get_error() == NO_ERROR {
                break;
            }
        }
    }

    // ================================================================
    // Matrix stacks
    // ================================================================

    pub fn matrix_mode(&mut self, mode: MatrixMode) {
        self.matrix_mode = mode;
    }

    pub fn current_matrix_mode(&self) -> MatrixMode {
        self.matrix_mode
    }

    pub fn load_identity(&mut self) {
        *self.matrices[self.matrix_mode.index()].top_mut() = math::IDENTITY;
    }

    pub fn load_matrix(&mut self, m: &Mat4) {
        *self.matrices[self.matrix_mode.index()].top_mut() = *m;
    }

    pub fn multiply_matrix(&mut self, m: &Mat4) {
        let top = self.matrices[self.matrix_mode.index()].top_mut();
        *top = math::mul(top, m);
    }

    /// Reset projection to a pixel-space ortho of the current `vid` and
    /// modelview to identity (2D drawing setup).
    pub fn set_identity_ortho(&mut self) {
        let ortho = math::ortho(0.0, self.vid.width as f32, self.vid.height as f32, 0.0, -99999.0, 99999.0);
        let mode = self.matrix_mode;
        self.matrix_mode(MatrixMode::Projection);
        self.load_matrix(&ortho);
        self.matrix_mode(MatrixMode::ModelView);
        self.load_identity();
        self.matrix_mode(mode);
    }

    pub fn push_matrix(&mut self) -> Result<(), RenderError> {
        let mode = self.matrix_mode;
        let stack = &mut self.matrices[mode.index()];
        if stack.stack.len() >= MAX_MATRIX_DEPTH {
            vid_printf(PRINT_ALERT, &format!("push_matrix: {:?} stack overflow\n", mode));
            return Err(RenderError::InvalidUsage(format!("{:?} matrix stack overflow", mode)));
        }
        let top = *stack.top();
        stack.stack.push(top);
        Ok(())
    }

    /// Pop the current stack. Popping past the base entry is fatal.
    pub fn pop_matrix(&mut self) {
        let mode = self.matrix_mode;
        let stack = &mut self.matrices[mode.index()];
        if stack.stack.len() <= 1 {
            com_error(ERR_FATAL, &format!("pop_matrix: {:?} stack underflow", mode));
            return;
        }
        stack.stack.pop();
    }

    pub fn top(&self, mode: MatrixMode) -> &Mat4 {
        self.matrices[mode.index()].top()
    }

    pub fn matrix_depth(&self, mode: MatrixMode) -> usize {
        self.matrices[mode.index()].depth()
    }

    /// projection * modelview
    pub fn model_view_projection(&self) -> Mat4 {
        math::mul(self.top(MatrixMode::Projection), self.top(MatrixMode::ModelView))
    }

    // ================================================================
    // Diagnostics
    // ================================================================

    /// Human-readable dump of the cache (r_glstate).
    pub fn dump_state(&self) -> String {
        fn known<T: std::fmt::Debug>(v: &Option<T>) -> String {
            match v {
                Some(v) => format!("{:?}", v),
                None => "unknown".to_string(),
            }
        }

        let mut out = String::new();
        for cap in Capability::ALL {
            let state = match self.enabled[cap.index()] {
                Some(true) => "enabled",
                Some(false) => "disabled",
                None => "unknown",
            };
            out.push_str(&format!("{}: {}\n", cap.name(), state));
        }
        out.push_str(&format!("active texture unit: {}\n", known(&self.current_unit)));
        for unit in 0..self.texture_unit_count() as usize {
            out.push_str(&format!(
                "GL_TEXTURE{}: {} ({})\n",
                unit,
                known(&self.textures[unit].map(|t| t.0)),
                if self.texture_enabled[unit] { "enabled" } else { "disabled" }
            ));
        }
        out.push_str(&format!("blend func: {}\n", known(&self.blend)));
        out.push_str(&format!("depth func: {}\n", known(&self.depth_func)));
        out.push_str(&format!("alpha func: {}\n", known(&self.alpha_func)));
        out.push_str(&format!("cull face: {}\n", known(&self.cull_face)));
        out.push_str(&format!("viewport: {}\n", known(&self.viewport)));
        out.push_str(&format!("framebuffer: {}\n", known(&self.framebuffer.map(|f| f.framebuffer.0))));
        out.push_str(&format!("vid: {}x{}\n", self.vid.width, self.vid.height));
        for mode in MatrixMode::ALL {
            out.push_str(&format!("{:?} stack depth: {}\n", mode, self.matrix_depth(mode)));
        }
        out
    }

    pub fn print_state(&self) {
        for line in self.dump_state().lines() {
            vid_printf(PRINT_ALL, &format!("{}\n", line));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> GlContext<HeadlessDriver> {
        GlContext::new(HeadlessDriver::new())
    }

    fn texture(ctx: &mut GlContext<HeadlessDriver>) -> TextureId {
        ctx.create_texture().unwrap()
    }

    #[test]
    fn test_redundant_texture_binds_elided() {
        let mut ctx = context();
        let a = texture(&mut ctx);
        let b = texture(&mut ctx);

        // (unit, texture); entries 0, 2, 4, 5 and 7 change the binding
        let sequence = [(0, a), (0, a), (1, b), (1, b), (0, b), (0, TextureId::NONE), (0, TextureId::NONE), (1, a)];
        for (unit, tex) in sequence {
            ctx.mbind(unit, tex).unwrap();
        }
        assert_eq!(ctx.driver().counters.texture_binds, 5);
        assert_eq!(ctx.bound_texture(0), Some(TextureId::NONE));
        assert_eq!(ctx.bound_texture(1), Some(a));
        assert_eq!(ctx.bound_texture(2), None);
        assert_eq!(ctx.driver().bound_texture(1), a);
    }

    #[test]
    fn test_unbind_is_distinct_from_unknown() {
        let mut ctx = context();
        // unknown -> 0 must reach the driver
        ctx.mbind(0, TextureId::NONE).unwrap();
        assert_eq!(ctx.driver().counters.texture_binds, 1);
        ctx.mbind(0, TextureId::NONE).unwrap();
        assert_eq!(ctx.driver().counters.texture_binds, 1);
    }

    #[test]
    fn test_unsupported_texture_unit() {
        let mut ctx = context();
        assert_eq!(ctx.select_texture(4), Err(RenderError::UnsupportedTextureUnit(4)));
        assert_eq!(ctx.current_texture_unit(), None);
        assert!(ctx.mbind(7, TextureId::NONE).is_err());
        assert_eq!(ctx.driver().counters.active_texture_calls, 0);
    }

    #[test]
    fn test_capabilities_deduplicated() {
        let mut ctx = context();
        ctx.enable(Capability::Blend);
        ctx.enable(Capability::Blend);
        ctx.disable(Capability::Blend);
        ctx.disable(Capability::Blend);
        ctx.blend_func(BlendFactor::One, BlendFactor::One);
        ctx.blend_func(BlendFactor::One, BlendFactor::One);
        assert_eq!(ctx.driver().counters.capability_changes, 2);
        assert_eq!(ctx.driver().counters.blend_func_calls, 1);
        assert_eq!(ctx.blend_factors(), Some((BlendFactor::One, BlendFactor::One)));
        assert_eq!(ctx.driver().current_blend_func(), (BlendFactor::One, BlendFactor::One));
        assert_eq!(ctx.is_enabled(Capability::Blend), Some(false));
        assert!(!ctx.driver().is_enabled(Capability::Blend));
    }

    #[test]
    fn test_default_state() {
        let mut ctx = context();
        ctx.set_default_state();
        assert_eq!(ctx.is_enabled(Capability::DepthTest), Some(true));
        assert_eq!(ctx.is_enabled(Capability::CullFace), Some(true));
        assert_eq!(ctx.is_enabled(Capability::Blend), Some(false));
        assert_eq!(ctx.alpha_func(), Some((CompareFunc::Greater, 0.666)));
        assert_eq!(ctx.clear_color(), Some([1.0, 0.0, 0.5, 0.5]));
        assert_eq!(ctx.current_texture_unit(), Some(0));
        assert!(ctx.texture_enabled(0));
        assert!(!ctx.texture_enabled(1));
        assert_eq!(ctx.top(MatrixMode::Projection), &math::IDENTITY);

        // everything is cached now
        let before = ctx.driver().counters.capability_changes;
        ctx.enable(Capability::DepthTest);
        assert_eq!(ctx.driver().counters.capability_changes, before);
    }

    #[test]
    fn test_balanced_push_pop() {
        let mut ctx = context();
        ctx.matrix_mode(MatrixMode::ModelView);
        ctx.load_matrix(&math::translate(1.0, 2.0, 3.0));
        let before = *ctx.top(MatrixMode::ModelView);

        ctx.push_matrix().unwrap();
        ctx.multiply_matrix(&math::translate(5.0, 0.0, 0.0));
        ctx.push_matrix().unwrap();
        ctx.load_identity();
        assert_eq!(ctx.matrix_depth(MatrixMode::ModelView), 2);
        ctx.pop_matrix();
        ctx.pop_matrix();

        assert_eq!(ctx.top(MatrixMode::ModelView), &before);
        assert_eq!(ctx.matrix_depth(MatrixMode::ModelView), 0);
    }

    #[test]
    fn test_matrix_stacks_independent() {
        let mut ctx = context();
        ctx.matrix_mode(MatrixMode::Projection);
        ctx.push_matrix().unwrap();
        ctx.load_matrix(&math::translate(0.0, 9.0, 0.0));
        assert_eq!(ctx.top(MatrixMode::ModelView), &math::IDENTITY);
        assert_eq!(ctx.matrix_depth(MatrixMode::ModelView), 0);
        ctx.pop_matrix();
        assert_eq!(ctx.top(MatrixMode::Projection), &math::IDENTITY);
    }

    #[test]
    #[should_panic(expected = "stack underflow")]
    fn test_pop_empty_stack_is_fatal() {
        let mut ctx = context();
        ctx.matrix_mode(MatrixMode::Texture);
        ctx.pop_matrix();
    }

    #[test]
    fn test_push_overflow_rejected() {
        let mut ctx = context();
        for _ in 0..MAX_MATRIX_DEPTH - 1 {
            ctx.push_matrix().unwrap();
        }
        assert!(ctx.push_matrix().is_err());
        assert_eq!(ctx.matrix_depth(MatrixMode::ModelView), MAX_MATRIX_DEPTH - 1);
    }

    #[test]
    fn test_delete_texture_scrubs_cache() {
        let mut ctx = context();
        let a = texture(&mut ctx);
        ctx.mbind(2, a).unwrap();
        ctx.delete_texture(a);
        assert_eq!(ctx.bound_texture(2), Some(TextureId::NONE));
    }

    #[test]
    fn test_check_error_reports_code() {
        let mut ctx = context();
        ctx.select_texture(0).unwrap();
        ctx.bind(TextureId(999));
        match ctx.check_error("bind") {
            Err(RenderError::Driver { code, .. }) => assert_eq!(code, INVALID_OPERATION),
            other => panic!("unexpected {:?}", other),
        }
        assert!(ctx.check_error("again").is_ok());
    }

    #[test]
    fn test_dump_state_mentions_units() {
        let mut ctx = context();
        ctx.set_default_state();
        let dump = ctx.dump_state();
        assert!(dump.contains("GL_BLEND: disabled"));
        assert!(dump.contains("GL_TEXTURE3"));
        assert!(dump.contains("ModelView stack depth: 0"));
    }
}
