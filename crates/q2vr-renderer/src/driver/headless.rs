//! Headless driver
//!
//! A software model of the GL object namespace. It allocates names, tracks
//! storage sizes and attachments, validates framebuffer completeness, does a
//! syntax sanity check on GLSL and records every call that reaches it, which
//! is what the test-suite asserts against.

use std::collections::{HashMap, HashSet};

use super::*;

#[derive(Debug, Clone, Copy, Default)]
struct TextureObject {
    width: i32,
    height: i32,
    format: Option<ColorFormat>,
    bilinear: bool,
    max_level: i32,
    clamp: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct FramebufferObject {
    color: TextureId,
    depth_stencil: RenderbufferId,
}

#[derive(Debug, Clone)]
struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Clone, Default)]
struct ProgramObject {
    attached: Vec<ShaderId>,
    attribs: Vec<(u32, String)>,
    uniforms: Vec<String>,
    linked: bool,
    log: String,
}

/// A clear that reached the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearRecord {
    pub framebuffer: FramebufferId,
    pub buffers: ClearBuffers,
    pub color: [f32; 4],
}

/// A quad draw that reached the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRecord {
    pub framebuffer: FramebufferId,
    pub program: ProgramId,
    pub texture: TextureId,
    pub viewport: [i32; 4],
    pub blend: bool,
}

/// Call counters.
#[derive(Debug, Clone, Default)]
pub struct HeadlessCounters {
    pub texture_binds: usize,
    pub active_texture_calls: usize,
    pub framebuffer_binds: usize,
    pub capability_changes: usize,
    pub blend_func_calls: usize,
    pub depth_func_calls: usize,
    pub alpha_func_calls: usize,
    pub viewport_calls: usize,
    pub program_binds: usize,
    pub uniform_sets: usize,
    /// Every vec4 uniform write, with the program it went to.
    pub uniforms_4f: Vec<(ProgramId, [f32; 4])>,
    pub finishes: usize,
    pub clears: Vec<ClearRecord>,
    pub draws: Vec<DrawRecord>,
}

impl HeadlessCounters {
    /// Number of clears issued while `framebuffer` was bound.
    pub fn clears_on(&self, framebuffer: FramebufferId) -> usize {
        self.clears.iter().filter(|c| c.framebuffer == framebuffer).count()
    }
}

pub struct HeadlessDriver {
    caps: DriverCaps,
    next_name: u32,
    errors: Vec<u32>,

    textures: HashMap<TextureId, TextureObject>,
    renderbuffers: HashMap<RenderbufferId, (i32, i32)>,
    framebuffers: HashMap<FramebufferId, FramebufferObject>,
    shaders: HashMap<ShaderId, ShaderObject>,
    programs: HashMap<ProgramId, ProgramObject>,

    active_unit: u32,
    bound_textures: Vec<TextureId>,
    bound_framebuffer: FramebufferId,
    current_program: ProgramId,
    enabled: HashSet<Capability>,
    viewport: [i32; 4],
    clear_color: [f32; 4],
    blend: (BlendFactor, BlendFactor),

    /// Make every completeness check fail (simulates a driver without the
    /// required attachment combination).
    pub force_incomplete: bool,
    pub counters: HeadlessCounters,
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self::with_caps(DriverCaps::default())
    }

    pub fn with_caps(caps: DriverCaps) -> Self {
        Self {
            caps,
            next_name: 1,
            errors: Vec::new(),
            textures: HashMap::new(),
            renderbuffers: HashMap::new(),
            framebuffers: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            active_unit: 0,
            bound_textures: vec![TextureId::NONE; caps.max_texture_units as usize],
            bound_framebuffer: FramebufferId::NONE,
            current_program: ProgramId::NONE,
            enabled: HashSet::new(),
            viewport: [0; 4],
            clear_color: [0.0; 4],
            blend: (BlendFactor::One, BlendFactor::Zero),
            force_incomplete: false,
            counters: HeadlessCounters::default(),
        }
    }

    fn gen_name(&mut self) -> u32 {
        let name = self.next_name;
        self.next_name += 1;
        name
    }

    fn raise(&mut self, code: u32) {
        self.errors.push(code);
    }

    fn current_texture(&self) -> TextureId {
        self.bound_textures
            .get(self.active_unit as usize)
            .copied()
            .unwrap_or(TextureId::NONE)
    }

    fn with_current_texture(&mut self, f: impl FnOnce(&mut TextureObject)) {
        let tex = self.current_texture();
        match self.textures.get_mut(&tex) {
            Some(obj) => f(obj),
            None => self.raise(INVALID_OPERATION),
        }
    }

    // ---- inspection ----

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_renderbuffers(&self) -> usize {
        self.renderbuffers.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn bound_framebuffer(&self) -> FramebufferId {
        self.bound_framebuffer
    }

    pub fn bound_texture(&self, unit: u32) -> TextureId {
        self.bound_textures.get(unit as usize).copied().unwrap_or(TextureId::NONE)
    }

    pub fn current_viewport(&self) -> [i32; 4] {
        self.viewport
    }

    pub fn current_blend_func(&self) -> (BlendFactor, BlendFactor) {
        self.blend
    }

    pub fn current_clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn is_enabled(&self, cap: Capability) -> bool {
        self.enabled.contains(&cap)
    }

    pub fn texture_size(&self, texture: TextureId) -> Option<(i32, i32)> {
        self.textures.get(&texture).map(|t| (t.width, t.height))
    }

    pub fn texture_bilinear(&self, texture: TextureId) -> Option<bool> {
        self.textures.get(&texture).map(|t| t.bilinear)
    }

    pub fn texture_max_level(&self, texture: TextureId) -> Option<i32> {
        self.textures.get(&texture).map(|t| t.max_level)
    }

    pub fn texture_clamped(&self, texture: TextureId) -> Option<bool> {
        self.textures.get(&texture).map(|t| t.clamp)
    }

    pub fn renderbuffer_size(&self, renderbuffer: RenderbufferId) -> Option<(i32, i32)> {
        self.renderbuffers.get(&renderbuffer).copied()
    }

    pub fn framebuffer_attachments(&self, framebuffer: FramebufferId) -> Option<(TextureId, RenderbufferId)> {
        self.framebuffers.get(&framebuffer).map(|f| (f.color, f.depth_stencil))
    }

    pub fn program_attribs(&self, program: ProgramId) -> Vec<(u32, String)> {
        self.programs.get(&program).map(|p| p.attribs.clone()).unwrap_or_default()
    }

    pub fn reset_counters(&mut self) {
        self.counters = HeadlessCounters::default();
    }
}

impl Default for HeadlessDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Cheap GLSL sanity check: needs an entry point and balanced delimiters.
fn check_glsl(source: &str) -> Result<(), String> {
    if source.trim().is_empty() {
        return Err("0:0(0): error: empty shader source".to_string());
    }
    if !source.contains("main") {
        return Err("0:0(0): error: no entry point main() defined".to_string());
    }
    let mut stack = Vec::new();
    for (line_no, line) in source.lines().enumerate() {
        let code = line.split("//").next().unwrap_or("");
        for c in code.chars() {
            match c {
                '{' | '(' | '[' => stack.push((c, line_no + 1)),
                '}' | ')' | ']' => {
                    let want = match c {
                        '}' => '{',
                        ')' => '(',
                        _ => '[',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == want => {}
                        _ => return Err(format!("0:{}(0): error: syntax error, unexpected '{}'", line_no + 1, c)),
                    }
                }
                _ => {}
            }
        }
    }
    if let Some((open, line)) = stack.pop() {
        return Err(format!("0:{}(0): error: syntax error, unmatched '{}' at end of input", line, open));
    }
    Ok(())
}

/// Names of `uniform` declarations in a GLSL source.
fn declared_uniforms(source: &str) -> Vec<String> {
    source
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("uniform "))
        .filter_map(|l| {
            let decl = l.trim_end_matches(';').trim();
            let name = decl.split_whitespace().last()?;
            Some(name.split('[').next().unwrap_or(name).trim_end_matches(';').to_string())
        })
        .collect()
}

impl GlDriver for HeadlessDriver {
    fn caps(&self) -> DriverCaps {
        self.caps
    }

    fn get_error(&mut self) -> u32 {
        if self.errors.is_empty() {
            NO_ERROR
        } else {
            self.errors.remove(0)
        }
    }

    fn set_capability(&mut self, cap: Capability, enabled: bool) {
        self.counters.capability_changes += 1;
        if enabled {
            self.enabled.insert(cap);
        } else {
            self.enabled.remove(&cap);
        }
    }

    fn active_texture(&mut self, unit: u32) {
        self.counters.active_texture_calls += 1;
        if unit >= self.caps.max_texture_units {
            self.raise(INVALID_ENUM);
            return;
        }
        self.active_unit = unit;
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.counters.texture_binds += 1;
        if !texture.is_none() && !self.textures.contains_key(&texture) {
            self.raise(INVALID_OPERATION);
            return;
        }
        let unit = self.active_unit as usize;
        if let Some(slot) = self.bound_textures.get_mut(unit) {
            *slot = texture;
        }
    }

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.counters.blend_func_calls += 1;
        self.blend = (src, dst);
    }

    fn depth_func(&mut self, _func: CompareFunc) {
        self.counters.depth_func_calls += 1;
    }

    fn depth_mask(&mut self, _write: bool) {}

    fn depth_range(&mut self, _near: f32, _far: f32) {}

    fn alpha_func(&mut self, _func: CompareFunc, _reference: f32) {
        self.counters.alpha_func_calls += 1;
    }

    fn cull_face(&mut self, _face: Face) {}

    fn polygon_offset(&mut self, _factor: f32, _units: f32) {}

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.counters.viewport_calls += 1;
        self.viewport = [x, y, width, height];
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    fn clear(&mut self, buffers: ClearBuffers) {
        self.counters.clears.push(ClearRecord {
            framebuffer: self.bound_framebuffer,
            buffers,
            color: self.clear_color,
        });
    }

    fn create_texture(&mut self) -> Option<TextureId> {
        let id = TextureId(self.gen_name());
        self.textures.insert(id, TextureObject::default());
        Some(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            for slot in self.bound_textures.iter_mut() {
                if *slot == texture {
                    *slot = TextureId::NONE;
                }
            }
        }
    }

    fn tex_storage_2d(&mut self, width: i32, height: i32, format: ColorFormat) {
        let max = self.caps.max_texture_size;
        if width <= 0 || height <= 0 || width > max || height > max {
            self.raise(INVALID_VALUE);
            return;
        }
        self.with_current_texture(|t| {
            t.width = width;
            t.height = height;
            t.format = Some(format);
        });
    }

    fn tex_filter(&mut self, bilinear: bool) {
        self.with_current_texture(|t| t.bilinear = bilinear);
    }

    fn tex_clamp_to_edge(&mut self) {
        self.with_current_texture(|t| t.clamp = true);
    }

    fn tex_max_level(&mut self, level: i32) {
        self.with_current_texture(|t| t.max_level = level);
    }

    fn create_renderbuffer(&mut self) -> Option<RenderbufferId> {
        let id = RenderbufferId(self.gen_name());
        self.renderbuffers.insert(id, (0, 0));
        Some(id)
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        self.renderbuffers.remove(&renderbuffer);
    }

    fn renderbuffer_depth_stencil(&mut self, renderbuffer: RenderbufferId, width: i32, height: i32) {
        let max = self.caps.max_texture_size;
        if !self.caps.packed_depth_stencil || width <= 0 || height <= 0 || width > max || height > max {
            self.raise(INVALID_VALUE);
            return;
        }
        match self.renderbuffers.get_mut(&renderbuffer) {
            Some(size) => *size = (width, height),
            None => self.raise(INVALID_OPERATION),
        }
    }

    fn create_framebuffer(&mut self) -> Option<FramebufferId> {
        if !self.caps.framebuffer_object {
            return None;
        }
        let id = FramebufferId(self.gen_name());
        self.framebuffers.insert(id, FramebufferObject::default());
        Some(id)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.framebuffers.remove(&framebuffer).is_some() && self.bound_framebuffer == framebuffer {
            self.bound_framebuffer = FramebufferId::NONE;
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.counters.framebuffer_binds += 1;
        if !framebuffer.is_none() && !self.framebuffers.contains_key(&framebuffer) {
            self.raise(INVALID_OPERATION);
            return;
        }
        self.bound_framebuffer = framebuffer;
    }

    fn attach_color_texture(&mut self, texture: TextureId) {
        let bound = self.bound_framebuffer;
        match self.framebuffers.get_mut(&bound) {
            Some(fb) => fb.color = texture,
            None => self.raise(INVALID_OPERATION),
        }
    }

    fn attach_depth_stencil(&mut self, renderbuffer: RenderbufferId) {
        let bound = self.bound_framebuffer;
        match self.framebuffers.get_mut(&bound) {
            Some(fb) => fb.depth_stencil = renderbuffer,
            None => self.raise(INVALID_OPERATION),
        }
    }

    fn framebuffer_complete(&mut self) -> bool {
        if self.force_incomplete {
            return false;
        }
        if self.bound_framebuffer.is_none() {
            return true;
        }
        let fb = match self.framebuffers.get(&self.bound_framebuffer) {
            Some(fb) => *fb,
            None => return false,
        };
        let color = match self.textures.get(&fb.color) {
            Some(t) if t.format.is_some() && t.width > 0 => *t,
            _ => return false,
        };
        match self.renderbuffers.get(&fb.depth_stencil) {
            Some(&(w, h)) => w == color.width && h == color.height,
            None => fb.depth_stencil.is_none(),
        }
    }

    fn create_shader(&mut self, stage: ShaderStage) -> Option<ShaderId> {
        let id = ShaderId(self.gen_name());
        self.shaders.insert(
            id,
            ShaderObject { stage, source: String::new(), compiled: false, log: String::new() },
        );
        Some(id)
    }

    fn shader_source(&mut self, shader: ShaderId, source: &str) {
        match self.shaders.get_mut(&shader) {
            Some(s) => s.source = source.to_string(),
            None => self.raise(INVALID_VALUE),
        }
    }

    fn compile_shader(&mut self, shader: ShaderId) {
        match self.shaders.get_mut(&shader) {
            Some(s) => match check_glsl(&s.source) {
                Ok(()) => {
                    s.compiled = true;
                    s.log.clear();
                }
                Err(log) => {
                    s.compiled = false;
                    s.log = log;
                }
            },
            None => self.raise(INVALID_VALUE),
        }
    }

    fn shader_compile_status(&mut self, shader: ShaderId) -> bool {
        self.shaders.get(&shader).map(|s| s.compiled).unwrap_or(false)
    }

    fn shader_info_log(&mut self, shader: ShaderId) -> String {
        self.shaders.get(&shader).map(|s| s.log.clone()).unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
    }

    fn create_program(&mut self) -> Option<ProgramId> {
        let id = ProgramId(self.gen_name());
        self.programs.insert(id, ProgramObject::default());
        Some(id)
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        if !self.shaders.contains_key(&shader) {
            self.raise(INVALID_VALUE);
            return;
        }
        match self.programs.get_mut(&program) {
            Some(p) => p.attached.push(shader),
            None => self.raise(INVALID_VALUE),
        }
    }

    fn bind_attrib_location(&mut self, program: ProgramId, index: u32, name: &str) {
        if name.starts_with("gl_") {
            self.raise(INVALID_OPERATION);
            return;
        }
        match self.programs.get_mut(&program) {
            Some(p) => p.attribs.push((index, name.to_string())),
            None => self.raise(INVALID_VALUE),
        }
    }

    fn link_program(&mut self, program: ProgramId) {
        let attached = match self.programs.get(&program) {
            Some(p) => p.attached.clone(),
            None => {
                self.raise(INVALID_VALUE);
                return;
            }
        };

        let mut has_vertex = false;
        let mut has_fragment = false;
        let mut uniforms = Vec::new();
        let mut log = String::new();
        for id in &attached {
            match self.shaders.get(id) {
                Some(s) if s.compiled => {
                    match s.stage {
                        ShaderStage::Vertex => has_vertex = true,
                        ShaderStage::Fragment => has_fragment = true,
                    }
                    for u in declared_uniforms(&s.source) {
                        if !uniforms.contains(&u) {
                            uniforms.push(u);
                        }
                    }
                }
                _ => log.push_str("error: attached shader is not compiled\n"),
            }
        }
        if !has_vertex {
            log.push_str("error: no vertex shader attached\n");
        }
        if !has_fragment {
            log.push_str("error: no fragment shader attached\n");
        }

        if let Some(p) = self.programs.get_mut(&program) {
            p.linked = log.is_empty();
            p.uniforms = if p.linked { uniforms } else { Vec::new() };
            p.log = log;
        }
    }

    fn program_link_status(&mut self, program: ProgramId) -> bool {
        self.programs.get(&program).map(|p| p.linked).unwrap_or(false)
    }

    fn program_info_log(&mut self, program: ProgramId) -> String {
        self.programs.get(&program).map(|p| p.log.clone()).unwrap_or_default()
    }

    fn delete_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_some() && self.current_program == program {
            self.current_program = ProgramId::NONE;
        }
    }

    fn use_program(&mut self, program: ProgramId) {
        self.counters.program_binds += 1;
        if !program.is_none() && !self.programs.get(&program).map(|p| p.linked).unwrap_or(false) {
            self.raise(INVALID_OPERATION);
            return;
        }
        self.current_program = program;
    }

    fn get_uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let p = self.programs.get(&program)?;
        p.uniforms.iter().position(|u| u == name).map(|i| UniformLocation(i as u32))
    }

    fn uniform_1i(&mut self, _location: UniformLocation, _value: i32) {
        self.counters.uniform_sets += 1;
    }

    fn uniform_1f(&mut self, _location: UniformLocation, _value: f32) {
        self.counters.uniform_sets += 1;
    }

    fn uniform_2f(&mut self, _location: UniformLocation, _x: f32, _y: f32) {
        self.counters.uniform_sets += 1;
    }

    fn uniform_4f(&mut self, _location: UniformLocation, value: [f32; 4]) {
        self.counters.uniform_sets += 1;
        self.counters.uniforms_4f.push((self.current_program, value));
    }

    fn uniform_matrix_4(&mut self, _location: UniformLocation, _value: &[f32; 16]) {
        self.counters.uniform_sets += 1;
    }

    fn draw_quad(&mut self, _vertices: &[QuadVertex; 4]) {
        let record = DrawRecord {
            framebuffer: self.bound_framebuffer,
            program: self.current_program,
            texture: self.current_texture(),
            viewport: self.viewport,
            blend: self.enabled.contains(&Capability::Blend),
        };
        self.counters.draws.push(record);
    }

    fn finish(&mut self) {
        self.counters.finishes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glsl_check() {
        assert!(check_glsl("void main() { gl_FragColor = vec4(1.0); }\n").is_ok());
        assert!(check_glsl("").is_err());
        assert!(check_glsl("void foo() {}").is_err());
        let err = check_glsl("void main() {\n  vec4 c = vec4(1.0;\n}\n").unwrap_err();
        assert!(err.contains("error"));
    }

    #[test]
    fn test_declared_uniforms() {
        let src = "uniform sampler2D texImage;\nuniform float time;\nuniform vec4 params[2];\nvoid main() {}\n";
        assert_eq!(declared_uniforms(src), vec!["texImage", "time", "params"]);
    }

    #[test]
    fn test_framebuffer_completeness() {
        let mut d = HeadlessDriver::new();
        let tex = d.create_texture().unwrap();
        let rb = d.create_renderbuffer().unwrap();
        let fb = d.create_framebuffer().unwrap();
        d.bind_texture(tex);
        d.tex_storage_2d(64, 32, ColorFormat::Rgba8);
        d.renderbuffer_depth_stencil(rb, 64, 32);
        d.bind_framebuffer(fb);
        d.attach_color_texture(tex);
        d.attach_depth_stencil(rb);
        assert!(d.framebuffer_complete());

        d.renderbuffer_depth_stencil(rb, 32, 32);
        assert!(!d.framebuffer_complete());
        assert_eq!(d.get_error(), NO_ERROR);
    }

    #[test]
    fn test_oversized_storage_raises() {
        let mut d = HeadlessDriver::with_caps(DriverCaps { max_texture_size: 256, ..DriverCaps::default() });
        let tex = d.create_texture().unwrap();
        d.bind_texture(tex);
        d.tex_storage_2d(512, 512, ColorFormat::Rgba8);
        assert_eq!(d.get_error(), INVALID_VALUE);
        assert_eq!(d.get_error(), NO_ERROR);
        assert_eq!(d.texture_size(tex), Some((0, 0)));
    }

    #[test]
    fn test_link_collects_uniforms() {
        let mut d = HeadlessDriver::new();
        let vs = d.create_shader(ShaderStage::Vertex).unwrap();
        let fs = d.create_shader(ShaderStage::Fragment).unwrap();
        d.shader_source(vs, "uniform float time;\nvoid main() {}\n");
        d.shader_source(fs, "uniform sampler2D texImage;\nvoid main() {}\n");
        d.compile_shader(vs);
        d.compile_shader(fs);
        let p = d.create_program().unwrap();
        d.attach_shader(p, vs);
        d.attach_shader(p, fs);
        d.link_program(p);
        assert!(d.program_link_status(p));
        assert!(d.get_uniform_location(p, "texImage").is_some());
        assert!(d.get_uniform_location(p, "missing").is_none());
    }
}
