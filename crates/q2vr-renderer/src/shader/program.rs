//! Compile / link pipeline
//!
//! Stage objects never outlive a link attempt: they are deleted whether the
//! link succeeds or not. A failed stage is logged with the compiler output
//! and never linked.

use std::collections::HashMap;

use q2vr_common::common::vid_printf;
use q2vr_common::q_shared::{PRINT_ALL, PRINT_DEVELOPER};

use super::{FileLoader, SHADER_DIR};
use crate::driver::{GlDriver, ProgramId, ShaderId, ShaderStage, UniformLocation};
use crate::state::GlContext;
use crate::RenderError;

/// Static description of a program: source files, attribute bindings applied
/// before linking, and the uniforms resolved after.
#[derive(Debug, Clone, Copy)]
pub struct ShaderDef {
    pub name: &'static str,
    pub vertex: &'static str,
    pub fragment: &'static str,
    pub attribs: &'static [(u32, &'static str)],
    pub uniforms: &'static [&'static str],
}

/// A linked program with its uniform table.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    pub program: ProgramId,
    pub vertex_path: String,
    pub fragment_path: String,
    pub attribs: Vec<(u32, String)>,
    uniforms: HashMap<String, Option<UniformLocation>>,
}

impl ShaderProgram {
    pub fn bind<D: GlDriver>(&self, ctx: &mut GlContext<D>) {
        ctx.use_program(self.program);
    }

    /// Location of a uniform resolved at link time. `None` if the program
    /// does not use it (or it was never asked for).
    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied().flatten()
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniform(name).is_some()
    }

    pub fn destroy<D: GlDriver>(&mut self, ctx: &mut GlContext<D>) {
        ctx.delete_program(self.program);
        self.program = ProgramId::NONE;
        self.uniforms.clear();
    }
}

/// Compile one stage. On failure the compiler diagnostic is logged, the
/// stage object deleted and the diagnostic returned.
pub fn compile_shader<D: GlDriver>(
    ctx: &mut GlContext<D>,
    stage: ShaderStage,
    source: &str,
) -> Result<ShaderId, RenderError> {
    let shader = ctx
        .create_shader(stage)
        .ok_or_else(|| RenderError::ShaderCompilation(format!("unable to create {} shader", stage.name())))?;

    ctx.shader_source(shader, source);
    ctx.compile_shader(shader);

    if !ctx.shader_compile_status(shader) {
        let mut log = ctx.shader_info_log(shader);
        if log.trim().is_empty() {
            log = format!("{} shader failed to compile", stage.name());
        }
        vid_printf(PRINT_ALL, &format!("compile_shader: {} shader failed to compile:\n{}\n", stage.name(), log.trim_end()));
        ctx.delete_shader(shader);
        return Err(RenderError::ShaderCompilation(log));
    }

    Ok(shader)
}

/// Read a GLSL file from the shader directory, adding the trailing newline
/// some compilers insist on.
pub fn load_shader(loader: FileLoader<'_>, file: &str) -> Result<String, RenderError> {
    let path = format!("{}/{}", SHADER_DIR, file);
    let bytes = match loader(&path) {
        Some(bytes) => bytes,
        None => {
            vid_printf(PRINT_ALL, &format!("load_shader: unable to load {}\n", path));
            return Err(RenderError::NotFound(path));
        }
    };
    let mut source = String::from_utf8_lossy(&bytes).into_owned();
    source.push('\n');
    Ok(source)
}

/// Link two compiled stages. Attribute binding errors are logged but do not
/// fail the link. Both stage objects are deleted before returning.
pub fn link_program<D: GlDriver>(
    ctx: &mut GlContext<D>,
    vertex: ShaderId,
    fragment: ShaderId,
    attribs: &[(u32, &str)],
) -> Result<ProgramId, RenderError> {
    let program = match ctx.create_program() {
        Some(program) => program,
        None => {
            ctx.delete_shader(vertex);
            ctx.delete_shader(fragment);
            return Err(RenderError::ShaderLinking("unable to create program".into()));
        }
    };

    ctx.attach_shader(program, vertex);
    ctx.attach_shader(program, fragment);

    ctx.drain_errors();
    for &(index, name) in attribs {
        ctx.bind_attrib_location(program, index, name);
        let _ = ctx.check_error(&format!("link_program: binding attribute {} to {}", name, index));
    }

    ctx.link_program(program);

    ctx.delete_shader(vertex);
    ctx.delete_shader(fragment);

    if !ctx.program_link_status(program) {
        let mut log = ctx.program_info_log(program);
        if log.trim().is_empty() {
            log = "program failed to link".to_string();
        }
        vid_printf(PRINT_ALL, &format!("link_program: link failed:\n{}\n", log.trim_end()));
        ctx.delete_program(program);
        return Err(RenderError::ShaderLinking(log));
    }

    Ok(program)
}

/// Look up each name. A missing uniform is legal and comes back as `None`.
pub fn resolve_uniforms<D: GlDriver>(
    ctx: &mut GlContext<D>,
    program: ProgramId,
    names: &[&str],
) -> Vec<Option<UniformLocation>> {
    names
        .iter()
        .map(|name| {
            let loc = ctx.get_uniform_location(program, name);
            if loc.is_none() {
                vid_printf(PRINT_DEVELOPER, &format!("resolve_uniforms: {} not found\n", name));
            }
            loc
        })
        .collect()
}

/// Load, compile and link a program from its definition.
pub fn compile_from_files<D: GlDriver>(
    ctx: &mut GlContext<D>,
    loader: FileLoader<'_>,
    def: &ShaderDef,
) -> Result<ShaderProgram, RenderError> {
    let vertex_source = load_shader(loader, def.vertex)?;
    let fragment_source = load_shader(loader, def.fragment)?;

    let vertex = compile_shader(ctx, ShaderStage::Vertex, &vertex_source)?;
    let fragment = match compile_shader(ctx, ShaderStage::Fragment, &fragment_source) {
        Ok(fragment) => fragment,
        Err(err) => {
            ctx.delete_shader(vertex);
            return Err(err);
        }
    };

    let program = link_program(ctx, vertex, fragment, def.attribs)?;
    let locations = resolve_uniforms(ctx, program, def.uniforms);

    Ok(ShaderProgram {
        program,
        vertex_path: format!("{}/{}", SHADER_DIR, def.vertex),
        fragment_path: format!("{}/{}", SHADER_DIR, def.fragment),
        attribs: def.attribs.iter().map(|&(i, n)| (i, n.to_string())).collect(),
        uniforms: def.uniforms.iter().map(|n| n.to_string()).zip(locations).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::HeadlessDriver;

    const VERT: &str = "in vec3 inPosition;\nuniform float time;\nvoid main() { gl_Position = vec4(inPosition, time); }";
    const FRAG: &str = "uniform sampler2D texImage;\nout vec4 color;\nvoid main() { color = vec4(1.0); }";
    const BROKEN_FRAG: &str = "void main() {\n  color = vec4(1.0;\n}";

    fn context() -> GlContext<HeadlessDriver> {
        GlContext::new(HeadlessDriver::new())
    }

    fn loader(files: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<Vec<u8>> {
        move |path: &str| {
            files.iter().find(|(name, _)| *name == path).map(|(_, src)| src.as_bytes().to_vec())
        }
    }

    const DEF: ShaderDef = ShaderDef {
        name: "test",
        vertex: "test.vert",
        fragment: "test.frag",
        attribs: &[(0, "inPosition")],
        uniforms: &["texImage", "time", "unused"],
    };

    #[test]
    fn test_compile_and_link() {
        let mut ctx = context();
        let files = loader(&[("shaders/test.vert", VERT), ("shaders/test.frag", FRAG)]);
        let prog = compile_from_files(&mut ctx, &files, &DEF).unwrap();

        assert!(!prog.program.is_none());
        assert!(prog.has_uniform("texImage"));
        assert!(prog.has_uniform("time"));
        assert!(!prog.has_uniform("unused"));
        assert_eq!(prog.vertex_path, "shaders/test.vert");
        assert_eq!(ctx.driver().live_programs(), 1);
        // stage objects are gone once linked
        assert_eq!(ctx.driver().live_shaders(), 0);
        assert_eq!(ctx.driver().program_attribs(prog.program), vec![(0, "inPosition".to_string())]);
    }

    #[test]
    fn test_invalid_fragment_fails_cleanly() {
        let mut ctx = context();
        let files = loader(&[("shaders/test.vert", VERT), ("shaders/test.frag", BROKEN_FRAG)]);
        match compile_from_files(&mut ctx, &files, &DEF) {
            Err(RenderError::ShaderCompilation(log)) => assert!(!log.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ctx.driver().live_programs(), 0);
        assert_eq!(ctx.driver().live_shaders(), 0);
    }

    #[test]
    fn test_missing_file() {
        let mut ctx = context();
        let files = loader(&[("shaders/test.vert", VERT)]);
        assert_eq!(
            compile_from_files(&mut ctx, &files, &DEF).unwrap_err(),
            RenderError::NotFound("shaders/test.frag".into())
        );
        assert_eq!(ctx.driver().live_shaders(), 0);
    }

    #[test]
    fn test_load_shader_appends_newline() {
        let files = loader(&[("shaders/a.frag", "void main() {}")]);
        assert_eq!(load_shader(&files, "a.frag").unwrap(), "void main() {}\n");
    }

    #[test]
    fn test_bad_attribute_binding_does_not_fail_link() {
        let mut ctx = context();
        let vs = compile_shader(&mut ctx, ShaderStage::Vertex, VERT).unwrap();
        let fs = compile_shader(&mut ctx, ShaderStage::Fragment, FRAG).unwrap();
        let program = link_program(&mut ctx, vs, fs, &[(0, "gl_Vertex"), (1, "inTexCoord")]).unwrap();
        assert_eq!(ctx.driver().program_attribs(program), vec![(1, "inTexCoord".to_string())]);
        assert_eq!(ctx.driver().live_shaders(), 0);
    }

    #[test]
    fn test_link_failure_deletes_everything() {
        let mut ctx = context();
        let vs = compile_shader(&mut ctx, ShaderStage::Vertex, VERT).unwrap();
        let vs2 = compile_shader(&mut ctx, ShaderStage::Vertex, VERT).unwrap();
        // two vertex stages, no fragment stage
        assert!(matches!(link_program(&mut ctx, vs, vs2, &[]), Err(RenderError::ShaderLinking(_))));
        assert_eq!(ctx.driver().live_programs(), 0);
        assert_eq!(ctx.driver().live_shaders(), 0);
    }

    #[test]
    fn test_resolve_uniforms_not_found_is_legal() {
        let mut ctx = context();
        let vs = compile_shader(&mut ctx, ShaderStage::Vertex, VERT).unwrap();
        let fs = compile_shader(&mut ctx, ShaderStage::Fragment, FRAG).unwrap();
        let program = link_program(&mut ctx, vs, fs, &[]).unwrap();
        let locs = resolve_uniforms(&mut ctx, program, &["time", "nope"]);
        assert!(locs[0].is_some());
        assert!(locs[1].is_none());
    }
}
