//! Shader programs
//!
//! GLSL sources are read through the engine file loader, compiled, linked
//! and their uniforms resolved once. The library owns every program the
//! water and post-processing effects use and can rebuild them in place.

mod program;
mod manager;

pub use manager::{ShaderLibrary, ShaderType};
pub use program::{
    compile_from_files, compile_shader, link_program, load_shader, resolve_uniforms, ShaderDef, ShaderProgram,
};

/// Borrowed file loader, the shape of `q2vr_common::files::FsLoadFileFn`.
pub type FileLoader<'a> = &'a dyn Fn(&str) -> Option<Vec<u8>>;

/// Directory the GLSL sources are loaded from.
pub const SHADER_DIR: &str = "shaders";
