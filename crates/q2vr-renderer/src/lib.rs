//! Quake II VR renderer core
//!
//! GPU state caching, framebuffer objects, the shader pipeline used by the
//! water and post-processing effects, the stereo presentation layer and the
//! per-frame orchestrator that sequences all of them.
//!
//! Everything is generic over a [`driver::GlDriver`], so the same code runs
//! on a real OpenGL context (`GlowDriver`) or headless (`HeadlessDriver`).

#![allow(clippy::new_without_default, clippy::too_many_arguments)]

pub mod math;
pub mod driver;
pub mod state;
pub mod framebuffer;
pub mod shader;
pub mod postprocess;
pub mod vr;
pub mod frame;

pub use driver::{GlDriver, GlowDriver, HeadlessDriver};
pub use frame::{Renderer, ScenePasses, ViewParams};
pub use state::GlContext;

/// Errors that can occur during rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Shader compilation failed.
    ShaderCompilation(String),
    /// Shader linking failed.
    ShaderLinking(String),
    /// Framebuffer completeness check failed.
    FramebufferIncomplete { width: i32, height: i32 },
    /// Operation not allowed on this object or in this state.
    InvalidUsage(String),
    /// Texture unit beyond the supported count.
    UnsupportedTextureUnit(u32),
    /// Resource not found.
    NotFound(String),
    /// Required backend or extension unavailable.
    Backend(String),
    /// Driver reported an error code.
    Driver { code: u32, context: String },
    /// Generic error.
    Other(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::ShaderCompilation(msg) => write!(f, "Shader compilation error: {}", msg),
            RenderError::ShaderLinking(msg) => write!(f, "Shader linking error: {}", msg),
            RenderError::FramebufferIncomplete { width, height } => {
                write!(f, "Framebuffer incomplete ({}x{})", width, height)
            }
            RenderError::InvalidUsage(msg) => write!(f, "Invalid usage: {}", msg),
            RenderError::UnsupportedTextureUnit(unit) => {
                write!(f, "Attempted selection of unsupported texture unit GL_TEXTURE{}", unit)
            }
            RenderError::NotFound(name) => write!(f, "Resource not found: {}", name),
            RenderError::Backend(msg) => write!(f, "Backend unavailable: {}", msg),
            RenderError::Driver { code, context } => {
                write!(f, "{}: glGetError() = 0x{:x}", context, code)
            }
            RenderError::Other(msg) => write!(f, "Render error: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RenderError::Driver { code: 0x505, context: "create_fbo: texture creation".into() };
        assert_eq!(err.to_string(), "create_fbo: texture creation: glGetError() = 0x505");
        let err = RenderError::UnsupportedTextureUnit(5);
        assert!(err.to_string().contains("GL_TEXTURE5"));
    }
}
