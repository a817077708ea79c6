//! Antialiasing modes
//!
//! Supersampling renders the scene into an FBO twice the output size in each
//! direction and lets the bilinear blit downsample it; FXAA is a shader pass
//! over the resolved image. The two can be combined.

use crate::driver::{ColorFormat, GlDriver};
use crate::framebuffer::Fbo;
use crate::state::GlContext;
use crate::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AntialiasMode {
    #[default]
    None = 0,
    /// 4x supersampling (2x per axis).
    Ssaa4x = 1,
    Fxaa = 2,
    /// FXAA over a supersampled scene.
    FxaaFss = 3,
}

impl AntialiasMode {
    pub const MAX: i32 = AntialiasMode::FxaaFss as i32;

    /// Map a cvar value onto a mode, clamping out-of-range values.
    pub fn from_index(value: i32) -> Self {
        match value.clamp(0, Self::MAX) {
            1 => AntialiasMode::Ssaa4x,
            2 => AntialiasMode::Fxaa,
            3 => AntialiasMode::FxaaFss,
            _ => AntialiasMode::None,
        }
    }

    pub fn index(self) -> i32 {
        self as i32
    }

    pub fn supersampled(self) -> bool {
        matches!(self, AntialiasMode::Ssaa4x | AntialiasMode::FxaaFss)
    }

    pub fn uses_fxaa(self) -> bool {
        matches!(self, AntialiasMode::Fxaa | AntialiasMode::FxaaFss)
    }

    /// Per-axis scale of the scene FBO relative to the output.
    pub fn scale(self) -> f32 {
        if self.supersampled() {
            2.0
        } else {
            1.0
        }
    }

    /// Scene FBO size for an output of `width` x `height`. Each axis is
    /// scaled on its own.
    pub fn scaled_size(self, width: i32, height: i32) -> (i32, i32) {
        let scale = self.scale();
        ((width as f32 * scale) as i32, (height as f32 * scale) as i32)
    }
}

/// Size (or create) the scene FBO for `mode` and an output of `width` x `height`.
pub fn set_fbo_size<D: GlDriver>(
    ctx: &mut GlContext<D>,
    fbo: &mut Fbo,
    mode: AntialiasMode,
    width: i32,
    height: i32,
) -> Result<(), RenderError> {
    let (w, h) = mode.scaled_size(width, height);
    // the downsample relies on bilinear filtering
    fbo.resize(ctx, w, h, true, ColorFormat::Rgba8)
}
