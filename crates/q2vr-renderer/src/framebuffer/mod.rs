//! Framebuffer objects
//!
//! Offscreen render targets for post-processing and stereo rendering, the
//! distinguished display target, and a scoped binding guard.

mod fbo;
mod scope;

pub use fbo::Fbo;
pub use scope::FboScope;

use crate::driver::{FramebufferId, TextureId};

/// Non-owning view of a framebuffer: enough to bind it, sample its color
/// texture and size the viewport. The default view is the window target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FboView {
    pub framebuffer: FramebufferId,
    pub texture: TextureId,
    pub width: i32,
    pub height: i32,
}

impl FboView {
    pub fn is_window(&self) -> bool {
        self.framebuffer.is_none()
    }
}
