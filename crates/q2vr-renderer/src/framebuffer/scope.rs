//! Scoped framebuffer binding
//!
//! Captures the bound framebuffer, viewport and logical size on entry and
//! puts them back when dropped, so a helper that rebinds cannot leak its
//! binding to the caller.

use std::ops::{Deref, DerefMut};

use q2vr_common::q_shared::VidDef;

use super::FboView;
use crate::driver::GlDriver;
use crate::state::GlContext;

pub struct FboScope<'a, D: GlDriver> {
    ctx: &'a mut GlContext<D>,
    framebuffer: FboView,
    viewport: Option<[i32; 4]>,
    saved_vid: VidDef,
}

impl<'a, D: GlDriver> FboScope<'a, D> {
    pub fn new(ctx: &'a mut GlContext<D>) -> Self {
        let framebuffer = ctx.current_framebuffer();
        let viewport = ctx.viewport();
        let saved_vid = ctx.vid;
        Self { ctx, framebuffer, viewport, saved_vid }
    }

    /// The binding that will be restored.
    pub fn saved(&self) -> FboView {
        self.framebuffer
    }
}

impl<D: GlDriver> Deref for FboScope<'_, D> {
    type Target = GlContext<D>;

    fn deref(&self) -> &GlContext<D> {
        self.ctx
    }
}

impl<D: GlDriver> DerefMut for FboScope<'_, D> {
    fn deref_mut(&mut self) -> &mut GlContext<D> {
        self.ctx
    }
}

impl<D: GlDriver> Drop for FboScope<'_, D> {
    fn drop(&mut self) {
        self.ctx.bind_framebuffer(self.framebuffer);
        if let Some([x, y, w, h]) = self.viewport {
            self.ctx.set_viewport(x, y, w, h);
        }
        self.ctx.vid = self.saved_vid;
    }
}
