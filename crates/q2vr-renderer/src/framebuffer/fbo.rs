//! Framebuffer object
//!
//! A color texture plus a packed depth/stencil renderbuffer attached to one
//! framebuffer. Each feature owns its `Fbo` values; the state record only
//! ever sees them through an [`FboView`].

use q2vr_common::common::vid_printf;
use q2vr_common::q_shared::{PRINT_ALL, PRINT_DEVELOPER};

use super::{FboScope, FboView};
use crate::driver::*;
use crate::state::GlContext;
use crate::RenderError;

/// Mip levels the color texture is allowed to use.
const FBO_MAX_LEVEL: i32 = 3;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fbo {
    pub framebuffer: FramebufferId,
    pub texture: TextureId,
    pub depth_stencil: RenderbufferId,
    pub width: i32,
    pub height: i32,
    pub format: ColorFormat,
    pub bilinear: bool,
    pub valid: bool,
    /// The window back buffer. Never resized or deleted through the FBO path.
    screen: bool,
}

impl Fbo {
    /// An invalid, zeroed record.
    pub fn new() -> Self {
        Self::default()
    }

    /// The display target.
    pub fn screen(width: i32, height: i32) -> Self {
        Self { width, height, valid: true, screen: true, ..Self::default() }
    }

    pub fn is_screen(&self) -> bool {
        self.screen
    }

    pub fn view(&self) -> FboView {
        FboView {
            framebuffer: self.framebuffer,
            texture: self.texture,
            width: self.width,
            height: self.height,
        }
    }

    /// Window resize. Only the orchestrator calls this; the display target
    /// owns no GPU objects.
    pub fn set_screen_size(&mut self, width: i32, height: i32) {
        if self.screen {
            self.width = width;
            self.height = height;
        }
    }

    /// Allocate the color texture, depth/stencil renderbuffer and framebuffer.
    /// On any failure everything generated so far is deleted, the previous
    /// binding is restored and the record stays invalid.
    pub fn create<D: GlDriver>(
        &mut self,
        ctx: &mut GlContext<D>,
        width: i32,
        height: i32,
        bilinear: bool,
        format: ColorFormat,
    ) -> Result<(), RenderError> {
        if self.screen {
            vid_printf(PRINT_ALL, "create_fbo: refusing to recreate the display target\n");
            return Err(RenderError::InvalidUsage("create on display target".into()));
        }
        if width <= 0 || height <= 0 {
            vid_printf(PRINT_ALL, &format!("create_fbo: invalid size {}x{}\n", width, height));
            return Err(RenderError::InvalidUsage(format!("fbo size {}x{}", width, height)));
        }
        if self.valid {
            self.destroy(ctx);
        }

        let mut gl = FboScope::new(ctx);
        gl.drain_errors();

        let mut texture = TextureId::NONE;
        let mut depth_stencil = RenderbufferId::NONE;
        let mut framebuffer = FramebufferId::NONE;

        let result = (|| -> Result<(), RenderError> {
            texture = gl.create_texture().ok_or_else(|| RenderError::Other("glGenTextures failed".into()))?;
            gl.mbind(0, texture)?;
            gl.tex_storage_2d(width, height, format);
            gl.tex_max_level(FBO_MAX_LEVEL);
            gl.tex_filter(bilinear);
            gl.tex_clamp_to_edge();
            gl.check_error("create_fbo: texture creation")?;

            depth_stencil = gl
                .create_renderbuffer()
                .ok_or_else(|| RenderError::Other("glGenRenderbuffers failed".into()))?;
            gl.renderbuffer_depth_stencil(depth_stencil, width, height);
            gl.check_error("create_fbo: depth buffer creation")?;

            framebuffer = gl
                .create_framebuffer()
                .ok_or_else(|| RenderError::Backend("framebuffer objects unsupported".into()))?;
            gl.bind_framebuffer(FboView { framebuffer, texture, width, height });
            gl.attach_color_texture(texture);
            gl.attach_depth_stencil(depth_stencil);
            gl.check_error("create_fbo: framebuffer creation")?;

            if !gl.framebuffer_complete() {
                vid_printf(PRINT_ALL, &format!("create_fbo: incomplete framebuffer object ({}x{})\n", width, height));
                return Err(RenderError::FramebufferIncomplete { width, height });
            }
            Ok(())
        })();

        if let Err(err) = result {
            gl.delete_framebuffer(framebuffer);
            gl.delete_renderbuffer(depth_stencil);
            gl.delete_texture(texture);
            // scope drop restores the previous framebuffer
            return Err(err);
        }
        drop(gl);

        *self = Fbo {
            framebuffer,
            texture,
            depth_stencil,
            width,
            height,
            format,
            bilinear,
            valid: true,
            screen: false,
        };
        vid_printf(PRINT_DEVELOPER, &format!("create_fbo: {}x{} fb {}\n", width, height, framebuffer.0));
        Ok(())
    }

    /// Reallocate storage in place with the given filter and color format.
    /// An invalid record is created instead; the display target is rejected.
    pub fn resize<D: GlDriver>(
        &mut self,
        ctx: &mut GlContext<D>,
        width: i32,
        height: i32,
        bilinear: bool,
        format: ColorFormat,
    ) -> Result<(), RenderError> {
        if self.screen {
            vid_printf(PRINT_ALL, "resize_fbo: the display target cannot be resized\n");
            return Err(RenderError::InvalidUsage("resize of display target".into()));
        }
        if !self.valid {
            return self.create(ctx, width, height, bilinear, format);
        }
        if width <= 0 || height <= 0 {
            vid_printf(PRINT_ALL, &format!("resize_fbo: invalid size {}x{}\n", width, height));
            return Err(RenderError::InvalidUsage(format!("fbo size {}x{}", width, height)));
        }
        if width == self.width && height == self.height && format == self.format {
            if bilinear != self.bilinear {
                self.set_filter(ctx, bilinear);
            }
            return Ok(());
        }

        ctx.drain_errors();
        let result = (|| -> Result<(), RenderError> {
            ctx.mbind(0, self.texture)?;
            ctx.tex_storage_2d(width, height, format);
            ctx.tex_max_level(FBO_MAX_LEVEL);
            ctx.tex_filter(bilinear);
            ctx.tex_clamp_to_edge();
            ctx.check_error("resize_fbo: texture")?;
            ctx.renderbuffer_depth_stencil(self.depth_stencil, width, height);
            ctx.check_error("resize_fbo: depth buffer")
        })();

        if let Err(err) = result {
            self.destroy(ctx);
            return Err(err);
        }

        self.width = width;
        self.height = height;
        self.format = format;
        self.bilinear = bilinear;
        Ok(())
    }

    /// Switch the color texture between bilinear and nearest filtering.
    pub fn set_filter<D: GlDriver>(&mut self, ctx: &mut GlContext<D>, bilinear: bool) {
        if self.framebuffer.is_none() {
            return;
        }
        // unit 0 always exists
        if ctx.mbind(0, self.texture).is_ok() {
            ctx.tex_filter(bilinear);
            self.bilinear = bilinear;
        }
    }

    /// Delete the GPU objects and reset to a zeroed record. Idempotent.
    pub fn destroy<D: GlDriver>(&mut self, ctx: &mut GlContext<D>) {
        if self.screen {
            vid_printf(PRINT_DEVELOPER, "destroy_fbo: ignoring the display target\n");
            return;
        }
        if self.valid {
            ctx.delete_framebuffer(self.framebuffer);
            ctx.delete_renderbuffer(self.depth_stencil);
            ctx.delete_texture(self.texture);
        }
        *self = Fbo::default();
    }

    /// Make this the render target and size the viewport to it.
    pub fn bind<D: GlDriver>(&self, ctx: &mut GlContext<D>) {
        if !self.valid {
            return;
        }
        let view = self.view();
        ctx.bind_framebuffer(view);
        ctx.fit_viewport(view);
    }

    /// Clear color, depth and stencil, leaving the caller's binding intact.
    pub fn clear<D: GlDriver>(&self, ctx: &mut GlContext<D>) {
        if !self.valid {
            return;
        }
        let mut gl = FboScope::new(ctx);
        gl.bind_framebuffer(self.view());
        gl.clear(ClearBuffers::ALL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> GlContext<HeadlessDriver> {
        let mut ctx = GlContext::new(HeadlessDriver::new());
        ctx.set_default_state();
        ctx
    }

    #[test]
    fn test_create_destroy_equals_fresh() {
        let mut ctx = context();
        let mut fbo = Fbo::new();
        fbo.create(&mut ctx, 128, 64, true, ColorFormat::Rgba8).unwrap();
        assert!(fbo.valid);
        assert_eq!(ctx.driver().live_framebuffers(), 1);
        assert_eq!(ctx.driver().texture_max_level(fbo.texture), Some(3));
        assert_eq!(ctx.driver().texture_clamped(fbo.texture), Some(true));

        fbo.destroy(&mut ctx);
        assert_eq!(fbo, Fbo::new());
        assert_eq!(ctx.driver().live_framebuffers(), 0);
        assert_eq!(ctx.driver().live_textures(), 0);
        assert_eq!(ctx.driver().live_renderbuffers(), 0);

        // idempotent
        fbo.destroy(&mut ctx);
        assert_eq!(fbo, Fbo::new());
    }

    #[test]
    fn test_create_restores_previous_binding() {
        let mut ctx = context();
        let mut outer = Fbo::new();
        outer.create(&mut ctx, 32, 32, false, ColorFormat::Rgba8).unwrap();
        outer.bind(&mut ctx);

        let mut inner = Fbo::new();
        inner.create(&mut ctx, 16, 16, false, ColorFormat::Rgba8).unwrap();
        assert_eq!(ctx.current_framebuffer(), outer.view());
        assert_eq!(ctx.driver().bound_framebuffer(), outer.framebuffer);
    }

    #[test]
    fn test_resize_invalid_equals_create() {
        let mut ctx = context();
        let mut created = Fbo::new();
        created.create(&mut ctx, 200, 100, true, ColorFormat::Rgba16F).unwrap();

        let mut resized = Fbo::new();
        resized.resize(&mut ctx, 200, 100, true, ColorFormat::Rgba16F).unwrap();

        assert!(resized.valid);
        assert_eq!((resized.width, resized.height), (created.width, created.height));
        assert_eq!(resized.format, ColorFormat::Rgba16F);
        assert!(resized.bilinear);
        assert_eq!(resized.format, created.format);
        assert_eq!(resized.bilinear, created.bilinear);
        assert_eq!(ctx.driver().texture_bilinear(resized.texture), Some(true));
        assert_eq!(ctx.driver().texture_size(resized.texture), Some((200, 100)));
        assert_eq!(ctx.driver().renderbuffer_size(resized.depth_stencil), Some((200, 100)));
    }

    #[test]
    fn test_resize_applies_filter_and_format() {
        let mut ctx = context();
        let mut fbo = Fbo::new();
        fbo.create(&mut ctx, 64, 64, false, ColorFormat::Rgba8).unwrap();
        let handle = fbo.framebuffer;

        // same size, new filter only
        fbo.resize(&mut ctx, 64, 64, true, ColorFormat::Rgba8).unwrap();
        assert!(fbo.bilinear);
        assert_eq!(ctx.driver().texture_bilinear(fbo.texture), Some(true));

        // same size, new format reallocates in place
        fbo.resize(&mut ctx, 64, 64, false, ColorFormat::Rgba16F).unwrap();
        assert_eq!(fbo.format, ColorFormat::Rgba16F);
        assert!(!fbo.bilinear);
        assert_eq!(ctx.driver().texture_bilinear(fbo.texture), Some(false));

        fbo.resize(&mut ctx, 128, 32, true, ColorFormat::Srgb8Alpha8).unwrap();
        assert_eq!((fbo.width, fbo.height, fbo.format, fbo.bilinear), (128, 32, ColorFormat::Srgb8Alpha8, true));
        assert_eq!(fbo.framebuffer, handle);
        assert_eq!(ctx.driver().texture_size(fbo.texture), Some((128, 32)));
    }

    #[test]
    fn test_resize_screen_rejected() {
        let mut ctx = context();
        let mut screen = Fbo::screen(800, 600);
        let before = screen.clone();
        let result = screen.resize(&mut ctx, 1024, 768, false, ColorFormat::Rgba8);
        assert!(matches!(result, Err(RenderError::InvalidUsage(_))));
        assert_eq!(screen, before);
        screen.destroy(&mut ctx);
        assert_eq!(screen, before);
    }

    #[test]
    fn test_create_bind_clear_resize_scenario() {
        let mut ctx = context();
        let mut fbo = Fbo::new();
        fbo.create(&mut ctx, 256, 256, true, ColorFormat::Rgba8).unwrap();
        let handle = fbo.framebuffer;

        fbo.bind(&mut ctx);
        assert_eq!(ctx.viewport(), Some([0, 0, 256, 256]));
        assert_eq!(ctx.vid.width, 256);

        fbo.clear(&mut ctx);
        assert_eq!(ctx.driver().counters.clears_on(handle), 1);
        assert_eq!(ctx.driver().counters.clears[0].buffers, ClearBuffers::ALL);

        fbo.resize(&mut ctx, 512, 512, true, ColorFormat::Rgba8).unwrap();
        assert_eq!((fbo.width, fbo.height), (512, 512));
        assert_eq!(fbo.framebuffer, handle);
        assert_eq!(ctx.driver().texture_size(fbo.texture), Some((512, 512)));
        assert_eq!(ctx.driver().renderbuffer_size(fbo.depth_stencil), Some((512, 512)));
        assert_eq!(ctx.driver().framebuffer_attachments(handle), Some((fbo.texture, fbo.depth_stencil)));
    }

    #[test]
    fn test_clear_restores_binding() {
        let mut ctx = context();
        let mut fbo = Fbo::new();
        fbo.create(&mut ctx, 64, 64, false, ColorFormat::Rgba8).unwrap();
        fbo.clear(&mut ctx);
        assert_eq!(ctx.driver().bound_framebuffer(), FramebufferId::NONE);
        assert!(ctx.current_framebuffer().is_window());
    }

    #[test]
    fn test_incomplete_framebuffer_unwinds() {
        let mut ctx = context();
        ctx.driver_mut().force_incomplete = true;
        ctx.set_default_state();

        let mut fbo = Fbo::new();
        let err = fbo.create(&mut ctx, 64, 64, false, ColorFormat::Rgba8).unwrap_err();
        assert_eq!(err, RenderError::FramebufferIncomplete { width: 64, height: 64 });
        assert_eq!(fbo, Fbo::new());
        assert_eq!(ctx.driver().live_framebuffers(), 0);
        assert_eq!(ctx.driver().live_textures(), 0);
        assert_eq!(ctx.driver().live_renderbuffers(), 0);
        assert_eq!(ctx.driver().bound_framebuffer(), FramebufferId::NONE);
    }

    #[test]
    fn test_failed_create_keeps_bound_fbo() {
        let mut ctx = context();
        let mut bound = Fbo::new();
        bound.create(&mut ctx, 32, 16, false, ColorFormat::Rgba8).unwrap();
        bound.bind(&mut ctx);

        ctx.driver_mut().force_incomplete = true;
        let mut failed = Fbo::new();
        assert!(failed.create(&mut ctx, 64, 64, false, ColorFormat::Rgba8).is_err());
        assert!(!failed.valid);
        assert_eq!(ctx.current_framebuffer(), bound.view());
        assert_eq!(ctx.driver().bound_framebuffer(), bound.framebuffer);
        assert_eq!(ctx.viewport(), Some([0, 0, 32, 16]));
        assert_eq!(ctx.driver().live_framebuffers(), 1);
    }

    #[test]
    fn test_oversized_create_reports_driver_error() {
        let caps = DriverCaps { max_texture_size: 256, ..DriverCaps::default() };
        let mut ctx = GlContext::new(HeadlessDriver::with_caps(caps));
        let mut fbo = Fbo::new();
        match fbo.create(&mut ctx, 1024, 1024, false, ColorFormat::Rgba8) {
            Err(RenderError::Driver { code, context }) => {
                assert_eq!(code, INVALID_VALUE);
                assert!(context.contains("texture creation"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!fbo.valid);
        assert_eq!(ctx.driver().live_textures(), 0);
    }

    #[test]
    fn test_set_filter() {
        let mut ctx = context();
        let mut fbo = Fbo::new();
        fbo.set_filter(&mut ctx, true);
        assert!(!fbo.bilinear);

        fbo.create(&mut ctx, 8, 8, false, ColorFormat::Rgba8).unwrap();
        fbo.set_filter(&mut ctx, true);
        assert!(fbo.bilinear);
        assert_eq!(ctx.driver().texture_bilinear(fbo.texture), Some(true));
    }

    #[test]
    fn test_operations_on_invalid_are_noops() {
        let mut ctx = context();
        let fbo = Fbo::new();
        let binds = ctx.driver().counters.framebuffer_binds;
        fbo.bind(&mut ctx);
        fbo.clear(&mut ctx);
        assert_eq!(ctx.driver().counters.framebuffer_binds, binds);
        assert!(ctx.driver().counters.clears.is_empty());
    }
}
