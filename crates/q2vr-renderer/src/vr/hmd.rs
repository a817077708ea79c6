//! HMD backends
//!
//! A backend owns whatever per-eye targets its device needs and knows how to
//! composite them into the presentation target. One is chosen at init from
//! `vr_hmdtype` and kept for the life of the renderer.

use q2vr_common::common::vid_printf;
use q2vr_common::q_shared::{PRINT_ALL, PRINT_DEVELOPER};

use super::{Eye, VrSettings, VrState};
use crate::driver::{ColorFormat, GlDriver, ProgramId, FULLSCREEN_QUAD};
use crate::framebuffer::{Fbo, FboView};
use crate::shader::{ShaderLibrary, ShaderType};
use crate::state::GlContext;
use crate::RenderError;

/// Interpupillary distance used when the device cannot report one (metres).
pub const DEFAULT_IPD: f32 = 0.064;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HmdType {
    #[default]
    None = 0,
    SideBySide = 1,
}

impl HmdType {
    pub fn from_index(value: i32) -> Self {
        match value {
            1 => HmdType::SideBySide,
            _ => HmdType::None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HmdType::None => "none",
            HmdType::SideBySide => "side-by-side",
        }
    }
}

/// Device-specific half of the stereo layer.
pub trait HmdBackend<D: GlDriver> {
    fn kind(&self) -> HmdType;

    /// Launch-time setup. Returns false when the device is unusable.
    fn init(&mut self) -> bool {
        true
    }

    /// Allocate per-eye resources for the view size in `state`.
    fn enable(&mut self, ctx: &mut GlContext<D>, state: &mut VrState) -> Result<(), RenderError>;

    fn disable(&mut self, ctx: &mut GlContext<D>);

    /// Once per frame, before any eye is bound. Recomputes field of view and
    /// per-eye targets when `resolution_changed` or the configuration moved.
    fn frame_start(
        &mut self,
        ctx: &mut GlContext<D>,
        state: &mut VrState,
        settings: &VrSettings,
        resolution_changed: bool,
    );

    /// Make `eye`'s target current with its viewport.
    fn bind_view(&mut self, ctx: &mut GlContext<D>, eye: Eye);

    fn view_pos(&self, eye: Eye) -> [u32; 2];

    fn view_size(&self, eye: Eye) -> [u32; 2];

    /// Device-reported interpupillary distance in metres.
    fn ipd(&self) -> f32 {
        DEFAULT_IPD
    }

    /// Composite both eyes into the currently bound framebuffer.
    fn present(&mut self, ctx: &mut GlContext<D>, shaders: &ShaderLibrary);
}

/// Build the backend for `kind`.
pub fn create_backend<D: GlDriver>(kind: HmdType) -> Box<dyn HmdBackend<D>> {
    match kind {
        HmdType::None => Box::new(NoHmd),
        HmdType::SideBySide => Box::new(SideBySideHmd::new()),
    }
}

/// No device attached. Enabling always fails.
#[derive(Debug, Default)]
pub struct NoHmd;

impl<D: GlDriver> HmdBackend<D> for NoHmd {
    fn kind(&self) -> HmdType {
        HmdType::None
    }

    fn enable(&mut self, _ctx: &mut GlContext<D>, _state: &mut VrState) -> Result<(), RenderError> {
        Err(RenderError::Backend("no HMD available".into()))
    }

    fn disable(&mut self, _ctx: &mut GlContext<D>) {}

    fn frame_start(&mut self, _: &mut GlContext<D>, _: &mut VrState, _: &VrSettings, _: bool) {}

    fn bind_view(&mut self, _ctx: &mut GlContext<D>, _eye: Eye) {}

    fn view_pos(&self, _eye: Eye) -> [u32; 2] {
        [0, 0]
    }

    fn view_size(&self, _eye: Eye) -> [u32; 2] {
        [0, 0]
    }

    fn present(&mut self, _ctx: &mut GlContext<D>, _shaders: &ShaderLibrary) {}
}

/// Software stereo: each eye renders into its own FBO and the two are
/// placed in the left and right halves of the output.
#[derive(Debug, Default)]
pub struct SideBySideHmd {
    eyes: [Fbo; 2],
    /// Output size the eye targets were allocated for.
    width: i32,
    height: i32,
    fov: f32,
}

impl SideBySideHmd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eye_view(&self, eye: Eye) -> Option<FboView> {
        eye.index().map(|i| self.eyes[i].view())
    }

    fn eye_size(&self) -> (i32, i32) {
        ((self.width / 2).max(1), self.height.max(1))
    }

    fn allocate<D: GlDriver>(&mut self, ctx: &mut GlContext<D>) -> Result<(), RenderError> {
        let (w, h) = self.eye_size();
        for i in 0..self.eyes.len() {
            if let Err(err) = self.eyes[i].resize(ctx, w, h, true, ColorFormat::Rgba8) {
                for fbo in self.eyes.iter_mut() {
                    fbo.destroy(ctx);
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

impl<D: GlDriver> HmdBackend<D> for SideBySideHmd {
    fn kind(&self) -> HmdType {
        HmdType::SideBySide
    }

    fn enable(&mut self, ctx: &mut GlContext<D>, state: &mut VrState) -> Result<(), RenderError> {
        self.width = state.view_width;
        self.height = state.view_height;
        self.allocate(ctx)?;
        state.pixel_scale = 1.0;
        vid_printf(PRINT_DEVELOPER, &format!("side-by-side: {}x{} per eye\n", self.eye_size().0, self.eye_size().1));
        Ok(())
    }

    fn disable(&mut self, ctx: &mut GlContext<D>) {
        for fbo in self.eyes.iter_mut() {
            fbo.destroy(ctx);
        }
    }

    fn frame_start(
        &mut self,
        ctx: &mut GlContext<D>,
        state: &mut VrState,
        settings: &VrSettings,
        resolution_changed: bool,
    ) {
        let resized = state.view_width != self.width || state.view_height != self.height;
        if resized {
            self.width = state.view_width;
            self.height = state.view_height;
            if let Err(err) = self.allocate(ctx) {
                vid_printf(PRINT_ALL, &format!("side-by-side: unable to resize eye targets: {}\n", err));
            }
        }

        if resized || resolution_changed || self.fov != settings.sbs_fov || state.view_fov_y == 0.0 {
            self.fov = settings.sbs_fov;
            let (w, h) = self.eye_size();
            state.aspect = w as f32 / h as f32;
            let half = (self.fov.to_radians() * 0.5).tan() / state.aspect;
            state.view_fov_y = (2.0 * half.atan()).to_degrees();
            // parallel projections, no lens centre shift
            state.proj_offset = 0.0;
        }
    }

    fn bind_view(&mut self, ctx: &mut GlContext<D>, eye: Eye) {
        if let Some(i) = eye.index() {
            self.eyes[i].bind(ctx);
        }
    }

    fn view_pos(&self, eye: Eye) -> [u32; 2] {
        match eye {
            Eye::Right => [self.eye_size().0 as u32, 0],
            _ => [0, 0],
        }
    }

    fn view_size(&self, eye: Eye) -> [u32; 2] {
        match eye.index() {
            Some(i) => [self.eyes[i].width.max(0) as u32, self.eyes[i].height.max(0) as u32],
            None => [0, 0],
        }
    }

    fn present(&mut self, ctx: &mut GlContext<D>, shaders: &ShaderLibrary) {
        let target = ctx.current_framebuffer();
        let half = target.width / 2;

        match shaders.get(ShaderType::Blit) {
            Some(blit) => {
                blit.bind(ctx);
                ctx.uniform_1f(blit.uniform("gamma"), 1.0);
                ctx.uniform_1f(blit.uniform("intensity"), 1.0);
            }
            None => ctx.use_program(ProgramId::NONE),
        }

        for (i, fbo) in self.eyes.iter().enumerate() {
            if !fbo.valid {
                continue;
            }
            ctx.set_viewport(i as i32 * half, 0, half, target.height);
            ctx.bind(fbo.texture);
            ctx.draw_quad(&FULLSCREEN_QUAD);
        }
        ctx.fit_viewport(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::HeadlessDriver;

    fn state(width: i32, height: i32) -> VrState {
        VrState { view_width: width, view_height: height, ..VrState::default() }
    }

    #[test]
    fn test_no_hmd_enable_fails() {
        let mut ctx = GlContext::new(HeadlessDriver::new());
        let mut hmd = NoHmd;
        let mut st = state(640, 480);
        assert!(matches!(
            HmdBackend::<HeadlessDriver>::enable(&mut hmd, &mut ctx, &mut st),
            Err(RenderError::Backend(_))
        ));
        assert_eq!(ctx.driver().live_framebuffers(), 0);
    }

    #[test]
    fn test_side_by_side_layout() {
        let mut ctx = GlContext::new(HeadlessDriver::new());
        ctx.set_default_state();
        let mut hmd = SideBySideHmd::new();
        let mut st = state(800, 600);
        HmdBackend::<HeadlessDriver>::enable(&mut hmd, &mut ctx, &mut st).unwrap();
        assert_eq!(ctx.driver().live_framebuffers(), 2);

        let settings = VrSettings::default();
        hmd.frame_start(&mut ctx, &mut st, &settings, true);
        assert!((st.aspect - 400.0 / 600.0).abs() < 1e-6);
        assert!(st.view_fov_y > settings.sbs_fov);

        assert_eq!(HmdBackend::<HeadlessDriver>::view_size(&hmd, Eye::Left), [400, 600]);
        assert_eq!(HmdBackend::<HeadlessDriver>::view_pos(&hmd, Eye::Right), [400, 0]);
        assert_eq!(HmdBackend::<HeadlessDriver>::view_pos(&hmd, Eye::Left), [0, 0]);
    }

    #[test]
    fn test_side_by_side_follows_resize() {
        let mut ctx = GlContext::new(HeadlessDriver::new());
        let mut hmd = SideBySideHmd::new();
        let mut st = state(800, 600);
        HmdBackend::<HeadlessDriver>::enable(&mut hmd, &mut ctx, &mut st).unwrap();

        st.view_width = 1024;
        st.view_height = 768;
        hmd.frame_start(&mut ctx, &mut st, &VrSettings::default(), false);
        let left = hmd.eye_view(Eye::Left).unwrap();
        assert_eq!((left.width, left.height), (512, 768));
        assert_eq!(ctx.driver().live_framebuffers(), 2);

        HmdBackend::<HeadlessDriver>::disable(&mut hmd, &mut ctx);
        assert_eq!(ctx.driver().live_framebuffers(), 0);
    }

    #[test]
    fn test_create_backend() {
        assert_eq!(create_backend::<HeadlessDriver>(HmdType::from_index(1)).kind(), HmdType::SideBySide);
        assert_eq!(create_backend::<HeadlessDriver>(HmdType::from_index(7)).kind(), HmdType::None);
    }
}
