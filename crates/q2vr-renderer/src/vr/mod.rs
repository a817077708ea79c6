//! Stereo presentation layer
//!
//! Frame construction targets exactly one of three views at a time: the
//! left eye, the right eye or the HUD. The HUD is a flat FBO drawn into both
//! eyes as a quad at a fixed depth just before the backend composites the
//! eyes for display.

mod hmd;

pub use hmd::{create_backend, HmdBackend, HmdType, NoHmd, SideBySideHmd, DEFAULT_IPD};

use q2vr_common::common::{com_printf, vid_printf};
use q2vr_common::q_shared::{PLAYER_HEIGHT_M, PLAYER_HEIGHT_UNITS, PRINT_ALL};

use crate::driver::{
    BlendFactor, Capability, ClearBuffers, ColorFormat, CompareFunc, GlDriver, ProgramId, QuadVertex, TextureId,
    FULLSCREEN_QUAD,
};
use crate::framebuffer::{Fbo, FboView};
use crate::math;
use crate::shader::{ShaderLibrary, ShaderType};
use crate::state::{GlContext, MatrixMode};
use crate::RenderError;

pub const HUD_WIDTH: i32 = 640;
pub const HUD_HEIGHT: i32 = 480;

const HUD_NEAR: f32 = 0.24;
const HUD_FAR: f32 = 251.0;

const STALE_CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];
const DEFAULT_CLEAR_COLOR: [f32; 4] = [1.0, 0.0, 0.5, 0.5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Eye {
    Left,
    #[default]
    Hud,
    Right,
}

impl Eye {
    pub const ALL: [Eye; 3] = [Eye::Left, Eye::Hud, Eye::Right];

    /// Horizontal sign used for projection and IPD offsets.
    pub fn sign(self) -> f32 {
        match self {
            Eye::Left => -1.0,
            Eye::Hud => 0.0,
            Eye::Right => 1.0,
        }
    }

    /// Index into per-eye arrays; the HUD has none.
    pub fn index(self) -> Option<usize> {
        match self {
            Eye::Left => Some(0),
            Eye::Right => Some(1),
            Eye::Hud => None,
        }
    }

    fn stale_slot(self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
            Eye::Hud => 2,
        }
    }
}

/// VR supersampling of the composited output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VrAntialias {
    #[default]
    None = 0,
    Ssaa4x = 1,
}

impl VrAntialias {
    pub fn from_index(value: i32) -> Self {
        if value >= 1 {
            VrAntialias::Ssaa4x
        } else {
            VrAntialias::None
        }
    }

    pub fn index(self) -> i32 {
        self as i32
    }
}

/// Values synced from the `vr_*` cvars each frame.
#[derive(Debug, Clone, PartialEq)]
pub struct VrSettings {
    pub antialias: VrAntialias,
    /// Manual IPD in millimetres.
    pub ipd: f32,
    /// Use the device-reported IPD instead of `ipd`.
    pub autoipd: bool,
    pub hud_fov: f32,
    pub hud_depth: f32,
    pub hud_transparency: bool,
    /// Horizontal field of view per eye for the side-by-side backend.
    pub sbs_fov: f32,
}

impl Default for VrSettings {
    fn default() -> Self {
        Self {
            antialias: VrAntialias::None,
            ipd: 64.0,
            autoipd: true,
            hud_fov: 65.0,
            hud_depth: 0.75,
            hud_transparency: false,
            sbs_fov: 90.0,
        }
    }
}

/// Shared view geometry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VrState {
    pub eye: Eye,
    pub view_width: i32,
    pub view_height: i32,
    pub scaled_view_width: i32,
    pub scaled_view_height: i32,
    pub view_fov_y: f32,
    pub aspect: f32,
    /// Clip-space lens-centre shift, multiplied by the eye sign.
    pub proj_offset: f32,
    /// Half the IPD in world units.
    pub view_offset: f32,
    pub hud_width: i32,
    pub hud_height: i32,
    pub pixel_scale: f32,
    /// Set after present; the backend refreshes its pose next frame.
    pub stale: bool,
}

pub struct VrRenderer<D: GlDriver> {
    hmd: Box<dyn HmdBackend<D>>,
    hud: Fbo,
    offscreen: Fbo,
    state: VrState,
    /// Left, right, HUD.
    stale: [bool; 3],
    supported: bool,
    enabled: bool,
    /// Supersampling mode the offscreen target was last sized for.
    applied_antialias: Option<VrAntialias>,
    pub settings: VrSettings,
}

impl<D: GlDriver> VrRenderer<D> {
    pub fn new(kind: HmdType) -> Self {
        Self::with_backend(create_backend(kind))
    }

    pub fn with_backend(hmd: Box<dyn HmdBackend<D>>) -> Self {
        Self {
            hmd,
            hud: Fbo::new(),
            offscreen: Fbo::new(),
            state: VrState { hud_width: HUD_WIDTH, hud_height: HUD_HEIGHT, pixel_scale: 1.0, ..VrState::default() },
            stale: [true; 3],
            supported: false,
            enabled: false,
            applied_antialias: None,
            settings: VrSettings::default(),
        }
    }

    /// Launch-time setup. Returns false when the driver lacks framebuffer
    /// objects or packed depth/stencil; the caller must then force VR off.
    pub fn init(&mut self, ctx: &mut GlContext<D>) -> bool {
        let caps = ctx.caps();
        if !(caps.framebuffer_object && caps.packed_depth_stencil) {
            vid_printf(PRINT_ALL, "VR: framebuffer objects unavailable, stereo rendering disabled\n");
            self.supported = false;
            return false;
        }
        self.state.hud_width = HUD_WIDTH;
        self.state.hud_height = HUD_HEIGHT;
        self.hud = Fbo::new();
        self.offscreen = Fbo::new();
        self.supported = self.hmd.init();
        self.state.eye = Eye::Hud;
        vid_printf(PRINT_ALL, &format!("VR: using {} backend\n", self.hmd.kind().name()));
        self.supported
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn hmd_kind(&self) -> HmdType {
        self.hmd.kind()
    }

    pub fn state(&self) -> &VrState {
        &self.state
    }

    pub fn current_eye(&self) -> Eye {
        self.state.eye
    }

    pub fn hud_view(&self) -> FboView {
        self.hud.view()
    }

    pub fn offscreen_view(&self) -> FboView {
        self.offscreen.view()
    }

    fn window_view(&self) -> FboView {
        FboView { width: self.state.view_width, height: self.state.view_height, ..FboView::default() }
    }

    /// Allocate the HUD (and supersampling) targets for the current `vid`
    /// size and bring the backend up. On any failure everything is freed
    /// again and the layer stays disabled.
    pub fn enable(&mut self, ctx: &mut GlContext<D>) -> Result<(), RenderError> {
        if !self.supported {
            return Err(RenderError::Backend("stereo rendering unsupported".into()));
        }
        self.state.view_width = ctx.vid.width;
        self.state.view_height = ctx.vid.height;
        self.state.scaled_view_width = ctx.vid.width;
        self.state.scaled_view_height = ctx.vid.height;

        self.hud.destroy(ctx);
        self.offscreen.destroy(ctx);
        self.stale = [true; 3];

        com_printf("VR: Initializing renderer:");

        let result = (|| -> Result<(), RenderError> {
            self.hud.create(ctx, self.state.hud_width, self.state.hud_height, true, ColorFormat::Rgba8)?;
            if self.settings.antialias == VrAntialias::Ssaa4x {
                self.offscreen.create(
                    ctx,
                    self.state.view_width * 2,
                    self.state.view_height * 2,
                    true,
                    ColorFormat::Rgba8,
                )?;
            }
            // force a resolution pass on the next frame
            self.applied_antialias = None;
            self.hmd.enable(ctx, &mut self.state)
        })();

        match result {
            Ok(()) => {
                com_printf(" ok!\n");
                self.enabled = true;
                Ok(())
            }
            Err(err) => {
                com_printf(" failed!\n");
                vid_printf(PRINT_ALL, &format!("VR: {}\n", err));
                self.hmd.disable(ctx);
                self.hud.destroy(ctx);
                self.offscreen.destroy(ctx);
                self.enabled = false;
                Err(err)
            }
        }
    }

    /// Return to the window target and free the stereo targets.
    pub fn disable(&mut self, ctx: &mut GlContext<D>) {
        if !self.enabled {
            return;
        }
        let window = self.window_view();
        ctx.bind_framebuffer(window);
        ctx.fit_viewport(window);
        self.state.pixel_scale = 1.0;

        self.hmd.disable(ctx);
        self.hud.destroy(ctx);
        self.offscreen.destroy(ctx);
        self.enabled = false;
    }

    /// Once per frame: refresh the eye offset, apply supersampling changes,
    /// let the backend update and mark every target stale.
    pub fn start_frame(&mut self, ctx: &mut GlContext<D>) {
        if !self.enabled {
            return;
        }
        let ipd = if self.settings.autoipd { self.hmd.ipd() / 2.0 } else { self.settings.ipd / 2000.0 };
        self.state.view_offset = ipd * PLAYER_HEIGHT_UNITS / PLAYER_HEIGHT_M;

        let mut resolution_changed = false;
        if self.applied_antialias != Some(self.settings.antialias) {
            resolution_changed = true;
            self.apply_antialias(ctx);
        }

        self.hmd.frame_start(ctx, &mut self.state, &self.settings, resolution_changed);

        if resolution_changed {
            com_printf(&format!("VR: Calculated {:.2} FOV\n", self.state.view_fov_y));
        }

        self.stale = [true; 3];
    }

    fn apply_antialias(&mut self, ctx: &mut GlContext<D>) {
        let aa = self.settings.antialias;
        self.applied_antialias = Some(aa);
        match aa {
            VrAntialias::Ssaa4x => {
                self.state.scaled_view_width = self.state.view_width * 2;
                self.state.scaled_view_height = self.state.view_height * 2;
                let (w, h) = (self.state.scaled_view_width, self.state.scaled_view_height);
                if let Err(err) = self.offscreen.resize(ctx, w, h, true, ColorFormat::Rgba8) {
                    vid_printf(PRINT_ALL, &format!("VR: supersampling unavailable: {}\n", err));
                }
            }
            VrAntialias::None => {
                self.state.scaled_view_width = self.state.view_width;
                self.state.scaled_view_height = self.state.view_height;
                self.offscreen.destroy(ctx);
            }
        }
    }

    /// Make `eye` the current target. The first bind of each target after
    /// [`VrRenderer::start_frame`] clears it.
    pub fn bind_view(&mut self, ctx: &mut GlContext<D>, eye: Eye) {
        self.state.eye = eye;
        let bound = match eye {
            Eye::Hud => {
                self.hud.bind(ctx);
                self.hud.valid
            }
            _ if self.enabled => {
                self.hmd.bind_view(ctx, eye);
                true
            }
            _ => false,
        };

        if bound && std::mem::take(&mut self.stale[eye.stale_slot()]) {
            ctx.set_clear_color(STALE_CLEAR_COLOR);
            ctx.clear(ClearBuffers::ALL);
            ctx.set_clear_color(DEFAULT_CLEAR_COLOR);
        }
    }

    /// Offset of `eye`'s viewport within its target.
    pub fn view_pos(&self, eye: Eye) -> [u32; 2] {
        match eye {
            Eye::Hud => [0, 0],
            _ => self.hmd.view_pos(eye),
        }
    }

    pub fn view_size(&self, eye: Eye) -> [u32; 2] {
        match eye {
            Eye::Hud => [self.hud.width.max(0) as u32, self.hud.height.max(0) as u32],
            _ => self.hmd.view_size(eye),
        }
    }

    /// Re-establish the current eye's target after something else was bound.
    pub fn rebind(&mut self, ctx: &mut GlContext<D>) {
        if self.enabled {
            let eye = self.state.eye;
            self.hmd.bind_view(ctx, eye);
        }
    }

    /// Back to the window target at view size.
    pub fn end_frame(&mut self, ctx: &mut GlContext<D>) {
        if self.enabled {
            let window = self.window_view();
            ctx.bind_framebuffer(window);
            ctx.fit_viewport(window);
        }
    }

    /// Draw the HUD texture into the bound eye as a quad `hud_depth` in front
    /// of the viewer spanning `hud_fov` degrees.
    pub fn draw_hud(&mut self, ctx: &mut GlContext<D>, shaders: &ShaderLibrary, eye: Eye) {
        if !self.enabled {
            return;
        }
        let fov = self.settings.hud_fov;
        let depth = self.settings.hud_depth;
        let ipd = if self.settings.autoipd { self.hmd.ipd() / 2.0 } else { self.settings.ipd / 2000.0 };

        ctx.matrix_mode(MatrixMode::Projection);
        ctx.load_matrix(&math::perspective_offset(
            self.state.view_fov_y,
            self.state.aspect,
            HUD_NEAR,
            HUD_FAR,
            eye.sign() * self.state.proj_offset,
        ));
        ctx.matrix_mode(MatrixMode::ModelView);
        ctx.load_identity();
        ctx.multiply_matrix(&math::translate(eye.sign() * -ipd, 0.0, 0.0));

        let x = (fov.to_radians() * 0.5).tan() * depth;
        let y = x / (self.hud.width as f32 / self.hud.height as f32);

        if self.settings.hud_transparency {
            ctx.enable(Capability::Blend);
            ctx.blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        }
        ctx.bind(self.hud.texture);

        match shaders.get(ShaderType::Blit) {
            Some(blit) => {
                blit.bind(ctx);
                ctx.uniform_1f(blit.uniform("gamma"), 1.0);
                ctx.uniform_1f(blit.uniform("intensity"), 1.0);
            }
            None => ctx.use_program(ProgramId::NONE),
        }

        // all four corners share one depth, so projecting on the CPU is exact
        let mvp = ctx.model_view_projection();
        let corner = |px: f32, py: f32, s: f32, t: f32| {
            let clip = math::transform_point(&mvp, [px, py, -depth]);
            let w = if clip[3] != 0.0 { clip[3] } else { 1.0 };
            QuadVertex::new(clip[0] / w, clip[1] / w, clip[2] / w, s, t)
        };
        let quad = [corner(-x, -y, 0.0, 0.0), corner(-x, y, 0.0, 1.0), corner(x, -y, 1.0, 0.0), corner(x, y, 1.0, 1.0)];
        ctx.draw_quad(&quad);

        ctx.disable(Capability::Blend);
    }

    /// Draw the HUD into both eyes, composite through the backend (via the
    /// supersampled target when enabled) and mark the state stale.
    pub fn present(&mut self, ctx: &mut GlContext<D>, shaders: &ShaderLibrary) {
        if !self.enabled {
            return;
        }

        ctx.disable(Capability::DepthTest);
        ctx.enable(Capability::AlphaTest);
        ctx.set_alpha_func(CompareFunc::Greater, 0.0);
        // unit 0 always exists
        let _ = ctx.select_texture(0);

        self.bind_view(ctx, Eye::Left);
        self.draw_hud(ctx, shaders, Eye::Left);

        self.bind_view(ctx, Eye::Right);
        self.draw_hud(ctx, shaders, Eye::Right);

        ctx.bind(TextureId::NONE);
        ctx.disable(Capability::AlphaTest);

        ctx.matrix_mode(MatrixMode::Projection);
        ctx.load_identity();
        ctx.matrix_mode(MatrixMode::ModelView);
        ctx.load_identity();

        let supersampled = self.settings.antialias == VrAntialias::Ssaa4x && self.offscreen.valid;
        if supersampled {
            self.offscreen.bind(ctx);
        } else {
            self.end_frame(ctx);
        }

        self.hmd.present(ctx, shaders);

        if supersampled {
            self.end_frame(ctx);
            ctx.bind(self.offscreen.texture);
            ctx.draw_quad(&FULLSCREEN_QUAD);
        }
        ctx.bind(TextureId::NONE);

        self.state.stale = true;
    }

    /// Called when the renderer goes away.
    pub fn shutdown(&mut self, ctx: &mut GlContext<D>) {
        self.disable(ctx);
        self.hud.destroy(ctx);
        self.offscreen.destroy(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverCaps, HeadlessDriver};
    use q2vr_common::files::FileSystem;

    fn context(width: i32, height: i32) -> GlContext<HeadlessDriver> {
        let mut ctx = GlContext::new(HeadlessDriver::new());
        ctx.set_default_state();
        ctx.vid.width = width;
        ctx.vid.height = height;
        ctx
    }

    fn shaders(ctx: &mut GlContext<HeadlessDriver>) -> ShaderLibrary {
        let mut fs = FileSystem::new();
        fs.add_game_directory(env!("CARGO_MANIFEST_DIR"));
        let mut lib = ShaderLibrary::new();
        lib.init(ctx, &|p: &str| fs.load_file(p));
        lib
    }

    fn side_by_side(ctx: &mut GlContext<HeadlessDriver>) -> VrRenderer<HeadlessDriver> {
        let mut vr = VrRenderer::new(HmdType::SideBySide);
        assert!(vr.init(ctx));
        vr.enable(ctx).unwrap();
        vr
    }

    #[test]
    fn test_eye_signs() {
        assert_eq!(Eye::Left.sign(), -1.0);
        assert_eq!(Eye::Hud.sign(), 0.0);
        assert_eq!(Eye::Right.sign(), 1.0);
    }

    #[test]
    fn test_init_requires_framebuffer_objects() {
        let caps = DriverCaps { packed_depth_stencil: false, ..DriverCaps::default() };
        let mut ctx = GlContext::new(HeadlessDriver::with_caps(caps));
        let mut vr: VrRenderer<HeadlessDriver> = VrRenderer::new(HmdType::SideBySide);
        assert!(!vr.init(&mut ctx));
        assert!(vr.enable(&mut ctx).is_err());
        assert_eq!(ctx.driver().live_framebuffers(), 0);
    }

    #[test]
    fn test_backend_enable_failure_frees_everything() {
        let mut ctx = context(640, 480);
        let mut vr: VrRenderer<HeadlessDriver> = VrRenderer::new(HmdType::None);
        assert!(vr.init(&mut ctx));
        vr.settings.antialias = VrAntialias::Ssaa4x;
        assert!(matches!(vr.enable(&mut ctx), Err(RenderError::Backend(_))));
        assert!(!vr.is_enabled());
        assert!(vr.hud_view().framebuffer.is_none());
        assert_eq!(ctx.driver().live_framebuffers(), 0);
        assert_eq!(ctx.driver().live_textures(), 0);
    }

    #[test]
    fn test_stale_target_cleared_once() {
        let mut ctx = context(800, 600);
        let mut vr = side_by_side(&mut ctx);
        vr.start_frame(&mut ctx);
        ctx.driver_mut().reset_counters();

        for eye in Eye::ALL {
            vr.bind_view(&mut ctx, eye);
            let fb = ctx.current_framebuffer().framebuffer;
            assert_eq!(ctx.driver().counters.clears_on(fb), 1, "{:?}", eye);
            vr.bind_view(&mut ctx, eye);
            assert_eq!(ctx.driver().counters.clears_on(fb), 1, "{:?}", eye);
        }
        // stale clears use black, then the default clear color comes back
        assert!(ctx.driver().counters.clears.iter().all(|c| c.color == [0.0, 0.0, 0.0, 0.0]));
        assert_eq!(ctx.clear_color(), Some([1.0, 0.0, 0.5, 0.5]));

        vr.start_frame(&mut ctx);
        vr.bind_view(&mut ctx, Eye::Left);
        assert_eq!(ctx.driver().counters.clears.len(), 4);
    }

    #[test]
    fn test_view_offset_from_ipd() {
        let mut ctx = context(800, 600);
        let mut vr = side_by_side(&mut ctx);
        vr.settings.autoipd = false;
        vr.settings.ipd = 70.0;
        vr.start_frame(&mut ctx);
        let expected = 0.035 * PLAYER_HEIGHT_UNITS / PLAYER_HEIGHT_M;
        assert!((vr.state().view_offset - expected).abs() < 1e-5);

        vr.settings.autoipd = true;
        vr.start_frame(&mut ctx);
        let expected = DEFAULT_IPD / 2.0 * PLAYER_HEIGHT_UNITS / PLAYER_HEIGHT_M;
        assert!((vr.state().view_offset - expected).abs() < 1e-5);
    }

    #[test]
    fn test_antialias_resizes_offscreen() {
        let mut ctx = context(400, 300);
        let mut vr = side_by_side(&mut ctx);
        vr.start_frame(&mut ctx);
        assert!(vr.offscreen_view().framebuffer.is_none());

        vr.settings.antialias = VrAntialias::Ssaa4x;
        vr.start_frame(&mut ctx);
        let off = vr.offscreen_view();
        assert_eq!((off.width, off.height), (800, 600));
        assert_eq!(vr.state().scaled_view_width, 800);

        vr.settings.antialias = VrAntialias::None;
        vr.start_frame(&mut ctx);
        assert!(vr.offscreen_view().framebuffer.is_none());
    }

    #[test]
    fn test_view_pos_and_size() {
        let mut ctx = context(800, 600);
        let vr = side_by_side(&mut ctx);
        assert_eq!(vr.view_size(Eye::Hud), [640, 480]);
        assert_eq!(vr.view_pos(Eye::Hud), [0, 0]);
        assert_eq!(vr.view_size(Eye::Right), [400, 600]);
        assert_eq!(vr.view_pos(Eye::Right), [400, 0]);
    }

    #[test]
    fn test_present_draws_hud_and_eyes() {
        let mut ctx = context(800, 600);
        let lib = shaders(&mut ctx);
        let mut vr = side_by_side(&mut ctx);
        vr.settings.hud_transparency = true;
        vr.start_frame(&mut ctx);
        ctx.driver_mut().reset_counters();

        vr.present(&mut ctx, &lib);

        let hud = vr.hud_view().texture;
        let draws = &ctx.driver().counters.draws;
        // HUD into each eye, then each eye into its half of the window
        assert_eq!(draws.len(), 4);
        assert!(draws[..2].iter().all(|d| d.texture == hud && d.blend));
        assert_eq!(draws[2].viewport, [0, 0, 400, 600]);
        assert_eq!(draws[3].viewport, [400, 0, 400, 600]);
        assert!(draws[2..].iter().all(|d| d.framebuffer.is_none()));

        assert!(vr.state().stale);
        assert_eq!(ctx.is_enabled(Capability::Blend), Some(false));
        assert_eq!(ctx.is_enabled(Capability::AlphaTest), Some(false));
        assert_eq!(*ctx.top(MatrixMode::Projection), math::IDENTITY);
        assert_eq!(ctx.bound_texture(0), Some(TextureId::NONE));
        assert!(ctx.current_framebuffer().is_window());
        assert_eq!(ctx.vid.width, 800);
    }

    #[test]
    fn test_present_supersampled_resolves_offscreen() {
        let mut ctx = context(320, 200);
        let lib = shaders(&mut ctx);
        let mut vr = side_by_side(&mut ctx);
        vr.settings.antialias = VrAntialias::Ssaa4x;
        vr.start_frame(&mut ctx);
        ctx.driver_mut().reset_counters();

        vr.present(&mut ctx, &lib);

        let off = vr.offscreen_view();
        let draws = &ctx.driver().counters.draws;
        assert_eq!(draws.len(), 5);
        assert_eq!(draws[2].framebuffer, off.framebuffer);
        assert_eq!(draws[2].viewport, [0, 0, 320, 400]);
        assert_eq!(draws[4].texture, off.texture);
        assert_eq!(draws[4].viewport, [0, 0, 320, 200]);
    }

    #[test]
    fn test_hud_quad_centered_for_hud_eye() {
        let mut ctx = context(800, 600);
        let lib = shaders(&mut ctx);
        let mut vr = side_by_side(&mut ctx);
        vr.start_frame(&mut ctx);
        vr.bind_view(&mut ctx, Eye::Left);
        vr.draw_hud(&mut ctx, &lib, Eye::Hud);
        // no eye offset: projection and modelview carry no translation
        assert_eq!(ctx.top(MatrixMode::ModelView)[3][0], 0.0);
        assert_eq!(ctx.top(MatrixMode::Projection)[3][0], 0.0);
    }

    #[test]
    fn test_disable_and_shutdown() {
        let mut ctx = context(800, 600);
        let mut vr = side_by_side(&mut ctx);
        assert_eq!(ctx.driver().live_framebuffers(), 3);
        vr.bind_view(&mut ctx, Eye::Right);
        vr.disable(&mut ctx);
        assert!(!vr.is_enabled());
        assert!(ctx.current_framebuffer().is_window());
        assert_eq!(ctx.viewport(), Some([0, 0, 800, 600]));
        assert_eq!(ctx.driver().live_framebuffers(), 0);
        vr.shutdown(&mut ctx);
        assert_eq!(ctx.driver().live_framebuffers(), 0);
    }
}
