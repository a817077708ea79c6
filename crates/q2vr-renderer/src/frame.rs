//! Frame orchestrator
//!
//! Sequences one frame: console requests and cvar changes are applied in
//! `begin_frame`, `render_view` runs the scene passes once per eye (through
//! the post-processing chain when it is active) and `end_frame` presents.
//! All GPU work stays on the thread that owns the [`Renderer`].

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use q2vr_common::cmd::CmdContext;
use q2vr_common::common::{com_printf, vid_printf};
use q2vr_common::cvar::CvarContext;
use q2vr_common::files::FsLoadFileFn;
use q2vr_common::q_shared::{Vec3, CVAR_ARCHIVE, PRINT_ALERT, PRINT_ALL, PRINT_DEVELOPER};

use crate::driver::{Capability, ClearBuffers, GlDriver};
use crate::framebuffer::{Fbo, FboView};
use crate::math;
use crate::postprocess::{AntialiasMode, PostProcessor, PostStage};
use crate::shader::{ShaderLibrary, ShaderType};
use crate::state::{GlContext, MatrixMode};
use crate::vr::{Eye, HmdType, VrAntialias, VrRenderer};
use crate::RenderError;

const VIEW_NEAR: f32 = 4.0;
const VIEW_FAR: f32 = 4096.0;

/// Console commands registered by the renderer.
const COMMANDS: [&str; 5] = ["r_reloadshaders", "vr_enable", "vr_disable", "vr_toggle", "r_glstate"];

/// Work requested from the console, run at the start of the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderCommand {
    ReloadShaders,
    VrEnable,
    VrDisable,
    VrToggle,
    DumpState,
}

pub type CommandQueue = Arc<Mutex<VecDeque<RenderCommand>>>;

/// Handles of every renderer cvar.
#[derive(Debug, Clone, Copy)]
pub struct RendererCvars {
    pub r_antialias: usize,
    pub r_bloom: usize,
    pub r_bloom_threshold: usize,
    pub r_bloom_intensity: usize,
    pub r_blur: usize,
    pub r_flashblur: usize,
    pub r_postprocess: usize,
    pub vid_gamma: usize,
    pub r_finish: usize,
    pub vr_enabled: usize,
    pub vr_hmdtype: usize,
    pub vr_antialias: usize,
    pub vr_ipd: usize,
    pub vr_autoipd: usize,
    pub vr_hud_fov: usize,
    pub vr_hud_depth: usize,
    pub vr_hud_transparency: usize,
    pub vr_sbs_fov: usize,
}

impl RendererCvars {
    pub fn register(cvars: &mut CvarContext) -> Self {
        Self {
            r_antialias: cvars.get_or_create("r_antialias", "0", CVAR_ARCHIVE),
            r_bloom: cvars.get_or_create("r_bloom", "0", CVAR_ARCHIVE),
            r_bloom_threshold: cvars.get_or_create("r_bloom_threshold", "0.75", CVAR_ARCHIVE),
            r_bloom_intensity: cvars.get_or_create("r_bloom_intensity", "0.5", CVAR_ARCHIVE),
            r_blur: cvars.get_or_create("r_blur", "0", CVAR_ARCHIVE),
            r_flashblur: cvars.get_or_create("r_flashblur", "1", CVAR_ARCHIVE),
            r_postprocess: cvars.get_or_create("r_postprocess", "1", CVAR_ARCHIVE),
            vid_gamma: cvars.get_or_create("vid_gamma", "1.0", CVAR_ARCHIVE),
            r_finish: cvars.get_or_create("r_finish", "0", CVAR_ARCHIVE),
            vr_enabled: cvars.get_or_create("vr_enabled", "0", 0),
            vr_hmdtype: cvars.get_or_create("vr_hmdtype", "1", CVAR_ARCHIVE),
            vr_antialias: cvars.get_or_create("vr_antialias", "0", CVAR_ARCHIVE),
            vr_ipd: cvars.get_or_create("vr_ipd", "64", CVAR_ARCHIVE),
            vr_autoipd: cvars.get_or_create("vr_autoipd", "1", CVAR_ARCHIVE),
            vr_hud_fov: cvars.get_or_create("vr_hud_fov", "65", CVAR_ARCHIVE),
            vr_hud_depth: cvars.get_or_create("vr_hud_depth", "0.75", CVAR_ARCHIVE),
            vr_hud_transparency: cvars.get_or_create("vr_hud_transparency", "0", CVAR_ARCHIVE),
            vr_sbs_fov: cvars.get_or_create("vr_sbs_fov", "90", CVAR_ARCHIVE),
        }
    }
}

/// Parameters of one 3D view, in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParams {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub fov_x: f32,
    pub fov_y: f32,
    pub origin: Vec3,
    pub angles: Vec3,
    pub time: f32,
    /// Full-screen flash (damage, pickup) color; alpha 0 for none.
    pub blend: [f32; 4],
}

impl ViewParams {
    /// Full-window view with the given vertical field of view.
    pub fn fullscreen(width: i32, height: i32, fov_y: f32) -> Self {
        let aspect = width as f32 / height.max(1) as f32;
        let fov_x = (2.0 * ((fov_y.to_radians() * 0.5).tan() * aspect).atan()).to_degrees();
        Self { x: 0, y: 0, width, height, fov_x, fov_y, origin: [0.0; 3], angles: [0.0; 3], time: 0.0, blend: [0.0; 4] }
    }
}

/// What a scene pass is drawing for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeView {
    pub params: ViewParams,
    /// `Eye::Hud` for a mono view.
    pub eye: Eye,
    /// Signed horizontal eye offset in world units.
    pub eye_offset: f32,
    pub fov_y: f32,
    pub aspect: f32,
}

/// The client's draw passes. Called in declaration order for every eye.
pub trait ScenePasses<D: GlDriver> {
    fn draw_world(&mut self, ctx: &mut GlContext<D>, shaders: &ShaderLibrary, view: &EyeView);
    fn draw_entities(&mut self, ctx: &mut GlContext<D>, shaders: &ShaderLibrary, view: &EyeView);
    fn draw_particles(&mut self, ctx: &mut GlContext<D>, shaders: &ShaderLibrary, view: &EyeView);
    fn draw_alpha_surfaces(&mut self, ctx: &mut GlContext<D>, shaders: &ShaderLibrary, view: &EyeView);
    /// Console, status bar and menus. Once per frame, into the HUD in stereo.
    fn draw_2d(&mut self, ctx: &mut GlContext<D>, shaders: &ShaderLibrary);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenePass {
    World,
    Entities,
    Particles,
    AlphaSurfaces,
    Draw2D,
}

/// Per-frame counters for r_speeds style reporting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    pub passes: Vec<(Eye, ScenePass)>,
    pub clears: u32,
    pub post_stages: Vec<PostStage>,
    pub stereo: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    InFrame,
}

pub struct Renderer<D: GlDriver> {
    ctx: GlContext<D>,
    shaders: ShaderLibrary,
    post: PostProcessor,
    vr: VrRenderer<D>,
    screen: Fbo,
    cvars: RendererCvars,
    loader: FsLoadFileFn,
    commands: CommandQueue,
    state: FrameState,
    stats: FrameStats,
    frame: u64,
    /// r_finish
    finish: bool,
    /// r_flashblur: tint the directional blur with the view's flash color
    flash_blur: bool,
}

impl<D: GlDriver> Renderer<D> {
    /// Bring the renderer up on `driver` for a `width` x `height` window:
    /// register cvars and commands, put the state cache in a known state,
    /// build the shader library, the post-processing chain and the stereo
    /// layer. Only a driver error while setting up the display target fails.
    pub fn init_renderer(
        driver: D,
        width: i32,
        height: i32,
        cvars: &mut CvarContext,
        cmds: &mut CmdContext,
        loader: FsLoadFileFn,
    ) -> Result<Self, RenderError> {
        com_printf("------- renderer initialization -------\n");
        let handles = RendererCvars::register(cvars);

        let mut ctx = GlContext::new(driver);
        ctx.drain_errors();
        ctx.set_default_state();
        let screen = Fbo::screen(width, height);
        ctx.bind_framebuffer(screen.view());
        ctx.fit_viewport(screen.view());
        if let Err(err) = ctx.check_error("init_renderer: display target") {
            vid_printf(PRINT_ALL, "init_renderer: unable to set up the display target\n");
            return Err(err);
        }

        let hmd = HmdType::from_index(cvars.integer_by_handle(handles.vr_hmdtype));
        let mut renderer = Self {
            ctx,
            shaders: ShaderLibrary::new(),
            post: PostProcessor::new(),
            vr: VrRenderer::new(hmd),
            screen,
            cvars: handles,
            loader,
            commands: Arc::new(Mutex::new(VecDeque::new())),
            state: FrameState::Idle,
            stats: FrameStats::default(),
            frame: 0,
            finish: false,
            flash_blur: false,
        };

        renderer.register_commands(cmds);
        renderer.shaders.init(&mut renderer.ctx, &*renderer.loader);
        renderer.sync_post_settings(cvars);
        renderer.sync_postprocess(cvars);

        if renderer.vr.init(&mut renderer.ctx) {
            renderer.sync_vr_settings(cvars);
        } else if cvars.integer_by_handle(handles.vr_enabled) != 0 {
            cvars.force_set("vr_enabled", "0");
        }
        cvars.clear_modified(handles.vr_enabled);

        com_printf("------------------------------------\n");
        Ok(renderer)
    }

    fn register_commands(&self, cmds: &mut CmdContext) {
        let bindings = [
            RenderCommand::ReloadShaders,
            RenderCommand::VrEnable,
            RenderCommand::VrDisable,
            RenderCommand::VrToggle,
            RenderCommand::DumpState,
        ];
        for (name, command) in COMMANDS.iter().zip(bindings) {
            let queue = Arc::clone(&self.commands);
            cmds.cmd_add_command(name, Some(Box::new(move |_: &mut CmdContext| queue.lock().push_back(command))));
        }
    }

    pub fn context(&self) -> &GlContext<D> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut GlContext<D> {
        &mut self.ctx
    }

    pub fn shaders(&self) -> &ShaderLibrary {
        &self.shaders
    }

    pub fn post(&self) -> &PostProcessor {
        &self.post
    }

    pub fn vr(&self) -> &VrRenderer<D> {
        &self.vr
    }

    pub fn frame_state(&self) -> FrameState {
        self.state
    }

    /// Counters of the last completed (or current) frame.
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Queue shared with the console commands.
    pub fn command_queue(&self) -> CommandQueue {
        Arc::clone(&self.commands)
    }

    // ================================================================
    // Configuration
    // ================================================================

    fn sync_post_settings(&mut self, cvars: &mut CvarContext) {
        let h = self.cvars;
        if cvars.is_modified(h.r_antialias) {
            let raw = cvars.integer_by_handle(h.r_antialias);
            let mode = AntialiasMode::from_index(raw);
            if mode.index() != raw {
                cvars.set_integer("r_antialias", mode.index());
            }
            cvars.clear_modified(h.r_antialias);
            if mode != self.post.antialias {
                self.post.antialias = mode;
                let (w, hgt) = self.post.output_size();
                if let Err(err) = self.post.resize(&mut self.ctx, w, hgt) {
                    vid_printf(PRINT_ALL, &format!("r_antialias: {}\n", err));
                }
            }
        }
        self.post.bloom_enabled = cvars.integer_by_handle(h.r_bloom) != 0;
        self.post.bloom_threshold = cvars.value_by_handle(h.r_bloom_threshold);
        self.post.bloom_intensity = cvars.value_by_handle(h.r_bloom_intensity);
        self.post.blur_scale = cvars.value_by_handle(h.r_blur).max(0.0);
        self.post.gamma = cvars.value_by_handle(h.vid_gamma);
        self.finish = cvars.integer_by_handle(h.r_finish) != 0;
        self.flash_blur = cvars.integer_by_handle(h.r_flashblur) != 0;
    }

    /// Bring the chain up or down to match `r_postprocess` and the programs
    /// that are available.
    fn sync_postprocess(&mut self, cvars: &mut CvarContext) {
        let wanted = cvars.integer_by_handle(self.cvars.r_postprocess) != 0
            && self.ctx.caps().framebuffer_object
            && self.shaders.is_enabled(ShaderType::Blit);
        cvars.clear_modified(self.cvars.r_postprocess);

        if wanted && !self.post.is_enabled() {
            let (w, h) = self.output_size();
            if self.post.init(&mut self.ctx, w, h).is_err() {
                vid_printf(PRINT_ALL, "...post-processing unavailable\n");
            }
        } else if !wanted && self.post.is_enabled() {
            self.post.shutdown(&mut self.ctx);
        }
    }

    fn sync_vr_settings(&mut self, cvars: &mut CvarContext) {
        let h = self.cvars;
        if cvars.is_modified(h.vr_antialias) {
            let raw = cvars.integer_by_handle(h.vr_antialias);
            let aa = VrAntialias::from_index(raw);
            if aa.index() != raw {
                cvars.set_integer("vr_antialias", aa.index());
            }
            cvars.clear_modified(h.vr_antialias);
            self.vr.settings.antialias = aa;
        }
        let settings = &mut self.vr.settings;
        settings.ipd = cvars.value_by_handle(h.vr_ipd);
        settings.autoipd = cvars.integer_by_handle(h.vr_autoipd) != 0;
        settings.hud_fov = cvars.value_by_handle(h.vr_hud_fov);
        settings.hud_depth = cvars.value_by_handle(h.vr_hud_depth);
        settings.hud_transparency = cvars.integer_by_handle(h.vr_hud_transparency) != 0;
        settings.sbs_fov = cvars.value_by_handle(h.vr_sbs_fov);

        if cvars.is_modified(h.vr_enabled) {
            cvars.clear_modified(h.vr_enabled);
            let wanted = cvars.integer_by_handle(h.vr_enabled) != 0;
            if wanted && !self.vr.is_enabled() {
                let _ = self.enable_vr(cvars);
            } else if !wanted && self.vr.is_enabled() {
                self.disable_vr(cvars);
            }
        }
    }

    /// Size the scene is post-processed at: one eye in stereo, else the window.
    fn output_size(&self) -> (i32, i32) {
        if self.vr.is_enabled() {
            let [w, h] = self.vr.view_size(Eye::Left);
            (w as i32, h as i32)
        } else {
            (self.screen.width, self.screen.height)
        }
    }

    // ================================================================
    // Console requests
    // ================================================================

    fn run_commands(&mut self, cvars: &mut CvarContext) {
        let pending: Vec<RenderCommand> = self.commands.lock().drain(..).collect();
        for command in pending {
            vid_printf(PRINT_DEVELOPER, &format!("render command {:?}\n", command));
            match command {
                RenderCommand::ReloadShaders => {
                    self.shaders.reload(&mut self.ctx, &*self.loader);
                    if !self.shaders.is_enabled(ShaderType::Blit) && self.post.is_enabled() {
                        self.post.shutdown(&mut self.ctx);
                    }
                }
                RenderCommand::VrEnable => cvars.set_integer("vr_enabled", 1),
                RenderCommand::VrDisable => cvars.set_integer("vr_enabled", 0),
                RenderCommand::VrToggle => cvars.toggle("vr_enabled"),
                RenderCommand::DumpState => self.ctx.print_state(),
            }
        }
    }

    // ================================================================
    // Stereo
    // ================================================================

    /// Switch to stereo rendering. On failure VR stays off and `vr_enabled`
    /// is forced back to 0.
    pub fn enable_vr(&mut self, cvars: &mut CvarContext) -> Result<(), RenderError> {
        let window = self.screen.view();
        self.ctx.bind_framebuffer(window);
        self.ctx.fit_viewport(window);

        let result = self.vr.enable(&mut self.ctx);
        match &result {
            Ok(()) => cvars.force_set("vr_enabled", "1"),
            Err(_) => cvars.force_set("vr_enabled", "0"),
        };
        cvars.clear_modified(self.cvars.vr_enabled);

        let (w, h) = self.output_size();
        if let Err(err) = self.post.resize(&mut self.ctx, w, h) {
            vid_printf(PRINT_ALL, &format!("enable_vr: {}\n", err));
        }
        result
    }

    pub fn disable_vr(&mut self, cvars: &mut CvarContext) {
        self.vr.disable(&mut self.ctx);
        cvars.force_set("vr_enabled", "0");
        cvars.clear_modified(self.cvars.vr_enabled);

        let (w, h) = self.output_size();
        if let Err(err) = self.post.resize(&mut self.ctx, w, h) {
            vid_printf(PRINT_ALL, &format!("disable_vr: {}\n", err));
        }
    }

    /// Draw the HUD into both eyes and hand them to the HMD backend.
    pub fn present_stereo(&mut self) {
        if self.vr.is_enabled() {
            self.vr.present(&mut self.ctx, &self.shaders);
        }
    }

    // ================================================================
    // Frame
    // ================================================================

    /// Apply pending console requests and cvar changes, then prepare the
    /// targets for a new frame.
    pub fn begin_frame(&mut self, cvars: &mut CvarContext) {
        if self.state == FrameState::InFrame {
            vid_printf(PRINT_ALERT, "begin_frame: already inside a frame\n");
            return;
        }

        self.run_commands(cvars);
        self.sync_vr_settings(cvars);
        self.sync_post_settings(cvars);
        self.sync_postprocess(cvars);

        self.frame += 1;
        self.stats = FrameStats { frame: self.frame, stereo: self.vr.is_enabled(), ..FrameStats::default() };
        self.ctx.take_clear_count();

        if self.vr.is_enabled() {
            self.vr.start_frame(&mut self.ctx);
        } else {
            let window = self.screen.view();
            self.ctx.bind_framebuffer(window);
            self.ctx.fit_viewport(window);
            self.ctx.clear(ClearBuffers::ALL);
        }
        self.state = FrameState::InFrame;
    }

    /// Render one 3D view: every eye in stereo, the window otherwise, followed
    /// by the 2D pass.
    pub fn render_view(&mut self, view: &ViewParams, passes: &mut impl ScenePasses<D>) {
        if self.state != FrameState::InFrame {
            vid_printf(PRINT_ALERT, "render_view: called outside of a frame\n");
            return;
        }

        if self.vr.is_enabled() {
            for eye in [Eye::Left, Eye::Right] {
                self.vr.bind_view(&mut self.ctx, eye);
                let target = self.ctx.current_framebuffer();
                self.render_eye(view, eye, target, passes);
            }
            self.vr.bind_view(&mut self.ctx, Eye::Hud);
        } else {
            let window = self.screen.view();
            self.render_eye(view, Eye::Hud, window, passes);
            self.ctx.bind_framebuffer(window);
            self.ctx.fit_viewport(window);
        }

        self.ctx.disable(Capability::DepthTest);
        self.ctx.set_identity_ortho();
        passes.draw_2d(&mut self.ctx, &self.shaders);
        self.stats.passes.push((Eye::Hud, ScenePass::Draw2D));
    }

    fn render_eye(&mut self, view: &ViewParams, eye: Eye, target: FboView, passes: &mut impl ScenePasses<D>) {
        // eye targets are covered whole; window coordinates start bottom left
        let rect = target
            .is_window()
            .then(|| [view.x, target.height - view.y - view.height, view.width, view.height]);

        let post = self.post.is_enabled()
            && target.width > 0
            && target.height > 0
            && self.post.resize(&mut self.ctx, target.width, target.height).is_ok()
            && self.post.begin_scene(&mut self.ctx, rect);

        if let (false, Some([x, y, w, h])) = (post, rect) {
            self.ctx.set_viewport(x, y, w, h);
        }

        let eye_view = self.setup_view(view, eye);
        passes.draw_world(&mut self.ctx, &self.shaders, &eye_view);
        self.stats.passes.push((eye, ScenePass::World));
        passes.draw_entities(&mut self.ctx, &self.shaders, &eye_view);
        self.stats.passes.push((eye, ScenePass::Entities));
        passes.draw_particles(&mut self.ctx, &self.shaders, &eye_view);
        self.stats.passes.push((eye, ScenePass::Particles));
        passes.draw_alpha_surfaces(&mut self.ctx, &self.shaders, &eye_view);
        self.stats.passes.push((eye, ScenePass::AlphaSurfaces));

        if post {
            self.post.blur_tint = if self.flash_blur { view.blend } else { [0.0; 4] };
            match self.post.process(&mut self.ctx, &self.shaders, target) {
                Ok(()) => self.stats.post_stages.extend_from_slice(self.post.stages_run()),
                Err(err) => {
                    vid_printf(PRINT_ALL, &format!("post-processing disabled: {}\n", err));
                    self.post.shutdown(&mut self.ctx);
                }
            }
        }
    }

    /// Load the projection and modelview for `eye`.
    fn setup_view(&mut self, view: &ViewParams, eye: Eye) -> EyeView {
        let (fov_y, aspect, proj_offset, eye_offset) = if self.vr.is_enabled() {
            let st = self.vr.state();
            (st.view_fov_y, st.aspect, eye.sign() * st.proj_offset, eye.sign() * st.view_offset)
        } else {
            (view.fov_y, view.width as f32 / view.height.max(1) as f32, 0.0, 0.0)
        };

        self.ctx.matrix_mode(MatrixMode::Projection);
        self.ctx.load_matrix(&math::perspective_offset(fov_y, aspect, VIEW_NEAR, VIEW_FAR, proj_offset));
        self.ctx.matrix_mode(MatrixMode::ModelView);
        self.ctx.load_identity();
        self.ctx.multiply_matrix(&math::translate(-eye_offset, 0.0, 0.0));

        self.ctx.enable(Capability::DepthTest);
        EyeView { params: *view, eye, eye_offset, fov_y, aspect }
    }

    /// Present, optionally wait for the GPU, and return to idle.
    pub fn end_frame(&mut self) {
        if self.state != FrameState::InFrame {
            vid_printf(PRINT_ALERT, "end_frame: called outside of a frame\n");
            return;
        }

        self.present_stereo();
        if self.finish {
            self.ctx.finish();
        }
        self.stats.clears = self.ctx.take_clear_count();
        self.state = FrameState::Idle;
    }

    /// Window size changed: resize the display target and everything sized
    /// from it.
    pub fn set_dimensions(&mut self, cvars: &mut CvarContext, width: i32, height: i32) {
        self.screen.set_screen_size(width, height);
        let window = self.screen.view();
        if self.vr.is_enabled() {
            // stereo targets are sized from the window at enable time
            self.vr.disable(&mut self.ctx);
            let _ = self.enable_vr(cvars);
        } else {
            self.ctx.bind_framebuffer(window);
            self.ctx.fit_viewport(window);
            if let Err(err) = self.post.resize(&mut self.ctx, width, height) {
                vid_printf(PRINT_ALL, &format!("set_dimensions: {}\n", err));
            }
        }
    }

    /// Tear everything down and unregister the console commands.
    pub fn shutdown_renderer(&mut self, cmds: &mut CmdContext) {
        for name in COMMANDS {
            cmds.cmd_remove_command(name);
        }
        self.commands.lock().clear();
        self.vr.shutdown(&mut self.ctx);
        self.post.shutdown(&mut self.ctx);
        self.shaders.shutdown(&mut self.ctx);
        self.state = FrameState::Idle;
        com_printf("renderer shut down\n");
    }
}
