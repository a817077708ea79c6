//! Post-processing chain
//!
//! Fixed order: scene -> antialias resolve -> bloom -> directional blur ->
//! final blit with gamma. Each stage samples the previous stage's FBO and
//! writes its own; a skipped stage hands its input straight to the next one.
//! A stage whose FBO cannot be allocated is skipped the same way, so the
//! final blit always runs.

mod antialias;

pub use antialias::{set_fbo_size, AntialiasMode};

use q2vr_common::common::vid_printf;
use q2vr_common::q_shared::{PRINT_ALL, PRINT_DEVELOPER};

use crate::driver::{
    BlendFactor, Capability, ClearBuffers, ColorFormat, GlDriver, ProgramId, QuadVertex, FULLSCREEN_QUAD,
};
use crate::framebuffer::{Fbo, FboView};
use crate::shader::{ShaderLibrary, ShaderProgram, ShaderType};
use crate::state::GlContext;
use crate::RenderError;

/// Stages of the chain, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStage {
    /// Supersampled scene downsampled to output size.
    Resolve,
    Fxaa,
    BloomExtract,
    BloomBlur,
    BloomComposite,
    Blur,
    /// Gamma blit into the display target.
    FinalBlit,
}

impl PostStage {
    pub fn name(self) -> &'static str {
        match self {
            PostStage::Resolve => "resolve",
            PostStage::Fxaa => "fxaa",
            PostStage::BloomExtract => "bloom extract",
            PostStage::BloomBlur => "bloom blur",
            PostStage::BloomComposite => "bloom composite",
            PostStage::Blur => "blur",
            PostStage::FinalBlit => "final blit",
        }
    }
}

/// Which optional stages will run this frame. Derived from the public
/// configuration and the programs that actually linked.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PostProcessPasses {
    pub resolve: bool,
    pub fxaa: bool,
    pub bloom: bool,
    pub blur: bool,
}

/// Owns every intermediate FBO of the chain.
pub struct PostProcessor {
    /// Where the 3D view is rendered; supersampled when antialiasing asks for it.
    scene_fbo: Fbo,
    resolve_fbo: Fbo,
    fxaa_fbo: Fbo,
    /// Half-resolution ping-pong pair for the bloom blur.
    bloom_fbos: [Fbo; 2],
    composite_fbo: Fbo,
    blur_fbo: Fbo,
    output_width: i32,
    output_height: i32,
    /// Sub-rectangle of the output the view covers, bottom-left origin.
    view_rect: Option<[i32; 4]>,
    enabled: bool,
    passes: PostProcessPasses,
    stages_run: Vec<PostStage>,

    // Public configuration fields for cvar sync
    pub antialias: AntialiasMode,
    pub bloom_enabled: bool,
    pub bloom_threshold: f32,
    pub bloom_intensity: f32,
    /// Directional blur scale, 0 disables the stage.
    pub blur_scale: f32,
    /// Color mixed into the directional blur; alpha is the strength.
    pub blur_tint: [f32; 4],
    pub gamma: f32,
}

impl PostProcessor {
    pub fn new() -> Self {
        Self {
            scene_fbo: Fbo::new(),
            resolve_fbo: Fbo::new(),
            fxaa_fbo: Fbo::new(),
            bloom_fbos: [Fbo::new(), Fbo::new()],
            composite_fbo: Fbo::new(),
            blur_fbo: Fbo::new(),
            output_width: 0,
            output_height: 0,
            view_rect: None,
            enabled: false,
            passes: PostProcessPasses::default(),
            stages_run: Vec::new(),
            antialias: AntialiasMode::None,
            bloom_enabled: false,
            bloom_threshold: 0.75,
            bloom_intensity: 0.5,
            blur_scale: 0.0,
            blur_tint: [0.0; 4],
            gamma: 1.0,
        }
    }

    /// Allocate the scene FBO for an output of `width` x `height`. On failure
    /// the chain stays disabled and nothing is left allocated.
    pub fn init<D: GlDriver>(&mut self, ctx: &mut GlContext<D>, width: i32, height: i32) -> Result<(), RenderError> {
        self.output_width = width;
        self.output_height = height;
        if let Err(err) = set_fbo_size(ctx, &mut self.scene_fbo, self.antialias, width, height) {
            vid_printf(PRINT_ALL, &format!("post-processing disabled: {}\n", err));
            self.shutdown(ctx);
            return Err(err);
        }
        self.enabled = true;
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn output_size(&self) -> (i32, i32) {
        (self.output_width, self.output_height)
    }

    /// Track a new output size (window resize, eye resolution change or a
    /// different antialias mode). Intermediate FBOs follow lazily.
    pub fn resize<D: GlDriver>(&mut self, ctx: &mut GlContext<D>, width: i32, height: i32) -> Result<(), RenderError> {
        if !self.enabled {
            return Ok(());
        }
        self.output_width = width;
        self.output_height = height;
        if let Err(err) = set_fbo_size(ctx, &mut self.scene_fbo, self.antialias, width, height) {
            vid_printf(PRINT_ALL, &format!("post-processing disabled: {}\n", err));
            self.shutdown(ctx);
            return Err(err);
        }
        Ok(())
    }

    pub fn scene_view(&self) -> FboView {
        self.scene_fbo.view()
    }

    pub fn passes(&self) -> PostProcessPasses {
        self.passes
    }

    /// Stages executed by the last [`PostProcessor::process`] call.
    pub fn stages_run(&self) -> &[PostStage] {
        &self.stages_run
    }

    /// Redirect scene rendering into the scene FBO and clear it. `rect` is
    /// the part of the output the view covers (bottom-left origin, output
    /// pixels); the viewport is set to it, scaled to the scene FBO. Returns
    /// false when the chain is disabled and the caller should draw directly.
    pub fn begin_scene<D: GlDriver>(&mut self, ctx: &mut GlContext<D>, rect: Option<[i32; 4]>) -> bool {
        if !self.enabled || !self.scene_fbo.valid {
            return false;
        }
        let full = [0, 0, self.output_width, self.output_height];
        self.view_rect = rect.filter(|r| r[2] > 0 && r[3] > 0 && *r != full);
        self.scene_fbo.bind(ctx);
        ctx.clear(ClearBuffers::ALL);
        if let Some([x, y, w, h]) = self.view_rect {
            let sx = self.scene_fbo.width as f32 / self.output_width.max(1) as f32;
            let sy = self.scene_fbo.height as f32 / self.output_height.max(1) as f32;
            let scale = |v: i32, s: f32| (v as f32 * s) as i32;
            ctx.set_viewport(scale(x, sx), scale(y, sy), scale(w, sx), scale(h, sy));
        }
        true
    }

    /// The view rectangle set by the last [`PostProcessor::begin_scene`].
    pub fn view_rect(&self) -> Option<[i32; 4]> {
        self.view_rect
    }

    fn select_passes(&self, shaders: &ShaderLibrary) -> PostProcessPasses {
        PostProcessPasses {
            resolve: self.antialias.supersampled(),
            fxaa: self.antialias.uses_fxaa() && shaders.is_enabled(ShaderType::Fxaa),
            bloom: self.bloom_enabled
                && shaders.is_enabled(ShaderType::BloomFilter)
                && shaders.is_enabled(ShaderType::Blur),
            blur: self.blur_scale > 0.0 && shaders.is_enabled(ShaderType::Blur),
        }
    }

    /// Run the chain over the scene FBO and blit the result into `target`,
    /// into the view rectangle when one was given to `begin_scene`. The target
    /// is left bound with that viewport; depth test, blend, cull and the blend
    /// function are restored to what the caller had.
    pub fn process<D: GlDriver>(
        &mut self,
        ctx: &mut GlContext<D>,
        shaders: &ShaderLibrary,
        target: FboView,
    ) -> Result<(), RenderError> {
        self.stages_run.clear();
        if !self.enabled {
            return Err(RenderError::InvalidUsage("post-processing is disabled".into()));
        }
        let blit = shaders.get(ShaderType::Blit).ok_or_else(|| RenderError::NotFound("blit program".into()))?;

        self.passes = self.select_passes(shaders);
        let saved: Vec<(Capability, Option<bool>)> = [Capability::DepthTest, Capability::Blend, Capability::CullFace]
            .into_iter()
            .map(|cap| (cap, ctx.is_enabled(cap)))
            .collect();
        let saved_blend = ctx.blend_factors();
        ctx.disable(Capability::DepthTest);
        ctx.disable(Capability::Blend);
        ctx.disable(Capability::CullFace);

        self.run_stages(ctx, shaders, blit, target);

        for (cap, enabled) in saved {
            if let Some(enabled) = enabled {
                ctx.set_enabled(cap, enabled);
            }
        }
        if let Some((src, dst)) = saved_blend {
            ctx.blend_func(src, dst);
        }
        ctx.use_program(ProgramId::NONE);
        Ok(())
    }

    fn run_stages<D: GlDriver>(
        &mut self,
        ctx: &mut GlContext<D>,
        shaders: &ShaderLibrary,
        blit: &ShaderProgram,
        target: FboView,
    ) {
        let (w, h) = (self.output_width, self.output_height);
        let mut input = self.scene_fbo.view();

        if self.passes.resolve && stage_target(ctx, &mut self.resolve_fbo, w, h, PostStage::Resolve) {
            draw_blit(ctx, blit, input, self.resolve_fbo.view(), 1.0, 1.0);
            input = self.resolve_fbo.view();
            self.stages_run.push(PostStage::Resolve);
        }

        if let (true, Some(fxaa)) = (self.passes.fxaa, shaders.get(ShaderType::Fxaa)) {
            if stage_target(ctx, &mut self.fxaa_fbo, w, h, PostStage::Fxaa) {
                let dst = self.fxaa_fbo.view();
                begin_pass(ctx, fxaa, input, dst);
                ctx.uniform_2f(fxaa.uniform("texelSize"), 1.0 / input.width as f32, 1.0 / input.height as f32);
                ctx.draw_quad(&FULLSCREEN_QUAD);
                input = dst;
                self.stages_run.push(PostStage::Fxaa);
            }
        }

        if self.passes.bloom {
            input = self.bloom(ctx, shaders, blit, input);
        }

        if let (true, Some(blur)) = (self.passes.blur, shaders.get(ShaderType::Blur)) {
            if stage_target(ctx, &mut self.blur_fbo, w, h, PostStage::Blur) {
                let dst = self.blur_fbo.view();
                draw_blur(ctx, blur, input, dst, [self.blur_scale, 0.0], self.blur_tint);
                input = dst;
                self.stages_run.push(PostStage::Blur);
            }
        }

        // final blit into the view rectangle of the target
        begin_pass(ctx, blit, input, target);
        let quad = match self.view_rect {
            Some([x, y, rw, rh]) => {
                ctx.set_viewport(x, y, rw, rh);
                sub_quad([x, y, rw, rh], w, h)
            }
            None => FULLSCREEN_QUAD,
        };
        ctx.uniform_1f(blit.uniform("gamma"), self.gamma);
        ctx.uniform_1f(blit.uniform("intensity"), 1.0);
        ctx.draw_quad(&quad);
        self.stages_run.push(PostStage::FinalBlit);
    }

    /// Bright-pass extract at half resolution, separable blur, then an
    /// additive composite over a copy of the input. Returns the input
    /// unchanged when the stage cannot run.
    fn bloom<D: GlDriver>(
        &mut self,
        ctx: &mut GlContext<D>,
        shaders: &ShaderLibrary,
        blit: &ShaderProgram,
        input: FboView,
    ) -> FboView {
        let (filter, blur) = match (shaders.get(ShaderType::BloomFilter), shaders.get(ShaderType::Blur)) {
            (Some(filter), Some(blur)) => (filter, blur),
            _ => return input,
        };
        let (w, h) = (self.output_width, self.output_height);
        let (hw, hh) = ((w / 2).max(1), (h / 2).max(1));
        let ready = self.bloom_fbos.iter_mut().all(|fbo| stage_target(ctx, fbo, hw, hh, PostStage::BloomBlur))
            && stage_target(ctx, &mut self.composite_fbo, w, h, PostStage::BloomComposite);
        if !ready {
            return input;
        }

        let ping = self.bloom_fbos[0].view();
        let pong = self.bloom_fbos[1].view();

        begin_pass(ctx, filter, input, ping);
        ctx.uniform_1f(filter.uniform("threshold"), self.bloom_threshold);
        ctx.draw_quad(&FULLSCREEN_QUAD);
        self.stages_run.push(PostStage::BloomExtract);

        draw_blur(ctx, blur, ping, pong, [1.0, 0.0], [0.0; 4]);
        draw_blur(ctx, blur, pong, ping, [0.0, 1.0], [0.0; 4]);
        self.stages_run.push(PostStage::BloomBlur);

        let composite = self.composite_fbo.view();
        draw_blit(ctx, blit, input, composite, 1.0, 1.0);
        ctx.enable(Capability::Blend);
        ctx.blend_func(BlendFactor::One, BlendFactor::One);
        draw_blit(ctx, blit, ping, composite, 1.0, self.bloom_intensity);
        ctx.disable(Capability::Blend);
        self.stages_run.push(PostStage::BloomComposite);

        composite
    }

    /// Free every FBO and disable the chain.
    pub fn shutdown<D: GlDriver>(&mut self, ctx: &mut GlContext<D>) {
        self.scene_fbo.destroy(ctx);
        self.resolve_fbo.destroy(ctx);
        self.fxaa_fbo.destroy(ctx);
        for fbo in self.bloom_fbos.iter_mut() {
            fbo.destroy(ctx);
        }
        self.composite_fbo.destroy(ctx);
        self.blur_fbo.destroy(ctx);
        self.enabled = false;
        self.view_rect = None;
        self.stages_run.clear();
        vid_printf(PRINT_DEVELOPER, "post-processing shut down\n");
    }
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Size a stage's FBO. On failure the stage is reported and skipped.
fn stage_target<D: GlDriver>(ctx: &mut GlContext<D>, fbo: &mut Fbo, width: i32, height: i32, stage: PostStage) -> bool {
    match fbo.resize(ctx, width, height, true, ColorFormat::Rgba8) {
        Ok(()) => true,
        Err(err) => {
            vid_printf(PRINT_DEVELOPER, &format!("post-processing: skipping {}: {}\n", stage.name(), err));
            false
        }
    }
}

/// Full-screen quad sampling only `rect` of a `width` x `height` texture.
fn sub_quad(rect: [i32; 4], width: i32, height: i32) -> [QuadVertex; 4] {
    let (w, h) = (width.max(1) as f32, height.max(1) as f32);
    let s0 = rect[0] as f32 / w;
    let s1 = (rect[0] + rect[2]) as f32 / w;
    let t0 = rect[1] as f32 / h;
    let t1 = (rect[1] + rect[3]) as f32 / h;
    [
        QuadVertex::new(-1.0, -1.0, 0.0, s0, t0),
        QuadVertex::new(-1.0, 1.0, 0.0, s0, t1),
        QuadVertex::new(1.0, -1.0, 0.0, s1, t0),
        QuadVertex::new(1.0, 1.0, 0.0, s1, t1),
    ]
}

/// Bind `dst`, the program and `src`'s color texture on unit 0.
fn begin_pass<D: GlDriver>(ctx: &mut GlContext<D>, program: &ShaderProgram, src: FboView, dst: FboView) {
    ctx.bind_framebuffer(dst);
    ctx.fit_viewport(dst);
    program.bind(ctx);
    // unit 0 always exists
    let _ = ctx.mbind(0, src.texture);
}

fn draw_blit<D: GlDriver>(
    ctx: &mut GlContext<D>,
    blit: &ShaderProgram,
    src: FboView,
    dst: FboView,
    gamma: f32,
    intensity: f32,
) {
    begin_pass(ctx, blit, src, dst);
    ctx.uniform_1f(blit.uniform("gamma"), gamma);
    ctx.uniform_1f(blit.uniform("intensity"), intensity);
    ctx.draw_quad(&FULLSCREEN_QUAD);
}

fn draw_blur<D: GlDriver>(
    ctx: &mut GlContext<D>,
    blur: &ShaderProgram,
    src: FboView,
    dst: FboView,
    direction: [f32; 2],
    tint: [f32; 4],
) {
    begin_pass(ctx, blur, src, dst);
    ctx.uniform_2f(blur.uniform("texelSize"), 1.0 / src.width as f32, 1.0 / src.height as f32);
    ctx.uniform_2f(blur.uniform("direction"), direction[0], direction[1]);
    ctx.uniform_4f(blur.uniform("tint"), tint);
    ctx.draw_quad(&FULLSCREEN_QUAD);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{FramebufferId, HeadlessDriver, TextureId};
    use q2vr_common::files::FileSystem;

    fn setup() -> (GlContext<HeadlessDriver>, ShaderLibrary) {
        let mut ctx = GlContext::new(HeadlessDriver::new());
        ctx.set_default_state();
        let mut fs = FileSystem::new();
        fs.add_game_directory(env!("CARGO_MANIFEST_DIR"));
        let mut shaders = ShaderLibrary::new();
        assert!(shaders.init(&mut ctx, &|p: &str| fs.load_file(p)));
        (ctx, shaders)
    }

    fn window(width: i32, height: i32) -> FboView {
        Fbo::screen(width, height).view()
    }

    #[test]
    fn test_plain_chain_is_one_blit() {
        let (mut ctx, shaders) = setup();
        let mut post = PostProcessor::new();
        post.init(&mut ctx, 320, 240).unwrap();
        assert!(post.begin_scene(&mut ctx, None));
        let scene = post.scene_view();

        ctx.driver_mut().reset_counters();
        post.process(&mut ctx, &shaders, window(320, 240)).unwrap();
        assert_eq!(post.stages_run(), &[PostStage::FinalBlit]);

        let draws = &ctx.driver().counters.draws;
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].framebuffer, FramebufferId::NONE);
        assert_eq!(draws[0].texture, scene.texture);
        assert!(ctx.current_framebuffer().is_window());
    }

    #[test]
    fn test_supersampled_scene_and_resolve() {
        let (mut ctx, shaders) = setup();
        let mut post = PostProcessor::new();
        post.antialias = AntialiasMode::FxaaFss;
        post.init(&mut ctx, 320, 240).unwrap();
        assert_eq!((post.scene_view().width, post.scene_view().height), (640, 480));

        post.process(&mut ctx, &shaders, window(320, 240)).unwrap();
        assert_eq!(post.stages_run(), &[PostStage::Resolve, PostStage::Fxaa, PostStage::FinalBlit]);
        assert_eq!(ctx.driver().current_viewport(), [0, 0, 320, 240]);
    }

    #[test]
    fn test_full_chain_order() {
        let (mut ctx, shaders) = setup();
        let mut post = PostProcessor::new();
        post.antialias = AntialiasMode::Fxaa;
        post.bloom_enabled = true;
        post.blur_scale = 2.0;
        post.init(&mut ctx, 200, 100).unwrap();

        post.process(&mut ctx, &shaders, window(200, 100)).unwrap();
        assert_eq!(
            post.stages_run(),
            &[
                PostStage::Fxaa,
                PostStage::BloomExtract,
                PostStage::BloomBlur,
                PostStage::BloomComposite,
                PostStage::Blur,
                PostStage::FinalBlit,
            ]
        );

        // each stage samples what the previous one wrote
        let draws = &ctx.driver().counters.draws;
        for pair in draws.windows(2) {
            assert_ne!(pair[1].texture, TextureId::NONE);
        }
        // the additive composite is the only blended draw
        assert_eq!(draws.iter().filter(|d| d.blend).count(), 1);
        assert_eq!(ctx.is_enabled(Capability::Blend), Some(false));
        assert_eq!(ctx.is_enabled(Capability::DepthTest), Some(true));
    }

    #[test]
    fn test_disabled_effect_passes_through() {
        let (mut ctx, mut shaders) = setup();
        let mut fs = FileSystem::new();
        fs.add_game_directory(env!("CARGO_MANIFEST_DIR"));
        fs.add_memory_file("shaders/fxaa.frag", "void main() {");
        shaders.reload(&mut ctx, &|p: &str| fs.load_file(p));

        let mut post = PostProcessor::new();
        post.antialias = AntialiasMode::Fxaa;
        post.init(&mut ctx, 64, 64).unwrap();
        post.process(&mut ctx, &shaders, window(64, 64)).unwrap();
        assert_eq!(post.stages_run(), &[PostStage::FinalBlit]);
    }

    #[test]
    fn test_view_rect_scaled_and_blitted() {
        let (mut ctx, shaders) = setup();
        let mut post = PostProcessor::new();
        post.antialias = AntialiasMode::Ssaa4x;
        post.init(&mut ctx, 800, 600).unwrap();

        assert!(post.begin_scene(&mut ctx, Some([100, 250, 400, 300])));
        assert_eq!(ctx.viewport(), Some([200, 500, 800, 600]));
        assert_eq!(post.view_rect(), Some([100, 250, 400, 300]));

        ctx.driver_mut().reset_counters();
        post.process(&mut ctx, &shaders, window(800, 600)).unwrap();
        let last = ctx.driver().counters.draws.last().copied();
        assert_eq!(last.map(|d| (d.framebuffer, d.viewport)), Some((FramebufferId::NONE, [100, 250, 400, 300])));
        assert_eq!(ctx.viewport(), Some([100, 250, 400, 300]));

        // a rectangle covering the whole output is the plain path
        assert!(post.begin_scene(&mut ctx, Some([0, 0, 800, 600])));
        assert_eq!(post.view_rect(), None);
        assert_eq!(ctx.viewport(), Some([0, 0, 1600, 1200]));
    }

    #[test]
    fn test_sub_quad_samples_rect() {
        let quad = sub_quad([100, 150, 400, 300], 800, 600);
        assert_eq!(quad[0].texcoord, [0.125, 0.25]);
        assert_eq!(quad[3].texcoord, [0.625, 0.75]);
        assert_eq!(quad[3].position, FULLSCREEN_QUAD[3].position);
    }

    #[test]
    fn test_failed_stage_is_skipped() {
        let (mut ctx, shaders) = setup();
        let mut post = PostProcessor::new();
        post.bloom_enabled = true;
        post.init(&mut ctx, 128, 96).unwrap();
        let scene = post.scene_view();

        ctx.driver_mut().force_incomplete = true;
        ctx.driver_mut().reset_counters();
        post.process(&mut ctx, &shaders, window(128, 96)).unwrap();

        assert!(post.is_enabled());
        assert_eq!(post.stages_run(), &[PostStage::FinalBlit]);
        let draws = &ctx.driver().counters.draws;
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].framebuffer, FramebufferId::NONE);
        assert_eq!(draws[0].texture, scene.texture);
        assert_eq!(ctx.driver().live_framebuffers(), 1);
        assert!(ctx.current_framebuffer().is_window());
        assert_eq!(ctx.viewport(), Some([0, 0, 128, 96]));
    }

    #[test]
    fn test_caller_blend_func_restored() {
        let (mut ctx, shaders) = setup();
        let mut post = PostProcessor::new();
        post.bloom_enabled = true;
        post.init(&mut ctx, 64, 64).unwrap();

        ctx.enable(Capability::Blend);
        ctx.blend_func(BlendFactor::DstColor, BlendFactor::Zero);
        post.process(&mut ctx, &shaders, window(64, 64)).unwrap();
        assert!(post.stages_run().contains(&PostStage::BloomComposite));

        assert_eq!(ctx.blend_factors(), Some((BlendFactor::DstColor, BlendFactor::Zero)));
        assert_eq!(ctx.driver().current_blend_func(), (BlendFactor::DstColor, BlendFactor::Zero));
        assert_eq!(ctx.is_enabled(Capability::Blend), Some(true));
    }

    #[test]
    fn test_blur_tint_reaches_directional_blur_only() {
        let (mut ctx, shaders) = setup();
        let blur = shaders.get(ShaderType::Blur).map(|p| p.program).unwrap();
        let mut post = PostProcessor::new();
        post.bloom_enabled = true;
        post.blur_scale = 1.5;
        post.blur_tint = [0.8, 0.1, 0.1, 0.3];
        post.init(&mut ctx, 64, 64).unwrap();

        ctx.driver_mut().reset_counters();
        post.process(&mut ctx, &shaders, window(64, 64)).unwrap();
        let tints: Vec<[f32; 4]> =
            ctx.driver().counters.uniforms_4f.iter().filter(|u| u.0 == blur).map(|u| u.1).collect();
        // two bloom blur passes untinted, then the directional blur
        assert_eq!(tints, vec![[0.0; 4], [0.0; 4], [0.8, 0.1, 0.1, 0.3]]);
    }

    #[test]
    fn test_failed_init_leaves_nothing() {
        let mut ctx = GlContext::new(HeadlessDriver::new());
        ctx.driver_mut().force_incomplete = true;
        let mut post = PostProcessor::new();
        assert!(post.init(&mut ctx, 64, 64).is_err());
        assert!(!post.is_enabled());
        assert!(!post.begin_scene(&mut ctx, None));
        assert_eq!(ctx.driver().live_framebuffers(), 0);
    }

    #[test]
    fn test_shutdown_frees_every_fbo() {
        let (mut ctx, shaders) = setup();
        let mut post = PostProcessor::new();
        post.bloom_enabled = true;
        post.init(&mut ctx, 64, 64).unwrap();
        post.process(&mut ctx, &shaders, window(64, 64)).unwrap();
        assert!(ctx.driver().live_framebuffers() > 1);

        post.shutdown(&mut ctx);
        assert_eq!(ctx.driver().live_framebuffers(), 0);
        assert_eq!(ctx.driver().live_textures(), 0);
    }
}
