//! Shader library
//!
//! Owns the water-warp family and the post-processing programs. A program
//! that fails to build leaves its effect disabled; the rest still load.

use std::collections::HashMap;

use q2vr_common::common::vid_printf;
use q2vr_common::q_shared::PRINT_ALL;

use super::program::{compile_from_files, ShaderDef, ShaderProgram};
use super::FileLoader;
use crate::driver::{GlDriver, ProgramId};
use crate::state::GlContext;

/// Programs used by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderType {
    /// Liquid surface distortion.
    Warp,
    /// Liquid distortion driven by simplex noise.
    SimplexWarp,
    /// Underwater caustics.
    Caustic,
    /// Textured quad blit with gamma; also the additive bloom composite.
    Blit,
    /// Fast approximate anti-aliasing.
    Fxaa,
    /// Separable / directional blur.
    Blur,
    /// Bloom bright-pass extraction.
    BloomFilter,
}

impl ShaderType {
    pub const ALL: [ShaderType; 7] = [
        ShaderType::Warp,
        ShaderType::SimplexWarp,
        ShaderType::Caustic,
        ShaderType::Blit,
        ShaderType::Fxaa,
        ShaderType::Blur,
        ShaderType::BloomFilter,
    ];

    pub fn def(self) -> &'static ShaderDef {
        match self {
            ShaderType::Warp => &WARP,
            ShaderType::SimplexWarp => &SIMPLEX_WARP,
            ShaderType::Caustic => &CAUSTIC,
            ShaderType::Blit => &BLIT,
            ShaderType::Fxaa => &FXAA,
            ShaderType::Blur => &BLUR,
            ShaderType::BloomFilter => &BLOOM_FILTER,
        }
    }

    pub fn is_postprocess(self) -> bool {
        matches!(self, ShaderType::Blit | ShaderType::Fxaa | ShaderType::Blur | ShaderType::BloomFilter)
    }
}

const QUAD_ATTRIBS: &[(u32, &str)] = &[(0, "inPosition"), (1, "inTexCoord")];

const WARP_UNIFORMS: &[&str] = &[
    "texImage",
    "texDistort",
    "rgbscale",
    "scale",
    "time",
    "displacement",
    "fogmodel",
    "fogColor",
    "fogDensity",
    "modelViewProj",
];

const WARP: ShaderDef = ShaderDef {
    name: "warp",
    vertex: "warp.vert",
    fragment: "warp.frag",
    attribs: QUAD_ATTRIBS,
    uniforms: WARP_UNIFORMS,
};

const SIMPLEX_WARP: ShaderDef = ShaderDef {
    name: "simplex_warp",
    vertex: "warp_simplex.vert",
    fragment: "warp.frag",
    attribs: QUAD_ATTRIBS,
    uniforms: WARP_UNIFORMS,
};

const CAUSTIC: ShaderDef = ShaderDef {
    name: "caustic",
    vertex: "caustic.vert",
    fragment: "warp.frag",
    attribs: QUAD_ATTRIBS,
    uniforms: WARP_UNIFORMS,
};

const BLIT: ShaderDef = ShaderDef {
    name: "blit",
    vertex: "blit.vert",
    fragment: "gamma.frag",
    attribs: QUAD_ATTRIBS,
    uniforms: &["texImage", "gamma", "intensity"],
};

const FXAA: ShaderDef = ShaderDef {
    name: "fxaa",
    vertex: "blit.vert",
    fragment: "fxaa.frag",
    attribs: QUAD_ATTRIBS,
    uniforms: &["texImage", "texelSize"],
};

const BLUR: ShaderDef = ShaderDef {
    name: "blur",
    vertex: "blit.vert",
    fragment: "blur.frag",
    attribs: QUAD_ATTRIBS,
    uniforms: &["texImage", "texelSize", "direction", "tint"],
};

const BLOOM_FILTER: ShaderDef = ShaderDef {
    name: "bloom_filter",
    vertex: "blit.vert",
    fragment: "bloom_filter.frag",
    attribs: QUAD_ATTRIBS,
    uniforms: &["texImage", "threshold"],
};

/// All renderer programs, keyed by type. Missing entries are disabled effects.
pub struct ShaderLibrary {
    programs: HashMap<ShaderType, ShaderProgram>,
    /// Bumped on every init so dependents can notice a reload.
    generation: u32,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self { programs: HashMap::new(), generation: 0 }
    }

    /// Build every program. Returns true when all of them linked.
    pub fn init<D: GlDriver>(&mut self, ctx: &mut GlContext<D>, loader: FileLoader<'_>) -> bool {
        vid_printf(PRINT_ALL, "...initializing shader support: ");
        self.generation += 1;

        let mut all = true;
        for ty in ShaderType::ALL {
            let def = ty.def();
            match compile_from_files(ctx, loader, def) {
                Ok(prog) => {
                    Self::bind_samplers(ctx, &prog);
                    self.programs.insert(ty, prog);
                }
                Err(err) => {
                    vid_printf(PRINT_ALL, &format!("\n{}: {} (effect disabled)", def.name, err));
                    all = false;
                }
            }
        }
        ctx.use_program(ProgramId::NONE);

        vid_printf(PRINT_ALL, if all { "success!\n" } else { "\nfailed!\n" });
        all
    }

    /// Sampler uniforms never change after link.
    fn bind_samplers<D: GlDriver>(ctx: &mut GlContext<D>, prog: &ShaderProgram) {
        prog.bind(ctx);
        ctx.uniform_1i(prog.uniform("texImage"), 0);
        ctx.uniform_1i(prog.uniform("texDistort"), 1);
    }

    pub fn get(&self, ty: ShaderType) -> Option<&ShaderProgram> {
        self.programs.get(&ty)
    }

    pub fn is_enabled(&self, ty: ShaderType) -> bool {
        self.programs.contains_key(&ty)
    }

    /// True when every post-processing program is available.
    pub fn postprocess_available(&self) -> bool {
        ShaderType::ALL.iter().filter(|t| t.is_postprocess()).all(|t| self.is_enabled(*t))
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Delete every program.
    pub fn shutdown<D: GlDriver>(&mut self, ctx: &mut GlContext<D>) {
        ctx.use_program(ProgramId::NONE);
        for (_, mut prog) in self.programs.drain() {
            prog.destroy(ctx);
        }
    }

    /// Tear everything down and build it again (r_reloadshaders). Effects
    /// whose program fails stay disabled; the reload itself always completes.
    pub fn reload<D: GlDriver>(&mut self, ctx: &mut GlContext<D>, loader: FileLoader<'_>) -> bool {
        self.shutdown(ctx);
        self.init(ctx, loader)
    }
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::new()
    }
}
