//! Shader patch injection.
//!
//! A base WGSL program is extended by [`ShaderNode`]s. Each node declares the
//! [`Splice`]s it needs: an anchor that must occur exactly once in the program
//! and an edit relative to it. Composition is all-or-nothing: if any anchor is
//! missing or ambiguous the program is left untouched and the reason is
//! returned as a [`PatchError`].
//!
//! [`AntiTileNode`] routes the diffuse lookup of [`STANDARD_SHADER`] through
//! the anti-tile sampler.

use std::borrow::Cow;

use crate::{error::PatchError, pipelines::anti_tile};

/// The standard lit material program patched by [`patch`].
pub const STANDARD_SHADER: &str = include_str!("standard_shader.wgsl");

/// Replacement for the plain diffuse lookup in patched programs.
pub const PATCHED_DIFFUSE: &str = "diffuse_color *= anti_tile_sample(t_diffuse, s_diffuse, in.tiled_uv * anti_tile.repeat, dpdx(in.tiled_uv * anti_tile.repeat), dpdy(in.tiled_uv * anti_tile.repeat));";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpliceOp {
    InsertBefore,
    InsertAfter,
    Replace,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Splice {
    /// Short name reported when the anchor cannot be resolved.
    pub name: &'static str,
    pub anchor: &'static str,
    pub op: SpliceOp,
    pub snippet: Cow<'static, str>,
}

/// A pluggable unit of shader code.
pub trait ShaderNode {
    fn splices(&self) -> Vec<Splice>;
}

/// Uniform block the patched program reads the repeat factor from.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AntiTileUniform {
    pub repeat: f32,
    _padding: [f32; 3],
}

impl AntiTileUniform {
    pub fn new(repeat: f32) -> Self {
        Self {
            repeat,
            _padding: [0.0; 3],
        }
    }
}

/// Routes [`STANDARD_SHADER`]'s diffuse map through the anti-tile sampler.
#[derive(Clone, Copy, Debug, Default)]
pub struct AntiTileNode;

impl ShaderNode for AntiTileNode {
    fn splices(&self) -> Vec<Splice> {
        vec![
            Splice {
                name: "vertex_output",
                anchor: "@location(1) world_normal: vec3<f32>,",
                op: SpliceOp::InsertAfter,
                snippet: "\n    @location(2) tiled_uv: vec2<f32>,".into(),
            },
            Splice {
                name: "vertex_uv",
                anchor: "out.tex_coords = model.tex_coords;",
                op: SpliceOp::InsertAfter,
                snippet: "\n    out.tiled_uv = model.tex_coords;".into(),
            },
            Splice {
                name: "fragment_extension",
                anchor: "@fragment",
                op: SpliceOp::InsertBefore,
                snippet: anti_tile::WGSL.into(),
            },
            Splice {
                name: "diffuse_map",
                anchor: "diffuse_color *= textureSample(t_diffuse, s_diffuse, in.tex_coords);",
                op: SpliceOp::Replace,
                snippet: PATCHED_DIFFUSE.into(),
            },
        ]
    }
}

/// Apply every node's splices to `base`, in order.
///
/// Anchors of one node are resolved against the program as left by the
/// previous nodes. On error nothing is applied.
pub fn compose(base: &str, nodes: &[&dyn ShaderNode]) -> Result<String, PatchError> {
    let mut source = base.to_string();
    for node in nodes {
        source = apply(&source, &node.splices())?;
    }
    Ok(source)
}

fn apply(source: &str, splices: &[Splice]) -> Result<String, PatchError> {
    let mut edits = Vec::with_capacity(splices.len());
    for splice in splices {
        let count = source.matches(splice.anchor).count();
        match count {
            0 => return Err(PatchError::AnchorNotFound { anchor: splice.name }),
            1 => {}
            count => {
                return Err(PatchError::AmbiguousAnchor {
                    anchor: splice.name,
                    count,
                });
            }
        }
        if let Some(at) = source.find(splice.anchor) {
            edits.push((at, splice));
        }
    }
    // back to front so earlier offsets stay valid
    edits.sort_by(|a, b| b.0.cmp(&a.0));
    let mut patched = source.to_string();
    for (at, splice) in edits {
        let end = at + splice.anchor.len();
        match splice.op {
            SpliceOp::InsertBefore => patched.insert_str(at, &splice.snippet),
            SpliceOp::InsertAfter => patched.insert_str(end, &splice.snippet),
            SpliceOp::Replace => patched.replace_range(at..end, &splice.snippet),
        }
    }
    Ok(patched)
}

/// A program with the anti-tile sampler composed in.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchedProgram {
    pub source: String,
    pub uniform: AntiTileUniform,
}

/// Result of [`patch`]. `NotApplied` carries the base program unchanged.
#[derive(Clone, Debug, PartialEq)]
pub enum PatchOutcome {
    Applied(PatchedProgram),
    NotApplied { source: String, error: PatchError },
}

impl PatchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, PatchOutcome::Applied(_))
    }

    pub fn source(&self) -> &str {
        match self {
            PatchOutcome::Applied(program) => &program.source,
            PatchOutcome::NotApplied { source, .. } => source,
        }
    }

    pub fn into_result(self) -> Result<PatchedProgram, PatchError> {
        match self {
            PatchOutcome::Applied(program) => Ok(program),
            PatchOutcome::NotApplied { error, .. } => Err(error),
        }
    }
}

/// Compose the anti-tile sampler into `base`, sampling at `uv * repeat`.
pub fn patch(base: &str, repeat: f32) -> PatchOutcome {
    if !(repeat.is_finite() && repeat > 0.0) {
        return PatchOutcome::NotApplied {
            source: base.to_string(),
            error: PatchError::InvalidRepeat(repeat),
        };
    }
    match compose(base, &[&AntiTileNode]) {
        Ok(source) => PatchOutcome::Applied(PatchedProgram {
            source,
            uniform: AntiTileUniform::new(repeat),
        }),
        Err(error) => PatchOutcome::NotApplied {
            source: base.to_string(),
            error,
        },
    }
}
