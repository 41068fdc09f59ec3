//! Material descriptions handed to the resource backend.

use crate::{pipelines::patch::AntiTileUniform, resources::Handle};

/// Which faces of a mesh are drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Front,
    /// Only back faces, for meshes viewed from inside such as the sky cube.
    Back,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialDesc {
    pub label: String,
    /// Complete WGSL program with `vs_main` and `fs_main` entry points.
    pub shader: String,
    /// Base colour texture. Ownership moves to the material on acquisition.
    pub texture: Handle,
    pub base_color: [f32; 4],
    /// Present only on programs the anti-tile patch was applied to.
    pub anti_tile: Option<AntiTileUniform>,
    pub side: Side,
}
