//! Anti-tile sampling: hide the periodicity of a repeated texture.
//!
//! Every integer cell of the tiled UV space gets a stable pseudo-random
//! 4-vector. Two components shift where the cell reads from the source
//! texture, the other two place a feature point inside the cell. A fragment
//! blends the samples of the 3x3 cells around it, weighted by a Gaussian of
//! its distance to each cell's feature point.
//!
//! Feature points stay within the middle half of their cell and the Gaussian
//! is windowed to [`CUTOFF_RADIUS`]. Cells outside the 3x3 neighbourhood are
//! then always beyond the window, which keeps the blend continuous across
//! cell borders, while the own cell's point is always inside it, which keeps
//! the total weight positive.
//!
//! [`WGSL`] is the GPU rendition of [`sample`]; both must stay in lockstep.

use cgmath::{InnerSpace, Vector2, Vector4};

use crate::data_structures::texture::CpuTexture;

pub const JITTER_MIN: f32 = 0.25;
pub const JITTER_SPAN: f32 = 0.5;
pub const FALLOFF: f32 = 5.0;
pub const CUTOFF_RADIUS: f32 = 1.2;

/// Hash function, `anti_tile_sample` and the `anti_tile` repeat uniform.
pub const WGSL: &str = include_str!("anti_tile.wgsl");

/// Stable per-cell hash, each component in `0.0..1.0`.
pub fn hash4(cell: Vector2<f32>) -> Vector4<f32> {
    let seeds = Vector4::new(
        1.0 + cell.dot(Vector2::new(37.0, 17.0)),
        2.0 + cell.dot(Vector2::new(11.0, 47.0)),
        3.0 + cell.dot(Vector2::new(41.0, 29.0)),
        4.0 + cell.dot(Vector2::new(23.0, 31.0)),
    );
    seeds.map(|s| fract(s.sin() * 103.0))
}

fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// Offsets of the 3x3 neighbourhood, row by row.
pub fn neighbourhood() -> impl Iterator<Item = Vector2<f32>> {
    (-1..=1).flat_map(|j| (-1..=1).map(move |i| Vector2::new(i as f32, j as f32)))
}

/// Blend weight of the neighbour at `offset` for a fragment at `frac` within
/// its cell, given that neighbour's hash.
pub fn weight(frac: Vector2<f32>, offset: Vector2<f32>, hash: Vector4<f32>) -> f32 {
    let jitter = Vector2::new(
        JITTER_MIN + JITTER_SPAN * hash.z,
        JITTER_MIN + JITTER_SPAN * hash.w,
    );
    let r = frac - (offset + jitter);
    let floor_weight = (-FALLOFF * CUTOFF_RADIUS * CUTOFF_RADIUS).exp();
    ((-FALLOFF * r.magnitude2()).exp() - floor_weight).max(0.0)
}

/// The nine blend weights for `tiled_uv`, in [`neighbourhood`] order.
pub fn weights(tiled_uv: Vector2<f32>) -> [f32; 9] {
    let cell = tiled_uv.map(f32::floor);
    let frac = tiled_uv - cell;
    let mut weights = [0.0; 9];
    for (slot, offset) in weights.iter_mut().zip(neighbourhood()) {
        *slot = weight(frac, offset, hash4(cell + offset));
    }
    weights
}

/// De-tiled colour of `texture` at `tiled_uv`.
///
/// `ddx` and `ddy` are the screen-space derivatives of `tiled_uv`; every
/// jittered lookup uses them so level-of-detail selection ignores the jitter.
pub fn sample(
    texture: &CpuTexture,
    tiled_uv: Vector2<f32>,
    ddx: Vector2<f32>,
    ddy: Vector2<f32>,
) -> Vector4<f32> {
    let cell = tiled_uv.map(f32::floor);
    let frac = tiled_uv - cell;
    let mut weighted_sum = Vector4::new(0.0, 0.0, 0.0, 0.0);
    let mut total_weight = 0.0;
    for offset in neighbourhood() {
        let hash = hash4(cell + offset);
        let w = weight(frac, offset, hash);
        if w == 0.0 {
            continue;
        }
        let jittered = tiled_uv + Vector2::new(hash.x, hash.y);
        weighted_sum += texture.sample_grad(jittered, ddx, ddy) * w;
        total_weight += w;
    }
    weighted_sum / total_weight
}
