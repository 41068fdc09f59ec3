//! Shader programs and the render pipelines built from them.
//!
//! - `anti_tile` is the anti-tile sampler, as WGSL and as a CPU reference
//! - `basic` builds bind group layouts and material pipelines
//! - `patch` composes the anti-tile sampler into a base program

pub mod anti_tile;
pub mod basic;
pub mod patch;
