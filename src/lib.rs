//! flow-skytile
//!
//! Environment building blocks for flow-style wgpu scenes: a camera-locked
//! skybox loaded from six cubemap faces, and a ground plane whose repeated
//! texture is broken up by an anti-tile sampler patched into the standard
//! material program. Both components acquire every GPU resource through a
//! [`ResourceManager`](resources::ResourceManager) and load textures out of
//! band, applying the results on their next frame tick.
//!
//! High-level modules
//! - `config`: tunables handed to components at construction
//! - `control`: bounded scalar channels such as the skybox Z offset
//! - `data_structures`: geometry, materials, textures, transforms and the scene
//! - `error`: typed errors of loads, patches and resources
//! - `flow`: spawning loads and delivering their completions to the frame tick
//! - `pipelines`: shader programs, the anti-tile patch and material pipelines
//! - `resources`: resource lifecycle, texture loading and the wgpu backend
//! - `skybox`: the skybox tracker
//! - `surface`: the tileable ground surface
//!

pub mod config;
pub mod control;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod pipelines;
pub mod resources;
pub mod skybox;
pub mod surface;

pub use config::Config;
pub use skybox::{CubemapUrls, Skybox, SkyboxState};
pub use surface::TileableSurface;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use wgpu::*;
