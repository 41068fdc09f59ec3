//! Engine data structures: geometry, textures, transforms and the scene.
//!
//! - `instance` holds the world transform of a mesh node
//! - `material` describes how a mesh group is shaded
//! - `mesh` contains the sky cube and ground plane geometry
//! - `scene_graph` is the host-owned scene the owners add their meshes to
//! - `texture` contains decoded textures, their binding attributes and CPU sampling

pub mod instance;
pub mod material;
pub mod mesh;
pub mod scene_graph;
pub mod texture;
