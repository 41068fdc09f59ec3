//! Typed errors surfaced by the skybox, the ground surface and the shader injector.
//!
//! Loader and backend plumbing keeps using `anyhow`; these enums exist where a
//! caller needs to match on what went wrong.

use thiserror::Error;

use crate::skybox::Face;

/// The injector could not compose the anti-tile sampler into a base program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatchError {
    #[error("anchor `{anchor}` not found in base shader")]
    AnchorNotFound { anchor: &'static str },
    #[error("anchor `{anchor}` occurs {count} times in base shader, expected exactly one")]
    AmbiguousAnchor { anchor: &'static str, count: usize },
    #[error("repeat factor must be finite and positive, got {0}")]
    InvalidRepeat(f32),
}

/// A texture fetch or decode failed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("skybox face {face:?} ({url}) failed to load: {reason}")]
    Face {
        face: Face,
        url: String,
        reason: anyhow::Error,
    },
    #[error("ground texture {url} failed to load: {reason}")]
    Ground { url: String, reason: anyhow::Error },
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource handle {0} is not tracked by this manager")]
    UnknownHandle(u64),
    #[error("texture {texture} already belongs to material {material}")]
    AlreadyAdopted { texture: u64, material: u64 },
    #[error("backend failed to create resource: {0}")]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum SkyboxError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("could not build skybox resources: {0}")]
    Resources(#[from] ResourceError),
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("anti-tile patch not applied: {0}")]
    Patch(#[from] PatchError),
    #[error("could not build ground resources: {0}")]
    Resources(#[from] ResourceError),
}
