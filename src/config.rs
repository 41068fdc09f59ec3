//! Runtime tunables for the skybox and the tiled ground.
//!
//! A [`Config`] is handed to each owner at construction, the same way flows
//! receive their context. Values are validated once; owners never re-read them.

use std::ops::RangeInclusive;
use std::path::PathBuf;

use anyhow::bail;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Edge length of the sky cube. Fixed for the lifetime of a skybox.
    pub skybox_scale: f32,
    /// Initial Z offset of the sky cube relative to the camera.
    pub z_offset: f32,
    /// Bounds every Z offset update is clamped to.
    pub z_offset_range: RangeInclusive<f32>,
    /// How many times the ground texture repeats along each UV axis.
    pub ground_repeat: f32,
    /// Ground plane extent as (width, depth) in world units.
    pub ground_size: (f32, f32),
    /// Maximum anisotropic filtering level for ground textures.
    pub anisotropy: u16,
    /// Refuse to build a ground material when the shader patch does not apply.
    pub strict_shader_patch: bool,
    /// Root that relative asset names are resolved against.
    pub asset_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            skybox_scale: 1000.0,
            z_offset: 0.0,
            z_offset_range: -500.0..=500.0,
            ground_repeat: 8.0,
            ground_size: (40.0, 40.0),
            anisotropy: 16,
            strict_shader_patch: true,
            asset_root: PathBuf::from("./assets"),
        }
    }
}

impl Config {
    pub fn with_skybox_scale(mut self, scale: f32) -> Self {
        self.skybox_scale = scale;
        self
    }

    pub fn with_z_offset(mut self, z_offset: f32) -> Self {
        self.z_offset = z_offset;
        self
    }

    pub fn with_z_offset_range(mut self, range: RangeInclusive<f32>) -> Self {
        self.z_offset_range = range;
        self
    }

    pub fn with_ground_repeat(mut self, repeat: f32) -> Self {
        self.ground_repeat = repeat;
        self
    }

    pub fn with_ground_size(mut self, width: f32, depth: f32) -> Self {
        self.ground_size = (width, depth);
        self
    }

    pub fn with_anisotropy(mut self, anisotropy: u16) -> Self {
        self.anisotropy = anisotropy;
        self
    }

    pub fn with_strict_shader_patch(mut self, strict: bool) -> Self {
        self.strict_shader_patch = strict;
        self
    }

    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.skybox_scale.is_finite() && self.skybox_scale > 0.0) {
            bail!("skybox scale must be positive, got {}", self.skybox_scale);
        }
        if !(self.ground_repeat.is_finite() && self.ground_repeat > 0.0) {
            bail!("ground repeat must be positive, got {}", self.ground_repeat);
        }
        if self.z_offset_range.start() > self.z_offset_range.end() {
            bail!("Z offset range {:?} is inverted", self.z_offset_range);
        }
        if !self.z_offset_range.contains(&self.z_offset) {
            bail!(
                "initial Z offset {} lies outside {:?}",
                self.z_offset,
                self.z_offset_range
            );
        }
        let (width, depth) = self.ground_size;
        if width <= 0.0 || depth <= 0.0 {
            bail!("ground plane must have a positive extent, got {width} x {depth}");
        }
        if self.anisotropy == 0 {
            bail!("anisotropy must be at least 1");
        }
        Ok(())
    }
}
