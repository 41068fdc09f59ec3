//! Decoded textures and their sampling attributes.
//!
//! [`TextureDesc`] carries the attributes a texture is bound with (wrap, filter,
//! mip chain, anisotropy). [`TextureData`] pairs it with the decoded mip chain,
//! which the GPU backend uploads as-is and [`CpuTexture`] samples on the CPU.

use cgmath::{InnerSpace, Vector2, Vector4};
use image::{RgbaImage, imageops::FilterType};

/// How a texture is bound for sampling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub wrap: wgpu::AddressMode,
    pub filter: wgpu::FilterMode,
    pub mip_levels: u32,
    pub anisotropy: u16,
    pub srgb: bool,
}

impl TextureDesc {
    /// Repeating, trilinear, fully mipmapped colour texture for tiled surfaces.
    ///
    /// Anisotropic filtering needs a mip chain, so a single-level texture
    /// gets none.
    pub fn tiling(width: u32, height: u32, anisotropy: u16) -> Self {
        let mip_levels = full_mip_count(width, height);
        Self {
            width,
            height,
            wrap: wgpu::AddressMode::Repeat,
            filter: wgpu::FilterMode::Linear,
            mip_levels,
            anisotropy: if mip_levels > 1 { anisotropy.max(1) } else { 1 },
            srgb: true,
        }
    }

    /// Clamped, single-level colour texture for one sky cube face.
    pub fn sky_face(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            wrap: wgpu::AddressMode::ClampToEdge,
            filter: wgpu::FilterMode::Linear,
            mip_levels: 1,
            anisotropy: 1,
            srgb: true,
        }
    }

    pub fn has_mips(&self) -> bool {
        self.mip_levels > 1
    }
}

/// Number of levels in a complete mip chain down to 1x1.
pub fn full_mip_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// A decoded image ready to be bound, level 0 first.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub label: String,
    pub desc: TextureDesc,
    pub levels: Vec<RgbaImage>,
}

impl TextureData {
    pub fn new(label: &str, desc: TextureDesc, image: RgbaImage) -> Self {
        let levels = mip_chain(image, desc.mip_levels);
        Self {
            label: label.to_string(),
            desc,
            levels,
        }
    }
}

/// Box-filtered mip chain, halving each level until `count` levels exist.
pub fn mip_chain(base: RgbaImage, count: u32) -> Vec<RgbaImage> {
    let mut levels = vec![base];
    while (levels.len() as u32) < count {
        let Some(last) = levels.last() else { break };
        let width = (last.width() / 2).max(1);
        let height = (last.height() / 2).max(1);
        if width == last.width() && height == last.height() {
            break;
        }
        let next = image::imageops::resize(last, width, height, FilterType::Triangle);
        levels.push(next);
    }
    levels
}

/// A texture sampled on the CPU with the same addressing the GPU applies.
///
/// Colours are normalized to `0.0..=1.0` per channel without colour-space
/// conversion.
#[derive(Clone, Debug)]
pub struct CpuTexture {
    wrap: wgpu::AddressMode,
    filter: wgpu::FilterMode,
    levels: Vec<Level>,
}

#[derive(Clone, Debug)]
struct Level {
    width: u32,
    height: u32,
    texels: Vec<Vector4<f32>>,
}

impl Level {
    fn from_image(image: &RgbaImage) -> Self {
        let texels = image
            .pixels()
            .map(|p| {
                Vector4::new(
                    p[0] as f32 / 255.0,
                    p[1] as f32 / 255.0,
                    p[2] as f32 / 255.0,
                    p[3] as f32 / 255.0,
                )
            })
            .collect();
        Self {
            width: image.width(),
            height: image.height(),
            texels,
        }
    }
}

impl CpuTexture {
    pub fn from_data(data: &TextureData) -> Self {
        Self {
            wrap: data.desc.wrap,
            filter: data.desc.filter,
            levels: data.levels.iter().map(Level::from_image).collect(),
        }
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Sample with explicit screen-space derivatives of `uv`, selecting the
    /// level of detail the way a GPU's gradient sample does.
    pub fn sample_grad(
        &self,
        uv: Vector2<f32>,
        ddx: Vector2<f32>,
        ddy: Vector2<f32>,
    ) -> Vector4<f32> {
        let Some(base) = self.levels.first() else {
            return Vector4::new(0.0, 0.0, 0.0, 0.0);
        };
        let size = Vector2::new(base.width as f32, base.height as f32);
        let footprint = Vector2::new(ddx.x * size.x, ddx.y * size.y)
            .magnitude()
            .max(Vector2::new(ddy.x * size.x, ddy.y * size.y).magnitude());
        let max_lod = (self.levels.len() - 1) as f32;
        let lod = if footprint > 0.0 {
            footprint.log2().clamp(0.0, max_lod)
        } else {
            0.0
        };
        let lower = lod.floor() as usize;
        let upper = (lower + 1).min(self.levels.len() - 1);
        let t = lod - lower as f32;
        let a = self.sample_level(lower, uv);
        if t == 0.0 || upper == lower {
            return a;
        }
        let b = self.sample_level(upper, uv);
        a + (b - a) * t
    }

    fn sample_level(&self, level: usize, uv: Vector2<f32>) -> Vector4<f32> {
        let level = &self.levels[level];
        let x = uv.x * level.width as f32 - 0.5;
        let y = uv.y * level.height as f32 - 0.5;
        match self.filter {
            wgpu::FilterMode::Nearest => self.texel(level, x.round() as i64, y.round() as i64),
            wgpu::FilterMode::Linear => {
                let x0 = x.floor();
                let y0 = y.floor();
                let fx = x - x0;
                let fy = y - y0;
                let (x0, y0) = (x0 as i64, y0 as i64);
                let top = self.texel(level, x0, y0) * (1.0 - fx) + self.texel(level, x0 + 1, y0) * fx;
                let bottom =
                    self.texel(level, x0, y0 + 1) * (1.0 - fx) + self.texel(level, x0 + 1, y0 + 1) * fx;
                top * (1.0 - fy) + bottom * fy
            }
        }
    }

    fn texel(&self, level: &Level, x: i64, y: i64) -> Vector4<f32> {
        let x = address(self.wrap, x, level.width as i64);
        let y = address(self.wrap, y, level.height as i64);
        level.texels[(y * level.width as i64 + x) as usize]
    }
}

fn address(mode: wgpu::AddressMode, coord: i64, size: i64) -> i64 {
    match mode {
        wgpu::AddressMode::Repeat => coord.rem_euclid(size),
        wgpu::AddressMode::MirrorRepeat => {
            let period = coord.rem_euclid(2 * size);
            if period < size { period } else { 2 * size - 1 - period }
        }
        // border colours are not modelled, clamp instead
        wgpu::AddressMode::ClampToEdge | wgpu::AddressMode::ClampToBorder => coord.clamp(0, size - 1),
    }
}
