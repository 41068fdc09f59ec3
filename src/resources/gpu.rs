//! wgpu resource backend.
//!
//! [`GpuBackend`] turns acquired resources into GPU objects: textures with
//! their mip chain and sampler, vertex/index buffers, and per-material
//! pipelines compiled from the material's (possibly patched) program. It also
//! draws a [`SceneGraph`] built from those handles.

use std::{collections::HashMap, ops::Range};

use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        material::MaterialDesc,
        mesh::Geometry,
        scene_graph::{NodeId, SceneGraph},
        texture::TextureData,
    },
    pipelines::basic::{camera_layout, material_layout, mk_material_pipeline},
    resources::{Handle, Resource, ResourceBackend, ResourceKind},
};

/// A GPU texture with its view and sampler.
#[derive(Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl GpuTexture {
    pub fn from_data(device: &wgpu::Device, queue: &wgpu::Queue, data: &TextureData) -> Self {
        let desc = &data.desc;
        let format = if desc.srgb {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&data.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: data.levels.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (mip_level, level) in data.levels.iter().enumerate() {
            let (width, height) = level.dimensions();
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &texture,
                    mip_level: mip_level as u32,
                    origin: wgpu::Origin3d::ZERO,
                },
                level,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * width),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&data.label),
            address_mode_u: desc.wrap,
            address_mode_v: desc.wrap,
            address_mode_w: desc.wrap,
            mag_filter: desc.filter,
            min_filter: desc.filter,
            mipmap_filter: if desc.has_mips() {
                wgpu::MipmapFilterMode::Linear
            } else {
                wgpu::MipmapFilterMode::Nearest
            },
            anisotropy_clamp: desc.anisotropy,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
        }
    }
}

#[derive(Debug)]
struct GpuGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    groups: Vec<Range<u32>>,
}

#[derive(Debug)]
struct GpuMaterial {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniforms: Vec<wgpu::Buffer>,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct MaterialUniform {
    base_color: [f32; 4],
    roughness: f32,
    metalness: f32,
    _padding: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
    camera_layout: wgpu::BindGroupLayout,
    textures: HashMap<Handle, GpuTexture>,
    geometries: HashMap<Handle, GpuGeometry>,
    materials: HashMap<Handle, GpuMaterial>,
    instances: HashMap<NodeId, wgpu::Buffer>,
}

impl GpuBackend {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        let camera_layout = camera_layout(&device);
        Self {
            device,
            queue,
            color_format,
            depth_format,
            camera_layout,
            textures: HashMap::new(),
            geometries: HashMap::new(),
            materials: HashMap::new(),
            instances: HashMap::new(),
        }
    }

    /// Layout of bind group 1, which the host fills with a [`CameraUniform`].
    pub fn camera_layout(&self) -> &wgpu::BindGroupLayout {
        &self.camera_layout
    }

    fn create_geometry(&self, label: String, geometry: &Geometry) -> GpuGeometry {
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Vertex Buffer")),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Index Buffer")),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        GpuGeometry {
            vertex_buffer,
            index_buffer,
            groups: geometry.groups.clone(),
        }
    }

    fn create_material(&self, desc: &MaterialDesc) -> anyhow::Result<GpuMaterial> {
        let Some(texture) = self.textures.get(&desc.texture) else {
            anyhow::bail!("material {} references a texture that was never uploaded", desc.label);
        };
        let layout = material_layout(&self.device, desc.anti_tile.is_some());
        let material_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Material Buffer", desc.label)),
            contents: bytemuck::cast_slice(&[MaterialUniform {
                base_color: desc.base_color,
                roughness: 1.0,
                metalness: 0.0,
                _padding: [0.0; 2],
            }]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let mut uniforms = vec![material_buffer];
        if let Some(anti_tile) = desc.anti_tile {
            uniforms.push(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Anti-tile Buffer", desc.label)),
                contents: bytemuck::cast_slice(&[anti_tile]),
                usage: wgpu::BufferUsages::UNIFORM,
            }));
        }

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            },
        ];
        for (offset, buffer) in uniforms.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + offset as u32,
                resource: buffer.as_entire_binding(),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &layout,
            entries: &entries,
            label: Some(&desc.label),
        });

        let pipeline = mk_material_pipeline(
            &self.device,
            self.color_format,
            self.depth_format,
            &layout,
            &self.camera_layout,
            &desc.label,
            &desc.shader,
            desc.side,
        );
        Ok(GpuMaterial {
            pipeline,
            bind_group,
            uniforms,
        })
    }

    /// Upload the transform of every mesh in `scene`. Call once per frame
    /// before [`GpuBackend::draw`].
    pub fn prepare(&mut self, scene: &SceneGraph) {
        let mut seen = Vec::with_capacity(scene.len());
        for (id, node) in scene.iter() {
            let raw = [node.transform.to_raw()];
            match self.instances.get(&id) {
                Some(buffer) => self.queue.write_buffer(buffer, 0, bytemuck::cast_slice(&raw)),
                None => {
                    let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} Instance Buffer", node.label)),
                        contents: bytemuck::cast_slice(&raw),
                        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    });
                    self.instances.insert(id, buffer);
                }
            }
            seen.push(id);
        }
        self.instances.retain(|id, buffer| {
            let keep = seen.contains(id);
            if !keep {
                buffer.destroy();
            }
            keep
        });
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, scene: &SceneGraph, camera: &wgpu::BindGroup) {
        pass.set_bind_group(1, camera, &[]);
        for (id, node) in scene.iter() {
            let (Some(geometry), Some(instance)) =
                (self.geometries.get(&node.geometry), self.instances.get(&id))
            else {
                log::warn!("mesh {} is not prepared for drawing", node.label);
                continue;
            };
            pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
            pass.set_vertex_buffer(1, instance.slice(..));
            pass.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            for (group, material) in geometry.groups.iter().zip(&node.materials) {
                let Some(material) = self.materials.get(material) else {
                    continue;
                };
                pass.set_pipeline(&material.pipeline);
                pass.set_bind_group(0, &material.bind_group, &[]);
                pass.draw_indexed(group.clone(), 0, 0..1);
            }
        }
    }
}

impl ResourceBackend for GpuBackend {
    fn create(&mut self, handle: Handle, resource: &Resource) -> anyhow::Result<()> {
        match resource {
            Resource::Texture(data) => {
                let texture = GpuTexture::from_data(&self.device, &self.queue, data);
                self.textures.insert(handle, texture);
            }
            Resource::Geometry(geometry) => {
                let geometry = self.create_geometry(format!("geometry {}", handle.id()), geometry);
                self.geometries.insert(handle, geometry);
            }
            Resource::Material(desc) => {
                let material = self.create_material(desc)?;
                self.materials.insert(handle, material);
            }
        }
        Ok(())
    }

    fn destroy(&mut self, handle: Handle) {
        match handle.kind() {
            ResourceKind::Texture => {
                if let Some(texture) = self.textures.remove(&handle) {
                    texture.texture.destroy();
                }
            }
            ResourceKind::Geometry => {
                if let Some(geometry) = self.geometries.remove(&handle) {
                    geometry.vertex_buffer.destroy();
                    geometry.index_buffer.destroy();
                }
            }
            ResourceKind::Material => {
                if let Some(material) = self.materials.remove(&handle) {
                    material.uniforms.iter().for_each(wgpu::Buffer::destroy);
                }
            }
        }
    }
}
