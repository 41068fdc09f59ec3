//! Tiled ground plane.
//!
//! A [`TileableSurface`] is a flat plane whose material repeats its texture
//! [`Config::ground_repeat`] times per axis through the anti-tile sampler.
//! Selecting a texture loads it out of band; the next frame tick builds a new
//! material from it and swaps it in, releasing the previous material and its
//! texture.
//!
//! Only the most recent selection is ever applied. An older load that
//! finishes late is dropped.

use image::DynamicImage;

use crate::{
    config::Config,
    data_structures::{
        instance::Instance,
        material::{MaterialDesc, Side},
        mesh::Geometry,
        scene_graph::{MeshNode, NodeId, Scene},
        texture::{TextureData, TextureDesc},
    },
    error::{LoadError, SurfaceError},
    flow::{Completions, Liveness, Spawner},
    pipelines::patch::{PatchOutcome, STANDARD_SHADER, patch},
    resources::{Handle, OwnerId, Resource, ResourceBackend, ResourceManager, texture::TextureLoader},
};

#[derive(Debug)]
struct TextureCompletion {
    generation: u64,
    url: String,
    result: anyhow::Result<DynamicImage>,
}

/// The material currently on the plane.
#[derive(Clone, Debug, PartialEq)]
pub struct TiledMaterial {
    pub material: Handle,
    pub texture: Handle,
    pub url: String,
    /// Whether the anti-tile patch was applied to the material's program.
    pub patched: bool,
}

#[derive(Debug)]
pub struct TileableSurface {
    owner: OwnerId,
    repeat: f32,
    anisotropy: u16,
    strict: bool,
    base_shader: String,
    geometry: Option<Handle>,
    node: Option<NodeId>,
    current: Option<TiledMaterial>,
    generation: u64,
    liveness: Liveness,
    completions: Completions<TextureCompletion>,
}

impl TileableSurface {
    /// Create the plane geometry. The mesh joins the scene once the first
    /// texture has been applied.
    pub fn mount<B: ResourceBackend>(config: &Config, resources: &mut ResourceManager<B>) -> anyhow::Result<Self> {
        Self::mount_with_shader(config, STANDARD_SHADER, resources)
    }

    /// Like [`TileableSurface::mount`], patching `base_shader` instead of the
    /// standard material program.
    pub fn mount_with_shader<B: ResourceBackend>(
        config: &Config,
        base_shader: &str,
        resources: &mut ResourceManager<B>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let owner = resources.register_owner("ground");
        let (width, depth) = config.ground_size;
        let geometry = resources.acquire(owner, Resource::Geometry(Geometry::plane(width, depth)))?;
        Ok(Self {
            owner,
            repeat: config.ground_repeat,
            anisotropy: config.anisotropy,
            strict: config.strict_shader_patch,
            base_shader: base_shader.to_string(),
            geometry: Some(geometry),
            node: None,
            current: None,
            generation: 0,
            liveness: Liveness::new(),
            completions: Completions::new(),
        })
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn material(&self) -> Option<&TiledMaterial> {
        self.current.as_ref()
    }

    pub fn patch_applied(&self) -> bool {
        self.current.as_ref().is_some_and(|current| current.patched)
    }

    pub fn is_mounted(&self) -> bool {
        self.geometry.is_some()
    }

    /// Start loading `url` as the new ground texture. Supersedes any load
    /// still in flight.
    pub fn select_texture(&mut self, url: &str, loader: &dyn TextureLoader, spawner: &dyn Spawner) {
        if !self.is_mounted() {
            log::warn!("ignoring texture {url} for an unmounted ground");
            return;
        }
        self.liveness.revoke();
        self.liveness = Liveness::new();
        self.generation += 1;

        let load = loader.load(url);
        let sender = self.completions.sender(&self.liveness);
        let generation = self.generation;
        let url = url.to_string();
        spawner.spawn(Box::pin(async move {
            let result = load.await;
            sender.send(TextureCompletion {
                generation,
                url,
                result,
            });
        }));
    }

    /// Frame tick: apply the latest finished texture load, if any.
    pub fn on_frame<B: ResourceBackend>(
        &mut self,
        scene: &mut dyn Scene,
        resources: &mut ResourceManager<B>,
    ) -> Result<(), SurfaceError> {
        let mut outcome = Ok(());
        for completion in self.completions.drain() {
            if completion.generation != self.generation || !self.is_mounted() {
                log::warn!("dropping superseded ground texture {}", completion.url);
                continue;
            }
            let image = match completion.result {
                Ok(image) => image,
                Err(reason) => {
                    log::error!("ground texture {} failed: {reason:#}", completion.url);
                    outcome = Err(LoadError::Ground {
                        url: completion.url,
                        reason,
                    }
                    .into());
                    continue;
                }
            };
            match self.build_material(&completion.url, image, resources) {
                Ok(material) => self.swap_material(material, scene, resources),
                Err(e) => {
                    log::error!("ground material for {} not built: {e}", completion.url);
                    outcome = Err(e);
                }
            }
        }
        outcome
    }

    fn build_material<B: ResourceBackend>(
        &self,
        url: &str,
        image: DynamicImage,
        resources: &mut ResourceManager<B>,
    ) -> Result<TiledMaterial, SurfaceError> {
        let rgba = image.to_rgba8();
        let desc = TextureDesc::tiling(rgba.width(), rgba.height(), self.anisotropy);
        let texture = resources.acquire(self.owner, Resource::Texture(TextureData::new(url, desc, rgba)))?;

        let (shader, anti_tile) = match patch(&self.base_shader, self.repeat) {
            PatchOutcome::Applied(program) => (program.source, Some(program.uniform)),
            PatchOutcome::NotApplied { error, .. } if self.strict => {
                resources.release(texture);
                return Err(error.into());
            }
            PatchOutcome::NotApplied { source, error } => {
                log::warn!("ground {url} drawn without anti-tiling: {error}");
                (source, None)
            }
        };
        let patched = anti_tile.is_some();

        let material = resources.acquire(
            self.owner,
            Resource::Material(MaterialDesc {
                label: format!("ground {url}"),
                shader,
                texture,
                base_color: [1.0; 4],
                anti_tile,
                side: Side::Front,
            }),
        );
        let material = match material {
            Ok(material) => material,
            Err(e) => {
                resources.release(texture);
                return Err(e.into());
            }
        };
        Ok(TiledMaterial {
            material,
            texture,
            url: url.to_string(),
            patched,
        })
    }

    fn swap_material<B: ResourceBackend>(
        &mut self,
        material: TiledMaterial,
        scene: &mut dyn Scene,
        resources: &mut ResourceManager<B>,
    ) {
        let handle = material.material;
        match (self.node, self.geometry) {
            (Some(node), _) => {
                scene.set_materials(node, vec![handle]);
            }
            (None, Some(geometry)) => {
                self.node = Some(scene.add_mesh(MeshNode {
                    label: "ground".to_string(),
                    geometry,
                    materials: vec![handle],
                    transform: Instance::new(),
                }));
            }
            (None, None) => {}
        }
        log::info!("ground texture {} applied", material.url);
        if let Some(previous) = self.current.replace(material) {
            resources.release(previous.material);
        }
    }

    /// Tear down: the pending load is revoked, the mesh leaves the scene and
    /// every resource the ground acquired is released. Idempotent.
    pub fn unmount<B: ResourceBackend>(&mut self, scene: &mut dyn Scene, resources: &mut ResourceManager<B>) {
        if !self.is_mounted() {
            return;
        }
        self.liveness.revoke();
        if let Some(node) = self.node.take() {
            scene.remove_mesh(node);
        }
        self.current = None;
        self.geometry = None;
        resources.release_owner(self.owner);
        self.completions.drain();
    }
}
