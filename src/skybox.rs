//! Camera-locked skybox.
//!
//! A [`Skybox`] owns a unit cube scaled by [`Config::skybox_scale`] with one
//! textured material per face. Its lifecycle:
//!
//! ```text
//! Loading --all six faces loaded--> Ready
//! Loading --unmount / new URLs----> Disposed
//! Ready   --unmount / new URLs----> Disposed
//! Disposed --new URLs-------------> Loading
//! ```
//!
//! The six face loads complete in any order. The mesh is added to the scene
//! only once all six succeeded; a single failure keeps the skybox in
//! `Loading` for good and is reported once. While `Ready`, every frame tick
//! moves the cube to the camera position shifted by the Z offset. Rotation
//! and scale never change after construction.

use cgmath::{Point3, Vector3};
use image::DynamicImage;

use crate::{
    config::Config,
    control::{ScalarControl, ScalarReceiver, scalar_channel},
    data_structures::{
        instance::Instance,
        material::{MaterialDesc, Side},
        mesh::Geometry,
        scene_graph::{MeshNode, NodeId, Scene},
        texture::{TextureData, TextureDesc},
    },
    error::{LoadError, ResourceError, SkyboxError},
    flow::{Completions, Liveness, Spawner},
    resources::{Handle, OwnerId, Resource, ResourceBackend, ResourceManager, texture::TextureLoader},
};

/// Program every sky face is drawn with.
pub const SKY_SHADER: &str = include_str!("pipelines/sky_shader.wgsl");

/// Cube faces in binding order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::PosX,
        Face::NegX,
        Face::PosY,
        Face::NegY,
        Face::PosZ,
        Face::NegZ,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn file_stem(self) -> &'static str {
        match self {
            Face::PosX => "posx",
            Face::NegX => "negx",
            Face::PosY => "posy",
            Face::NegY => "negy",
            Face::PosZ => "posz",
            Face::NegZ => "negz",
        }
    }
}

/// The six face URLs of one cubemap, in [`Face::ALL`] order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CubemapUrls([String; 6]);

impl CubemapUrls {
    pub fn new(urls: [String; 6]) -> Self {
        Self(urls)
    }

    /// `{root}/{name}/posx.jpg` through `{root}/{name}/negz.jpg`.
    pub fn from_name(root: &str, name: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self(Face::ALL.map(|face| format!("{root}/{name}/{}.jpg", face.file_stem())))
    }

    pub fn get(&self, face: Face) -> &str {
        &self.0[face.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Face, &str)> {
        Face::ALL.into_iter().map(move |face| (face, self.get(face)))
    }
}

/// Outcome of feeding one face result into a [`FaceBarrier`].
#[derive(Debug)]
pub enum BarrierStep {
    /// Still waiting for other faces.
    Pending,
    /// All six faces arrived; images in [`Face::ALL`] order.
    Complete(Box<[DynamicImage; 6]>),
    /// The first failure. Reported exactly once per barrier.
    Failed(anyhow::Error),
    /// The barrier already failed or completed; the result was dropped.
    Ignored,
}

/// All-or-nothing join of the six face loads.
#[derive(Debug, Default)]
pub struct FaceBarrier {
    slots: [Option<DynamicImage>; 6],
    settled: bool,
}

impl FaceBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arrived(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn record(&mut self, face: Face, result: anyhow::Result<DynamicImage>) -> BarrierStep {
        if self.settled {
            return BarrierStep::Ignored;
        }
        match result {
            Err(e) => {
                self.settled = true;
                self.slots = Default::default();
                BarrierStep::Failed(e)
            }
            Ok(image) => {
                self.slots[face.index()] = Some(image);
                if self.slots.iter().any(Option::is_none) {
                    return BarrierStep::Pending;
                }
                self.settled = true;
                match std::mem::take(&mut self.slots) {
                    [Some(px), Some(nx), Some(py), Some(ny), Some(pz), Some(nz)] => {
                        BarrierStep::Complete(Box::new([px, nx, py, ny, pz, nz]))
                    }
                    _ => BarrierStep::Ignored,
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkyboxState {
    Loading,
    Ready,
    Disposed,
}

#[derive(Debug)]
struct FaceCompletion {
    generation: u64,
    face: Face,
    result: anyhow::Result<DynamicImage>,
}

#[derive(Debug)]
pub struct Skybox {
    owner: OwnerId,
    scale: f32,
    z_offset: ScalarReceiver,
    urls: Option<CubemapUrls>,
    state: SkyboxState,
    load_failed: bool,
    generation: u64,
    liveness: Liveness,
    completions: Completions<FaceCompletion>,
    barrier: FaceBarrier,
    node: Option<NodeId>,
}

impl Skybox {
    /// Create the skybox and start loading `urls`.
    ///
    /// Returns the control that tunes the Z offset within
    /// [`Config::z_offset_range`].
    pub fn mount<B: ResourceBackend>(
        config: &Config,
        urls: CubemapUrls,
        loader: &dyn TextureLoader,
        spawner: &dyn Spawner,
        resources: &mut ResourceManager<B>,
    ) -> anyhow::Result<(Self, ScalarControl)> {
        config.validate()?;
        let (control, z_offset) = scalar_channel(config.z_offset, config.z_offset_range.clone());
        let mut skybox = Self {
            owner: resources.register_owner("skybox"),
            scale: config.skybox_scale,
            z_offset,
            urls: None,
            state: SkyboxState::Disposed,
            load_failed: false,
            generation: 0,
            liveness: Liveness::new(),
            completions: Completions::new(),
            barrier: FaceBarrier::new(),
            node: None,
        };
        skybox.start_loading(urls, loader, spawner);
        Ok((skybox, control))
    }

    pub fn state(&self) -> SkyboxState {
        self.state
    }

    /// Whether the current `Loading` instance saw a face fail.
    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn z_offset(&self) -> f32 {
        self.z_offset.value()
    }

    pub fn urls(&self) -> Option<&CubemapUrls> {
        self.urls.as_ref()
    }

    /// Switch to another cubemap. The same URL set on a live skybox is a
    /// no-op; anything else disposes the current instance and starts a fresh
    /// `Loading` one.
    pub fn set_urls<B: ResourceBackend>(
        &mut self,
        urls: CubemapUrls,
        loader: &dyn TextureLoader,
        spawner: &dyn Spawner,
        scene: &mut dyn Scene,
        resources: &mut ResourceManager<B>,
    ) {
        if self.state != SkyboxState::Disposed && self.urls.as_ref() == Some(&urls) {
            return;
        }
        self.dispose(scene, resources);
        self.start_loading(urls, loader, spawner);
    }

    /// Tear down: in-flight loads are revoked, the mesh leaves the scene and
    /// every resource is released.
    pub fn unmount<B: ResourceBackend>(&mut self, scene: &mut dyn Scene, resources: &mut ResourceManager<B>) {
        self.dispose(scene, resources);
    }

    fn start_loading(&mut self, urls: CubemapUrls, loader: &dyn TextureLoader, spawner: &dyn Spawner) {
        self.generation += 1;
        self.liveness = Liveness::new();
        self.barrier = FaceBarrier::new();
        self.load_failed = false;
        self.state = SkyboxState::Loading;
        for (face, url) in urls.iter() {
            let load = loader.load(url);
            let sender = self.completions.sender(&self.liveness);
            let generation = self.generation;
            spawner.spawn(Box::pin(async move {
                let result = load.await;
                sender.send(FaceCompletion {
                    generation,
                    face,
                    result,
                });
            }));
        }
        self.urls = Some(urls);
    }

    fn dispose<B: ResourceBackend>(&mut self, scene: &mut dyn Scene, resources: &mut ResourceManager<B>) {
        if self.state == SkyboxState::Disposed {
            return;
        }
        self.liveness.revoke();
        if let Some(node) = self.node.take() {
            scene.remove_mesh(node);
        }
        resources.release_owner(self.owner);
        self.completions.drain();
        self.barrier = FaceBarrier::new();
        self.state = SkyboxState::Disposed;
    }

    /// Frame tick: apply pending Z offset updates and load completions, then
    /// track `camera`.
    ///
    /// Returns an error once when the current load fails or its resources
    /// cannot be created.
    pub fn on_frame<B: ResourceBackend>(
        &mut self,
        camera: Point3<f32>,
        scene: &mut dyn Scene,
        resources: &mut ResourceManager<B>,
    ) -> Result<(), SkyboxError> {
        let z_offset = self.z_offset.poll_latest();
        let mut outcome = Ok(());
        for completion in self.completions.drain() {
            if completion.generation != self.generation || self.state != SkyboxState::Loading {
                log::warn!("dropping stale skybox face {:?}", completion.face);
                continue;
            }
            match self.barrier.record(completion.face, completion.result) {
                BarrierStep::Pending | BarrierStep::Ignored => {}
                BarrierStep::Failed(reason) => {
                    self.load_failed = true;
                    let url = self
                        .urls
                        .as_ref()
                        .map(|urls| urls.get(completion.face).to_string())
                        .unwrap_or_default();
                    log::error!("skybox face {:?} ({url}) failed: {reason:#}", completion.face);
                    outcome = Err(LoadError::Face {
                        face: completion.face,
                        url,
                        reason,
                    }
                    .into());
                }
                BarrierStep::Complete(images) => {
                    if let Err(e) = self.become_ready(*images, camera, z_offset, scene, resources) {
                        self.load_failed = true;
                        log::error!("skybox resources could not be created: {e}");
                        outcome = Err(e.into());
                    }
                }
            }
        }

        if let (SkyboxState::Ready, Some(node)) = (self.state, self.node) {
            scene.set_transform(node, self.transform_for(camera, z_offset));
        }
        outcome
    }

    fn transform_for(&self, camera: Point3<f32>, z_offset: f32) -> Instance {
        Instance {
            position: Vector3::new(camera.x, camera.y, camera.z + z_offset),
            ..Instance::with_uniform_scale(self.scale)
        }
    }

    fn become_ready<B: ResourceBackend>(
        &mut self,
        images: [DynamicImage; 6],
        camera: Point3<f32>,
        z_offset: f32,
        scene: &mut dyn Scene,
        resources: &mut ResourceManager<B>,
    ) -> Result<(), ResourceError> {
        let acquired = self.acquire_faces(images, resources);
        let (geometry, materials) = match acquired {
            Ok(handles) => handles,
            Err(e) => {
                // nothing of a half-built cube may survive
                resources.release_owner(self.owner);
                return Err(e);
            }
        };
        let node = scene.add_mesh(MeshNode {
            label: "skybox".to_string(),
            geometry,
            materials,
            transform: self.transform_for(camera, z_offset),
        });
        self.node = Some(node);
        self.state = SkyboxState::Ready;
        log::info!("skybox ready at scale {}", self.scale);
        Ok(())
    }

    fn acquire_faces<B: ResourceBackend>(
        &self,
        images: [DynamicImage; 6],
        resources: &mut ResourceManager<B>,
    ) -> Result<(Handle, Vec<Handle>), ResourceError> {
        let geometry = resources.acquire(self.owner, Resource::Geometry(Geometry::unit_cube()))?;
        let mut materials = Vec::with_capacity(6);
        for (face, image) in Face::ALL.into_iter().zip(images) {
            let rgba = image.to_rgba8();
            let label = format!("skybox {}", face.file_stem());
            let desc = TextureDesc::sky_face(rgba.width(), rgba.height());
            let texture = resources.acquire(
                self.owner,
                Resource::Texture(TextureData::new(&label, desc, rgba)),
            )?;
            let material = resources.acquire(
                self.owner,
                Resource::Material(MaterialDesc {
                    label,
                    shader: SKY_SHADER.to_string(),
                    texture,
                    base_color: [1.0; 4],
                    anti_tile: None,
                    side: Side::Back,
                }),
            )?;
            materials.push(material);
        }
        Ok((geometry, materials))
    }
}
