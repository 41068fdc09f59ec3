//! Resource lifecycle: every geometry, texture and material goes through here.
//!
//! [`ResourceManager::acquire`] hands out a [`Handle`] and records one release
//! obligation for it. [`ResourceManager::release`] is idempotent, and
//! [`ResourceManager::release_owner`] releases everything an owner acquired.
//! Materials take ownership of the texture they reference, so releasing a
//! material also releases its texture.
//!
//! The actual GPU objects are created and destroyed by a [`ResourceBackend`].

use std::collections::HashMap;

use crate::{
    data_structures::{material::MaterialDesc, mesh::Geometry, texture::TextureData},
    error::ResourceError,
};

pub mod gpu;
pub mod texture;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Geometry,
    Material,
    Texture,
}

/// Opaque reference to one acquired resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    id: u64,
    kind: ResourceKind,
}

impl Handle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

/// Identifies the component a handle was acquired for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

/// What to acquire.
#[derive(Clone, Debug)]
pub enum Resource {
    Geometry(Geometry),
    Texture(TextureData),
    Material(MaterialDesc),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Geometry(_) => ResourceKind::Geometry,
            Resource::Texture(_) => ResourceKind::Texture,
            Resource::Material(_) => ResourceKind::Material,
        }
    }
}

/// Materialises resources. Implemented by the wgpu backend and by headless
/// hosts that only need the bookkeeping.
pub trait ResourceBackend {
    fn create(&mut self, handle: Handle, resource: &Resource) -> anyhow::Result<()>;

    /// Called exactly once per successfully created handle.
    fn destroy(&mut self, handle: Handle);
}

/// Backend that creates nothing.
#[derive(Debug, Default)]
pub struct HeadlessBackend;

impl ResourceBackend for HeadlessBackend {
    fn create(&mut self, _: Handle, _: &Resource) -> anyhow::Result<()> {
        Ok(())
    }

    fn destroy(&mut self, _: Handle) {}
}

#[derive(Debug)]
struct Entry {
    owner: OwnerId,
    dependents: Vec<Handle>,
    adopted_by: Option<Handle>,
}

#[derive(Debug)]
pub struct ResourceManager<B: ResourceBackend> {
    backend: B,
    live: HashMap<Handle, Entry>,
    owners: HashMap<OwnerId, String>,
    next_handle: u64,
    next_owner: u64,
}

impl<B: ResourceBackend> ResourceManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            live: HashMap::new(),
            owners: HashMap::new(),
            next_handle: 0,
            next_owner: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn register_owner(&mut self, name: &str) -> OwnerId {
        let owner = OwnerId(self.next_owner);
        self.next_owner += 1;
        self.owners.insert(owner, name.to_string());
        owner
    }

    /// Create a resource and record its release obligation against `owner`.
    ///
    /// A material's texture must be live; it becomes a dependent of the
    /// material and is released together with it.
    pub fn acquire(&mut self, owner: OwnerId, resource: Resource) -> Result<Handle, ResourceError> {
        if let Resource::Material(desc) = &resource {
            match self.live.get(&desc.texture) {
                None => return Err(ResourceError::UnknownHandle(desc.texture.id)),
                Some(Entry {
                    adopted_by: Some(material),
                    ..
                }) => {
                    return Err(ResourceError::AlreadyAdopted {
                        texture: desc.texture.id,
                        material: material.id,
                    });
                }
                Some(_) => {}
            }
        }
        let handle = Handle {
            id: self.next_handle,
            kind: resource.kind(),
        };
        self.next_handle += 1;
        self.backend.create(handle, &resource)?;

        let mut dependents = Vec::new();
        if let Resource::Material(desc) = &resource {
            if let Some(texture) = self.live.get_mut(&desc.texture) {
                texture.adopted_by = Some(handle);
            }
            dependents.push(desc.texture);
        }
        self.live.insert(
            handle,
            Entry {
                owner,
                dependents,
                adopted_by: None,
            },
        );
        Ok(handle)
    }

    /// Release a handle and everything it owns.
    ///
    /// Returns `true` if this call released it, `false` if it was already
    /// released or never belonged to this manager.
    pub fn release(&mut self, handle: Handle) -> bool {
        let Some(entry) = self.live.remove(&handle) else {
            return false;
        };
        for dependent in entry.dependents {
            self.release(dependent);
        }
        self.backend.destroy(handle);
        true
    }

    /// Release every handle `owner` acquired, dependents included. Returns
    /// how many handles were released.
    pub fn release_owner(&mut self, owner: OwnerId) -> usize {
        let handles: Vec<Handle> = self
            .live
            .iter()
            .filter(|(_, entry)| entry.owner == owner)
            .map(|(handle, _)| *handle)
            .collect();
        let before = self.live.len();
        for handle in handles {
            self.release(handle);
        }
        let released = before - self.live.len();
        if let Some(name) = self.owners.get(&owner) {
            log::info!("released {released} resources owned by {name}");
        }
        released
    }

    pub fn is_live(&self, handle: Handle) -> bool {
        self.live.contains_key(&handle)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live_count_for(&self, owner: OwnerId) -> usize {
        self.live.values().filter(|entry| entry.owner == owner).count()
    }
}

impl<B: ResourceBackend> Drop for ResourceManager<B> {
    fn drop(&mut self) {
        if self.live.is_empty() {
            return;
        }
        log::warn!(
            "resource manager dropped with {} live handles, releasing them",
            self.live.len()
        );
        let handles: Vec<Handle> = self.live.keys().copied().collect();
        for handle in handles {
            self.release(handle);
        }
    }
}
