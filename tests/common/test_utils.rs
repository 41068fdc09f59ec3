#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap};

use flow_skytile::{
    data_structures::{material::MaterialDesc, texture::TextureDesc},
    resources::{
        Handle, Resource, ResourceBackend, ResourceKind,
        texture::{ImageFuture, TextureLoader},
    },
};
use futures::channel::oneshot;
use image::{DynamicImage, Rgba, RgbaImage};

/// Records every create and destroy call it receives.
#[derive(Debug, Default)]
pub(crate) struct CountingBackend {
    created: HashMap<ResourceKind, usize>,
    destroyed: HashMap<ResourceKind, usize>,
    pub materials: HashMap<Handle, MaterialDesc>,
    pub textures: HashMap<Handle, TextureDesc>,
    pub fail_on: Option<ResourceKind>,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self, kind: ResourceKind) -> usize {
        self.created.get(&kind).copied().unwrap_or(0)
    }

    pub fn destroyed(&self, kind: ResourceKind) -> usize {
        self.destroyed.get(&kind).copied().unwrap_or(0)
    }

    /// Handles created but not yet destroyed.
    pub fn outstanding(&self) -> usize {
        let created: usize = self.created.values().sum();
        let destroyed: usize = self.destroyed.values().sum();
        created - destroyed
    }
}

impl ResourceBackend for CountingBackend {
    fn create(&mut self, handle: Handle, resource: &Resource) -> anyhow::Result<()> {
        if self.fail_on == Some(resource.kind()) {
            anyhow::bail!("backend refuses {:?}", resource.kind());
        }
        *self.created.entry(handle.kind()).or_default() += 1;
        match resource {
            Resource::Material(desc) => {
                self.materials.insert(handle, desc.clone());
            }
            Resource::Texture(data) => {
                self.textures.insert(handle, data.desc);
            }
            Resource::Geometry(_) => {}
        }
        Ok(())
    }

    fn destroy(&mut self, handle: Handle) {
        *self.destroyed.entry(handle.kind()).or_default() += 1;
        self.materials.remove(&handle);
        self.textures.remove(&handle);
    }
}

/// 0.5 + 0.5 sin(2 pi x / w) cos(2 pi y / h) in every colour channel.
pub(crate) fn smooth_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let fx = std::f32::consts::TAU * x as f32 / width as f32;
        let fy = std::f32::consts::TAU * y as f32 / height as f32;
        let v = ((0.5 + 0.5 * fx.sin() * fy.cos()) * 255.0).round() as u8;
        Rgba([v, v, v, 255])
    })
}

pub(crate) fn solid_image(width: u32, height: u32, value: u8) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255])))
}

/// Serves images from memory; unknown URLs fail.
#[derive(Debug, Default)]
pub(crate) struct MemoryLoader {
    images: HashMap<String, DynamicImage>,
    requests: RefCell<Vec<String>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, image: DynamicImage) -> Self {
        self.images.insert(url.to_string(), image);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl TextureLoader for MemoryLoader {
    fn load(&self, url: &str) -> ImageFuture {
        self.requests.borrow_mut().push(url.to_string());
        let result = self
            .images
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 {url}"));
        Box::pin(async move { result })
    }
}

/// Loads that finish only when the test says so, in any order.
#[derive(Debug, Default)]
pub(crate) struct DeferredLoader {
    pending: RefCell<HashMap<String, oneshot::Sender<anyhow::Result<DynamicImage>>>>,
}

impl DeferredLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Finish the load of `url`. Returns `false` if nothing requested it.
    pub fn complete(&self, url: &str, result: anyhow::Result<DynamicImage>) -> bool {
        match self.pending.borrow_mut().remove(url) {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }
}

impl TextureLoader for DeferredLoader {
    fn load(&self, url: &str) -> ImageFuture {
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().insert(url.to_string(), tx);
        Box::pin(async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("load cancelled")),
            }
        })
    }
}
