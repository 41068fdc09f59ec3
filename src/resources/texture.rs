use std::path::{Path, PathBuf};

use anyhow::Context as _;
#[cfg(not(target_arch = "wasm32"))]
use futures::future::BoxFuture;
#[cfg(target_arch = "wasm32")]
use futures::future::LocalBoxFuture;
use image::{DynamicImage, ImageFormat, load_from_memory_with_format};

use crate::config::Config;

/// Future of one decoded image. Native loads run on a multi-threaded runtime
/// and must be `Send`; browser fetches cannot be.
#[cfg(not(target_arch = "wasm32"))]
pub type ImageFuture = BoxFuture<'static, anyhow::Result<DynamicImage>>;
#[cfg(target_arch = "wasm32")]
pub type ImageFuture = LocalBoxFuture<'static, anyhow::Result<DynamicImage>>;

/// Fetches and decodes images. Implemented by the host's asset pipeline.
pub trait TextureLoader {
    fn load(&self, url: &str) -> ImageFuture;
}

/// Loads assets from a directory natively and relative to the page origin
/// on the web.
#[derive(Clone, Debug)]
pub struct AssetLoader {
    root: PathBuf,
}

impl AssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Loader rooted at [`Config::asset_root`].
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.asset_root.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TextureLoader for AssetLoader {
    fn load(&self, url: &str) -> ImageFuture {
        let root = self.root.clone();
        let url = url.to_string();
        Box::pin(async move {
            let bytes = load_binary(&root, &url).await?;
            decode(&bytes, &url)
        })
    }
}

/// Decode image bytes, trusting the file extension of `name` when it has a
/// known one and sniffing the format otherwise.
pub fn decode(bytes: &[u8], name: &str) -> anyhow::Result<DynamicImage> {
    let format = std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension);
    let image = match format {
        Some(format) => load_from_memory_with_format(bytes, format),
        None => image::load_from_memory(bytes),
    };
    image.with_context(|| format!("could not decode {name}"))
}

#[cfg(target_arch = "wasm32")]
fn format_url(root: &std::path::Path, file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no window")?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("page has no origin"))?;
    let root = root.to_string_lossy();
    let root = root.trim_start_matches("./").trim_matches('/');
    let base = reqwest::Url::parse(&format!("{origin}/{root}/"))?;
    Ok(base.join(file_name.trim_start_matches('/'))?)
}

pub async fn load_binary(root: &std::path::Path, file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(root, file_name)?;
        reqwest::get(url).await?.error_for_status()?.bytes().await?.to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = root.join(file_name.trim_start_matches('/'));
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("could not read {}", path.display()))?
    };

    Ok(data)
}
