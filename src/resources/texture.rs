use std::{
    cell::RefCell,
    collections::HashMap,
    path::{Path, PathBuf},
    rc::{Rc, Weak},
};

use crate::data_structures::texture::{Format, Image, SharedTexture, Texture};

/// Loads textures from files or URLs.
///
/// With [`use_cache`](Self::use_cache) set, loading the same source again
/// returns the texture from the first load for as long as somebody else still
/// holds it. The cache only keeps weak references.
#[derive(Debug)]
pub struct TextureLoader {
    pub use_cache: bool,
    cache: HashMap<String, Weak<RefCell<Texture>>>,
}

impl TextureLoader {
    pub fn new() -> Self {
        Self {
            use_cache: true,
            cache: HashMap::new(),
        }
    }

    /// Loads and decodes the image at `path`.
    ///
    /// JPEG files become [`Format::Rgb`] textures, everything else
    /// [`Format::Rgba`]. The texture is named after the file stem and is marked
    /// for upload. Returns `None` and logs an error when the file is missing or
    /// cannot be decoded.
    pub async fn load(&mut self, path: impl AsRef<Path>, flip_y: bool) -> Option<SharedTexture> {
        let path = path.as_ref();
        let key = path.to_string_lossy().into_owned();

        if let Some(texture) = self.cached(&key) {
            return Some(texture);
        }

        if !file_exists(path).await {
            log::error!("No such file: '{}'", absolute(path).display());
            return None;
        }

        let is_jpeg = is_jpeg(&key);
        let mut texture = match load_binary(path)
            .await
            .and_then(|data| decode_image(&data, is_jpeg, flip_y))
        {
            Ok(texture) => texture,
            Err(e) => {
                log::error!("Unable to load texture '{}': {}", key, e);
                return None;
            }
        };

        if let Some(stem) = path.file_stem() {
            texture.name = stem.to_string_lossy().into_owned();
        }

        Some(self.finish(key, texture, is_jpeg))
    }

    /// Fetches and decodes the image behind `url`. Format rules match [`load`](Self::load).
    pub async fn load_from_url(&mut self, url: &str, flip_y: bool) -> Option<SharedTexture> {
        if let Some(texture) = self.cached(url) {
            return Some(texture);
        }

        let is_jpeg = is_jpeg(url);
        let texture = match fetch(url)
            .await
            .and_then(|data| decode_image(&data, is_jpeg, flip_y))
        {
            Ok(texture) => texture,
            Err(e) => {
                log::error!("Failed loading texture from URL {}: {}", url, e);
                return None;
            }
        };

        Some(self.finish(url.to_string(), texture, is_jpeg))
    }

    /// Forgets every cached source.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn cached(&mut self, key: &str) -> Option<SharedTexture> {
        if !self.use_cache {
            return None;
        }
        let cached = self.cache.get(key)?.upgrade();
        if cached.is_none() {
            self.cache.remove(key);
        }
        cached
    }

    fn finish(&mut self, key: String, mut texture: Texture, is_jpeg: bool) -> SharedTexture {
        texture.format = if is_jpeg { Format::Rgb } else { Format::Rgba };
        texture.needs_update();
        log::debug!("Loaded texture '{}' ({:?})", key, texture.dimensions());

        let texture = texture.shared();
        if self.use_cache {
            self.cache.insert(key, Rc::downgrade(&texture));
        }
        texture
    }
}

impl Default for TextureLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Case insensitive check for a source ending in `jpg` or `jpeg`, with or without a dot.
pub fn is_jpeg(source: &str) -> bool {
    let source = source.to_ascii_lowercase();
    source.ends_with("jpg") || source.ends_with("jpeg")
}

/// Decodes an encoded image into a texture: 3 channels for JPEG, 4 otherwise.
pub fn decode_image(data: &[u8], is_jpeg: bool, flip_y: bool) -> anyhow::Result<Texture> {
    let mut img = image::load_from_memory(data)?;
    if flip_y {
        img = img.flipv();
    }

    let (width, height) = (img.width(), img.height());
    let pixels = if is_jpeg {
        img.to_rgb8().into_raw()
    } else {
        img.to_rgba8().into_raw()
    };

    let mut texture = Texture::new(Some(Image::new(width, height, pixels)));
    if is_jpeg {
        // RGB rows are only byte aligned
        texture.unpack_alignment = 1;
    }
    Ok(texture)
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(not(target_arch = "wasm32"))]
async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(target_arch = "wasm32")]
async fn file_exists(_path: &Path) -> bool {
    true
}

pub async fn load_binary(path: &Path) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = fetch(&path.to_string_lossy()).await?;
    #[cfg(not(target_arch = "wasm32"))]
    let data = tokio::fs::read(path).await?;

    Ok(data)
}

async fn fetch(url: &str) -> anyhow::Result<Vec<u8>> {
    let data = reqwest::get(url)
        .await?
        .error_for_status()?
        .bytes()
        .await?
        .to_vec();
    if data.is_empty() {
        anyhow::bail!("empty response");
    }
    Ok(data)
}
