//! CPU side textures.
//!
//! This module provides [`Texture`], the description of a texture as the scene
//! sees it: a pixel source, sampling modes, a format and a version counter that
//! is bumped whenever the pixels change. It never touches the device; the
//! [`Textures`](crate::textures::Textures) manager decides when and how a
//! texture becomes resident.

use std::{cell::RefCell, fmt, rc::Rc, sync::atomic::AtomicU32};

use uuid::Uuid;

use crate::data_structures::next_id;

static TEXTURE_ID: AtomicU32 = AtomicU32::new(0);

/// Textures are shared between materials and the loader cache.
pub type SharedTexture = Rc<RefCell<Texture>>;

/// How texture coordinates outside `[0, 1]` are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wrapping {
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

/// Magnification and minification filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    NearestMipmapNearest,
    NearestMipmapLinear,
    Linear,
    LinearMipmapNearest,
    LinearMipmapLinear,
}

impl Filter {
    /// Whether sampling with this filter reads from mip levels other than the base.
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, Filter::Nearest | Filter::Linear)
    }
}

/// Channel layout of the pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Alpha,
    Red,
    RedInteger,
    Rg,
    RgInteger,
    Rgb,
    Rgba,
    RgbaInteger,
    Luminance,
    LuminanceAlpha,
    Depth,
    DepthStencil,
}

/// Component type of the pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    UnsignedByte,
    Byte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Float,
    HalfFloat,
    UnsignedInt248,
}

/// A block of pixels: the base image of a texture or one precomputed mip level.
#[derive(Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    /// Depth of a 3D image or layer count of an array, `1` for plain images.
    pub depth: u32,
    data: Vec<u8>,
}

impl Image {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            depth: 1,
            data,
        }
    }

    pub fn with_depth(width: u32, height: u32, depth: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            depth,
            data,
        }
    }

    /// Convenience for float textures.
    pub fn from_f32(width: u32, height: u32, data: &[f32]) -> Self {
        Self::new(width, height, bytemuck::cast_slice(data).to_vec())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("depth", &self.depth)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Receives the dispose notification of a texture.
///
/// A texture holds at most one listener. It is detached before it is invoked,
/// so a listener runs at most once per registration.
pub trait DisposeListener {
    fn on_dispose(&self, texture: &Texture);
}

/// A texture as described by the scene.
///
/// Mutating [`image`](Self::image) or [`mipmaps`](Self::mipmaps) has no effect on
/// the device until [`needs_update`](Self::needs_update) bumps the version.
pub struct Texture {
    id: u32,
    uuid: Uuid,
    pub name: String,

    /// Base level pixels. `None` means no data has arrived yet.
    pub image: Option<Image>,
    /// Precomputed mip chain, level 0 first. Takes precedence over `image`.
    pub mipmaps: Vec<Image>,

    pub format: Format,
    pub data_type: DataType,

    pub wrap_s: Wrapping,
    pub wrap_t: Wrapping,
    pub wrap_r: Wrapping,
    pub mag_filter: Filter,
    pub min_filter: Filter,

    /// Let the device build the mip chain after upload. Cleared when manual mipmaps are uploaded.
    pub generate_mipmaps: bool,
    /// Row alignment of the pixel data in bytes (1, 2, 4 or 8).
    pub unpack_alignment: u32,

    /// Invoked after every successful upload.
    pub on_update: Option<Box<dyn FnMut(&Texture)>>,

    version: u32,
    dispose_listener: Option<Rc<dyn DisposeListener>>,
}

impl Texture {
    pub fn new(image: Option<Image>) -> Self {
        Self {
            id: next_id(&TEXTURE_ID),
            uuid: Uuid::new_v4(),
            name: String::new(),
            image,
            mipmaps: Vec::new(),
            format: Format::Rgba,
            data_type: DataType::UnsignedByte,
            wrap_s: Wrapping::ClampToEdge,
            wrap_t: Wrapping::ClampToEdge,
            wrap_r: Wrapping::ClampToEdge,
            mag_filter: Filter::Linear,
            min_filter: Filter::LinearMipmapLinear,
            generate_mipmaps: true,
            unpack_alignment: 4,
            on_update: None,
            version: 0,
            dispose_listener: None,
        }
    }

    pub fn shared(self) -> SharedTexture {
        Rc::new(RefCell::new(self))
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Monotonic pixel data version. `0` means the texture was never marked for upload.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Marks the pixel data as changed so the next bind uploads it.
    pub fn needs_update(&mut self) {
        self.version += 1;
    }

    /// Width and height of the base level, if any pixels are present.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.mipmaps
            .first()
            .or(self.image.as_ref())
            .map(|image| (image.width, image.height))
    }

    /// Registers the dispose listener, replacing any previous one.
    pub fn set_dispose_listener(&mut self, listener: Rc<dyn DisposeListener>) {
        self.dispose_listener = Some(listener);
    }

    pub fn remove_dispose_listener(&mut self) -> Option<Rc<dyn DisposeListener>> {
        self.dispose_listener.take()
    }

    pub fn has_dispose_listener(&self) -> bool {
        self.dispose_listener.is_some()
    }

    /// Releases the texture: notifies and detaches the dispose listener.
    ///
    /// The CPU side data stays intact; a disposed texture can be uploaded again.
    pub fn dispose(&mut self) {
        if let Some(listener) = self.dispose_listener.take() {
            listener.on_dispose(self);
        }
    }

    /// Runs `on_update` with a shared view of the texture.
    pub(crate) fn notify_update(&mut self) {
        if let Some(mut on_update) = self.on_update.take() {
            on_update(self);
            self.on_update = Some(on_update);
        }
    }
}

impl Default for Texture {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("uuid", &self.uuid)
            .field("name", &self.name)
            .field("image", &self.image)
            .field("mipmaps", &self.mipmaps.len())
            .field("format", &self.format)
            .field("data_type", &self.data_type)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Off-screen color target a texture can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
    /// Depth for 3D targets, layer count for array targets.
    pub depth: u32,
}

impl RenderTarget {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }
}
