//! Device binding layer.
//!
//! [`GpuState`] is the narrow, GL-flavoured surface the texture manager talks to:
//! texture units, texture bindings, image specification and framebuffer
//! attachments. Implementations are expected to deduplicate redundant calls
//! themselves. [`WgpuState`] implements it on top of a `wgpu::Device`.

mod wgpu_state;

pub use wgpu_state::WgpuState;

/// Opaque device texture object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// Opaque framebuffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferHandle(pub u32);

/// Opaque renderbuffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderbufferHandle(pub u32);

/// Binding point of a texture object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    Texture3D,
    Texture2DArray,
    CubeMap,
}

impl TextureTarget {
    /// Targets whose images carry a depth or layer count.
    pub fn is_volumetric(self) -> bool {
        matches!(self, TextureTarget::Texture3D | TextureTarget::Texture2DArray)
    }
}

/// Layout of the client side pixel data handed to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
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
    DepthComponent,
    DepthStencil,
}

impl PixelFormat {
    pub fn channels(self) -> u32 {
        match self {
            PixelFormat::Alpha
            | PixelFormat::Red
            | PixelFormat::RedInteger
            | PixelFormat::Luminance
            | PixelFormat::DepthComponent => 1,
            PixelFormat::Rg
            | PixelFormat::RgInteger
            | PixelFormat::LuminanceAlpha
            | PixelFormat::DepthStencil => 2,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba | PixelFormat::RgbaInteger => 4,
        }
    }
}

/// Component type of the client side pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
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

impl PixelType {
    pub fn bytes(self) -> u32 {
        match self {
            PixelType::UnsignedByte | PixelType::Byte => 1,
            PixelType::Short | PixelType::UnsignedShort | PixelType::HalfFloat => 2,
            PixelType::Int | PixelType::UnsignedInt | PixelType::Float | PixelType::UnsignedInt248 => 4,
        }
    }
}

/// Storage format of a texture on the device.
///
/// The sized variants are what [`crate::textures::internal_format`] resolves to;
/// `Base` carries an unsized format through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalFormat {
    Base(PixelFormat),
    R8,
    R16F,
    R32F,
    Rgb8,
    Rgb16F,
    Rgb32F,
    Rgba8,
    Rgba16F,
    Rgba32F,
}

/// Framebuffer attachment point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color(u32),
    Depth,
    DepthStencil,
}

/// Sampling state applied to the texture bound to a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerParameters {
    pub wrap_s: wgpu::AddressMode,
    pub wrap_t: wgpu::AddressMode,
    pub wrap_r: wgpu::AddressMode,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    /// `None` disables sampling between mip levels.
    pub mipmap_filter: Option<wgpu::MipmapFilterMode>,
}

/// One image specification call: a single mip level of the bound texture.
#[derive(Debug, Clone, Copy)]
pub struct TexImage<'a> {
    pub target: TextureTarget,
    pub level: u32,
    pub internal_format: InternalFormat,
    pub width: u32,
    pub height: u32,
    /// Depth for 3D textures, layer count for arrays, `1` otherwise.
    pub depth: u32,
    pub format: PixelFormat,
    pub ty: PixelType,
    /// `None` allocates storage without initializing it.
    pub data: Option<&'a [u8]>,
}

/// Device state as seen by the texture manager.
///
/// All image and parameter calls apply to the texture bound to `target` on the
/// currently active unit.
pub trait GpuState {
    fn create_texture(&mut self) -> TextureHandle;
    fn delete_texture(&mut self, handle: TextureHandle);

    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, target: TextureTarget, handle: Option<TextureHandle>);

    fn pixel_store_unpack_alignment(&mut self, alignment: u32);
    fn tex_parameters(&mut self, target: TextureTarget, parameters: &SamplerParameters);

    fn tex_image_2d(&mut self, image: TexImage<'_>);
    fn tex_image_3d(&mut self, image: TexImage<'_>);
    fn generate_mipmap(&mut self, target: TextureTarget);

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);
    fn framebuffer_texture_2d(
        &mut self,
        attachment: Attachment,
        target: TextureTarget,
        handle: Option<TextureHandle>,
        level: u32,
    );
}
