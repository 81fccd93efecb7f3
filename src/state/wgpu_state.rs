//! [`GpuState`] on top of wgpu.
//!
//! wgpu has no notion of texture units or of specifying a texture image after
//! the texture was created, so this type keeps that bookkeeping itself:
//!
//! - handles map to lazily created `wgpu::Texture`s, (re)created whenever level 0
//!   is specified with a different size or format
//! - 3-channel data is expanded to 4 channels on the way in
//! - mipmaps of 8-bit RGBA textures are generated on the CPU
//! - framebuffer attachments are recorded as texture views

use std::collections::HashMap;

use anyhow::bail;
use image::{RgbaImage, imageops::FilterType};

use crate::{
    state::{
        Attachment, FramebufferHandle, GpuState, InternalFormat, PixelFormat, PixelType,
        SamplerParameters, TexImage, TextureHandle, TextureTarget,
    },
    textures::max_mip_level,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TextureLayout {
    target: TextureTarget,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    depth: u32,
    mip_level_count: u32,
}

#[derive(Debug, Default)]
struct DeviceTexture {
    texture: Option<wgpu::Texture>,
    view: Option<wgpu::TextureView>,
    sampler: Option<wgpu::Sampler>,
    layout: Option<TextureLayout>,
    /// Level 0 of 8-bit RGBA 2D textures, kept for mipmap generation.
    base_level: Option<RgbaImage>,
}

/// Device state backed by a `wgpu::Device` and its queue.
#[derive(Debug)]
pub struct WgpuState {
    device: wgpu::Device,
    queue: wgpu::Queue,

    next_texture: u32,
    textures: HashMap<TextureHandle, DeviceTexture>,

    active_unit: u32,
    bindings: HashMap<(u32, TextureTarget), TextureHandle>,
    unpack_alignment: u32,

    framebuffer: Option<FramebufferHandle>,
    attachments: HashMap<(FramebufferHandle, Attachment), (TextureHandle, wgpu::TextureView)>,
}

impl WgpuState {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            next_texture: 1,
            textures: HashMap::new(),
            active_unit: 0,
            bindings: HashMap::new(),
            unpack_alignment: 4,
            framebuffer: None,
            attachments: HashMap::new(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&wgpu::Texture> {
        self.textures.get(&handle)?.texture.as_ref()
    }

    /// View over all mip levels, suitable for a bind group.
    pub fn texture_view(&self, handle: TextureHandle) -> Option<&wgpu::TextureView> {
        self.textures.get(&handle)?.view.as_ref()
    }

    pub fn sampler(&self, handle: TextureHandle) -> Option<&wgpu::Sampler> {
        self.textures.get(&handle)?.sampler.as_ref()
    }

    pub fn framebuffer_attachment(
        &self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
    ) -> Option<&wgpu::TextureView> {
        self.attachments
            .get(&(framebuffer, attachment))
            .map(|(_, view)| view)
    }

    /// Texture bound to `target` on the active unit.
    pub fn bound_texture(&self, target: TextureTarget) -> Option<TextureHandle> {
        self.bindings.get(&(self.active_unit, target)).copied()
    }

    fn specify_image(&mut self, image: TexImage<'_>) {
        if image.target == TextureTarget::CubeMap {
            log::warn!("Cube map images are not supported by the wgpu backend");
            return;
        }
        let Some(handle) = self.bound_texture(image.target) else {
            log::error!(
                "No texture bound to {:?} on unit {}",
                image.target,
                self.active_unit
            );
            return;
        };
        let Some(format) = texture_format(image.internal_format, image.ty) else {
            log::error!(
                "{:?} with {:?} data has no wgpu counterpart",
                image.internal_format,
                image.ty
            );
            return;
        };
        let depth = image.depth.max(1);

        let Some(entry) = self.textures.get_mut(&handle) else {
            log::error!("{:?} was deleted or never created", handle);
            return;
        };

        if image.level == 0 {
            let extent = match image.target {
                TextureTarget::Texture3D => image.width.max(image.height).max(depth),
                _ => image.width.max(image.height),
            };
            let layout = TextureLayout {
                target: image.target,
                format,
                width: image.width.max(1),
                height: image.height.max(1),
                depth,
                mip_level_count: max_mip_level(extent, extent) + 1,
            };
            if entry.layout != Some(layout) {
                if let Some(old) = entry.texture.take() {
                    old.destroy();
                }
                let texture = create_texture(&self.device, &layout);
                entry.view = Some(texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("flow-residency texture view"),
                    dimension: Some(view_dimension(layout.target)),
                    ..Default::default()
                }));
                entry.texture = Some(texture);
                entry.layout = Some(layout);
                entry.base_level = None;
            }
        }

        let (Some(layout), Some(texture)) = (entry.layout, entry.texture.as_ref()) else {
            log::warn!(
                "Level {} of {:?} specified before level 0",
                image.level,
                handle
            );
            return;
        };
        if image.level >= layout.mip_level_count {
            log::warn!(
                "Level {} of {:?} is outside its {} mip levels",
                image.level,
                handle,
                layout.mip_level_count
            );
            return;
        }

        let Some(data) = image.data else {
            return;
        };
        if !accepts_client_data(layout.format)
            || !texture.usage().contains(wgpu::TextureUsages::COPY_DST)
        {
            log::error!(
                "{:?} cannot be written from client data, level {} of {:?} left uninitialized",
                layout.format,
                image.level,
                handle
            );
            return;
        }

        let texels = match repack(&image, data, self.unpack_alignment) {
            Ok(texels) => texels,
            Err(e) => {
                log::error!("Unable to upload level {} of {:?}: {}", image.level, handle, e);
                return;
            }
        };
        let bytes_per_row = texels.len() as u32 / (image.height.max(1) * depth);

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture,
                mip_level: image.level,
                origin: wgpu::Origin3d::ZERO,
            },
            &texels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(image.height),
            },
            wgpu::Extent3d {
                width: image.width,
                height: image.height,
                depth_or_array_layers: depth,
            },
        );

        if image.level == 0 {
            entry.base_level = match (layout.target, layout.format) {
                (TextureTarget::Texture2D, wgpu::TextureFormat::Rgba8Unorm) => {
                    RgbaImage::from_raw(image.width, image.height, texels)
                }
                _ => None,
            };
        }
    }
}

impl GpuState for WgpuState {
    fn create_texture(&mut self) -> TextureHandle {
        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(handle, DeviceTexture::default());
        handle
    }

    fn delete_texture(&mut self, handle: TextureHandle) {
        if let Some(entry) = self.textures.remove(&handle) {
            if let Some(texture) = entry.texture {
                texture.destroy();
            }
        }
        self.bindings.retain(|_, bound| *bound != handle);
        self.attachments.retain(|_, (attached, _)| *attached != handle);
    }

    fn active_texture(&mut self, unit: u32) {
        self.active_unit = unit;
    }

    fn bind_texture(&mut self, target: TextureTarget, handle: Option<TextureHandle>) {
        match handle {
            Some(handle) => self.bindings.insert((self.active_unit, target), handle),
            None => self.bindings.remove(&(self.active_unit, target)),
        };
    }

    fn pixel_store_unpack_alignment(&mut self, alignment: u32) {
        self.unpack_alignment = match alignment {
            1 | 2 | 4 | 8 => alignment,
            _ => {
                log::warn!("Invalid unpack alignment {}, using 4", alignment);
                4
            }
        };
    }

    fn tex_parameters(&mut self, target: TextureTarget, parameters: &SamplerParameters) {
        let Some(entry) = self
            .bound_texture(target)
            .and_then(|handle| self.textures.get_mut(&handle))
        else {
            log::error!("No texture bound to {:?} on unit {}", target, self.active_unit);
            return;
        };

        entry.sampler = Some(self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("flow-residency sampler"),
            address_mode_u: parameters.wrap_s,
            address_mode_v: parameters.wrap_t,
            address_mode_w: parameters.wrap_r,
            mag_filter: parameters.mag_filter,
            min_filter: parameters.min_filter,
            mipmap_filter: parameters
                .mipmap_filter
                .unwrap_or(wgpu::MipmapFilterMode::Nearest),
            lod_min_clamp: 0.0,
            lod_max_clamp: if parameters.mipmap_filter.is_some() {
                32.0
            } else {
                0.0
            },
            ..Default::default()
        }));
    }

    fn tex_image_2d(&mut self, image: TexImage<'_>) {
        self.specify_image(image);
    }

    fn tex_image_3d(&mut self, image: TexImage<'_>) {
        self.specify_image(image);
    }

    fn generate_mipmap(&mut self, target: TextureTarget) {
        let Some(handle) = self.bound_texture(target) else {
            log::error!("No texture bound to {:?} on unit {}", target, self.active_unit);
            return;
        };
        let Some(entry) = self.textures.get(&handle) else {
            return;
        };
        let (Some(texture), Some(layout), Some(base)) =
            (entry.texture.as_ref(), entry.layout, entry.base_level.as_ref())
        else {
            log::warn!(
                "Mipmaps of {:?} can only be generated for 8-bit RGBA 2D textures",
                handle
            );
            return;
        };

        for level in 1..layout.mip_level_count {
            let width = (layout.width >> level).max(1);
            let height = (layout.height >> level).max(1);
            let mip = image::imageops::resize(base, width, height, FilterType::Triangle);

            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture,
                    mip_level: level,
                    origin: wgpu::Origin3d::ZERO,
                },
                &mip,
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
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.framebuffer = framebuffer;
    }

    fn framebuffer_texture_2d(
        &mut self,
        attachment: Attachment,
        target: TextureTarget,
        handle: Option<TextureHandle>,
        level: u32,
    ) {
        let Some(framebuffer) = self.framebuffer else {
            log::error!("Attaching {:?} without a bound framebuffer", attachment);
            return;
        };
        let Some(handle) = handle else {
            self.attachments.remove(&(framebuffer, attachment));
            return;
        };
        let Some(texture) = self.texture(handle) else {
            log::error!("{:?} has no storage to attach", handle);
            return;
        };

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("flow-residency attachment"),
            dimension: Some(match target {
                TextureTarget::Texture2D => wgpu::TextureViewDimension::D2,
                _ => wgpu::TextureViewDimension::D2Array,
            }),
            base_mip_level: level,
            mip_level_count: Some(1),
            ..Default::default()
        });
        self.attachments
            .insert((framebuffer, attachment), (handle, view));
    }
}

fn view_dimension(target: TextureTarget) -> wgpu::TextureViewDimension {
    match target {
        TextureTarget::Texture2D => wgpu::TextureViewDimension::D2,
        TextureTarget::Texture3D => wgpu::TextureViewDimension::D3,
        TextureTarget::Texture2DArray => wgpu::TextureViewDimension::D2Array,
        TextureTarget::CubeMap => wgpu::TextureViewDimension::Cube,
    }
}

/// Whether `write_texture` may fill every aspect of `format`.
fn accepts_client_data(format: wgpu::TextureFormat) -> bool {
    // Depth16Unorm is the only depth format a queue write can target
    !format.is_depth_stencil_format() || format == wgpu::TextureFormat::Depth16Unorm
}

fn create_texture(device: &wgpu::Device, layout: &TextureLayout) -> wgpu::Texture {
    let wanted = wgpu::TextureUsages::TEXTURE_BINDING
        | wgpu::TextureUsages::COPY_DST
        | wgpu::TextureUsages::COPY_SRC
        | wgpu::TextureUsages::RENDER_ATTACHMENT;
    let allowed = layout
        .format
        .guaranteed_format_features(device.features())
        .allowed_usages;
    let mut usage = wanted & allowed;
    if layout.target == TextureTarget::Texture3D {
        usage.remove(wgpu::TextureUsages::RENDER_ATTACHMENT);
    }

    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("flow-residency texture"),
        size: wgpu::Extent3d {
            width: layout.width,
            height: layout.height,
            depth_or_array_layers: layout.depth,
        },
        mip_level_count: layout.mip_level_count,
        sample_count: 1,
        dimension: match layout.target {
            TextureTarget::Texture3D => wgpu::TextureDimension::D3,
            _ => wgpu::TextureDimension::D2,
        },
        format: layout.format,
        usage,
        view_formats: &[],
    })
}

/// wgpu storage for an internal format. 3-channel formats widen to 4 channels.
pub(crate) fn texture_format(
    internal_format: InternalFormat,
    ty: PixelType,
) -> Option<wgpu::TextureFormat> {
    use wgpu::TextureFormat as F;

    let format = match internal_format {
        InternalFormat::R8 => F::R8Unorm,
        InternalFormat::R16F => F::R16Float,
        InternalFormat::R32F => F::R32Float,
        InternalFormat::Rgb8 | InternalFormat::Rgba8 => F::Rgba8Unorm,
        InternalFormat::Rgb16F | InternalFormat::Rgba16F => F::Rgba16Float,
        InternalFormat::Rgb32F | InternalFormat::Rgba32F => F::Rgba32Float,
        InternalFormat::Base(base) => match (base, ty) {
            (PixelFormat::Alpha | PixelFormat::Luminance, PixelType::UnsignedByte) => F::R8Unorm,
            (PixelFormat::LuminanceAlpha | PixelFormat::Rg, PixelType::UnsignedByte) => {
                F::Rg8Unorm
            }
            (PixelFormat::Rg, PixelType::HalfFloat) => F::Rg16Float,
            (PixelFormat::Rg, PixelType::Float) => F::Rg32Float,
            (PixelFormat::Red, PixelType::UnsignedShort) => F::R16Uint,
            (PixelFormat::RedInteger, PixelType::UnsignedByte) => F::R8Uint,
            (PixelFormat::RedInteger, PixelType::UnsignedInt) => F::R32Uint,
            (PixelFormat::RedInteger, PixelType::Int) => F::R32Sint,
            (PixelFormat::RgInteger, PixelType::UnsignedByte) => F::Rg8Uint,
            (PixelFormat::RgInteger, PixelType::UnsignedInt) => F::Rg32Uint,
            (PixelFormat::RgbaInteger, PixelType::UnsignedByte) => F::Rgba8Uint,
            (PixelFormat::RgbaInteger, PixelType::UnsignedInt) => F::Rgba32Uint,
            (PixelFormat::RgbaInteger, PixelType::Int) => F::Rgba32Sint,
            (PixelFormat::DepthComponent, PixelType::UnsignedShort) => F::Depth16Unorm,
            (PixelFormat::DepthComponent, PixelType::UnsignedInt) => F::Depth24Plus,
            (PixelFormat::DepthComponent, PixelType::Float) => F::Depth32Float,
            (PixelFormat::DepthStencil, PixelType::UnsignedInt248) => F::Depth24PlusStencil8,
            _ => return None,
        },
    };
    Some(format)
}

/// Strips row padding from client data and widens RGB texels to RGBA.
pub(crate) fn repack(image: &TexImage<'_>, data: &[u8], alignment: u32) -> anyhow::Result<Vec<u8>> {
    let component = image.ty.bytes() as usize;
    let texel = match image.ty {
        PixelType::UnsignedInt248 => 4,
        _ => image.format.channels() as usize * component,
    };
    let row = image.width as usize * texel;
    let stride = row.next_multiple_of(alignment.max(1) as usize);
    let rows = image.height as usize * image.depth.max(1) as usize;

    if rows == 0 || row == 0 {
        return Ok(Vec::new());
    }
    let needed = stride * (rows - 1) + row;
    if data.len() < needed {
        bail!(
            "{}x{}x{} {:?} image needs {} bytes but only {} were given",
            image.width,
            image.height,
            image.depth,
            image.format,
            needed,
            data.len()
        );
    }

    let widen = image.format == PixelFormat::Rgb;
    let alpha = opaque_alpha(image.ty);
    let out_texel = if widen { texel + alpha.len() } else { texel };
    let mut out = Vec::with_capacity(rows * image.width as usize * out_texel);

    for r in 0..rows {
        let src = &data[r * stride..r * stride + row];
        if widen {
            for rgb in src.chunks_exact(texel) {
                out.extend_from_slice(rgb);
                out.extend_from_slice(&alpha);
            }
        } else {
            out.extend_from_slice(src);
        }
    }

    Ok(out)
}

fn opaque_alpha(ty: PixelType) -> Vec<u8> {
    match ty {
        PixelType::Float => bytemuck::bytes_of(&1.0f32).to_vec(),
        // 1.0 in IEEE 754 binary16
        PixelType::HalfFloat => bytemuck::bytes_of(&0x3C00u16).to_vec(),
        PixelType::UnsignedByte => vec![u8::MAX],
        PixelType::Byte => vec![i8::MAX as u8],
        PixelType::UnsignedShort => bytemuck::bytes_of(&u16::MAX).to_vec(),
        PixelType::Short => bytemuck::bytes_of(&i16::MAX).to_vec(),
        PixelType::UnsignedInt | PixelType::UnsignedInt248 => bytemuck::bytes_of(&u32::MAX).to_vec(),
        PixelType::Int => bytemuck::bytes_of(&i32::MAX).to_vec(),
    }
}
