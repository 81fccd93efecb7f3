//! Texture residency.
//!
//! [`Textures`] keeps device copies of scene textures current. Every bind goes
//! through one of the `set_texture_*` methods, which compare the texture's
//! version with the version last uploaded and only re-upload when they differ.
//!
//! A texture moves through three states:
//!
//! - unregistered: no record in the texture side table
//! - allocated: a device object exists, nothing uploaded yet
//! - uploaded: the record holds the version that was last sent to the device
//!
//! Device objects are released when the texture is disposed or explicitly
//! deallocated. Nothing here is fatal: inconsistent input is logged and the last
//! known device object is bound instead.

use std::{
    cell::{Ref, RefCell, RefMut},
    rc::{Rc, Weak},
};

use uuid::Uuid;

use crate::{
    context::Capabilities,
    data_structures::{
        properties::{SharedProperties, TextureProperties},
        texture::{DataType, DisposeListener, Filter, Format, RenderTarget, Texture, Wrapping},
    },
    info::SharedInfo,
    state::{
        Attachment, FramebufferHandle, GpuState, InternalFormat, PixelFormat, PixelType,
        RenderbufferHandle, SamplerParameters, TexImage, TextureHandle, TextureTarget,
    },
};

pub fn wrapping_to_address_mode(wrapping: Wrapping) -> wgpu::AddressMode {
    match wrapping {
        Wrapping::Repeat => wgpu::AddressMode::Repeat,
        Wrapping::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        Wrapping::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

/// Splits a filter into its texel filter and its filter between mip levels.
pub fn filter_to_modes(filter: Filter) -> (wgpu::FilterMode, Option<wgpu::MipmapFilterMode>) {
    match filter {
        Filter::Nearest => (wgpu::FilterMode::Nearest, None),
        Filter::NearestMipmapNearest => (
            wgpu::FilterMode::Nearest,
            Some(wgpu::MipmapFilterMode::Nearest),
        ),
        Filter::NearestMipmapLinear => (
            wgpu::FilterMode::Nearest,
            Some(wgpu::MipmapFilterMode::Linear),
        ),
        Filter::Linear => (wgpu::FilterMode::Linear, None),
        Filter::LinearMipmapNearest => (
            wgpu::FilterMode::Linear,
            Some(wgpu::MipmapFilterMode::Nearest),
        ),
        Filter::LinearMipmapLinear => (
            wgpu::FilterMode::Linear,
            Some(wgpu::MipmapFilterMode::Linear),
        ),
    }
}

pub fn sampler_parameters(texture: &Texture) -> SamplerParameters {
    let (mag_filter, _) = filter_to_modes(texture.mag_filter);
    let (min_filter, mipmap_filter) = filter_to_modes(texture.min_filter);

    SamplerParameters {
        wrap_s: wrapping_to_address_mode(texture.wrap_s),
        wrap_t: wrapping_to_address_mode(texture.wrap_t),
        wrap_r: wrapping_to_address_mode(texture.wrap_r),
        mag_filter,
        min_filter,
        mipmap_filter,
    }
}

pub fn convert_format(format: Format) -> PixelFormat {
    match format {
        Format::Alpha => PixelFormat::Alpha,
        Format::Red => PixelFormat::Red,
        Format::RedInteger => PixelFormat::RedInteger,
        Format::Rg => PixelFormat::Rg,
        Format::RgInteger => PixelFormat::RgInteger,
        Format::Rgb => PixelFormat::Rgb,
        Format::Rgba => PixelFormat::Rgba,
        Format::RgbaInteger => PixelFormat::RgbaInteger,
        Format::Luminance => PixelFormat::Luminance,
        Format::LuminanceAlpha => PixelFormat::LuminanceAlpha,
        Format::Depth => PixelFormat::DepthComponent,
        Format::DepthStencil => PixelFormat::DepthStencil,
    }
}

pub fn convert_type(data_type: DataType) -> PixelType {
    match data_type {
        DataType::UnsignedByte => PixelType::UnsignedByte,
        DataType::Byte => PixelType::Byte,
        DataType::Short => PixelType::Short,
        DataType::UnsignedShort => PixelType::UnsignedShort,
        DataType::Int => PixelType::Int,
        DataType::UnsignedInt => PixelType::UnsignedInt,
        DataType::Float => PixelType::Float,
        DataType::HalfFloat => PixelType::HalfFloat,
        DataType::UnsignedInt248 => PixelType::UnsignedInt248,
    }
}

/// Sized storage format for a format/type pair.
///
/// Pairs without a sized counterpart keep their base format.
pub fn internal_format(format: PixelFormat, ty: PixelType) -> InternalFormat {
    match (format, ty) {
        (PixelFormat::Red, PixelType::Float) => InternalFormat::R32F,
        (PixelFormat::Red, PixelType::HalfFloat) => InternalFormat::R16F,
        (PixelFormat::Red, PixelType::UnsignedByte) => InternalFormat::R8,

        (PixelFormat::Rgb, PixelType::Float) => InternalFormat::Rgb32F,
        (PixelFormat::Rgb, PixelType::HalfFloat) => InternalFormat::Rgb16F,
        (PixelFormat::Rgb, PixelType::UnsignedByte) => InternalFormat::Rgb8,

        (PixelFormat::Rgba, PixelType::Float) => InternalFormat::Rgba32F,
        (PixelFormat::Rgba, PixelType::HalfFloat) => InternalFormat::Rgba16F,
        (PixelFormat::Rgba, PixelType::UnsignedByte) => InternalFormat::Rgba8,

        (format, _) => InternalFormat::Base(format),
    }
}

fn texture_needs_generate_mipmaps(texture: &Texture) -> bool {
    texture.generate_mipmaps && texture.min_filter.uses_mipmaps()
}

/// Number of the smallest mip level a full chain of a `width` x `height` image has.
pub fn max_mip_level(width: u32, height: u32) -> u32 {
    width.max(height).checked_ilog2().unwrap_or(0)
}

struct TexturesInner<S> {
    state: S,
    properties: SharedProperties,
    info: SharedInfo,
    capabilities: Capabilities,
    texture_units: u32,
}

impl<S: GpuState> TexturesInner<S> {
    /// Allocates the device object of `texture` on first use.
    fn init_texture(
        &mut self,
        texture: &mut Texture,
        on_dispose: &Rc<dyn DisposeListener>,
    ) -> TextureHandle {
        let mut properties = self.properties.borrow_mut();
        let record = properties.textures.get(texture.uuid());

        if let (true, Some(handle)) = (record.init, record.texture) {
            return handle;
        }

        let handle = self.state.create_texture();
        record.init = true;
        record.texture = Some(handle);

        texture.set_dispose_listener(on_dispose.clone());

        self.info.borrow_mut().memory.textures += 1;
        log::debug!("Allocated {:?} for texture '{}'", handle, texture.name);

        handle
    }

    fn bind(&mut self, uuid: Uuid, unit: u32, target: TextureTarget) {
        let handle = self
            .properties
            .borrow()
            .textures
            .peek(uuid)
            .and_then(|record| record.texture);

        self.state.active_texture(unit);
        self.state.bind_texture(target, handle);
    }

    fn tex_image(&mut self, image: TexImage<'_>) {
        if image.target.is_volumetric() {
            self.state.tex_image_3d(image);
        } else {
            self.state.tex_image_2d(image);
        }
    }

    fn upload_texture(
        &mut self,
        texture: &mut Texture,
        unit: u32,
        target: TextureTarget,
        on_dispose: &Rc<dyn DisposeListener>,
    ) {
        let Some((width, height)) = texture.image.as_ref().map(|image| (image.width, image.height))
        else {
            return;
        };

        let handle = self.init_texture(texture, on_dispose);

        self.state.active_texture(unit);
        self.state.bind_texture(target, Some(handle));

        self.state
            .pixel_store_unpack_alignment(texture.unpack_alignment);

        if width.max(height) > self.capabilities.max_texture_size {
            log::warn!(
                "Texture '{}' is {}x{} but this device supports at most {}",
                texture.name,
                width,
                height,
                self.capabilities.max_texture_size
            );
        }

        let format = convert_format(texture.format);
        let ty = convert_type(texture.data_type);
        let internal_format = internal_format(format, ty);

        self.state
            .tex_parameters(target, &sampler_parameters(texture));

        // manual mipmaps win; otherwise upload level 0 and let the device fill the chain
        let mut max_level = if !texture.mipmaps.is_empty() {
            for (level, mipmap) in texture.mipmaps.iter().enumerate() {
                self.tex_image(TexImage {
                    target,
                    level: level as u32,
                    internal_format,
                    width: mipmap.width,
                    height: mipmap.height,
                    depth: mipmap.depth,
                    format,
                    ty,
                    data: Some(mipmap.data()),
                });
            }

            texture.generate_mipmaps = false;
            texture.mipmaps.len() as u32 - 1
        } else {
            if let Some(image) = texture.image.as_ref() {
                self.tex_image(TexImage {
                    target,
                    level: 0,
                    internal_format,
                    width: image.width,
                    height: image.height,
                    depth: image.depth,
                    format,
                    ty,
                    data: Some(image.data()),
                });
            }
            0
        };

        if texture_needs_generate_mipmaps(texture) {
            self.state.generate_mipmap(target);
            max_level = max_mip_level(width, height);
        }

        {
            let mut properties = self.properties.borrow_mut();
            let record = properties.textures.get(texture.uuid());
            record.max_mip_level = max_level;
            record.version = texture.version();
        }

        log::debug!(
            "Uploaded texture '{}' version {} ({} mip levels)",
            texture.name,
            texture.version(),
            max_level + 1
        );
    }

    /// Releases the device object of `uuid` and forgets its record.
    fn deallocate(&mut self, uuid: Uuid) -> bool {
        let record = self.properties.borrow_mut().textures.remove(uuid);

        match record {
            Some(TextureProperties {
                init: true,
                texture: Some(handle),
                ..
            }) => {
                self.state.delete_texture(handle);

                let mut info = self.info.borrow_mut();
                info.memory.textures = info.memory.textures.saturating_sub(1);
                log::debug!("Released {:?}", handle);
                true
            }
            _ => false,
        }
    }
}

/// Dispose hook registered on every texture with a device object.
struct TextureDisposeListener<S> {
    inner: Weak<RefCell<TexturesInner<S>>>,
}

impl<S: GpuState> DisposeListener for TextureDisposeListener<S> {
    fn on_dispose(&self, texture: &Texture) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        match inner.try_borrow_mut() {
            Ok(mut inner) => {
                inner.deallocate(texture.uuid());
            }
            Err(_) => log::error!(
                "Texture '{}' was disposed while its texture manager was busy; the device object leaks",
                texture.name
            ),
        }
    }
}

/// Uploads, binds and releases device textures.
pub struct Textures<S: GpuState> {
    inner: Rc<RefCell<TexturesInner<S>>>,
    on_texture_dispose: Rc<dyn DisposeListener>,
}

impl<S: GpuState + 'static> Textures<S> {
    pub fn new(
        state: S,
        properties: SharedProperties,
        info: SharedInfo,
        capabilities: Capabilities,
    ) -> Self {
        let inner = Rc::new(RefCell::new(TexturesInner {
            state,
            properties,
            info,
            capabilities,
            texture_units: 0,
        }));
        let on_texture_dispose: Rc<dyn DisposeListener> = Rc::new(TextureDisposeListener {
            inner: Rc::downgrade(&inner),
        });

        Self {
            inner,
            on_texture_dispose,
        }
    }

    pub fn state(&self) -> Ref<'_, S> {
        Ref::map(self.inner.borrow(), |inner| &inner.state)
    }

    pub fn state_mut(&self) -> RefMut<'_, S> {
        RefMut::map(self.inner.borrow_mut(), |inner| &mut inner.state)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.borrow().capabilities
    }

    /// Snapshot of the device record of `texture`, if it has one.
    pub fn texture_properties(&self, texture: &Texture) -> Option<TextureProperties> {
        let inner = self.inner.borrow();
        let record = inner.properties.borrow().textures.peek(texture.uuid()).cloned();
        record
    }

    pub fn texture_handle(&self, texture: &Texture) -> Option<TextureHandle> {
        self.texture_properties(texture)
            .and_then(|record| record.texture)
    }

    pub fn reset_texture_units(&self) {
        self.inner.borrow_mut().texture_units = 0;
    }

    /// Hands out the next free texture unit.
    ///
    /// Running past the device limit is reported but the unit is still returned.
    pub fn allocate_texture_unit(&self) -> u32 {
        let mut inner = self.inner.borrow_mut();
        let texture_unit = inner.texture_units;

        if texture_unit >= inner.capabilities.max_textures {
            log::error!(
                "Trying to use {} texture units while this GPU supports only {}",
                texture_unit,
                inner.capabilities.max_textures
            );
        }

        inner.texture_units += 1;

        texture_unit
    }

    pub fn set_texture_2d(&self, texture: &mut Texture, unit: u32) {
        self.set_texture(texture, unit, TextureTarget::Texture2D);
    }

    pub fn set_texture_3d(&self, texture: &mut Texture, unit: u32) {
        self.set_texture(texture, unit, TextureTarget::Texture3D);
    }

    pub fn set_texture_2d_array(&self, texture: &mut Texture, unit: u32) {
        self.set_texture(texture, unit, TextureTarget::Texture2DArray);
    }

    pub fn set_texture_cube(&self, texture: &mut Texture, unit: u32) {
        self.set_texture(texture, unit, TextureTarget::CubeMap);
    }

    /// Makes `texture` current on `unit`, uploading it first if its version moved.
    ///
    /// `on_update` runs after the manager is released, so it may call back into it.
    fn set_texture(&self, texture: &mut Texture, unit: u32, target: TextureTarget) {
        if self.bind_or_upload(texture, unit, target) {
            texture.notify_update();
        }
    }

    /// Returns whether `texture` was uploaded.
    fn bind_or_upload(&self, texture: &mut Texture, unit: u32, target: TextureTarget) -> bool {
        let mut inner = self.inner.borrow_mut();

        let uploaded_version = inner
            .properties
            .borrow_mut()
            .textures
            .get(texture.uuid())
            .version;

        if texture.version() > 0 && uploaded_version != texture.version() {
            if texture.image.is_none() {
                log::error!(
                    "Texture '{}' marked for update but image is undefined",
                    texture.name
                );
            } else if target == TextureTarget::CubeMap {
                self.upload_cube_texture(texture, unit);
                return false;
            } else {
                inner.upload_texture(texture, unit, target, &self.on_texture_dispose);
                return true;
            }
        }

        inner.bind(texture.uuid(), unit, target);
        false
    }

    fn upload_cube_texture(&self, texture: &Texture, unit: u32) {
        log::warn!(
            "Cube texture '{}' on unit {} was not uploaded: cube maps are not supported yet",
            texture.name,
            unit
        );
    }

    /// Releases the device object of `texture`. Returns `false` if it had none.
    pub fn deallocate_texture(&self, texture: &mut Texture) -> bool {
        texture.remove_dispose_listener();
        self.inner.borrow_mut().deallocate(texture.uuid())
    }

    /// Allocates render target storage for `texture` and attaches it to `framebuffer`.
    pub fn setup_framebuffer_texture(
        &self,
        framebuffer: FramebufferHandle,
        render_target: &RenderTarget,
        texture: &mut Texture,
        attachment: Attachment,
        target: TextureTarget,
    ) {
        let mut inner = self.inner.borrow_mut();

        let handle = inner.init_texture(texture, &self.on_texture_dispose);
        inner.state.bind_texture(target, Some(handle));
        inner
            .state
            .tex_parameters(target, &sampler_parameters(texture));

        let format = convert_format(texture.format);
        let ty = convert_type(texture.data_type);

        inner.tex_image(TexImage {
            target,
            level: 0,
            internal_format: internal_format(format, ty),
            width: render_target.width,
            height: render_target.height,
            depth: if target.is_volumetric() {
                render_target.depth
            } else {
                1
            },
            format,
            ty,
            data: None,
        });

        inner.state.bind_framebuffer(Some(framebuffer));
        inner
            .state
            .framebuffer_texture_2d(attachment, target, Some(handle), 0);
        inner.state.bind_framebuffer(None);
    }

    /// Depth/stencil and multisample render buffers are not supported yet.
    pub fn setup_render_buffer_storage(
        &self,
        renderbuffer: RenderbufferHandle,
        render_target: &RenderTarget,
        is_multisample: bool,
    ) {
        log::warn!(
            "Render buffer storage for {:?} ({}x{}, multisample: {}) is not supported yet",
            renderbuffer,
            render_target.width,
            render_target.height,
            is_multisample
        );
    }
}
