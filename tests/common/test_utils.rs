#![allow(dead_code)]

use std::rc::Rc;

use flow_residency::{
    context::Capabilities,
    data_structures::{
        properties::{Properties, SharedProperties},
        scene::{BufferGeometry, Material, Object3D, Program},
        texture::{Image, Texture},
    },
    info::{Info, SharedInfo},
    state::{
        Attachment, FramebufferHandle, GpuState, InternalFormat, SamplerParameters, TexImage,
        TextureHandle, TextureTarget,
    },
    textures::Textures,
};

/// A device call as seen by [`RecordingState`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateTexture(TextureHandle),
    DeleteTexture(TextureHandle),
    ActiveTexture(u32),
    BindTexture(TextureTarget, Option<TextureHandle>),
    UnpackAlignment(u32),
    TexParameters(TextureTarget, SamplerParameters),
    TexImage2D {
        target: TextureTarget,
        level: u32,
        internal_format: InternalFormat,
        width: u32,
        height: u32,
        has_data: bool,
    },
    TexImage3D {
        target: TextureTarget,
        level: u32,
        internal_format: InternalFormat,
        width: u32,
        height: u32,
        depth: u32,
        has_data: bool,
    },
    GenerateMipmap(TextureTarget),
    BindFramebuffer(Option<FramebufferHandle>),
    FramebufferTexture2D(Attachment, TextureTarget, Option<TextureHandle>, u32),
}

/// Device double that records every call instead of talking to a GPU.
#[derive(Debug, Default)]
pub struct RecordingState {
    pub calls: Vec<Call>,
    next_texture: u32,
}

impl RecordingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploads(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::TexImage2D { .. } | Call::TexImage3D { .. }))
            .count()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn last_bind(&self) -> Option<&Call> {
        self.calls
            .iter()
            .rev()
            .find(|call| matches!(call, Call::BindTexture(..)))
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl GpuState for RecordingState {
    fn create_texture(&mut self) -> TextureHandle {
        self.next_texture += 1;
        let handle = TextureHandle(self.next_texture);
        self.calls.push(Call::CreateTexture(handle));
        handle
    }

    fn delete_texture(&mut self, handle: TextureHandle) {
        self.calls.push(Call::DeleteTexture(handle));
    }

    fn active_texture(&mut self, unit: u32) {
        self.calls.push(Call::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, target: TextureTarget, handle: Option<TextureHandle>) {
        self.calls.push(Call::BindTexture(target, handle));
    }

    fn pixel_store_unpack_alignment(&mut self, alignment: u32) {
        self.calls.push(Call::UnpackAlignment(alignment));
    }

    fn tex_parameters(&mut self, target: TextureTarget, parameters: &SamplerParameters) {
        self.calls.push(Call::TexParameters(target, *parameters));
    }

    fn tex_image_2d(&mut self, image: TexImage<'_>) {
        self.calls.push(Call::TexImage2D {
            target: image.target,
            level: image.level,
            internal_format: image.internal_format,
            width: image.width,
            height: image.height,
            has_data: image.data.is_some(),
        });
    }

    fn tex_image_3d(&mut self, image: TexImage<'_>) {
        self.calls.push(Call::TexImage3D {
            target: image.target,
            level: image.level,
            internal_format: image.internal_format,
            width: image.width,
            height: image.height,
            depth: image.depth,
            has_data: image.data.is_some(),
        });
    }

    fn generate_mipmap(&mut self, target: TextureTarget) {
        self.calls.push(Call::GenerateMipmap(target));
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.calls.push(Call::BindFramebuffer(framebuffer));
    }

    fn framebuffer_texture_2d(
        &mut self,
        attachment: Attachment,
        target: TextureTarget,
        handle: Option<TextureHandle>,
        level: u32,
    ) {
        self.calls
            .push(Call::FramebufferTexture2D(attachment, target, handle, level));
    }
}

pub struct TestTextures {
    pub textures: Textures<RecordingState>,
    pub properties: SharedProperties,
    pub info: SharedInfo,
}

pub fn test_textures(max_textures: u32) -> TestTextures {
    let properties = Properties::shared();
    let info = Info::shared();
    let textures = Textures::new(
        RecordingState::new(),
        properties.clone(),
        info.clone(),
        Capabilities {
            max_textures,
            max_texture_size: 4096,
        },
    );

    TestTextures {
        textures,
        properties,
        info,
    }
}

/// `width` x `height` RGBA8 texture filled with `value`.
pub fn rgba_texture(width: u32, height: u32, value: u8) -> Texture {
    let data = vec![value; (width * height * 4) as usize];
    Texture::new(Some(Image::new(width, height, data)))
}

pub fn object(render_order: i32) -> Rc<Object3D> {
    Rc::new(Object3D::new("object").with_render_order(render_order))
}

pub fn geometry() -> Rc<BufferGeometry> {
    Rc::new(BufferGeometry::new())
}

pub fn material(transparent: bool) -> Rc<Material> {
    Rc::new(Material::new("material", transparent))
}

pub fn assign_program(properties: &SharedProperties, material: &Material, cache_key: &str) -> Rc<Program> {
    let program = Rc::new(Program::new(cache_key));
    properties
        .borrow_mut()
        .materials
        .get(material.uuid())
        .program = Some(program.clone());
    program
}
