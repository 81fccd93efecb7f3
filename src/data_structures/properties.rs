//! GPU side records kept next to scene entities.
//!
//! Entities do not know about the device. Everything the renderer has to
//! remember about them lives in side tables keyed by the entity's uuid: a record
//! is created on first access and only ever removed explicitly, usually when the
//! entity is disposed. Callers must not hold on to a record across a removal.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use uuid::Uuid;

use crate::{data_structures::scene::Program, state::TextureHandle};

/// Side table of per-entity records.
#[derive(Debug)]
pub struct PropertyMap<T> {
    records: HashMap<Uuid, T>,
}

impl<T: Default> PropertyMap<T> {
    /// Returns the record for `uuid`, creating a default one on first access.
    pub fn get(&mut self, uuid: Uuid) -> &mut T {
        self.records.entry(uuid).or_default()
    }
}

impl<T> PropertyMap<T> {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Looks a record up without creating it.
    pub fn peek(&self, uuid: Uuid) -> Option<&T> {
        self.records.get(&uuid)
    }

    pub fn remove(&mut self, uuid: Uuid) -> Option<T> {
        self.records.remove(&uuid)
    }

    pub fn contains(&self, uuid: Uuid) -> bool {
        self.records.contains_key(&uuid)
    }
}

impl<T> Default for PropertyMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Device state of one texture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureProperties {
    /// Device object, present once `init` is set.
    pub texture: Option<TextureHandle>,
    pub init: bool,
    /// Last uploaded [`Texture::version`](crate::data_structures::texture::Texture::version).
    pub version: u32,
    pub max_mip_level: u32,
}

/// Renderer state of one material.
#[derive(Debug, Clone, Default)]
pub struct MaterialProperties {
    /// Program the material is currently compiled to.
    pub program: Option<Rc<Program>>,
}

/// All side tables of a renderer.
#[derive(Debug, Default)]
pub struct Properties {
    pub textures: PropertyMap<TextureProperties>,
    pub materials: PropertyMap<MaterialProperties>,
}

impl Properties {
    pub fn shared() -> SharedProperties {
        Rc::new(RefCell::new(Self::default()))
    }
}

/// The render lists and the texture manager share one set of side tables.
pub type SharedProperties = Rc<RefCell<Properties>>;
