//! Scene entity handles.
//!
//! The scene graph itself lives outside this crate. Render lists only need a
//! stable identity and a couple of flags from each entity, so these types carry
//! exactly that. Entities are shared as `Rc` and must outlive the frame in
//! which a render item refers to them.

use std::sync::atomic::AtomicU32;

use uuid::Uuid;

use crate::data_structures::next_id;

static OBJECT_ID: AtomicU32 = AtomicU32::new(0);
static GEOMETRY_ID: AtomicU32 = AtomicU32::new(0);
static MATERIAL_ID: AtomicU32 = AtomicU32::new(0);
static PROGRAM_ID: AtomicU32 = AtomicU32::new(0);

/// A renderable object in the scene graph.
#[derive(Debug)]
pub struct Object3D {
    id: u32,
    uuid: Uuid,
    pub name: String,
    /// Overrides the sort order of otherwise equal items. Lower values render first.
    pub render_order: i32,
}

impl Object3D {
    pub fn new(name: &str) -> Self {
        Self {
            id: next_id(&OBJECT_ID),
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            render_order: 0,
        }
    }

    pub fn with_render_order(mut self, render_order: i32) -> Self {
        self.render_order = render_order;
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }
}

/// A sub-range of a geometry's index buffer drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeometryGroup {
    pub start: u32,
    pub count: u32,
    pub material_index: usize,
}

/// Vertex data shared by one or more objects.
#[derive(Debug)]
pub struct BufferGeometry {
    id: u32,
    uuid: Uuid,
    pub groups: Vec<GeometryGroup>,
}

impl BufferGeometry {
    pub fn new() -> Self {
        Self {
            id: next_id(&GEOMETRY_ID),
            uuid: Uuid::new_v4(),
            groups: Vec::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }
}

impl Default for BufferGeometry {
    fn default() -> Self {
        Self::new()
    }
}

/// Surface description. Only the properties that influence draw order are modelled.
#[derive(Debug)]
pub struct Material {
    id: u32,
    uuid: Uuid,
    pub name: String,
    /// Transparent materials go to the transparent bucket of a render list.
    pub transparent: bool,
}

impl Material {
    pub fn new(name: &str, transparent: bool) -> Self {
        Self {
            id: next_id(&MATERIAL_ID),
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            transparent,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }
}

/// A compiled and linked shader program.
#[derive(Debug)]
pub struct Program {
    id: u32,
    pub cache_key: String,
}

impl Program {
    pub fn new(cache_key: &str) -> Self {
        Self {
            id: next_id(&PROGRAM_ID),
            cache_key: cache_key.to_string(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}
