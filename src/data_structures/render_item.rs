//! Pooled draw call descriptor.

use std::rc::Rc;

use crate::data_structures::scene::{BufferGeometry, GeometryGroup, Material, Object3D, Program};

/// One draw call candidate.
///
/// Items are owned by the pool of a [`RenderList`](crate::render::RenderList)
/// and overwritten in place every frame. An item with `id == None` has been
/// invalidated and holds no references.
#[derive(Debug, Clone, Default)]
pub struct RenderItem {
    /// Id of the object this item draws.
    pub id: Option<u32>,
    pub object: Option<Rc<Object3D>>,
    pub geometry: Option<Rc<BufferGeometry>>,
    pub material: Option<Rc<Material>>,
    /// Program of the material. May be left over from an earlier frame, see
    /// [`RenderList::get_next_render_item`](crate::render::RenderList::get_next_render_item).
    pub program: Option<Rc<Program>>,
    pub group_order: i32,
    pub render_order: i32,
    /// View space depth.
    pub z: f32,
    pub group: Option<GeometryGroup>,
}

impl RenderItem {
    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }

    pub(crate) fn material_id(&self) -> Option<u32> {
        self.material.as_ref().map(|material| material.id())
    }

    /// Drops all references and marks the item inactive.
    pub(crate) fn invalidate(&mut self) {
        self.id = None;
        self.object = None;
        self.geometry = None;
        self.material = None;
        self.program = None;
        self.group = None;
    }
}
