//! Render lists: per-frame draw call collection and ordering.
//!
//! Scene traversal pushes every visible object into a [`RenderList`]. The list
//! sorts its items into two buckets, opaque and transparent, and orders each
//! bucket so that draw calls sharing a program or material end up next to each
//! other. The submission stage then walks the buckets in order.
//!
//! # Key types
//!
//! - [`RenderList`] owns a pool of [`RenderItem`]s that survives across frames
//! - [`RenderLists`] hands out one list per scene and render call depth
//!
//! # Frame protocol
//!
//! 1. [`RenderList::init`] rewinds the pool cursor and empties both buckets
//! 2. [`RenderList::push`] / [`RenderList::unshift`] record the visible objects
//! 3. [`RenderList::sort`] orders both buckets
//! 4. the renderer reads [`RenderList::opaque`] and [`RenderList::transparent`]
//! 5. [`RenderList::finish`] releases references held by unused pool slots
//!

use std::{cmp::Ordering, collections::HashMap, rc::Rc};

use crate::data_structures::{
    properties::SharedProperties,
    render_item::RenderItem,
    scene::{BufferGeometry, GeometryGroup, Material, Object3D},
};

/// Front-to-back ordering used for opaque items.
///
/// Keys, each deciding only on inequality: group order, render order, program
/// id (only when both items have a program), material id, depth, object id.
pub fn painter_order(a: &RenderItem, b: &RenderItem) -> Ordering {
    a.group_order
        .cmp(&b.group_order)
        .then(a.render_order.cmp(&b.render_order))
        .then_with(|| match (&a.program, &b.program) {
            (Some(pa), Some(pb)) => pa.id().cmp(&pb.id()),
            _ => Ordering::Equal,
        })
        .then_with(|| a.material_id().cmp(&b.material_id()))
        .then_with(|| a.z.partial_cmp(&b.z).unwrap_or(Ordering::Equal))
        .then_with(|| a.id.cmp(&b.id))
}

/// Ordering used for transparent items.
///
/// Currently the same chain as [`painter_order`]; depth is not reversed.
pub fn reverse_painter_order(a: &RenderItem, b: &RenderItem) -> Ordering {
    painter_order(a, b)
}

/// Per-frame list of draw calls backed by a growing item pool.
#[derive(Debug)]
pub struct RenderList {
    properties: SharedProperties,

    render_items: Vec<RenderItem>,
    render_items_index: usize,

    opaque: Vec<usize>,
    transparent: Vec<usize>,

    scratch: Vec<usize>,
}

impl RenderList {
    pub fn new(properties: SharedProperties) -> Self {
        Self {
            properties,
            render_items: Vec::new(),
            render_items_index: 0,
            opaque: Vec::new(),
            transparent: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Starts a new frame. Pool slots are kept for reuse.
    pub fn init(&mut self) {
        self.render_items_index = 0;

        self.opaque.clear();
        self.transparent.clear();
    }

    /// Fills the pool slot under the cursor and returns its index.
    ///
    /// The pool grows by one slot when the cursor is past its end. A reused slot
    /// keeps its previous program when the material currently has none.
    pub fn get_next_render_item(
        &mut self,
        object: &Rc<Object3D>,
        geometry: &Rc<BufferGeometry>,
        material: &Rc<Material>,
        group_order: i32,
        z: f32,
        group: Option<GeometryGroup>,
    ) -> usize {
        let program = self
            .properties
            .borrow_mut()
            .materials
            .get(material.uuid())
            .program
            .clone();

        let index = self.render_items_index;

        if index >= self.render_items.len() {
            self.render_items.push(RenderItem {
                id: Some(object.id()),
                object: Some(object.clone()),
                geometry: Some(geometry.clone()),
                material: Some(material.clone()),
                program,
                group_order,
                render_order: object.render_order,
                z,
                group,
            });
        } else {
            let render_item = &mut self.render_items[index];

            render_item.id = Some(object.id());
            render_item.object = Some(object.clone());
            render_item.geometry = Some(geometry.clone());
            render_item.material = Some(material.clone());
            if program.is_some() {
                render_item.program = program;
            }
            render_item.group_order = group_order;
            render_item.render_order = object.render_order;
            render_item.z = z;
            render_item.group = group;
        }

        self.render_items_index += 1;

        index
    }

    /// Appends an object to the bucket matching its material.
    pub fn push(
        &mut self,
        object: &Rc<Object3D>,
        geometry: &Rc<BufferGeometry>,
        material: &Rc<Material>,
        group_order: i32,
        z: f32,
        group: Option<GeometryGroup>,
    ) {
        let index = self.get_next_render_item(object, geometry, material, group_order, z, group);

        if material.transparent {
            self.transparent.push(index);
        } else {
            self.opaque.push(index);
        }
    }

    /// Prepends an object to the bucket matching its material.
    pub fn unshift(
        &mut self,
        object: &Rc<Object3D>,
        geometry: &Rc<BufferGeometry>,
        material: &Rc<Material>,
        group_order: i32,
        z: f32,
        group: Option<GeometryGroup>,
    ) {
        let index = self.get_next_render_item(object, geometry, material, group_order, z, group);

        if material.transparent {
            self.transparent.insert(0, index);
        } else {
            self.opaque.insert(0, index);
        }
    }

    /// Stable sorts both buckets.
    pub fn sort(&mut self) {
        let Self {
            render_items,
            opaque,
            transparent,
            scratch,
            ..
        } = self;

        if opaque.len() > 1 {
            merge_sort(opaque, scratch, |a, b| {
                painter_order(&render_items[a], &render_items[b])
            });
        }
        if transparent.len() > 1 {
            merge_sort(transparent, scratch, |a, b| {
                reverse_painter_order(&render_items[a], &render_items[b])
            });
        }
    }

    /// Clears references held by pool slots that were not used this frame.
    ///
    /// Stops at the first slot that is already inactive: everything after it was
    /// cleared by an earlier frame.
    pub fn finish(&mut self) {
        for render_item in &mut self.render_items[self.render_items_index..] {
            if !render_item.is_active() {
                break;
            }

            render_item.invalidate();
        }
    }

    pub fn opaque(&self) -> impl ExactSizeIterator<Item = &RenderItem> + '_ {
        self.opaque.iter().map(|&i| &self.render_items[i])
    }

    pub fn transparent(&self) -> impl ExactSizeIterator<Item = &RenderItem> + '_ {
        self.transparent.iter().map(|&i| &self.render_items[i])
    }

    /// The whole pool, including slots past the live cursor.
    pub fn render_items(&self) -> &[RenderItem] {
        &self.render_items
    }

    /// Number of items recorded since the last [`init`](Self::init).
    pub fn live_len(&self) -> usize {
        self.render_items_index
    }
}

/// Bottom-up stable merge sort over pool indices.
///
/// The painter comparator skips the program key when one side has no program and
/// is not transitive for every input, which `slice::sort_by` may reject.
fn merge_sort<F>(indices: &mut [usize], scratch: &mut Vec<usize>, mut compare: F)
where
    F: FnMut(usize, usize) -> Ordering,
{
    let len = indices.len();
    scratch.clear();
    scratch.extend_from_slice(indices);

    let mut in_scratch = false;
    {
        let mut src: &mut [usize] = indices;
        let mut dst: &mut [usize] = scratch.as_mut_slice();
        let mut width = 1;

        while width < len {
            let mut start = 0;
            while start < len {
                let mid = (start + width).min(len);
                let end = (start + 2 * width).min(len);
                merge(&src[start..mid], &src[mid..end], &mut dst[start..end], &mut compare);
                start = end;
            }
            std::mem::swap(&mut src, &mut dst);
            in_scratch = !in_scratch;
            width *= 2;
        }
    }

    if in_scratch {
        indices.copy_from_slice(&scratch[..]);
    }
}

fn merge<F>(left: &[usize], right: &[usize], out: &mut [usize], compare: &mut F)
where
    F: FnMut(usize, usize) -> Ordering,
{
    let (mut l, mut r) = (0, 0);
    for slot in out.iter_mut() {
        let take_right = l == left.len()
            || (r < right.len() && compare(right[r], left[l]) == Ordering::Less);
        if take_right {
            *slot = right[r];
            r += 1;
        } else {
            *slot = left[l];
            l += 1;
        }
    }
}

/// Render lists keyed by scene and render call depth.
///
/// Rendering a scene from inside another render (reflections, portals) needs a
/// list of its own, otherwise the inner frame would overwrite the outer one.
#[derive(Debug)]
pub struct RenderLists {
    properties: SharedProperties,
    lists: HashMap<u32, Vec<RenderList>>,
}

impl RenderLists {
    pub fn new(properties: SharedProperties) -> Self {
        Self {
            properties,
            lists: HashMap::new(),
        }
    }

    pub fn get(&mut self, scene_id: u32, render_call_depth: usize) -> &mut RenderList {
        let lists = self.lists.entry(scene_id).or_default();
        while lists.len() <= render_call_depth {
            lists.push(RenderList::new(self.properties.clone()));
        }
        &mut lists[render_call_depth]
    }

    /// Drops every list and its pool.
    pub fn dispose(&mut self) {
        self.lists.clear();
    }
}
