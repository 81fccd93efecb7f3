//! Engine data structures consumed and produced by the render lists and the
//! texture manager.
//!
//! - `scene` holds the narrow scene entity handles (objects, geometries, materials, programs)
//! - `texture` holds the CPU side texture description and its pixel sources
//! - `properties` holds the GPU side records keyed by entity uuid
//! - `render_item` holds the pooled draw call descriptor

use std::sync::atomic::{AtomicU32, Ordering};

pub mod properties;
pub mod render_item;
pub mod scene;
pub mod texture;

/// Hands out the next id of a per-kind counter. Ids start at 0 and are never reused.
pub(crate) fn next_id(counter: &AtomicU32) -> u32 {
    counter.fetch_add(1, Ordering::Relaxed)
}
