//! flow-residency
//!
//! The part of a renderer that sits between scene traversal and draw
//! submission: it collects and orders draw calls per frame and keeps device
//! textures in sync with their CPU side description.
//!
//! High-level modules
//! - `context`: headless wgpu device/queue and the limits the crate checks against
//! - `data_structures`: scene entities, textures, render items and side tables
//! - `info`: resident resource counters
//! - `render`: render lists, their item pool and the painter ordering
//! - `resources`: texture loading from files and URLs
//! - `state`: the device binding layer and its wgpu implementation
//! - `textures`: version-tracked texture upload, unit allocation and disposal
//!

pub mod context;
pub mod data_structures;
pub mod info;
pub mod render;
pub mod resources;
pub mod state;
pub mod textures;

// Re-exports commonly used types for convenience in downstream code.
pub use context::{Capabilities, Context, init_logger};
pub use data_structures::{
    properties::{Properties, SharedProperties},
    render_item::RenderItem,
    texture::{SharedTexture, Texture},
};
pub use info::{Info, SharedInfo};
pub use render::{RenderList, RenderLists};
pub use resources::TextureLoader;
pub use state::{GpuState, WgpuState};
pub use textures::Textures;
