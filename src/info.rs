//! Renderer statistics.

use std::{cell::RefCell, rc::Rc};

/// Device memory counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryInfo {
    /// Textures with a live device object.
    pub textures: u32,
}

/// Statistics sink updated by the resource managers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Info {
    pub memory: MemoryInfo,
}

impl Info {
    pub fn shared() -> SharedInfo {
        Rc::new(RefCell::new(Self::default()))
    }
}

pub type SharedInfo = Rc<RefCell<Info>>;
