/**
 * This module contains all logic for loading textures from external files.
 */
pub mod texture;

pub use texture::TextureLoader;
