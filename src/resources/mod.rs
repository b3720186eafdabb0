//! Resource management
//!
//! Handles loading and management of meshes, textures, and materials.

mod material;
mod mesh;
mod texture;

pub use material::*;
pub use mesh::*;
pub use texture::*;

use crate::backend::types::TextureFormat;
use thiserror::Error;

/// Errors raised while loading or building resources
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Failed to decode image '{name}': {source}")]
    Image {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("Texture '{name}' expects {expected} bytes, got {actual}")]
    SizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("Texture format {0:?} is not supported for material textures")]
    UnsupportedFormat(TextureFormat),
    #[error("Surface index buffer references vertex {index} but only {count} vertices exist")]
    IndexOutOfRange { index: u32, count: usize },
}
