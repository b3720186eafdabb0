//! Camera, placement and visibility helpers for the geometry pass

mod bounds;
mod camera;
mod transform;

pub use bounds::*;
pub use camera::*;
pub use transform::*;
