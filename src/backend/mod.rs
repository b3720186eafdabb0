//! Backend abstraction layer
//!
//! Provides the trait the G-buffer pass records against and the headless
//! wgpu implementation of it.

pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use traits::*;
pub use types::*;
