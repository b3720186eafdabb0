//! The device interface the geometry pass records through
//!
//! [`GBufferPass`](crate::pipeline::GBufferPass) never touches wgpu types; it
//! only sees the opaque handles below and the [`GraphicsBackend`] trait.

use crate::backend::types::*;
use std::ops::Range;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create device: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create pipeline: {0}")]
    PipelineCreationFailed(String),
    #[error("Failed to create shader: {0}")]
    ShaderCreationFailed(String),
    #[error("Readback failed: {0}")]
    ReadbackFailed(String),
    #[error("No frame is being recorded")]
    NoActiveFrame,
}

pub type BackendResult<T> = Result<T, BackendError>;

macro_rules! handles {
    ($($(#[$meta:meta])* $name:ident;)+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(pub(crate) u64);
        )+
    };
}

handles! {
    BufferHandle;
    TextureHandle;
    /// Full view of a texture; released together with its texture
    TextureViewHandle;
    SamplerHandle;
    RenderPipelineHandle;
    BindGroupHandle;
    BindGroupLayoutHandle;
}

/// Resource bound at one binding slot
#[derive(Debug, Clone, Copy)]
pub enum BindGroupEntry {
    /// Whole uniform buffer
    Buffer(BufferHandle),
    Texture(TextureViewHandle),
    Sampler(SamplerHandle),
}

/// Shader stages that can see a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Vertex,
    Fragment,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingType {
    UniformBuffer,
    /// Filterable float 2D texture
    Texture,
    /// Filtering sampler
    Sampler,
}

#[derive(Debug, Clone, Copy)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: Visibility,
    pub ty: BindingType,
}

/// Triangle-list pipeline with `vs_main`/`fs_main` entry points and no blending
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor {
    pub label: Option<String>,
    pub shader: String,
    pub vertex_layout: VertexBufferLayout,
    pub bind_group_layouts: Vec<BindGroupLayoutHandle>,
    pub front_face: FrontFace,
    pub cull_mode: CullMode,
    pub depth_format: TextureFormat,
    pub depth_compare: CompareFunction,
    pub color_formats: Vec<TextureFormat>,
}

/// Color target, cleared when the pass starts and stored when it ends
#[derive(Debug, Clone, Copy)]
pub struct ColorAttachment {
    pub view: TextureViewHandle,
    pub clear: [f32; 4],
}

#[derive(Debug, Clone, Copy)]
pub struct DepthAttachment {
    pub view: TextureViewHandle,
    pub clear: f32,
}

#[derive(Debug, Clone)]
pub struct RenderPassDescriptor {
    pub label: Option<String>,
    pub color_attachments: Vec<ColorAttachment>,
    pub depth_attachment: DepthAttachment,
}

/// Number of objects a backend currently owns, per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveResources {
    pub buffers: usize,
    pub textures: usize,
    pub texture_views: usize,
    pub samplers: usize,
    pub bind_group_layouts: usize,
    pub bind_groups: usize,
    pub render_pipelines: usize,
}

pub trait GraphicsBackend {
    /// Human readable backend name, used in logs
    fn name(&self) -> &str;

    /// Open a command encoder for the next batch of passes
    fn begin_frame(&mut self) -> BackendResult<()>;

    /// Submit everything recorded since `begin_frame`
    fn end_frame(&mut self) -> BackendResult<()>;

    /// Fails on empty `data`
    fn create_buffer_init(&mut self, desc: &BufferDescriptor, data: &[u8])
        -> BackendResult<BufferHandle>;

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]);

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    fn create_texture_view(&mut self, texture: TextureHandle) -> BackendResult<TextureViewHandle>;

    /// Upload tightly packed texels covering the whole texture
    fn write_texture(&mut self, texture: TextureHandle, data: &[u8]);

    /// Copy a texture back to the CPU, rows tightly packed
    fn read_texture(&mut self, texture: TextureHandle) -> BackendResult<Vec<u8>>;

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle>;

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle>;

    /// `entries` pairs binding numbers with resources
    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle>;

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle>;

    // Commands between `begin_render_pass` and `end_render_pass` are recorded
    // into the pass; outside of a pass they are ignored.

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor);

    fn end_render_pass(&mut self);

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle);

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle);

    /// Bind a whole vertex buffer
    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle);

    /// Bind a whole `u32` index buffer
    fn set_index_buffer(&mut self, buffer: BufferHandle);

    /// One instance, base vertex 0
    fn draw_indexed(&mut self, indices: Range<u32>);

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Also releases every view created from `texture`
    fn destroy_texture(&mut self, texture: TextureHandle);

    fn destroy_texture_view(&mut self, view: TextureViewHandle);

    fn destroy_sampler(&mut self, sampler: SamplerHandle);

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle);

    fn live_resources(&self) -> LiveResources;
}
