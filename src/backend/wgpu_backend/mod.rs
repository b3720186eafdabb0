//! Headless wgpu implementation of [`GraphicsBackend`]
//!
//! Everything renders into offscreen textures. Pass commands are queued
//! between `begin_render_pass` and `end_render_pass`, then replayed into one
//! `wgpu::RenderPass` because a wgpu pass borrows every resource it uses.

use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::HashMap;
use std::ops::Range;
use wgpu::util::DeviceExt;

/// Objects of one kind, addressed by never-reused ids
struct Registry<T> {
    items: HashMap<u64, T>,
    next_id: u64,
}

impl<T> Registry<T> {
    fn new() -> Self {
        Self {
            items: HashMap::new(),
            next_id: 1,
        }
    }

    fn insert(&mut self, item: T) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(id, item);
        id
    }

    fn get(&self, id: u64) -> Option<&T> {
        self.items.get(&id)
    }

    fn remove(&mut self, id: u64) -> Option<T> {
        self.items.remove(&id)
    }

    fn retain(&mut self, keep: impl FnMut(&u64, &mut T) -> bool) {
        self.items.retain(keep);
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

struct View {
    texture: u64,
    view: wgpu::TextureView,
}

enum Command {
    Pipeline(RenderPipelineHandle),
    BindGroup(u32, BindGroupHandle),
    VertexBuffer(u32, BufferHandle),
    IndexBuffer(BufferHandle),
    Draw(Range<u32>),
}

struct RecordedPass {
    descriptor: RenderPassDescriptor,
    commands: Vec<Command>,
}

fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

fn buffer_usages(usage: BufferUsage) -> wgpu::BufferUsages {
    [
        (BufferUsage::COPY_DST, wgpu::BufferUsages::COPY_DST),
        (BufferUsage::INDEX, wgpu::BufferUsages::INDEX),
        (BufferUsage::VERTEX, wgpu::BufferUsages::VERTEX),
        (BufferUsage::UNIFORM, wgpu::BufferUsages::UNIFORM),
    ]
    .into_iter()
    .filter(|(flag, _)| usage.contains(*flag))
    .fold(wgpu::BufferUsages::empty(), |acc, (_, wgpu_flag)| acc | wgpu_flag)
}

fn texture_usages(usage: TextureUsage) -> wgpu::TextureUsages {
    [
        (TextureUsage::COPY_SRC, wgpu::TextureUsages::COPY_SRC),
        (TextureUsage::COPY_DST, wgpu::TextureUsages::COPY_DST),
        (TextureUsage::TEXTURE_BINDING, wgpu::TextureUsages::TEXTURE_BINDING),
        (TextureUsage::RENDER_ATTACHMENT, wgpu::TextureUsages::RENDER_ATTACHMENT),
    ]
    .into_iter()
    .filter(|(flag, _)| usage.contains(*flag))
    .fold(wgpu::TextureUsages::empty(), |acc, (_, wgpu_flag)| acc | wgpu_flag)
}

fn shader_stages(visibility: Visibility) -> wgpu::ShaderStages {
    match visibility {
        Visibility::Vertex => wgpu::ShaderStages::VERTEX,
        Visibility::Fragment => wgpu::ShaderStages::FRAGMENT,
        Visibility::Both => wgpu::ShaderStages::VERTEX_FRAGMENT,
    }
}

fn binding_type(ty: BindingType) -> wgpu::BindingType {
    match ty {
        BindingType::UniformBuffer => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        BindingType::Texture => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        BindingType::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
    }
}

fn vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
    }
}

fn compare_function(func: CompareFunction) -> wgpu::CompareFunction {
    match func {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

fn filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn address_mode(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
        AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

/// Align a row pitch to wgpu's copy alignment (256 bytes)
fn align_bytes_per_row(value: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    value.div_ceil(align) * align
}

/// The depth attachment is read back with a texture-to-buffer copy, which
/// downlevel adapters (GLES, WebGL) cannot do.
fn check_adapter_capabilities(name: &str, flags: wgpu::DownlevelFlags) -> BackendResult<()> {
    if flags.contains(wgpu::DownlevelFlags::DEPTH_TEXTURE_AND_BUFFER_COPIES) {
        Ok(())
    } else {
        Err(BackendError::InitializationFailed(format!(
            "{name} cannot copy depth textures into buffers"
        )))
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn pop_validation_error(device: &wgpu::Device) -> Option<wgpu::Error> {
    pollster::block_on(device.pop_error_scope())
}

#[cfg(target_arch = "wasm32")]
fn pop_validation_error(device: &wgpu::Device) -> Option<wgpu::Error> {
    drop(device.pop_error_scope());
    None
}

pub struct WgpuBackend {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,

    buffers: Registry<wgpu::Buffer>,
    textures: Registry<wgpu::Texture>,
    views: Registry<View>,
    samplers: Registry<wgpu::Sampler>,
    bind_group_layouts: Registry<wgpu::BindGroupLayout>,
    bind_groups: Registry<wgpu::BindGroup>,
    pipelines: Registry<wgpu::RenderPipeline>,

    encoder: Option<wgpu::CommandEncoder>,
    recording: Option<RecordedPass>,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter.get_info().name)
            .field("live", &self.live_resources())
            .finish()
    }
}

impl WgpuBackend {
    /// Create a headless backend, blocking on adapter and device requests
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new() -> BackendResult<Self> {
        pollster::block_on(Self::new_async())
    }

    /// Picks the first adapter able to read back every G-buffer attachment,
    /// hardware first, then the fallback adapter. `WGPU_BACKEND` narrows the
    /// backends tried.
    pub async fn new_async() -> BackendResult<Self> {
        let backends = if std::env::var("WGPU_BACKEND").is_ok() {
            wgpu::util::backend_bits_from_env().unwrap_or(wgpu::Backends::all())
        } else {
            wgpu::Backends::all()
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let mut rejected = BackendError::InitializationFailed("No suitable adapter found".into());
        let mut selected = None;
        for force_fallback_adapter in [false, true] {
            let Some(adapter) = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter,
                })
                .await
            else {
                continue;
            };

            let info = adapter.get_info();
            match check_adapter_capabilities(&info.name, adapter.get_downlevel_capabilities().flags) {
                Ok(()) => {
                    selected = Some(adapter);
                    break;
                }
                Err(err) => {
                    log::warn!("Skipping adapter ({:?} backend): {}", info.backend, err);
                    rejected = err;
                }
            }
        }
        let adapter = selected.ok_or(rejected)?;

        let info = adapter.get_info();
        log::info!("Selected GPU: {} ({:?} backend)", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("G-Buffer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        Ok(Self {
            adapter,
            device,
            queue,
            buffers: Registry::new(),
            textures: Registry::new(),
            views: Registry::new(),
            samplers: Registry::new(),
            bind_group_layouts: Registry::new(),
            bind_groups: Registry::new(),
            pipelines: Registry::new(),
            encoder: None,
            recording: None,
        })
    }

    fn record(&mut self, command: Command) {
        if let Some(pass) = self.recording.as_mut() {
            pass.commands.push(command);
        }
    }
}

impl GraphicsBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn begin_frame(&mut self) -> BackendResult<()> {
        if self.encoder.is_some() {
            log::warn!("begin_frame called twice; discarding previously recorded commands");
        }
        self.encoder = Some(
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("G-Buffer Encoder"),
                }),
        );
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        let encoder = self.encoder.take().ok_or(BackendError::NoActiveFrame)?;
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        if data.is_empty() {
            return Err(BackendError::BufferCreationFailed(format!(
                "{} has no contents",
                desc.label.as_deref().unwrap_or("buffer")
            )));
        }

        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: desc.label.as_deref(),
            contents: data,
            usage: buffer_usages(desc.usage),
        });
        Ok(BufferHandle(self.buffers.insert(buffer)))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) {
        if let Some(buf) = self.buffers.get(buffer.0) {
            self.queue.write_buffer(buf, 0, data);
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(BackendError::TextureCreationFailed(format!(
                "{}x{} is outside 1..={}",
                desc.width, desc.height, max
            )));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(desc.format),
            usage: texture_usages(desc.usage),
            view_formats: &[],
        });
        Ok(TextureHandle(self.textures.insert(texture)))
    }

    fn create_texture_view(&mut self, texture: TextureHandle) -> BackendResult<TextureViewHandle> {
        let view = self
            .textures
            .get(texture.0)
            .ok_or_else(|| BackendError::TextureCreationFailed("Texture not found".into()))?
            .create_view(&wgpu::TextureViewDescriptor::default());

        Ok(TextureViewHandle(self.views.insert(View {
            texture: texture.0,
            view,
        })))
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8]) {
        let Some(tex) = self.textures.get(texture.0) else {
            return;
        };
        let bytes_per_pixel = tex.format().block_copy_size(None).unwrap_or(4);
        self.queue.write_texture(
            tex.as_image_copy(),
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(tex.width() * bytes_per_pixel),
                rows_per_image: Some(tex.height()),
            },
            tex.size(),
        );
    }

    fn read_texture(&mut self, texture: TextureHandle) -> BackendResult<Vec<u8>> {
        let tex = self
            .textures
            .get(texture.0)
            .ok_or_else(|| BackendError::ReadbackFailed("Texture not found".into()))?;

        let (width, height) = (tex.width(), tex.height());
        let aspect = if tex.format().has_depth_aspect() {
            wgpu::TextureAspect::DepthOnly
        } else {
            wgpu::TextureAspect::All
        };
        let bytes_per_pixel = tex.format().block_copy_size(Some(aspect)).ok_or_else(|| {
            BackendError::ReadbackFailed(format!("{:?} cannot be copied", tex.format()))
        })?;
        let tight_bpr = width * bytes_per_pixel;
        let padded_bpr = align_bytes_per_row(tight_bpr);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("G-Buffer Readback"),
            size: padded_bpr as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("G-Buffer Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: tex,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr),
                    rows_per_image: Some(height),
                },
            },
            tex.size(),
        );
        let commands = encoder.finish();
        if let Some(err) = pop_validation_error(&self.device) {
            return Err(BackendError::ReadbackFailed(err.to_string()));
        }
        self.queue.submit(std::iter::once(commands));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| BackendError::ReadbackFailed("map_async callback dropped".into()))?
            .map_err(|e| BackendError::ReadbackFailed(e.to_string()))?;

        let tight = slice
            .get_mapped_range()
            .chunks_exact(padded_bpr as usize)
            .flat_map(|row| row[..tight_bpr as usize].iter().copied())
            .collect();
        staging.unmap();

        Ok(tight)
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: desc.label.as_deref(),
            address_mode_u: address_mode(desc.address_mode_u),
            address_mode_v: address_mode(desc.address_mode_v),
            mag_filter: filter_mode(desc.mag_filter),
            min_filter: filter_mode(desc.min_filter),
            ..Default::default()
        });
        Ok(SamplerHandle(self.samplers.insert(sampler)))
    }

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = entries
            .iter()
            .map(|e| wgpu::BindGroupLayoutEntry {
                binding: e.binding,
                visibility: shader_stages(e.visibility),
                ty: binding_type(e.ty),
                count: None,
            })
            .collect();

        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: None,
                entries: &entries,
            });
        Ok(BindGroupLayoutHandle(self.bind_group_layouts.insert(layout)))
    }

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let layout = self
            .bind_group_layouts
            .get(layout.0)
            .ok_or_else(|| BackendError::PipelineCreationFailed("Layout not found".into()))?;

        let missing = |binding: u32, what: &str| {
            BackendError::PipelineCreationFailed(format!("{what} for binding {binding} not found"))
        };
        let entries = entries
            .iter()
            .map(|&(binding, entry)| {
                let resource = match entry {
                    BindGroupEntry::Buffer(buffer) => self
                        .buffers
                        .get(buffer.0)
                        .ok_or_else(|| missing(binding, "Buffer"))?
                        .as_entire_binding(),
                    BindGroupEntry::Texture(view) => wgpu::BindingResource::TextureView(
                        &self.views.get(view.0).ok_or_else(|| missing(binding, "Texture view"))?.view,
                    ),
                    BindGroupEntry::Sampler(sampler) => wgpu::BindingResource::Sampler(
                        self.samplers.get(sampler.0).ok_or_else(|| missing(binding, "Sampler"))?,
                    ),
                };
                Ok::<_, BackendError>(wgpu::BindGroupEntry { binding, resource })
            })
            .collect::<BackendResult<Vec<_>>>()?;

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout,
            entries: &entries,
        });
        Ok(BindGroupHandle(self.bind_groups.insert(bind_group)))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        let layouts = desc
            .bind_group_layouts
            .iter()
            .map(|h| {
                self.bind_group_layouts.get(h.0).ok_or_else(|| {
                    BackendError::PipelineCreationFailed("Bind group layout not found".into())
                })
            })
            .collect::<BackendResult<Vec<_>>>()?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: desc.label.as_deref(),
                source: wgpu::ShaderSource::Wgsl(desc.shader.as_str().into()),
            });

        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: None,
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });

        let attributes: Vec<wgpu::VertexAttribute> = desc
            .vertex_layout
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: vertex_format(a.format),
                offset: a.offset,
                shader_location: a.location,
            })
            .collect();

        let targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .color_formats
            .iter()
            .map(|&format| Some(texture_format(format).into()))
            .collect();

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: desc.label.as_deref(),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: desc.vertex_layout.array_stride,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &targets,
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    front_face: match desc.front_face {
                        FrontFace::Ccw => wgpu::FrontFace::Ccw,
                        FrontFace::Cw => wgpu::FrontFace::Cw,
                    },
                    cull_mode: match desc.cull_mode {
                        CullMode::None => None,
                        CullMode::Front => Some(wgpu::Face::Front),
                        CullMode::Back => Some(wgpu::Face::Back),
                    },
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: texture_format(desc.depth_format),
                    depth_write_enabled: true,
                    depth_compare: compare_function(desc.depth_compare),
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                multiview: None,
            });

        if let Some(err) = pop_validation_error(&self.device) {
            return Err(BackendError::PipelineCreationFailed(err.to_string()));
        }
        Ok(RenderPipelineHandle(self.pipelines.insert(pipeline)))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.recording = Some(RecordedPass {
            descriptor: desc.clone(),
            commands: Vec::new(),
        });
    }

    fn end_render_pass(&mut self) {
        let Some(recorded) = self.recording.take() else {
            return;
        };
        let Some(encoder) = self.encoder.as_mut() else {
            log::warn!("Render pass ended outside of a frame; commands dropped");
            return;
        };

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = recorded
            .descriptor
            .color_attachments
            .iter()
            .map(|att| {
                let [r, g, b, a] = att.clear.map(f64::from);
                Some(wgpu::RenderPassColorAttachment {
                    view: &self.views.get(att.view.0)?.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();

        let depth = recorded.descriptor.depth_attachment;
        let depth_stencil_attachment =
            self.views
                .get(depth.view.0)
                .map(|v| wgpu::RenderPassDepthStencilAttachment {
                    view: &v.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(depth.clear),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: recorded.descriptor.label.as_deref(),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for command in &recorded.commands {
            match command {
                Command::Pipeline(handle) => {
                    if let Some(pipeline) = self.pipelines.get(handle.0) {
                        pass.set_pipeline(pipeline);
                    }
                }
                Command::BindGroup(index, handle) => {
                    if let Some(bind_group) = self.bind_groups.get(handle.0) {
                        pass.set_bind_group(*index, bind_group, &[]);
                    }
                }
                Command::VertexBuffer(slot, handle) => {
                    if let Some(buffer) = self.buffers.get(handle.0) {
                        pass.set_vertex_buffer(*slot, buffer.slice(..));
                    }
                }
                Command::IndexBuffer(handle) => {
                    if let Some(buffer) = self.buffers.get(handle.0) {
                        pass.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint32);
                    }
                }
                Command::Draw(indices) => pass.draw_indexed(indices.clone(), 0, 0..1),
            }
        }
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.record(Command::Pipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        self.record(Command::BindGroup(index, bind_group));
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle) {
        self.record(Command::VertexBuffer(slot, buffer));
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle) {
        self.record(Command::IndexBuffer(buffer));
    }

    fn draw_indexed(&mut self, indices: Range<u32>) {
        self.record(Command::Draw(indices));
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(buffer.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.views.retain(|_, v| v.texture != texture.0);
        self.textures.remove(texture.0);
    }

    fn destroy_texture_view(&mut self, view: TextureViewHandle) {
        self.views.remove(view.0);
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) {
        self.samplers.remove(sampler.0);
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(bind_group.0);
    }

    fn live_resources(&self) -> LiveResources {
        LiveResources {
            buffers: self.buffers.len(),
            textures: self.textures.len(),
            texture_views: self.views.len(),
            samplers: self.samplers.len(),
            bind_group_layouts: self.bind_group_layouts.len(),
            bind_groups: self.bind_groups.len(),
            render_pipelines: self.pipelines.len(),
        }
    }
}
