//! G-Buffer generation pass for deferred rendering
//!
//! Renders geometry to multiple render targets (MRT):
//! - Color (diffuse albedo, alpha tested)
//! - Normal (encoded world-space normal + specular mask)
//! - Ambient (lightmap)
//! - Depth buffer

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::{shader, GBufferAttachment, GBufferLayout};
use crate::resources::{DefaultTextures, GpuTexture, Mesh, Surface, TextureSlot};
use crate::scene::Camera;
use log::{debug, info};

struct RenderTarget {
    texture: TextureHandle,
    view: TextureViewHandle,
}

impl RenderTarget {
    fn create<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> BackendResult<Self> {
        let texture = backend.create_texture(&TextureDescriptor {
            label: Some(label.to_string()),
            width,
            height,
            format,
            usage: TextureUsage::RENDER_ATTACHMENT
                | TextureUsage::TEXTURE_BINDING
                | TextureUsage::COPY_SRC,
        })?;
        let view = backend.create_texture_view(texture)?;
        Ok(Self { texture, view })
    }
}

/// One surface uploaded to the GPU
#[derive(Debug)]
pub struct GpuSurface {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
    pub material_buffer: BufferHandle,
    pub material_bind_group: BindGroupHandle,
    pub sampler: SamplerHandle,
    /// Textures owned by this surface; empty slots use the pass defaults
    pub textures: Vec<GpuTexture>,
}

/// GPU resources for one [`Mesh`]
#[derive(Debug)]
pub struct GpuMesh {
    pub name: String,
    pub object_buffer: BufferHandle,
    pub object_bind_group: BindGroupHandle,
    pub surfaces: Vec<GpuSurface>,
}

impl GpuMesh {
    /// Release every GPU object created by [`GBufferPass::prepare_mesh`]
    pub fn destroy<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        backend.destroy_bind_group(self.object_bind_group);
        backend.destroy_buffer(self.object_buffer);
        for surface in self.surfaces {
            backend.destroy_bind_group(surface.material_bind_group);
            backend.destroy_sampler(surface.sampler);
            backend.destroy_buffer(surface.vertex_buffer);
            backend.destroy_buffer(surface.index_buffer);
            backend.destroy_buffer(surface.material_buffer);
            for texture in surface.textures {
                backend.destroy_texture(texture.handle);
            }
        }
    }
}

/// Counters of one [`GBufferPass::execute`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub meshes_drawn: u32,
    pub meshes_culled: u32,
    pub draw_calls: u32,
    pub triangles: u32,
}

/// G-buffer contents copied back to the CPU
#[derive(Debug, Clone, PartialEq)]
pub struct GBufferImage {
    pub width: u32,
    pub height: u32,
    /// RGBA8 rows, one vector per attachment in slot order
    pub attachments: [Vec<u8>; 3],
    pub depth: Vec<f32>,
}

impl GBufferImage {
    pub fn attachment(&self, attachment: GBufferAttachment) -> &[u8] {
        &self.attachments[attachment.slot() as usize]
    }
}

/// G-Buffer generation pass for deferred rendering
pub struct GBufferPass {
    width: u32,
    height: u32,
    targets: Vec<RenderTarget>,
    depth: RenderTarget,

    object_layout: BindGroupLayoutHandle,
    material_layout: BindGroupLayoutHandle,
    pipeline: RenderPipelineHandle,

    camera_buffer: BufferHandle,
    camera_bind_group: BindGroupHandle,

    default_textures: Vec<GpuTexture>,
    filter_override: Option<FilterMode>,
}

impl GBufferPass {
    pub fn new<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        width: u32,
        height: u32,
        cull_mode: CullMode,
    ) -> BackendResult<Self> {
        shader::validate(GBUFFER_SHADER)?;

        let (targets, depth) = Self::create_targets(backend, width, height)?;

        let camera_layout = backend.create_bind_group_layout(&[BindGroupLayoutEntry {
            binding: 0,
            visibility: Visibility::Vertex,
            ty: BindingType::UniformBuffer,
        }])?;

        let object_layout = backend.create_bind_group_layout(&[BindGroupLayoutEntry {
            binding: 0,
            visibility: Visibility::Vertex,
            ty: BindingType::UniformBuffer,
        }])?;

        let mut material_entries = vec![BindGroupLayoutEntry {
            binding: 0,
            visibility: Visibility::Fragment,
            ty: BindingType::UniformBuffer,
        }];
        for slot in TextureSlot::ALL {
            material_entries.push(BindGroupLayoutEntry {
                binding: slot.binding(),
                visibility: Visibility::Fragment,
                ty: BindingType::Texture,
            });
        }
        material_entries.push(BindGroupLayoutEntry {
            binding: SAMPLER_BINDING,
            visibility: Visibility::Fragment,
            ty: BindingType::Sampler,
        });
        let material_layout = backend.create_bind_group_layout(&material_entries)?;

        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("G-Buffer Pipeline".into()),
            shader: GBUFFER_SHADER.to_string(),
            vertex_layout: Vertex::layout(),
            bind_group_layouts: vec![camera_layout, object_layout, material_layout],
            front_face: FrontFace::Ccw,
            cull_mode,
            depth_format: GBufferLayout::DEPTH_FORMAT,
            depth_compare: CompareFunction::Less,
            color_formats: GBufferAttachment::ALL.iter().map(|a| a.format()).collect(),
        })?;

        let camera_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some("Camera Uniforms".into()),
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            },
            bytemuck::bytes_of(&Camera::default().uniform_data()),
        )?;
        let camera_bind_group =
            backend.create_bind_group(camera_layout, &[(0, BindGroupEntry::Buffer(camera_buffer))])?;

        let defaults = DefaultTextures::default();
        let default_textures = TextureSlot::ALL
            .iter()
            .map(|slot| GpuTexture::create(backend, defaults.get(*slot)))
            .collect::<BackendResult<Vec<_>>>()?;

        info!(
            "G-buffer pass created on {} ({}x{}, cull {:?})",
            backend.name(),
            width,
            height,
            cull_mode
        );

        Ok(Self {
            width,
            height,
            targets,
            depth,
            object_layout,
            material_layout,
            pipeline,
            camera_buffer,
            camera_bind_group,
            default_textures,
            filter_override: None,
        })
    }

    fn create_targets<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> BackendResult<(Vec<RenderTarget>, RenderTarget)> {
        let targets = GBufferAttachment::ALL
            .iter()
            .map(|a| {
                RenderTarget::create(
                    backend,
                    &format!("gbuffer_{}", a.name()),
                    width,
                    height,
                    a.format(),
                )
            })
            .collect::<BackendResult<Vec<_>>>()?;
        let depth = RenderTarget::create(
            backend,
            "gbuffer_depth",
            width,
            height,
            GBufferLayout::DEPTH_FORMAT,
        )?;
        Ok((targets, depth))
    }

    /// Sample every material with `filter`, or with its own sampler for `None`
    pub fn set_filter_override(&mut self, filter: Option<FilterMode>) {
        self.filter_override = filter;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// View of a color attachment, for a lighting pass to bind
    pub fn attachment_view(&self, attachment: GBufferAttachment) -> TextureViewHandle {
        self.targets[attachment.slot() as usize].view
    }

    pub fn depth_view(&self) -> TextureViewHandle {
        self.depth.view
    }

    /// Recreate the targets at a new size
    pub fn resize<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> BackendResult<()> {
        if width == self.width && height == self.height {
            return Ok(());
        }

        let (targets, depth) = Self::create_targets(backend, width, height)?;
        for old in self.targets.drain(..) {
            backend.destroy_texture(old.texture);
        }
        backend.destroy_texture(self.depth.texture);

        self.targets = targets;
        self.depth = depth;
        self.width = width;
        self.height = height;
        debug!("G-buffer resized to {}x{}", width, height);
        Ok(())
    }

    /// Upload a mesh: one vertex/index buffer pair and one material bind group per surface
    pub fn prepare_mesh<B: GraphicsBackend + ?Sized>(
        &self,
        backend: &mut B,
        mesh: &Mesh,
    ) -> BackendResult<GpuMesh> {
        let object_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} object", mesh.name)),
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            },
            bytemuck::bytes_of(&mesh.transform.uniform_data()),
        )?;
        let object_bind_group = backend
            .create_bind_group(self.object_layout, &[(0, BindGroupEntry::Buffer(object_buffer))])?;

        let mut gpu_mesh = GpuMesh {
            name: mesh.name.clone(),
            object_buffer,
            object_bind_group,
            surfaces: Vec::with_capacity(mesh.surfaces().len()),
        };

        // Zero-sized buffers cannot be created, so empty surfaces get no GPU side
        for surface in mesh.surfaces().iter().filter(|s| !s.data.is_empty()) {
            match self.prepare_surface(backend, &mesh.name, surface) {
                Ok(gpu_surface) => gpu_mesh.surfaces.push(gpu_surface),
                Err(e) => {
                    gpu_mesh.destroy(backend);
                    return Err(e);
                }
            }
        }
        Ok(gpu_mesh)
    }

    fn prepare_surface<B: GraphicsBackend + ?Sized>(
        &self,
        backend: &mut B,
        mesh_name: &str,
        surface: &Surface,
    ) -> BackendResult<GpuSurface> {
        let data = &surface.data;
        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{mesh_name} vertices")),
                usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
            },
            data.vertex_bytes(),
        )?;
        let index_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{mesh_name} indices")),
                usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
            },
            data.index_bytes(),
        )?;

        let material = &surface.material;
        let material_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} material", material.name)),
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            },
            bytemuck::bytes_of(&material.uniform_data()),
        )?;
        let sampler = match self.filter_override {
            Some(filter) => material.sampler.clone().with_filter(filter),
            None => material.sampler.clone(),
        };
        let sampler = backend.create_sampler(&sampler)?;

        let mut textures = Vec::new();
        let mut entries = vec![(0, BindGroupEntry::Buffer(material_buffer))];
        for (i, slot) in TextureSlot::ALL.iter().enumerate() {
            let view = match material.texture(*slot) {
                Some(data) => {
                    let texture = GpuTexture::create(backend, data)?;
                    let view = texture.view;
                    textures.push(texture);
                    view
                }
                None => self.default_textures[i].view,
            };
            entries.push((slot.binding(), BindGroupEntry::Texture(view)));
        }
        entries.push((SAMPLER_BINDING, BindGroupEntry::Sampler(sampler)));

        let material_bind_group = backend.create_bind_group(self.material_layout, &entries)?;

        Ok(GpuSurface {
            vertex_buffer,
            index_buffer,
            index_count: data.indices.len() as u32,
            material_buffer,
            material_bind_group,
            sampler,
            textures,
        })
    }

    /// Record and submit the pass for every mesh that survives frustum culling
    pub fn execute<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        camera: &Camera,
        meshes: &[(&Mesh, &GpuMesh)],
    ) -> BackendResult<PassStats> {
        let camera = camera.fitted_to(self.width, self.height);
        backend.write_buffer(self.camera_buffer, bytemuck::bytes_of(&camera.uniform_data()));

        let frustum = camera.frustum();
        let mut stats = PassStats::default();

        backend.begin_frame()?;
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("G-Buffer Pass".into()),
            color_attachments: GBufferAttachment::ALL
                .iter()
                .map(|a| ColorAttachment {
                    view: self.targets[a.slot() as usize].view,
                    clear: a.clear_value(),
                })
                .collect(),
            depth_attachment: DepthAttachment {
                view: self.depth.view,
                clear: GBufferLayout::DEPTH_CLEAR,
            },
        });

        backend.set_render_pipeline(self.pipeline);
        backend.set_bind_group(0, self.camera_bind_group);

        for (mesh, gpu_mesh) in meshes {
            if !mesh.is_intersect_frustum(&frustum) {
                stats.meshes_culled += 1;
                continue;
            }
            stats.meshes_drawn += 1;

            backend.write_buffer(
                gpu_mesh.object_buffer,
                bytemuck::bytes_of(&mesh.transform.uniform_data()),
            );
            backend.set_bind_group(1, gpu_mesh.object_bind_group);

            for surface in gpu_mesh.surfaces.iter().filter(|s| s.index_count > 0) {
                backend.set_bind_group(2, surface.material_bind_group);
                backend.set_vertex_buffer(0, surface.vertex_buffer);
                backend.set_index_buffer(surface.index_buffer);
                backend.draw_indexed(0..surface.index_count);
                stats.draw_calls += 1;
                stats.triangles += surface.index_count / 3;
            }
        }

        backend.end_render_pass();
        backend.end_frame()?;

        debug!(
            "G-buffer pass: {} meshes drawn, {} culled, {} draw calls",
            stats.meshes_drawn, stats.meshes_culled, stats.draw_calls
        );
        Ok(stats)
    }

    /// Copy all attachments back to the CPU
    pub fn read_back<B: GraphicsBackend + ?Sized>(
        &self,
        backend: &mut B,
    ) -> BackendResult<GBufferImage> {
        let color = backend.read_texture(self.targets[0].texture)?;
        let normal = backend.read_texture(self.targets[1].texture)?;
        let ambient = backend.read_texture(self.targets[2].texture)?;
        let depth_bytes = backend.read_texture(self.depth.texture)?;

        let expected = (self.width * self.height * 4) as usize;
        for bytes in [&color, &normal, &ambient, &depth_bytes] {
            if bytes.len() != expected {
                return Err(BackendError::ReadbackFailed(format!(
                    "expected {} bytes, got {}",
                    expected,
                    bytes.len()
                )));
            }
        }

        let depth = depth_bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(GBufferImage {
            width: self.width,
            height: self.height,
            attachments: [color, normal, ambient],
            depth,
        })
    }

    /// Release the targets and shared resources of the pass
    pub fn destroy<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        for target in self.targets {
            backend.destroy_texture(target.texture);
        }
        backend.destroy_texture(self.depth.texture);
        for texture in self.default_textures {
            backend.destroy_texture(texture.handle);
        }
        backend.destroy_bind_group(self.camera_bind_group);
        backend.destroy_buffer(self.camera_buffer);
    }
}

const SAMPLER_BINDING: u32 = 5;

/// G-Buffer generation shader
///
/// `fs_main` writes exactly what [`crate::shading::shade_fragment`] computes.
pub const GBUFFER_SHADER: &str = r#"
struct CameraUniforms {
    view_proj: mat4x4<f32>,
}

struct ObjectUniforms {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
}

struct MaterialUniforms {
    diffuse_color: vec4<f32>,
}

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tex_coord: vec2<f32>,
    @location(3) tangent: vec4<f32>,
    @location(4) second_tex_coord: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) tangent: vec3<f32>,
    @location(2) binormal: vec3<f32>,
    @location(3) tex_coord: vec2<f32>,
    @location(4) second_tex_coord: vec2<f32>,
}

struct GBufferOutput {
    @location(0) color: vec4<f32>,
    @location(1) normal: vec4<f32>,
    @location(2) ambient: vec4<f32>,
}

@group(0) @binding(0) var<uniform> camera: CameraUniforms;
@group(1) @binding(0) var<uniform> object: ObjectUniforms;
@group(2) @binding(0) var<uniform> material: MaterialUniforms;
@group(2) @binding(1) var diffuse_texture: texture_2d<f32>;
@group(2) @binding(2) var normal_texture: texture_2d<f32>;
@group(2) @binding(3) var specular_texture: texture_2d<f32>;
@group(2) @binding(4) var lightmap_texture: texture_2d<f32>;
@group(2) @binding(5) var material_sampler: sampler;

fn normalize_or_zero(v: vec3<f32>) -> vec3<f32> {
    let len2 = dot(v, v);
    if len2 > 0.0 {
        return v * inverseSqrt(len2);
    }
    return vec3<f32>(0.0);
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var output: VertexOutput;
    let world_pos = object.model * vec4<f32>(input.position, 1.0);
    output.clip_position = camera.view_proj * world_pos;

    let n = normalize_or_zero((object.normal_matrix * vec4<f32>(input.normal, 0.0)).xyz);
    let t = normalize_or_zero((object.model * vec4<f32>(input.tangent.xyz, 0.0)).xyz);
    output.normal = n;
    output.tangent = t;
    output.binormal = cross(n, t) * input.tangent.w;
    output.tex_coord = input.tex_coord;
    output.second_tex_coord = input.second_tex_coord;
    return output;
}

@fragment
fn fs_main(input: VertexOutput) -> GBufferOutput {
    // Sample everything up front: implicit derivatives need uniform control flow
    let diffuse = textureSample(diffuse_texture, material_sampler, input.tex_coord);
    let normal_texel = textureSample(normal_texture, material_sampler, input.tex_coord);
    let specular = textureSample(specular_texture, material_sampler, input.tex_coord).r;
    let lightmap = textureSample(lightmap_texture, material_sampler, input.second_tex_coord);

    var color = material.diffuse_color * diffuse;
    if color.a < 0.5 {
        discard;
    }
    color.a = 1.0;

    var mapped = normal_texel.xyz * 2.0 - 1.0;
    if dot(mapped, mapped) > 0.0 {
        mapped = normalize(mapped);
    } else {
        mapped = vec3<f32>(0.0, 0.0, 1.0);
    }

    let tbn = mat3x3<f32>(input.tangent, input.binormal, input.normal);
    var n = tbn * mapped;
    if dot(n, n) > 0.0 {
        n = normalize(n);
    } else {
        n = mapped;
    }

    var output: GBufferOutput;
    output.color = color;
    output.normal = vec4<f32>(n * 0.5 + 0.5, specular);
    output.ambient = vec4<f32>(lightmap.rgb, 1.0);
    return output;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_declares_every_material_binding() {
        for slot in TextureSlot::ALL {
            let decl = format!("@group(2) @binding({}) var {}_texture", slot.binding(), slot.name());
            assert!(GBUFFER_SHADER.contains(&decl), "missing {decl}");
        }
        assert!(GBUFFER_SHADER.contains(&format!("@binding({SAMPLER_BINDING}) var material_sampler")));
    }

    #[test]
    fn readback_image_indexes_by_slot() {
        let image = GBufferImage {
            width: 1,
            height: 1,
            attachments: [vec![1; 4], vec![2; 4], vec![3; 4]],
            depth: vec![1.0],
        };
        assert_eq!(image.attachment(GBufferAttachment::Normal), &[2, 2, 2, 2]);
        assert_eq!(image.attachment(GBufferAttachment::Ambient), &[3, 3, 3, 3]);
    }
}
