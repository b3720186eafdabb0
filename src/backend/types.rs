//! Plain data shared by the backend trait, the pass and the rasterizer

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Formats the geometry pass creates or uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Depth32Float,
}

impl TextureFormat {
    pub fn is_srgb(&self) -> bool {
        matches!(self, TextureFormat::Rgba8UnormSrgb)
    }
}

macro_rules! usage_flags {
    ($(#[$meta:meta])* $name:ident { $($flag:ident = $bit:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name(u32);

        impl $name {
            $(pub const $flag: Self = Self(1 << $bit);)+

            pub fn contains(&self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }
    };
}

usage_flags!(
    /// How a texture is going to be used
    TextureUsage {
        COPY_SRC = 0,
        COPY_DST = 1,
        TEXTURE_BINDING = 2,
        RENDER_ATTACHMENT = 3,
    }
);

usage_flags!(
    /// How a buffer is going to be used
    BufferUsage {
        COPY_DST = 0,
        INDEX = 1,
        VERTEX = 2,
        UNIFORM = 3,
    }
);

/// Single-mip 2D texture
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

/// Buffers are sized by their initial contents
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub usage: BufferUsage,
}

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    pub fn size(&self) -> u64 {
        match self {
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct VertexBufferLayout {
    pub array_stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

/// Vertex fed to the geometry pass.
///
/// `tangent.w` carries the handedness of the tangent frame; the binormal is
/// rebuilt as `cross(normal, tangent.xyz) * tangent.w`. `second_uv` addresses
/// the lightmap.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub tangent: Vec4,
    pub second_uv: Vec2,
    pub _padding: Vec2,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2, tangent: Vec4, second_uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
            tangent,
            second_uv,
            _padding: Vec2::ZERO,
        }
    }

    /// Binormal of the tangent frame
    pub fn binormal(&self) -> Vec3 {
        self.normal.cross(self.tangent.truncate()) * self.tangent.w
    }

    /// Attribute locations match `VertexInput` in the geometry shader
    pub fn layout() -> VertexBufferLayout {
        let attributes = [
            (VertexFormat::Float32x3, 0),
            (VertexFormat::Float32x3, 12),
            (VertexFormat::Float32x2, 24),
            (VertexFormat::Float32x4, 32),
            (VertexFormat::Float32x2, 48),
        ]
        .into_iter()
        .zip(0u32..)
        .map(|((format, offset), location)| VertexAttribute {
            location,
            format,
            offset,
        })
        .collect();

        VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as u64,
            attributes,
        }
    }
}

/// Contents of the object uniform buffer (group 1, binding 0)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: Mat4,
    pub normal_matrix: Mat4,
}

impl ObjectUniform {
    pub fn from_model(model: Mat4) -> Self {
        Self {
            model,
            normal_matrix: model.inverse().transpose(),
        }
    }
}

/// Front face winding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    Ccw,
    Cw,
}

/// Which faces the pass skips
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Depth test operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunction {
    Never,
    Less,
    LessEqual,
    Always,
}

impl CompareFunction {
    /// Evaluate `incoming <op> stored`
    pub fn passes(&self, incoming: f32, stored: f32) -> bool {
        match self {
            CompareFunction::Never => false,
            CompareFunction::Less => incoming < stored,
            CompareFunction::LessEqual => incoming <= stored,
            CompareFunction::Always => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

/// Sampler state shared by all four material textures
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDescriptor {
    pub label: Option<String>,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
        }
    }
}

impl SamplerDescriptor {
    pub fn nearest() -> Self {
        Self::default().with_filter(FilterMode::Nearest)
    }

    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.mag_filter = filter;
        self.min_filter = filter;
        self
    }

    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode_u = mode;
        self.address_mode_v = mode;
        self
    }
}
