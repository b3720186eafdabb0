//! Texture loading and management

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::ResourceError;
use glam::Vec4;
use image::{DynamicImage, GenericImageView};
use std::path::Path;

/// Convert one sRGB-encoded channel to linear
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Loaded RGBA8 texture data
///
/// Color textures use [`TextureFormat::Rgba8UnormSrgb`] and are linearized on
/// sampling, like the GPU does. Data textures (normal, specular, lightmap) are
/// [`TextureFormat::Rgba8Unorm`] and sampled as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
    pub name: String,
}

impl TextureData {
    /// Load a color texture from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ResourceError> {
        Self::from_file_with_format(path, TextureFormat::Rgba8UnormSrgb)
    }

    /// Load a texture from file, storing it in the given format
    pub fn from_file_with_format<P: AsRef<Path>>(
        path: P,
        format: TextureFormat,
    ) -> Result<Self, ResourceError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let img = image::open(path).map_err(|source| ResourceError::Image {
            name: name.clone(),
            source,
        })?;
        Self::from_image(img, &name, format)
    }

    /// Load a color texture from encoded bytes
    pub fn from_bytes(bytes: &[u8], name: &str) -> Result<Self, ResourceError> {
        Self::from_bytes_with_format(bytes, name, TextureFormat::Rgba8UnormSrgb)
    }

    /// Load a texture from encoded bytes, storing it in the given format
    pub fn from_bytes_with_format(
        bytes: &[u8],
        name: &str,
        format: TextureFormat,
    ) -> Result<Self, ResourceError> {
        let img = image::load_from_memory(bytes).map_err(|source| ResourceError::Image {
            name: name.to_string(),
            source,
        })?;
        Self::from_image(img, name, format)
    }

    /// Wrap raw RGBA8 texels
    pub fn from_rgba8(
        width: u32,
        height: u32,
        data: Vec<u8>,
        format: TextureFormat,
        name: &str,
    ) -> Result<Self, ResourceError> {
        if !matches!(format, TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb) {
            return Err(ResourceError::UnsupportedFormat(format));
        }
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(ResourceError::SizeMismatch {
                name: name.to_string(),
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            format,
            data,
            name: name.to_string(),
        })
    }

    fn from_image(img: DynamicImage, name: &str, format: TextureFormat) -> Result<Self, ResourceError> {
        let (width, height) = img.dimensions();
        let data = img.to_rgba8().into_raw();
        Self::from_rgba8(width, height, data, format, name)
    }

    /// Create a solid color texture
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8UnormSrgb,
            data: color.to_vec(),
            name: name.to_string(),
        }
    }

    /// Create a solid texture holding raw (linear) data
    pub fn solid_data(value: [u8; 4], name: &str) -> Self {
        Self {
            format: TextureFormat::Rgba8Unorm,
            ..Self::solid_color(value, name)
        }
    }

    /// Create a default white texture
    pub fn white() -> Self {
        Self::solid_color([255, 255, 255, 255], "white")
    }

    /// Create a default black data texture
    pub fn black() -> Self {
        Self::solid_data([0, 0, 0, 255], "black")
    }

    /// Create a default normal map (pointing along the surface normal)
    pub fn default_normal() -> Self {
        // (0, 0, 1) in tangent space encodes to (0.5, 0.5, 1.0)
        Self::solid_data([128, 128, 255, 255], "default_normal")
    }

    /// Create a checkerboard texture with 8x8 texel cells. `size` is at least 1.
    pub fn checkerboard(size: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let size = size.max(1);
        let mut data = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let is_even = ((x / 8) + (y / 8)) % 2 == 0;
                let color = if is_even { color1 } else { color2 };
                data.extend_from_slice(&color);
            }
        }

        Self {
            width: size,
            height: size,
            format: TextureFormat::Rgba8UnormSrgb,
            data,
            name: "checkerboard".to_string(),
        }
    }

    /// Reinterpret the texels in another format without touching the data
    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    /// Fetch a texel as linear floats. Coordinates are clamped to the image;
    /// an image without texels reads as transparent black.
    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let Some(px) = self.data.get(offset..offset + 4) else {
            return Vec4::ZERO;
        };
        let raw = Vec4::new(px[0] as f32, px[1] as f32, px[2] as f32, px[3] as f32) / 255.0;

        if self.format.is_srgb() {
            Vec4::new(
                srgb_to_linear(raw.x),
                srgb_to_linear(raw.y),
                srgb_to_linear(raw.z),
                raw.w,
            )
        } else {
            raw
        }
    }
}

/// GPU texture with associated view
#[derive(Debug)]
pub struct GpuTexture {
    pub handle: TextureHandle,
    pub view: TextureViewHandle,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub name: String,
}

impl GpuTexture {
    /// Create and upload texture to GPU
    pub fn create<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        data: &TextureData,
    ) -> BackendResult<Self> {
        let handle = backend.create_texture(&TextureDescriptor {
            label: Some(data.name.clone()),
            width: data.width,
            height: data.height,
            format: data.format,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;

        let view = backend.create_texture_view(handle)?;
        backend.write_texture(handle, &data.data);

        Ok(Self {
            handle,
            view,
            width: data.width,
            height: data.height,
            format: data.format,
            name: data.name.clone(),
        })
    }
}
