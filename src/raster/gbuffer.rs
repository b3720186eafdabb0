//! CPU-side G-buffer storage

use crate::pipeline::{DecodedSurface, GBufferAttachment, GBufferImage, GBufferLayout};
use crate::resources::ResourceError;
use crate::shading::GBufferTexel;
use glam::Vec4;
use std::path::{Path, PathBuf};

/// Float G-buffer: three color planes and a depth plane, row-major, top row first
#[derive(Debug, Clone, PartialEq)]
pub struct CpuGBuffer {
    width: u32,
    height: u32,
    planes: [Vec<Vec4>; 3],
    depth: Vec<f32>,
}

impl CpuGBuffer {
    /// Create a cleared G-buffer
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        let plane = |a: GBufferAttachment| vec![Vec4::from_array(a.clear_value()); len];
        Self {
            width,
            height,
            planes: [
                plane(GBufferAttachment::Color),
                plane(GBufferAttachment::Normal),
                plane(GBufferAttachment::Ambient),
            ],
            depth: vec![GBufferLayout::DEPTH_CLEAR; len],
        }
    }

    /// Rebuild from bytes read back from the GPU pass
    pub fn from_image(image: &GBufferImage) -> Self {
        let unpack = |bytes: &[u8]| -> Vec<Vec4> {
            bytes
                .chunks_exact(4)
                .map(|px| Vec4::new(px[0] as f32, px[1] as f32, px[2] as f32, px[3] as f32) / 255.0)
                .collect()
        };
        Self {
            width: image.width,
            height: image.height,
            planes: [
                unpack(&image.attachments[0]),
                unpack(&image.attachments[1]),
                unpack(&image.attachments[2]),
            ],
            depth: image.depth.clone(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&mut self) {
        for attachment in GBufferAttachment::ALL {
            let value = Vec4::from_array(attachment.clear_value());
            self.planes[attachment.slot() as usize].fill(value);
        }
        self.depth.fill(GBufferLayout::DEPTH_CLEAR);
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn attachment(&self, attachment: GBufferAttachment) -> &[Vec4] {
        &self.planes[attachment.slot() as usize]
    }

    pub fn depth(&self, x: u32, y: u32) -> f32 {
        self.depth[self.index(x, y)]
    }

    pub fn depth_plane(&self) -> &[f32] {
        &self.depth
    }

    pub fn texel(&self, x: u32, y: u32) -> GBufferTexel {
        let i = self.index(x, y);
        GBufferTexel {
            color: self.planes[0][i],
            normal: self.planes[1][i],
            ambient: self.planes[2][i],
        }
    }

    /// Write all attachments and depth of one pixel
    pub fn write(&mut self, x: u32, y: u32, texel: &GBufferTexel, depth: f32) {
        let i = self.index(x, y);
        self.planes[0][i] = texel.color;
        self.planes[1][i] = texel.normal;
        self.planes[2][i] = texel.ambient;
        self.depth[i] = depth;
    }

    pub fn decode(&self, x: u32, y: u32) -> Option<DecodedSurface> {
        let t = self.texel(x, y);
        DecodedSurface::decode(t.color, t.normal, t.ambient, self.depth(x, y))
    }

    /// Number of pixels any geometry was written to
    pub fn coverage(&self) -> usize {
        self.depth
            .iter()
            .filter(|&&d| d < GBufferLayout::DEPTH_CLEAR)
            .count()
    }

    /// Quantize an attachment the way an `Rgba8Unorm` target stores it
    pub fn to_rgba8(&self, attachment: GBufferAttachment) -> Vec<u8> {
        self.attachment(attachment)
            .iter()
            .flat_map(|v| {
                v.to_array()
                    .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
            })
            .collect()
    }

    pub fn to_image(&self, attachment: GBufferAttachment) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.to_rgba8(attachment))
    }

    /// Depth as an 8-bit greyscale image, near is dark
    pub fn depth_image(&self) -> Option<image::GrayImage> {
        let bytes = self
            .depth
            .iter()
            .map(|d| (d.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        image::GrayImage::from_raw(self.width, self.height, bytes)
    }

    pub fn save_png<P: AsRef<Path>>(
        &self,
        attachment: GBufferAttachment,
        path: P,
    ) -> Result<(), ResourceError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let img = self.to_image(attachment).ok_or_else(|| ResourceError::SizeMismatch {
            name: name.clone(),
            expected: self.width as usize * self.height as usize * 4,
            actual: self.attachment(attachment).len() * 4,
        })?;
        img.save(path)
            .map_err(|source| ResourceError::Image { name, source })
    }

    /// Write `<prefix>_color.png`, `<prefix>_normal.png` and `<prefix>_ambient.png` to `dir`
    pub fn save_all<P: AsRef<Path>>(&self, dir: P, prefix: &str) -> Result<Vec<PathBuf>, ResourceError> {
        GBufferAttachment::ALL
            .iter()
            .map(|a| {
                let path = dir.as_ref().join(format!("{prefix}_{}.png", a.name()));
                self.save_png(*a, &path)?;
                Ok(path)
            })
            .collect()
    }
}
