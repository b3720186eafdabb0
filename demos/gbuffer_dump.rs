//! Render a small scene into the G-buffer and dump every attachment as PNG
//!
//! ```text
//! cargo run --example gbuffer_dump -- --backend software --out target/gbuffer
//! ```

use clap::Parser;
use deferred_gbuffer::backend::types::{
    AddressMode, CullMode, FilterMode, SamplerDescriptor, TextureFormat,
};
use deferred_gbuffer::resources::{Material, Mesh, TextureData, TextureSlot};
use deferred_gbuffer::scene::{Camera, Projection, Transform};
use deferred_gbuffer::{BackendType, GBufferConfig, GBufferRenderer};
use glam::{Quat, Vec3, Vec4};
use std::path::PathBuf;
use std::sync::Arc;

/// Backend selection for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliBackend {
    /// Headless wgpu device.
    Wgpu,
    /// CPU rasterizer.
    Software,
}

/// Face culling for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliCull {
    None,
    Front,
    Back,
}

/// Sampler filter for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliFilter {
    Nearest,
    Linear,
}

#[derive(Parser, Debug)]
#[command(
    name = "gbuffer_dump",
    about = "Fill a G-buffer with a demo scene and write its attachments as PNG files"
)]
struct Args {
    /// Backend filling the G-buffer.
    #[arg(long, default_value = "software", value_enum)]
    backend: CliBackend,

    /// Target width in pixels.
    #[arg(long, default_value = "640")]
    width: u32,

    /// Target height in pixels.
    #[arg(long, default_value = "360")]
    height: u32,

    /// Face culling mode.
    #[arg(long, default_value = "back", value_enum)]
    cull: CliCull,

    /// Force one filter on every material sampler.
    #[arg(long, value_enum)]
    filter: Option<CliFilter>,

    /// Directory the PNG files are written to.
    #[arg(long, default_value = "gbuffer_out")]
    out: PathBuf,
}

/// Checkerboard with transparent cells, cut out by the alpha test
fn fence_texture() -> Arc<TextureData> {
    Arc::new(TextureData::checkerboard(64, [230, 200, 150, 255], [0, 0, 0, 0]))
}

fn data_texture(name: &str, size: u32, texel: impl Fn(u32, u32) -> [u8; 4]) -> TextureData {
    let mut data = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            data.extend_from_slice(&texel(x, y));
        }
    }
    TextureData::from_rgba8(size, size, data, TextureFormat::Rgba8Unorm, name)
        .unwrap_or_else(|_| TextureData::black())
}

/// Horizontal gradient lightmap
fn lightmap_texture() -> Arc<TextureData> {
    Arc::new(data_texture("lightmap", 32, |x, _| {
        let v = (64 + x * 6) as u8;
        [v, v, (v as u32 * 3 / 4) as u8, 255]
    }))
}

/// Normal map with ridges along U
fn ridge_normal_texture() -> Arc<TextureData> {
    Arc::new(data_texture("ridges", 32, |x, _| {
        let slope = (x as f32 / 32.0 * std::f32::consts::TAU * 4.0).sin() * 0.5;
        let n = Vec3::new(slope, 0.0, 1.0).normalize() * 0.5 + 0.5;
        [(n.x * 255.0) as u8, (n.y * 255.0) as u8, (n.z * 255.0) as u8, 255]
    }))
}

fn build_scene() -> Vec<Mesh> {
    let lightmap = lightmap_texture();

    let mut floor = Mesh::plane(8.0, 8.0, 4)
        .with_transform(Transform::from_position(Vec3::new(0.0, -0.5, 0.0)));
    for surface in floor.surfaces_mut() {
        surface.material = Material::new("floor")
            .with_texture(
                TextureSlot::Diffuse,
                Arc::new(TextureData::checkerboard(64, [180, 180, 180, 255], [90, 90, 90, 255])),
            )
            .with_texture(TextureSlot::Lightmap, lightmap.clone())
            .with_sampler(SamplerDescriptor::default().with_address_mode(AddressMode::Repeat));
    }

    let mut cube = Mesh::cube().with_transform(Transform::from_position_rotation(
        Vec3::new(-1.0, 0.0, 0.0),
        Quat::from_rotation_y(0.6),
    ));
    for surface in cube.surfaces_mut() {
        surface.material = Material::new("ridged")
            .with_diffuse_color(Vec4::new(0.8, 0.3, 0.2, 1.0))
            .with_texture(TextureSlot::Normal, ridge_normal_texture())
            .with_texture(
                TextureSlot::Specular,
                Arc::new(TextureData::solid_data([200, 0, 0, 255], "shiny")),
            )
            .with_texture(TextureSlot::Lightmap, lightmap.clone());
    }

    let mut fence = Mesh::cube().with_transform(
        Transform::from_position(Vec3::new(1.2, 0.0, 0.5)).with_scale(Vec3::new(1.0, 1.0, 0.1)),
    );
    for surface in fence.surfaces_mut() {
        surface.material = Material::cutout(fence_texture());
    }

    let mut sphere = Mesh::sphere(32, 16)
        .with_transform(Transform::from_position(Vec3::new(0.3, 0.2, -1.2)));
    sphere.set_color(Vec4::new(0.2, 0.5, 0.9, 1.0));

    vec![floor, cube, fence, sphere]
}

fn main() {
    deferred_gbuffer::init_logging();
    let args = Args::parse();

    let config = GBufferConfig {
        width: args.width,
        height: args.height,
        backend: match args.backend {
            CliBackend::Wgpu => BackendType::Wgpu,
            CliBackend::Software => BackendType::Software,
        },
        cull_mode: match args.cull {
            CliCull::None => CullMode::None,
            CliCull::Front => CullMode::Front,
            CliCull::Back => CullMode::Back,
        },
        filter: args.filter.map(|f| match f {
            CliFilter::Nearest => FilterMode::Nearest,
            CliFilter::Linear => FilterMode::Linear,
        }),
    };

    let mut renderer = match GBufferRenderer::new(&config) {
        Ok(renderer) => renderer,
        Err(e) => {
            log::error!("Failed to create {:?} renderer: {}", config.backend, e);
            std::process::exit(1);
        }
    };

    let scene = build_scene();
    let meshes: Vec<&Mesh> = scene.iter().collect();
    let camera = Camera::new(Vec3::new(2.5, 2.0, 4.0), Vec3::new(0.0, -0.2, 0.0))
        .with_projection(Projection::perspective(50.0, 16.0 / 9.0, 0.1, 100.0));

    let (gbuffer, stats) = match renderer.render(&camera, &meshes) {
        Ok(result) => result,
        Err(e) => {
            log::error!("G-buffer pass failed: {}", e);
            std::process::exit(1);
        }
    };
    log::info!(
        "{} meshes drawn, {} culled, {} triangles, {} pixels covered",
        stats.meshes_drawn,
        stats.meshes_culled,
        stats.triangles,
        gbuffer.coverage()
    );

    if let Err(e) = std::fs::create_dir_all(&args.out) {
        log::error!("Cannot create {}: {}", args.out.display(), e);
        std::process::exit(1);
    }
    match gbuffer.save_all(&args.out, "gbuffer") {
        Ok(paths) => {
            for path in paths {
                log::info!("Wrote {}", path.display());
            }
        }
        Err(e) => {
            log::error!("Failed to write attachments: {}", e);
            std::process::exit(1);
        }
    }
    if let Some(depth) = gbuffer.depth_image() {
        let path = args.out.join("gbuffer_depth.png");
        match depth.save(&path) {
            Ok(()) => log::info!("Wrote {}", path.display()),
            Err(e) => log::warn!("Failed to write depth: {}", e),
        }
    }
}
