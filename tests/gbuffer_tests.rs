//! G-buffer integration tests.
//!
//! Every test is parameterized with `rstest` over the software rasterizer and
//! the headless wgpu backend. Backends that cannot be created on the current
//! machine are skipped.
//!
//! ```bash
//! cargo test --test gbuffer_tests
//! WGPU_BACKEND=vulkan cargo test --test gbuffer_tests
//! ```

mod common;

use common::{assert_pixel, center, front_camera, pixel, quad, quad_with_second_uv, Backend, TestContext};
use deferred_gbuffer::backend::types::{CullMode, SamplerDescriptor, TextureFormat, Vertex};
use deferred_gbuffer::pipeline::GBufferAttachment;
use deferred_gbuffer::resources::{
    cube_surface, Material, MeshBuilder, Surface, SurfaceData, TextureData, TextureSlot,
};
use glam::{Vec2, Vec3, Vec4};
use rstest::rstest;
use std::sync::Arc;

// ============================================================================
// Color attachment
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_diffuse_color_is_written_opaque(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mesh = quad(0.0, Material::solid(Vec4::new(0.2, 0.4, 0.6, 0.8)));
    let gbuffer = ctx.render(&front_camera(), &[&mesh]);
    let (x, y) = center();

    assert_pixel(
        pixel(&gbuffer, GBufferAttachment::Color, x, y),
        [51, 102, 153, 255],
        1,
        "color",
    );
    assert!(gbuffer.depth(x, y) < 1.0);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_background_keeps_clear_values(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let gbuffer = ctx.render(&front_camera(), &[]);
    assert_eq!(gbuffer.coverage(), 0);
    for attachment in GBufferAttachment::ALL {
        assert_eq!(pixel(&gbuffer, attachment, 3, 3), [0, 0, 0, 0]);
    }
}

// ============================================================================
// Alpha cutout
// ============================================================================

#[rstest]
#[case::software_below(Backend::Software, 0.45, false)]
#[case::software_threshold(Backend::Software, 0.5, true)]
#[case::software_above(Backend::Software, 0.75, true)]
#[case::wgpu_below(Backend::Wgpu, 0.45, false)]
#[case::wgpu_threshold(Backend::Wgpu, 0.5, true)]
#[case::wgpu_above(Backend::Wgpu, 0.75, true)]
fn test_alpha_cutout_threshold(#[case] backend: Backend, #[case] alpha: f32, #[case] drawn: bool) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mesh = quad(0.0, Material::solid(Vec4::new(1.0, 1.0, 1.0, alpha)));
    let gbuffer = ctx.render(&front_camera(), &[&mesh]);
    let (x, y) = center();

    if drawn {
        assert_eq!(pixel(&gbuffer, GBufferAttachment::Color, x, y)[3], 255);
        assert_eq!(pixel(&gbuffer, GBufferAttachment::Ambient, x, y)[3], 255);
    } else {
        assert_eq!(gbuffer.coverage(), 0);
        for attachment in GBufferAttachment::ALL {
            assert_eq!(pixel(&gbuffer, attachment, x, y), [0, 0, 0, 0]);
        }
    }
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_discarded_fragments_do_not_occlude(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let cutout = quad(0.5, Material::solid(Vec4::new(1.0, 0.0, 0.0, 0.2)));
    let behind = quad(-0.5, Material::solid(Vec4::new(0.0, 1.0, 0.0, 1.0)));
    let gbuffer = ctx.render(&front_camera(), &[&cutout, &behind]);
    let (x, y) = center();

    assert_pixel(
        pixel(&gbuffer, GBufferAttachment::Color, x, y),
        [0, 255, 0, 255],
        1,
        "color behind the cut out quad",
    );
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_checkerboard_cutout_leaves_holes(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    // 16 texels with 8 texel cells: a 2x2 grid, opaque on the diagonal
    let texture = TextureData::checkerboard(16, [255, 255, 255, 255], [255, 255, 255, 0]);
    let material = Material::cutout(Arc::new(texture)).with_sampler(SamplerDescriptor::nearest());
    let mesh = quad(0.0, material);
    let gbuffer = ctx.render(&front_camera(), &[&mesh]);

    // the quad spans roughly pixels 2..30; sample inside each quadrant
    let top_left = gbuffer.decode(10, 10);
    let top_right = gbuffer.decode(22, 10);
    let bottom_left = gbuffer.decode(10, 22);
    let bottom_right = gbuffer.decode(22, 22);
    assert!(top_left.is_some() && bottom_right.is_some());
    assert!(top_right.is_none() && bottom_left.is_none());
}

// ============================================================================
// Normal attachment
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_flat_normal_map_encodes_surface_normal(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mesh = quad(0.0, Material::default());
    let gbuffer = ctx.render(&front_camera(), &[&mesh]);
    let (x, y) = center();

    // +Z encodes to (0.5, 0.5, 1.0); no specular texture means a zero mask
    assert_pixel(
        pixel(&gbuffer, GBufferAttachment::Normal, x, y),
        [128, 128, 255, 0],
        1,
        "normal",
    );
    let surface = gbuffer.decode(x, y).expect("quad covers the center");
    assert!((surface.normal - Vec3::Z).length() < 0.02);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_normal_map_is_rotated_by_tangent_frame(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    // tangent-space +X, which the quad's frame maps to world +X
    let normal_map = TextureData::solid_data([255, 128, 128, 255], "tilted");
    let material = Material::new("tilted").with_texture(TextureSlot::Normal, Arc::new(normal_map));
    let mesh = quad(0.0, material);
    let gbuffer = ctx.render(&front_camera(), &[&mesh]);
    let (x, y) = center();

    let surface = gbuffer.decode(x, y).expect("quad covers the center");
    assert!((surface.normal - Vec3::X).length() < 0.02, "{:?}", surface.normal);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_zero_tangent_frame_writes_tangent_space_normal(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let v = |x: f32, y: f32| Vertex::new(Vec3::new(x, y, 0.0), Vec3::ZERO, Vec2::ZERO, Vec4::ZERO, Vec2::ZERO);
    let data = SurfaceData::new(
        vec![v(-1.0, -1.0), v(1.0, -1.0), v(1.0, 1.0), v(-1.0, 1.0)],
        vec![0, 1, 2, 0, 2, 3],
    )
    .expect("quad indices are valid");
    let mesh = MeshBuilder::new("no frame")
        .with_surface(Surface::new(Arc::new(data)))
        .build();

    let gbuffer = ctx.render(&front_camera(), &[&mesh]);
    let (x, y) = center();

    // the flat default normal map passes through untouched
    assert_pixel(
        pixel(&gbuffer, GBufferAttachment::Normal, x, y),
        [128, 128, 255, 0],
        1,
        "normal",
    );
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_specular_red_channel_lands_in_normal_alpha(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let specular = TextureData::solid_data([200, 10, 20, 255], "specular");
    let material = Material::new("shiny").with_texture(TextureSlot::Specular, Arc::new(specular));
    let mesh = quad(0.0, material);
    let gbuffer = ctx.render(&front_camera(), &[&mesh]);
    let (x, y) = center();

    let normal = pixel(&gbuffer, GBufferAttachment::Normal, x, y);
    assert!((normal[3] as i16 - 200).abs() <= 1, "{normal:?}");
}

// ============================================================================
// Ambient attachment
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_lightmap_is_sampled_with_second_uv(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    // left texel dark, right texel bright; alpha must not leak into the output
    let lightmap = TextureData::from_rgba8(
        2,
        1,
        vec![10, 20, 30, 0, 250, 240, 230, 0],
        TextureFormat::Rgba8Unorm,
        "lightmap",
    )
    .unwrap();
    let material = Material::new("lit")
        .with_texture(TextureSlot::Lightmap, Arc::new(lightmap))
        .with_sampler(SamplerDescriptor::nearest());
    let mesh = quad_with_second_uv(0.0, Vec2::new(0.75, 0.5), material);
    let gbuffer = ctx.render(&front_camera(), &[&mesh]);

    // every covered pixel reads the bright texel, whatever its first UV
    for (x, y) in [(8, 8), (16, 16), (24, 24)] {
        assert_pixel(
            pixel(&gbuffer, GBufferAttachment::Ambient, x, y),
            [250, 240, 230, 255],
            1,
            "ambient",
        );
    }
}

// ============================================================================
// Depth and culling
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_nearest_surface_wins_in_any_order(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let near = quad(0.5, Material::solid(Vec4::new(1.0, 0.0, 0.0, 1.0)));
    let far = quad(-0.5, Material::solid(Vec4::new(0.0, 0.0, 1.0, 1.0)));
    let (x, y) = center();

    for order in [[&near, &far], [&far, &near]] {
        let gbuffer = ctx.render(&front_camera(), &order);
        assert_pixel(
            pixel(&gbuffer, GBufferAttachment::Color, x, y),
            [255, 0, 0, 255],
            1,
            "nearest color",
        );
    }
}

#[rstest]
#[case::software_back(Backend::Software, CullMode::Back, false)]
#[case::software_none(Backend::Software, CullMode::None, true)]
#[case::software_front(Backend::Software, CullMode::Front, true)]
#[case::wgpu_back(Backend::Wgpu, CullMode::Back, false)]
#[case::wgpu_none(Backend::Wgpu, CullMode::None, true)]
#[case::wgpu_front(Backend::Wgpu, CullMode::Front, true)]
fn test_cull_mode_from_behind(#[case] backend: Backend, #[case] cull: CullMode, #[case] visible: bool) {
    let Some(mut ctx) = TestContext::with_cull_mode(backend, cull) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mesh = quad(0.0, Material::default());
    let mut camera = front_camera();
    camera.position = Vec3::new(0.0, 0.0, -2.0);
    let gbuffer = ctx.render(&camera, &[&mesh]);

    assert_eq!(gbuffer.coverage() > 0, visible);
}

// ============================================================================
// Meshes and resource lifetime
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_empty_surface_is_skipped(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mesh = MeshBuilder::new("partly empty")
        .with_surface(Surface::new(Arc::new(SurfaceData::default())))
        .with_surface(cube_surface())
        .with_surface(Surface::new(Arc::new(SurfaceData::default())))
        .build();

    let (gbuffer, stats) = ctx
        .renderer
        .render(&front_camera(), &[&mesh])
        .expect("empty surfaces must not fail the frame");

    assert_eq!(stats.meshes_drawn, 1);
    assert_eq!(stats.triangles, 12);
    assert!(gbuffer.coverage() > 0);
}

#[test]
fn test_gpu_resources_do_not_grow_across_frames() {
    let Some(mut ctx) = TestContext::new(Backend::Wgpu) else {
        eprintln!("Backend {:?} not available, skipping", Backend::Wgpu);
        return;
    };

    let material = Material::solid(Vec4::ONE)
        .with_texture(
            TextureSlot::Diffuse,
            Arc::new(TextureData::checkerboard(8, [255; 4], [0, 0, 0, 255])),
        )
        .with_texture(
            TextureSlot::Specular,
            Arc::new(TextureData::solid_data([200, 0, 0, 255], "spec")),
        );
    let textured = quad(0.0, material);
    let plain = quad(-0.5, Material::default());
    let camera = front_camera();

    let idle = ctx.renderer.live_gpu_resources().expect("wgpu reports live resources");
    for _ in 0..3 {
        ctx.render(&camera, &[&textured, &plain]);
        assert_eq!(ctx.renderer.live_gpu_resources(), Some(idle));
    }

    ctx.renderer.resize(48, 40).expect("resize should succeed");
    assert_eq!(ctx.renderer.live_gpu_resources(), Some(idle));

    let gbuffer = ctx.render(&camera, &[&textured, &plain]);
    assert_eq!((gbuffer.width(), gbuffer.height()), (48, 40));
    assert_eq!(ctx.renderer.live_gpu_resources(), Some(idle));
}
