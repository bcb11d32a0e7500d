//! Graphics Dispatch Tests
//!
//! Tests for:
//! - Executing a recorded queue in order against the backend contract
//! - Lazy upload and caching of asset-backed resources
//! - Transient texture allocation, reuse, and sweeping
//! - Skipping draws whose model or program is missing without stopping

mod common;

use glam::{UVec2, Vec3};

use ember::assets::types::{TextureAsset, TextureTarget};
use ember::assets::{AssetId, AssetServer};
use ember::graphics::dispatch::GraphicsDispatch;
use ember::graphics::emit::{EmitCamera, EmitRenderable, EmitSnapshot, EmitTransforms};
use ember::graphics::prepare::{self, PrepareContext};
use ember::graphics::provisional::ProvisionalGraphics;
use ember::graphics::queue::{RenderCommand, RenderQueue};
use ember::animation::preparator::AnimationPreparator;
use ember::platform::gpu::{RecordingGpu, TextureFormat};
use ember::scene::components::{CameraComponent, RenderComponent};
use ember::scene::{EntityStore, Transform};

fn scene_queue(assets: &AssetServer, provisional: &ProvisionalGraphics) -> RenderQueue {
    let mut store = EntityStore::new();
    let mut snapshot = EmitSnapshot::default();

    let model = assets.insert_named("model/dispatch-quad", common::quad_model());
    let renderable = store.spawn();
    let transform = Transform::from_position(Vec3::new(0.0, 0.0, -5.0));
    snapshot.renderables.push(EmitRenderable {
        entity: renderable,
        transform: EmitTransforms {
            current: transform,
            history: transform,
        },
        render: RenderComponent {
            object: model,
            ..RenderComponent::default()
        },
        texture_animation: None,
        skeletal_animation: None,
    });
    let camera = store.spawn();
    snapshot.cameras.push(EmitCamera {
        entity: camera,
        transform: EmitTransforms::default(),
        camera: CameraComponent::default(),
    });

    let preparator = AnimationPreparator::new();
    let ctx = PrepareContext {
        snapshot: &snapshot,
        assets,
        provisional,
        preparator: &preparator,
        window_resolution: UVec2::new(640, 480),
        prepare_time: 1_000_000,
        interpolation_factor: 0.5,
        render_missing_models: false,
        render_skeleton_bones: false,
        visualize_buffer: 0,
        disable_ambient_occlusion: false,
        disable_bloom: false,
        gamma: 2.2,
        max_texture_size: 16384,
    };
    let mut queue = RenderQueue::new();
    prepare::prepare_frame(&ctx, &mut queue);
    queue
}

#[test]
fn recorded_queue_executes_without_errors() {
    common::init_test_logging();
    let assets = AssetServer::new();
    common::install_builtin_assets(&assets);
    let provisional = ProvisionalGraphics::new();
    let queue = scene_queue(&assets, &provisional);
    assert!(queue.draw_count() > 0);

    let mut gpu = RecordingGpu::new();
    let mut dispatch = GraphicsDispatch::new();
    let errors = dispatch.execute(&queue, &mut gpu, &assets, &provisional);

    assert_eq!(errors, 0);
    assert_eq!(gpu.draw_calls, queue.draw_count());
    // Scene resources uploaded: the test quad mesh plus the blit square.
    assert_eq!(gpu.count_ops("create_mesh"), 2);
    // Camera color + depth targets allocated as transient textures.
    assert!(gpu.count_ops("create_texture") >= 2);
    // Execution starts with the camera scope, in record order.
    let first_scope = gpu
        .ops
        .iter()
        .find(|op| op.starts_with("push_debug_group"))
        .unwrap();
    assert_eq!(first_scope, "push_debug_group camera");
}

#[test]
fn asset_uploads_are_cached_across_frames() {
    common::init_test_logging();
    let assets = AssetServer::new();
    common::install_builtin_assets(&assets);
    let provisional = ProvisionalGraphics::new();
    let queue = scene_queue(&assets, &provisional);

    let mut gpu = RecordingGpu::new();
    let mut dispatch = GraphicsDispatch::new();
    dispatch.execute(&queue, &mut gpu, &assets, &provisional);
    let uploads_first = gpu.count_ops("create_mesh") + gpu.count_ops("create_texture");
    dispatch.execute(&queue, &mut gpu, &assets, &provisional);
    let uploads_second = gpu.count_ops("create_mesh") + gpu.count_ops("create_texture");

    assert_eq!(
        uploads_first, uploads_second,
        "second frame reuses every cached resource"
    );
    assert_eq!(gpu.draw_calls, queue.draw_count() * 2);
}

#[test]
fn invalidated_assets_reupload_on_next_use() {
    common::init_test_logging();
    let assets = AssetServer::new();
    common::install_builtin_assets(&assets);
    let provisional = ProvisionalGraphics::new();
    let queue = scene_queue(&assets, &provisional);

    let mut gpu = RecordingGpu::new();
    let mut dispatch = GraphicsDispatch::new();
    dispatch.execute(&queue, &mut gpu, &assets, &provisional);
    let before = gpu.count_ops("create_mesh");

    dispatch.invalidate_asset(AssetId::from_name("model/dispatch-quad"));
    dispatch.execute(&queue, &mut gpu, &assets, &provisional);
    assert_eq!(gpu.count_ops("create_mesh"), before + 1);
}

#[test]
fn stale_transients_are_destroyed_by_the_sweep() {
    common::init_test_logging();
    let assets = AssetServer::new();
    let provisional = ProvisionalGraphics::new();
    let texture = provisional.texture(
        "orphan",
        ember::platform::gpu::TextureDesc {
            resolution: UVec2::splat(64),
            kind: ember::platform::gpu::TextureKind::D2,
            format: TextureFormat::Rgb16F,
            mipmaps: false,
        },
    );

    let mut queue = RenderQueue::new();
    queue.push(RenderCommand::BindTexture {
        unit: 0,
        texture: ember::graphics::queue::TextureRef::Provisional(texture),
    });

    let mut gpu = RecordingGpu::new();
    let mut dispatch = GraphicsDispatch::new();
    dispatch.execute(&queue, &mut gpu, &assets, &provisional);
    assert_eq!(gpu.count_ops("create_texture"), 1);

    // The texture is never requested again; the sweep eventually drops it.
    for _ in 0..16 {
        dispatch.end_frame(&mut gpu, &provisional);
    }
    assert_eq!(gpu.count_ops("destroy_texture"), 1);
}

#[test]
fn draws_with_missing_resources_are_skipped_not_fatal() {
    common::init_test_logging();
    let assets = AssetServer::new();
    let provisional = ProvisionalGraphics::new();

    let mut queue = RenderQueue::new();
    queue.push(RenderCommand::BindModel(AssetId::from_name("model/absent")));
    queue.draw_instanced(1, 2);
    // A present model after the gap draws normally.
    assets.insert_named("model/present", common::quad_model());
    queue.push(RenderCommand::BindModel(AssetId::from_name("model/present")));
    queue.draw_instanced(1, 2);

    let mut gpu = RecordingGpu::new();
    let mut dispatch = GraphicsDispatch::new();
    let errors = dispatch.execute(&queue, &mut gpu, &assets, &provisional);

    assert_eq!(errors, 0, "missing assets degrade, they do not error");
    assert_eq!(gpu.draw_calls, 1, "only the resolvable draw runs");
}

#[test]
fn texture_assets_upload_with_their_pixels() {
    common::init_test_logging();
    let assets = AssetServer::new();
    let provisional = ProvisionalGraphics::new();
    let id = assets.insert_named(
        "texture/pixels",
        TextureAsset {
            resolution: (2, 2),
            target: TextureTarget::D2,
            format: TextureFormat::Rgba8,
            mipmaps: true,
            animation: None,
            pixels: vec![255; 16],
        },
    );

    let mut queue = RenderQueue::new();
    queue.push(RenderCommand::BindTexture {
        unit: 0,
        texture: ember::graphics::queue::TextureRef::Asset(id),
    });

    let mut gpu = RecordingGpu::new();
    let mut dispatch = GraphicsDispatch::new();
    dispatch.execute(&queue, &mut gpu, &assets, &provisional);
    assert_eq!(gpu.count_ops("data=true"), 1);
    assert_eq!(gpu.count_ops("generate_mipmaps"), 1);
}
