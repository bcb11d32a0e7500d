//! Shadow-map sub-pass planning.
//!
//! Every shadow-casting light with a scene-mask overlap gets depth-only
//! sub-passes recorded ahead of its camera's pass: directional lights one
//! per cascade into an array texture, spot lights a single perspective pass,
//! point lights six 90° passes into a cube texture. The camera pass then
//! applies each light additively using the staged shadow matrices.

use bytemuck::{Pod, Zeroable};
use glam::{IVec2, Mat4, UVec2, Vec3, Vec4};
use slotmap::Key;

use crate::graphics::emit::{EmitCamera, EmitLight};
use crate::graphics::frustum::frustum_corners_world;
use crate::graphics::provisional::ProvisionalTextureId;
use crate::graphics::queue::{RenderCommand, RenderQueue, TextureRef, UniformRange};
use crate::platform::gpu::{AttachmentLayer, TextureDesc, TextureFormat, TextureKind};
use crate::scene::components::{LightKind, ShadowmapComponent, MAX_CASCADES};
use crate::scene::EntityId;

use super::{
    builtin, camera_projection, lights, DebugVisualization, PassData, PrepareContext, RenderMode,
};

/// Up to four cascades or six cube faces.
const MAX_SHADOW_MATRICES: usize = 6;

/// Shadow parameters of one light, consumed by the camera's additive pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Default)]
pub struct UniShadow {
    pub matrices: [Mat4; MAX_SHADOW_MATRICES],
    /// Cascade (or face) count, shadow factor, unused, unused.
    pub params: Vec4,
    /// View-space far distance per cascade.
    pub cascade_far: Vec4,
}

/// One shadow-casting light planned for a camera.
pub struct ShadowLight {
    pub texture: ProvisionalTextureId,
    pub cube: bool,
    /// `UniLight` with the shadowed variant, staged in the camera queue.
    pub light_block: UniformRange,
    /// [`UniShadow`] staged in the camera queue.
    pub shadow_block: UniformRange,
}

pub struct ShadowPlan {
    pub lights: Vec<ShadowLight>,
    /// Depth sub-pass queues, in dispatch order.
    pub queues: Vec<RenderQueue>,
    /// Lights that failed to get a shadow texture and render unshadowed.
    pub degraded: Vec<EntityId>,
}

/// Plans every shadow light of a camera.
///
/// Shadow lights are unique per entity: the snapshot carries at most one
/// light component per entity, so no dedup pass is needed here.
pub fn plan_shadow_lights(
    ctx: &PrepareContext<'_>,
    camera: &EmitCamera,
    camera_pass: &PassData,
    camera_queue: &mut RenderQueue,
    debug: &mut Vec<DebugVisualization>,
) -> ShadowPlan {
    let mut plan = ShadowPlan {
        lights: Vec::new(),
        queues: Vec::new(),
        degraded: Vec::new(),
    };

    for light in &ctx.snapshot.lights {
        let Some(shadowmap) = &light.shadowmap else {
            continue;
        };
        if light.light.scene_mask & camera.camera.scene_mask == 0 {
            continue;
        }
        if shadowmap.resolution == 0 || shadowmap.resolution > ctx.max_texture_size {
            log::warn!(
                "shadow texture {0}x{0} for light {1:?} not allocatable, light degrades to unshadowed",
                shadowmap.resolution,
                light.entity
            );
            plan.degraded.push(light.entity);
            continue;
        }
        plan_one_light(ctx, camera, camera_pass, light, shadowmap, camera_queue, debug, &mut plan);
    }
    plan
}

fn plan_one_light(
    ctx: &PrepareContext<'_>,
    camera: &EmitCamera,
    camera_pass: &PassData,
    light: &EmitLight,
    shadowmap: &ShadowmapComponent,
    camera_queue: &mut RenderQueue,
    debug: &mut Vec<DebugVisualization>,
    plan: &mut ShadowPlan,
) {
    let light_model = light.transform.interpolate(ctx.interpolation_factor).to_mat4();
    let resolution = UVec2::splat(shadowmap.resolution);

    let (view_projections, cascade_far, kind) = match light.light.kind {
        LightKind::Directional => {
            let (vps, far) = directional_cascades(ctx, camera, camera_pass, &light_model, shadowmap);
            let layers = vps.len() as u32;
            (vps, far, TextureKind::D2Array { layers })
        }
        LightKind::Spot { angle, .. } => {
            let proj = Mat4::perspective_rh_gl(
                angle,
                1.0,
                shadowmap.world_extent.x.max(1e-3),
                shadowmap.world_extent.y,
            );
            (vec![proj * light_model.inverse()], Vec4::ZERO, TextureKind::D2)
        }
        LightKind::Point => {
            let position = light_model.transform_point3(Vec3::ZERO);
            let proj = Mat4::perspective_rh_gl(
                std::f32::consts::FRAC_PI_2,
                1.0,
                shadowmap.world_extent.x.max(1e-3),
                shadowmap.world_extent.y,
            );
            let vps = cube_face_views(position)
                .into_iter()
                .map(|view| proj * view)
                .collect();
            (vps, Vec4::ZERO, TextureKind::Cube)
        }
    };

    let format = if matches!(kind, TextureKind::Cube) {
        TextureFormat::Depth16
    } else {
        TextureFormat::Depth24
    };
    let name = format!(
        "shadowmap_{}_{}",
        light.entity.data().as_ffi(),
        camera.entity.data().as_ffi()
    );
    let texture = ctx.provisional.texture(
        &name,
        TextureDesc {
            resolution,
            kind,
            format,
            mipmaps: false,
        },
    );
    debug.push(DebugVisualization {
        texture: TextureRef::Provisional(texture),
        shader: builtin::id(builtin::SHADER_VISUALIZE_DEPTH),
    });

    // Shadow matrices map world space into [0, 1] shadow-texture space.
    let bias = Mat4::from_scale_rotation_translation(
        Vec3::splat(0.5),
        glam::Quat::IDENTITY,
        Vec3::splat(0.5),
    );
    let mut uni = UniShadow {
        params: Vec4::new(
            view_projections.len() as f32,
            shadowmap.shadow_factor,
            0.0,
            0.0,
        ),
        cascade_far,
        ..UniShadow::default()
    };
    for (i, vp) in view_projections.iter().enumerate().take(MAX_SHADOW_MATRICES) {
        uni.matrices[i] = bias * *vp;
    }
    let shadow_block = camera_queue.stage_uniform_struct(&uni);

    let mut light_uni = lights::init_light_uni(&light_model, &light.light);
    light_uni.parameters.z = shadowmap.normal_offset_scale;
    light_uni.parameters.w = lights::shadowed_variant(light.light.kind);
    let light_block = camera_queue.stage_uniform_struct(&light_uni);

    for (index, view_projection) in view_projections.iter().enumerate() {
        let layer = match kind {
            TextureKind::D2 => AttachmentLayer::Whole,
            TextureKind::Cube => AttachmentLayer::CubeFace(index as u32),
            _ => AttachmentLayer::Layer(index as u32),
        };
        plan.queues.push(record_shadow_subpass(
            ctx,
            light,
            camera_pass,
            *view_projection,
            resolution,
            texture,
            layer,
        ));
    }

    plan.lights.push(ShadowLight {
        texture,
        cube: matches!(kind, TextureKind::Cube),
        light_block,
        shadow_block,
    });
}

/// Splits the camera frustum along the view axis and fits one light-space
/// orthographic volume around each slice.
///
/// Far distances honor the declared split fractions and are monotonically
/// non-decreasing.
#[must_use]
pub fn directional_cascades(
    ctx: &PrepareContext<'_>,
    camera: &EmitCamera,
    camera_pass: &PassData,
    light_model: &Mat4,
    shadowmap: &ShadowmapComponent,
) -> (Vec<Mat4>, Vec4) {
    let cascade_count = shadowmap.cascade_count.clamp(1, MAX_CASCADES as u32) as usize;
    let light_dir = light_model.transform_vector3(-Vec3::Z).normalize_or_zero();
    let light_dir = if light_dir == Vec3::ZERO { -Vec3::Y } else { light_dir };

    let mut vps = Vec::with_capacity(cascade_count);
    let mut cascade_far = Vec4::ZERO;
    let mut near = camera.camera.near;
    for i in 0..cascade_count {
        let fraction = shadowmap.cascade_splits[i].clamp(0.0, 1.0);
        let far = (shadowmap.max_distance * fraction).max(near + 1e-3);

        // World-space corners of this frustum slice.
        let slice_proj = camera_projection(camera.camera.projection, camera_pass.resolution, near, far);
        let slice_vp = slice_proj * camera_pass.view;
        let corners = frustum_corners_world(&slice_vp.inverse());

        let centroid = corners.iter().copied().sum::<Vec3>() / corners.len() as f32;
        let up = if light_dir.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y };
        let view = Mat4::look_to_rh(centroid, light_dir, up);

        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for corner in corners {
            let p = view.transform_point3(corner);
            min = min.min(p);
            max = max.max(p);
        }
        // Pull the near plane back so casters behind the slice still shadow it.
        let caster_margin = shadowmap.world_extent.z.max(1.0);
        let texel = texel_snap(min, max, shadowmap.resolution);
        let proj = Mat4::orthographic_rh_gl(
            texel.min.x,
            texel.max.x,
            texel.min.y,
            texel.max.y,
            -(max.z + caster_margin),
            -min.z,
        );
        vps.push(proj * view);
        cascade_far[i] = far;
        near = far;
    }
    (vps, cascade_far)
}

struct SnappedBounds {
    min: Vec3,
    max: Vec3,
}

/// Snaps light-space bounds to the shadow texel grid so cascade edges do
/// not shimmer as the camera moves.
fn texel_snap(min: Vec3, max: Vec3, resolution: u32) -> SnappedBounds {
    let size = (max - min).max(Vec3::splat(1e-3));
    let texel = size / resolution as f32;
    SnappedBounds {
        min: Vec3::new(
            (min.x / texel.x).floor() * texel.x,
            (min.y / texel.y).floor() * texel.y,
            min.z,
        ),
        max: Vec3::new(
            (max.x / texel.x).ceil() * texel.x,
            (max.y / texel.y).ceil() * texel.y,
            max.z,
        ),
    }
}

/// View matrices of the six cube faces, +X −X +Y −Y +Z −Z.
fn cube_face_views(position: Vec3) -> [Mat4; 6] {
    [
        Mat4::look_to_rh(position, Vec3::X, -Vec3::Y),
        Mat4::look_to_rh(position, -Vec3::X, -Vec3::Y),
        Mat4::look_to_rh(position, Vec3::Y, Vec3::Z),
        Mat4::look_to_rh(position, -Vec3::Y, -Vec3::Z),
        Mat4::look_to_rh(position, Vec3::Z, -Vec3::Y),
        Mat4::look_to_rh(position, -Vec3::Z, -Vec3::Y),
    ]
}

/// Gathers the scene from the light's point of view and records one
/// depth-only pass.
fn record_shadow_subpass(
    ctx: &PrepareContext<'_>,
    light: &EmitLight,
    camera_pass: &PassData,
    view_projection: Mat4,
    resolution: UVec2,
    texture: ProvisionalTextureId,
    layer: AttachmentLayer,
) -> RenderQueue {
    // LOD selection stays camera-driven so a mesh uses the same level in
    // the shadow pass as in the color pass.
    let mut pass = PassData::new(
        light.entity,
        light.light.scene_mask,
        resolution,
        camera_pass.lod,
    );
    pass.view_proj = view_projection;
    super::gather_renderables(ctx, &mut pass);

    let mut queue = RenderQueue::new();
    queue.push(RenderCommand::PushScope("shadowmap"));
    let framebuffer = ctx.provisional.framebuffer("renderTarget");
    queue.push(RenderCommand::BindFramebuffer(Some(framebuffer)));
    queue.push(RenderCommand::AttachColor {
        index: 0,
        texture: None,
        layer: AttachmentLayer::Whole,
    });
    queue.push(RenderCommand::AttachDepth {
        texture: Some(TextureRef::Provisional(texture)),
        layer,
    });
    queue.push(RenderCommand::ValidateFramebuffer);
    queue.push(RenderCommand::Viewport {
        origin: IVec2::ZERO,
        size: resolution,
    });
    queue.push(RenderCommand::ColorWrite(false));
    queue.push(RenderCommand::Clear {
        color: None,
        depth: true,
        stencil: false,
    });

    let no_lights = lights::LightsBlock {
        count: 0,
        range: None,
    };
    super::record_scene_pass(&pass, RenderMode::Shadowmap, &no_lights, &[], &mut queue);

    queue.push(RenderCommand::ColorWrite(true));
    queue.push(RenderCommand::ResetState);
    queue.push(RenderCommand::PopScope);
    queue
}
