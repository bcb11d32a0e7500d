//! Graphics prepare: snapshot in, render queue out.
//!
//! Runs on the prepare thread once per frame. The stage reads the freshest
//! emit snapshot, interpolates every transform to the tick's target time,
//! and records a complete frame of GPU commands: shadow sub-passes first,
//! then for each camera a depth prepass, the standard pass, the post-effect
//! chain, and the final blit. Recording is deterministic: the same snapshot
//! and clock produce an identical queue.

pub mod effects;
pub mod lights;
pub mod shadowmap;
pub mod text;

use std::collections::BTreeMap;

use glam::{IVec2, Mat3, Mat4, UVec2, Vec3, Vec4};
use slotmap::Key;

use crate::animation::preparator::{AnimationPreparator, Armature};
use crate::animation::{SkeletalAnimation, SkeletonRig};
use crate::assets::types::{MeshRenderFlags, TextureAsset};
use crate::assets::{AssetHandle, AssetId, AssetServer, Model, RenderObject};
use crate::config::{keys, Config};
use crate::graphics::emit::{EmitRenderable, EmitSnapshot};
use crate::graphics::frustum::Frustum;
use crate::graphics::provisional::ProvisionalGraphics;
use crate::graphics::queue::{RenderCommand, RenderQueue, TextureRef};
use crate::graphics::uniforms::{gamma_to_linear, Mat34, UniMesh};
use crate::platform::gpu::{
    AttachmentLayer, BlendMode, DepthFunc, TextureDesc, TextureFormat, TextureKind, UniformValue,
};
use crate::scene::components::{Projection, SkeletalAnimationComponent, TextureAnimationComponent};
use crate::scene::EntityId;

/// Built-in asset names the prepare stage references.
pub mod builtin {
    use crate::assets::AssetId;

    pub const MODEL_SQUARE: &str = "ember/model/square";
    pub const MODEL_BONE: &str = "ember/model/bone";
    pub const MODEL_PLACEHOLDER: &str = "ember/model/placeholder";
    pub const SHADER_STANDARD: &str = "ember/shader/scene/standard";
    pub const SHADER_DEPTH: &str = "ember/shader/scene/depth";
    pub const SHADER_BLIT: &str = "ember/shader/scene/blit";
    pub const SHADER_FONT: &str = "ember/shader/scene/font";
    pub const SHADER_VISUALIZE_COLOR: &str = "ember/shader/visualize/color";
    pub const SHADER_VISUALIZE_DEPTH: &str = "ember/shader/visualize/depth";

    #[must_use]
    pub fn id(name: &str) -> AssetId {
        AssetId::from_name(name)
    }
}

/// Shader interface conventions: block bindings, texture units, uniform
/// locations, and instancing limits shared with the engine shaders.
pub mod conventions {
    pub const BLOCK_VIEWPORT: u32 = 0;
    pub const BLOCK_MESHES: u32 = 1;
    pub const BLOCK_ARMATURES: u32 = 2;
    pub const BLOCK_LIGHTS: u32 = 3;
    pub const BLOCK_SHADOW: u32 = 4;
    pub const BLOCK_GLYPHS: u32 = 5;

    pub const TEX_ALBEDO: u32 = 0;
    pub const TEX_SPECIAL: u32 = 1;
    pub const TEX_NORMAL: u32 = 2;
    pub const TEX_DEPTH: u32 = 5;
    pub const TEX_SHADOW: u32 = 6;
    pub const TEX_SHADOW_CUBE: u32 = 7;

    pub const UNI_LIGHTS_COUNT: u32 = 0;
    pub const UNI_ROUTINES: u32 = 1;
    pub const UNI_BONES_PER_INSTANCE: u32 = 2;
    pub const UNI_TEXT_MVP: u32 = 3;
    pub const UNI_TEXT_COLOR: u32 = 4;
    pub const UNI_TEXEL_SIZE: u32 = 5;

    /// Instances per draw; skeletal batches shrink this so the armature
    /// block stays within `MAX_ARMATURE_MATRICES`.
    pub const MAX_INSTANCES: u32 = 256;
    pub const MAX_ARMATURE_MATRICES: u32 = 1024;
    /// Glyph instances per text draw.
    pub const MAX_GLYPHS: u32 = 512;
}

// ─── Context & pass data ──────────────────────────────────────────────────────

/// Everything a prepare tick reads.
pub struct PrepareContext<'a> {
    pub snapshot: &'a EmitSnapshot,
    pub assets: &'a AssetServer,
    pub provisional: &'a ProvisionalGraphics,
    pub preparator: &'a AnimationPreparator,
    pub window_resolution: UVec2,
    /// Target interpolation time from the timing corrector, microseconds.
    pub prepare_time: u64,
    pub interpolation_factor: f32,

    // Config flags, read once per tick.
    pub render_missing_models: bool,
    pub render_skeleton_bones: bool,
    pub visualize_buffer: i32,
    pub disable_ambient_occlusion: bool,
    pub disable_bloom: bool,
    /// Engine-wide display gamma; cameras whose post effects leave their own
    /// gamma at zero inherit this value.
    pub gamma: f32,
    /// Largest texture edge the backend supports; shadow maps above this
    /// degrade to unshadowed.
    pub max_texture_size: u32,
}

impl<'a> PrepareContext<'a> {
    /// Reads the config-driven fields from a registry.
    pub fn flags_from_config(config: &Config) -> PrepareFlags {
        PrepareFlags {
            render_missing_models: config.get_bool(keys::RENDER_MISSING_MODELS, false),
            render_skeleton_bones: config.get_bool(keys::RENDER_SKELETON_BONES, false),
            visualize_buffer: config.get_i32(keys::VISUALIZE_BUFFER, 0),
            disable_ambient_occlusion: config.get_bool(keys::DISABLE_AMBIENT_OCCLUSION, false),
            disable_bloom: config.get_bool(keys::DISABLE_BLOOM, false),
            gamma: config.get_f32(keys::GAMMA, 2.2),
        }
    }
}

/// Config flags consumed by [`PrepareContext`].
#[derive(Debug, Clone, Copy)]
pub struct PrepareFlags {
    pub render_missing_models: bool,
    pub render_skeleton_bones: bool,
    pub visualize_buffer: i32,
    pub disable_ambient_occlusion: bool,
    pub disable_bloom: bool,
    pub gamma: f32,
}

/// Opaque batching key: instances drawn together share a mesh and skinning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BatchKey {
    pub model: AssetId,
    pub skeletal: bool,
}

pub struct ModelInstance {
    pub uni: UniMesh,
    pub armature: Option<Armature>,
}

pub struct TranslucentDraw {
    pub key: BatchKey,
    pub instance: ModelInstance,
    /// Clip-space depth of the object center, for back-to-front ordering.
    pub depth: f32,
    /// First material texture, tie-breaking equal depths for state coherence.
    pub texture: AssetId,
}

pub struct TextDraw {
    pub model: Mat4,
    pub font: AssetId,
    pub atlas: AssetId,
    pub glyphs: Vec<crate::graphics::uniforms::UniGlyph>,
    /// Linear rgb premultiplied by intensity.
    pub color: Vec3,
}

/// LOD selection parameters, always derived from the *camera*, even inside
/// shadow sub-passes.
#[derive(Debug, Clone, Copy)]
pub struct LodSelection {
    pub center: Vec3,
    /// Vertical screen size in pixels of one meter, one meter ahead.
    pub screen_size: f32,
    pub orthographic: bool,
}

/// Everything gathered for one scene pass (camera or shadow sub-pass).
pub struct PassData {
    pub entity: EntityId,
    pub scene_mask: u32,
    pub resolution: UVec2,
    pub view: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
    pub lod: LodSelection,
    pub opaque: BTreeMap<BatchKey, Vec<ModelInstance>>,
    pub translucent: Vec<TranslucentDraw>,
    pub texts: Vec<TextDraw>,
    /// Resolved model handles, keeping every referenced asset alive for the
    /// life of the recorded queue.
    pub models: BTreeMap<AssetId, AssetHandle<Model>>,
}

impl PassData {
    #[must_use]
    pub fn new(entity: EntityId, scene_mask: u32, resolution: UVec2, lod: LodSelection) -> Self {
        Self {
            entity,
            scene_mask,
            resolution,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            view_proj: Mat4::IDENTITY,
            lod,
            opaque: BTreeMap::new(),
            translucent: Vec::new(),
            texts: Vec::new(),
            models: BTreeMap::new(),
        }
    }
}

/// How a scene pass is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Shadowmap,
    DepthPrepass,
    Standard,
}

/// An intermediate texture exposed to the buffer visualization.
pub struct DebugVisualization {
    pub texture: TextureRef,
    pub shader: AssetId,
}

// ─── Frame entry point ────────────────────────────────────────────────────────

/// Records a full frame into `out`.
pub fn prepare_frame(ctx: &PrepareContext<'_>, out: &mut RenderQueue) {
    ctx.preparator.reset();

    if ctx.window_resolution.x == 0 || ctx.window_resolution.y == 0 {
        log::debug!("window has zero area, skipping frame");
        return;
    }

    // Texture-target cameras render before the window cameras; within each
    // group the declared order decides.
    let mut cameras: Vec<&crate::graphics::emit::EmitCamera> = ctx.snapshot.cameras.iter().collect();
    cameras.sort_by_key(|c| (c.camera.target.is_none(), c.camera.order, c.entity.data().as_ffi()));

    // Two cameras sharing one target texture: last write wins, but it is a
    // call-site error worth flagging.
    let mut targets: Vec<AssetId> = cameras.iter().filter_map(|c| c.camera.target).collect();
    targets.sort_unstable();
    for pair in targets.windows(2) {
        if pair[0] == pair[1] {
            log::error!(
                "two cameras target texture {} in the same frame; last write wins",
                pair[0]
            );
        }
    }

    let mut debug_textures = Vec::new();
    for camera in cameras {
        if let Some(output) = prepare_camera(ctx, camera) {
            for queue in output.shadow_queues {
                out.append(queue);
            }
            out.append(output.camera_queue);
            debug_textures.extend(output.debug);
        }
    }

    record_visualize_buffer(ctx, &debug_textures, out);
    out.push(RenderCommand::ResetState);
}

fn record_visualize_buffer(
    ctx: &PrepareContext<'_>,
    debug: &[DebugVisualization],
    out: &mut RenderQueue,
) {
    // Index 0 disables; positive and negative indices rotate through the
    // recorded intermediates.
    let count = debug.len() as i32 + 1;
    let index = ((ctx.visualize_buffer % count + count) % count) - 1;
    let Some(vis) = usize::try_from(index).ok().and_then(|i| debug.get(i)) else {
        return;
    };
    out.push(RenderCommand::PushScope("visualize buffer"));
    out.push(RenderCommand::BindFramebuffer(None));
    out.push(RenderCommand::Viewport {
        origin: IVec2::ZERO,
        size: ctx.window_resolution,
    });
    out.push(RenderCommand::BindModel(builtin::id(builtin::MODEL_SQUARE)));
    out.push(RenderCommand::BindTexture {
        unit: 0,
        texture: vis.texture,
    });
    out.push(RenderCommand::BindProgram {
        program: vis.shader,
        variant: 0,
    });
    out.push(RenderCommand::Uniform {
        location: conventions::UNI_TEXEL_SIZE,
        value: UniformValue::Vec2(glam::Vec2::new(
            1.0 / ctx.window_resolution.x as f32,
            1.0 / ctx.window_resolution.y as f32,
        )),
    });
    out.push(RenderCommand::DepthTest(false));
    out.draw_instanced(1, 2);
    out.push(RenderCommand::ResetState);
    out.push(RenderCommand::PopScope);
}

// ─── Per-camera pass ──────────────────────────────────────────────────────────

struct CameraOutput {
    shadow_queues: Vec<RenderQueue>,
    camera_queue: RenderQueue,
    debug: Vec<DebugVisualization>,
}

fn camera_resolution(
    ctx: &PrepareContext<'_>,
    camera: &crate::graphics::emit::EmitCamera,
) -> Option<UVec2> {
    let resolution = match camera.camera.target {
        Some(target) => {
            let texture = ctx.assets.get::<TextureAsset>(target)?;
            UVec2::new(texture.resolution.0, texture.resolution.1)
        }
        None => ctx.window_resolution,
    };
    if resolution.x == 0 || resolution.y == 0 {
        log::debug!("camera {:?} has a zero-area target, skipped", camera.entity);
        return None;
    }
    Some(resolution)
}

fn camera_projection(projection: Projection, resolution: UVec2, near: f32, far: f32) -> Mat4 {
    match projection {
        Projection::Orthographic { size } => {
            Mat4::orthographic_rh_gl(-size.x, size.x, -size.y, size.y, near, far)
        }
        Projection::Perspective { fov } => {
            let aspect = resolution.x as f32 / resolution.y as f32;
            Mat4::perspective_rh_gl(fov, aspect, near, far)
        }
    }
}

fn lod_selection(projection: Projection, resolution: UVec2, camera_model: &Mat4) -> LodSelection {
    let (screen_size, orthographic) = match projection {
        Projection::Orthographic { size } => (size.y * resolution.y as f32, true),
        Projection::Perspective { fov } => ((fov * 0.5).tan() * 2.0 * resolution.y as f32, false),
    };
    LodSelection {
        center: camera_model.transform_point3(Vec3::ZERO),
        screen_size,
        orthographic,
    }
}

fn prepare_camera(
    ctx: &PrepareContext<'_>,
    camera: &crate::graphics::emit::EmitCamera,
) -> Option<CameraOutput> {
    let resolution = camera_resolution(ctx, camera)?;
    let cam = &camera.camera;

    let camera_model = camera.transform.interpolate(ctx.interpolation_factor).to_mat4();
    let mut pass = PassData::new(
        camera.entity,
        cam.scene_mask,
        resolution,
        lod_selection(cam.projection, resolution, &camera_model),
    );
    pass.view = camera_model.inverse();
    pass.proj = camera_projection(cam.projection, resolution, cam.near, cam.far);
    pass.view_proj = pass.proj * pass.view;

    let mut camera_queue = RenderQueue::new();
    let mut debug = Vec::new();

    // Shadow sub-passes plan first: their light blocks live in the camera
    // queue, and lights that failed to get a texture fall back to the
    // unshadowed list.
    let shadow_plan = shadowmap::plan_shadow_lights(ctx, camera, &pass, &mut camera_queue, &mut debug);

    let lights_block = lights::gather_unshadowed(
        ctx,
        cam,
        &pass,
        &shadow_plan.degraded,
        &mut camera_queue,
    );

    gather_renderables(ctx, &mut pass);
    text::gather_texts(ctx, &mut pass);

    record_camera_passes(
        ctx,
        camera,
        &pass,
        &lights_block,
        &shadow_plan.lights,
        &mut camera_queue,
        &mut debug,
    );

    Some(CameraOutput {
        shadow_queues: shadow_plan.queues,
        camera_queue,
        debug,
    })
}

// ─── Scene gathering ──────────────────────────────────────────────────────────

/// Evaluates the two blended frame indices of a texture-sheet animation.
#[must_use]
pub fn eval_texture_animation(
    meta: &crate::assets::types::TextureAnimationMeta,
    time: u64,
    component: &TextureAnimationComponent,
) -> Vec4 {
    if meta.frames == 0 || meta.duration_us == 0 {
        return Vec4::ZERO;
    }
    let elapsed = time.saturating_sub(component.start_time) as f32;
    let mut frame = elapsed * component.speed * meta.frames as f32 / meta.duration_us as f32
        + component.offset * meta.frames as f32;
    if meta.looping {
        frame = frame.rem_euclid(meta.frames as f32);
    } else {
        frame = frame.clamp(0.0, meta.frames as f32 - 1.0);
    }
    let frame0 = frame.floor();
    let frame1 = if meta.looping {
        (frame0 + 1.0).rem_euclid(meta.frames as f32)
    } else {
        (frame0 + 1.0).min(meta.frames as f32 - 1.0)
    };
    Vec4::new(frame0, frame1, frame - frame0, 0.0)
}

/// Gathers every visible renderable of the snapshot into `pass`.
pub fn gather_renderables(ctx: &PrepareContext<'_>, pass: &mut PassData) {
    for renderable in &ctx.snapshot.renderables {
        if renderable.render.scene_mask & pass.scene_mask == 0 {
            continue;
        }
        let model_mat = renderable
            .transform
            .interpolate(ctx.interpolation_factor)
            .to_mat4();

        if let Some(object) = ctx.assets.get::<RenderObject>(renderable.render.object) {
            let lod = select_lod(&object, pass, &model_mat);
            for &model_id in object.models(lod) {
                add_model(ctx, pass, renderable, &model_mat, model_id, Some(&object));
            }
        } else if ctx.assets.get::<Model>(renderable.render.object).is_some() {
            add_model(ctx, pass, renderable, &model_mat, renderable.render.object, None);
        } else if ctx.render_missing_models {
            add_model(
                ctx,
                pass,
                renderable,
                &model_mat,
                builtin::id(builtin::MODEL_PLACEHOLDER),
                None,
            );
        }
    }

    // Back-to-front; ties broken by mesh then texture so consecutive draws
    // share state.
    pass.translucent.sort_by(|a, b| {
        b.depth
            .total_cmp(&a.depth)
            .then_with(|| a.key.model.cmp(&b.key.model))
            .then_with(|| a.texture.cmp(&b.texture))
    });
}

fn select_lod(object: &RenderObject, pass: &PassData, model_mat: &Mat4) -> usize {
    if object.lods.len() <= 1 {
        return 0;
    }
    let distance = if pass.lod.orthographic {
        1.0
    } else {
        let position = model_mat.transform_point3(Vec3::ZERO);
        position.distance(pass.lod.center).max(1e-4)
    };
    let coverage = pass.lod.screen_size * object.world_size / (distance * object.pixels_size.max(1.0));
    object.lod_select(coverage)
}

fn resolve_armature(
    ctx: &PrepareContext<'_>,
    entity: EntityId,
    model: &Model,
    component: &SkeletalAnimationComponent,
) -> Option<Armature> {
    let animation = ctx.assets.get::<SkeletalAnimation>(component.animation)?;
    let rig = ctx.assets.get::<SkeletonRig>(model.skeleton)?;
    if rig.bone_count() != model.bone_count {
        log::warn!(
            "skeleton {} has {} bones but model declares {}; skinning skipped",
            model.skeleton,
            rig.bone_count(),
            model.bone_count
        );
        return None;
    }
    let coefficient = animation.coefficient(
        ctx.prepare_time,
        component.start_time,
        component.speed,
        component.offset,
    );
    Some(ctx.preparator.instance(entity, &animation, &rig, coefficient))
}

fn add_model(
    ctx: &PrepareContext<'_>,
    pass: &mut PassData,
    renderable: &EmitRenderable,
    model_mat: &Mat4,
    model_id: AssetId,
    parent: Option<&RenderObject>,
) {
    let Some(model) = ctx.assets.get::<Model>(model_id) else {
        return;
    };

    let mvp = pass.view_proj * *model_mat;
    let frustum = Frustum::from_matrix(mvp);
    if !frustum.intersects_aabb(&model.aabb) {
        return;
    }

    // Render-object defaults fill in what the instance leaves at defaults.
    let color = parent.and_then(|p| p.color).unwrap_or(renderable.render.color);
    let intensity = parent
        .and_then(|p| p.intensity)
        .unwrap_or(renderable.render.intensity);
    let opacity = parent
        .and_then(|p| p.opacity)
        .unwrap_or(renderable.render.opacity);

    let mut uni = UniMesh {
        mvp,
        model: Mat34::from_mat4(model_mat),
        normal_mat: Mat34::from_mat3(&Mat3::from_mat4(*model_mat).inverse().transpose()),
        color_intensity: (gamma_to_linear(color) * intensity).extend(opacity),
        animation_uv_frames: Vec4::ZERO,
    };
    uni.normal_mat.rows[2].w = if model.flags.contains(MeshRenderFlags::LIGHTING) {
        1.0
    } else {
        0.0
    };

    if let Some(texture_animation) = &renderable.texture_animation {
        if let Some(texture) = ctx.assets.get::<TextureAsset>(model.texture_names[0]) {
            if let Some(meta) = &texture.animation {
                uni.animation_uv_frames =
                    eval_texture_animation(meta, ctx.prepare_time, texture_animation);
            }
        }
    }

    let mut skeletal_component = renderable.skeletal_animation;
    if skeletal_component.is_none() {
        if let Some(animation) = parent.and_then(|p| p.skeletal_animation) {
            skeletal_component = Some(SkeletalAnimationComponent {
                animation,
                speed: parent.and_then(|p| p.skeletal_animation_speed).unwrap_or(1.0),
                offset: parent.and_then(|p| p.skeletal_animation_offset).unwrap_or(0.0),
                start_time: 0,
            });
        }
    }
    let armature = match (&skeletal_component, model.is_skeletal()) {
        (Some(component), true) => resolve_armature(ctx, renderable.entity, &model, component),
        _ => None,
    };

    if let Some(armature) = &armature {
        if ctx.render_skeleton_bones {
            add_skeleton_bones(ctx, pass, model_mat, armature);
            return;
        }
    }

    let translucent = model.flags.contains(MeshRenderFlags::TRANSLUCENT) || opacity < 1.0;
    let depth = (mvp * Vec4::W).z;
    let key = BatchKey {
        model: model_id,
        skeletal: armature.is_some(),
    };
    let instance = ModelInstance { uni, armature };
    let texture = model.texture_names[0];
    pass.models.insert(model_id, model);

    if translucent {
        pass.translucent.push(TranslucentDraw {
            key,
            instance,
            depth,
            texture,
        });
    } else {
        pass.opaque.entry(key).or_default().push(instance);
    }
}

/// Diagnostic mode: draw one bone model per armature joint instead of the
/// skinned mesh, hue-colored by joint index.
fn add_skeleton_bones(
    ctx: &PrepareContext<'_>,
    pass: &mut PassData,
    model_mat: &Mat4,
    armature: &Armature,
) {
    let bone_id = builtin::id(builtin::MODEL_BONE);
    let Some(bone_model) = ctx.assets.get::<Model>(bone_id) else {
        return;
    };
    let count = armature.len().max(1);
    for (index, joint) in armature.iter().enumerate() {
        let bone_mat = *model_mat * *joint;
        let mvp = pass.view_proj * bone_mat;
        let hue = index as f32 / count as f32;
        let color = hsv_to_rgb(hue, 1.0, 1.0);
        let mut uni = UniMesh {
            mvp,
            model: Mat34::from_mat4(&bone_mat),
            normal_mat: Mat34::from_mat3(&Mat3::from_mat4(bone_mat).inverse().transpose()),
            color_intensity: gamma_to_linear(color).extend(1.0),
            animation_uv_frames: Vec4::ZERO,
        };
        uni.normal_mat.rows[2].w = 1.0;
        let key = BatchKey {
            model: bone_id,
            skeletal: false,
        };
        pass.opaque.entry(key).or_default().push(ModelInstance {
            uni,
            armature: None,
        });
    }
    pass.models.insert(bone_id, bone_model);
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);
    match (i as i32).rem_euclid(6) {
        0 => Vec3::new(v, t, p),
        1 => Vec3::new(q, v, p),
        2 => Vec3::new(p, v, t),
        3 => Vec3::new(p, q, v),
        4 => Vec3::new(t, p, v),
        _ => Vec3::new(v, p, q),
    }
}

// ─── Scene pass recording ─────────────────────────────────────────────────────

/// Records the draws of a gathered pass in batch order.
pub fn record_scene_pass(
    pass: &PassData,
    mode: RenderMode,
    lights: &lights::LightsBlock,
    shadow_lights: &[shadowmap::ShadowLight],
    queue: &mut RenderQueue,
) {
    queue.push(RenderCommand::PushScope("opaque"));
    for (key, instances) in &pass.opaque {
        record_batch(pass, *key, instances, false, mode, lights, shadow_lights, queue);
    }
    queue.push(RenderCommand::PopScope);

    if mode != RenderMode::DepthPrepass {
        queue.push(RenderCommand::PushScope("translucent"));
        for draw in &pass.translucent {
            record_batch(
                pass,
                draw.key,
                std::slice::from_ref(&draw.instance),
                true,
                mode,
                lights,
                shadow_lights,
                queue,
            );
        }
        queue.push(RenderCommand::PopScope);
    }

    if mode == RenderMode::Standard {
        text::record_texts(pass, queue);
    }
}

fn texture_routines(model: &Model) -> smallvec::SmallVec<[u32; 8]> {
    let mut routines = smallvec::smallvec![0u32; 3];
    for (slot, routine) in routines.iter_mut().enumerate() {
        *routine = u32::from(model.texture_names[slot].is_valid());
    }
    routines
}

fn record_batch(
    pass: &PassData,
    key: BatchKey,
    instances: &[ModelInstance],
    translucent: bool,
    mode: RenderMode,
    lights: &lights::LightsBlock,
    shadow_lights: &[shadowmap::ShadowLight],
    queue: &mut RenderQueue,
) {
    let Some(model) = pass.models.get(&key.model) else {
        return;
    };

    queue.push(RenderCommand::BindModel(key.model));
    let program = match mode {
        RenderMode::Standard => builtin::id(builtin::SHADER_STANDARD),
        _ => builtin::id(builtin::SHADER_DEPTH),
    };
    let variant = u32::from(key.skeletal) | (u32::from(translucent) << 1);
    queue.push(RenderCommand::BindProgram { program, variant });
    queue.push(RenderCommand::Culling(
        !model.flags.contains(MeshRenderFlags::TWO_SIDED),
    ));
    queue.push(RenderCommand::DepthTest(
        model.flags.contains(MeshRenderFlags::DEPTH_TEST),
    ));
    queue.push(RenderCommand::DepthWrite(
        model.flags.contains(MeshRenderFlags::DEPTH_WRITE) && !translucent,
    ));

    if mode == RenderMode::Standard {
        for (slot, &texture) in model.texture_names.iter().enumerate() {
            if texture.is_valid() {
                queue.push(RenderCommand::BindTexture {
                    unit: conventions::TEX_ALBEDO + slot as u32,
                    texture: TextureRef::Asset(texture),
                });
            }
        }
        queue.push(RenderCommand::Uniform {
            location: conventions::UNI_ROUTINES,
            value: UniformValue::U32Array(texture_routines(model)),
        });
    }
    queue.push(RenderCommand::Uniform {
        location: conventions::UNI_BONES_PER_INSTANCE,
        value: UniformValue::U32(model.bone_count),
    });

    let limit = if key.skeletal {
        (conventions::MAX_ARMATURE_MATRICES / model.bone_count.max(1))
            .clamp(1, conventions::MAX_INSTANCES)
    } else {
        conventions::MAX_INSTANCES
    } as usize;
    let primitives = model.primitives_count();

    for chunk in instances.chunks(limit) {
        let unis: Vec<UniMesh> = chunk.iter().map(|i| i.uni).collect();
        let mesh_range = queue.stage_uniform_array(&unis);
        queue.bind_uniform_range(conventions::BLOCK_MESHES, mesh_range);

        if key.skeletal {
            let mut armatures: Vec<Mat34> =
                Vec::with_capacity(chunk.len() * model.bone_count as usize);
            for instance in chunk {
                if let Some(armature) = &instance.armature {
                    debug_assert_eq!(armature.len() as u32, model.bone_count);
                    armatures.extend(armature.iter().map(Mat34::from_mat4));
                }
            }
            let range = queue.stage_uniform_array(&armatures);
            queue.bind_uniform_range(conventions::BLOCK_ARMATURES, range);
        }

        match mode {
            RenderMode::Standard => {
                queue.push(RenderCommand::DepthFunc(DepthFunc::LessEqual));
                queue.push(RenderCommand::Blending(if translucent {
                    BlendMode::PremultipliedTransparency
                } else {
                    BlendMode::None
                }));
                if let Some(range) = lights.range {
                    queue.bind_uniform_range(conventions::BLOCK_LIGHTS, range);
                }
                queue.push(RenderCommand::Uniform {
                    location: conventions::UNI_LIGHTS_COUNT,
                    value: UniformValue::U32(lights.count),
                });
                queue.draw_instanced(chunk.len() as u32, primitives);

                // One additive pass per shadow-casting light.
                if !shadow_lights.is_empty() {
                    queue.push(RenderCommand::Blending(BlendMode::Additive));
                    queue.push(RenderCommand::Uniform {
                        location: conventions::UNI_LIGHTS_COUNT,
                        value: UniformValue::U32(1),
                    });
                    for shadow in shadow_lights {
                        queue.push(RenderCommand::BindTexture {
                            unit: if shadow.cube {
                                conventions::TEX_SHADOW_CUBE
                            } else {
                                conventions::TEX_SHADOW
                            },
                            texture: TextureRef::Provisional(shadow.texture),
                        });
                        queue.bind_uniform_range(conventions::BLOCK_LIGHTS, shadow.light_block);
                        queue.bind_uniform_range(conventions::BLOCK_SHADOW, shadow.shadow_block);
                        queue.draw_instanced(chunk.len() as u32, primitives);
                    }
                }
            }
            _ => {
                queue.push(RenderCommand::DepthFunc(DepthFunc::Less));
                queue.push(RenderCommand::Blending(BlendMode::None));
                queue.draw_instanced(chunk.len() as u32, primitives);
            }
        }
    }
    queue.push(RenderCommand::ResetState);
}

// ─── Camera pass recording ────────────────────────────────────────────────────

fn record_camera_passes(
    ctx: &PrepareContext<'_>,
    camera: &crate::graphics::emit::EmitCamera,
    pass: &PassData,
    lights_block: &lights::LightsBlock,
    shadow_lights: &[shadowmap::ShadowLight],
    queue: &mut RenderQueue,
    debug: &mut Vec<DebugVisualization>,
) {
    use crate::graphics::uniforms::UniViewport;

    let cam = &camera.camera;
    let resolution = pass.resolution;

    // Targets are keyed by the camera's target so two cameras with distinct
    // targets never alias, while re-preparing the same camera reuses its
    // textures frame over frame.
    let target_tag: u64 = cam
        .target
        .map_or_else(|| u64::from(u32::MAX) + 1, |t| u64::from(t.raw()));
    let color_name = format!("colorTarget_{target_tag}");
    let depth_name = format!("depthTarget_{target_tag}");
    let color = ctx.provisional.texture(
        &color_name,
        TextureDesc {
            resolution,
            kind: TextureKind::D2,
            format: TextureFormat::Rgb16F,
            mipmaps: false,
        },
    );
    let depth = ctx.provisional.texture(
        &depth_name,
        TextureDesc {
            resolution,
            kind: TextureKind::D2,
            format: TextureFormat::Depth32,
            mipmaps: false,
        },
    );
    debug.push(DebugVisualization {
        texture: TextureRef::Provisional(color),
        shader: builtin::id(builtin::SHADER_VISUALIZE_COLOR),
    });
    debug.push(DebugVisualization {
        texture: TextureRef::Provisional(depth),
        shader: builtin::id(builtin::SHADER_VISUALIZE_DEPTH),
    });

    let framebuffer = ctx.provisional.framebuffer("renderTarget");

    queue.push(RenderCommand::PushScope("camera"));
    queue.push(RenderCommand::BindFramebuffer(Some(framebuffer)));
    queue.push(RenderCommand::AttachColor {
        index: 0,
        texture: Some(TextureRef::Provisional(color)),
        layer: AttachmentLayer::Whole,
    });
    queue.push(RenderCommand::AttachDepth {
        texture: Some(TextureRef::Provisional(depth)),
        layer: AttachmentLayer::Whole,
    });
    queue.push(RenderCommand::ValidateFramebuffer);
    queue.push(RenderCommand::Viewport {
        origin: IVec2::ZERO,
        size: resolution,
    });

    let camera_model = camera.transform.interpolate(ctx.interpolation_factor).to_mat4();
    let viewport_uni = UniViewport {
        view_proj_inverse: pass.view_proj.inverse(),
        eye_position: camera_model.transform_point3(Vec3::ZERO).extend(1.0),
        eye_direction: camera_model.transform_vector3(-Vec3::Z).extend(0.0),
        viewport: Vec4::new(0.0, 0.0, resolution.x as f32, resolution.y as f32),
        ambient_light: (gamma_to_linear(cam.ambient_color) * cam.ambient_intensity).extend(0.0),
        sky_light: (gamma_to_linear(cam.sky_color) * cam.sky_intensity).extend(0.0),
    };
    let viewport_range = queue.stage_uniform_struct(&viewport_uni);
    queue.bind_uniform_range(conventions::BLOCK_VIEWPORT, viewport_range);

    if !cam.clear.is_empty() {
        use crate::scene::components::CameraClearFlags;
        queue.push(RenderCommand::Clear {
            color: cam
                .clear
                .contains(CameraClearFlags::COLOR)
                .then_some([0.0, 0.0, 0.0, 1.0]),
            depth: cam.clear.contains(CameraClearFlags::DEPTH),
            stencil: cam.clear.contains(CameraClearFlags::STENCIL),
        });
    }

    queue.push(RenderCommand::PushScope("depth prepass"));
    queue.push(RenderCommand::ColorWrite(false));
    record_scene_pass(pass, RenderMode::DepthPrepass, lights_block, shadow_lights, queue);
    queue.push(RenderCommand::ColorWrite(true));
    queue.push(RenderCommand::PopScope);

    queue.push(RenderCommand::PushScope("standard"));
    record_scene_pass(pass, RenderMode::Standard, lights_block, shadow_lights, queue);
    queue.push(RenderCommand::PopScope);

    effects::record_effects(ctx, cam, resolution, color, depth, framebuffer, queue);

    // Final blit to the camera target.
    queue.push(RenderCommand::PushScope("final blit"));
    queue.push(RenderCommand::ResetState);
    queue.push(RenderCommand::Viewport {
        origin: IVec2::ZERO,
        size: resolution,
    });
    queue.push(RenderCommand::BindModel(builtin::id(builtin::MODEL_SQUARE)));
    queue.push(RenderCommand::BindTexture {
        unit: 0,
        texture: TextureRef::Provisional(color),
    });
    queue.push(RenderCommand::BindProgram {
        program: builtin::id(builtin::SHADER_BLIT),
        variant: 0,
    });
    match cam.target {
        Some(target) => {
            queue.push(RenderCommand::AttachColor {
                index: 0,
                texture: Some(TextureRef::Asset(target)),
                layer: AttachmentLayer::Whole,
            });
            queue.push(RenderCommand::AttachDepth {
                texture: None,
                layer: AttachmentLayer::Whole,
            });
            queue.push(RenderCommand::ValidateFramebuffer);
            queue.draw_instanced(1, 2);
            queue.push(RenderCommand::BindFramebuffer(None));
        }
        None => {
            queue.push(RenderCommand::BindFramebuffer(None));
            queue.push(RenderCommand::Viewport {
                origin: IVec2::ZERO,
                size: ctx.window_resolution,
            });
            queue.draw_instanced(1, 2);
        }
    }
    queue.push(RenderCommand::ResetState);
    queue.push(RenderCommand::PopScope);
    queue.push(RenderCommand::PopScope);
}
