//! Per-camera light gathering and filtering.

use glam::{Mat4, Vec3, Vec4};

use crate::graphics::queue::{RenderQueue, UniformRange};
use crate::graphics::uniforms::{gamma_to_linear, light_variant, UniLight};
use crate::scene::components::{CameraComponent, LightComponent, LightKind};
use crate::scene::EntityId;

use super::{PassData, PrepareContext};

/// The unshadowed light set of one camera, staged into its queue.
pub struct LightsBlock {
    pub count: u32,
    pub range: Option<UniformRange>,
}

/// Builds the shared `UniLight` fields from an interpolated light transform.
#[must_use]
pub fn init_light_uni(model: &Mat4, light: &LightComponent) -> UniLight {
    let mut uni = UniLight {
        color: (gamma_to_linear(light.color) * light.intensity).extend(0.0),
        position: model.transform_point3(Vec3::ZERO).extend(1.0),
        direction: model.transform_vector3(-Vec3::Z).normalize_or_zero().extend(0.0),
        attenuation: light.attenuation.extend(0.0),
        parameters: Vec4::ZERO,
    };
    if let LightKind::Spot { angle, exponent } = light.kind {
        uni.parameters.x = (angle * 0.5).cos();
        uni.parameters.y = exponent;
    }
    uni
}

#[must_use]
pub fn unshadowed_variant(kind: LightKind) -> f32 {
    match kind {
        LightKind::Directional => light_variant::DIRECTIONAL,
        LightKind::Spot { .. } => light_variant::SPOT,
        LightKind::Point => light_variant::POINT,
    }
}

#[must_use]
pub fn shadowed_variant(kind: LightKind) -> f32 {
    match kind {
        LightKind::Directional => light_variant::DIRECTIONAL_SHADOW,
        LightKind::Spot { .. } => light_variant::SPOT_SHADOW,
        LightKind::Point => light_variant::POINT_SHADOW,
    }
}

/// Estimated screen-space contribution, the secondary sort key of the
/// light filter. Directional lights reach everything; local lights fall off
/// with attenuated distance to the camera.
fn estimate_contribution(light: &LightComponent, position: Vec3, camera_center: Vec3) -> f32 {
    let luminance = light.color.dot(Vec3::new(0.2126, 0.7152, 0.0722)) * light.intensity;
    match light.kind {
        LightKind::Directional => luminance,
        _ => {
            let d = position.distance(camera_center);
            let a = &light.attenuation;
            luminance / (a.x + a.y * d + a.z * d * d).max(1e-3)
        }
    }
}

/// Fraction of the kept list that fades when the cap is hit.
const FADE_FRACTION: f32 = 0.15;

/// Gathers unshadowed lights for a camera, sorts them by priority then
/// estimated contribution, caps to `max_lights`, and fades the tail so a
/// light crossing the cap dims instead of popping.
///
/// `degraded` lists shadow lights that lost their texture this frame and
/// render unshadowed instead.
pub fn gather_unshadowed(
    ctx: &PrepareContext<'_>,
    camera: &CameraComponent,
    pass: &PassData,
    degraded: &[EntityId],
    queue: &mut RenderQueue,
) -> LightsBlock {
    struct Candidate {
        uni: UniLight,
        priority: i32,
        contribution: f32,
    }

    let mut candidates = Vec::new();
    for light in &ctx.snapshot.lights {
        if light.light.scene_mask & camera.scene_mask == 0 {
            continue;
        }
        if light.shadowmap.is_some() && !degraded.contains(&light.entity) {
            continue;
        }
        let model = light.transform.interpolate(ctx.interpolation_factor).to_mat4();
        let mut uni = init_light_uni(&model, &light.light);
        uni.parameters.w = unshadowed_variant(light.light.kind);
        candidates.push(Candidate {
            contribution: estimate_contribution(
                &light.light,
                uni.position.truncate(),
                pass.lod.center,
            ),
            priority: light.light.priority,
            uni,
        });
    }

    candidates.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.contribution.total_cmp(&a.contribution))
    });

    let max_lights = camera.max_lights as usize;
    let capped = candidates.len() > max_lights;
    candidates.truncate(max_lights);

    if capped && !candidates.is_empty() {
        // Scale color alpha down across the tail; the shader multiplies the
        // light color by it.
        let fade_count = ((candidates.len() as f32 * FADE_FRACTION).ceil() as usize)
            .clamp(1, candidates.len());
        let start = candidates.len() - fade_count;
        for (rank, candidate) in candidates[start..].iter_mut().enumerate() {
            let fade = (fade_count - rank) as f32 / (fade_count + 1) as f32;
            candidate.uni.color *= fade;
        }
    }

    let unis: Vec<UniLight> = candidates.iter().map(|c| c.uni).collect();
    let range = (!unis.is_empty()).then(|| queue.stage_uniform_array(&unis));
    LightsBlock {
        count: unis.len() as u32,
        range,
    }
}
