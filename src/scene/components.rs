//! Component records attached to entities.
//!
//! These are plain data: emit copies them verbatim into snapshots, so
//! everything here is `Clone` and free of interior references. Assets are
//! referenced by id, never by handle; the prepare stages resolve ids against
//! the asset server on their own threads.

use bitflags::bitflags;
use glam::{Vec2, Vec3};

use crate::assets::AssetId;

/// Per-entity bitmask restricting which cameras and listeners see it.
///
/// A light affects a camera only if `light.scene_mask & camera.scene_mask`
/// is non-zero; the same rule applies to renderables, texts, and voices.
pub type SceneMask = u32;

/// Maximum cascade count for directional shadow maps.
pub const MAX_CASCADES: usize = 4;

// ─── Rendering ────────────────────────────────────────────────────────────────

/// Marks an entity as renderable.
#[derive(Debug, Clone, Copy)]
pub struct RenderComponent {
    /// Model or render-object (LOD set) asset.
    pub object: AssetId,
    /// Per-instance color in gamma space.
    pub color: Vec3,
    pub intensity: f32,
    pub opacity: f32,
    pub scene_mask: SceneMask,
    pub layer: i32,
}

impl Default for RenderComponent {
    fn default() -> Self {
        Self {
            object: AssetId::INVALID,
            color: Vec3::ONE,
            intensity: 1.0,
            opacity: 1.0,
            scene_mask: 1,
            layer: 0,
        }
    }
}

/// Scrolls through the frames of an array texture over time.
#[derive(Debug, Clone, Copy)]
pub struct TextureAnimationComponent {
    pub speed: f32,
    pub offset: f32,
    /// Engine time at which the animation started, microseconds.
    pub start_time: u64,
}

impl Default for TextureAnimationComponent {
    fn default() -> Self {
        Self {
            speed: 1.0,
            offset: 0.0,
            start_time: 0,
        }
    }
}

/// Plays a skeletal animation on a rigged model.
#[derive(Debug, Clone, Copy)]
pub struct SkeletalAnimationComponent {
    pub animation: AssetId,
    pub speed: f32,
    pub offset: f32,
    /// Engine time at which the animation started, microseconds.
    pub start_time: u64,
}

impl Default for SkeletalAnimationComponent {
    fn default() -> Self {
        Self {
            animation: AssetId::INVALID,
            speed: 1.0,
            offset: 0.0,
            start_time: 0,
        }
    }
}

// ─── Lights & shadows ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional,
    Spot {
        /// Full cone angle in radians.
        angle: f32,
        exponent: f32,
    },
    Point,
}

#[derive(Debug, Clone, Copy)]
pub struct LightComponent {
    pub kind: LightKind,
    /// Color in gamma space.
    pub color: Vec3,
    pub intensity: f32,
    /// Constant, linear, quadratic attenuation coefficients.
    pub attenuation: Vec3,
    /// Higher priority survives the per-camera light cap longer.
    pub priority: i32,
    pub scene_mask: SceneMask,
}

impl Default for LightComponent {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            color: Vec3::ONE,
            intensity: 1.0,
            attenuation: Vec3::new(1.0, 0.0, 1.0),
            priority: 0,
            scene_mask: 1,
        }
    }
}

/// Attached next to a [`LightComponent`] to make the light cast shadows.
#[derive(Debug, Clone, Copy)]
pub struct ShadowmapComponent {
    /// Shadow texture resolution (square).
    pub resolution: u32,
    /// Light-space extents: for directional lights the orthographic
    /// half-extents, for spot and point lights `x` is the near plane and `y`
    /// the far plane.
    pub world_extent: Vec3,
    /// Cascade count for directional lights; 1 disables cascading.
    pub cascade_count: u32,
    /// Per-cascade far-distance fractions of `max_distance`, monotonically
    /// non-decreasing; entries beyond `cascade_count` are ignored.
    pub cascade_splits: [f32; MAX_CASCADES],
    /// Far bound of the cascaded shadow volume along the camera view.
    pub max_distance: f32,
    pub normal_offset_scale: f32,
    /// Darkening factor applied by the shadow; 1 is a fully black shadow.
    pub shadow_factor: f32,
}

impl Default for ShadowmapComponent {
    fn default() -> Self {
        Self {
            resolution: 1024,
            world_extent: Vec3::new(10.0, 10.0, 10.0),
            cascade_count: 1,
            cascade_splits: [0.1, 0.3, 1.0, 1.0],
            max_distance: 100.0,
            normal_offset_scale: 0.02,
            shadow_factor: 1.0,
        }
    }
}

// ─── Cameras ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Half-extents of the view volume.
    Orthographic { size: Vec2 },
    /// Vertical field of view in radians.
    Perspective { fov: f32 },
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CameraClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

bitflags! {
    /// Which post-processing effects a camera runs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EffectsFlags: u32 {
        const AMBIENT_OCCLUSION = 1 << 0;
        const DEPTH_OF_FIELD = 1 << 1;
        const EYE_ADAPTATION = 1 << 2;
        const BLOOM = 1 << 3;
        const TONE_MAPPING = 1 << 4;
        const GAMMA_CORRECTION = 1 << 5;
        const ANTI_ALIASING = 1 << 6;
        const SHARPENING = 1 << 7;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BloomConfig {
    pub threshold: f32,
    pub blur_passes: u32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            blur_passes: 5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AmbientOcclusionConfig {
    pub world_radius: f32,
    pub strength: f32,
    pub bias: f32,
}

impl Default for AmbientOcclusionConfig {
    fn default() -> Self {
        Self {
            world_radius: 0.5,
            strength: 3.0,
            bias: 0.03,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DepthOfFieldConfig {
    pub focus_distance: f32,
    pub focus_radius: f32,
    pub blend_radius: f32,
}

impl Default for DepthOfFieldConfig {
    fn default() -> Self {
        Self {
            focus_distance: 5.0,
            focus_radius: 0.0,
            blend_radius: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EyeAdaptationConfig {
    pub key: f32,
    pub darker_speed: f32,
    pub lighter_speed: f32,
}

impl Default for EyeAdaptationConfig {
    fn default() -> Self {
        Self {
            key: 0.15,
            darker_speed: 0.1,
            lighter_speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TonemapConfig {
    pub shoulder_strength: f32,
    pub linear_strength: f32,
    pub white_cutoff: f32,
}

impl Default for TonemapConfig {
    fn default() -> Self {
        Self {
            shoulder_strength: 0.22,
            linear_strength: 0.3,
            white_cutoff: 11.2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SharpenConfig {
    pub strength: f32,
}

impl Default for SharpenConfig {
    fn default() -> Self {
        Self { strength: 0.5 }
    }
}

/// Post-effect configuration of a camera. The flags choose which passes run;
/// the sub-configs parameterize them.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostEffects {
    pub flags: EffectsFlags,
    pub ambient_occlusion: AmbientOcclusionConfig,
    pub depth_of_field: DepthOfFieldConfig,
    pub eye_adaptation: EyeAdaptationConfig,
    pub bloom: BloomConfig,
    pub tonemap: TonemapConfig,
    pub sharpen: SharpenConfig,
    /// Display gamma of this camera; 0 falls back to the engine-wide
    /// `ember/graphics/gamma` config value.
    pub gamma: f32,
}

impl Default for EffectsFlags {
    fn default() -> Self {
        EffectsFlags::empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CameraComponent {
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
    pub ambient_color: Vec3,
    pub ambient_intensity: f32,
    /// Directional ambient contribution from above, on top of the flat term.
    pub sky_color: Vec3,
    pub sky_intensity: f32,
    /// Render into this texture instead of the window.
    pub target: Option<AssetId>,
    pub clear: CameraClearFlags,
    pub scene_mask: SceneMask,
    /// Cameras render in ascending order within their target group.
    pub order: i32,
    /// Cap on unshadowed lights applied after priority sorting.
    pub max_lights: u32,
    pub effects: PostEffects,
}

impl Default for CameraComponent {
    fn default() -> Self {
        Self {
            projection: Projection::Perspective {
                fov: 60f32.to_radians(),
            },
            near: 0.1,
            far: 1000.0,
            ambient_color: Vec3::ZERO,
            ambient_intensity: 1.0,
            sky_color: Vec3::ZERO,
            sky_intensity: 1.0,
            target: None,
            clear: CameraClearFlags::COLOR | CameraClearFlags::DEPTH,
            scene_mask: 1,
            order: 0,
            max_lights: 32,
            effects: PostEffects::default(),
        }
    }
}

// ─── Sound ────────────────────────────────────────────────────────────────────

/// Distance attenuation model of a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoundAttenuation {
    /// No distance falloff.
    None,
    /// Linear falloff between min and max distance.
    #[default]
    Linear,
    /// Logarithmic falloff, steep near the source.
    Logarithmic,
    /// Physically motivated inverse-square falloff.
    InverseSquare,
}

#[derive(Debug, Clone, Copy)]
pub struct SoundComponent {
    pub sound: AssetId,
    pub attenuation: SoundAttenuation,
    pub min_distance: f32,
    pub max_distance: f32,
    pub gain: f32,
    pub priority: i32,
    pub looping: bool,
    /// Engine time at which playback started, microseconds.
    pub start_time: u64,
    pub scene_mask: SceneMask,
}

impl Default for SoundComponent {
    fn default() -> Self {
        Self {
            sound: AssetId::INVALID,
            attenuation: SoundAttenuation::Linear,
            min_distance: 1.0,
            max_distance: 100.0,
            gain: 1.0,
            priority: 0,
            looping: false,
            start_time: 0,
            scene_mask: 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListenerComponent {
    /// Cap on concurrently mixed voices.
    pub max_sounds: u32,
    /// Voices whose effective gain falls below this are culled for the tick.
    pub gain_threshold: f32,
    /// Output gain of the listener bus.
    pub gain: f32,
    pub scene_mask: SceneMask,
}

impl Default for ListenerComponent {
    fn default() -> Self {
        Self {
            max_sounds: 16,
            gain_threshold: 0.001,
            gain: 1.0,
            scene_mask: 1,
        }
    }
}

// ─── Text ─────────────────────────────────────────────────────────────────────

/// Where the glyph transcript of a text entity comes from.
#[derive(Debug, Clone)]
pub enum TextSource {
    /// A literal string.
    Literal(String),
    /// An entry in a text-pack asset, with positional `{n}` parameters.
    Pack {
        pack: AssetId,
        name: u32,
        parameters: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy)]
pub struct TextFormat {
    pub size: f32,
    pub align: TextAlign,
    /// Wrap width in layout units; infinite disables wrapping.
    pub wrap_width: f32,
    pub line_spacing: f32,
}

impl Default for TextFormat {
    fn default() -> Self {
        Self {
            size: 1.0,
            align: TextAlign::Left,
            wrap_width: f32::INFINITY,
            line_spacing: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextComponent {
    pub font: AssetId,
    pub source: TextSource,
    pub format: TextFormat,
    pub color: Vec3,
    pub intensity: f32,
    pub scene_mask: SceneMask,
}

impl Default for TextComponent {
    fn default() -> Self {
        Self {
            font: AssetId::INVALID,
            source: TextSource::Literal(String::new()),
            format: TextFormat::default(),
            color: Vec3::ONE,
            intensity: 1.0,
            scene_mask: 1,
        }
    }
}
