//! Runtime asset types consumed by the pipelines.
//!
//! These are the decoded forms of the pack formats in [`super::formats`],
//! plus a few schemes that exist only in memory (render objects, text
//! packs). GPU-side incarnations (vertex buffers, texture objects) are
//! created lazily by the dispatch thread and cached there; nothing in this
//! module touches the GPU.

use bitflags::bitflags;
use glam::{Vec2, Vec3};
use rustc_hash::FxHashMap;

use super::ids::AssetId;

/// Texture slots a model material can reference.
pub const MAX_TEXTURES_PER_MATERIAL: usize = 4;

// ─── Geometry ─────────────────────────────────────────────────────────────────

/// Axis-aligned bounding box in model space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn half_extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Radius of the bounding sphere around the center.
    #[must_use]
    pub fn radius(&self) -> f32 {
        self.half_extent().length()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    /// The eight corner points.
    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let (mn, mx) = (self.min, self.max);
        [
            Vec3::new(mn.x, mn.y, mn.z),
            Vec3::new(mx.x, mn.y, mn.z),
            Vec3::new(mn.x, mx.y, mn.z),
            Vec3::new(mx.x, mx.y, mn.z),
            Vec3::new(mn.x, mn.y, mx.z),
            Vec3::new(mx.x, mn.y, mx.z),
            Vec3::new(mn.x, mx.y, mx.z),
            Vec3::new(mx.x, mx.y, mx.z),
        ]
    }
}

// ─── Model ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Triangles,
    Lines,
    Points,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MeshRenderFlags: u32 {
        const TRANSLUCENT = 1 << 0;
        const TWO_SIDED = 1 << 1;
        const DEPTH_TEST = 1 << 2;
        const DEPTH_WRITE = 1 << 3;
        const LIGHTING = 1 << 4;
    }
}

impl Default for MeshRenderFlags {
    fn default() -> Self {
        Self::DEPTH_TEST | Self::DEPTH_WRITE | Self::LIGHTING
    }
}

/// UV channel layout of a vertex stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum VertexUvs {
    #[default]
    None,
    Uv2(Vec<Vec2>),
    /// Three-component coordinates for array/cube sampling.
    Uv3(Vec<Vec3>),
}

/// Per-vertex skinning data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneVertex {
    pub indices: [u16; 4],
    pub weights: [f32; 4],
}

/// A renderable mesh with its material parameters.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub primitive: PrimitiveType,
    pub flags: MeshRenderFlags,
    pub aabb: Aabb,
    /// Name hashes of the material textures; invalid entries are unused slots.
    pub texture_names: [AssetId; MAX_TEXTURES_PER_MATERIAL],
    /// Bone count of the rig this mesh is skinned to; 0 for rigid meshes.
    pub bone_count: u32,
    /// Skeleton rig asset for skinned meshes.
    pub skeleton: AssetId,
    /// Opaque material constants uploaded verbatim to the material block.
    pub material: Vec<u8>,

    pub positions: Vec<Vec3>,
    pub uvs: VertexUvs,
    pub normals: Vec<Vec3>,
    /// Tangent/bitangent pairs; present only with normal mapping.
    pub tangents: Vec<(Vec3, Vec3)>,
    pub bones: Vec<BoneVertex>,
    pub indices: Vec<u32>,
}

impl Default for PrimitiveType {
    fn default() -> Self {
        Self::Triangles
    }
}

impl Model {
    #[must_use]
    pub fn is_skeletal(&self) -> bool {
        self.bone_count > 0
    }

    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Primitive count of one instance, by primitive type.
    #[must_use]
    pub fn primitives_count(&self) -> u32 {
        let indices = self.index_count();
        match self.primitive {
            PrimitiveType::Triangles => indices / 3,
            PrimitiveType::Lines => indices / 2,
            PrimitiveType::Points => indices,
        }
    }
}

// ─── Render object (LOD set) ──────────────────────────────────────────────────

/// One level of detail: the models drawn when this level is selected.
#[derive(Debug, Clone)]
pub struct LodLevel {
    /// Lower bound of the screen-size coverage for this level; levels are
    /// ordered from most to least detailed.
    pub threshold: f32,
    pub models: Vec<AssetId>,
}

/// A set of models with level-of-detail selection and default material
/// overrides applied to members that leave them unset.
#[derive(Debug, Clone)]
pub struct RenderObject {
    pub lods: Vec<LodLevel>,
    /// World-space diameter used for LOD projection.
    pub world_size: f32,
    /// Screen-space size (pixels) at which the object was authored.
    pub pixels_size: f32,
    pub color: Option<Vec3>,
    pub intensity: Option<f32>,
    pub opacity: Option<f32>,
    pub skeletal_animation: Option<AssetId>,
    pub skeletal_animation_speed: Option<f32>,
    pub skeletal_animation_offset: Option<f32>,
}

impl RenderObject {
    /// Picks the LOD index for a projected screen coverage `f`.
    #[must_use]
    pub fn lod_select(&self, coverage: f32) -> usize {
        for (index, lod) in self.lods.iter().enumerate() {
            if coverage >= lod.threshold {
                return index;
            }
        }
        self.lods.len().saturating_sub(1)
    }

    #[must_use]
    pub fn models(&self, lod: usize) -> &[AssetId] {
        self.lods.get(lod).map_or(&[], |l| &l.models)
    }
}

// ─── Textures ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureTarget {
    D2,
    D2Array { layers: u32 },
    D3 { depth: u32 },
    Cube,
}

/// Frame metadata for texture-sheet animation.
#[derive(Debug, Clone, Copy)]
pub struct TextureAnimationMeta {
    pub frames: u32,
    pub duration_us: u64,
    pub looping: bool,
}

/// A texture asset: dimensions, layout, and the encoded pixel payload that
/// the dispatch thread uploads on first use.
#[derive(Debug, Clone)]
pub struct TextureAsset {
    pub resolution: (u32, u32),
    pub target: TextureTarget,
    /// Backend format token, as listed in the platform contract.
    pub format: crate::platform::gpu::TextureFormat,
    pub mipmaps: bool,
    pub animation: Option<TextureAnimationMeta>,
    pub pixels: Vec<u8>,
}

// ─── Shaders ──────────────────────────────────────────────────────────────────

/// Shader program sources handed to the graphics backend for compilation on
/// the dispatch thread. Variant selection happens at bind time.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    pub label: String,
    pub vertex_source: String,
    pub fragment_source: String,
    /// Number of compile-time variants the program declares.
    pub variants: u32,
}

// ─── Sound ────────────────────────────────────────────────────────────────────

/// Decoded audio: interleaved f32 frames.
#[derive(Debug, Clone)]
pub struct SoundAsset {
    pub sample_rate: u32,
    pub channels: u32,
    pub frames: Vec<f32>,
}

impl SoundAsset {
    /// Length in sample frames (not samples).
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        if self.channels == 0 {
            return 0;
        }
        (self.frames.len() / self.channels as usize) as u64
    }

    /// Duration in microseconds.
    #[must_use]
    pub fn duration_us(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frame_count() * 1_000_000 / u64::from(self.sample_rate)
    }
}

// ─── Fonts ────────────────────────────────────────────────────────────────────

/// Metrics and atlas placement of one glyph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    /// Atlas rectangle as (u0, v0, u1, v1).
    pub uv: [f32; 4],
    pub size: Vec2,
    pub bearing: Vec2,
    pub advance: f32,
}

/// A font atlas with glyph metrics, an optional dense kerning table, and the
/// character-to-glyph mapping.
#[derive(Debug, Clone)]
pub struct FontFace {
    pub line_height: f32,
    pub max_glyph_size: Vec2,
    pub atlas_size: (u32, u32),
    /// Atlas texture asset holding the rasterized glyphs.
    pub atlas_texture: AssetId,
    pub glyphs: Vec<Glyph>,
    /// Dense `glyph_count × glyph_count` kerning matrix, row = left glyph.
    pub kerning: Option<Vec<f32>>,
    /// Sorted `(char, glyph index)` pairs.
    pub charmap: Vec<(u32, u32)>,
}

impl FontFace {
    /// Glyph index for a character; glyph 0 is the replacement glyph.
    #[must_use]
    pub fn glyph_index(&self, ch: char) -> u32 {
        let code = ch as u32;
        match self.charmap.binary_search_by_key(&code, |&(c, _)| c) {
            Ok(i) => self.charmap[i].1,
            Err(_) => 0,
        }
    }

    /// Transcribes a string into glyph indices.
    #[must_use]
    pub fn transcript(&self, text: &str) -> Vec<u32> {
        text.chars().map(|c| self.glyph_index(c)).collect()
    }

    /// Kerning adjustment between two glyphs, zero without a kerning table.
    #[must_use]
    pub fn kerning(&self, left: u32, right: u32) -> f32 {
        let Some(table) = &self.kerning else {
            return 0.0;
        };
        let n = self.glyphs.len() as u32;
        if left >= n || right >= n {
            return 0.0;
        }
        table[(left * n + right) as usize]
    }
}

// ─── Text packs & misc schemes ────────────────────────────────────────────────

/// Localized strings keyed by name hash, with positional `{n}` parameters.
#[derive(Debug, Clone, Default)]
pub struct TextPack {
    pub entries: FxHashMap<u32, String>,
}

impl TextPack {
    /// Formats an entry, substituting `{0}`, `{1}`, … with `parameters`.
    #[must_use]
    pub fn format(&self, name: u32, parameters: &[String]) -> Option<String> {
        let template = self.entries.get(&name)?;
        let mut out = template.clone();
        for (i, param) in parameters.iter().enumerate() {
            out = out.replace(&format!("{{{i}}}"), param);
        }
        Some(out)
    }
}

/// Collision shape blob consumed by external collaborators; the engine only
/// stores and refcounts it.
#[derive(Debug, Clone)]
pub struct Collider {
    pub aabb: Aabb,
    pub data: Vec<u8>,
}

/// Grouping asset: loading a pack requests its children.
#[derive(Debug, Clone, Default)]
pub struct AssetPack {
    pub children: Vec<AssetId>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}
