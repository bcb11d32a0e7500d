//! Asset Pack Format Tests
//!
//! Tests for:
//! - Byte-identical round trips of the model, skeleton, animation, and font
//!   formats (decode → encode reproduces the input exactly)
//! - Header validation: bad magic, truncation, unsorted keys

mod common;

use glam::{Mat4, Quat, Vec2, Vec3};

use ember::animation::sampling::{BoneTrack, Channel, SkeletalAnimation};
use ember::animation::SkeletonRig;
use ember::assets::formats::animation::{decode_animation, encode_animation};
use ember::assets::formats::font::{decode_font, encode_font};
use ember::assets::formats::model::{decode_model, encode_model};
use ember::assets::formats::skeleton::{decode_skeleton, encode_skeleton};
use ember::assets::types::{BoneVertex, FontFace, Glyph, MeshRenderFlags};
use ember::assets::AssetId;

// ============================================================================
// Model
// ============================================================================

fn rigged_model() -> ember::assets::Model {
    let mut model = common::cube_model();
    model.flags = MeshRenderFlags::default() | MeshRenderFlags::TRANSLUCENT;
    model.texture_names[0] = AssetId::from_name("tex/albedo");
    model.texture_names[2] = AssetId::from_name("tex/normal");
    model.material = vec![1, 2, 3, 4, 5, 6, 7, 8];
    model.bone_count = 2;
    model.skeleton = AssetId::from_name("skeleton/biped");
    model.tangents = model.positions.iter().map(|_| (Vec3::X, Vec3::Y)).collect();
    model.bones = model
        .positions
        .iter()
        .enumerate()
        .map(|(i, _)| BoneVertex {
            indices: [i as u16 % 2, 0, 0, 0],
            weights: [1.0, 0.0, 0.0, 0.0],
        })
        .collect();
    model
}

#[test]
fn model_roundtrip_is_byte_identical() {
    common::init_test_logging();
    let encoded = encode_model(&rigged_model());
    let decoded = decode_model(&encoded).unwrap();
    assert_eq!(encode_model(&decoded), encoded);
    assert_eq!(decoded.bone_count, 2);
    assert_eq!(decoded.positions.len(), 8);
    assert_eq!(decoded.bones.len(), 8);
    assert!(decoded.flags.contains(MeshRenderFlags::TRANSLUCENT));
}

#[test]
fn model_rejects_bad_magic_and_truncation() {
    common::init_test_logging();
    let mut encoded = encode_model(&common::quad_model());
    assert!(decode_model(&encoded[..encoded.len() - 1]).is_err());
    encoded[0] = b'X';
    assert!(decode_model(&encoded).is_err());
}

// ============================================================================
// Skeleton
// ============================================================================

fn test_rig() -> SkeletonRig {
    SkeletonRig {
        global_inverse: Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)),
        parents: vec![-1, 0, 1],
        bases: vec![
            Mat4::IDENTITY,
            Mat4::from_translation(Vec3::X),
            Mat4::from_translation(Vec3::Y),
        ],
        inverse_rests: vec![
            Mat4::IDENTITY,
            Mat4::from_translation(-Vec3::X),
            Mat4::from_translation(-Vec3::new(1.0, 1.0, 0.0)),
        ],
    }
}

#[test]
fn skeleton_roundtrip_is_byte_identical() {
    common::init_test_logging();
    let encoded = encode_skeleton(&test_rig());
    let decoded = decode_skeleton(&encoded).unwrap();
    assert_eq!(encode_skeleton(&decoded), encoded);
    assert_eq!(decoded.bone_count(), 3);
}

#[test]
fn skeleton_rejects_forward_parent_references() {
    common::init_test_logging();
    let mut rig = test_rig();
    rig.parents[0] = 2;
    let encoded = encode_skeleton(&rig);
    assert!(decode_skeleton(&encoded).is_err());
}

// ============================================================================
// Animation
// ============================================================================

fn test_animation() -> SkeletalAnimation {
    SkeletalAnimation {
        duration_us: 2_500_000,
        looping: true,
        tracks: vec![
            BoneTrack {
                bone: 0,
                position: Channel {
                    times: vec![0.0, 0.5, 1.0],
                    values: vec![Vec3::ZERO, Vec3::X, Vec3::ONE],
                },
                rotation: Channel {
                    times: vec![0.0, 1.0],
                    values: vec![Quat::IDENTITY, Quat::from_rotation_z(0.5)],
                },
                scale: Channel::default(),
            },
            BoneTrack {
                bone: 2,
                position: Channel::default(),
                rotation: Channel::default(),
                scale: Channel {
                    times: vec![0.25],
                    values: vec![Vec3::splat(2.0)],
                },
            },
        ],
    }
}

#[test]
fn animation_roundtrip_is_byte_identical() {
    common::init_test_logging();
    let encoded = encode_animation(&test_animation());
    let decoded = decode_animation(&encoded).unwrap();
    assert_eq!(encode_animation(&decoded), encoded);
    assert_eq!(decoded, test_animation());
}

#[test]
fn animation_rejects_unsorted_and_out_of_range_keys() {
    common::init_test_logging();
    let mut anim = test_animation();
    anim.tracks[0].position.times = vec![0.5, 0.2, 1.0];
    assert!(decode_animation(&encode_animation(&anim)).is_err());

    let mut anim = test_animation();
    anim.tracks[0].position.times = vec![0.0, 0.5, 1.5];
    assert!(decode_animation(&encode_animation(&anim)).is_err());
}

// ============================================================================
// Font
// ============================================================================

fn test_font(kerning: bool) -> FontFace {
    let glyphs: Vec<Glyph> = (0..3)
        .map(|i| Glyph {
            uv: [0.25 * i as f32, 0.0, 0.25 * (i + 1) as f32, 0.5],
            size: Vec2::new(8.0, 12.0),
            bearing: Vec2::new(0.5, 10.0),
            advance: 9.0 + i as f32,
        })
        .collect();
    FontFace {
        line_height: 14.0,
        max_glyph_size: Vec2::new(10.0, 13.0),
        atlas_size: (256, 128),
        atlas_texture: AssetId::from_name("font/mono/atlas"),
        kerning: kerning.then(|| (0..9).map(|i| i as f32 * 0.1).collect()),
        charmap: vec![(b'a'.into(), 1), (b'b'.into(), 2)],
        glyphs,
    }
}

#[test]
fn font_roundtrip_is_byte_identical() {
    common::init_test_logging();
    for kerning in [false, true] {
        let encoded = encode_font(&test_font(kerning));
        let decoded = decode_font(&encoded).unwrap();
        assert_eq!(encode_font(&decoded), encoded);
        assert_eq!(decoded.kerning.is_some(), kerning);
    }
}

#[test]
fn font_charmap_must_be_sorted_and_in_range() {
    common::init_test_logging();
    let mut font = test_font(false);
    font.charmap = vec![(98, 1), (97, 2)];
    assert!(decode_font(&encode_font(&font)).is_err());

    let mut font = test_font(false);
    font.charmap = vec![(97, 7)];
    assert!(decode_font(&encode_font(&font)).is_err());
}

#[test]
fn font_transcript_and_kerning_lookup() {
    common::init_test_logging();
    let font = test_font(true);
    assert_eq!(font.transcript("ab?"), vec![1, 2, 0]);
    // Row-major dense table: kerning(1, 2) = table[1 * 3 + 2].
    assert!((font.kerning(1, 2) - 0.5).abs() < 1e-6);
    assert_eq!(font.kerning(5, 0), 0.0);
}
