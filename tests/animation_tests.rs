//! Skeletal Animation Tests
//!
//! Tests for:
//! - Coefficient evaluation against dispatch time, speed, offset, and loop
//! - Armature sampling equivalence between cached and direct evaluation
//! - Armature length always matching the rig bone count
//! - Per-frame memoization across multiple passes

use glam::{Mat4, Quat, Vec3};

use ember::animation::sampling::{BoneTrack, Channel, SkeletalAnimation};
use ember::animation::preparator::AnimationPreparator;
use ember::animation::SkeletonRig;
use ember::assets::AssetServer;
use ember::scene::EntityStore;

const BONES: usize = 10;

fn chain_rig(bones: usize) -> SkeletonRig {
    SkeletonRig {
        global_inverse: Mat4::IDENTITY,
        parents: (0..bones).map(|i| i as i32 - 1).collect(),
        bases: vec![Mat4::IDENTITY; bones],
        inverse_rests: vec![Mat4::IDENTITY; bones],
    }
}

/// One-second clip translating every bone from the origin to `+X`.
fn sliding_animation(looping: bool) -> SkeletalAnimation {
    SkeletalAnimation {
        duration_us: 1_000_000,
        looping,
        tracks: (0..BONES)
            .map(|bone| BoneTrack {
                bone: bone as u16,
                position: Channel {
                    times: vec![0.0, 1.0],
                    values: vec![Vec3::ZERO, Vec3::X],
                },
                rotation: Channel {
                    times: vec![0.0, 1.0],
                    values: vec![Quat::IDENTITY, Quat::from_rotation_y(1.0)],
                },
                scale: Channel::default(),
            })
            .collect(),
    }
}

// ============================================================================
// Coefficient evaluation
// ============================================================================

#[test]
fn dispatch_times_map_to_expected_coefficients() {
    let _ = env_logger::builder().is_test(true).try_init();
    let looping = sliding_animation(true);
    let one_shot = sliding_animation(false);

    for (time_us, expected) in [
        (0u64, 0.0f32),
        (250_000, 0.25),
        (500_000, 0.5),
        (750_000, 0.75),
    ] {
        let c = looping.coefficient(time_us, 0, 1.0, 0.0);
        assert!((c - expected).abs() < 1e-6, "loop at {time_us}: {c}");
        let c = one_shot.coefficient(time_us, 0, 1.0, 0.0);
        assert!((c - expected).abs() < 1e-6, "one-shot at {time_us}: {c}");
    }

    // At exactly one duration the loop wraps to 0, the one-shot clamps to 1.
    assert!(looping.coefficient(1_000_000, 0, 1.0, 0.0).abs() < 1e-6);
    assert!((one_shot.coefficient(1_000_000, 0, 1.0, 0.0) - 1.0).abs() < 1e-6);
}

#[test]
fn start_time_and_offset_shift_the_coefficient() {
    let _ = env_logger::builder().is_test(true).try_init();
    let anim = sliding_animation(true);
    // Started half a second ago.
    let c = anim.coefficient(1_500_000, 1_000_000, 1.0, 0.0);
    assert!((c - 0.5).abs() < 1e-6);
    // Offset shifts in coefficient units.
    let c = anim.coefficient(0, 0, 1.0, 0.25);
    assert!((c - 0.25).abs() < 1e-6);
}

// ============================================================================
// Armature sampling
// ============================================================================

#[test]
fn cached_armature_equals_direct_sampling() {
    let _ = env_logger::builder().is_test(true).try_init();
    let assets = AssetServer::new();
    let rig = chain_rig(BONES);
    let anim_id = assets.insert_named("anim/slide", sliding_animation(true));
    let handle = assets.get::<SkeletalAnimation>(anim_id).unwrap();
    let mut store = EntityStore::new();
    let entity = store.spawn();

    let preparator = AnimationPreparator::new();
    for coefficient in [0.0f32, 0.25, 0.5, 0.75] {
        let cached = preparator.instance(entity, &handle, &rig, coefficient);
        let direct = rig.evaluate(&handle.sample_pose(&rig, coefficient));
        assert_eq!(cached.len(), BONES);
        for (a, b) in cached.iter().zip(&direct) {
            assert!(
                a.abs_diff_eq(*b, 1e-6),
                "cached and direct armatures diverge at {coefficient}"
            );
        }
    }
}

#[test]
fn repeated_pass_requests_reuse_the_instance() {
    let _ = env_logger::builder().is_test(true).try_init();
    let assets = AssetServer::new();
    let rig = chain_rig(BONES);
    let anim_id = assets.insert_named("anim/reuse", sliding_animation(true));
    let handle = assets.get::<SkeletalAnimation>(anim_id).unwrap();
    let mut store = EntityStore::new();
    let entity = store.spawn();

    let preparator = AnimationPreparator::new();
    // Color pass + depth prepass + three shadow sub-passes: one sample.
    for _ in 0..5 {
        let _ = preparator.instance(entity, &handle, &rig, 0.5);
    }
    assert_eq!(preparator.cached_count(), 1);

    // The next frame resets the cache.
    preparator.reset();
    assert_eq!(preparator.cached_count(), 0);
}

#[test]
fn unkeyed_bones_keep_their_rest_pose() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut rig = chain_rig(2);
    rig.bases[1] = Mat4::from_translation(Vec3::Y);
    let anim = SkeletalAnimation {
        duration_us: 1_000_000,
        looping: false,
        tracks: vec![BoneTrack {
            bone: 0,
            position: Channel {
                times: vec![0.0, 1.0],
                values: vec![Vec3::ZERO, Vec3::X],
            },
            ..BoneTrack::default()
        }],
    };
    let pose = anim.sample_pose(&rig, 1.0);
    assert_eq!(pose.len(), 2);
    // Bone 1 has no track: its local matrix is the rig base.
    assert!(pose[1].abs_diff_eq(Mat4::from_translation(Vec3::Y), 1e-6));
    // Bone 0 followed the track.
    assert!(pose[0].abs_diff_eq(Mat4::from_translation(Vec3::X), 1e-6));
}

#[test]
fn single_key_animation_is_a_constant_pose() {
    let _ = env_logger::builder().is_test(true).try_init();
    let rig = chain_rig(1);
    let anim = SkeletalAnimation {
        duration_us: 1_000_000,
        looping: true,
        tracks: vec![BoneTrack {
            bone: 0,
            position: Channel {
                times: vec![0.5],
                values: vec![Vec3::splat(3.0)],
            },
            ..BoneTrack::default()
        }],
    };
    for coefficient in [0.0, 0.3, 0.9] {
        let pose = anim.sample_pose(&rig, coefficient);
        assert!(pose[0].abs_diff_eq(Mat4::from_translation(Vec3::splat(3.0)), 1e-6));
    }
}
