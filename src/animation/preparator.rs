//! Per-frame armature cache.
//!
//! The same rigged model commonly appears in several passes of one frame:
//! the depth prepass, the color pass, and every shadow sub-pass that sees
//! it. Sampling the animation once per pass would multiply the cost, so the
//! prepare stage requests armatures through this cache: the first request
//! for an `(entity, animation, coefficient)` triple computes the armature,
//! later requests reuse it. The cache is cleared at the start of every
//! prepare tick.

use std::sync::Arc;

use glam::Mat4;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::assets::{AssetHandle, AssetId};
use crate::scene::EntityId;

use super::sampling::SkeletalAnimation;
use super::skeleton::SkeletonRig;

/// One skinning matrix per bone.
pub type Armature = Arc<Vec<Mat4>>;

#[derive(PartialEq, Eq, Hash, Clone, Copy)]
struct InstanceKey {
    entity: EntityId,
    animation: AssetId,
    /// Bit pattern of the evaluation coefficient; identical dispatch times
    /// produce identical bits, so repeated requests hit.
    coefficient_bits: u32,
}

/// Memoizing armature provider, one per prepare thread.
#[derive(Default)]
pub struct AnimationPreparator {
    instances: Mutex<FxHashMap<InstanceKey, Armature>>,
}

impl AnimationPreparator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Armature for an entity's animation at a coefficient.
    ///
    /// The returned vector always has exactly `rig.bone_count()` entries.
    pub fn instance(
        &self,
        entity: EntityId,
        animation: &AssetHandle<SkeletalAnimation>,
        rig: &SkeletonRig,
        coefficient: f32,
    ) -> Armature {
        let key = InstanceKey {
            entity,
            animation: animation.id(),
            coefficient_bits: coefficient.to_bits(),
        };
        let mut instances = self.instances.lock();
        if let Some(cached) = instances.get(&key) {
            return Arc::clone(cached);
        }
        let pose = animation.sample_pose(rig, coefficient);
        let armature = Arc::new(rig.evaluate(&pose));
        instances.insert(key, Arc::clone(&armature));
        armature
    }

    /// Drops all cached instances; called at the start of each frame.
    pub fn reset(&self) {
        self.instances.lock().clear();
    }

    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.instances.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::sampling::{BoneTrack, Channel};
    use crate::assets::AssetServer;
    use crate::scene::EntityStore;
    use glam::Vec3;

    fn test_rig() -> SkeletonRig {
        SkeletonRig {
            global_inverse: Mat4::IDENTITY,
            parents: vec![-1],
            bases: vec![Mat4::IDENTITY],
            inverse_rests: vec![Mat4::IDENTITY],
        }
    }

    fn test_animation() -> SkeletalAnimation {
        SkeletalAnimation {
            duration_us: 1_000_000,
            looping: true,
            tracks: vec![BoneTrack {
                bone: 0,
                position: Channel {
                    times: vec![0.0, 1.0],
                    values: vec![Vec3::ZERO, Vec3::X],
                },
                ..BoneTrack::default()
            }],
        }
    }

    #[test]
    fn identical_requests_share_one_instance() {
        let server = AssetServer::new();
        let id = server.insert_named("anim/walk", test_animation());
        let handle = server.get::<SkeletalAnimation>(id).unwrap();
        let rig = test_rig();
        let mut store = EntityStore::new();
        let entity = store.spawn();

        let preparator = AnimationPreparator::new();
        let a = preparator.instance(entity, &handle, &rig, 0.5);
        let b = preparator.instance(entity, &handle, &rig, 0.5);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(preparator.cached_count(), 1);

        // A different coefficient is a different instance.
        let c = preparator.instance(entity, &handle, &rig, 0.25);
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(preparator.cached_count(), 2);
    }

    #[test]
    fn reset_clears_the_frame_cache() {
        let server = AssetServer::new();
        let id = server.insert_named("anim/run", test_animation());
        let handle = server.get::<SkeletalAnimation>(id).unwrap();
        let rig = test_rig();
        let mut store = EntityStore::new();
        let entity = store.spawn();

        let preparator = AnimationPreparator::new();
        let _ = preparator.instance(entity, &handle, &rig, 0.0);
        preparator.reset();
        assert_eq!(preparator.cached_count(), 0);
    }

    #[test]
    fn armature_length_matches_bone_count() {
        let server = AssetServer::new();
        let id = server.insert_named("anim/idle", test_animation());
        let handle = server.get::<SkeletalAnimation>(id).unwrap();
        let rig = test_rig();
        let mut store = EntityStore::new();
        let entity = store.spawn();

        let preparator = AnimationPreparator::new();
        let armature = preparator.instance(entity, &handle, &rig, 0.5);
        assert_eq!(armature.len() as u32, rig.bone_count());
        // Track moved the bone halfway along X.
        let p = armature[0].transform_point3(Vec3::ZERO);
        assert!((p.x - 0.5).abs() < 1e-6);
    }
}
