//! Skeleton rigs and armature evaluation.

use glam::Mat4;

/// A bone hierarchy with rest-pose matrices.
///
/// Bones are stored parent-before-child: `parents[i] < i` for every
/// non-root bone, which the decoder enforces and the evaluation relies on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletonRig {
    /// Inverse of the model's global rest transform.
    pub global_inverse: Mat4,
    /// Parent bone index per bone, `-1` for roots.
    pub parents: Vec<i32>,
    /// Local rest matrix per bone, used for bones an animation leaves unkeyed.
    pub bases: Vec<Mat4>,
    /// Inverse world-space rest matrix per bone.
    pub inverse_rests: Vec<Mat4>,
}

impl SkeletonRig {
    #[must_use]
    pub fn bone_count(&self) -> u32 {
        self.parents.len() as u32
    }

    /// Evaluates a local pose into skinning matrices.
    ///
    /// `pose` holds one local matrix per bone. The result has exactly one
    /// transform per bone: `global_inverse * world(bone) * inverse_rest(bone)`.
    #[must_use]
    pub fn evaluate(&self, pose: &[Mat4]) -> Vec<Mat4> {
        debug_assert_eq!(pose.len(), self.parents.len());
        let count = self.parents.len();
        let mut world = Vec::with_capacity(count);
        for i in 0..count {
            let local = pose[i];
            let global = match self.parents[i] {
                p if p < 0 => local,
                p => world[p as usize] * local,
            };
            world.push(global);
        }
        for (i, global) in world.iter_mut().enumerate() {
            *global = self.global_inverse * *global * self.inverse_rests[i];
        }
        world
    }
}
