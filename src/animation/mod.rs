//! Skeletal animation: keyframe sampling, rig evaluation, and the per-frame
//! armature cache used by the graphics prepare stage.

pub mod preparator;
pub mod sampling;
pub mod skeleton;

pub use preparator::{AnimationPreparator, Armature};
pub use sampling::{BoneTrack, Channel, SkeletalAnimation};
pub use skeleton::SkeletonRig;
