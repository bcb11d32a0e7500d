//! Keyframe channel sampling.
//!
//! Animations store sparse per-bone key arrays with times normalized to
//! `[0, 1]` over the animation's duration. Sampling binary-searches the key
//! times and blends the two adjacent keys: linearly for position and scale,
//! spherically for rotation.

use glam::{Mat4, Quat, Vec3};

use crate::animation::skeleton::SkeletonRig;

/// One sparse key channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Channel<T> {
    /// Normalized key times in `[0, 1]`, sorted ascending.
    pub times: Vec<f32>,
    pub values: Vec<T>,
}

impl<T: Copy> Channel<T> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Samples the channel, blending adjacent keys with `blend`.
    ///
    /// Returns `None` for an empty channel. A single key yields a constant
    /// value; times outside the key range clamp to the boundary keys.
    pub fn sample_with(&self, time: f32, blend: impl FnOnce(T, T, f32) -> T) -> Option<T> {
        let len = self.times.len();
        match len {
            0 => return None,
            1 => return Some(self.values[0]),
            _ => {}
        }

        // First key with time > `time`.
        let next = self.times.partition_point(|&t| t <= time);
        if next == 0 {
            return Some(self.values[0]);
        }
        if next >= len {
            return Some(self.values[len - 1]);
        }

        let (t0, t1) = (self.times[next - 1], self.times[next]);
        let dt = t1 - t0;
        let f = if dt > 1e-6 { (time - t0) / dt } else { 0.0 };
        Some(blend(self.values[next - 1], self.values[next], f.clamp(0.0, 1.0)))
    }
}

impl Channel<Vec3> {
    #[must_use]
    pub fn sample(&self, time: f32) -> Option<Vec3> {
        self.sample_with(time, |a, b, t| a.lerp(b, t))
    }
}

impl Channel<Quat> {
    #[must_use]
    pub fn sample(&self, time: f32) -> Option<Quat> {
        self.sample_with(time, |a, b, t| a.slerp(b, t))
    }
}

/// Key channels of one bone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneTrack {
    pub bone: u16,
    pub position: Channel<Vec3>,
    pub rotation: Channel<Quat>,
    pub scale: Channel<Vec3>,
}

impl BoneTrack {
    /// Local bone matrix at a normalized coefficient; channels without keys
    /// fall back to the identity components.
    #[must_use]
    pub fn sample_local(&self, coefficient: f32) -> Mat4 {
        let position = self.position.sample(coefficient).unwrap_or(Vec3::ZERO);
        let rotation = self.rotation.sample(coefficient).unwrap_or(Quat::IDENTITY);
        let scale = self.scale.sample(coefficient).unwrap_or(Vec3::ONE);
        Mat4::from_scale_rotation_translation(scale, rotation, position)
    }
}

/// A skeletal animation clip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletalAnimation {
    pub duration_us: u64,
    pub looping: bool,
    pub tracks: Vec<BoneTrack>,
}

impl SkeletalAnimation {
    /// Evaluation coefficient for a dispatch time.
    ///
    /// Progress advances from `start_time` at `speed`, shifted by `offset`
    /// (in coefficient units). Looping animations wrap; one-shot animations
    /// clamp to the final pose.
    #[must_use]
    pub fn coefficient(&self, current_time: u64, start_time: u64, speed: f32, offset: f32) -> f32 {
        if self.duration_us == 0 {
            return 0.0;
        }
        let elapsed = current_time.saturating_sub(start_time) as f32;
        let progress = elapsed * speed / self.duration_us as f32 + offset;
        if self.looping {
            progress.rem_euclid(1.0)
        } else {
            progress.clamp(0.0, 1.0)
        }
    }

    /// Local pose for every bone of `rig`; bones without a track keep their
    /// rig base matrix.
    #[must_use]
    pub fn sample_pose(&self, rig: &SkeletonRig, coefficient: f32) -> Vec<Mat4> {
        let mut pose = rig.bases.clone();
        for track in &self.tracks {
            if let Some(local) = pose.get_mut(track.bone as usize) {
                *local = track.sample_local(coefficient);
            }
        }
        pose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_channel() -> Channel<Vec3> {
        Channel {
            times: vec![0.0, 0.5, 1.0],
            values: vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0)],
        }
    }

    #[test]
    fn samples_blend_adjacent_keys() {
        let channel = linear_channel();
        let v = channel.sample(0.25).unwrap();
        assert!((v.x - 0.5).abs() < 1e-6);
        let v = channel.sample(0.75).unwrap();
        assert!((v.x - 1.0).abs() < 1e-6);
        assert!((v.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn single_key_is_constant() {
        let channel = Channel {
            times: vec![0.4],
            values: vec![Vec3::splat(7.0)],
        };
        assert_eq!(channel.sample(0.0).unwrap(), Vec3::splat(7.0));
        assert_eq!(channel.sample(1.0).unwrap(), Vec3::splat(7.0));
    }

    #[test]
    fn out_of_range_clamps() {
        let channel = linear_channel();
        assert_eq!(channel.sample(-1.0).unwrap(), Vec3::ZERO);
        assert_eq!(channel.sample(2.0).unwrap(), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn coefficient_loop_modes() {
        let mut anim = SkeletalAnimation {
            duration_us: 1_000_000,
            looping: false,
            ..SkeletalAnimation::default()
        };
        assert_eq!(anim.coefficient(0, 0, 1.0, 0.0), 0.0);
        assert_eq!(anim.coefficient(500_000, 0, 1.0, 0.0), 0.5);
        assert_eq!(anim.coefficient(1_500_000, 0, 1.0, 0.0), 1.0);

        anim.looping = true;
        let c = anim.coefficient(1_000_000, 0, 1.0, 0.0);
        assert!(c.abs() < 1e-6, "looping animation wraps to 0, got {c}");
        let c = anim.coefficient(1_250_000, 0, 1.0, 0.0);
        assert!((c - 0.25).abs() < 1e-6);
    }

    #[test]
    fn speed_scales_progress() {
        let anim = SkeletalAnimation {
            duration_us: 1_000_000,
            looping: false,
            ..SkeletalAnimation::default()
        };
        assert_eq!(anim.coefficient(250_000, 0, 2.0, 0.0), 0.5);
    }
}
