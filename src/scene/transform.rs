use glam::{Mat4, Quat, Vec3};

/// Rigid transform with uniform scale.
///
/// This is the interpolation unit of the engine: the prepare stages blend
/// between the history and current transform of every entity using the
/// interpolation factor of the tick, so a `Transform` must stay cheap to
/// copy and cheap to blend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub orientation: Quat,
    pub scale: f32,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
        scale: 1.0,
    };

    #[must_use]
    pub fn new(position: Vec3, orientation: Quat, scale: f32) -> Self {
        Self {
            position,
            orientation,
            scale,
        }
    }

    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Linear blend of position and scale, spherical blend of orientation.
    #[must_use]
    pub fn interpolate(a: &Self, b: &Self, t: f32) -> Self {
        Self {
            position: a.position.lerp(b.position, t),
            orientation: a.orientation.slerp(b.orientation, t),
            scale: a.scale + (b.scale - a.scale) * t,
        }
    }

    #[must_use]
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.orientation,
            self.position,
        )
    }

    /// Orients the transform to look from its position toward `target`.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let forward = (target - self.position).normalize_or_zero();
        if forward.cross(up).length_squared() < 1e-6 {
            return;
        }
        let right = forward.cross(up).normalize();
        let new_up = right.cross(forward);
        let rot = glam::Mat3::from_cols(right, new_up, -forward);
        self.orientation = Quat::from_mat3(&rot);
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
