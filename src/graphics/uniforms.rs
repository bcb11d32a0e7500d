//! GPU-visible uniform structures.
//!
//! Everything here is `#[repr(C)]` + `Pod` and uploaded verbatim into
//! uniform blocks; layouts follow std140 (vec4-aligned members only).

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec4};

/// Row-major 3×4 matrix packed as three vec4 rows, the std140-friendly
/// encoding of an affine transform.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Default)]
pub struct Mat34 {
    pub rows: [Vec4; 3],
}

impl Mat34 {
    #[must_use]
    pub fn from_mat4(m: &Mat4) -> Self {
        let t = m.transpose();
        Self {
            rows: [t.x_axis, t.y_axis, t.z_axis],
        }
    }

    #[must_use]
    pub fn from_mat3(m: &Mat3) -> Self {
        let t = m.transpose();
        Self {
            rows: [
                t.x_axis.extend(0.0),
                t.y_axis.extend(0.0),
                t.z_axis.extend(0.0),
            ],
        }
    }
}

/// Per-instance mesh uniforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Default)]
pub struct UniMesh {
    pub mvp: Mat4,
    /// Inverse-transpose model rotation; `rows[2].w` is 1 when lighting is
    /// enabled for the mesh and 0 otherwise.
    pub normal_mat: Mat34,
    pub model: Mat34,
    /// Linear rgb premultiplied by intensity; `w` is opacity.
    pub color_intensity: Vec4,
    /// Texture-sheet animation frame blend: two frame indices and a blend
    /// factor evaluated at prepare time.
    pub animation_uv_frames: Vec4,
}

/// One light's uniforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Default)]
pub struct UniLight {
    /// Linear rgb premultiplied by intensity.
    pub color: Vec4,
    pub position: Vec4,
    pub direction: Vec4,
    /// Constant, linear, quadratic attenuation.
    pub attenuation: Vec4,
    /// `cos(spot_angle / 2)`, spot exponent, normal offset scale, light
    /// variant selector.
    pub parameters: Vec4,
}

/// Light variant selectors stored in `UniLight::parameters.w`.
pub mod light_variant {
    pub const DIRECTIONAL: f32 = 1.0;
    pub const SPOT: f32 = 2.0;
    pub const POINT: f32 = 3.0;
    pub const DIRECTIONAL_SHADOW: f32 = 4.0;
    pub const SPOT_SHADOW: f32 = 5.0;
    pub const POINT_SHADOW: f32 = 6.0;
}

/// Per-viewport uniforms shared by every draw of a camera pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Default)]
pub struct UniViewport {
    pub view_proj_inverse: Mat4,
    pub eye_position: Vec4,
    pub eye_direction: Vec4,
    /// x, y, width, height in pixels.
    pub viewport: Vec4,
    /// Linear ambient term.
    pub ambient_light: Vec4,
    /// Linear directional-ambient (sky) term.
    pub sky_light: Vec4,
}

/// One glyph instance of a text draw: position/size then atlas rectangle.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Default)]
pub struct UniGlyph {
    /// x, y, width, height in text-local units.
    pub rect: Vec4,
    /// u0, v0, u1, v1 in the font atlas.
    pub uv: Vec4,
}

/// Converts a gamma-space color to linear, the transfer the shaders expect.
#[must_use]
pub fn gamma_to_linear(color: glam::Vec3) -> glam::Vec3 {
    glam::Vec3::new(
        color.x.max(0.0).powf(2.2),
        color.y.max(0.0).powf(2.2),
        color.z.max(0.0).powf(2.2),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn mat34_roundtrips_affine_part() {
        let m = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            glam::Quat::from_rotation_y(0.7),
            Vec3::new(1.0, 2.0, 3.0),
        );
        let packed = Mat34::from_mat4(&m);
        // Row-major rows times column vector reproduce the transform.
        let p = Vec4::new(1.0, 0.0, 0.0, 1.0);
        let expected = m * p;
        let x = packed.rows[0].dot(p);
        let y = packed.rows[1].dot(p);
        let z = packed.rows[2].dot(p);
        assert!((Vec3::new(x, y, z) - expected.truncate()).length() < 1e-5);
    }

    #[test]
    fn uniform_sizes_are_std140_multiples() {
        assert_eq!(std::mem::size_of::<UniMesh>() % 16, 0);
        assert_eq!(std::mem::size_of::<UniLight>() % 16, 0);
        assert_eq!(std::mem::size_of::<UniViewport>() % 16, 0);
        assert_eq!(std::mem::size_of::<UniGlyph>() % 16, 0);
    }
}
