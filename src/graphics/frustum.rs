//! View frustum extraction and intersection tests.
//!
//! Planes are extracted from a view-projection matrix with the
//! Gribb-Hartmann method. Culling happens in clip space of whatever matrix
//! the caller provides: the camera pass culls with the object-space MVP, so
//! the AABB test runs directly against the mesh bounds.

use glam::{Mat4, Vec3, Vec4};

use crate::assets::Aabb;

/// Six planes: left, right, bottom, top, near, far.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extracts frustum planes from a (view-)projection matrix.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];
        let mut planes = [
            rows[3] + rows[0], // left
            rows[3] - rows[0], // right
            rows[3] + rows[1], // bottom
            rows[3] - rows[1], // top
            rows[3] + rows[2], // near
            rows[3] - rows[2], // far
        ];
        for plane in &mut planes {
            let length = Vec3::new(plane.x, plane.y, plane.z).length();
            if length > 1e-6 {
                *plane /= length;
            } else {
                // Degenerate plane: disable it rather than cull everything.
                *plane = Vec4::ZERO;
            }
        }
        Self { planes }
    }

    fn test_planes(&self, mut inside: impl FnMut(Vec4) -> bool) -> bool {
        for plane in self.planes {
            if plane == Vec4::ZERO {
                continue;
            }
            if !inside(plane) {
                return false;
            }
        }
        true
    }

    /// Sphere-frustum intersection.
    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.test_planes(|plane| {
            plane.x * center.x + plane.y * center.y + plane.z * center.z + plane.w >= -radius
        })
    }

    /// AABB-frustum intersection via the positive-vertex test.
    #[must_use]
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        if aabb.is_empty() {
            return false;
        }
        self.test_planes(|plane| {
            // Corner of the box furthest along the plane normal.
            let p = Vec3::new(
                if plane.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            plane.x * p.x + plane.y * p.y + plane.z * p.z + plane.w >= 0.0
        })
    }
}

/// Corners of the canonical clip volume mapped through an inverse
/// view-projection: the world-space frustum corners of that matrix.
#[must_use]
pub fn frustum_corners_world(view_projection_inverse: &Mat4) -> [Vec3; 8] {
    let mut corners = [Vec3::ZERO; 8];
    let mut i = 0;
    for z in [0.0f32, 1.0] {
        for y in [-1.0f32, 1.0] {
            for x in [-1.0f32, 1.0] {
                let clip = Vec4::new(x, y, z * 2.0 - 1.0, 1.0);
                let world = *view_projection_inverse * clip;
                corners[i] = world.truncate() / world.w;
                i += 1;
            }
        }
    }
    corners
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard_frustum() -> Frustum {
        let proj = Mat4::perspective_rh_gl(60f32.to_radians(), 1.0, 0.1, 100.0);
        Frustum::from_matrix(proj)
    }

    #[test]
    fn sphere_in_front_is_visible() {
        let f = standard_frustum();
        assert!(f.intersects_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0));
    }

    #[test]
    fn sphere_behind_is_culled() {
        let f = standard_frustum();
        assert!(!f.intersects_sphere(Vec3::new(0.0, 0.0, 10.0), 1.0));
    }

    #[test]
    fn aabb_off_to_the_side_is_culled() {
        let f = standard_frustum();
        let aabb = Aabb::new(Vec3::new(-1000.0, -1.0, -6.0), Vec3::new(-999.0, 1.0, -4.0));
        assert!(!f.intersects_aabb(&aabb));
    }

    #[test]
    fn aabb_straddling_plane_is_visible() {
        let f = standard_frustum();
        let aabb = Aabb::new(Vec3::new(-50.0, -1.0, -6.0), Vec3::new(50.0, 1.0, -4.0));
        assert!(f.intersects_aabb(&aabb));
    }
}
