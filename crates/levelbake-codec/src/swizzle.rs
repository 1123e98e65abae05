//! Conversion between engine and editor axis conventions.
//!
//! The engine is Z-up, the editor Y-up. Crossing the boundary swaps the Y and
//! Z components; applying the conversion twice is the identity.

use glam::{DMat4, DVec3, Mat4, Vec3, Vec3Swizzles, Vec4Swizzles};

/// Types that can cross the engine/editor coordinate boundary.
pub trait Swizzle: Sized {
    /// Swap the Y and Z components. Self-inverse.
    #[must_use]
    fn swizzled(self) -> Self;
}

impl Swizzle for Vec3 {
    fn swizzled(self) -> Self {
        self.xzy()
    }
}

impl Swizzle for DVec3 {
    fn swizzled(self) -> Self {
        self.xzy()
    }
}

/// Swaps elements 1 and 2 of every column; elements 0 and 3 stay put.
impl Swizzle for Mat4 {
    fn swizzled(self) -> Self {
        Self::from_cols(
            self.x_axis.xzyw(),
            self.y_axis.xzyw(),
            self.z_axis.xzyw(),
            self.w_axis.xzyw(),
        )
    }
}

impl Swizzle for DMat4 {
    fn swizzled(self) -> Self {
        Self::from_cols(
            self.x_axis.xzyw(),
            self.y_axis.xzyw(),
            self.z_axis.xzyw(),
            self.w_axis.xzyw(),
        )
    }
}

/// `(x, y, z) -> (x, z, y)`.
#[must_use]
pub fn swizzle_vec3(v: Vec3) -> Vec3 {
    v.swizzled()
}

/// Swap the Y and Z rows of `m`, keeping column-major storage.
#[must_use]
pub fn swizzle_mat4(m: Mat4) -> Mat4 {
    m.swizzled()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use proptest::prelude::*;

    #[test]
    fn test_vec3_swaps_y_and_z() {
        assert_eq!(swizzle_vec3(Vec3::new(1.0, 2.0, 3.0)), Vec3::new(1.0, 3.0, 2.0));
    }

    #[test]
    fn test_mat4_translation_is_swizzled() {
        let m = Mat4::from_translation(Vec3::new(10.0, 0.0, -5.0));
        let s = swizzle_mat4(m);
        assert_eq!(s.w_axis.truncate(), Vec3::new(10.0, -5.0, 0.0));
        assert_eq!(s.w_axis.w, 1.0);
        // Rows swap, so the unit Y column now points along Z.
        assert_eq!(s.y_axis.truncate(), Vec3::Z);
    }

    proptest! {
        #[test]
        fn prop_vec3_involution(x in -1e6f32..1e6, y in -1e6f32..1e6, z in -1e6f32..1e6) {
            let v = Vec3::new(x, y, z);
            prop_assert_eq!(swizzle_vec3(swizzle_vec3(v)), v);
        }

        #[test]
        fn prop_mat4_involution(
            angle in -3.2f32..3.2,
            sx in 0.1f32..10.0,
            sy in -10.0f32..-0.1,
            tx in -500.0f32..500.0,
            tz in -500.0f32..500.0,
        ) {
            let m = Mat4::from_scale_rotation_translation(
                Vec3::new(sx, sy, 1.0),
                Quat::from_rotation_y(angle),
                Vec3::new(tx, 0.0, tz),
            );
            prop_assert_eq!(swizzle_mat4(swizzle_mat4(m)), m);
            prop_assert_eq!(m.as_dmat4().swizzled().swizzled(), m.as_dmat4());
        }
    }
}
