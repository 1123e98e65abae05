//! Affine placement decomposition.
//!
//! Instance records store a full world matrix, while the editor works with
//! position, rotation and per-axis scale. Mirrored placements are expressed
//! with negative scale; whatever a TRS cannot express is kept in a residual
//! `reflection` matrix that the renderer applies per instance.

use glam::{Mat3, Mat4, Quat, Vec3};

use crate::error::{DecodeError, DecodeResult};

/// Per-element tolerance under which a residual is treated as identity.
pub const REFLECTION_TOLERANCE: f32 = 3e-4;

/// An editable placement.
///
/// `to_matrix()` recomposes `compose(position, rotation, scale) * reflection`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    /// Negative components mirror the corresponding local axis.
    pub scale: Vec3,
    /// Residual correction; exactly [`Mat4::IDENTITY`] for a pure TRS.
    pub reflection: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
        reflection: Mat4::IDENTITY,
    };

    /// A transform without residual reflection.
    #[must_use]
    pub fn from_trs(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
            reflection: Mat4::IDENTITY,
        }
    }

    /// Decompose a shear-free affine matrix.
    ///
    /// Sign ambiguities are resolved silently; use [`Transform::decompose_strict`]
    /// to detect them.
    #[must_use]
    pub fn decompose(m: Mat4) -> Self {
        decompose_with_corrections(m).0
    }

    /// Decompose, failing with [`DecodeError::DecompositionAmbiguous`] when the
    /// verification pass had to flip the sign of any axis.
    pub fn decompose_strict(m: Mat4) -> DecodeResult<Self> {
        let (transform, axes) = decompose_with_corrections(m);
        if axes.contains(&true) {
            return Err(DecodeError::DecompositionAmbiguous { axes });
        }
        Ok(transform)
    }

    /// Translation * rotation * scale, without the residual.
    #[must_use]
    pub fn trs_matrix(&self) -> Mat4 {
        compose(self.position, self.rotation, self.scale)
    }

    /// The full world matrix.
    #[must_use]
    pub fn to_matrix(&self) -> Mat4 {
        if self.has_reflection() {
            self.trs_matrix() * self.reflection
        } else {
            self.trs_matrix()
        }
    }

    /// Inverse of [`Transform::to_matrix`], built from the decomposed parts
    /// instead of inverting the full matrix.
    #[must_use]
    pub fn inverse_matrix(&self) -> Mat4 {
        let inverse_trs = Mat4::from_scale(self.scale.recip())
            * Mat4::from_quat(self.rotation.conjugate())
            * Mat4::from_translation(-self.position);
        if self.has_reflection() {
            self.reflection.inverse() * inverse_trs
        } else {
            inverse_trs
        }
    }

    /// Whether the residual differs from identity.
    #[must_use]
    pub fn has_reflection(&self) -> bool {
        self.reflection != Mat4::IDENTITY
    }

    /// Whether the placement flips handedness.
    #[must_use]
    pub fn is_mirrored(&self) -> bool {
        let negative = [self.scale.x, self.scale.y, self.scale.z]
            .iter()
            .filter(|s| s.is_sign_negative())
            .count();
        let mirrored = negative % 2 == 1;
        if self.has_reflection() {
            mirrored != (self.reflection.determinant() < 0.0)
        } else {
            mirrored
        }
    }
}

/// Translation * rotation * scale.
#[must_use]
pub fn compose(position: Vec3, rotation: Quat, scale: Vec3) -> Mat4 {
    Mat4::from_scale_rotation_translation(scale, rotation, position)
}

/// Rotation whose local +Z points along `forward` and whose local +Y is as
/// close to `up` as possible.
///
/// A zero `forward` yields identity; an `up` parallel to `forward` picks an
/// arbitrary perpendicular.
#[must_use]
pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let Some(forward) = forward.try_normalize() else {
        return Quat::IDENTITY;
    };
    let right = up
        .cross(forward)
        .try_normalize()
        .unwrap_or_else(|| forward.any_orthonormal_vector());
    let up = forward.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, up, forward)).normalize()
}

fn decompose_with_corrections(m: Mat4) -> (Transform, [bool; 3]) {
    let position = m.w_axis.truncate();
    let up = m.y_axis.truncate();
    let forward = m.z_axis.truncate();
    let mut scale = Vec3::new(m.x_axis.truncate().length(), up.length(), forward.length());

    // Axes the residual turns around are mirrored; move them into the scale.
    let rotation = look_rotation(forward, up);
    let reflection = residual(m, compose(position, rotation, scale));
    for (axis, unit) in Vec3::AXES.into_iter().enumerate() {
        if unit.dot(reflection.transform_vector3(unit)) < 0.0 {
            scale[axis] = -scale[axis];
        }
    }

    let rotation = look_rotation(forward * scale.z.signum(), up * scale.y.signum());
    let mut trial = compose(position, rotation, scale);
    let mut reflection = residual(m, trial);

    let mut corrected = [false; 3];
    for (axis, unit) in Vec3::AXES.into_iter().enumerate() {
        let kept = reflection.transform_vector3(unit).dot(unit);
        let original = m.transform_vector3(unit).dot(trial.transform_vector3(unit));
        if kept * original < 0.0 {
            scale[axis] = -scale[axis];
            corrected[axis] = true;
        }
    }
    if corrected.contains(&true) {
        trial = compose(position, rotation, scale);
        reflection = residual(m, trial);
        reflection.w_axis.w = 1.0;
    }

    if reflection.abs_diff_eq(Mat4::IDENTITY, REFLECTION_TOLERANCE) {
        reflection = Mat4::IDENTITY;
    }

    let transform = Transform {
        position,
        rotation,
        scale,
        reflection,
    };
    (transform, corrected)
}

/// The correction `r` such that `trial * r == m`.
fn residual(m: Mat4, trial: Mat4) -> Mat4 {
    if trial.determinant() == 0.0 {
        return Mat4::IDENTITY;
    }
    trial.inverse() * m
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_mat_close(a: Mat4, b: Mat4, tolerance: f32) {
        for (i, (x, y)) in a
            .to_cols_array()
            .iter()
            .zip(b.to_cols_array().iter())
            .enumerate()
        {
            assert!(
                (x - y).abs() <= tolerance,
                "element {i}: {x} vs {y}\n{a:?}\n{b:?}"
            );
        }
    }

    #[test]
    fn test_identity() {
        let t = Transform::decompose(Mat4::IDENTITY);
        assert_eq!(t, Transform::IDENTITY);
    }

    #[test]
    fn test_translation_is_exact() {
        let m = Mat4::from_translation(Vec3::new(10.0, 0.0, -5.0));
        let t = Transform::decompose(m);
        assert_eq!(t.position, Vec3::new(10.0, 0.0, -5.0));
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.reflection, Mat4::IDENTITY);
        assert_eq!(t.to_matrix(), m);
    }

    #[test]
    fn test_rotation_scale_has_no_reflection() {
        let rotation = Quat::from_euler(glam::EulerRot::YXZ, 0.7, -0.3, 1.9);
        let m = compose(Vec3::new(1.0, 2.0, 3.0), rotation, Vec3::new(2.0, 0.5, 3.0));
        let t = Transform::decompose(m);
        assert_eq!(t.reflection, Mat4::IDENTITY);
        assert!(t.scale.abs_diff_eq(Vec3::new(2.0, 0.5, 3.0), 1e-5));
        assert_mat_close(t.to_matrix(), m, 1e-5);
    }

    #[test]
    fn test_single_axis_mirror_absorbed_into_scale() {
        let m = Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0));
        let t = Transform::decompose(m);
        assert!(t.scale.x < 0.0);
        assert_eq!(t.reflection, Mat4::IDENTITY);
        assert!(t.is_mirrored());
        assert_mat_close(t.to_matrix(), m, 1e-6);
    }

    #[test]
    fn test_mirror_on_y_is_represented_on_x() {
        let m = Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0));
        let t = Transform::decompose(m);
        assert!(t.scale.x < 0.0);
        assert!(t.scale.y > 0.0);
        assert_eq!(t.reflection, Mat4::IDENTITY);
        assert_mat_close(t.to_matrix(), m, 1e-6);
    }

    #[test]
    fn test_half_turn_is_not_mirrored() {
        let m = Mat4::from_scale(Vec3::new(-1.0, -1.0, 1.0));
        let t = Transform::decompose(m);
        assert!(!t.is_mirrored());
        assert!(t.scale.abs_diff_eq(Vec3::ONE, 1e-6));
        assert_mat_close(t.to_matrix(), m, 1e-6);
    }

    #[test]
    fn test_strict_accepts_clean_mirror() {
        let m = Mat4::from_scale(Vec3::new(1.0, 1.0, -2.0));
        let t = Transform::decompose_strict(m).unwrap();
        assert_mat_close(t.to_matrix(), m, 1e-6);
    }

    #[test]
    fn test_flattened_mirror_is_ambiguous() {
        // With a zero axis the residual is singular, so only the
        // verification pass can find the mirrored x axis.
        let m = Mat4::from_scale(Vec3::new(-1.0, 1.0, 0.0));
        assert_eq!(
            Transform::decompose_strict(m),
            Err(DecodeError::DecompositionAmbiguous {
                axes: [true, false, false]
            })
        );

        let t = Transform::decompose(m);
        assert_eq!(t.scale, Vec3::new(-1.0, 1.0, 0.0));
        assert_eq!(t.reflection, Mat4::IDENTITY);
        assert!(t.is_mirrored());
        assert_eq!(t.to_matrix(), m);
    }

    #[test]
    fn test_degenerate_scale_does_not_produce_nan() {
        let m = Mat4::from_scale(Vec3::new(0.0, 1.0, 1.0));
        let t = Transform::decompose(m);
        assert!(t.rotation.is_finite());
        assert!(t.reflection.is_finite());
    }

    #[test]
    fn test_inverse_matrix_matches_full_inverse() {
        let t = Transform::from_trs(
            Vec3::new(4.0, -2.0, 7.5),
            Quat::from_rotation_z(0.4) * Quat::from_rotation_x(1.1),
            Vec3::new(-1.5, 2.0, 0.75),
        );
        assert_mat_close(t.inverse_matrix() * t.to_matrix(), Mat4::IDENTITY, 1e-5);
    }

    #[test]
    fn test_look_rotation_axes() {
        assert_eq!(look_rotation(Vec3::Z, Vec3::Y), Quat::IDENTITY);
        assert_eq!(look_rotation(Vec3::ZERO, Vec3::Y), Quat::IDENTITY);
        let q = look_rotation(Vec3::X, Vec3::Y);
        assert!((q * Vec3::Z).abs_diff_eq(Vec3::X, 1e-6));
        assert!((q * Vec3::Y).abs_diff_eq(Vec3::Y, 1e-6));
        let parallel = look_rotation(Vec3::Y, Vec3::Y);
        assert!((parallel * Vec3::Z).abs_diff_eq(Vec3::Y, 1e-6));
    }

    fn signed_scale() -> impl Strategy<Value = f32> {
        (0.25f32..4.0, any::<bool>()).prop_map(|(s, negative)| if negative { -s } else { s })
    }

    proptest! {
        #[test]
        fn prop_recompose_matches_original(
            axis in (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0),
            angle in -3.1f32..3.1,
            sx in signed_scale(),
            sy in signed_scale(),
            sz in signed_scale(),
            position in (-50.0f32..50.0, -50.0f32..50.0, -50.0f32..50.0),
        ) {
            let axis = Vec3::new(axis.0, axis.1, axis.2).try_normalize().unwrap_or(Vec3::Y);
            let m = compose(
                Vec3::new(position.0, position.1, position.2),
                Quat::from_axis_angle(axis, angle),
                Vec3::new(sx, sy, sz),
            );
            let t = Transform::decompose(m);
            let back = t.to_matrix();
            for (x, y) in back.to_cols_array().iter().zip(m.to_cols_array().iter()) {
                prop_assert!((x - y).abs() <= 1e-4, "{back:?} vs {m:?}");
            }
        }

        #[test]
        fn prop_pure_trs_has_identity_reflection(
            angle in -3.1f32..3.1,
            sx in signed_scale(),
            sy in signed_scale(),
            sz in signed_scale(),
        ) {
            let m = compose(Vec3::new(3.0, -1.0, 2.0), Quat::from_rotation_y(angle), Vec3::new(sx, sy, sz));
            prop_assert_eq!(Transform::decompose(m).reflection, Mat4::IDENTITY);
        }
    }
}
