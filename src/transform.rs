use lyon::geom::euclid::{Angle, Transform3D, UnknownUnit};

type Matrix = Transform3D<f32, UnknownUnit, UnknownUnit>;

/// Affine transform baked into tessellated vertices.
///
/// Wraps a euclid matrix using its row-vector convention: `a.then(&b)` applies `a` first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    matrix: Matrix,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix::identity(),
        }
    }

    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        Self {
            matrix: Matrix::translation(x, y, z),
        }
    }

    pub fn scale(x: f32, y: f32, z: f32) -> Self {
        Self {
            matrix: Matrix::scale(x, y, z),
        }
    }

    /// Rotation around the z axis, the only rotation a 2D shape needs.
    pub fn rotation_z(radians: f32) -> Self {
        Self::rotation([0.0, 0.0, 1.0], radians)
    }

    pub fn rotation(axis: [f32; 3], radians: f32) -> Self {
        Self {
            matrix: Matrix::rotation(axis[0], axis[1], axis[2], Angle::radians(radians)),
        }
    }

    pub fn from_matrix(matrix: Transform3D<f32, UnknownUnit, UnknownUnit>) -> Self {
        Self { matrix }
    }

    #[inline]
    pub fn matrix(&self) -> &Transform3D<f32, UnknownUnit, UnknownUnit> {
        &self.matrix
    }

    /// Returns the transform that applies `self` and then `other`.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix.then(&other.matrix),
        }
    }

    pub fn inverse(&self) -> Option<Self> {
        self.matrix.inverse().map(|matrix| Self { matrix })
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        self.matrix == Matrix::identity()
    }

    /// Applies the affine part of the matrix to a point. The projective row is ignored.
    #[inline]
    pub fn apply_point(&self, p: [f32; 3]) -> [f32; 3] {
        let m = &self.matrix;
        [
            p[0] * m.m11 + p[1] * m.m21 + p[2] * m.m31 + m.m41,
            p[0] * m.m12 + p[1] * m.m22 + p[2] * m.m32 + m.m42,
            p[0] * m.m13 + p[1] * m.m23 + p[2] * m.m33 + m.m43,
        ]
    }

    /// Applies the linear part only, for offsets and directions.
    #[inline]
    pub fn apply_vector(&self, v: [f32; 3]) -> [f32; 3] {
        let m = &self.matrix;
        [
            v[0] * m.m11 + v[1] * m.m21 + v[2] * m.m31,
            v[0] * m.m12 + v[1] * m.m22 + v[2] * m.m32,
            v[0] * m.m13 + v[1] * m.m23 + v[2] * m.m33,
        ]
    }

    /// Transforms a normal by the inverse transpose of the linear part and renormalizes it.
    pub fn apply_normal(&self, n: [f32; 3]) -> [f32; 3] {
        let m = &self.matrix;
        // Linear part acting on column vectors.
        let (a, b, c) = (m.m11, m.m21, m.m31);
        let (d, e, f) = (m.m12, m.m22, m.m32);
        let (g, h, i) = (m.m13, m.m23, m.m33);
        let det = a * (e * i - f * h) - b * (d * i - f * g) + c * (d * h - e * g);

        let out = if det.abs() <= f32::EPSILON {
            self.apply_vector(n)
        } else {
            let cof = [
                [e * i - f * h, -(d * i - f * g), d * h - e * g],
                [-(b * i - c * h), a * i - c * g, -(a * h - b * g)],
                [b * f - c * e, -(a * f - c * d), a * e - b * d],
            ];
            let s = det.signum();
            [
                s * (cof[0][0] * n[0] + cof[0][1] * n[1] + cof[0][2] * n[2]),
                s * (cof[1][0] * n[0] + cof[1][1] * n[1] + cof[1][2] * n[2]),
                s * (cof[2][0] * n[0] + cof[2][1] * n[1] + cof[2][2] * n[2]),
            ]
        };

        let len = (out[0] * out[0] + out[1] * out[1] + out[2] * out[2]).sqrt();
        if len > f32::EPSILON {
            [out[0] / len, out[1] / len, out[2] / len]
        } else {
            n
        }
    }

    /// Uniform scale factor implied by the linear part, used to rescale stroke widths.
    pub fn approximate_scale(&self) -> f32 {
        let x = self.apply_vector([1.0, 0.0, 0.0]);
        let y = self.apply_vector([0.0, 1.0, 0.0]);
        let lx = (x[0] * x[0] + x[1] * x[1] + x[2] * x[2]).sqrt();
        let ly = (y[0] * y[0] + y[1] * y[1] + y[2] * y[2]).sqrt();
        (lx * ly).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-4)
    }

    #[test]
    fn translation_then_scale_applies_in_order() {
        let t = Transform::translation(1.0, 2.0, 0.0).then(&Transform::scale(2.0, 2.0, 1.0));
        assert!(approx(t.apply_point([0.0, 0.0, 0.0]), [2.0, 4.0, 0.0]));
    }

    #[test]
    fn rotation_keeps_normals_unit_length() {
        let t = Transform::rotation_z(std::f32::consts::FRAC_PI_2);
        let p = t.apply_point([1.0, 0.0, 0.0]);
        assert!(p[0].abs() < 1e-4);
        assert!((p[1].abs() - 1.0).abs() < 1e-4);
        assert!(approx(t.apply_normal([1.0, 0.0, 0.0]), p));
    }

    #[test]
    fn non_uniform_scale_uses_inverse_transpose_for_normals() {
        let t = Transform::scale(2.0, 1.0, 1.0);
        let n = t.apply_normal([1.0, 1.0, 0.0]);
        // Inverse transpose of diag(2,1,1) is diag(0.5,1,1).
        let expected_len = (0.25f32 + 1.0).sqrt();
        assert!(approx(n, [0.5 / expected_len, 1.0 / expected_len, 0.0]));
    }

    #[test]
    fn inverse_undoes_transform() {
        let t = Transform::translation(3.0, -1.0, 0.0).then(&Transform::rotation_z(0.3));
        let inv = t.inverse().unwrap();
        let p = [5.0, 7.0, 0.0];
        assert!(approx(inv.apply_point(t.apply_point(p)), p));
    }
}
