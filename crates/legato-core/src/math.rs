// Small fixed-size vector and matrix helpers

pub type Vector3 = [f64; 3];
pub type Matrix3 = [[f64; 3]; 3];
pub type Matrix2 = [[f64; 2]; 2];

/// Determinants below this are treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

pub const IDENTITY3: Matrix3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

pub fn cross(a: Vector3, b: Vector3) -> Vector3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn dot(a: Vector3, b: Vector3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn add(a: Vector3, b: Vector3) -> Vector3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub(a: Vector3, b: Vector3) -> Vector3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(v: Vector3, s: f64) -> Vector3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

pub fn norm(v: Vector3) -> f64 {
    dot(v, v).sqrt()
}

pub fn determinant(m: &Matrix3) -> f64 {
    dot(m[0], cross(m[1], m[2]))
}

/// Inverse through the cross products of the rows; `None` when singular.
pub fn inverse(m: &Matrix3) -> Option<Matrix3> {
    let det = determinant(m);
    if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let c0 = scale(cross(m[1], m[2]), inv_det);
    let c1 = scale(cross(m[2], m[0]), inv_det);
    let c2 = scale(cross(m[0], m[1]), inv_det);
    // the cross products are the columns of the inverse
    Some([
        [c0[0], c1[0], c2[0]],
        [c0[1], c1[1], c2[1]],
        [c0[2], c1[2], c2[2]],
    ])
}

pub fn mul_vec(m: &Matrix3, v: Vector3) -> Vector3 {
    [dot(m[0], v), dot(m[1], v), dot(m[2], v)]
}

pub fn mul(a: &Matrix3, b: &Matrix3) -> Matrix3 {
    std::array::from_fn(|r| std::array::from_fn(|c| (0..3).map(|k| a[r][k] * b[k][c]).sum()))
}

pub fn mul_vec2(m: &Matrix2, v: [f64; 2]) -> [f64; 2] {
    [
        m[0][0] * v[0] + m[0][1] * v[1],
        m[1][0] * v[0] + m[1][1] * v[1],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn assert_matrix_eq(a: &Matrix3, b: &Matrix3) {
        for r in 0..3 {
            for c in 0..3 {
                assert!(
                    (a[r][c] - b[r][c]).abs() < EPSILON,
                    "mismatch at [{r}][{c}]: {a:?} vs {b:?}"
                );
            }
        }
    }

    #[test]
    fn cross_of_unit_axes() {
        assert_eq!(cross([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]), [0.0, 0.0, 1.0]);
        assert_eq!(cross([0.0, 1.0, 0.0], [1.0, 0.0, 0.0]), [0.0, 0.0, -1.0]);
    }

    #[test]
    fn inverse_times_matrix_is_identity() {
        let m = [[2.0, 0.5, 0.0], [0.1, 1.0, 0.3], [0.0, -0.2, 4.0]];
        let inv = inverse(&m).unwrap();
        assert_matrix_eq(&mul(&m, &inv), &IDENTITY3);
        assert_matrix_eq(&mul(&inv, &m), &IDENTITY3);
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let m = [[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 1.0, 0.0]];
        assert!(inverse(&m).is_none());
    }

    #[test]
    fn mul_vec2_applies_rows() {
        let m = [[1.0, 1.0], [1.0, -1.0]];
        assert_eq!(mul_vec2(&m, [3.0, 1.0]), [4.0, 2.0]);
    }
}
