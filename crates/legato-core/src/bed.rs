//! Build-surface tilt compensation.
//!
//! A 3x3 matrix maps ideal XYZ positions to tilt-corrected positions. The
//! matrix is identity until a calibration replaces it, either directly or from
//! a set of probed bed heights.

use crate::math::{self, IDENTITY3, Matrix3, Vector3};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("bed compensation needs at least 3 probe points, got {count}")]
    NotEnoughProbePoints { count: usize },
    #[error("{points} probe points but {heights} probe heights")]
    MismatchedProbeData { points: usize, heights: usize },
    #[error("probe points do not span a plane")]
    DegeneratePlane,
    #[error("bed compensation matrix is singular")]
    SingularMatrix,
    #[error("non-finite value in bed compensation data")]
    NonFinite,
    #[error("invalid bed matrix text: {reason}")]
    InvalidMatrixText { reason: String },
    #[error("axis {axis} cannot mirror itself")]
    SlaveOfItself { axis: crate::axis::Axis },
    #[error("axis {slave} cannot follow {master}: slaves cannot be chained")]
    SlaveChain {
        slave: crate::axis::Axis,
        master: crate::axis::Axis,
    },
    #[error("axis {axis} is not active")]
    InactiveAxis { axis: crate::axis::Axis },
}

/// Bed compensation matrix together with its inverse
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BedCompensation {
    matrix: Matrix3,
    inverse: Matrix3,
}

impl Default for BedCompensation {
    fn default() -> Self {
        Self::identity()
    }
}

impl BedCompensation {
    pub const fn identity() -> Self {
        Self {
            matrix: IDENTITY3,
            inverse: IDENTITY3,
        }
    }

    /// Use `matrix` as is; it must be finite and invertible.
    pub fn from_matrix(matrix: Matrix3) -> Result<Self, CalibrationError> {
        if matrix.iter().flatten().any(|v| !v.is_finite()) {
            return Err(CalibrationError::NonFinite);
        }
        let inverse = math::inverse(&matrix).ok_or(CalibrationError::SingularMatrix)?;
        Ok(Self { matrix, inverse })
    }

    /// Fit a plane through the probed bed heights and build the rotation that
    /// carries the ideal Z axis onto the bed normal.
    ///
    /// `points` are the XY probe positions, `heights` the bed surface height
    /// measured at each of them (positive where the bed is higher).
    pub fn from_probes(points: &[[f64; 2]], heights: &[f64]) -> Result<Self, CalibrationError> {
        if points.len() != heights.len() {
            return Err(CalibrationError::MismatchedProbeData {
                points: points.len(),
                heights: heights.len(),
            });
        }
        if points.len() < 3 {
            return Err(CalibrationError::NotEnoughProbePoints {
                count: points.len(),
            });
        }
        if points.iter().flatten().chain(heights).any(|v| !v.is_finite()) {
            return Err(CalibrationError::NonFinite);
        }

        let [a, b, _c] = fit_plane(points, heights)?;
        // plane z = a*x + b*y + c has normal (-a, -b, 1)
        let normal = [-a, -b, 1.0];
        let normal = math::scale(normal, 1.0 / math::norm(normal));
        Self::from_matrix(rotation_between([0.0, 0.0, 1.0], normal))
    }

    pub fn matrix(&self) -> &Matrix3 {
        &self.matrix
    }

    pub fn is_identity(&self) -> bool {
        self.matrix == IDENTITY3
    }

    /// Ideal XYZ to tilt-corrected XYZ
    pub fn apply(&self, xyz: Vector3) -> Vector3 {
        math::mul_vec(&self.matrix, xyz)
    }

    /// Tilt-corrected XYZ back to ideal XYZ
    pub fn remove(&self, xyz: Vector3) -> Vector3 {
        math::mul_vec(&self.inverse, xyz)
    }
}

/// Least-squares fit of `z = a*x + b*y + c` through the samples.
fn fit_plane(points: &[[f64; 2]], heights: &[f64]) -> Result<Vector3, CalibrationError> {
    let mut ata = [[0.0; 3]; 3];
    let mut atz = [0.0; 3];
    for (&[x, y], &z) in points.iter().zip(heights) {
        let row = [x, y, 1.0];
        for r in 0..3 {
            for c in 0..3 {
                ata[r][c] += row[r] * row[c];
            }
            atz[r] += row[r] * z;
        }
    }
    let inv = math::inverse(&ata).ok_or(CalibrationError::DegeneratePlane)?;
    Ok(math::mul_vec(&inv, atz))
}

/// Rotation matrix taking unit vector `from` onto unit vector `to` (Rodrigues).
fn rotation_between(from: Vector3, to: Vector3) -> Matrix3 {
    let axis = math::cross(from, to);
    let sin = math::norm(axis);
    let cos = math::dot(from, to);
    if sin < f64::EPSILON {
        // parallel; an anti-parallel bed normal never comes out of fit_plane
        return IDENTITY3;
    }
    let [kx, ky, kz] = math::scale(axis, 1.0 / sin);
    let k = [[0.0, -kz, ky], [kz, 0.0, -kx], [-ky, kx, 0.0]];
    let k2 = math::mul(&k, &k);
    std::array::from_fn(|r| {
        std::array::from_fn(|c| IDENTITY3[r][c] + sin * k[r][c] + (1.0 - cos) * k2[r][c])
    })
}

/// Nine comma-separated values, row major
impl fmt::Display for BedCompensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (r, row) in self.matrix.iter().enumerate() {
            if r > 0 {
                f.write_str(",\n")?;
            }
            write!(f, "{}, {}, {}", row[0], row[1], row[2])?;
        }
        Ok(())
    }
}

impl FromStr for BedCompensation {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| CalibrationError::InvalidMatrixText {
                reason: err.to_string(),
            })?;
        if values.len() != 9 {
            return Err(CalibrationError::InvalidMatrixText {
                reason: format!("expected 9 values, got {}", values.len()),
            });
        }
        let matrix = std::array::from_fn(|r| std::array::from_fn(|c| values[r * 3 + c]));
        Self::from_matrix(matrix)
    }
}
