// H-belt kinematics

use super::XyMatrixKin;

/// H-belt arrangement. The continuous-space displacement of the carriage is
/// `[[-0.5, 0.5], [-0.5, -0.5]]` times the motor displacement, so motors are
/// driven through the inverse of that matrix.
pub static H_BELT: XyMatrixKin = XyMatrixKin {
    to_motors: [[-1.0, -1.0], [1.0, -1.0]],
    to_cartesian: [[-0.5, 0.5], [-0.5, -0.5]],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{kinematics::SpaceTransform, math::mul_vec2};

    #[test]
    fn h_belt_matrices_are_inverse() {
        for v in [[1.0, 0.0], [0.0, 1.0], [3.5, -2.25]] {
            let round = mul_vec2(&H_BELT.to_cartesian, mul_vec2(&H_BELT.to_motors, v));
            assert!((round[0] - v[0]).abs() < 1e-12);
            assert!((round[1] - v[1]).abs() < 1e-12);
        }
    }

    #[test]
    fn pure_x_moves_both_motors() {
        let v = [0.01, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let motors = H_BELT.to_kinematics_space(&v, &v).unwrap();
        assert_eq!(motors[0], -0.01);
        assert_eq!(motors[1], 0.01);
    }
}
