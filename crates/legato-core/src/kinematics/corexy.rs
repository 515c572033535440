// CoreXY kinematics

use super::XyMatrixKin;

/// CoreXY belt arrangement: motor A = X + Y, motor B = X - Y.
///
/// A drives the top right corner, B the top left; home is the bottom right corner.
pub static CORE_XY: XyMatrixKin = XyMatrixKin {
    to_motors: [[1.0, 1.0], [1.0, -1.0]],
    to_cartesian: [[0.5, 0.5], [0.5, -0.5]],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::SpaceTransform;

    #[test]
    fn corexy_matrices_are_inverse() {
        let v = [10.0, 20.0, 30.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let motors = CORE_XY.to_kinematics_space(&v, &v).unwrap();
        assert_eq!(motors[0], 30.0); // 10 + 20
        assert_eq!(motors[1], -10.0); // 10 - 20
        assert_eq!(motors[2], 30.0);
        let back = CORE_XY.to_continuous_space(&motors, &v).unwrap();
        assert_eq!(back, v);
    }
}
