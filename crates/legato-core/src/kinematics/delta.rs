// Delta kinematics - three vertical towers with arms to effector

use super::{SpaceTransform, Unreachable};
use crate::{
    axis::AxisVec,
    math::{self, Vector3},
};
use std::{fmt, sync::Arc};

/// Position solver for a parallel (delta) mechanism.
///
/// `inverse` maps an effector XYZ position to the three carriage (column)
/// positions and fails outside the reachable envelope. `forward` recovers the
/// effector position from column positions.
pub trait DeltaKinematics: fmt::Debug + Send + Sync {
    fn inverse(&self, cartesian: Vector3) -> Result<Vector3, Unreachable>;
    fn forward(&self, columns: Vector3) -> Result<Vector3, Unreachable>;
}

/// Transform engine adapter for a [`DeltaKinematics`] provider.
///
/// The mapping is non-linear, so displacements are computed as the difference
/// between the positions solved for the end and start points rather than by
/// transforming the displacement itself.
#[derive(Debug, Clone)]
pub struct DeltaKin {
    provider: Arc<dyn DeltaKinematics>,
}

impl DeltaKin {
    pub fn new(provider: Arc<dyn DeltaKinematics>) -> Self {
        Self { provider }
    }
}

fn xyz(v: &AxisVec) -> Vector3 {
    [v[0], v[1], v[2]]
}

impl SpaceTransform for DeltaKin {
    fn to_kinematics_space(
        &self,
        displacement: &AxisVec,
        reference: &AxisVec,
    ) -> Result<AxisVec, Unreachable> {
        let start = xyz(reference);
        let start_columns = self.provider.inverse(start)?;
        let end_columns = self
            .provider
            .inverse(math::add(start, xyz(displacement)))?;
        let d = math::sub(end_columns, start_columns);

        let mut out = *displacement;
        out[..3].copy_from_slice(&d);
        Ok(out)
    }

    fn to_continuous_space(
        &self,
        displacement: &AxisVec,
        reference: &AxisVec,
    ) -> Result<AxisVec, Unreachable> {
        let start_columns = self.provider.inverse(xyz(reference))?;
        let end_columns = math::add(start_columns, xyz(displacement));
        let start = self.provider.forward(start_columns)?;
        let end = self.provider.forward(end_columns)?;
        let d = math::sub(end, start);

        let mut out = *displacement;
        out[..3].copy_from_slice(&d);
        Ok(out)
    }
}

/// Linear delta with three towers spaced 120 degrees apart on a circle and
/// equal diagonal rods.
///
/// Towers A, B and C sit at 210, 330 and 90 degrees. A column position is the
/// height of the carriage on its tower.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearDelta {
    arm2: f64,
    towers: [[f64; 2]; 3],
}

impl LinearDelta {
    pub fn new(rod_length: f64, radius: f64) -> Self {
        let towers = [210.0f64, 330.0, 90.0].map(|deg| {
            let rad = deg.to_radians();
            [radius * rad.cos(), radius * rad.sin()]
        });
        Self {
            arm2: rod_length * rod_length,
            towers,
        }
    }
}

impl DeltaKinematics for LinearDelta {
    fn inverse(&self, cartesian: Vector3) -> Result<Vector3, Unreachable> {
        let [x, y, z] = cartesian;
        let mut columns = [0.0; 3];
        for (column, [tx, ty]) in columns.iter_mut().zip(self.towers) {
            let dx = tx - x;
            let dy = ty - y;
            let h2 = self.arm2 - dx * dx - dy * dy;
            if h2.is_nan() || h2 < 0.0 {
                return Err(Unreachable {
                    position: cartesian,
                });
            }
            *column = h2.sqrt() + z;
        }
        Ok(columns)
    }

    fn forward(&self, columns: Vector3) -> Result<Vector3, Unreachable> {
        // Trilateration: the effector is where the three rod spheres meet.
        let unreachable = || Unreachable { position: columns };
        let [p1, p2, p3] = std::array::from_fn(|i| {
            let [tx, ty] = self.towers[i];
            [tx, ty, columns[i]]
        });

        let p21 = math::sub(p2, p1);
        let p31 = math::sub(p3, p1);
        let d = math::norm(p21);
        let ex = math::scale(p21, 1.0 / d);
        let i = math::dot(ex, p31);
        let ey_raw = math::sub(p31, math::scale(ex, i));
        let ey_len = math::norm(ey_raw);
        if d.is_nan() || d <= 0.0 || ey_len.is_nan() || ey_len <= 0.0 {
            return Err(unreachable());
        }
        let ey = math::scale(ey_raw, 1.0 / ey_len);
        let ez = math::cross(ex, ey);
        let j = math::dot(ey, p31);

        // equal radii on every tower
        let x = d / 2.0;
        let y = (i * i + j * j) / (2.0 * j) - i * x / j;
        let z2 = self.arm2 - x * x - y * y;
        if z2.is_nan() || z2 < 0.0 {
            return Err(unreachable());
        }

        let base = math::add(p1, math::add(math::scale(ex, x), math::scale(ey, y)));
        let offset = math::scale(ez, z2.sqrt());
        let a = math::add(base, offset);
        let b = math::sub(base, offset);
        // the effector hangs below the carriages
        Ok(if a[2] < b[2] { a } else { b })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn assert_close(a: Vector3, b: Vector3) {
        for i in 0..3 {
            assert!((a[i] - b[i]).abs() < EPSILON, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn center_column_height() {
        let delta = LinearDelta::new(10.0, 6.0);
        let columns = delta.inverse([0.0, 0.0, 5.0]).unwrap();
        // sqrt(100 - 36) + 5
        assert_close(columns, [13.0, 13.0, 13.0]);
    }

    #[test]
    fn forward_inverts_inverse() {
        let delta = LinearDelta::new(250.0, 120.0);
        for p in [
            [0.0, 0.0, 0.0],
            [10.0, -20.0, 5.0],
            [-50.0, 30.0, 100.0],
            [0.001, 0.002, 0.0],
        ] {
            let columns = delta.inverse(p).unwrap();
            assert_close(delta.forward(columns).unwrap(), p);
        }
    }

    #[test]
    fn inverse_rejects_points_beyond_rod_reach() {
        let delta = LinearDelta::new(10.0, 6.0);
        let err = delta.inverse([30.0, 0.0, 0.0]).unwrap_err();
        assert_eq!(err.position, [30.0, 0.0, 0.0]);
    }

    #[test]
    fn displacement_round_trips_through_columns() {
        let kin = DeltaKin::new(Arc::new(LinearDelta::new(250.0, 120.0)));
        let reference = [5.0, 5.0, 10.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let v = [1.0, -2.0, 0.5, 0.25, 0.0, 0.0, 0.0, 0.0];
        let k = kin.to_kinematics_space(&v, &reference).unwrap();
        assert_eq!(k[3], 0.25);
        let back = kin.to_continuous_space(&k, &reference).unwrap();
        for i in 0..8 {
            assert!((back[i] - v[i]).abs() < 1e-9, "{back:?} vs {v:?}");
        }
    }

    #[test]
    fn unreachable_target_is_reported() {
        let kin = DeltaKin::new(Arc::new(LinearDelta::new(10.0, 6.0)));
        let reference = [0.0; 8];
        let v = [50.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert!(kin.to_kinematics_space(&v, &reference).is_err());
    }
}
