// Cartesian kinematics - every actuator drives one axis directly

use super::{SpaceTransform, Unreachable};
use crate::axis::AxisVec;

/// Identity transform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CartesianKin;

impl SpaceTransform for CartesianKin {
    fn to_kinematics_space(
        &self,
        displacement: &AxisVec,
        _reference: &AxisVec,
    ) -> Result<AxisVec, Unreachable> {
        Ok(*displacement)
    }

    fn to_continuous_space(
        &self,
        displacement: &AxisVec,
        _reference: &AxisVec,
    ) -> Result<AxisVec, Unreachable> {
        Ok(*displacement)
    }
}
