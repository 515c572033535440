// Kinematics models and the coordinate transform engine

use crate::{
    axis::AxisVec,
    math::{Matrix2, mul_vec2},
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use thiserror::Error;

// Submodules for each kinematics system
pub mod cartesian;
pub mod corexy;
pub mod delta;
pub mod hbelt;

pub use cartesian::CartesianKin;
pub use delta::{DeltaKin, DeltaKinematics, LinearDelta};

/// Mechanical linkage model selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KinematicsMode {
    #[serde(alias = "xy")]
    Cartesian,
    #[serde(alias = "h_belt")]
    HBelt,
    #[serde(alias = "core_xy", alias = "corexy")]
    CoreXy,
    Delta,
}

impl KinematicsMode {
    /// Parse mode from its configuration name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cartesian" | "xy" => Some(KinematicsMode::Cartesian),
            "h-belt" | "h_belt" | "hbelt" => Some(KinematicsMode::HBelt),
            "corexy" | "core-xy" | "core_xy" => Some(KinematicsMode::CoreXy),
            "delta" => Some(KinematicsMode::Delta),
            _ => None,
        }
    }

    /// Map the legacy numeric `axis_config` code
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(KinematicsMode::Cartesian),
            1 => Some(KinematicsMode::HBelt),
            2 => Some(KinematicsMode::CoreXy),
            3 => Some(KinematicsMode::Delta),
            _ => None,
        }
    }

    pub const fn code(self) -> i64 {
        match self {
            KinematicsMode::Cartesian => 0,
            KinematicsMode::HBelt => 1,
            KinematicsMode::CoreXy => 2,
            KinematicsMode::Delta => 3,
        }
    }

    /// Whether motion in continuous space maps linearly onto actuator space
    pub const fn is_linear(self) -> bool {
        !matches!(self, KinematicsMode::Delta)
    }
}

impl fmt::Display for KinematicsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KinematicsMode::Cartesian => "cartesian",
            KinematicsMode::HBelt => "h-belt",
            KinematicsMode::CoreXy => "core-xy",
            KinematicsMode::Delta => "delta",
        };
        f.write_str(name)
    }
}

/// A position the kinematics cannot resolve
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("position {position:?} is outside the reachable envelope")]
pub struct Unreachable {
    pub position: [f64; 3],
}

/// Maps displacements between continuous space and kinematics space.
///
/// `reference` is the continuous-space position the displacement starts from;
/// linear models ignore it.
pub trait SpaceTransform {
    fn to_kinematics_space(
        &self,
        displacement: &AxisVec,
        reference: &AxisVec,
    ) -> Result<AxisVec, Unreachable>;

    fn to_continuous_space(
        &self,
        displacement: &AxisVec,
        reference: &AxisVec,
    ) -> Result<AxisVec, Unreachable>;
}

/// Linear XY kinematics described by a fixed 2x2 matrix and its inverse.
///
/// `to_motors` maps an XY displacement onto the two XY actuators; every other
/// axis passes through unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XyMatrixKin {
    pub to_motors: Matrix2,
    pub to_cartesian: Matrix2,
}

impl XyMatrixKin {
    fn apply(matrix: &Matrix2, v: &AxisVec) -> AxisVec {
        let mut out = *v;
        let [a, b] = mul_vec2(matrix, [v[0], v[1]]);
        out[0] = a;
        out[1] = b;
        out
    }
}

impl SpaceTransform for XyMatrixKin {
    fn to_kinematics_space(
        &self,
        displacement: &AxisVec,
        _reference: &AxisVec,
    ) -> Result<AxisVec, Unreachable> {
        Ok(Self::apply(&self.to_motors, displacement))
    }

    fn to_continuous_space(
        &self,
        displacement: &AxisVec,
        _reference: &AxisVec,
    ) -> Result<AxisVec, Unreachable> {
        Ok(Self::apply(&self.to_cartesian, displacement))
    }
}

/// The active kinematics model
#[derive(Debug, Clone)]
pub enum Kinematics {
    Cartesian,
    HBelt,
    CoreXy,
    Delta(DeltaKin),
}

impl Kinematics {
    /// Build the model for `mode`. Delta needs a provider; `None` is returned without one.
    pub fn new(
        mode: KinematicsMode,
        delta: Option<Arc<dyn DeltaKinematics>>,
    ) -> Option<Self> {
        match mode {
            KinematicsMode::Cartesian => Some(Kinematics::Cartesian),
            KinematicsMode::HBelt => Some(Kinematics::HBelt),
            KinematicsMode::CoreXy => Some(Kinematics::CoreXy),
            KinematicsMode::Delta => {
                delta.map(|provider| Kinematics::Delta(DeltaKin::new(provider)))
            }
        }
    }

    pub fn mode(&self) -> KinematicsMode {
        match self {
            Kinematics::Cartesian => KinematicsMode::Cartesian,
            Kinematics::HBelt => KinematicsMode::HBelt,
            Kinematics::CoreXy => KinematicsMode::CoreXy,
            Kinematics::Delta(_) => KinematicsMode::Delta,
        }
    }

    fn transform(&self) -> &dyn SpaceTransform {
        match self {
            Kinematics::Cartesian => &CartesianKin,
            Kinematics::HBelt => &hbelt::H_BELT,
            Kinematics::CoreXy => &corexy::CORE_XY,
            Kinematics::Delta(kin) => kin,
        }
    }

    /// Continuous-space displacement to kinematics space
    pub fn to_kinematics_space(
        &self,
        displacement: &AxisVec,
        reference: &AxisVec,
    ) -> Result<AxisVec, Unreachable> {
        self.transform().to_kinematics_space(displacement, reference)
    }

    /// Kinematics-space displacement back to continuous space
    pub fn to_continuous_space(
        &self,
        displacement: &AxisVec,
        reference: &AxisVec,
    ) -> Result<AxisVec, Unreachable> {
        self.transform().to_continuous_space(displacement, reference)
    }
}
