//! Process-wide kinematics configuration.
//!
//! The [`KinematicsContext`] owns every per-axis setting, the active
//! kinematics model, the bed compensation matrix, the axis-slave table, the
//! active tool and the backlash direction memory. It is built and validated
//! once; afterwards only the calibration operations below mutate it, and their
//! effect applies to segments resolved after the call.

use crate::{
    axis::{AXIS_COUNT, Axis, AxisVec},
    bed::{BedCompensation, CalibrationError},
    kinematics::{DeltaKinematics, Kinematics, KinematicsMode},
    math::Matrix3,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Default length above which a Delta move is split
pub const DEFAULT_DELTA_SPLIT_SIZE: f64 = 0.001;

/// Default maximum angular increment of one arc sub-segment, in radians
pub const DEFAULT_ARC_RESOLUTION: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("axis {axis} is active but has no steps_per_unit")]
    MissingStepsPerUnit { axis: Axis },
    #[error("axis {axis} has invalid steps_per_unit {value}")]
    InvalidStepsPerUnit { axis: Axis, value: f64 },
    #[error("axis {axis} soft limits are inverted or not finite: min {min}, max {max}")]
    InvalidSoftLimits { axis: Axis, min: f64, max: f64 },
    #[error("axis {axis} has invalid {field} {value}")]
    InvalidAxisSetting {
        axis: Axis,
        field: &'static str,
        value: f64,
    },
    #[error("unknown kinematics mode '{0}'")]
    UnknownKinematics(String),
    #[error("delta kinematics selected without delta geometry")]
    MissingDeltaGeometry,
    #[error("invalid bed compensation matrix: {0}")]
    BedMatrix(#[source] CalibrationError),
    #[error("slave axis {slave} cannot follow {master}: {reason}")]
    InvalidSlave {
        slave: Axis,
        master: Axis,
        reason: &'static str,
    },
    #[error("tool axis {axis} must be an active non-spatial axis")]
    InvalidTool { axis: Axis },
    #[error("{field} must be positive and finite, got {value}")]
    InvalidPlannerSetting { field: &'static str, value: f64 },
}

/// Per-axis settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AxisSettings {
    pub max_speed: f64,
    pub min_speed: f64,
    pub jerk: f64,
    pub acceleration: f64,
    pub home_speed: f64,
    pub home_backoff_speed: f64,
    pub home_backoff_offset: f64,
    /// Mechanical resolution; required on every active axis
    pub steps_per_unit: Option<f64>,
    /// Extra travel taken up on a direction reversal
    pub backlash: f64,
    pub soft_min: f64,
    pub soft_max: f64,
}

impl Default for AxisSettings {
    fn default() -> Self {
        Self {
            max_speed: 1.0,
            min_speed: 0.01,
            jerk: 0.01,
            acceleration: 0.3,
            home_speed: 1.0,
            home_backoff_speed: 1.0,
            home_backoff_offset: 0.0,
            steps_per_unit: None,
            backlash: 0.0,
            soft_min: -1000.0,
            soft_max: 1000.0,
        }
    }
}

impl AxisSettings {
    pub fn with_steps_per_unit(steps_per_unit: f64) -> Self {
        Self {
            steps_per_unit: Some(steps_per_unit),
            ..Self::default()
        }
    }

    fn validate(&self, axis: Axis) -> Result<f64, ConfigError> {
        let steps = self
            .steps_per_unit
            .ok_or(ConfigError::MissingStepsPerUnit { axis })?;
        if !steps.is_finite() || steps <= 0.0 {
            return Err(ConfigError::InvalidStepsPerUnit { axis, value: steps });
        }
        if !self.soft_min.is_finite() || !self.soft_max.is_finite() || self.soft_min > self.soft_max
        {
            return Err(ConfigError::InvalidSoftLimits {
                axis,
                min: self.soft_min,
                max: self.soft_max,
            });
        }
        let non_negative = [
            ("backlash", self.backlash),
            ("max_speed", self.max_speed),
            ("min_speed", self.min_speed),
            ("jerk", self.jerk),
            ("acceleration", self.acceleration),
            ("home_speed", self.home_speed.abs()),
            ("home_backoff_speed", self.home_backoff_speed.abs()),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidAxisSetting { axis, field, value });
            }
        }
        if !self.home_backoff_offset.is_finite() {
            return Err(ConfigError::InvalidAxisSetting {
                axis,
                field: "home_backoff_offset",
                value: self.home_backoff_offset,
            });
        }
        Ok(steps)
    }
}

/// Collects configuration and validates it into a [`KinematicsContext`]
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    mode: KinematicsMode,
    axes: [Option<AxisSettings>; AXIS_COUNT],
    delta: Option<Arc<dyn DeltaKinematics>>,
    bed: Option<Matrix3>,
    slaves: Vec<(Axis, Axis)>,
    tool: Axis,
    delta_split_size: f64,
    arc_resolution: f64,
}

impl ContextBuilder {
    pub fn new(mode: KinematicsMode) -> Self {
        Self {
            mode,
            axes: [None; AXIS_COUNT],
            delta: None,
            bed: None,
            slaves: Vec::new(),
            tool: Axis::E,
            delta_split_size: DEFAULT_DELTA_SPLIT_SIZE,
            arc_resolution: DEFAULT_ARC_RESOLUTION,
        }
    }

    /// Activate `axis` with `settings`
    pub fn axis(mut self, axis: Axis, settings: AxisSettings) -> Self {
        self.axes[axis.index()] = Some(settings);
        self
    }

    pub fn delta(mut self, provider: Arc<dyn DeltaKinematics>) -> Self {
        self.delta = Some(provider);
        self
    }

    pub fn bed_matrix(mut self, matrix: Matrix3) -> Self {
        self.bed = Some(matrix);
        self
    }

    /// `slave` mirrors the computed position of `master`
    pub fn slave(mut self, slave: Axis, master: Axis) -> Self {
        self.slaves.push((slave, master));
        self
    }

    pub fn tool(mut self, tool: Axis) -> Self {
        self.tool = tool;
        self
    }

    pub fn delta_split_size(mut self, size: f64) -> Self {
        self.delta_split_size = size;
        self
    }

    pub fn arc_resolution(mut self, radians: f64) -> Self {
        self.arc_resolution = radians;
        self
    }

    pub fn build(self) -> Result<KinematicsContext, ConfigError> {
        let kinematics =
            Kinematics::new(self.mode, self.delta).ok_or(ConfigError::MissingDeltaGeometry)?;

        let mut settings = [AxisSettings::default(); AXIS_COUNT];
        let mut active = [false; AXIS_COUNT];
        let mut steps_per_unit = [1.0; AXIS_COUNT];
        for axis in Axis::ALL {
            if let Some(axis_settings) = self.axes[axis.index()] {
                steps_per_unit[axis.index()] = axis_settings.validate(axis)?;
                settings[axis.index()] = axis_settings;
                active[axis.index()] = true;
            }
        }

        let bed = match self.bed {
            Some(matrix) => BedCompensation::from_matrix(matrix).map_err(ConfigError::BedMatrix)?,
            None => BedCompensation::identity(),
        };

        let mut slaves = [None; AXIS_COUNT];
        for &(slave, master) in &self.slaves {
            let reason = if slave == master {
                Some("an axis cannot follow itself")
            } else if !active[slave.index()] || !active[master.index()] {
                Some("both axes must be active")
            } else if self.slaves.iter().any(|(s, _)| *s == master) {
                Some("the master is itself a slave")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(ConfigError::InvalidSlave {
                    slave,
                    master,
                    reason,
                });
            }
            slaves[slave.index()] = Some(master);
        }

        if self.tool.is_spatial() || !active[self.tool.index()] {
            return Err(ConfigError::InvalidTool { axis: self.tool });
        }

        for (field, value) in [
            ("delta_split_size", self.delta_split_size),
            ("arc_resolution", self.arc_resolution),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidPlannerSetting { field, value });
            }
        }

        Ok(KinematicsContext {
            soft_min: settings.map(|s| s.soft_min),
            soft_max: settings.map(|s| s.soft_max),
            backlash: settings.map(|s| s.backlash),
            settings,
            active,
            steps_per_unit,
            backlash_state: [0; AXIS_COUNT],
            kinematics,
            bed,
            slaves,
            tool: self.tool,
            delta_split_size: self.delta_split_size,
            arc_resolution: self.arc_resolution,
        })
    }
}

/// Shared kinematics configuration and compensation state
#[derive(Debug, Clone)]
pub struct KinematicsContext {
    settings: [AxisSettings; AXIS_COUNT],
    active: [bool; AXIS_COUNT],
    steps_per_unit: AxisVec,
    soft_min: AxisVec,
    soft_max: AxisVec,
    backlash: AxisVec,
    backlash_state: [i8; AXIS_COUNT],
    kinematics: Kinematics,
    bed: BedCompensation,
    slaves: [Option<Axis>; AXIS_COUNT],
    tool: Axis,
    delta_split_size: f64,
    arc_resolution: f64,
}

impl KinematicsContext {
    pub fn builder(mode: KinematicsMode) -> ContextBuilder {
        ContextBuilder::new(mode)
    }

    pub fn settings(&self, axis: Axis) -> &AxisSettings {
        &self.settings[axis.index()]
    }

    pub fn is_active(&self, axis: Axis) -> bool {
        self.active[axis.index()]
    }

    pub fn steps_per_unit(&self) -> &AxisVec {
        &self.steps_per_unit
    }

    pub fn soft_min(&self) -> &AxisVec {
        &self.soft_min
    }

    pub fn soft_max(&self) -> &AxisVec {
        &self.soft_max
    }

    pub fn backlash(&self) -> &AxisVec {
        &self.backlash
    }

    pub fn kinematics(&self) -> &Kinematics {
        &self.kinematics
    }

    pub fn mode(&self) -> KinematicsMode {
        self.kinematics.mode()
    }

    pub fn bed(&self) -> &BedCompensation {
        &self.bed
    }

    pub fn tool(&self) -> Axis {
        self.tool
    }

    /// Master followed by `slave`, if bound
    pub fn master_of(&self, slave: Axis) -> Option<Axis> {
        self.slaves[slave.index()]
    }

    /// Bound `(slave, master)` pairs in axis order
    pub fn slaves(&self) -> impl Iterator<Item = (Axis, Axis)> + '_ {
        Axis::ALL
            .into_iter()
            .filter_map(|slave| self.master_of(slave).map(|master| (slave, master)))
    }

    pub fn delta_split_size(&self) -> f64 {
        self.delta_split_size
    }

    pub fn arc_resolution(&self) -> f64 {
        self.arc_resolution
    }

    /// Last travel direction per axis: -1, 0 (neutral) or +1
    pub fn backlash_state(&self) -> &[i8; AXIS_COUNT] {
        &self.backlash_state
    }

    pub(crate) fn backlash_state_mut(&mut self) -> &mut [i8; AXIS_COUNT] {
        &mut self.backlash_state
    }

    // Calibration operations

    /// Replace the bed compensation matrix
    pub fn set_bed_compensation(&mut self, bed: BedCompensation) {
        tracing::info!(matrix = ?bed.matrix(), "bed compensation matrix replaced");
        self.bed = bed;
    }

    /// Rebuild the bed compensation matrix from probed heights
    pub fn calibrate_bed(
        &mut self,
        points: &[[f64; 2]],
        heights: &[f64],
    ) -> Result<(), CalibrationError> {
        let bed = BedCompensation::from_probes(points, heights)?;
        self.set_bed_compensation(bed);
        Ok(())
    }

    /// Forget every stored travel direction
    pub fn reset_backlash(&mut self) {
        tracing::info!("backlash direction memory reset");
        self.backlash_state = [0; AXIS_COUNT];
    }

    /// Make `slave` mirror the computed position of `master`
    pub fn bind_slave(&mut self, slave: Axis, master: Axis) -> Result<(), CalibrationError> {
        if slave == master {
            return Err(CalibrationError::SlaveOfItself { axis: slave });
        }
        for axis in [slave, master] {
            if !self.is_active(axis) {
                return Err(CalibrationError::InactiveAxis { axis });
            }
        }
        // one level only: a master never follows, a slave never leads
        if self.master_of(master).is_some() || self.slaves().any(|(_, m)| m == slave) {
            return Err(CalibrationError::SlaveChain { slave, master });
        }
        tracing::info!(%slave, %master, "axis slave bound");
        self.slaves[slave.index()] = Some(master);
        Ok(())
    }

    /// Release `slave`; returns the master it followed
    pub fn unbind_slave(&mut self, slave: Axis) -> Option<Axis> {
        let master = self.slaves[slave.index()].take();
        if let Some(master) = master {
            tracing::info!(%slave, %master, "axis slave unbound");
        }
        master
    }

    /// Select the axis that receives extrusion-axis motion
    pub fn set_tool(&mut self, tool: Axis) -> Result<(), CalibrationError> {
        if tool.is_spatial() || !self.is_active(tool) {
            return Err(CalibrationError::InactiveAxis { axis: tool });
        }
        self.tool = tool;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::LinearDelta;

    fn cartesian() -> ContextBuilder {
        KinematicsContext::builder(KinematicsMode::Cartesian)
            .axis(Axis::X, AxisSettings::with_steps_per_unit(10_000.0))
            .axis(Axis::Y, AxisSettings::with_steps_per_unit(10_000.0))
            .axis(Axis::Z, AxisSettings::with_steps_per_unit(10_000.0))
            .axis(Axis::E, AxisSettings::with_steps_per_unit(10_000.0))
    }

    #[test]
    fn builds_with_defaults() {
        let ctx = cartesian().build().unwrap();
        assert_eq!(ctx.mode(), KinematicsMode::Cartesian);
        assert_eq!(ctx.tool(), Axis::E);
        assert_eq!(ctx.steps_per_unit()[0], 10_000.0);
        // inactive axes keep unit resolution
        assert_eq!(ctx.steps_per_unit()[Axis::H.index()], 1.0);
        assert!(!ctx.is_active(Axis::H));
        assert_eq!(ctx.soft_min()[0], -1000.0);
        assert_eq!(ctx.soft_max()[0], 1000.0);
        assert_eq!(ctx.backlash_state(), &[0; AXIS_COUNT]);
        assert!(ctx.bed().is_identity());
        assert_eq!(ctx.delta_split_size(), DEFAULT_DELTA_SPLIT_SIZE);
    }

    #[test]
    fn missing_steps_per_unit_is_fatal() {
        let err = cartesian()
            .axis(Axis::H, AxisSettings::default())
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingStepsPerUnit { axis: Axis::H });

        let err = cartesian()
            .axis(Axis::Y, AxisSettings::with_steps_per_unit(0.0))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidStepsPerUnit {
                axis: Axis::Y,
                value: 0.0
            }
        );
    }

    #[test]
    fn inverted_soft_limits_are_fatal() {
        let settings = AxisSettings {
            soft_min: 1.0,
            soft_max: -1.0,
            ..AxisSettings::with_steps_per_unit(100.0)
        };
        let err = cartesian().axis(Axis::Z, settings).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSoftLimits { axis: Axis::Z, .. }));
    }

    #[test]
    fn delta_without_geometry_is_fatal() {
        let err = KinematicsContext::builder(KinematicsMode::Delta)
            .axis(Axis::E, AxisSettings::with_steps_per_unit(1.0))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingDeltaGeometry);

        let ctx = KinematicsContext::builder(KinematicsMode::Delta)
            .axis(Axis::E, AxisSettings::with_steps_per_unit(1.0))
            .delta(Arc::new(LinearDelta::new(0.25, 0.12)))
            .build()
            .unwrap();
        assert_eq!(ctx.mode(), KinematicsMode::Delta);
    }

    #[test]
    fn slave_validation() {
        let err = cartesian().slave(Axis::X, Axis::X).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSlave { .. }));
        let err = cartesian().slave(Axis::H, Axis::X).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSlave { .. }));

        let ctx = cartesian()
            .axis(Axis::H, AxisSettings::with_steps_per_unit(10_000.0))
            .slave(Axis::H, Axis::X)
            .build()
            .unwrap();
        assert_eq!(ctx.master_of(Axis::H), Some(Axis::X));
        assert_eq!(ctx.slaves().collect::<Vec<_>>(), vec![(Axis::H, Axis::X)]);
    }

    #[test]
    fn slave_chains_rejected_in_any_order() {
        let chained = |pairs: [(Axis, Axis); 2]| {
            let mut builder = cartesian()
                .axis(Axis::H, AxisSettings::with_steps_per_unit(10_000.0))
                .axis(Axis::A, AxisSettings::with_steps_per_unit(10_000.0));
            for (slave, master) in pairs {
                builder = builder.slave(slave, master);
            }
            builder.build().unwrap_err()
        };
        for pairs in [
            [(Axis::H, Axis::A), (Axis::A, Axis::X)],
            [(Axis::A, Axis::X), (Axis::H, Axis::A)],
        ] {
            assert_eq!(
                chained(pairs),
                ConfigError::InvalidSlave {
                    slave: Axis::H,
                    master: Axis::A,
                    reason: "the master is itself a slave",
                }
            );
        }
    }

    #[test]
    fn bind_slave_rejects_chains() {
        let mut ctx = cartesian()
            .axis(Axis::H, AxisSettings::with_steps_per_unit(10_000.0))
            .axis(Axis::A, AxisSettings::with_steps_per_unit(10_000.0))
            .build()
            .unwrap();

        // master already follows another axis
        ctx.bind_slave(Axis::A, Axis::X).unwrap();
        assert_eq!(
            ctx.bind_slave(Axis::H, Axis::A),
            Err(CalibrationError::SlaveChain {
                slave: Axis::H,
                master: Axis::A
            })
        );

        // slave already leads another axis
        ctx.unbind_slave(Axis::A);
        ctx.bind_slave(Axis::H, Axis::A).unwrap();
        assert_eq!(
            ctx.bind_slave(Axis::A, Axis::X),
            Err(CalibrationError::SlaveChain {
                slave: Axis::A,
                master: Axis::X
            })
        );
        assert_eq!(ctx.slaves().collect::<Vec<_>>(), vec![(Axis::H, Axis::A)]);

        // rebinding an existing slave to a new master is allowed
        ctx.bind_slave(Axis::H, Axis::Y).unwrap();
        assert_eq!(ctx.master_of(Axis::H), Some(Axis::Y));
    }

    #[test]
    fn tool_must_be_active_extruder_slot() {
        let err = cartesian().tool(Axis::X).build().unwrap_err();
        assert_eq!(err, ConfigError::InvalidTool { axis: Axis::X });
        let err = cartesian().tool(Axis::H).build().unwrap_err();
        assert_eq!(err, ConfigError::InvalidTool { axis: Axis::H });
    }

    #[test]
    fn calibration_operations() {
        let mut ctx = cartesian()
            .axis(Axis::H, AxisSettings::with_steps_per_unit(10_000.0))
            .build()
            .unwrap();

        ctx.backlash_state_mut()[0] = 1;
        ctx.reset_backlash();
        assert_eq!(ctx.backlash_state(), &[0; AXIS_COUNT]);

        assert_eq!(
            ctx.bind_slave(Axis::H, Axis::H),
            Err(CalibrationError::SlaveOfItself { axis: Axis::H })
        );
        assert_eq!(
            ctx.bind_slave(Axis::A, Axis::X),
            Err(CalibrationError::InactiveAxis { axis: Axis::A })
        );
        ctx.bind_slave(Axis::H, Axis::Y).unwrap();
        assert_eq!(ctx.master_of(Axis::H), Some(Axis::Y));
        assert_eq!(ctx.unbind_slave(Axis::H), Some(Axis::Y));
        assert_eq!(ctx.unbind_slave(Axis::H), None);

        ctx.calibrate_bed(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]], &[0.0, 0.01, 0.0])
            .unwrap();
        assert!(!ctx.bed().is_identity());

        ctx.set_tool(Axis::H).unwrap();
        assert_eq!(ctx.tool(), Axis::H);
        assert!(ctx.set_tool(Axis::Z).is_err());
    }
}
