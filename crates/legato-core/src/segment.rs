//! Motion requests and resolved path segments.

use crate::{
    axis::{AXIS_COUNT, Axis, AxisTargets, AxisVec},
    chain::SegmentId,
    context::KinematicsContext,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected before a request reaches the pipeline
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("target for axis {axis} is not finite: {value}")]
    NonFiniteTarget { axis: Axis, value: f64 },
    #[error("axis {axis} is not active")]
    InactiveAxis { axis: Axis },
    #[error("requested {field} must be positive and finite, got {value}")]
    InvalidRate { field: &'static str, value: f64 },
    #[error("arc center offset is not finite: {center:?}")]
    NonFiniteCenter { center: [f64; 2] },
    #[error("arc center offset has zero radius")]
    ZeroRadius,
}

pub type Result<T, E = RequestError> = core::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArcDirection {
    #[serde(alias = "cw")]
    Clockwise,
    #[serde(alias = "ccw")]
    CounterClockwise,
}

/// How the sparse targets of a request are interpreted
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveKind {
    /// Targets are positions; absent axes keep their ideal position
    Absolute,
    /// Targets are displacements from the previous ideal position
    Relative,
    /// Redefine the logical position without motion
    Reset,
    /// Circular XY move; `center` is the I/J offset from the start point
    Arc {
        direction: ArcDirection,
        center: [f64; 2],
    },
}

impl MoveKind {
    pub fn name(&self) -> &'static str {
        match self {
            MoveKind::Absolute => "absolute",
            MoveKind::Relative => "relative",
            MoveKind::Reset => "reset",
            MoveKind::Arc {
                direction: ArcDirection::Clockwise,
                ..
            } => "arc-cw",
            MoveKind::Arc {
                direction: ArcDirection::CounterClockwise,
                ..
            } => "arc-ccw",
        }
    }
}

/// Per-segment switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentFlags {
    /// The execution queue may drop this segment on cancel
    pub cancelable: bool,
    pub bed_compensation: bool,
    pub backlash_compensation: bool,
    pub soft_limits: bool,
}

impl Default for SegmentFlags {
    fn default() -> Self {
        Self {
            cancelable: false,
            bed_compensation: true,
            backlash_compensation: true,
            soft_limits: true,
        }
    }
}

/// A structured motion command from the command layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionRequest {
    pub kind: MoveKind,
    pub targets: AxisTargets,
    pub speed: Option<f64>,
    pub acceleration: Option<f64>,
    pub flags: SegmentFlags,
}

impl MotionRequest {
    pub fn new(kind: MoveKind, targets: AxisTargets) -> Self {
        Self {
            kind,
            targets,
            speed: None,
            acceleration: None,
            flags: SegmentFlags::default(),
        }
    }

    pub fn absolute(targets: AxisTargets) -> Self {
        Self::new(MoveKind::Absolute, targets)
    }

    pub fn relative(targets: AxisTargets) -> Self {
        Self::new(MoveKind::Relative, targets)
    }

    pub fn reset(targets: AxisTargets) -> Self {
        Self::new(MoveKind::Reset, targets)
    }

    pub fn arc(direction: ArcDirection, center: [f64; 2], targets: AxisTargets) -> Self {
        Self::new(MoveKind::Arc { direction, center }, targets)
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_acceleration(mut self, acceleration: f64) -> Self {
        self.acceleration = Some(acceleration);
        self
    }

    pub fn with_flags(mut self, flags: SegmentFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Check the request shape against the context
    pub fn validate(&self, ctx: &KinematicsContext) -> Result<()> {
        for (axis, value) in self.targets.iter() {
            if !value.is_finite() {
                return Err(RequestError::NonFiniteTarget { axis, value });
            }
            if !ctx.is_active(axis) {
                return Err(RequestError::InactiveAxis { axis });
            }
        }
        for (field, value) in [("speed", self.speed), ("acceleration", self.acceleration)] {
            match value {
                Some(value) if !value.is_finite() || value <= 0.0 => {
                    return Err(RequestError::InvalidRate { field, value });
                }
                _ => {}
            }
        }
        if let MoveKind::Arc { center, .. } = self.kind {
            if center.iter().any(|c| !c.is_finite()) {
                return Err(RequestError::NonFiniteCenter { center });
            }
            if center[0].hypot(center[1]) <= 0.0 {
                return Err(RequestError::ZeroRadius);
            }
        }
        Ok(())
    }
}

/// Direction the execution queue drives an actuator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepDirection {
    Forward,
    Reverse,
    #[default]
    Idle,
}

impl StepDirection {
    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            StepDirection::Forward
        } else if value < 0.0 {
            StepDirection::Reverse
        } else {
            StepDirection::Idle
        }
    }

    pub fn signum(self) -> i8 {
        match self {
            StepDirection::Forward => 1,
            StepDirection::Reverse => -1,
            StepDirection::Idle => 0,
        }
    }
}

/// One resolved unit of motion.
///
/// Every field is computed once when the segment is resolved against its
/// predecessor and is read-only afterwards.
///
/// Positions come in two frames. The logical frame (`start_position`,
/// `end_position`) is what the chain carries from one segment to the next and
/// never includes backlash. The actuator frame (`stepper_*`, `steps`,
/// `directions`) is what the execution queue drives: it includes backlash
/// take-up and has the tool and slave remapping applied.
///
/// Backlash is tracked per actuator, in kinematics-space slot order.
/// `compensation` holds the take-up for each actuator slot, and it is added
/// slot for slot to `true_displacement`, `stepper_end` and `magnitude`. Under
/// Cartesian kinematics a slot is an axis. Under CoreXY, H-belt and Delta the
/// first three slots are motors or towers, so motor A's take-up shows up in
/// the X slot of those values.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub(crate) id: SegmentId,
    pub(crate) prev: Option<SegmentId>,
    pub(crate) kind: MoveKind,
    pub(crate) targets: AxisTargets,
    pub(crate) speed: Option<f64>,
    pub(crate) acceleration: Option<f64>,
    pub(crate) flags: SegmentFlags,

    pub(crate) start_position: AxisVec,
    pub(crate) ideal_end_position: AxisVec,
    pub(crate) level_end_position: AxisVec,
    pub(crate) displacement: AxisVec,
    pub(crate) kinematics_displacement: AxisVec,
    pub(crate) step_counts: [u64; AXIS_COUNT],
    pub(crate) quantized_displacement: AxisVec,
    pub(crate) true_displacement: AxisVec,
    pub(crate) end_position: AxisVec,
    pub(crate) magnitude: f64,
    pub(crate) compensation: Option<AxisVec>,
    pub(crate) contained: bool,

    pub(crate) stepper_start: AxisVec,
    pub(crate) stepper_end: AxisVec,
    pub(crate) steps: [u64; AXIS_COUNT],
    pub(crate) directions: [StepDirection; AXIS_COUNT],
}

impl Segment {
    /// The chain's first segment: a reset at the machine origin
    pub(crate) fn origin(id: SegmentId) -> Self {
        Self {
            id,
            prev: None,
            kind: MoveKind::Reset,
            targets: AxisTargets::new(),
            speed: None,
            acceleration: None,
            flags: SegmentFlags::default(),
            start_position: [0.0; AXIS_COUNT],
            ideal_end_position: [0.0; AXIS_COUNT],
            level_end_position: [0.0; AXIS_COUNT],
            displacement: [0.0; AXIS_COUNT],
            kinematics_displacement: [0.0; AXIS_COUNT],
            step_counts: [0; AXIS_COUNT],
            quantized_displacement: [0.0; AXIS_COUNT],
            true_displacement: [0.0; AXIS_COUNT],
            end_position: [0.0; AXIS_COUNT],
            magnitude: 0.0,
            compensation: None,
            contained: false,
            stepper_start: [0.0; AXIS_COUNT],
            stepper_end: [0.0; AXIS_COUNT],
            steps: [0; AXIS_COUNT],
            directions: [StepDirection::Idle; AXIS_COUNT],
        }
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn prev(&self) -> Option<SegmentId> {
        self.prev
    }

    pub fn kind(&self) -> &MoveKind {
        &self.kind
    }

    pub fn targets(&self) -> &AxisTargets {
        &self.targets
    }

    pub fn speed(&self) -> Option<f64> {
        self.speed
    }

    pub fn acceleration(&self) -> Option<f64> {
        self.acceleration
    }

    pub fn flags(&self) -> SegmentFlags {
        self.flags
    }

    pub fn is_cancelable(&self) -> bool {
        self.flags.cancelable
    }

    pub fn is_reset(&self) -> bool {
        matches!(self.kind, MoveKind::Reset)
    }

    /// Copied from the predecessor's end position
    pub fn start_position(&self) -> &AxisVec {
        &self.start_position
    }

    /// Requested target after soft-limit clamping, before bed compensation
    pub fn ideal_end_position(&self) -> &AxisVec {
        &self.ideal_end_position
    }

    pub fn level_end_position(&self) -> &AxisVec {
        &self.level_end_position
    }

    /// Continuous-space displacement before quantization
    pub fn displacement(&self) -> &AxisVec {
        &self.displacement
    }

    pub fn kinematics_displacement(&self) -> &AxisVec {
        &self.kinematics_displacement
    }

    /// Unsigned quantized step count per kinematics-space axis
    pub fn step_counts(&self) -> &[u64; AXIS_COUNT] {
        &self.step_counts
    }

    /// `sign(kinematics displacement) * step_counts / steps_per_unit`
    pub fn quantized_displacement(&self) -> &AxisVec {
        &self.quantized_displacement
    }

    /// Achievable continuous displacement plus the per-actuator backlash
    /// take-up of [`Segment::compensation`]
    pub fn true_displacement(&self) -> &AxisVec {
        &self.true_displacement
    }

    pub fn end_position(&self) -> &AxisVec {
        &self.end_position
    }

    /// Euclidean norm of the travelled XYZ distance
    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    /// Backlash take-up per actuator slot, if any actuator reversed
    pub fn compensation(&self) -> Option<&AxisVec> {
        self.compensation.as_ref()
    }

    /// Whether the target was unreachable and the segment collapsed to no motion
    pub fn is_contained(&self) -> bool {
        self.contained
    }

    pub fn stepper_start(&self) -> &AxisVec {
        &self.stepper_start
    }

    pub fn stepper_end(&self) -> &AxisVec {
        &self.stepper_end
    }

    /// Steps the execution queue drives, per actuator
    pub fn steps(&self) -> &[u64; AXIS_COUNT] {
        &self.steps
    }

    pub fn directions(&self) -> &[StepDirection; AXIS_COUNT] {
        &self.directions
    }

    /// Whether any actuator steps
    pub fn has_motion(&self) -> bool {
        self.steps.iter().any(|&s| s > 0)
    }

    /// Limit the speed to the slowest home speed among the moving axes
    pub fn apply_homing_feedrate(&mut self, ctx: &KinematicsContext) {
        let home_speed = Axis::ALL
            .into_iter()
            .filter(|axis| self.true_displacement[axis.index()] != 0.0)
            .map(|axis| ctx.settings(axis).home_speed.abs())
            .min_by(f64::total_cmp);
        if let Some(home_speed) = home_speed {
            self.speed = Some(match self.speed {
                Some(speed) => speed.min(home_speed),
                None => home_speed,
            });
        }
    }
}
