//! Motion-planning core for Legato.
//!
//! Turns tool-space motion requests into quantized, machine-space segments:
//! kinematics transforms, bed-tilt and backlash compensation, soft limits and
//! curve segmentation. This crate intentionally avoids any transport- or
//! MCU-specific dependencies.

pub mod axis;
pub mod bed;
pub mod chain;
pub mod context;
pub mod kinematics;
pub mod math;
pub mod pipeline;
pub mod planner;
pub mod segment;
pub mod segmenter;

pub use axis::{AXIS_COUNT, Axis, AxisTargets, AxisVec};
pub use bed::{BedCompensation, CalibrationError};
pub use chain::{SegmentChain, SegmentId};
pub use context::{AxisSettings, ConfigError, ContextBuilder, KinematicsContext};
pub use kinematics::{DeltaKinematics, Kinematics, KinematicsMode, Unreachable};
pub use planner::{Planner, SegmentSink};
pub use segment::{
    ArcDirection, MotionRequest, MoveKind, RequestError, Segment, SegmentFlags, StepDirection,
};
