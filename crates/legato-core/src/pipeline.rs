//! Compensation pipeline.
//!
//! Resolves one motion request against its predecessor segment and the
//! kinematics context, in a fixed order: soft-limit clamp, bed-tilt
//! correction, kinematics transform and step quantization, backlash take-up,
//! then tool and slave remapping of the actuator frame. A target the
//! kinematics cannot reach collapses the segment to zero motion.

use crate::{
    axis::{self, AXIS_COUNT, Axis, AxisTargets, AxisVec, spatial_norm},
    chain::SegmentId,
    context::KinematicsContext,
    segment::{MotionRequest, MoveKind, Segment, StepDirection},
};
use tracing::debug;

/// Ideal end position of a request relative to the predecessor's ideal end.
///
/// Arc targets are absolute; the segmenter interpolates towards them.
pub fn ideal_target(kind: &MoveKind, targets: &AxisTargets, prev: &Segment) -> AxisVec {
    match kind {
        MoveKind::Relative => axis::add(&prev.ideal_end_position, &targets.to_displacement()),
        MoveKind::Absolute | MoveKind::Reset | MoveKind::Arc { .. } => {
            targets.overlay(&prev.ideal_end_position)
        }
    }
}

/// Clamp each axis into its `[soft_min, soft_max]` window
pub fn clamp_to_soft_limits(ctx: &KinematicsContext, position: &AxisVec) -> AxisVec {
    let (min, max) = (ctx.soft_min(), ctx.soft_max());
    std::array::from_fn(|i| position[i].clamp(min[i], max[i]))
}

/// Apply the bed matrix to the XYZ components
pub fn level(ctx: &KinematicsContext, position: &AxisVec) -> AxisVec {
    let mut out = *position;
    let xyz = ctx.bed().apply([position[0], position[1], position[2]]);
    out[..3].copy_from_slice(&xyz);
    out
}

/// Resolve `request` against `prev`.
///
/// Arcs must go through the segmenter first; resolved directly they are
/// treated as a straight move to the arc endpoint.
pub fn resolve(
    ctx: &mut KinematicsContext,
    prev: &Segment,
    id: SegmentId,
    request: &MotionRequest,
) -> Segment {
    let mut segment = Segment::origin(id);
    segment.prev = Some(prev.id);
    segment.kind = request.kind;
    segment.targets = request.targets;
    segment.speed = request.speed;
    segment.acceleration = request.acceleration;
    segment.flags = request.flags;
    segment.start_position = prev.end_position;

    match request.kind {
        MoveKind::Reset => resolve_reset(ctx, prev, &mut segment),
        _ => resolve_move(ctx, prev, &mut segment),
    }

    debug!(
        id = %segment.id,
        kind = segment.kind.name(),
        steps = ?segment.steps,
        contained = segment.contained,
        "segment resolved"
    );
    segment
}

fn resolve_reset(ctx: &KinematicsContext, prev: &Segment, segment: &mut Segment) {
    segment.ideal_end_position = segment.targets.overlay(&prev.ideal_end_position);
    segment.end_position = segment.targets.overlay(&segment.start_position);
    segment.level_end_position = segment.end_position;

    segment.stepper_start = segment.start_position;
    segment.stepper_end = segment.end_position;
    remap_actuators(ctx, segment);
}

fn resolve_move(ctx: &mut KinematicsContext, prev: &Segment, segment: &mut Segment) {
    let flags = segment.flags;
    let start = segment.start_position;

    let mut ideal = ideal_target(&segment.kind, &segment.targets, prev);
    if flags.soft_limits {
        ideal = clamp_to_soft_limits(ctx, &ideal);
    }
    segment.ideal_end_position = ideal;

    segment.level_end_position = if flags.bed_compensation {
        level(ctx, &ideal)
    } else {
        ideal
    };
    segment.displacement = axis::sub(&segment.level_end_position, &start);

    let kinematics = match ctx
        .kinematics()
        .to_kinematics_space(&segment.displacement, &start)
    {
        Ok(kin) if kin.iter().all(|v| v.is_finite()) => kin,
        _ => return contain(segment),
    };
    segment.kinematics_displacement = kinematics;

    let spu = *ctx.steps_per_unit();
    for i in 0..AXIS_COUNT {
        let count = (kinematics[i].abs() * spu[i]).round();
        segment.step_counts[i] = count as u64;
        segment.quantized_displacement[i] = sign(kinematics[i]) * count / spu[i];
    }

    let achieved = match ctx
        .kinematics()
        .to_continuous_space(&segment.quantized_displacement, &start)
    {
        Ok(v) if v.iter().all(|c| c.is_finite()) => v,
        _ => return contain(segment),
    };

    let compensation = if flags.backlash_compensation {
        take_up_backlash(ctx, &segment.quantized_displacement)
    } else {
        None
    };

    segment.end_position = axis::add(&start, &achieved);
    segment.true_displacement = match &compensation {
        Some(comp) => axis::add(&achieved, comp),
        None => achieved,
    };
    segment.magnitude = spatial_norm(&segment.true_displacement);

    segment.stepper_start = start;
    segment.stepper_end = axis::add(&start, &segment.true_displacement);
    for i in 0..AXIS_COUNT {
        let take_up = compensation.map_or(0, |comp| (comp[i].abs() * spu[i]).round() as u64);
        segment.steps[i] = segment.step_counts[i] + take_up;
        segment.directions[i] = StepDirection::from_sign(segment.quantized_displacement[i]);
    }
    segment.compensation = compensation;

    remap_actuators(ctx, segment);
}

/// Backlash take-up for every axis whose direction reversed.
///
/// The direction memory is updated for every axis that moves. An axis with
/// neutral memory takes up nothing.
fn take_up_backlash(ctx: &mut KinematicsContext, quantized: &AxisVec) -> Option<AxisVec> {
    let backlash = *ctx.backlash();
    let state = ctx.backlash_state_mut();
    let mut compensation = [0.0; AXIS_COUNT];
    for i in 0..AXIS_COUNT {
        let direction = StepDirection::from_sign(quantized[i]).signum();
        if direction == 0 {
            continue;
        }
        if state[i] != 0 && state[i] != direction {
            compensation[i] = f64::from(direction) * backlash[i];
        }
        state[i] = direction;
    }
    compensation
        .iter()
        .any(|&c| c != 0.0)
        .then_some(compensation)
}

/// Move extrusion-axis output to the active tool, then mirror slaves onto
/// their masters.
fn remap_actuators(ctx: &KinematicsContext, segment: &mut Segment) {
    let tool = ctx.tool();
    if tool != Axis::E {
        let (e, t) = (Axis::E.index(), tool.index());
        segment.stepper_start[t] = segment.stepper_start[e];
        segment.stepper_start[e] = 0.0;
        segment.stepper_end[t] = segment.stepper_end[e];
        segment.stepper_end[e] = 0.0;
        segment.steps[t] = segment.steps[e];
        segment.steps[e] = 0;
        segment.directions[t] = segment.directions[e];
        segment.directions[e] = StepDirection::Idle;
    }

    for (slave, master) in ctx.slaves() {
        let (s, m) = (slave.index(), master.index());
        segment.stepper_start[s] = segment.stepper_start[m];
        segment.stepper_end[s] = segment.stepper_end[m];
        segment.steps[s] = segment.steps[m];
        segment.directions[s] = segment.directions[m];
    }
}

/// Collapse to zero motion at the start position
fn contain(segment: &mut Segment) {
    segment.contained = true;
    segment.kinematics_displacement = [0.0; AXIS_COUNT];
    segment.step_counts = [0; AXIS_COUNT];
    segment.quantized_displacement = [0.0; AXIS_COUNT];
    segment.true_displacement = [0.0; AXIS_COUNT];
    segment.end_position = segment.start_position;
    segment.magnitude = 0.0;
    segment.compensation = None;
    segment.stepper_start = segment.start_position;
    segment.stepper_end = segment.start_position;
    segment.steps = [0; AXIS_COUNT];
    segment.directions = [StepDirection::Idle; AXIS_COUNT];
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}
