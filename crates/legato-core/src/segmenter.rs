//! Decomposition of arcs and long non-linear moves into short absolute moves.

use crate::{
    axis::{self, Axis, AxisTargets, AxisVec, spatial_norm},
    context::KinematicsContext,
    pipeline::ideal_target,
    segment::{ArcDirection, MotionRequest, MoveKind, Segment},
};
use tracing::{debug, warn};

/// Split `request` into the sub-requests that are resolved in order.
///
/// Requests that need no decomposition come back unchanged as a single entry.
/// Sub-requests are absolute moves over every axis and carry the original
/// speed, acceleration and flags.
pub fn split(
    ctx: &KinematicsContext,
    prev: &Segment,
    request: &MotionRequest,
) -> Vec<MotionRequest> {
    match request.kind {
        MoveKind::Arc { direction, center } => split_arc(ctx, prev, request, direction, center),
        _ if needs_delta_split(ctx, prev, request) => split_linear(ctx, prev, request),
        _ => vec![*request],
    }
}

/// Whether a non-arc move is long enough to be split under delta kinematics
pub fn needs_delta_split(ctx: &KinematicsContext, prev: &Segment, request: &MotionRequest) -> bool {
    if ctx.mode().is_linear()
        || matches!(request.kind, MoveKind::Reset | MoveKind::Arc { .. })
    {
        return false;
    }
    if !request.targets.contains(Axis::X) && !request.targets.contains(Axis::Y) {
        return false;
    }
    move_length(prev, request) > ctx.delta_split_size()
}

fn move_length(prev: &Segment, request: &MotionRequest) -> f64 {
    let end = ideal_target(&request.kind, &request.targets, prev);
    spatial_norm(&axis::sub(&end, &prev.ideal_end_position))
}

fn split_linear(
    ctx: &KinematicsContext,
    prev: &Segment,
    request: &MotionRequest,
) -> Vec<MotionRequest> {
    let start = prev.ideal_end_position;
    let end = ideal_target(&request.kind, &request.targets, prev);
    let length = move_length(prev, request);
    let count = (length / ctx.delta_split_size()).round() as usize + 1;
    debug!(length, count, "splitting delta move");

    (1..=count)
        .map(|k| {
            let f = k as f64 / count as f64;
            sub_request(request, &lerp(&start, &end, f))
        })
        .collect()
}

/// Ways the sampled arc departs from the commanded one.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ArcDiagnostic {
    /// Samples turn against the requested direction (CW needs a negative sweep)
    DirectionMismatch { direction: ArcDirection, sweep: f64 },
    /// First sample is further from the start than one angular step
    StartJump { distance: f64, step: f64 },
    /// Last sample misses the commanded endpoint
    EndMiss { distance: f64 },
}

fn split_arc(
    ctx: &KinematicsContext,
    prev: &Segment,
    request: &MotionRequest,
    direction: ArcDirection,
    center: [f64; 2],
) -> Vec<MotionRequest> {
    let start = prev.ideal_end_position;
    let end = ideal_target(&request.kind, &request.targets, prev);

    let (positions, diagnostics) = sample_arc(ctx, &start, &end, direction, center);
    for diagnostic in &diagnostics {
        warn!(
            ?diagnostic,
            target = ?[end[0], end[1]],
            "arc samples deviate from the commanded arc"
        );
    }
    positions
        .iter()
        .map(|position| sub_request(request, position))
        .collect()
}

/// Samples the arc through the inverse-cosine projection of X onto the circle.
///
/// The angle of a point is `acos((x - cx) / r)`, which only resolves points in
/// the upper half of the circle. The sweep runs from the start angle to the
/// end angle regardless of the requested direction; every departure this
/// causes is returned as a diagnostic.
fn sample_arc(
    ctx: &KinematicsContext,
    start: &AxisVec,
    end: &AxisVec,
    direction: ArcDirection,
    [i, j]: [f64; 2],
) -> (Vec<AxisVec>, Vec<ArcDiagnostic>) {
    let (cx, cy) = (start[0] + i, start[1] + j);
    let radius = i.hypot(j);
    let angle = |x: f64| ((x - cx) / radius).clamp(-1.0, 1.0).acos();
    let start_t = angle(start[0]);
    let end_t = angle(end[0]);
    let sweep = end_t - start_t;
    let count = ((sweep.abs() / ctx.arc_resolution()).ceil() as usize).max(1);
    debug!(radius, start_t, end_t, count, "splitting arc");

    let positions: Vec<AxisVec> = (1..=count)
        .map(|k| {
            let f = k as f64 / count as f64;
            let t = start_t + sweep * f;
            let mut position = lerp(start, end, f);
            position[0] = cx + radius * t.cos();
            position[1] = cy + radius * t.sin();
            position
        })
        .collect();

    let mut diagnostics = Vec::new();
    let counter_clockwise = direction == ArcDirection::CounterClockwise;
    if sweep != 0.0 && (sweep > 0.0) != counter_clockwise {
        diagnostics.push(ArcDiagnostic::DirectionMismatch { direction, sweep });
    }

    let tolerance = 1e-9 * radius.max(1.0);
    let planar = |a: &AxisVec, b: &AxisVec| (a[0] - b[0]).hypot(a[1] - b[1]);
    if let (Some(first), Some(last)) = (positions.first(), positions.last()) {
        let step = radius * sweep.abs() / count as f64;
        let distance = planar(first, start);
        if distance > step + tolerance {
            diagnostics.push(ArcDiagnostic::StartJump { distance, step });
        }
        let distance = planar(last, end);
        if distance > tolerance {
            diagnostics.push(ArcDiagnostic::EndMiss { distance });
        }
    }

    (positions, diagnostics)
}

fn lerp(start: &AxisVec, end: &AxisVec, f: f64) -> AxisVec {
    std::array::from_fn(|i| start[i] + (end[i] - start[i]) * f)
}

fn sub_request(request: &MotionRequest, position: &AxisVec) -> MotionRequest {
    let targets: AxisTargets = Axis::ALL
        .into_iter()
        .zip(position.iter().copied())
        .collect();
    MotionRequest {
        kind: MoveKind::Absolute,
        targets,
        ..*request
    }
}
