//! JSON view of resolved segments for the execution queue and the CLI.

use legato_core::{AXIS_COUNT, Axis, KinematicsContext, Segment, SegmentSink, StepDirection};
use serde::Serialize;
use std::collections::BTreeMap;

/// One finished segment, restricted to the active axes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentReport {
    pub id: u64,
    pub prev: Option<u64>,
    pub kind: &'static str,
    pub start: BTreeMap<Axis, f64>,
    pub end: BTreeMap<Axis, f64>,
    pub steps: BTreeMap<Axis, u64>,
    pub directions: BTreeMap<Axis, StepDirection>,
    pub speed: Option<f64>,
    pub acceleration: Option<f64>,
    pub cancelable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compensation: Option<BTreeMap<Axis, f64>>,
    pub contained: bool,
}

impl SegmentReport {
    pub fn new(segment: &Segment, active: &[bool; AXIS_COUNT]) -> Self {
        Self {
            id: segment.id().get(),
            prev: segment.prev().map(|id| id.get()),
            kind: segment.kind().name(),
            start: per_axis(segment.start_position(), active),
            end: per_axis(segment.end_position(), active),
            steps: per_axis(segment.steps(), active),
            directions: per_axis(segment.directions(), active),
            speed: segment.speed(),
            acceleration: segment.acceleration(),
            cancelable: segment.is_cancelable(),
            compensation: segment.compensation().map(|c| per_axis(c, active)),
            contained: segment.is_contained(),
        }
    }
}

fn per_axis<T: Copy>(values: &[T; AXIS_COUNT], active: &[bool; AXIS_COUNT]) -> BTreeMap<Axis, T> {
    Axis::ALL
        .into_iter()
        .filter(|axis| active[axis.index()])
        .map(|axis| (axis, values[axis.index()]))
        .collect()
}

/// Collects a [`SegmentReport`] for every accepted segment
#[derive(Debug, Clone)]
pub struct ReportSink {
    active: [bool; AXIS_COUNT],
    reports: Vec<SegmentReport>,
}

impl ReportSink {
    pub fn new(ctx: &KinematicsContext) -> Self {
        Self {
            active: Axis::ALL.map(|a| ctx.is_active(a)),
            reports: Vec::new(),
        }
    }

    pub fn reports(&self) -> &[SegmentReport] {
        &self.reports
    }

    pub fn into_reports(self) -> Vec<SegmentReport> {
        self.reports
    }
}

impl SegmentSink for ReportSink {
    fn accept(&mut self, segment: &Segment) {
        self.reports.push(SegmentReport::new(segment, &self.active));
    }
}
