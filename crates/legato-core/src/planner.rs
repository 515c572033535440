//! Single-producer front end of the motion core.
//!
//! The [`Planner`] owns the kinematics context and the segment chain. Requests
//! are validated, decomposed by the segmenter and resolved one sub-request at a
//! time, strictly in submission order, and every finished segment is handed to
//! a [`SegmentSink`].

use crate::{
    axis::{Axis, AxisVec},
    bed::{BedCompensation, CalibrationError},
    chain::{SegmentChain, SegmentId},
    context::KinematicsContext,
    pipeline,
    segment::{MotionRequest, RequestError, Segment},
    segmenter,
};
use tracing::warn;

/// Consumer of finished segments, usually the execution queue
pub trait SegmentSink {
    fn accept(&mut self, segment: &Segment);
}

impl SegmentSink for Vec<Segment> {
    fn accept(&mut self, segment: &Segment) {
        self.push(segment.clone());
    }
}

#[derive(Debug, Clone)]
pub struct Planner {
    ctx: KinematicsContext,
    chain: SegmentChain,
}

impl Planner {
    pub fn new(ctx: KinematicsContext) -> Self {
        Self {
            ctx,
            chain: SegmentChain::new(),
        }
    }

    pub fn context(&self) -> &KinematicsContext {
        &self.ctx
    }

    pub fn chain(&self) -> &SegmentChain {
        &self.chain
    }

    /// Logical position after the last resolved segment
    pub fn position(&self) -> &AxisVec {
        self.chain.tail().end_position()
    }

    /// Resolve `request` and hand each resulting segment to `sink`.
    ///
    /// Returns the handles of the appended segments. Nothing is appended when
    /// the request is rejected.
    pub fn submit<S: SegmentSink + ?Sized>(
        &mut self,
        request: &MotionRequest,
        sink: &mut S,
    ) -> Result<Vec<SegmentId>, RequestError> {
        self.submit_inner(request, sink, false)
    }

    /// Like [`Planner::submit`], with each segment's speed reduced to the
    /// slowest home speed among the axes it moves
    pub fn submit_homing<S: SegmentSink + ?Sized>(
        &mut self,
        request: &MotionRequest,
        sink: &mut S,
    ) -> Result<Vec<SegmentId>, RequestError> {
        self.submit_inner(request, sink, true)
    }

    fn submit_inner<S: SegmentSink + ?Sized>(
        &mut self,
        request: &MotionRequest,
        sink: &mut S,
        homing: bool,
    ) -> Result<Vec<SegmentId>, RequestError> {
        request.validate(&self.ctx)?;

        let parts = segmenter::split(&self.ctx, self.chain.tail(), request);
        let mut ids = Vec::with_capacity(parts.len());
        for part in &parts {
            let id = self.chain.next_id();
            let mut segment = pipeline::resolve(&mut self.ctx, self.chain.tail(), id, part);
            if homing {
                segment.apply_homing_feedrate(&self.ctx);
            }
            if segment.is_contained() {
                warn!(
                    %id,
                    target = ?segment.ideal_end_position(),
                    "unreachable target; segment collapsed to no motion"
                );
            }
            sink.accept(&segment);
            ids.push(self.chain.append(segment));
        }
        Ok(ids)
    }

    /// Release segments the execution queue has consumed
    pub fn release_through(&mut self, id: SegmentId) -> usize {
        self.chain.release_through(id)
    }

    pub fn set_bed_compensation(&mut self, bed: BedCompensation) {
        self.ctx.set_bed_compensation(bed);
    }

    pub fn calibrate_bed(
        &mut self,
        points: &[[f64; 2]],
        heights: &[f64],
    ) -> Result<(), CalibrationError> {
        self.ctx.calibrate_bed(points, heights)
    }

    pub fn reset_backlash(&mut self) {
        self.ctx.reset_backlash();
    }

    pub fn bind_slave(&mut self, slave: Axis, master: Axis) -> Result<(), CalibrationError> {
        self.ctx.bind_slave(slave, master)
    }

    pub fn unbind_slave(&mut self, slave: Axis) -> Option<Axis> {
        self.ctx.unbind_slave(slave)
    }

    pub fn set_tool(&mut self, tool: Axis) -> Result<(), CalibrationError> {
        self.ctx.set_tool(tool)
    }
}
