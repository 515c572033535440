//! Arena of resolved segments.
//!
//! Segments are addressed by a monotonically increasing [`SegmentId`] and only
//! point backwards at their predecessor. The execution consumer releases
//! segments it has finished with; the tail is always retained so the next
//! segment has something to resolve against.

use crate::segment::Segment;
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fmt, iter};

/// Handle to a segment in a [`SegmentChain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(u64);

impl SegmentId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct SegmentChain {
    // retained segments older than the tail, oldest first
    history: VecDeque<Segment>,
    tail: Segment,
}

impl Default for SegmentChain {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentChain {
    /// A chain holding only the origin: a reset at all-zero position
    pub fn new() -> Self {
        Self {
            history: VecDeque::new(),
            tail: Segment::origin(SegmentId::new(0)),
        }
    }

    /// The most recent segment; the predecessor of the next one
    pub fn tail(&self) -> &Segment {
        &self.tail
    }

    /// Handle the next appended segment receives
    pub fn next_id(&self) -> SegmentId {
        self.tail.id.next()
    }

    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        if id == self.tail.id {
            return Some(&self.tail);
        }
        let front = self.history.front()?.id;
        let offset = id.get().checked_sub(front.get())?;
        self.history.get(usize::try_from(offset).ok()?)
    }

    /// Retained segments, oldest first, ending with the tail
    pub fn iter(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.history.iter().chain(iter::once(&self.tail))
    }

    /// Number of retained segments, tail included
    pub fn retained(&self) -> usize {
        self.history.len() + 1
    }

    pub(crate) fn append(&mut self, segment: Segment) -> SegmentId {
        debug_assert_eq!(segment.id, self.next_id());
        debug_assert_eq!(segment.prev, Some(self.tail.id));
        let id = segment.id;
        let prev = std::mem::replace(&mut self.tail, segment);
        self.history.push_back(prev);
        id
    }

    /// Drop every segment up to and including `id`, except the tail.
    ///
    /// Returns how many segments were released.
    pub fn release_through(&mut self, id: SegmentId) -> usize {
        let mut released = 0;
        while self.history.front().is_some_and(|s| s.id <= id) {
            self.history.pop_front();
            released += 1;
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(chain: &mut SegmentChain) -> SegmentId {
        let mut segment = Segment::origin(chain.next_id());
        segment.prev = Some(chain.tail().id());
        chain.append(segment)
    }

    #[test]
    fn starts_with_origin() {
        let chain = SegmentChain::new();
        assert_eq!(chain.tail().id(), SegmentId::new(0));
        assert!(chain.tail().is_reset());
        assert_eq!(chain.tail().end_position(), &[0.0; 8]);
        assert_eq!(chain.retained(), 1);
    }

    #[test]
    fn handles_are_stable_across_release() {
        let mut chain = SegmentChain::new();
        let ids: Vec<_> = (0..4).map(|_| push(&mut chain)).collect();
        assert_eq!(ids, (1..=4).map(SegmentId::new).collect::<Vec<_>>());
        assert_eq!(chain.retained(), 5);

        assert_eq!(chain.release_through(ids[1]), 3);
        assert!(chain.get(ids[1]).is_none());
        assert!(chain.get(SegmentId::new(0)).is_none());
        assert_eq!(chain.get(ids[2]).map(Segment::id), Some(ids[2]));
        assert_eq!(chain.get(ids[3]).map(Segment::id), Some(ids[3]));
        assert!(chain.get(SegmentId::new(9)).is_none());
    }

    #[test]
    fn tail_is_never_released() {
        let mut chain = SegmentChain::new();
        let last = push(&mut chain);
        chain.release_through(last);
        assert_eq!(chain.retained(), 1);
        assert_eq!(chain.tail().id(), last);
        assert_eq!(chain.next_id(), SegmentId::new(2));
        assert_eq!(chain.iter().count(), 1);
    }
}
