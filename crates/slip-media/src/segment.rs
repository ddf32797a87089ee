//! Finalized segment and part value objects.
//!
//! These are produced by the muxer and handed to the playlist actor; once
//! constructed they are immutable. Payloads are [`Bytes`] so every request
//! gets an independent, zero-copy reader.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Playlist file name (without extension) for the part with the given ID.
pub fn part_name(id: u64) -> String {
    format!("part{id}")
}

/// A finalized partial segment.
///
/// Part IDs increase monotonically across the whole stream, not per parent
/// segment.
#[derive(Debug)]
pub struct Part {
    /// Globally monotonic part identifier assigned by the muxer.
    pub id: u64,
    /// Wall-clock duration covered by this part.
    pub rendered_duration: Duration,
    /// True iff the part starts with a keyframe and is safe to join at.
    pub is_independent: bool,
    payload: Bytes,
}

impl Part {
    pub fn new(id: u64, rendered_duration: Duration, is_independent: bool, payload: Bytes) -> Self {
        Self {
            id,
            rendered_duration,
            is_independent,
            payload,
        }
    }

    /// Playlist file name without the `.mp4` extension.
    pub fn name(&self) -> String {
        part_name(self.id)
    }

    /// A fresh, independent reader over the part bytes.
    pub fn reader(&self) -> Bytes {
        self.payload.clone()
    }
}

/// A finalized media segment and the parts it was assembled from.
#[derive(Debug)]
pub struct Segment {
    /// Monotonic media sequence number assigned by the muxer.
    pub id: u64,
    /// Wall-clock timestamp of the first media sample.
    pub start_time: DateTime<Utc>,
    /// Total duration; the part durations sum to this within rounding.
    pub rendered_duration: Duration,
    parts: Vec<Arc<Part>>,
    payload: Bytes,
}

impl Segment {
    pub fn new(
        id: u64,
        start_time: DateTime<Utc>,
        rendered_duration: Duration,
        parts: Vec<Arc<Part>>,
        payload: Bytes,
    ) -> Self {
        Self {
            id,
            start_time,
            rendered_duration,
            parts,
            payload,
        }
    }

    /// Playlist file name without the `.mp4` extension.
    pub fn name(&self) -> String {
        format!("seg{}", self.id)
    }

    /// The parts this segment adopted, in order.
    pub fn parts(&self) -> &[Arc<Part>] {
        &self.parts
    }

    /// A fresh, independent reader over the segment bytes.
    pub fn reader(&self) -> Bytes {
        self.payload.clone()
    }
}

/// Duration placeholder inserted before real history exists, so that
/// media-sequence numbering lines up for clients that join early.
#[derive(Debug, Clone, Copy)]
pub struct Gap {
    pub rendered_duration: Duration,
}

/// One slot of the sliding window: either a real segment or a gap.
#[derive(Debug, Clone)]
pub enum SegmentOrGap {
    Segment(Arc<Segment>),
    Gap(Gap),
}

impl SegmentOrGap {
    pub fn rendered_duration(&self) -> Duration {
        match self {
            SegmentOrGap::Segment(seg) => seg.rendered_duration,
            SegmentOrGap::Gap(gap) => gap.rendered_duration,
        }
    }
}
