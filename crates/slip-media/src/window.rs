//! The sliding window of segments-or-gaps backing the live playlist.
//!
//! The window owns media-sequence accounting: gap padding on first insert,
//! head eviction once the configured capacity is exceeded, and the name
//! lookup tables for segment and part byte requests. All mutation happens
//! from the playlist actor; this type itself is single-threaded.

use crate::segment::{Gap, Part, Segment, SegmentOrGap};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub struct SlidingWindow {
    segment_count: usize,

    segments: VecDeque<SegmentOrGap>,
    segments_by_name: HashMap<String, Arc<Segment>>,
    /// Parts of the windowed segments, in append order. Only used for
    /// eviction accounting; lookups go through `parts_by_name`.
    parts: VecDeque<Arc<Part>>,
    parts_by_name: HashMap<String, Arc<Part>>,
    segment_delete_count: u64,
    next_segment_id: u64,
    /// Finalized parts awaiting adoption by the upcoming segment.
    next_segment_parts: Vec<Arc<Part>>,
    next_part_id: u64,
}

impl SlidingWindow {
    pub fn new(segment_count: usize) -> Self {
        Self {
            segment_count,
            segments: VecDeque::new(),
            segments_by_name: HashMap::new(),
            parts: VecDeque::new(),
            parts_by_name: HashMap::new(),
            segment_delete_count: 0,
            next_segment_id: 0,
            next_segment_parts: Vec::new(),
            next_part_id: 0,
        }
    }

    pub fn has_content(&self) -> bool {
        !self.segments.is_empty()
    }

    pub fn segments(&self) -> &VecDeque<SegmentOrGap> {
        &self.segments
    }

    pub fn next_segment_parts(&self) -> &[Arc<Part>] {
        &self.next_segment_parts
    }

    pub fn next_segment_id(&self) -> u64 {
        self.next_segment_id
    }

    pub fn next_part_id(&self) -> u64 {
        self.next_part_id
    }

    /// Number of head evictions so far; equals `#EXT-X-MEDIA-SEQUENCE`.
    pub fn segment_delete_count(&self) -> u64 {
        self.segment_delete_count
    }

    pub fn segment(&self, name: &str) -> Option<&Arc<Segment>> {
        self.segments_by_name.get(name)
    }

    pub fn part(&self, name: &str) -> Option<&Arc<Part>> {
        self.parts_by_name.get(name)
    }

    /// Absorb a finalized part. It stays in `next_segment_parts` until the
    /// owning segment is finalized.
    pub fn push_part(&mut self, part: Arc<Part>) {
        debug_assert!(part.id >= self.next_part_id);

        self.parts_by_name.insert(part.name(), part.clone());
        self.next_part_id = part.id + 1;
        self.next_segment_parts.push(part);
    }

    /// Absorb a finalized segment: pad with gaps on first insert, adopt the
    /// pending parts, and evict the head once over capacity.
    pub fn push_segment(&mut self, segment: Arc<Segment>) {
        debug_assert!(segment.id >= self.next_segment_id);

        // Initial gap padding, so media-sequence alignment behaves before
        // real history exists. Gaps carry this segment's duration.
        if self.segments.is_empty() {
            for _ in 0..self.segment_count {
                self.segments.push_back(SegmentOrGap::Gap(Gap {
                    rendered_duration: segment.rendered_duration,
                }));
            }
        }

        self.segments_by_name.insert(segment.name(), segment.clone());
        for part in segment.parts() {
            self.parts.push_back(part.clone());
        }
        self.segments.push_back(SegmentOrGap::Segment(segment.clone()));
        self.next_segment_id = segment.id + 1;
        self.next_segment_parts.clear();

        if self.segments.len() > self.segment_count {
            let to_delete = self.segments.pop_front();

            if let Some(SegmentOrGap::Segment(seg)) = to_delete {
                for part in seg.parts() {
                    self.parts_by_name.remove(&part.name());
                }
                self.parts.drain(..seg.parts().len());
                self.segments_by_name.remove(&seg.name());
            }
            self.segment_delete_count += 1;
        }

        debug_assert!(self.segments.len() <= self.segment_count);
    }

    /// Whether the playlist already contains the given (media sequence,
    /// part index) position.
    ///
    /// A part index past the final part of its parent segment is treated as
    /// a request for part 0 of the following segment.
    pub fn has_part(&self, mut segment_id: u64, mut part_id: u64) -> bool {
        if !self.has_content() {
            return false;
        }

        for sog in &self.segments {
            let SegmentOrGap::Segment(seg) = sog else {
                continue;
            };

            if segment_id != seg.id {
                continue;
            }

            if part_id >= seg.parts().len() as u64 {
                segment_id += 1;
                part_id = 0;
                continue;
            }

            return true;
        }

        if segment_id != self.next_segment_id {
            return false;
        }

        part_id < self.next_segment_parts.len() as u64
    }

    /// `#EXT-X-TARGETDURATION`: the largest segment duration, rounded to the
    /// nearest whole second. Every rounded `#EXTINF` must stay at or below it.
    pub fn target_duration(&self) -> u64 {
        self.segments
            .iter()
            .map(|sog| sog.rendered_duration().as_secs_f64().round() as u64)
            .max()
            .unwrap_or(0)
    }

    /// `PART-TARGET`: the largest part duration, over the windowed segments
    /// and the not-yet-adopted parts.
    pub fn part_target_duration(&self) -> Duration {
        let mut ret = Duration::ZERO;

        for sog in &self.segments {
            let SegmentOrGap::Segment(seg) = sog else {
                continue;
            };
            for part in seg.parts() {
                ret = ret.max(part.rendered_duration);
            }
        }

        for part in &self.next_segment_parts {
            ret = ret.max(part.rendered_duration);
        }

        ret
    }
}
