//! Synthetic live source.
//!
//! Segment and part production is the muxer's job; this module stands in
//! for it with fabricated payloads on a timer so the full serving path can
//! be exercised end-to-end (demos, integration tests, pointing hls.js at a
//! local instance). Nothing here is real media.

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use slip_media::{Part, Segment, StreamInfo};
use slip_server::Playlist;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A fake muxer that emits one part per tick and finalizes a segment every
/// `parts_per_segment` parts.
#[derive(Debug, Clone)]
pub struct SynthSource {
    /// Duration (and tick interval) of every produced part.
    pub part_duration: Duration,
    /// Parts per finalized segment.
    pub parts_per_segment: u32,
    /// Payload bytes per part.
    pub part_size: usize,
}

impl Default for SynthSource {
    fn default() -> Self {
        Self {
            part_duration: Duration::from_millis(200),
            parts_per_segment: 10,
            part_size: 4096,
        }
    }
}

impl SynthSource {
    /// Placeholder initialization segment. A real deployment serves the
    /// muxer's `init.mp4` here.
    pub fn init_segment(&self) -> Bytes {
        Bytes::from_static(b"slipstream-synthetic-init")
    }

    /// Codec metadata matching the fabricated stream: H.264 Baseline SPS,
    /// no audio track.
    pub fn stream_info(&self) -> StreamInfo {
        StreamInfo {
            video_sps: Some(vec![0x67, 0x42, 0xc0, 0x1f]),
            audio_object_type: None,
        }
    }

    /// Produce parts and segments until the token fires.
    pub async fn run(self, playlist: Playlist, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.part_duration);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut next_part_id: u64 = 0;
        let mut next_segment_id: u64 = 0;
        let mut pending: Vec<Arc<Part>> = Vec::new();
        let mut segment_start = Utc::now();

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("synthetic source stopped");
                    return;
                }
                _ = interval.tick() => {}
            }

            // Segments begin at a keyframe.
            let is_independent = pending.is_empty();
            let part = Arc::new(Part::new(
                next_part_id,
                self.part_duration,
                is_independent,
                self.payload(next_part_id),
            ));
            next_part_id += 1;

            pending.push(part.clone());
            playlist.on_part_finalized(part).await;

            if pending.len() as u32 >= self.parts_per_segment {
                let parts = std::mem::take(&mut pending);

                let mut payload = BytesMut::with_capacity(self.part_size * parts.len());
                for p in &parts {
                    payload.extend_from_slice(&p.reader());
                }

                let segment = Segment::new(
                    next_segment_id,
                    segment_start,
                    self.part_duration * self.parts_per_segment,
                    parts,
                    payload.freeze(),
                );
                next_segment_id += 1;

                tracing::debug!(segment = next_segment_id - 1, "synthetic segment finalized");
                playlist.on_segment_finalized(segment).await;
                segment_start = Utc::now();
            }
        }
    }

    fn payload(&self, part_id: u64) -> Bytes {
        // Deterministic filler so byte-level assertions are possible.
        Bytes::from(vec![(part_id % 251) as u8; self.part_size])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slip_server::HlsQuery;

    #[tokio::test]
    async fn synth_feeds_the_playlist() {
        let token = CancellationToken::new();
        let playlist = Playlist::spawn(token.clone(), 3, Box::new(|_| {}));

        let source = SynthSource {
            part_duration: Duration::from_millis(5),
            parts_per_segment: 2,
            part_size: 16,
        };
        let producer = tokio::spawn(source.run(playlist.clone(), token.clone()));

        // Wait for the first finalized segment to make the playlist live.
        let mut live = None;
        for _ in 0..200 {
            let res = playlist.file("stream.m3u8", &HlsQuery::plain()).await;
            if res.status == axum::http::StatusCode::OK {
                live = Some(res);
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let res = live.expect("playlist never became live");

        let body = String::from_utf8(res.body.unwrap().to_vec()).unwrap();
        assert!(body.contains("seg0.mp4"));
        assert!(body.contains("#EXT-X-PRELOAD-HINT:TYPE=PART"));

        token.cancel();
        producer.await.unwrap();
    }

    #[test]
    fn codec_string_is_h264_baseline() {
        let info = SynthSource::default().stream_info();
        assert_eq!(info.codecs(), "avc1.42c01f");
    }
}
