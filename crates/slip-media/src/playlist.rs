//! Media and primary playlist rendering.
//!
//! [`render_media_playlist`] is a pure function of a window snapshot; the
//! actor calls it while holding the state, so every rendering reflects a
//! consistent view. Output is byte-exact: tests assert whole documents.

use crate::segment::{part_name, Part, SegmentOrGap};
use crate::window::SlidingWindow;
use chrono::SecondsFormat;
use std::fmt::Write;
use std::time::Duration;

/// Render the live media playlist (`stream.m3u8`).
pub fn render_media_playlist(window: &SlidingWindow, is_delta_update: bool) -> String {
    let mut out = String::new();

    writeln!(out, "#EXTM3U").unwrap();
    writeln!(out, "#EXT-X-VERSION:9").unwrap();

    // EXTINF, when rounded to the nearest integer, must be <= TARGETDURATION.
    let target_duration = window.target_duration();
    writeln!(out, "#EXT-X-TARGETDURATION:{target_duration}").unwrap();

    // The Skip Boundary must be at least six times the Target Duration.
    let skip_boundary = (target_duration * 6) as f64;
    let part_target = window.part_target_duration().as_secs_f64();

    write!(out, "#EXT-X-SERVER-CONTROL:CAN-BLOCK-RELOAD=YES").unwrap();
    // PART-HOLD-BACK must be at least twice, and should be at least three
    // times, the Part Target Duration.
    write!(out, ",PART-HOLD-BACK={:.5}", part_target * 2.5).unwrap();
    writeln!(out, ",CAN-SKIP-UNTIL={skip_boundary}").unwrap();

    writeln!(out, "#EXT-X-PART-INF:PART-TARGET={part_target}").unwrap();

    writeln!(out, "#EXT-X-MEDIA-SEQUENCE:{}", window.segment_delete_count()).unwrap();

    let mut skipped = 0;
    if is_delta_update {
        // Show only the tail that fits inside the Skip Boundary; everything
        // before it is elided.
        let mut cur_duration = Duration::ZERO;
        let mut shown = 0;
        for sog in window.segments() {
            cur_duration += sog.rendered_duration();
            if cur_duration.as_secs_f64() >= skip_boundary {
                break;
            }
            shown += 1;
        }
        skipped = window.segments().len() - shown;
        writeln!(out, "#EXT-X-SKIP:SKIPPED-SEGMENTS={skipped}").unwrap();
    } else {
        writeln!(out, "#EXT-X-MAP:URI=\"init.mp4\"").unwrap();
    }

    writeln!(out).unwrap();

    let len = window.segments().len();
    for (i, sog) in window.segments().iter().enumerate() {
        if i < skipped {
            continue;
        }

        match sog {
            SegmentOrGap::Segment(seg) => {
                // The last two segments carry their date-time anchor and
                // their part lines.
                if len - i <= 2 {
                    writeln!(
                        out,
                        "#EXT-X-PROGRAM-DATE-TIME:{}",
                        seg.start_time.to_rfc3339_opts(SecondsFormat::Millis, true)
                    )
                    .unwrap();

                    for p in seg.parts() {
                        write_part_line(&mut out, p);
                    }
                }

                writeln!(out, "#EXTINF:{:.5},", seg.rendered_duration.as_secs_f64()).unwrap();
                writeln!(out, "{}.mp4", seg.name()).unwrap();
            }
            SegmentOrGap::Gap(gap) => {
                writeln!(out, "#EXT-X-GAP").unwrap();
                writeln!(out, "#EXTINF:{:.5},", gap.rendered_duration.as_secs_f64()).unwrap();
                writeln!(out, "gap.mp4").unwrap();
            }
        }
    }

    for p in window.next_segment_parts() {
        write_part_line(&mut out, p);
    }

    // The preload hint must always be present; hls.js goes into a reload
    // loop without it.
    writeln!(
        out,
        "#EXT-X-PRELOAD-HINT:TYPE=PART,URI=\"{}.mp4\"",
        part_name(window.next_part_id())
    )
    .unwrap();

    out
}

fn write_part_line(out: &mut String, part: &Part) {
    write!(
        out,
        "#EXT-X-PART:DURATION={:.5},URI=\"{}.mp4\"",
        part.rendered_duration.as_secs_f64(),
        part.name()
    )
    .unwrap();
    if part.is_independent {
        write!(out, ",INDEPENDENT=YES").unwrap();
    }
    writeln!(out).unwrap();
}

/// Codec metadata for the primary playlist.
#[derive(Debug, Clone, Default)]
pub struct StreamInfo {
    /// H.264 sequence parameter set of the video track, if present.
    pub video_sps: Option<Vec<u8>>,
    /// MPEG-4 audio object type of the audio track, if present.
    pub audio_object_type: Option<u8>,
}

impl StreamInfo {
    /// RFC 6381 codec list for `#EXT-X-STREAM-INF`.
    pub fn codecs(&self) -> String {
        let mut codecs = Vec::new();

        if let Some(sps) = &self.video_sps {
            // avc1.PPCCLL: profile, constraint flags, and level straight
            // from SPS bytes 1..4.
            if sps.len() >= 4 {
                let hex: String = sps[1..4].iter().map(|b| format!("{b:02x}")).collect();
                codecs.push(format!("avc1.{hex}"));
            }
        }

        if let Some(object_type) = self.audio_object_type {
            codecs.push(format!("mp4a.40.{object_type}"));
        }

        codecs.join(",")
    }
}

/// Render the primary (multivariant) playlist. Stateless: a pure function
/// of the codec metadata.
pub fn render_primary_playlist(info: &StreamInfo) -> String {
    let mut out = String::new();

    writeln!(out, "#EXTM3U").unwrap();
    writeln!(out, "#EXT-X-VERSION:9").unwrap();
    writeln!(out, "#EXT-X-INDEPENDENT-SEGMENTS").unwrap();
    writeln!(out).unwrap();
    writeln!(
        out,
        "#EXT-X-STREAM-INF:BANDWIDTH=200000,CODECS=\"{}\"",
        info.codecs()
    )
    .unwrap();
    writeln!(out, "stream.m3u8").unwrap();
    writeln!(out).unwrap();

    out
}
