//! slip-media: the LL-HLS media model.
//!
//! Value objects for finalized segments and parts, the sliding window that
//! tracks the live playlist contents, and the pure playlist renderers.
//! Everything here is synchronous and side-effect free; ownership of the
//! mutable window belongs to the actor in slip-server.

pub mod playlist;
pub mod segment;
pub mod window;

pub use playlist::{render_media_playlist, render_primary_playlist, StreamInfo};
pub use segment::{part_name, Gap, Part, Segment, SegmentOrGap};
pub use window::SlidingWindow;
