//! Shared handler state.

use bytes::Bytes;
use slip_media::StreamInfo;

use crate::actor::Playlist;

/// State shared by every route handler.
#[derive(Clone)]
pub struct AppContext {
    /// Handle to the playlist actor.
    pub playlist: Playlist,
    /// Codec metadata for the primary playlist, once the muxer knows it.
    pub stream_info: Option<StreamInfo>,
    /// The `init.mp4` initialization segment produced by the muxer.
    pub init_segment: Option<Bytes>,
}
