//! The playlist actor: single owner of all live playlist state.
//!
//! Every interaction (playlist polls, byte fetches, blocking reloads, muxer
//! finalize callbacks) is a message into one task that mutates the sliding
//! window and answers over per-request oneshot channels. Blocking
//! requests are parked inside the actor until a finalize event satisfies
//! them; cancellation drains every parked request with a 500.

use axum::http::StatusCode;
use bytes::Bytes;
use slip_media::{part_name, render_media_playlist, Part, Segment, SegmentOrGap, SlidingWindow};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::query::HlsQuery;

const CONTENT_TYPE_PLAYLIST: &str = "audio/mpegURL";
const CONTENT_TYPE_MP4: &str = "video/mp4";

/// Invoked after every segment finalize with the updated window, e.g. for
/// external storage pruning. Runs on the actor task; it must not block.
pub type SegmentFinalizedHook = Box<dyn Fn(&VecDeque<SegmentOrGap>) + Send>;

/// Status, content type, and body of a served muxer file.
#[derive(Debug, Clone)]
pub struct FileResponse {
    pub status: StatusCode,
    pub content_type: Option<&'static str>,
    pub body: Option<Bytes>,
}

impl FileResponse {
    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            content_type: None,
            body: None,
        }
    }

    fn bad_request() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            content_type: None,
            body: None,
        }
    }

    /// The request was cut short by shutdown.
    fn cancelled() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            content_type: None,
            body: None,
        }
    }

    fn playlist(body: String) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some(CONTENT_TYPE_PLAYLIST),
            body: Some(Bytes::from(body)),
        }
    }

    fn mp4(body: Bytes) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some(CONTENT_TYPE_MP4),
            body: Some(body),
        }
    }
}

enum Request {
    Playlist(PlaylistRequest),
    SegmentBytes(SegmentBytesRequest),
    BlockingPlaylist(BlockingPlaylistRequest),
    BlockingPart(BlockingPartRequest),
    SegmentFinalized(SegmentFinalizedRequest),
    PartFinalized(PartFinalizedRequest),
}

struct PlaylistRequest {
    is_delta_update: bool,
    res_tx: oneshot::Sender<FileResponse>,
}

struct SegmentBytesRequest {
    name: String,
    res_tx: oneshot::Sender<FileResponse>,
}

struct BlockingPlaylistRequest {
    is_delta_update: bool,
    msn: u64,
    part: u64,
    res_tx: oneshot::Sender<FileResponse>,
}

struct BlockingPartRequest {
    /// URL basename with the `.mp4` extension already trimmed.
    part_name: String,
    /// Set when parked: the part ID whose finalize satisfies this request.
    expected_part_id: u64,
    res_tx: oneshot::Sender<FileResponse>,
}

struct SegmentFinalizedRequest {
    segment: Arc<Segment>,
    done_tx: oneshot::Sender<()>,
}

struct PartFinalizedRequest {
    part: Arc<Part>,
    done_tx: oneshot::Sender<()>,
}

/// Handle to the playlist actor. Cheap to clone; all methods are async
/// message exchanges with the actor task.
#[derive(Clone)]
pub struct Playlist {
    tx: mpsc::Sender<Request>,
    token: CancellationToken,
}

impl Playlist {
    /// Spawn the actor task and return a handle to it.
    pub fn spawn(
        token: CancellationToken,
        segment_count: usize,
        on_segment_finalized_hook: SegmentFinalizedHook,
    ) -> Self {
        let (tx, rx) = mpsc::channel(1);

        let actor = Actor {
            window: SlidingWindow::new(segment_count),
            pending_playlists: Vec::new(),
            pending_parts: Vec::new(),
            on_segment_finalized_hook,
            token: token.clone(),
        };
        tokio::spawn(actor.run(rx));

        Self { tx, token }
    }

    /// Serve a muxer file by URL basename.
    ///
    /// `stream.m3u8` is the media playlist (blocking when `_HLS_msn` is
    /// given); `seg*.mp4` are segment bytes; `part*.mp4` are part bytes and
    /// block on the announced next part. Everything else is a 404.
    pub async fn file(&self, name: &str, query: &HlsQuery) -> FileResponse {
        if name == "stream.m3u8" {
            return self.playlist_response(query).await;
        }

        if let Some(base) = name.strip_suffix(".mp4") {
            if base.starts_with("seg") {
                let name = base.to_owned();
                return self
                    .roundtrip(|res_tx| {
                        Request::SegmentBytes(SegmentBytesRequest { name, res_tx })
                    })
                    .await;
            }

            if base.starts_with("part") {
                let part_name = base.to_owned();
                return self
                    .roundtrip(|res_tx| {
                        Request::BlockingPart(BlockingPartRequest {
                            part_name,
                            expected_part_id: 0,
                            res_tx,
                        })
                    })
                    .await;
            }
        }

        FileResponse::not_found()
    }

    async fn playlist_response(&self, query: &HlsQuery) -> FileResponse {
        let is_delta_update = query.is_delta_update;

        if let Some((msn, part)) = query.msn_and_part {
            return self
                .roundtrip(|res_tx| {
                    Request::BlockingPlaylist(BlockingPlaylistRequest {
                        is_delta_update,
                        msn,
                        part,
                        res_tx,
                    })
                })
                .await;
        }

        self.roundtrip(|res_tx| {
            Request::Playlist(PlaylistRequest {
                is_delta_update,
                res_tx,
            })
        })
        .await
    }

    /// Absorb a finalized segment. Blocks the producer until the actor has
    /// fully applied it; returns silently on shutdown.
    pub async fn on_segment_finalized(&self, segment: Segment) {
        let (done_tx, done_rx) = oneshot::channel();
        let req = Request::SegmentFinalized(SegmentFinalizedRequest {
            segment: Arc::new(segment),
            done_tx,
        });

        tokio::select! {
            _ = self.token.cancelled() => return,
            res = self.tx.send(req) => {
                if res.is_err() {
                    return;
                }
            }
        }
        let _ = done_rx.await;
    }

    /// Absorb a finalized part. Blocks the producer until the actor has
    /// fully applied it; returns silently on shutdown. The same `Arc` is
    /// expected in the parts of the owning segment once that finalizes.
    pub async fn on_part_finalized(&self, part: Arc<Part>) {
        let (done_tx, done_rx) = oneshot::channel();
        let req = Request::PartFinalized(PartFinalizedRequest { part, done_tx });

        tokio::select! {
            _ = self.token.cancelled() => return,
            res = self.tx.send(req) => {
                if res.is_err() {
                    return;
                }
            }
        }
        let _ = done_rx.await;
    }

    async fn roundtrip(
        &self,
        make_request: impl FnOnce(oneshot::Sender<FileResponse>) -> Request,
    ) -> FileResponse {
        let (res_tx, res_rx) = oneshot::channel();
        let req = make_request(res_tx);

        tokio::select! {
            _ = self.token.cancelled() => return FileResponse::cancelled(),
            res = self.tx.send(req) => {
                if res.is_err() {
                    return FileResponse::cancelled();
                }
            }
        }

        match res_rx.await {
            Ok(res) => res,
            Err(_) => FileResponse::cancelled(),
        }
    }
}

struct Actor {
    window: SlidingWindow,
    pending_playlists: Vec<BlockingPlaylistRequest>,
    pending_parts: Vec<BlockingPartRequest>,
    on_segment_finalized_hook: SegmentFinalizedHook,
    token: CancellationToken,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::Receiver<Request>) {
        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                req = rx.recv() => match req {
                    Some(req) => self.handle(req),
                    // All handles dropped.
                    None => break,
                },
            }
        }
        self.drain_pending();
    }

    fn handle(&mut self, req: Request) {
        match req {
            Request::Playlist(req) => {
                if !self.window.has_content() {
                    let _ = req.res_tx.send(FileResponse::not_found());
                    return;
                }
                let body = render_media_playlist(&self.window, req.is_delta_update);
                let _ = req.res_tx.send(FileResponse::playlist(body));
            }

            Request::SegmentBytes(req) => {
                let res = match self.window.segment(&req.name) {
                    Some(segment) => FileResponse::mp4(segment.reader()),
                    None => FileResponse::not_found(),
                };
                let _ = req.res_tx.send(res);
            }

            Request::BlockingPlaylist(req) => {
                // If the _HLS_msn is greater than the Media Sequence Number
                // of the last Media Segment in the current Playlist plus
                // two, the server SHOULD immediately return Bad Request.
                // next_segment_id is already one past the last segment.
                if req.msn > self.window.next_segment_id() + 1 {
                    let _ = req.res_tx.send(FileResponse::bad_request());
                    return;
                }

                if !self.window.has_content() || !self.window.has_part(req.msn, req.part) {
                    tracing::debug!(msn = req.msn, part = req.part, "parking playlist request");
                    self.pending_playlists.push(req);
                    return;
                }

                let body = render_media_playlist(&self.window, req.is_delta_update);
                let _ = req.res_tx.send(FileResponse::playlist(body));
            }

            Request::BlockingPart(mut req) => {
                if let Some(part) = self.window.part(&req.part_name) {
                    let _ = req.res_tx.send(FileResponse::mp4(part.reader()));
                    return;
                }

                if req.part_name == part_name(self.window.next_part_id()) {
                    req.expected_part_id = self.window.next_part_id();
                    tracing::debug!(part = %req.part_name, "parking part request");
                    self.pending_parts.push(req);
                    return;
                }

                let _ = req.res_tx.send(FileResponse::not_found());
            }

            Request::SegmentFinalized(req) => {
                self.window.push_segment(req.segment);
                (self.on_segment_finalized_hook)(self.window.segments());
                self.check_pending();
                let _ = req.done_tx.send(());
            }

            Request::PartFinalized(req) => {
                self.window.push_part(req.part);
                self.check_pending();
                let _ = req.done_tx.send(());
            }
        }
    }

    /// Re-check every parked request after a state change. Each satisfied
    /// waiter gets exactly one reply.
    fn check_pending(&mut self) {
        if self.window.has_content() {
            let mut i = 0;
            while i < self.pending_playlists.len() {
                let req = &self.pending_playlists[i];
                if self.window.has_part(req.msn, req.part) {
                    let req = self.pending_playlists.swap_remove(i);
                    let body = render_media_playlist(&self.window, req.is_delta_update);
                    let _ = req.res_tx.send(FileResponse::playlist(body));
                } else {
                    i += 1;
                }
            }
        }

        let mut i = 0;
        while i < self.pending_parts.len() {
            if self.window.next_part_id() <= self.pending_parts[i].expected_part_id {
                i += 1;
                continue;
            }

            let req = self.pending_parts.swap_remove(i);
            match self.window.part(&req.part_name) {
                Some(part) => {
                    let _ = req.res_tx.send(FileResponse::mp4(part.reader()));
                }
                None => {
                    tracing::error!(part = %req.part_name, "awaited part missing from lookup table");
                    let _ = req.res_tx.send(FileResponse::cancelled());
                }
            }
        }
    }

    fn drain_pending(&mut self) {
        for req in self.pending_playlists.drain(..) {
            let _ = req.res_tx.send(FileResponse::cancelled());
        }
        for req in self.pending_parts.drain(..) {
            let _ = req.res_tx.send(FileResponse::cancelled());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn new_playlist(segment_count: usize) -> (Playlist, CancellationToken) {
        let token = CancellationToken::new();
        let playlist = Playlist::spawn(token.clone(), segment_count, Box::new(|_| {}));
        (playlist, token)
    }

    fn part(id: u64, payload: &'static [u8]) -> Part {
        Part::new(id, Duration::from_millis(250), true, Bytes::from_static(payload))
    }

    fn segment(id: u64, parts: Vec<Arc<Part>>, payload: &'static [u8]) -> Segment {
        Segment::new(
            id,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            Duration::from_secs(2),
            parts,
            Bytes::from_static(payload),
        )
    }

    async fn file(playlist: &Playlist, name: &str) -> FileResponse {
        playlist.file(name, &HlsQuery::plain()).await
    }

    async fn blocking_file(playlist: &Playlist, msn: u64, part: u64) -> FileResponse {
        let query = HlsQuery {
            msn_and_part: Some((msn, part)),
            is_delta_update: false,
        };
        playlist.file("stream.m3u8", &query).await
    }

    #[tokio::test]
    async fn empty_window_playlist_is_not_found() {
        let (playlist, _token) = new_playlist(3);
        let res = file(&playlist, "stream.m3u8").await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_names_are_not_found() {
        let (playlist, _token) = new_playlist(3);
        for name in ["other.m3u8", "seg0.txt", "init.mp4", "x.mp4"] {
            let res = file(&playlist, name).await;
            assert_eq!(res.status, StatusCode::NOT_FOUND, "{name}");
        }
    }

    #[tokio::test]
    async fn segment_bytes_roundtrip_until_eviction() {
        let (playlist, _token) = new_playlist(3);

        playlist
            .on_segment_finalized(segment(0, Vec::new(), b"seg0-bytes"))
            .await;

        let res = file(&playlist, "seg0.mp4").await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.content_type, Some("video/mp4"));
        assert_eq!(res.body.unwrap(), Bytes::from_static(b"seg0-bytes"));

        // Three more finalizes push seg0 out of the window.
        for id in 1..4 {
            playlist
                .on_segment_finalized(segment(id, Vec::new(), b"x"))
                .await;
        }
        let res = file(&playlist, "seg0.mp4").await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn playlist_serves_after_first_segment() {
        let (playlist, _token) = new_playlist(3);
        playlist
            .on_segment_finalized(segment(0, Vec::new(), b"s"))
            .await;

        let res = file(&playlist, "stream.m3u8").await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.content_type, Some("audio/mpegURL"));
        let body = String::from_utf8(res.body.unwrap().to_vec()).unwrap();
        assert!(body.contains("seg0.mp4"));
        assert!(body.contains("#EXT-X-GAP"));
    }

    #[tokio::test]
    async fn msn_beyond_horizon_is_bad_request() {
        let (playlist, _token) = new_playlist(3);
        playlist
            .on_segment_finalized(segment(0, Vec::new(), b"s"))
            .await;

        // next_segment_id is 1; msn 3 exceeds the allowed horizon of 2.
        let res = blocking_file(&playlist, 3, 0).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn blocking_playlist_immediate_when_available() {
        let (playlist, _token) = new_playlist(3);
        let p0 = Arc::new(part(0, b"p0"));
        playlist.on_part_finalized(p0.clone()).await;
        playlist
            .on_segment_finalized(segment(0, vec![p0], b"s"))
            .await;

        let res = blocking_file(&playlist, 0, 0).await;
        assert_eq!(res.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn blocking_playlist_parks_until_satisfied() {
        let (playlist, _token) = new_playlist(3);
        playlist
            .on_segment_finalized(segment(0, Vec::new(), b"s"))
            .await;

        // Ask for the upcoming segment's first part.
        let waiter = {
            let playlist = playlist.clone();
            tokio::spawn(async move { blocking_file(&playlist, 1, 0).await })
        };

        // Give the waiter time to park.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        playlist.on_part_finalized(Arc::new(part(0, b"p0"))).await;

        let res = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(res.status, StatusCode::OK);
        let body = String::from_utf8(res.body.unwrap().to_vec()).unwrap();
        assert!(body.contains("part0.mp4"));
    }

    #[tokio::test]
    async fn part_index_rolls_over_to_next_segment() {
        let (playlist, _token) = new_playlist(3);
        let parts: Vec<Arc<Part>> = (0..3).map(|id| Arc::new(part(id, b"p"))).collect();
        for p in &parts {
            playlist.on_part_finalized(p.clone()).await;
        }
        playlist.on_segment_finalized(segment(0, parts, b"s")).await;

        // Part 5 of segment 0 rolls to part 0 of segment 1, which does not
        // exist yet: the request parks.
        let waiter = {
            let playlist = playlist.clone();
            tokio::spawn(async move { blocking_file(&playlist, 0, 5).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        playlist.on_part_finalized(Arc::new(part(3, b"p3"))).await;
        let res = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(res.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn blocking_part_handoff() {
        let (playlist, _token) = new_playlist(3);
        playlist.on_part_finalized(Arc::new(part(0, b"p0"))).await;

        // part1 is the announced next part: the request parks until it is
        // finalized.
        let waiter = {
            let playlist = playlist.clone();
            tokio::spawn(async move { file(&playlist, "part1.mp4").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        playlist.on_part_finalized(Arc::new(part(1, b"p1-bytes"))).await;

        let res = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body.unwrap(), Bytes::from_static(b"p1-bytes"));
    }

    #[tokio::test]
    async fn part_neither_known_nor_next_is_not_found() {
        let (playlist, _token) = new_playlist(3);
        playlist.on_part_finalized(Arc::new(part(0, b"p0"))).await;

        // Known part is served directly.
        let res = file(&playlist, "part0.mp4").await;
        assert_eq!(res.status, StatusCode::OK);

        // part5 is far beyond the announced next part.
        let res = file(&playlist, "part5.mp4").await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancellation_drains_parked_requests() {
        let (playlist, token) = new_playlist(3);
        playlist
            .on_segment_finalized(segment(0, Vec::new(), b"s"))
            .await;

        let playlist_waiter = {
            let playlist = playlist.clone();
            tokio::spawn(async move { blocking_file(&playlist, 1, 0).await })
        };
        let part_waiter = {
            let playlist = playlist.clone();
            tokio::spawn(async move { file(&playlist, "part0.mp4").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        token.cancel();

        for waiter in [playlist_waiter, part_waiter] {
            let res = tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[tokio::test]
    async fn hook_sees_every_finalize() {
        let (hook_tx, mut hook_rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let playlist = Playlist::spawn(
            token,
            3,
            Box::new(move |segments| {
                let _ = hook_tx.send(segments.len());
            }),
        );

        playlist
            .on_segment_finalized(segment(0, Vec::new(), b"s"))
            .await;
        playlist
            .on_segment_finalized(segment(1, Vec::new(), b"s"))
            .await;

        assert_eq!(hook_rx.recv().await, Some(3));
        assert_eq!(hook_rx.recv().await, Some(3));
    }
}
