//! Shared test harness for integration tests.
//!
//! Spawns the playlist actor and the Axum router on a random port so tests
//! can drive the full HTTP surface with reqwest, while feeding segments and
//! parts directly through the muxer-facing callbacks.

#![allow(dead_code)]

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use slip_media::{Part, Segment, StreamInfo};
use slip_server::{AppContext, HlsQuery, Playlist};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct TestHarness {
    pub playlist: Playlist,
    pub token: CancellationToken,
}

impl TestHarness {
    /// Spawn the actor alone, without an HTTP server.
    pub fn new(segment_count: usize) -> Self {
        let token = CancellationToken::new();
        let playlist = Playlist::spawn(token.clone(), segment_count, Box::new(|_| {}));
        Self { playlist, token }
    }

    /// Spawn the actor plus the full router on a random port.
    pub async fn with_server(segment_count: usize) -> (Self, SocketAddr) {
        let harness = Self::new(segment_count);

        let ctx = AppContext {
            playlist: harness.playlist.clone(),
            stream_info: Some(StreamInfo {
                video_sps: Some(vec![0x67, 0x64, 0x00, 0x16]),
                audio_object_type: Some(2),
            }),
            init_segment: Some(Bytes::from_static(b"init-bytes")),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(slip_server::serve(listener, ctx, harness.token.clone()));

        (harness, addr)
    }

    /// Finalize a part and hand back the Arc for later segment adoption.
    pub async fn finalize_part(&self, id: u64, millis: u64, independent: bool) -> Arc<Part> {
        let part = Arc::new(Part::new(
            id,
            Duration::from_millis(millis),
            independent,
            Bytes::from(format!("part-{id}-payload")),
        ));
        self.playlist.on_part_finalized(part.clone()).await;
        part
    }

    /// Finalize a segment adopting the given parts.
    pub async fn finalize_segment(&self, id: u64, secs: u64, parts: Vec<Arc<Part>>) {
        let segment = Segment::new(
            id,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, id as u32).unwrap(),
            Duration::from_secs(secs),
            parts,
            Bytes::from(format!("segment-{id}-payload")),
        );
        self.playlist.on_segment_finalized(segment).await;
    }

    /// Non-blocking playlist fetch straight through the dispatcher.
    pub async fn plain_playlist(&self) -> slip_server::FileResponse {
        self.playlist.file("stream.m3u8", &HlsQuery::plain()).await
    }
}

/// GET a path and return (status, body-as-string).
pub async fn get(addr: SocketAddr, path_and_query: &str) -> (u16, String) {
    let resp = reqwest::get(format!("http://{addr}{path_and_query}"))
        .await
        .expect("request failed");
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    (status, body)
}

/// GET a path and return (status, content-type, raw body).
pub async fn get_raw(addr: SocketAddr, path_and_query: &str) -> (u16, Option<String>, Bytes) {
    let resp = reqwest::get(format!("http://{addr}{path_and_query}"))
        .await
        .expect("request failed");
    let status = resp.status().as_u16();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = resp.bytes().await.unwrap_or_default();
    (status, content_type, body)
}
