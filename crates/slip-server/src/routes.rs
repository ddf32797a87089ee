//! LL-HLS route handlers.
//!
//! The interesting requests (`stream.m3u8`, `seg*.mp4`, `part*.mp4`) all
//! funnel through [`Playlist::file`], which dispatches into the actor; the
//! handlers here only parse directives and shape HTTP responses. The
//! stateless collaborators (`index.m3u8`, `init.mp4`) are answered directly
//! from the shared context.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use std::collections::HashMap;

use slip_media::render_primary_playlist;

use crate::actor::FileResponse;
use crate::context::AppContext;
use crate::query::HlsQuery;

/// GET /hls/{file}
///
/// `stream.m3u8` (optionally with `_HLS_msn`/`_HLS_part`/`_HLS_skip`
/// directives), `seg<ID>.mp4`, or `part<id>.mp4`.
pub async fn media_file(
    State(ctx): State<AppContext>,
    Path(file): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let query = match HlsQuery::parse(&params) {
        Ok(query) => query,
        Err(e) => {
            tracing::debug!(%file, "bad delivery directives: {e}");
            return status_only(StatusCode::BAD_REQUEST);
        }
    };

    into_response(ctx.playlist.file(&file, &query).await)
}

/// GET /hls/index.m3u8
///
/// The primary playlist; available once the muxer has reported codec info.
pub async fn primary_playlist(State(ctx): State<AppContext>) -> Response {
    let Some(info) = &ctx.stream_info else {
        return status_only(StatusCode::NOT_FOUND);
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "audio/mpegURL")
        .body(Body::from(render_primary_playlist(info)))
        .unwrap()
}

/// GET /hls/init.mp4
pub async fn init_segment(State(ctx): State<AppContext>) -> Response {
    let Some(init) = &ctx.init_segment else {
        return status_only(StatusCode::NOT_FOUND);
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .body(Body::from(init.clone()))
        .unwrap()
}

/// GET /health
pub async fn health_check() -> &'static str {
    "ok"
}

fn status_only(status: StatusCode) -> Response {
    Response::builder()
        .status(status)
        .body(Body::empty())
        .unwrap()
}

fn into_response(res: FileResponse) -> Response {
    let mut builder = Response::builder().status(res.status);
    if let Some(content_type) = res.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder
        .body(Body::from(res.body.unwrap_or_default()))
        .unwrap()
}
