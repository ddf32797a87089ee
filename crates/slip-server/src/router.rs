//! Axum router construction.

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // The stateless collaborators get their own routes; everything else
    // under /hls dispatches by file name through the actor.
    let hls = Router::new()
        .route("/index.m3u8", get(routes::primary_playlist))
        .route("/init.mp4", get(routes::init_segment))
        .route("/{file}", get(routes::media_file));

    Router::new()
        .route("/health", get(routes::health_check))
        .nest("/hls", hls)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
