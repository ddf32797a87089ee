//! slip-server: the playlist actor and its HTTP surface.
//!
//! This crate owns the live side of slipstream:
//!
//! - A single-task actor serializing all window mutation and request
//!   handling, including LL-HLS blocking playlist reload and blocking part
//!   fetch
//! - Delivery directive parsing (`_HLS_msn` / `_HLS_part` / `_HLS_skip`)
//! - Axum routes serving the playlist, segment, and part files
//! - Graceful shutdown via a shared cancellation token

pub mod actor;
pub mod context;
pub mod query;
pub mod router;
pub mod routes;

pub use actor::{FileResponse, Playlist, SegmentFinalizedHook};
pub use context::AppContext;
pub use query::HlsQuery;

use tokio_util::sync::CancellationToken;

/// Serve the HTTP surface on the given listener until the token fires.
pub async fn serve(
    listener: tokio::net::TcpListener,
    ctx: AppContext,
    token: CancellationToken,
) -> slip_core::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("Serving LL-HLS on http://{addr}/hls/stream.m3u8");

    let app = router::build_router(ctx);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or token cancellation.
pub async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
