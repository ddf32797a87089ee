mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use slip_core::Config;
use slip_server::{AppContext, Playlist};
use slipstream::synth::SynthSource;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "slipstream=trace,slip_server=trace,slip_media=debug,tower_http=debug".to_string()
        } else {
            "slipstream=debug,slip_server=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start {
            host,
            port,
            part_ms,
            parts_per_segment,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(
                host,
                port,
                part_ms,
                parts_per_segment,
                cli.config.as_deref(),
            ))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("slipstream {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn start_server(
    host: String,
    port: u16,
    part_ms: u64,
    parts_per_segment: u32,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path);
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    // Override host/port from CLI if specified.
    config.server.host = host;
    config.server.port = port;

    tracing::info!("Starting slipstream");

    // Cancellation token shared by the actor, the source, and the server.
    let token = CancellationToken::new();

    let playlist = Playlist::spawn(
        token.clone(),
        config.stream.segment_count,
        Box::new(|segments| {
            tracing::trace!(window = segments.len(), "segment finalized");
        }),
    );

    let source = SynthSource {
        part_duration: Duration::from_millis(part_ms),
        parts_per_segment,
        ..SynthSource::default()
    };

    let ctx = AppContext {
        playlist: playlist.clone(),
        stream_info: Some(source.stream_info()),
        init_segment: Some(source.init_segment()),
    };

    let source_handle = tokio::spawn(source.run(playlist, token.clone()));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Translate SIGINT/SIGTERM into cancellation.
    let signal_token = token.clone();
    tokio::spawn(async move {
        slip_server::shutdown_signal(signal_token.clone()).await;
        signal_token.cancel();
    });

    slip_server::serve(listener, ctx, token.clone()).await?;

    token.cancel();
    let _ = source_handle.await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            Config::from_json(&contents).map_err(|e| anyhow::anyhow!("{e}"))?
        }
        None => Config::default(),
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("Config OK");
    } else {
        for warning in &warnings {
            println!("warning: {warning}");
        }
    }
    Ok(())
}
