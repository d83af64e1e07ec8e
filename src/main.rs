//! tier-cascade: serve a cascade of JSON documents over HTTP.
//!
//! Tiers are configured in a JSON file, fastest first, e.g.
//!   memory (hot) → disk (durable)

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use tier_cascade::config::{Cli, Config};
use tier_cascade::server::api::{build_router, AppState};
use tier_cascade::server::document::Document;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "tier_cascade=debug,tower_http=debug"
    } else {
        "tier_cascade=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("tier-cascade v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    let config = Arc::new(config);

    info!(
        tiers = config.tiers.len(),
        default_ttl_secs = ?config.expiration.default_ttl_secs,
        default_mode = ?config.expiration.default_mode,
        overrides = config.expiration.overrides.len(),
        "Configuration loaded"
    );

    // Open backends and assemble the chain.
    let item_key = Document::key_fn(config.server.document_key_field.clone());
    let chain = Arc::new(config.build_chain::<Document>(Some(item_key)).await?);

    for tier in chain.tiers() {
        info!(
            tier = tier.name(),
            backend = tier.backend().kind(),
            ttl = ?tier.expiration().ttl,
            "Tier ready"
        );
    }

    // Build application state.
    let state = Arc::new(AppState {
        chain,
        config: config.clone(),
        start_time: Instant::now(),
    });

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.server.listen.clone();
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
