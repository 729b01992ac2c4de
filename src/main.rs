#![cfg_attr(not(test), deny(clippy::panic))]

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use codeduel_server::auth::SignedTokenVerifier;
use codeduel_server::config;
use codeduel_server::http;
use codeduel_server::judge::HttpJudgeClient;
use codeduel_server::logging;
use codeduel_server::rate_limit::RateLimitConfig;
use codeduel_server::server::{BattleServer, EngineConfig};
use codeduel_server::store::{BattleStore, InMemoryStore};
use codeduel_server::websocket;

/// CodeDuel -- realtime backend for multiplayer competitive-coding battles
#[derive(Parser, Debug)]
#[command(name = "codeduel-server")]
#[command(about = "Realtime room/battle server for competitive coding")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Judge API: {}", cfg.judge.api_url);
                println!("  Battle clock tick: {}s", cfg.server.time_update_tick_secs);
                println!("  Reaper interval: {}s", cfg.server.reaper_interval_secs);
                println!("  Join code length: {}", cfg.server.join_code_length);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result.map_err(|e| anyhow::anyhow!(e))?;

    logging::init_with_config(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(%addr, "Starting CodeDuel server");

    let store: Arc<dyn BattleStore> = Arc::new(InMemoryStore::new(cfg.server.join_code_length));
    store.initialize().await?;

    let judge = Arc::new(HttpJudgeClient::new(cfg.judge.clone()));
    let verifier = Arc::new(SignedTokenVerifier::new(
        cfg.security.token_secret.clone().into_bytes(),
    ));

    let server = BattleServer::new(
        store,
        judge,
        verifier,
        EngineConfig::from(&cfg.server),
        RateLimitConfig::from(&cfg.rate_limit),
    );

    // Background reclamation of finished and stalled rooms.
    let reaper = server.clone();
    tokio::spawn(async move {
        reaper.reaper_task().await;
    });

    let cors = if cfg.security.cors_origins == "*" {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cfg
            .security
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();

        if origins.is_empty() {
            tracing::warn!("No valid CORS origins configured, using permissive CORS");
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    let app = http::api_router()
        .merge(websocket::ws_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(server);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        cors_origins = %cfg.security.cors_origins,
        "Server started - REST under /, WebSocket under /ws"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
