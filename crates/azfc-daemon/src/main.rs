//! azfc-daemon entry point.
//!
//! Thin on purpose: load config and secrets, open the store, wire the SaaS
//! clients, attach middleware and serve. Handlers live in `routes/`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use azfc_config::{
    load_layered_yaml, report_unused_keys, secrets::resolve_secrets, ServiceSettings,
    UnusedKeyPolicy,
};
use azfc_daemon::{routes, state};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const ENV_CONFIG: &str = "AZFC_CONFIG";
const ENV_ADDR: &str = "AZFC_DAEMON_ADDR";
const DEFAULT_CONFIG: &str = "config/base.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&path_refs)?;
    let unused = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for key in &unused.unused_leaf_pointers {
        warn!(key = %key, "unused config key");
    }
    let settings = ServiceSettings::from_config_json(&loaded.config_json)?;
    info!(
        mode = settings.mode.as_str(),
        config_hash = %loaded.config_hash,
        layers = ?paths,
        "config loaded"
    );

    let secrets = resolve_secrets(&loaded.config_json, settings.mode)?;
    let (store, _backend) = azfc_store::open_store(&settings, &secrets).await?;

    let cors = cors_from(&settings.cors_origins);
    let fallback_addr = settings.bind_addr.clone();
    let shared = Arc::new(state::AppState::from_secrets(settings, store, &secrets)?);

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr: SocketAddr = bind_addr_from_env()
        .unwrap_or(fallback_addr)
        .parse()
        .context("invalid bind address")?;
    info!("azfc-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Comma-separated layer list, later layers override earlier ones.
fn config_paths() -> Vec<String> {
    let raw = std::env::var(ENV_CONFIG).unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let paths: Vec<String> = raw
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if paths.is_empty() {
        vec![DEFAULT_CONFIG.to_string()]
    } else {
        paths
    }
}

fn bind_addr_from_env() -> Option<String> {
    std::env::var(ENV_ADDR).ok().filter(|v| !v.trim().is_empty())
}

/// CORS: only the configured site origins.
fn cors_from(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed");
        return;
    }
    info!("shutdown requested");
}
