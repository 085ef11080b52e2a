//! probitstat server — probit dose-response analysis over HTTP.
//!
//! # Endpoints
//!
//! - `GET  /`               — liveness probe (`OK`)
//! - `GET  /v1/health`      — server status, version, request counters
//! - `POST /v1/probit`      — JSON rows → probit report JSON
//! - `POST /v1/probit/csv`  — CSV table → probit report JSON

mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use state::AppState;

/// probitstat server — probit dose-response analysis over HTTP.
#[derive(Parser, Debug)]
#[command(name = "probitstat-server", version = pb_core::VERSION, about)]
struct Cli {
    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Bind address.
    #[arg(long, env = "PROBITSTAT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Maximum request body size in MiB (applies to all endpoints).
    #[arg(long, default_value = "16")]
    max_body_mb: usize,

    /// Allowed CORS origin (repeatable). Any origin is allowed when omitted.
    #[arg(long = "allow-origin")]
    allow_origins: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let cli = Cli::parse();

    let state = Arc::new(AppState::new());
    let cors = cors_layer(&cli.allow_origins)?;

    let app = Router::new()
        .merge(routes::router())
        .layer(DefaultBodyLimit::max(mb_to_bytes(cli.max_body_mb)))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    tracing::info!(%addr, version = pb_core::VERSION, "probitstat-server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn mb_to_bytes(mb: usize) -> usize {
    // Clamp overflow to usize::MAX to avoid panics in debug builds.
    mb.saturating_mul(1024).saturating_mul(1024)
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let values = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).map_err(|e| anyhow::anyhow!("invalid --allow-origin {o:?}: {e}")))
        .collect::<anyhow::Result<Vec<_>>>()?;
    tracing::info!(origins = ?origins, "CORS restricted");
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(values))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}
