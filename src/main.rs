mod budget;
mod cache;
mod client_ip;
mod clock;
mod config;
mod error;
mod gap_score;
mod guard;
mod handlers;
mod insights;
mod metrics;
mod models;
mod onchain;
mod origin;
mod rate_limit;
mod state;
mod upstream;

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::clock::SystemClock;
use crate::config::{Args, EndpointTable, split_list};
use crate::guard::ApiGuard;
use crate::origin::OriginPolicy;
use crate::state::AppState;
use crate::upstream::Upstream;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let endpoints = match EndpointTable::load(args.guard_config.as_deref()) {
        Ok(table) => table,
        Err(e) => {
            error!(error = %e, "invalid guard configuration");
            return ExitCode::FAILURE;
        }
    };
    let origins = OriginPolicy::new(
        split_list(&args.allowed_origins),
        split_list(&args.trusted_suffix),
    );

    // guard state lives as long as the process; a restart resets every counter
    let state = Arc::new(AppState {
        guard: ApiGuard::new(endpoints, origins, Arc::new(SystemClock)),
        upstream: Upstream::new(
            reqwest::Client::new(),
            args.ranking_url.clone(),
            Duration::from_secs(args.ranking_ttl),
            args.llm_url.clone(),
            args.llm_model.clone(),
            args.llm_token.clone(),
        )
        .with_analytics(args.analytics_url.clone(), args.analytics_key.clone()),
    });

    if !state.upstream.has_llm() {
        info!("no LLM token configured, insight routes will answer 500");
    }
    if !state.upstream.has_analytics() {
        info!("no DUNE_API_KEY configured, /api/onchain will answer 500");
    }

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr = %addr, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!(port = args.port, "gateway running");
    info!(url = %args.ranking_url, ttl_secs = args.ranking_ttl, "ranking upstream");
    info!(url = %args.llm_url, model = %args.llm_model, "LLM upstream");
    info!(origins = %args.allowed_origins, suffix = %args.trusted_suffix, "origin allow-list");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
