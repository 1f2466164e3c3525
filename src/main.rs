// Copyright (c) MegaYours, Inc.
// SPDX-License-Identifier: Apache-2.0

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use prometheus::{Registry, TextEncoder};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use yours_oracle_relay::config::RelayNodeConfig;
use yours_oracle_relay::metrics::RelayMetrics;
use yours_oracle_relay::node::run_relay_node;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RelayNodeConfig::parse();

    let registry = Registry::new();
    let metrics = Arc::new(RelayMetrics::new(&registry));
    let context = config.validate(metrics)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                cancel.cancel();
            }
        }
    });

    let metrics_server = tokio::spawn(serve_metrics(
        registry,
        config.metrics_address.clone(),
        cancel.clone(),
    ));

    run_relay_node(context, cancel).await?;

    if let Ok(Err(e)) = metrics_server.await {
        error!(error = %e, "metrics server failed");
    }
    Ok(())
}

async fn serve_metrics(
    registry: Registry,
    address: String,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(registry);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(%address, "metrics server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;
    Ok(())
}

async fn metrics_handler(State(registry): State<Registry>) -> (StatusCode, String) {
    match TextEncoder::new().encode_to_string(&registry.gather()) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
