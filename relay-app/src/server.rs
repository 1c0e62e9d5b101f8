//! relaybot service wiring.
//!
//! Builds the responder pipeline, starts the webhook bus and the gateway
//! loop, and serves the HTTP surface (event ingest, health, livechat
//! availability).

use crate::bindings::ThreadBindings;
use crate::classify::ResponderRules;
use crate::config::RelaybotConfig;
use crate::gateway::Gateway;
use crate::livechat::{self, OperatorResolution};
use crate::responder::{Responder, RetryPolicy};
use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use relay_assistant::AssistantsClient;
use relay_bus::{MessageBus, WebhookBus};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const INBOUND_QUEUE_CAPACITY: usize = 256;

#[derive(Clone)]
struct ServiceState {
    cfg: Arc<RelaybotConfig>,
}

pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = RelaybotConfig::load(config_path).await?;
    let shutdown = CancellationToken::new();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(%e, "reqwest client build failed; falling back to default client");
            reqwest::Client::new()
        });
    let mut client = AssistantsClient::new(http, &cfg.assistant.api_key);
    if let Some(base_url) = cfg.assistant.base_url.as_deref() {
        client = client.with_base_url(base_url);
    }

    let bindings = Arc::new(ThreadBindings::open(&cfg.bindings.db_path)?);
    let responder = Arc::new(Responder::new(
        Arc::new(client),
        bindings,
        RetryPolicy::from_config(&cfg.responder),
    ));

    let bus = Arc::new(
        WebhookBus::new(&cfg.bus.post_url)?.with_auth_token(cfg.bus.auth_token.clone()),
    );
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);
    bus.start(inbound_tx).await?;

    let gateway = Arc::new(Gateway::new(
        ResponderRules::from_config(&cfg),
        cfg.identity.bot_user.as_str().into(),
        responder,
        bus.clone(),
        shutdown.clone(),
        inbound_rx,
    ));
    gateway.start();

    let state = ServiceState { cfg: Arc::new(cfg) };
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/livechat/{channel}/availability", get(livechat_availability))
        .with_state(state.clone())
        .merge(bus.clone().router())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(GlobalConcurrencyLimitLayer::new(64));

    let addr: SocketAddr = state
        .cfg
        .bus
        .listen_addr
        .parse()
        .context("parse bus.listen_addr")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "relaybot listening");

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                shutdown.cancel();
            }
        }
    });

    axum::serve(listener, router)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .await?;
    Ok(())
}

pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = RelaybotConfig::load(config_path).await?;
    tracing::info!(
        assistant_enabled = cfg.assistant.enabled,
        assistant_id = %cfg.assistant.assistant_id,
        livechat_channels = cfg.livechat.channels.len(),
        bindings_db = %cfg.bindings.db_path.display(),
        listen_addr = %cfg.bus.listen_addr,
        "config ok"
    );
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct AvailabilityQuery {
    /// Whether the host currently has a human operator online.
    #[serde(default)]
    humans_available: bool,
}

#[derive(Debug, Serialize)]
struct AvailabilityResponse {
    available: bool,
    operator: OperatorResolution,
}

/// Lets the widget decide whether to show itself: the bot is presented as
/// the available operator when no human is and the channel allows it.
async fn livechat_availability(
    State(state): State<ServiceState>,
    Path(channel): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Json<AvailabilityResponse> {
    let resolution = livechat::resolve_operator(
        state.cfg.assistant.enabled,
        state.cfg.livechat.channels.get(&channel),
        query.humans_available,
    );
    Json(AvailabilityResponse {
        available: resolution != OperatorResolution::Nobody,
        operator: resolution,
    })
}
