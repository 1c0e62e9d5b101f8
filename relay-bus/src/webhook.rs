use crate::traits::MessageBus;
use crate::types::{ChannelKind, ConversationRef, MessageBody, MessageEvent, OutboundMessage};
use anyhow::{Result, anyhow};
use axum::Router;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::routing::post;
use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Webhook bus: the host POSTs every durably-stored message to `/events`,
/// and replies are posted back to the host's message-post endpoint.
#[derive(Clone)]
pub struct WebhookBus {
    http: reqwest::Client,
    post_url: String,
    auth_token: Option<String>,
    inbound_tx: Arc<tokio::sync::RwLock<Option<mpsc::Sender<MessageEvent>>>>,
}

impl WebhookBus {
    pub fn new(post_url: &str) -> Result<Self> {
        let post_url = normalize_http_url(post_url, "post_url")?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            post_url,
            auth_token: None,
            inbound_tx: Arc::new(tokio::sync::RwLock::new(None)),
        })
    }

    pub fn with_auth_token(mut self, auth_token: Option<String>) -> Self {
        self.auth_token = auth_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(ToOwned::to_owned);
        self
    }

    /// Router that accepts host event deliveries at `POST /events`.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/events", post(ingest_event))
            .with_state(self)
    }

    fn authorized_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn ingest_event(
    State(bus): State<Arc<WebhookBus>>,
    Json(envelope): Json<WebhookEventEnvelope>,
) -> StatusCode {
    let Some(event) = normalize_event(envelope) else {
        tracing::warn!("webhook event dropped: missing conversation reference");
        return StatusCode::ACCEPTED;
    };

    let tx = bus.inbound_tx.read().await.clone();
    let Some(tx) = tx else {
        tracing::error!("webhook event received before the bus was started");
        return StatusCode::SERVICE_UNAVAILABLE;
    };
    if let Err(error) = tx.send(event).await {
        tracing::error!(%error, "webhook inbound queue closed");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::ACCEPTED
}

#[async_trait::async_trait]
impl MessageBus for WebhookBus {
    fn bus_id(&self) -> &str {
        "webhook"
    }

    async fn start(&self, tx: mpsc::Sender<MessageEvent>) -> Result<()> {
        *self.inbound_tx.write().await = Some(tx);
        Ok(())
    }

    async fn post(&self, conversation: &ConversationRef, message: OutboundMessage) -> Result<()> {
        let content = message.content.trim();
        if content.is_empty() {
            return Err(anyhow!("message content is empty"));
        }

        let payload = serde_json::json!({
            "conversation": conversation,
            "message": {
                "content": content,
                "post_as": message.post_as,
                "elevated": message.elevated,
            }
        });
        let url = Url::parse(&self.post_url)
            .map_err(|e| anyhow!("invalid bus post_url: {e}"))?;
        let response = self
            .authorized_request(self.http.post(url))
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(anyhow!(
                "webhook post failed for conversation {}: status={} body={}",
                conversation,
                status,
                body
            ));
        }
        Ok(())
    }
}

fn normalize_http_url(raw: &str, field: &str) -> Result<String> {
    let normalized = raw.trim().to_string();
    if normalized.is_empty() {
        return Err(anyhow!("{field} is required"));
    }
    let parsed = Url::parse(&normalized).map_err(|e| anyhow!("invalid {field}: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(normalized),
        other => Err(anyhow!("invalid {field} scheme: {other}")),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct WebhookEventEnvelope {
    message_id: Option<String>,
    conversation_model: Option<String>,
    conversation_id: Option<String>,
    channel_kind: Option<ChannelKind>,
    author: Option<String>,
    author_is_operator: Option<bool>,
    body: Option<String>,
    body_is_html: Option<bool>,
    record_name: Option<String>,
    livechat_channel: Option<String>,
}

fn normalize_event(envelope: WebhookEventEnvelope) -> Option<MessageEvent> {
    let model = envelope
        .conversation_model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())?
        .to_string();
    let conversation_id = envelope
        .conversation_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())?
        .to_string();

    let received_at = Utc::now();
    let message_id = envelope
        .message_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| {
            format!(
                "{model}:{conversation_id}:{}",
                received_at.timestamp_millis()
            )
        });

    let raw_body = envelope.body.unwrap_or_default();
    let body = if envelope.body_is_html.unwrap_or(false) {
        MessageBody::Html(raw_body)
    } else {
        MessageBody::Plain(raw_body)
    };

    Some(MessageEvent {
        message_id: message_id.into(),
        conversation: ConversationRef {
            model,
            id: conversation_id.into(),
        },
        kind: envelope.channel_kind.unwrap_or(ChannelKind::Other),
        author: envelope
            .author
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(Into::into),
        author_is_operator: envelope.author_is_operator.unwrap_or(false),
        body,
        record_name: envelope.record_name.unwrap_or_default(),
        livechat_channel: envelope
            .livechat_channel
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(Into::into),
        received_at,
    })
}
