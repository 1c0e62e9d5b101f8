use crate::types::{ConversationRef, MessageEvent, OutboundMessage};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Unique bus identifier: "webhook".
    fn bus_id(&self) -> &str;

    /// Start receiving host events. Push to tx for each inbound message.
    async fn start(&self, tx: mpsc::Sender<MessageEvent>) -> Result<()>;

    /// Post a message into a conversation as the identity the message names.
    async fn post(&self, conversation: &ConversationRef, message: OutboundMessage) -> Result<()>;
}
