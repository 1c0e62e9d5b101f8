//! Inbound dispatch: every bus event flows through one queue, is
//! classified, and eligible events are answered on detached tasks so the
//! ingestion loop never blocks on a completion.

use crate::classify::{self, Eligibility, ResponderRules};
use crate::responder::Responder;
use anyhow::Result;
use relay_bus::{ConversationRef, MessageBus, MessageEvent, OutboundMessage, UserId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub struct Gateway {
    rules: ResponderRules,
    bot_user: UserId,
    responder: Arc<Responder>,
    bus: Arc<dyn MessageBus>,
    shutdown: CancellationToken,
    inbound_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<MessageEvent>>>,
}

impl Gateway {
    pub fn new(
        rules: ResponderRules,
        bot_user: UserId,
        responder: Arc<Responder>,
        bus: Arc<dyn MessageBus>,
        shutdown: CancellationToken,
        inbound_rx: mpsc::Receiver<MessageEvent>,
    ) -> Self {
        Self {
            rules,
            bot_user,
            responder,
            bus,
            shutdown,
            inbound_rx: Arc::new(tokio::sync::Mutex::new(inbound_rx)),
        }
    }

    pub fn start(self: Arc<Self>) {
        tokio::spawn(async move {
            if let Err(e) = self.run_loop().await {
                tracing::error!(%e, "gateway loop exited");
            }
        });
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn run_loop(&self) -> Result<()> {
        loop {
            let msg = {
                let mut rx = self.inbound_rx.lock().await;
                tokio::select! {
                    _ = self.shutdown.cancelled() => return Ok(()),
                    msg = rx.recv() => msg,
                }
            };
            let Some(event) = msg else {
                return Ok(());
            };
            self.handle_inbound(event);
        }
    }

    fn handle_inbound(&self, event: MessageEvent) {
        let eligibility = classify::classify(&event, &self.rules);
        let (assistant_id, elevated) = match eligibility {
            Eligibility::Ineligible => {
                tracing::debug!(
                    message_id = %event.message_id,
                    conversation = %event.conversation,
                    "message not eligible for an assistant reply"
                );
                return;
            }
            Eligibility::PrivateChat { assistant_id } => (assistant_id, false),
            Eligibility::SharedChannel { assistant_id } => (assistant_id, false),
            // Livechat posts need the elevated variant.
            Eligibility::LivechatBot { assistant_id } => (assistant_id, true),
        };

        let responder = self.responder.clone();
        let bus = self.bus.clone();
        let bot_user = self.bot_user.clone();
        let shutdown = self.shutdown.clone();
        let conversation = event.conversation.clone();
        let prompt = event.body.raw().to_string();
        tokio::spawn(async move {
            respond_and_post(
                responder,
                bus,
                bot_user,
                conversation,
                prompt,
                assistant_id,
                elevated,
                shutdown,
            )
            .await;
        });
    }
}

#[allow(clippy::too_many_arguments)]
async fn respond_and_post(
    responder: Arc<Responder>,
    bus: Arc<dyn MessageBus>,
    bot_user: UserId,
    conversation: ConversationRef,
    prompt: String,
    assistant_id: String,
    elevated: bool,
    shutdown: CancellationToken,
) {
    let response = match responder
        .respond(&conversation.id, &prompt, &assistant_id, &shutdown)
        .await
    {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(%error, conversation = %conversation, "assistant reply skipped");
            return;
        }
    };
    if response.is_empty() {
        // Soft degradation: the prompt was not recorded, post nothing.
        return;
    }

    let outbound = OutboundMessage {
        content: response,
        post_as: bot_user,
        elevated,
    };
    if let Err(error) = bus.post(&conversation, outbound).await {
        // Posting failures never propagate into the ingestion path.
        tracing::error!(%error, conversation = %conversation, "assistant reply post failed");
    }
}
