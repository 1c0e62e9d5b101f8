//! Response eligibility classifier.
//!
//! `classify` is a pure function of one inbound event and a configuration
//! snapshot. The evaluation order below is a contract: a livechat message
//! on a disabled channel must stay unanswered even when its conversation
//! name happens to match the private-chat pattern.

use crate::config::RelaybotConfig;
use relay_bus::{ChannelKind, ConversationRef, LivechatChannelId, MessageEvent, PartnerId};
use std::collections::HashMap;

/// Suffix of the system notice stored when a participant leaves.
const LEFT_CONVERSATION_SUFFIX: &str = "has left the conversation.";

/// Rendered prefix of livechat rating submissions.
const RATING_PREFIX: &str = "<p>Rating:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Ineligible,
    /// 1:1 conversation named after the bot.
    PrivateChat { assistant_id: String },
    /// The well-known public assistant channel.
    SharedChannel { assistant_id: String },
    /// Operator-less livechat conversation.
    LivechatBot { assistant_id: String },
}

/// Configuration snapshot the classifier evaluates against.
#[derive(Debug, Clone)]
pub struct ResponderRules {
    pub enabled: bool,
    pub bot_partner: PartnerId,
    pub bot_name: String,
    pub default_assistant_id: String,
    pub shared_channel: ConversationRef,
    pub livechat_channels: HashMap<LivechatChannelId, LivechatChannelRule>,
}

#[derive(Debug, Clone, Default)]
pub struct LivechatChannelRule {
    pub enabled: bool,
    pub assistant_id: String,
}

impl ResponderRules {
    pub fn from_config(cfg: &RelaybotConfig) -> Self {
        let livechat_channels = cfg
            .livechat
            .channels
            .iter()
            .map(|(id, channel)| {
                (
                    LivechatChannelId::from(id.as_str()),
                    LivechatChannelRule {
                        enabled: channel.enabled,
                        assistant_id: channel.assistant_id.clone(),
                    },
                )
            })
            .collect();
        Self {
            enabled: cfg.assistant.enabled,
            bot_partner: PartnerId::from(cfg.identity.bot_partner.as_str()),
            bot_name: cfg.identity.bot_name.clone(),
            default_assistant_id: cfg.assistant.assistant_id.clone(),
            shared_channel: ConversationRef {
                model: cfg.discuss.shared_channel_model.clone(),
                id: cfg.discuss.shared_channel_id.as_str().into(),
            },
            livechat_channels,
        }
    }
}

pub fn classify(event: &MessageEvent, rules: &ResponderRules) -> Eligibility {
    if !rules.enabled {
        return Eligibility::Ineligible;
    }
    if event.body.is_blank() {
        return Eligibility::Ineligible;
    }
    if event
        .body
        .raw()
        .trim_end()
        .ends_with(LEFT_CONVERSATION_SUFFIX)
    {
        return Eligibility::Ineligible;
    }
    if event
        .body
        .html()
        .is_some_and(|markup| markup.trim_start().starts_with(RATING_PREFIX))
    {
        return Eligibility::Ineligible;
    }

    // Livechat events are gated on their channel settings before any
    // persona match is considered.
    let livechat_assistant_id = if event.kind == ChannelKind::Livechat {
        let Some(rule) = event
            .livechat_channel
            .as_ref()
            .and_then(|id| rules.livechat_channels.get(id))
        else {
            return Eligibility::Ineligible;
        };
        if !rule.enabled {
            return Eligibility::Ineligible;
        }
        let assistant_id = if rule.assistant_id.trim().is_empty() {
            rules.default_assistant_id.trim()
        } else {
            rule.assistant_id.trim()
        };
        if assistant_id.is_empty() {
            return Eligibility::Ineligible;
        }
        Some(assistant_id.to_string())
    } else {
        None
    };

    // The bot never answers itself.
    if event.author.as_ref() == Some(&rules.bot_partner) {
        return Eligibility::Ineligible;
    }

    let private_pattern = format!("{}, ", rules.bot_name);
    if event.kind == ChannelKind::Chat && event.record_name.contains(&private_pattern) {
        return Eligibility::PrivateChat {
            assistant_id: rules.default_assistant_id.clone(),
        };
    }

    if event.conversation == rules.shared_channel {
        return Eligibility::SharedChannel {
            assistant_id: rules.default_assistant_id.clone(),
        };
    }

    if event.kind == ChannelKind::Livechat && (event.author.is_none() || !event.author_is_operator)
    {
        if let Some(assistant_id) = livechat_assistant_id {
            return Eligibility::LivechatBot { assistant_id };
        }
    }

    Eligibility::Ineligible
}

#[cfg(test)]
mod tests {
    use super::{Eligibility, LivechatChannelRule, ResponderRules, classify};
    use chrono::Utc;
    use relay_bus::{ChannelKind, ConversationRef, MessageBody, MessageEvent};
    use std::collections::HashMap;

    fn rules() -> ResponderRules {
        let mut livechat_channels = HashMap::new();
        livechat_channels.insert(
            "lc-main".into(),
            LivechatChannelRule {
                enabled: true,
                assistant_id: "asst_channel".to_string(),
            },
        );
        livechat_channels.insert(
            "lc-blank".into(),
            LivechatChannelRule {
                enabled: true,
                assistant_id: String::new(),
            },
        );
        livechat_channels.insert(
            "lc-off".into(),
            LivechatChannelRule {
                enabled: false,
                assistant_id: "asst_channel".to_string(),
            },
        );
        ResponderRules {
            enabled: true,
            bot_partner: "partner-relaybot".into(),
            bot_name: "ChatGPT".to_string(),
            default_assistant_id: "asst_default".to_string(),
            shared_channel: ConversationRef {
                model: "discuss.channel".to_string(),
                id: "42".into(),
            },
            livechat_channels,
        }
    }

    fn event(kind: ChannelKind, body: MessageBody) -> MessageEvent {
        MessageEvent {
            message_id: "m-1".into(),
            conversation: ConversationRef {
                model: "discuss.channel".to_string(),
                id: "7".into(),
            },
            kind,
            author: Some("partner-alice".into()),
            author_is_operator: false,
            body,
            record_name: String::new(),
            livechat_channel: None,
            received_at: Utc::now(),
        }
    }

    fn plain(text: &str) -> MessageBody {
        MessageBody::Plain(text.to_string())
    }

    #[test]
    fn disabled_feature_declines_everything() {
        let mut rules = rules();
        rules.enabled = false;

        let mut e = event(ChannelKind::Chat, plain("hello"));
        e.record_name = "ChatGPT, Alice".to_string();
        assert_eq!(classify(&e, &rules), Eligibility::Ineligible);
    }

    #[test]
    fn blank_body_is_ineligible() {
        let e = event(ChannelKind::Chat, plain("   "));
        assert_eq!(classify(&e, &rules()), Eligibility::Ineligible);
    }

    #[test]
    fn left_conversation_notice_is_ineligible() {
        let mut e = event(ChannelKind::Chat, plain("Alice has left the conversation."));
        e.record_name = "ChatGPT, Alice".to_string();
        assert_eq!(classify(&e, &rules()), Eligibility::Ineligible);
    }

    #[test]
    fn rating_submission_is_ineligible_regardless_of_other_fields() {
        let mut e = event(
            ChannelKind::Chat,
            MessageBody::Html("<p>Rating: 5 stars</p>".to_string()),
        );
        e.record_name = "ChatGPT, Alice".to_string();
        assert_eq!(classify(&e, &rules()), Eligibility::Ineligible);

        // A plain body with the same text is not a rating submission.
        let mut e = event(ChannelKind::Chat, plain("<p>Rating: 5 stars</p>"));
        e.record_name = "ChatGPT, Alice".to_string();
        assert!(matches!(
            classify(&e, &rules()),
            Eligibility::PrivateChat { .. }
        ));
    }

    #[test]
    fn private_chat_matches_conversation_named_after_the_bot() {
        let mut e = event(ChannelKind::Chat, plain("hello"));
        e.record_name = "ChatGPT, Alice".to_string();
        assert_eq!(
            classify(&e, &rules()),
            Eligibility::PrivateChat {
                assistant_id: "asst_default".to_string()
            }
        );
    }

    #[test]
    fn private_chat_requires_the_chat_kind() {
        let mut e = event(ChannelKind::Channel, plain("hello"));
        e.record_name = "ChatGPT, Alice".to_string();
        assert_eq!(classify(&e, &rules()), Eligibility::Ineligible);
    }

    #[test]
    fn shared_channel_matches_the_configured_reference() {
        let mut e = event(ChannelKind::Channel, plain("hello"));
        e.conversation = ConversationRef {
            model: "discuss.channel".to_string(),
            id: "42".into(),
        };
        assert_eq!(
            classify(&e, &rules()),
            Eligibility::SharedChannel {
                assistant_id: "asst_default".to_string()
            }
        );
    }

    #[test]
    fn bot_author_never_gets_a_reply() {
        let mut e = event(ChannelKind::Chat, plain("hello"));
        e.record_name = "ChatGPT, Alice".to_string();
        e.author = Some("partner-relaybot".into());
        assert_eq!(classify(&e, &rules()), Eligibility::Ineligible);

        let mut e = event(ChannelKind::Livechat, plain("hello"));
        e.livechat_channel = Some("lc-main".into());
        e.author = Some("partner-relaybot".into());
        assert_eq!(classify(&e, &rules()), Eligibility::Ineligible);
    }

    #[test]
    fn livechat_without_operator_uses_the_channel_assistant() {
        let mut e = event(ChannelKind::Livechat, plain("hello"));
        e.livechat_channel = Some("lc-main".into());
        e.author = None;
        assert_eq!(
            classify(&e, &rules()),
            Eligibility::LivechatBot {
                assistant_id: "asst_channel".to_string()
            }
        );

        // A present author without operator privilege is also answered.
        let mut e = event(ChannelKind::Livechat, plain("hello"));
        e.livechat_channel = Some("lc-main".into());
        assert!(matches!(
            classify(&e, &rules()),
            Eligibility::LivechatBot { .. }
        ));
    }

    #[test]
    fn livechat_operator_messages_are_not_answered() {
        let mut e = event(ChannelKind::Livechat, plain("hello"));
        e.livechat_channel = Some("lc-main".into());
        e.author_is_operator = true;
        assert_eq!(classify(&e, &rules()), Eligibility::Ineligible);
    }

    #[test]
    fn blank_channel_assistant_falls_back_to_the_default() {
        let mut e = event(ChannelKind::Livechat, plain("hello"));
        e.livechat_channel = Some("lc-blank".into());
        e.author = None;
        assert_eq!(
            classify(&e, &rules()),
            Eligibility::LivechatBot {
                assistant_id: "asst_default".to_string()
            }
        );
    }

    #[test]
    fn livechat_needs_some_assistant_id() {
        let mut rules = rules();
        rules.default_assistant_id = String::new();

        let mut e = event(ChannelKind::Livechat, plain("hello"));
        e.livechat_channel = Some("lc-blank".into());
        e.author = None;
        assert_eq!(classify(&e, &rules), Eligibility::Ineligible);
    }

    #[test]
    fn disabled_or_unknown_livechat_channel_skips_persona_matching() {
        // The conversation name matches the private-chat pattern, but the
        // channel-level flag is off: no reply.
        let mut e = event(ChannelKind::Livechat, plain("hello"));
        e.livechat_channel = Some("lc-off".into());
        e.record_name = "ChatGPT, Visitor".to_string();
        e.author = None;
        assert_eq!(classify(&e, &rules()), Eligibility::Ineligible);

        let mut e = event(ChannelKind::Livechat, plain("hello"));
        e.livechat_channel = Some("lc-unknown".into());
        e.author = None;
        assert_eq!(classify(&e, &rules()), Eligibility::Ineligible);

        let mut e = event(ChannelKind::Livechat, plain("hello"));
        e.author = None;
        assert_eq!(classify(&e, &rules()), Eligibility::Ineligible);
    }

    #[test]
    fn unmatched_kinds_are_ineligible() {
        assert_eq!(
            classify(&event(ChannelKind::Other, plain("hello")), &rules()),
            Eligibility::Ineligible
        );
        assert_eq!(
            classify(&event(ChannelKind::Channel, plain("hello")), &rules()),
            Eligibility::Ineligible
        );
    }

    #[test]
    fn classification_is_idempotent() {
        let mut e = event(ChannelKind::Chat, plain("hello"));
        e.record_name = "ChatGPT, Alice".to_string();
        let r = rules();
        assert_eq!(classify(&e, &r), classify(&e, &r));
    }
}
