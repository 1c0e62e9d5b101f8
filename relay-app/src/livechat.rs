//! Livechat operator-availability fallback.
//!
//! When a livechat channel has no human operator online, the bot identity
//! is presented as the available operator, provided the channel is enabled
//! for assistant replies and its rule carries an assistant chatbot script.

use crate::config::LivechatChannelConfig;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorResolution {
    Human,
    Bot,
    Nobody,
}

/// Who can take a new livechat conversation on this channel. Humans always
/// win; the bot only steps in when the channel allows it end to end.
pub fn resolve_operator(
    globally_enabled: bool,
    channel: Option<&LivechatChannelConfig>,
    humans_available: bool,
) -> OperatorResolution {
    if humans_available {
        return OperatorResolution::Human;
    }
    let Some(channel) = channel else {
        return OperatorResolution::Nobody;
    };
    if globally_enabled && channel.enabled && channel.chatbot_rule {
        OperatorResolution::Bot
    } else {
        OperatorResolution::Nobody
    }
}
