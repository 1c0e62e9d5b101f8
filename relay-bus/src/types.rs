use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

id_newtype!(MessageId);
id_newtype!(ConversationId);
id_newtype!(PartnerId);
id_newtype!(UserId);
id_newtype!(LivechatChannelId);

/// Kind of conversation a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// 1:1 direct conversation.
    Chat,
    /// Website livechat widget conversation.
    Livechat,
    /// Shared multi-member channel.
    Channel,
    #[serde(other)]
    Other,
}

/// Host-side reference to the conversation container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRef {
    pub model: String,
    pub id: ConversationId,
}

impl fmt::Display for ConversationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.model, self.id)
    }
}

/// Message body as stored by the host: plain text, or markup the host has
/// already rendered to HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageBody {
    Plain(String),
    Html(String),
}

impl MessageBody {
    pub fn raw(&self) -> &str {
        match self {
            Self::Plain(text) | Self::Html(text) => text,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.raw().trim().is_empty()
    }

    /// The rendered markup, only when the body carries the rich-text marker.
    pub fn html(&self) -> Option<&str> {
        match self {
            Self::Html(markup) => Some(markup),
            Self::Plain(_) => None,
        }
    }
}

/// One inbound message, delivered by the host after it is durably stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub message_id: MessageId,
    pub conversation: ConversationRef,
    pub kind: ChannelKind,
    pub author: Option<PartnerId>,
    #[serde(default)]
    pub author_is_operator: bool,
    pub body: MessageBody,
    /// Display label of the conversation, used for name-based matching.
    #[serde(default)]
    pub record_name: String,
    pub livechat_channel: Option<LivechatChannelId>,
    pub received_at: DateTime<Utc>,
}

/// A reply to post into a conversation, impersonating a host user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Rendered HTML markup.
    pub content: String,
    pub post_as: UserId,
    /// Post with elevated privileges; livechat conversations require it.
    #[serde(default)]
    pub elevated: bool,
}

#[cfg(test)]
mod tests {
    use super::{ChannelKind, MessageBody};

    #[test]
    fn channel_kind_falls_back_to_other() {
        let kind: ChannelKind = serde_json::from_str(r#""livechat""#).expect("parse kind");
        assert_eq!(kind, ChannelKind::Livechat);
        let kind: ChannelKind = serde_json::from_str(r#""group""#).expect("parse unknown kind");
        assert_eq!(kind, ChannelKind::Other);
    }

    #[test]
    fn body_blankness_ignores_whitespace() {
        assert!(MessageBody::Plain("   ".to_string()).is_blank());
        assert!(!MessageBody::Html("<p>hi</p>".to_string()).is_blank());
    }

    #[test]
    fn only_html_bodies_expose_markup() {
        assert_eq!(MessageBody::Plain("hi".to_string()).html(), None);
        assert_eq!(
            MessageBody::Html("<p>hi</p>".to_string()).html(),
            Some("<p>hi</p>")
        );
    }
}
