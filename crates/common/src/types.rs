//! Wire-facing message and response types shared by every channel adapter.

use serde::{Deserialize, Serialize};

/// Messaging channel a conversation lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Whatsapp,
    Email,
    Sms,
}

impl ChannelType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whatsapp => "whatsapp",
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }

    /// Parse the stored string form back into a channel type.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "whatsapp" => Some(Self::Whatsapp),
            "email" => Some(Self::Email),
            "sms" => Some(Self::Sms),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of content an inbound message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Document,
    Audio,
    Video,
    Location,
    Contact,
}

impl MessageKind {
    /// Whether this kind carries downloadable binary content.
    #[must_use]
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Image | Self::Document | Self::Audio | Self::Video)
    }
}

/// Reference to a piece of inbound media, as provided by the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// A single inbound message, normalized across channels.
///
/// Channel adapters construct this from their provider payloads; the agent
/// core never sees provider-specific shapes outside of `raw`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel: ChannelType,
    /// Raw sender identifier (phone number, email address).
    pub sender: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub kind: MessageKind,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media: Option<MediaRef>,
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Email only.
    #[serde(default)]
    pub subject: Option<String>,
    /// Email only.
    #[serde(default)]
    pub in_reply_to: Option<String>,
    /// Email only.
    #[serde(default)]
    pub references: Vec<String>,
    /// Channel-specific payload, kept for forensics.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl InboundMessage {
    /// Convenience constructor for a plain text message.
    #[must_use]
    pub fn text(channel: ChannelType, sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            channel,
            sender: sender.into(),
            sender_name: None,
            kind: MessageKind::Text,
            text: Some(body.into()),
            media: None,
            thread_id: None,
            subject: None,
            in_reply_to: None,
            references: Vec::new(),
            raw: serde_json::Value::Null,
        }
    }

    /// Text body of the message, empty when absent.
    #[must_use]
    pub fn text_body(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Thread key for session lookup. Channels without native threading
    /// collapse to one thread per peer.
    #[must_use]
    pub fn thread_key(&self) -> &str {
        self.thread_id.as_deref().unwrap_or(&self.sender)
    }
}

/// Outbound response produced by one agent turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub requires_confirmation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<String>,
}

impl AgentResponse {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            requires_confirmation: false,
            confirmation_prompt: None,
            data: None,
            quick_replies: Vec::new(),
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::ok(message)
        }
    }

    /// A response that asks the user to confirm before anything executes.
    #[must_use]
    pub fn confirm(message: impl Into<String>, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        Self {
            requires_confirmation: true,
            confirmation_prompt: Some(prompt),
            quick_replies: vec!["yes".into(), "no".into()],
            ..Self::ok(message)
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
