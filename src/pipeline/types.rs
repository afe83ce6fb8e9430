//! Shared types for the triage pipeline.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Inbound event ───────────────────────────────────────────────────

/// Kind of an inbound conversation item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Quote,
    System,
    Pat,
    Image,
    Video,
    Voice,
    File,
    /// Anything the host decodes but the pipeline has no handler for.
    #[serde(other)]
    Other,
}

/// A room or contact as the host sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable protocol identifier (wxid, chatroom id).
    pub username: String,
    /// Name shown in the client UI.
    #[serde(default)]
    pub display_name: String,
}

impl Participant {
    pub fn new(username: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            display_name: display_name.into(),
        }
    }
}

/// The item a Quote event replies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedMessage {
    #[serde(default)]
    pub content: String,
    /// Whether the quoted item was authored by the bot.
    #[serde(default)]
    pub is_self: bool,
}

/// One decoded inbound conversation item.
///
/// The host builds this once and hands it to a single pipeline run; handlers
/// only ever see it by shared reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: MessageKind,
    /// Raw content as stored by the client (JSON for some system notices).
    #[serde(default)]
    pub content: String,
    /// Display text with client markup resolved.
    #[serde(default)]
    pub parsed_content: String,
    /// Notification title, e.g. `"Alice" 拍了拍我` for pats.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub quote: Option<QuotedMessage>,
    /// Account that was patted, for Pat events.
    #[serde(default)]
    pub patted_username: Option<String>,
    #[serde(default)]
    pub is_chatroom: bool,
    /// The bot was @-mentioned.
    #[serde(default)]
    pub is_at: bool,
    #[serde(default)]
    pub room: Option<Participant>,
    #[serde(default)]
    pub contact: Option<Participant>,
    /// Conversation name the RPA executor navigates to.
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub file_name: Option<String>,
    /// Handle of the history store this event was read from.
    #[serde(default)]
    pub message_db_path: Option<String>,
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl Event {
    /// Create an event with empty optional fields.
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            kind,
            parsed_content: content.clone(),
            content,
            title: String::new(),
            quote: None,
            patted_username: None,
            is_chatroom: false,
            is_at: false,
            room: None,
            contact: None,
            target: String::new(),
            file_name: None,
            message_db_path: None,
            received_at: Utc::now(),
        }
    }

    /// Mark the event as coming from a group chat.
    pub fn in_room(mut self, room: Participant) -> Self {
        self.is_chatroom = true;
        if self.target.is_empty() {
            self.target = room.display_name.clone();
        }
        self.room = Some(room);
        self
    }

    pub fn from_contact(mut self, contact: Participant) -> Self {
        if self.target.is_empty() && !self.is_chatroom {
            self.target = contact.display_name.clone();
        }
        self.contact = Some(contact);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_quote(mut self, quote: QuotedMessage) -> Self {
        self.quote = Some(quote);
        self
    }

    pub fn with_patted(mut self, username: impl Into<String>) -> Self {
        self.patted_username = Some(username.into());
        self
    }

    pub fn with_mention(mut self) -> Self {
        self.is_at = true;
        self
    }

    pub fn with_store(mut self, handle: impl Into<String>) -> Self {
        self.message_db_path = Some(handle.into());
        self
    }

    /// Identifier of the conversation: the room for groups, the contact otherwise.
    pub fn conversation_id(&self) -> Option<&str> {
        if self.is_chatroom {
            self.room.as_ref().map(|r| r.username.as_str())
        } else {
            self.contact.as_ref().map(|c| c.username.as_str())
        }
    }

    /// Display name replies are sent to.
    pub fn reply_target(&self) -> Option<&str> {
        self.room
            .as_ref()
            .or(self.contact.as_ref())
            .map(|p| p.display_name.as_str())
    }

    pub fn is_conversational(&self) -> bool {
        matches!(self.kind, MessageKind::Text | MessageKind::Quote)
    }
}

// ── Actions ─────────────────────────────────────────────────────────

/// A side effect for the external executor to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    SendText {
        content: String,
        target: String,
        is_chatroom: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quote_message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        at_user_name: Option<String>,
    },
    SendImage {
        image_path: PathBuf,
        target: String,
        is_chatroom: bool,
    },
    DownloadImage {
        target: String,
    },
    DownloadVideo {
        target: String,
        is_chatroom: bool,
    },
    Pat {
        target: String,
        user_name: String,
        is_chatroom: bool,
    },
}

impl Action {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SendText { .. } => "send_text",
            Self::SendImage { .. } => "send_image",
            Self::DownloadImage { .. } => "download_image",
            Self::DownloadVideo { .. } => "download_video",
            Self::Pat { .. } => "pat",
        }
    }
}
