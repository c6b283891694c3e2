//! Entity models shared by the store, the sync engine, and the CLI.
//!
//! All timestamps are UTC; `None` means "never" (the remote did not report
//! one). Derived fields (`touched_at`, `search_text`) are recomputed by the
//! store on every write — the values carried here are whatever was last
//! read back, never an independent source of truth.

pub mod text;
pub mod time;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Entity kinds ────────────────────────────────────────────────────────────

/// One synchronizable entity type. Doubles as the bookkeeping key namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Team,
    Channel,
    ChannelMessage,
    Chat,
    ChatMember,
    ChatMessage,
    Event,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Team => "teams",
            EntityKind::Channel => "channels",
            EntityKind::ChannelMessage => "channel_messages",
            EntityKind::Chat => "chats",
            EntityKind::ChatMember => "chat_members",
            EntityKind::ChatMessage => "chat_messages",
            EntityKind::Event => "events",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Message bodies ──────────────────────────────────────────────────────────

/// Content type of a message or event body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    #[default]
    Text,
    Html,
}

impl BodyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BodyKind::Text => "text",
            BodyKind::Html => "html",
        }
    }

    /// Lenient parse; anything that is not "html" is treated as plain text.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("html") {
            BodyKind::Html
        } else {
            BodyKind::Text
        }
    }
}

// ─── Teams & channels ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub display_name: String,
    pub description: Option<String>,
    pub web_url: Option<String>,
    /// When this team's channel list was last fully synced.
    pub channels_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    /// May reference a team that has since disappeared upstream.
    pub team_id: String,
    pub display_name: String,
    pub description: Option<String>,
    pub web_url: String,
    pub delta_synced_at: Option<DateTime<Utc>>,
    pub full_synced_at: Option<DateTime<Utc>>,
}

/// A message posted to a team channel. `reply_to_id` is empty for top-level
/// messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub id: String,
    pub channel_id: String,
    pub reply_to_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub author_id: String,
    /// Empty/whitespace subjects are normalized to `None` during mapping.
    pub subject: Option<String>,
    pub body: String,
    pub body_kind: BodyKind,
    /// Derived: lower-cased, markup-stripped subject+body, or `None` when it
    /// would not differ from the raw fields.
    pub search_text: Option<String>,
    /// Derived: max(created, modified, deleted).
    pub touched_at: Option<DateTime<Utc>>,
}

impl ChannelMessage {
    pub fn compute_touched(&self) -> Option<DateTime<Utc>> {
        time::touched(self.created_at, self.modified_at, self.deleted_at)
    }

    pub fn compute_search_text(&self) -> Option<String> {
        text::search_text(self.subject.as_deref(), &self.body, self.body_kind)
    }
}

// ─── Chats ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub topic: Option<String>,
    /// Remote vocabulary, e.g. "oneOnOne" or "group". Stored as-is.
    pub chat_type: String,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub members_synced_at: Option<DateTime<Utc>>,
    pub messages_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMember {
    pub id: String,
    pub chat_id: String,
    pub user_id: String,
    pub display_name: Option<String>,
}

/// Like [`ChannelMessage`] but without subject or reply threading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub author_id: String,
    pub body: String,
    pub body_kind: BodyKind,
    pub search_text: Option<String>,
    pub touched_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn compute_touched(&self) -> Option<DateTime<Utc>> {
        time::touched(self.created_at, self.modified_at, self.deleted_at)
    }

    pub fn compute_search_text(&self) -> Option<String> {
        text::search_text(None, &self.body, self.body_kind)
    }
}

// ─── Calendar ────────────────────────────────────────────────────────────────

/// A calendar event. Exclusively owns its attendees: they are replaced on
/// every event upsert and removed when the event is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub organizer_name: Option<String>,
    pub organizer_mail: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub subject: String,
    pub body: String,
    pub body_kind: BodyKind,
    pub is_all_day: bool,
    pub is_cancelled: bool,
    pub web_link: String,
    pub search_text: Option<String>,
    pub attendees: Vec<Attendee>,
}

impl Event {
    pub fn compute_search_text(&self) -> Option<String> {
        let subject = if self.subject.trim().is_empty() {
            None
        } else {
            Some(self.subject.as_str())
        };
        text::search_text(subject, &self.body, self.body_kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    pub event_id: String,
    pub is_organizer: bool,
    pub name: Option<String>,
    pub mail: Option<String>,
    /// Remote vocabulary, e.g. "required" / "optional".
    pub participation: String,
    /// Remote vocabulary, e.g. "accepted" / "declined" / "none".
    pub response: String,
}

// ─── Directory ───────────────────────────────────────────────────────────────

/// One user-id → display-name mapping. Never deleted, only refreshed when a
/// strictly newer observation carries a different name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: String,
    pub display_name: String,
    pub updated_at: DateTime<Utc>,
}
