//! Shared fixtures for the store's unit tests.

use collabsync_types::{
    time, Attendee, BodyKind, Channel, ChannelMessage, Chat, ChatMember, ChatMessage, Event, Team,
};

use crate::Store;

pub fn test_store() -> Store {
    Store::open_in_memory().expect("in-memory store")
}

pub fn team(id: &str, name: &str) -> Team {
    Team {
        id: id.to_string(),
        display_name: name.to_string(),
        description: None,
        web_url: Some(format!("https://example.com/teams/{id}")),
        channels_synced_at: None,
    }
}

pub fn channel(id: &str, team_id: &str, name: &str) -> Channel {
    Channel {
        id: id.to_string(),
        team_id: team_id.to_string(),
        display_name: name.to_string(),
        description: None,
        web_url: format!("https://example.com/channels/{id}"),
        delta_synced_at: None,
        full_synced_at: None,
    }
}

pub fn chan_msg(id: &str, channel_id: &str, created: &str) -> ChannelMessage {
    ChannelMessage {
        id: id.to_string(),
        channel_id: channel_id.to_string(),
        reply_to_id: String::new(),
        created_at: time::parse(created),
        modified_at: None,
        deleted_at: None,
        author_id: String::new(),
        subject: None,
        body: String::new(),
        body_kind: BodyKind::Text,
        search_text: None,
        touched_at: None,
    }
}

pub fn chat(id: &str) -> Chat {
    Chat {
        id: id.to_string(),
        topic: None,
        chat_type: "group".to_string(),
        created_at: time::parse("2024-01-01T00:00:00Z"),
        modified_at: None,
        members_synced_at: None,
        messages_synced_at: None,
    }
}

pub fn member(id: &str, chat_id: &str, user_id: &str) -> ChatMember {
    ChatMember {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        user_id: user_id.to_string(),
        display_name: None,
    }
}

pub fn chat_msg(id: &str, chat_id: &str, created: &str) -> ChatMessage {
    ChatMessage {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        created_at: time::parse(created),
        modified_at: None,
        deleted_at: None,
        author_id: String::new(),
        body: String::new(),
        body_kind: BodyKind::Text,
        search_text: None,
        touched_at: None,
    }
}

pub fn event(id: &str, start: &str, end: &str) -> Event {
    Event {
        id: id.to_string(),
        created_at: time::parse("2024-01-01T00:00:00Z"),
        modified_at: None,
        organizer_name: None,
        organizer_mail: None,
        start: time::parse(start).expect("start"),
        end: time::parse(end).expect("end"),
        subject: String::new(),
        body: String::new(),
        body_kind: BodyKind::Text,
        is_all_day: false,
        is_cancelled: false,
        web_link: String::new(),
        search_text: None,
        attendees: Vec::new(),
    }
}

pub fn attendee(event_id: &str, mail: &str) -> Attendee {
    Attendee {
        event_id: event_id.to_string(),
        is_organizer: false,
        name: None,
        mail: Some(mail.to_string()),
        participation: "required".to_string(),
        response: "none".to_string(),
    }
}
