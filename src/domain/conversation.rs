use super::{ConversationId, Message};
use chrono::{DateTime, Utc};

pub const GUEST_USER_ID: &str = "guest";

const TITLE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: String,
    pub title: Option<String>,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(user_id: impl Into<String>, title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            user_id: user_id.into(),
            title,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Starts a conversation titled after its first user message.
    pub fn started_with(user_id: impl Into<String>, first_message: &str) -> Self {
        Self::new(user_id, Some(title_from(first_message)))
    }

    pub fn contains_message(&self, message: &Message) -> bool {
        self.messages.iter().any(|m| m.id == message.id)
    }
}

/// First 50 characters of `text` followed by an ellipsis.
pub fn title_from(text: &str) -> String {
    let head: String = text.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}...", head)
}
