use tokio::sync::broadcast;

use crate::domain::{Conversation, ConversationId, Message, MessageContent, MessageId};

const EVENT_CAPACITY: usize = 256;

/// Change notification published synchronously from inside every mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    ConversationAdded(ConversationId),
    CurrentChanged(Option<ConversationId>),
    MessageAdded(Message),
    MessageUpdated(Message),
    MessageRemoved {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    Cleared,
    LoadingChanged(bool),
    ErrorChanged(Option<String>),
}

/// In-memory table of conversations and their messages.
///
/// Every operation is synchronous and applies completely or not at all.
/// Conversations are kept newest-first; messages keep insertion order.
pub struct MessageStore {
    conversations: Vec<Conversation>,
    current: Option<ConversationId>,
    loading: bool,
    error: Option<String>,
    revision: u64,
    events: broadcast::Sender<StoreEvent>,
}

impl MessageStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            conversations: Vec::new(),
            current: None,
            loading: false,
            error: None,
            revision: 0,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Bumped once per applied mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Inserts at the front of the list and makes it current.
    /// A duplicate id is a caller bug and leaves the store untouched.
    pub fn add_conversation(&mut self, conversation: Conversation) {
        if self.conversations.iter().any(|c| c.id == conversation.id) {
            tracing::error!(conversation_id = %conversation.id, "Conversation already exists");
            return;
        }

        let id = conversation.id;
        self.conversations.insert(0, conversation);
        self.current = Some(id);
        self.publish(StoreEvent::ConversationAdded(id));
        self.publish(StoreEvent::CurrentChanged(Some(id)));
    }

    /// Pointer change only; an unknown id simply yields an empty view.
    pub fn set_current(&mut self, conversation_id: Option<ConversationId>) {
        self.current = conversation_id;
        self.publish(StoreEvent::CurrentChanged(conversation_id));
    }

    /// Appends `message` to its conversation. Returns `false` without changing
    /// anything when the id is already present or the conversation is unknown.
    pub fn add_message(&mut self, message: Message) -> bool {
        let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|c| c.id == message.conversation_id)
        else {
            tracing::warn!(
                conversation_id = %message.conversation_id,
                message_id = %message.id,
                "Dropping message for unknown conversation"
            );
            return false;
        };

        if conversation.contains_message(&message) {
            tracing::debug!(message_id = %message.id, "Message already exists, skipping");
            return false;
        }

        tracing::debug!(
            message_id = %message.id,
            role = %message.role,
            "Adding message"
        );
        conversation.updated_at = message.created_at.max(conversation.updated_at);
        conversation.messages.push(message.clone());
        self.publish(StoreEvent::MessageAdded(message));
        true
    }

    /// Replaces the content of the first message with `message_id`.
    pub fn update_message(&mut self, message_id: MessageId, content: MessageContent) -> bool {
        let updated = self
            .conversations
            .iter_mut()
            .flat_map(|c| c.messages.iter_mut())
            .find(|m| m.id == message_id)
            .map(|message| {
                message.content = content;
                message.clone()
            });

        match updated {
            Some(message) => {
                self.publish(StoreEvent::MessageUpdated(message));
                true
            }
            None => false,
        }
    }

    /// Deletes the first message with `message_id` and hands it back.
    pub fn remove_message(&mut self, message_id: MessageId) -> Option<Message> {
        let removed = self.conversations.iter_mut().find_map(|conversation| {
            conversation
                .messages
                .iter()
                .position(|m| m.id == message_id)
                .map(|index| conversation.messages.remove(index))
        })?;

        self.publish(StoreEvent::MessageRemoved {
            conversation_id: removed.conversation_id,
            message_id,
        });
        Some(removed)
    }

    pub fn clear_all(&mut self) {
        self.conversations.clear();
        self.current = None;
        self.publish(StoreEvent::Cleared);
    }

    pub fn set_loading(&mut self, loading: bool) {
        if self.loading != loading {
            self.loading = loading;
            self.publish(StoreEvent::LoadingChanged(loading));
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error.clone();
        self.publish(StoreEvent::ErrorChanged(error));
    }

    pub fn clear_error(&mut self) {
        if self.error.is_some() {
            self.set_error(None);
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, conversation_id: ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    pub fn current_id(&self) -> Option<ConversationId> {
        self.current
    }

    pub fn current_conversation(&self) -> Option<&Conversation> {
        self.current.and_then(|id| self.conversation(id))
    }

    /// Messages of a conversation, or an empty slice when it is unknown.
    pub fn messages(&self, conversation_id: ConversationId) -> &[Message] {
        self.conversation(conversation_id)
            .map(|c| c.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Locates a message and its position inside its conversation.
    pub fn find_message(&self, message_id: MessageId) -> Option<(&Conversation, usize)> {
        self.conversations.iter().find_map(|conversation| {
            conversation
                .messages
                .iter()
                .position(|m| m.id == message_id)
                .map(|index| (conversation, index))
        })
    }

    /// Conversations whose title or any message text contains `term`,
    /// ignoring case. An empty term matches everything.
    pub fn search(&self, term: &str) -> Vec<&Conversation> {
        let needle = term.trim().to_lowercase();
        self.conversations
            .iter()
            .filter(|conversation| {
                needle.is_empty()
                    || conversation
                        .title
                        .as_deref()
                        .is_some_and(|title| title.to_lowercase().contains(&needle))
                    || conversation
                        .messages
                        .iter()
                        .any(|m| m.content.contains_text(&needle))
            })
            .collect()
    }

    fn publish(&mut self, event: StoreEvent) {
        self.revision += 1;
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}
