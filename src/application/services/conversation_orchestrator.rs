use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use serde::Deserialize;

use crate::application::ports::{
    AttachmentFetcher, CompletionClient, CompletionError, CompletionMessage, CompletionRequest,
};
use crate::domain::{
    Attachment, Conversation, ConversationId, GUEST_USER_ID, Message, MessageContent, MessageId,
    MessageRole,
};
use crate::infrastructure::observability::sanitize_prompt;

use super::attachment_assembler::{AttachmentAssembler, text_with_references};
use super::display_filter::dedupe_for_display;
use super::message_store::MessageStore;

pub const ERROR_REPLY: &str =
    "Sorry, I encountered an error while generating a response. Please try again.";
pub const CONFIG_ERROR_REPLY: &str =
    "The chat service is not configured. Please contact the administrator.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    AwaitingReply,
    StreamingReply,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    Batched,
    #[default]
    Streaming,
}

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub user_id: String,
    pub mode: ReplyMode,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Prepended to every outbound request; never stored.
    pub system_prompt: Option<String>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            user_id: GUEST_USER_ID.to_string(),
            mode: ReplyMode::default(),
            model: None,
            max_tokens: None,
            temperature: None,
            system_prompt: None,
        }
    }
}

/// How an accepted request ended. Failures are already reflected in the
/// store by the time this is returned.
#[derive(Debug)]
pub enum ReplyOutcome {
    Completed {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    Failed {
        conversation_id: ConversationId,
        /// The synthetic error reply, when one was appended.
        message_id: Option<MessageId>,
        error: CompletionError,
    },
}

impl ReplyOutcome {
    pub fn conversation_id(&self) -> ConversationId {
        match self {
            ReplyOutcome::Completed {
                conversation_id, ..
            }
            | ReplyOutcome::Failed {
                conversation_id, ..
            } => *conversation_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ReplyOutcome::Completed { .. })
    }
}

/// Requests refused before anything was written or sent.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("conversation {0} already has a request in flight")]
    Busy(ConversationId),
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),
    #[error("message {0} is not an assistant reply")]
    NotRegenerable(MessageId),
    #[error("no user message precedes {0}")]
    NothingToRegenerate(MessageId),
    #[error("message is empty")]
    EmptyMessage,
    #[error("requests are still in flight")]
    RequestsInFlight,
}

type Flights = Mutex<HashMap<ConversationId, ConversationState>>;

/// Drives user actions through the store and the completion client.
///
/// Each conversation runs its own `Idle -> AwaitingReply -> StreamingReply ->
/// Idle` cycle and at most one request per conversation is in flight. Locks
/// are only held between suspension points, always `flights` before `store`.
pub struct ConversationOrchestrator<C: CompletionClient + ?Sized> {
    store: Arc<Mutex<MessageStore>>,
    client: Arc<C>,
    assembler: Option<AttachmentAssembler>,
    options: OrchestratorOptions,
    flights: Flights,
}

impl<C: CompletionClient + ?Sized> ConversationOrchestrator<C> {
    pub fn new(
        store: Arc<Mutex<MessageStore>>,
        client: Arc<C>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            store,
            client,
            assembler: None,
            options,
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Enables inlining of image attachments. Without it every attachment is
    /// only referenced by name.
    pub fn with_attachments(mut self, fetcher: Arc<dyn AttachmentFetcher>) -> Self {
        self.assembler = Some(AttachmentAssembler::new(fetcher));
        self
    }

    /// Direct access to the shared store. Do not mutate a conversation that
    /// has a request in flight.
    pub fn store(&self) -> MutexGuard<'_, MessageStore> {
        lock(&self.store)
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub fn state(&self, conversation_id: ConversationId) -> ConversationState {
        lock(&self.flights)
            .get(&conversation_id)
            .copied()
            .unwrap_or(ConversationState::Idle)
    }

    /// The current conversation's messages as they should be rendered.
    pub fn visible_messages(&self) -> Vec<Message> {
        let store = self.store();
        match store.current_conversation() {
            Some(conversation) => dedupe_for_display(&conversation.messages),
            None => Vec::new(),
        }
    }

    /// Most recent assistant reply in the current conversation.
    pub fn last_reply_id(&self) -> Option<MessageId> {
        let store = self.store();
        store
            .current_conversation()?
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.id)
    }

    /// Deselects the current conversation without deleting anything.
    pub fn new_chat(&self) {
        let mut store = self.store();
        store.set_current(None);
        store.clear_error();
    }

    /// Returns `false` when `conversation_id` is already selected.
    pub fn select_conversation(&self, conversation_id: ConversationId) -> bool {
        let mut store = self.store();
        if store.current_id() == Some(conversation_id) {
            return false;
        }
        store.set_current(Some(conversation_id));
        store.clear_error();
        true
    }

    pub fn clear_all(&self) -> Result<(), OrchestratorError> {
        let flights = lock(&self.flights);
        if !flights.is_empty() {
            return Err(OrchestratorError::RequestsInFlight);
        }
        let mut store = self.store();
        store.clear_all();
        store.clear_error();
        Ok(())
    }

    /// Sends a user turn to the current conversation, creating one when none
    /// is selected. The user message is stored before the request goes out.
    pub async fn send(
        &self,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<ReplyOutcome, OrchestratorError> {
        if text.trim().is_empty() && attachments.is_empty() {
            return Err(OrchestratorError::EmptyMessage);
        }

        let current = self.store().current_conversation().map(|c| c.id);
        if let Some(conversation_id) = current {
            if self.state(conversation_id) != ConversationState::Idle {
                return Err(OrchestratorError::Busy(conversation_id));
            }
        }

        let content = match &self.assembler {
            Some(assembler) => assembler.assemble(text, attachments).await,
            None => text_with_references(text, attachments),
        };
        let title_source = if text.trim().is_empty() {
            content.display_text()
        } else {
            text.to_string()
        };

        let (guard, request) = self.begin_flight(
            |store| {
                if let Some(conversation) = store.current_conversation() {
                    return Ok(conversation.id);
                }
                let conversation =
                    Conversation::started_with(self.options.user_id.clone(), &title_source);
                let conversation_id = conversation.id;
                tracing::info!(conversation_id = %conversation_id, "Created conversation");
                store.add_conversation(conversation);
                Ok(conversation_id)
            },
            |store, conversation_id| {
                store.add_message(Message::user(conversation_id, content));
                Ok(self.request_for(store.messages(conversation_id)))
            },
        )?;

        tracing::info!(
            conversation_id = %guard.conversation_id,
            prompt = %sanitize_prompt(text),
            attachments = attachments.len(),
            "Sending message"
        );

        Ok(self.run(guard, request).await)
    }

    /// Replaces an assistant reply: the reply is removed and the history that
    /// precedes it, up to the last user message, is sent again.
    pub async fn regenerate(
        &self,
        message_id: MessageId,
    ) -> Result<ReplyOutcome, OrchestratorError> {
        let (guard, request) = self.begin_flight(
            |store| {
                let (conversation, index) = store
                    .find_message(message_id)
                    .ok_or(OrchestratorError::MessageNotFound(message_id))?;
                if conversation.messages[index].role != MessageRole::Assistant {
                    return Err(OrchestratorError::NotRegenerable(message_id));
                }
                Ok(conversation.id)
            },
            |store, conversation_id| {
                let messages = store.messages(conversation_id);
                let index = messages
                    .iter()
                    .position(|m| m.id == message_id)
                    .ok_or(OrchestratorError::MessageNotFound(message_id))?;
                let prefix = &messages[..index];
                let last_user = prefix
                    .iter()
                    .rposition(|m| m.role == MessageRole::User)
                    .ok_or(OrchestratorError::NothingToRegenerate(message_id))?;
                let request = self.request_for(&prefix[..=last_user]);
                store.remove_message(message_id);
                Ok(request)
            },
        )?;

        tracing::info!(
            conversation_id = %guard.conversation_id,
            message_id = %message_id,
            history = request.messages.len(),
            "Regenerating reply"
        );

        Ok(self.run(guard, request).await)
    }

    /// Runs `resolve` and `prepare` as one atomic step: either the
    /// conversation is marked in flight and `prepare`'s writes are applied,
    /// or nothing changes.
    fn begin_flight<T>(
        &self,
        resolve: impl FnOnce(&mut MessageStore) -> Result<ConversationId, OrchestratorError>,
        prepare: impl FnOnce(&mut MessageStore, ConversationId) -> Result<T, OrchestratorError>,
    ) -> Result<(FlightGuard<'_>, T), OrchestratorError> {
        let mut flights = lock(&self.flights);
        let mut store = lock(&self.store);

        let conversation_id = resolve(&mut store)?;
        if flights.contains_key(&conversation_id) {
            tracing::warn!(conversation_id = %conversation_id, "Conversation busy, request refused");
            return Err(OrchestratorError::Busy(conversation_id));
        }

        let prepared = prepare(&mut store, conversation_id)?;
        flights.insert(conversation_id, ConversationState::AwaitingReply);
        store.set_loading(true);
        store.clear_error();

        Ok((
            FlightGuard {
                flights: &self.flights,
                store: &self.store,
                conversation_id,
            },
            prepared,
        ))
    }

    fn request_for(&self, history: &[Message]) -> CompletionRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(prompt) = &self.options.system_prompt {
            messages.push(CompletionMessage::new(MessageRole::System, prompt.as_str()));
        }
        messages.extend(history.iter().map(CompletionMessage::from));

        CompletionRequest {
            messages,
            model: self.options.model.clone(),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        }
    }

    async fn run(&self, guard: FlightGuard<'_>, request: CompletionRequest) -> ReplyOutcome {
        match self.options.mode {
            ReplyMode::Batched => self.run_batched(&guard, &request).await,
            ReplyMode::Streaming => self.run_streaming(&guard, &request).await,
        }
    }

    async fn run_batched(&self, guard: &FlightGuard<'_>, request: &CompletionRequest) -> ReplyOutcome {
        let conversation_id = guard.conversation_id;

        match self.client.complete(request).await {
            Ok(reply) if reply.is_empty() => {
                self.fail(conversation_id, CompletionError::EmptyCompletion, true)
            }
            Ok(reply) => {
                let message = Message::assistant(conversation_id, reply);
                let message_id = message.id;
                self.store().add_message(message);
                tracing::info!(conversation_id = %conversation_id, "Reply received");
                ReplyOutcome::Completed {
                    conversation_id,
                    message_id,
                }
            }
            Err(e) => self.fail(conversation_id, e, true),
        }
    }

    async fn run_streaming(
        &self,
        guard: &FlightGuard<'_>,
        request: &CompletionRequest,
    ) -> ReplyOutcome {
        let conversation_id = guard.conversation_id;

        let mut fragments = match self.client.complete_stream(request).await {
            Ok(stream) => stream,
            Err(e) => return self.fail(conversation_id, e, true),
        };

        let mut accumulated = String::new();
        let mut provisional: Option<MessageId> = None;

        while let Some(item) = fragments.next().await {
            let fragment = match item {
                Ok(fragment) => fragment,
                // Partial text stays as it is.
                Err(e) => return self.fail(conversation_id, e, provisional.is_none()),
            };
            if fragment.is_empty() {
                continue;
            }
            accumulated.push_str(&fragment);

            match provisional {
                Some(message_id) => {
                    self.store()
                        .update_message(message_id, MessageContent::text(accumulated.clone()));
                }
                None => {
                    guard.transition(ConversationState::StreamingReply);
                    let message = Message::assistant(conversation_id, accumulated.clone());
                    provisional = Some(message.id);
                    self.store().add_message(message);
                }
            }
        }

        match provisional {
            Some(message_id) => {
                tracing::info!(
                    conversation_id = %conversation_id,
                    chars = accumulated.chars().count(),
                    "Stream finished"
                );
                ReplyOutcome::Completed {
                    conversation_id,
                    message_id,
                }
            }
            None => self.fail(conversation_id, CompletionError::EmptyCompletion, true),
        }
    }

    fn fail(
        &self,
        conversation_id: ConversationId,
        error: CompletionError,
        append_reply: bool,
    ) -> ReplyOutcome {
        tracing::error!(
            conversation_id = %conversation_id,
            error = %error,
            config = error.is_config(),
            "Completion failed"
        );

        let mut store = self.store();
        store.set_error(Some(error.to_string()));
        let message_id = append_reply.then(|| {
            let message = Message::assistant(conversation_id, failure_reply(&error));
            let message_id = message.id;
            store.add_message(message);
            message_id
        });

        ReplyOutcome::Failed {
            conversation_id,
            message_id,
            error,
        }
    }
}

/// Fixed text shown in place of a reply that could not be produced.
pub fn failure_reply(error: &CompletionError) -> &'static str {
    if error.is_config() {
        CONFIG_ERROR_REPLY
    } else {
        ERROR_REPLY
    }
}

/// Marks a conversation in flight; dropping it returns the conversation to
/// `Idle`, including when the owning future is dropped mid-request.
struct FlightGuard<'a> {
    flights: &'a Flights,
    store: &'a Mutex<MessageStore>,
    conversation_id: ConversationId,
}

impl FlightGuard<'_> {
    fn transition(&self, state: ConversationState) {
        lock(self.flights).insert(self.conversation_id, state);
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut flights = lock(self.flights);
        flights.remove(&self.conversation_id);
        if flights.is_empty() {
            lock(self.store).set_loading(false);
        }
        tracing::debug!(conversation_id = %self.conversation_id, "Conversation idle");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
