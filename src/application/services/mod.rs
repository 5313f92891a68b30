mod attachment_assembler;
mod conversation_orchestrator;
mod display_filter;
mod message_store;

pub use attachment_assembler::{AttachmentAssembler, text_with_references};
pub use conversation_orchestrator::{
    CONFIG_ERROR_REPLY, ConversationOrchestrator, ConversationState, ERROR_REPLY,
    OrchestratorError, OrchestratorOptions, ReplyMode, ReplyOutcome, failure_reply,
};
pub use display_filter::dedupe_for_display;
pub use message_store::{MessageStore, StoreEvent};
