mod attachment;
mod conversation;
mod conversation_id;
mod message;
mod message_content;
mod message_id;
mod message_role;
mod storage_path;

pub use attachment::{Attachment, mime_from_extension};
pub use conversation::{Conversation, GUEST_USER_ID, title_from};
pub use conversation_id::ConversationId;
pub use message::Message;
pub use message_content::{ContentPart, MessageContent};
pub use message_id::MessageId;
pub use message_role::MessageRole;
pub use storage_path::{StoragePath, UPLOADS_PREFIX};
