mod http_completion_client;
mod mock_completion_client;
mod openai_client;
mod sse;
mod wire;

pub use http_completion_client::{HttpCompletionClient, NO_RESPONSE};
pub use mock_completion_client::{MOCK_REPLY, MockCompletionClient, ScriptedReply};
pub use openai_client::{MISSING_API_KEY, OpenAiClient, create_completion_client};
pub use sse::{DONE_MARKER, SseDecoder, sse_fragments};
pub use wire::{ImageUrl, WireContent, WireMessage, WirePart};
