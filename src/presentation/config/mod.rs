mod environment;
mod settings;

pub use environment::Environment;
pub use settings::{
    ChatSettings, DEFAULT_CHAT_MODEL, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
    DEFAULT_UPLOAD_LIMIT_MB, LlmProvider, LlmSettings, ServerSettings, Settings, UploadSettings,
};
