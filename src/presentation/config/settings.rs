use config::{Config, ConfigError, Environment as EnvironmentSource, File};
use serde::Deserialize;

use crate::application::services::ReplyMode;
use crate::domain::GUEST_USER_ID;

use super::Environment;

pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_UPLOAD_LIMIT_MB: usize = 10;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub uploads: UploadSettings,
    pub chat: ChatSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "lmstudio")]
    LmStudio,
    Azure,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    /// Required for `lmstudio`; the resource endpoint for `azure`.
    pub base_url: Option<String>,
    /// Empty means "not configured"; requests then fail with a config error.
    pub api_key: String,
    pub chat_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub sse_keep_alive_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: None,
            api_key: String::new(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            sse_keep_alive_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub dir: String,
    pub max_file_size_mb: usize,
}

impl UploadSettings {
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            dir: "uploads".to_string(),
            max_file_size_mb: DEFAULT_UPLOAD_LIMIT_MB,
        }
    }
}

/// Client-side settings used by the `ringo` terminal front end.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub endpoint: String,
    pub mode: ReplyMode,
    pub user_id: String,
    pub system_prompt: Option<String>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000".to_string(),
            mode: ReplyMode::Streaming,
            user_id: GUEST_USER_ID.to_string(),
            system_prompt: None,
        }
    }
}

impl Settings {
    /// Layers `config/default.toml`, `config/<env>.toml` and `RINGO__*`
    /// environment variables, all optional.
    pub fn load(environment: Environment) -> Result<Self, ConfigError> {
        let mut settings: Settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                File::with_name(&format!("config/{}", environment.as_str().to_lowercase()))
                    .required(false),
            )
            .add_source(EnvironmentSource::with_prefix("RINGO").separator("__"))
            .build()?
            .try_deserialize()?;

        if settings.llm.api_key.is_empty() {
            settings.llm.api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let settings: Settings = Config::builder()
            .add_source(config::File::from_str(
                "[llm]\nchat_model = \"gpt-4o-mini\"\n[chat]\nmode = \"batched\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.llm.chat_model, "gpt-4o-mini");
        assert_eq!(settings.llm.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(settings.llm.provider, LlmProvider::OpenAi);
        assert_eq!(settings.chat.mode, ReplyMode::Batched);
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.uploads.max_file_size_bytes(), 10 * 1024 * 1024);
    }
}
