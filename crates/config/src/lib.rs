//! Layered settings: built-in defaults, an optional `config/default.toml`,
//! an optional `config/{environment}.toml` overlay, then environment
//! variables (`VOICE_AGENT_*`), matching the teacher's `config`-crate-backed
//! `Settings::load` in `voice-agent-config`. Required provider API keys are
//! read directly from the environment, never from a file, so they cannot
//! be checked in by accident.

mod settings;

pub use settings::{
    LlmConfig, ObservabilityConfig, RateLimitConfig, RuntimeEnvironment, ServerConfig, Settings,
    SttConfig, TtsConfig,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Load settings from defaults, layered config files, and environment
/// variables. Missing files are not an error — a fresh checkout with no
/// `config/` directory still starts with built-in defaults, the way the
/// teacher's binary falls back to `Settings::default()` when no file is
/// present.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let env_name = std::env::var("VOICE_AGENT_ENV").unwrap_or_else(|_| "development".to_string());

    let builder = config::Config::builder()
        .add_source(config::File::with_name("config/default").required(false))
        .add_source(config::File::with_name(&format!("config/{env_name}")).required(false))
        .add_source(
            config::Environment::with_prefix("VOICE_AGENT")
                .separator("__")
                .try_parsing(true),
        );

    let mut settings: Settings = builder.build()?.try_deserialize()?;

    settings.stt.api_key = std::env::var("STT_API_KEY").unwrap_or_default();
    settings.llm.api_key = std::env::var("LLM_API_KEY").unwrap_or_default();
    settings.tts.api_key = std::env::var("TTS_API_KEY").unwrap_or_default();
    settings.tts.default_voice_id = std::env::var("TTS_DEFAULT_VOICE_ID").unwrap_or_default();

    if let Ok(port) = std::env::var("VOICE_AGENT_PORT") {
        if let Ok(port) = port.parse() {
            settings.server.port = port;
        }
    }

    Ok(settings)
}

/// Whether all four required provider credentials are present, used by the
/// `/ready` health-check handler.
pub fn providers_ready(settings: &Settings) -> bool {
    !settings.stt.api_key.is_empty()
        && !settings.llm.api_key.is_empty()
        && !settings.tts.api_key.is_empty()
        && !settings.tts.default_voice_id.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::default();
        assert_eq!(s.rate_limit.max_requests, 40);
        assert_eq!(s.rate_limit.window_seconds, 86_400);
        assert_eq!(s.stt.sample_rate, 16_000);
        assert_eq!(s.tts.silence_timeout_ms, 1_000);
    }

    #[test]
    fn providers_ready_requires_all_four() {
        let mut s = Settings::default();
        assert!(!providers_ready(&s));
        s.stt.api_key = "a".into();
        s.llm.api_key = "b".into();
        s.tts.api_key = "c".into();
        s.tts.default_voice_id = "voice-1".into();
        assert!(providers_ready(&s));
    }
}
