use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    #[serde(default = "default_stt_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_end_of_turn_confidence")]
    pub end_of_turn_confidence_threshold: f32,
    #[serde(default = "default_min_end_of_turn_silence_ms")]
    pub min_end_of_turn_silence_ms: u64,
    #[serde(default = "default_max_turn_silence_ms")]
    pub max_turn_silence_ms: u64,
    #[serde(default = "default_punctuation_merge_window_s")]
    pub punctuation_merge_window_s: f64,
    /// Loaded from `STT_API_KEY` at startup, never from a config file.
    #[serde(skip)]
    pub api_key: String,
}

fn default_stt_sample_rate() -> u32 {
    16_000
}
fn default_end_of_turn_confidence() -> f32 {
    0.7
}
fn default_min_end_of_turn_silence_ms() -> u64 {
    800
}
fn default_max_turn_silence_ms() -> u64 {
    1_500
}
fn default_punctuation_merge_window_s() -> f64 {
    2.0
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_stt_sample_rate(),
            end_of_turn_confidence_threshold: default_end_of_turn_confidence(),
            min_end_of_turn_silence_ms: default_min_end_of_turn_silence_ms(),
            max_turn_silence_ms: default_max_turn_silence_ms(),
            punctuation_merge_window_s: default_punctuation_merge_window_s(),
            api_key: String::new(),
        }
    }
}

/// The fixed system persona prepended to every LLM session, grounded in the
/// "Aria" persona from the original conversational assistant: an assistant
/// with a consistent, professional voice rather than a generic "you are a
/// helpful assistant" stand-in.
pub fn default_persona() -> String {
    "You are Aria, an Advanced Responsive Intelligence Assistant. You embody \
     the sophistication and helpfulness of a dedicated personal assistant. \
     You address the user respectfully, maintain a professional and courteous \
     tone, and keep replies concise and natural for spoken conversation rather \
     than written text."
        .to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_persona")]
    pub system_persona: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Safety categories the host app unblocks rather than letting the
    /// provider's default moderation refuse mid-conversation. Expressed
    /// generically since the provider is abstract; a concrete backend maps
    /// these onto its own safety-setting API.
    #[serde(default = "default_unblocked_categories")]
    pub unblocked_categories: Vec<String>,
    /// Loaded from `LLM_API_KEY` at startup, never from a config file.
    #[serde(skip)]
    pub api_key: String,
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    250
}
fn default_unblocked_categories() -> Vec<String> {
    vec![
        "harassment".to_string(),
        "hate_speech".to_string(),
        "sexually_explicit".to_string(),
        "dangerous_content".to_string(),
    ]
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            system_persona: default_persona(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            unblocked_categories: default_unblocked_categories(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_tts_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_tts_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channel_type")]
    pub channel_type: String,
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
    #[serde(default = "default_voice_style")]
    pub style: String,
    #[serde(default)]
    pub rate: i32,
    #[serde(default)]
    pub pitch: i32,
    #[serde(default = "default_variation")]
    pub variation: i32,
    /// Loaded from `TTS_DEFAULT_VOICE_ID`; empty string means "not configured".
    #[serde(skip)]
    pub default_voice_id: String,
    /// Loaded from `TTS_API_KEY` at startup, never from a config file.
    #[serde(skip)]
    pub api_key: String,
    #[serde(default = "default_silence_timeout_ms")]
    pub silence_timeout_ms: u64,
    #[serde(default = "default_soft_wait_secs")]
    pub soft_wait_secs: u64,
    #[serde(default = "default_hard_wait_secs")]
    pub hard_wait_secs: u64,
}

fn default_tts_endpoint() -> String {
    "wss://api.murf.ai/v1/speech/stream-input".to_string()
}
fn default_tts_sample_rate() -> u32 {
    44_100
}
fn default_channel_type() -> String {
    "MONO".to_string()
}
fn default_audio_format() -> String {
    "WAV".to_string()
}
fn default_voice_style() -> String {
    "Conversational".to_string()
}
fn default_variation() -> i32 {
    1
}
fn default_silence_timeout_ms() -> u64 {
    1_000
}
fn default_soft_wait_secs() -> u64 {
    90
}
fn default_hard_wait_secs() -> u64 {
    120
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_tts_endpoint(),
            sample_rate: default_tts_sample_rate(),
            channel_type: default_channel_type(),
            audio_format: default_audio_format(),
            style: default_voice_style(),
            rate: 0,
            pitch: 0,
            variation: default_variation(),
            default_voice_id: String::new(),
            api_key: String::new(),
            silence_timeout_ms: default_silence_timeout_ms(),
            soft_wait_secs: default_soft_wait_secs(),
            hard_wait_secs: default_hard_wait_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

fn default_max_requests() -> u32 {
    40
}
fn default_window_seconds() -> u64 {
    86_400
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_seconds: default_window_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub log_json: bool,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_log_filter() -> String {
    "voice_agent=info,tower_http=info".to_string()
}
fn default_metrics_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub stt: SttConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}
