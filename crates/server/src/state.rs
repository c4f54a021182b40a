use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use voice_agent_config::Settings;
use voice_agent_llm::{HttpStreamingLlmBackend, LanguageModelAdapter, LlmConfig as BackendLlmConfig};
use voice_agent_pipeline::{HistoryStore, RateLimiter};

use crate::session::SessionManager;

/// Process-wide shared state, composed once at startup and handed to axum
/// via `.with_state()`. Everything here is either `Arc`-shared or
/// internally locked, so cloning `AppState` is cheap and safe across
/// connection handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub sessions: Arc<SessionManager>,
    pub rate_limiter: Arc<RateLimiter>,
    pub history: Arc<HistoryStore>,
    pub llm: LanguageModelAdapter,
    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        Self::with_prometheus_handle(settings, None)
    }

    pub fn with_prometheus_handle(
        settings: Settings,
        prometheus_handle: Option<PrometheusHandle>,
    ) -> anyhow::Result<Self> {
        let settings = Arc::new(settings);

        let backend_config = BackendLlmConfig {
            endpoint: settings.llm.endpoint.clone(),
            api_key: settings.llm.api_key.clone(),
            model: settings.llm.model.clone(),
            max_tokens: settings.llm.max_tokens,
            temperature: settings.llm.temperature,
            timeout: std::time::Duration::from_secs(settings.llm.timeout_secs),
            max_retries: settings.llm.max_retries,
            initial_backoff: std::time::Duration::from_millis(settings.llm.initial_backoff_ms),
        };
        let backend = Arc::new(HttpStreamingLlmBackend::new(backend_config)?);
        let llm = LanguageModelAdapter::new(backend);

        Ok(Self {
            rate_limiter: Arc::new(RateLimiter::new(&settings.rate_limit)),
            history: Arc::new(HistoryStore::new()),
            sessions: Arc::new(SessionManager::new()),
            llm,
            settings,
            prometheus_handle,
        })
    }
}
