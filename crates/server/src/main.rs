use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;
use voice_agent_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = voice_agent_config::load_settings()?;

    init_tracing(&settings);

    let prometheus_handle = if settings.observability.metrics_enabled {
        Some(PrometheusBuilder::new().install_recorder()?)
    } else {
        None
    };

    if !voice_agent_config::providers_ready(&settings) {
        tracing::warn!(
            "one or more provider API keys are not set (STT_API_KEY, LLM_API_KEY, TTS_API_KEY, TTS_DEFAULT_VOICE_ID); \
             the server will start but turns will fail at the LLM/TTS admission step"
        );
    }

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = AppState::with_prometheus_handle(settings, prometheus_handle)?;
    let router = voice_agent_server::http::create_router(state);

    tracing::info!(%addr, "starting voice-agent-server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(settings: &voice_agent_config::Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.observability.log_filter.clone()));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.observability.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining connections");
}
