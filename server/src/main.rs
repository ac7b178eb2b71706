use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::{info, warn};

use server::{build_router, config::ServerConfig, AppState};
use tts_core::{AuthGate, AuthPolicy, ModelBridge, SynthesisPipeline, SAMPLE_RATE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before the subscriber, so RUST_LOG from .env applies
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting text-to-speech server...");

    let config = ServerConfig::from_env();
    info!(
        "Server configuration loaded: port={}, auth_required={}, rate_limit={}/min, synthesis_timeout={}s",
        config.port,
        config.auth_required,
        config.rate_limit_per_minute,
        config.synthesis_timeout_secs
    );

    let policy = config.auth_policy();
    match &policy {
        AuthPolicy::Disabled => warn!("Authentication disabled (AUTH_REQUIRED=false)"),
        AuthPolicy::Required { secret: None } => {
            warn!("AUTH_REQUIRED is set but AUTHKEY is empty: every request will be denied")
        }
        AuthPolicy::Required { .. } => info!("API key authentication enabled"),
    }
    if config.expose_error_details {
        warn!("EXPOSE_ERROR_DETAILS is on: error traces are sent to callers");
    }

    // Both models must be loaded before the listener is bound. The bridge
    // blocks on its load handshake, so keep it off the async workers.
    info!("Loading acoustic model and vocoder...");
    let bridge_cmd = config.model_bridge_cmd.clone();
    let lock_timeout = config.synthesis_timeout();
    let bridge = Arc::new(
        tokio::task::spawn_blocking(move || {
            ModelBridge::spawn(&bridge_cmd).map(|b| b.with_lock_timeout(lock_timeout))
        })
        .await??,
    );
    info!("Models loaded, output sample rate {} Hz", SAMPLE_RATE);

    let pipeline = SynthesisPipeline::new(
        bridge.clone(),
        bridge,
        AuthGate::new(policy),
        config.pipeline_config(),
    );
    let port = config.port;
    let app = build_router(AppState::new(pipeline, config))?;

    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
