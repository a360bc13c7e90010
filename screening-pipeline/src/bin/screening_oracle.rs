//! Screening oracle service binary
//!
//! Runs the bridge actor and the operator backend in one process. The
//! binary has no inbound surface: nothing outside the process can call
//! `request_screening`, so a standalone run only screens requests opened
//! by code embedding the same `BridgeHandle`. Forwards for the transfer
//! ledger are drained and logged as JSON; there is no outbound transport.

use anyhow::Context;
use oracle_bridge::{spawn_bridge_actor, Bridge, ChannelSink};
use screening_pipeline::{
    HttpScreeningProvider, OperatorBackend, PipelineConfig, RateLimiter, ScreeningProvider,
};
use std::sync::Arc;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    if std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting screening oracle");

    // Load configuration
    let mut config = match std::env::var("SCREENING_CONFIG") {
        Ok(path) => PipelineConfig::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        Err(_) => PipelineConfig::from_env().context("loading config from environment")?,
    };

    let keypair = config.operator_keypair()?;
    let operator = keypair.address();
    if config.bridge.owner.is_empty() {
        tracing::warn!(%operator, "No bridge owner configured, operator key owns the bridge");
        config.bridge.owner = operator.to_hex();
    }

    // Bridge actor, forwarding to the transfer ledger channel
    let (sink, mut forwards) = ChannelSink::channel(config.bridge.forward_buffer);
    let bridge = Bridge::from_config(&config.bridge, Arc::new(sink))?;
    let (handle, actor_task) = spawn_bridge_actor(bridge, config.bridge.mailbox_capacity);

    if !handle.is_authorized_oracle(operator).await? {
        tracing::warn!(%operator, "Operator key is not an authorized oracle; submissions will be rejected");
    }

    // Forwards are logged only
    let forward_task = tokio::spawn(async move {
        while let Some(command) = forwards.recv().await {
            match serde_json::to_string(&command) {
                Ok(json) => tracing::info!(command = %json, "Forward to transfer ledger"),
                Err(e) => tracing::error!("Failed to encode forward: {}", e),
            }
        }
    });

    let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
    let cleanup_task = limiter
        .clone()
        .start_cleanup_task(config.rate_limit.cleanup_interval());

    let provider: Arc<dyn ScreeningProvider> = Arc::new(HttpScreeningProvider::new(&config.provider)?);
    let backend = OperatorBackend::new(
        keypair,
        provider,
        limiter,
        handle.clone(),
        config.provider.clone(),
    );
    let operator_task = tokio::spawn(backend.run(handle.subscribe()));

    tracing::info!(
        provider = %config.provider.base_url,
        chain = %config.provider.chain,
        "Screening oracle running"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down screening oracle");
    operator_task.abort();
    cleanup_task.abort();
    handle.shutdown().await?;
    let bridge = actor_task.await?;
    tracing::info!(
        pending = bridge.pending_count(),
        undelivered = bridge.undelivered_forwards().len(),
        "Bridge stopped"
    );
    forward_task.abort();

    Ok(())
}
