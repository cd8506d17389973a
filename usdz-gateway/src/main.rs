use service_core::observability::init_tracing;
use usdz_gateway::config::GatewayConfig;
use usdz_gateway::services::init_metrics;
use usdz_gateway::startup::Application;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = GatewayConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    // Flushes the log file on exit
    let _log_guard = init_tracing(
        "usdz-gateway",
        &config.common.log_level,
        config.logging.log_dir.as_deref(),
        config.logging.otlp_endpoint.as_deref(),
    )
    .map_err(|e| {
        eprintln!("Failed to initialize logging: {}", e);
        std::io::Error::other(format!("Logging error: {}", e))
    })?;

    // Initialize metrics recorder (must be before any metrics are recorded)
    init_metrics().map_err(|e| {
        tracing::error!("Failed to initialize metrics: {}", e);
        std::io::Error::other(format!("Metrics error: {}", e))
    })?;

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    app.run_until_stopped().await
}
