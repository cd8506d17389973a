use crate::error::AppError;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, runtime, trace as sdktrace};
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber: JSON to stdout, plus a daily-rolled JSON
/// file under `log_dir` and an OTLP exporter when those are configured.
///
/// The returned guard flushes the file writer when dropped; hold it for the
/// life of the process.
pub fn init_tracing(
    service_name: &str,
    log_level: &str,
    log_dir: Option<&Path>,
    otlp_endpoint: Option<&str>,
) -> Result<Option<WorkerGuard>, AppError> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let (file_sink, guard) = match log_dir {
        Some(dir) => {
            let (writer, guard) = file_writer(dir, service_name)?;
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let file_layer = file_sink.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .json()
            .flatten_event(true)
            .with_writer(writer)
    });

    let telemetry = match otlp_endpoint {
        Some(endpoint) => {
            let otlp_exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint);

            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(otlp_exporter)
                .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                    KeyValue::new("service.name", service_name.to_string()),
                ])))
                .install_batch(runtime::Tokio)
                .map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!(
                        "Failed to initialize OTLP tracer for service '{}' at endpoint '{}': {}",
                        service_name,
                        endpoint,
                        e
                    ))
                })?;

            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(telemetry)
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .json()
                .flatten_event(true),
        )
        .try_init()
        .map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to install subscriber: {}", e))
        })?;

    Ok(guard)
}

/// `<dir>/<service>.<date>.log`, written from a background thread.
fn file_writer(dir: &Path, service_name: &str) -> Result<(NonBlocking, WorkerGuard), AppError> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(service_name)
        .filename_suffix("log")
        .build(dir)
        .map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Failed to open log directory {}: {}",
                dir.display(),
                e
            ))
        })?;

    Ok(tracing_appender::non_blocking(appender))
}
