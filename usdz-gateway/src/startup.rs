use crate::config::{ConversionMode, GatewayConfig};
use crate::converter::UsdzConverter;
use crate::handlers;
use crate::middleware::{cors_layer, preflight_no_content};
use crate::services::{GcsStorage, Storage};
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware, REQUEST_ID_HEADER};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub storage: Option<Arc<dyn Storage>>,
    pub converter: Arc<UsdzConverter>,
}

impl AppState {
    /// The bucket client, or a configuration error when none was set up.
    pub fn storage(&self) -> Result<&Arc<dyn Storage>, AppError> {
        self.storage.as_ref().ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!("GCS is not configured on this server"))
        })
    }
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    /// Build with a GCS client derived from `config.storage`.
    pub async fn build(config: GatewayConfig) -> Result<Self, AppError> {
        let storage = GcsStorage::from_config(&config.storage)
            .map_err(|e| {
                tracing::error!("Failed to initialize GCS storage: {}", e);
                e
            })?
            .map(|gcs| Arc::new(gcs) as Arc<dyn Storage>);

        Self::build_with_storage(config, storage).await
    }

    pub async fn build_with_storage(
        config: GatewayConfig,
        storage: Option<Arc<dyn Storage>>,
    ) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(&config.server.work_dir)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create working directory {}: {}",
                    config.server.work_dir.display(),
                    e
                );
                AppError::from(e)
            })?;

        if config.mode == ConversionMode::Cloud && storage.is_none() {
            tracing::warn!("Cloud mode without GCS_BUCKET: conversions will be rejected");
        }

        let state = AppState {
            converter: Arc::new(UsdzConverter::new(&config.converter)),
            config: config.clone(),
            storage,
        };

        let app = build_router(state.clone())?;

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port,
            mode = config.mode.as_str(),
            work_dir = %config.server.work_dir.display(),
            "Listening"
        );

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let cors = cors_layer(&state.config.server.cors_allowed_origin)?;
    let mode = state.config.mode;

    let router = Router::new()
        .route("/healthz", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/api/convert",
            post(handlers::convert_model).fallback(handlers::method_not_allowed),
        );

    let router = match mode {
        ConversionMode::Local => router
            .route(
                "/api/download",
                get(handlers::download_model).fallback(handlers::method_not_allowed),
            )
            .fallback_service(
                ServeDir::new(&state.config.server.static_dir).append_index_html_on_directories(true),
            ),
        ConversionMode::Cloud => router.fallback(handlers::not_found),
    };

    Ok(router
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .layer(from_fn(metrics_middleware))
        .layer(cors)
        .layer(from_fn(preflight_no_content))
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        .with_state(state))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
