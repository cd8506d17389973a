use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use service_core::middleware::REQUEST_ID_HEADER;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(86400);

/// CORS for the browser frontend. `*` allows any origin, anything else must
/// be a single exact origin.
pub fn cors_layer(allowed_origin: &str) -> Result<CorsLayer, AppError> {
    let allowed_origin = allowed_origin.trim();
    let origin = if allowed_origin == "*" {
        AllowOrigin::from(Any)
    } else {
        let value = allowed_origin.parse::<HeaderValue>().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Invalid CORS origin '{}': {}",
                allowed_origin,
                e
            ))
        })?;
        AllowOrigin::exact(value)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .max_age(PREFLIGHT_MAX_AGE))
}

/// `CorsLayer` answers preflights itself with `200`; browsers and clients of
/// this API expect `204` for any `OPTIONS` request. Must sit outside the
/// CORS layer.
pub async fn preflight_no_content(req: Request, next: Next) -> Response {
    let is_options = req.method() == Method::OPTIONS;
    let mut response = next.run(req).await;

    if is_options && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}
