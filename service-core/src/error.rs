use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Gateway timeout: {0}")]
    GatewayTimeout(String),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ConversionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message, without the variant prefix used by `Display`.
    pub fn message(&self) -> String {
        match self {
            AppError::BadRequest(err)
            | AppError::NotFound(err)
            | AppError::ConfigError(err)
            | AppError::InternalError(err) => err.to_string(),
            AppError::MethodNotAllowed => "Method not allowed".to_string(),
            AppError::PayloadTooLarge(msg)
            | AppError::ConversionFailed(msg)
            | AppError::GatewayTimeout(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = ?self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        (
            status,
            Json(ErrorResponse {
                message: self.message(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should be readable")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    #[tokio::test]
    async fn config_error_keeps_bare_message() {
        let err = AppError::ConfigError(anyhow::anyhow!("GCS is not configured on this server"));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "GCS is not configured on this server");
    }

    #[tokio::test]
    async fn validation_error_is_bad_request() {
        let response = AppError::BadRequest(anyhow::anyhow!("No file uploaded")).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "No file uploaded");
    }

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        let err = AppError::GatewayTimeout("Converter timed out after 5 seconds".into());
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }
}
