pub mod convert;
pub mod download;
pub mod health;

pub use convert::convert_model;
pub use download::download_model;
pub use health::{health_check, metrics_endpoint};

use service_core::error::AppError;

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

pub async fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Not found"))
}
