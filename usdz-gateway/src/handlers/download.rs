use crate::dtos::DownloadParams;
use crate::models::{artifact::OUTPUT_EXTENSION, is_bare_file_name};
use crate::services::ConversionWorkspace;
use crate::startup::AppState;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use service_core::error::AppError;
use std::path::Path;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// `GET /api/download?id=&name=` streams a file produced by an earlier
/// local-mode conversion.
pub async fn download_model(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, AppError> {
    let id = params
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing 'id' parameter")))?;
    let name = params
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing 'name' parameter")))?;

    let id = Uuid::parse_str(id)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid 'id' parameter")))?;
    if !is_bare_file_name(name) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Invalid 'name' parameter"
        )));
    }

    let path = ConversionWorkspace::existing(&state.config.server.work_dir, id).file(name);

    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        AppError::InternalError(anyhow::anyhow!("File not found: {} ({})", name, e.kind()))
    })?;
    let size = file.metadata().await?.len();

    tracing::info!(conversion_id = %id, name = %name, size, "Serving converted model");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type_for(&path).to_string()),
            (header::CONTENT_LENGTH, size.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name.replace('"', "")),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case(OUTPUT_EXTENSION) => "model/vnd.usdz+zip",
        Some(ext) if ext.eq_ignore_ascii_case("glb") => "model/gltf-binary",
        Some(ext) if ext.eq_ignore_ascii_case("gltf") => "model/gltf+json",
        _ => "application/octet-stream",
    }
}
