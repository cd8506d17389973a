use crate::config::ConversionMode;
use crate::dtos::{CloudConvertResponse, ConvertResponse};
use crate::models::{converted_object_path, ModelArtifact};
use crate::services::{record_conversion, ConversionWorkspace};
use crate::startup::AppState;
use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;
use std::path::Path;
use std::time::Instant;
use tokio::io::AsyncWriteExt;

const FILE_FIELD: &str = "file";
const FILENAME_FIELD: &str = "filename";

/// `POST /api/convert`
///
/// Local mode expects the model itself in the `file` field. Cloud mode
/// expects a `filename` field naming an object in the bucket.
pub async fn convert_model(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let multipart = multipart.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!(
            "Expected a multipart form: {}",
            e.body_text()
        ))
    })?;

    let mode = state.config.mode;
    let started = Instant::now();

    let result = match mode {
        ConversionMode::Local => convert_upload(&state, multipart)
            .await
            .map(|body| Json(body).into_response()),
        ConversionMode::Cloud => convert_from_bucket(&state, multipart)
            .await
            .map(|body| Json(body).into_response()),
    };

    let outcome = match &result {
        Ok(_) => "success",
        Err(e) if e.status_code().is_client_error() => "rejected",
        Err(_) => "failure",
    };
    record_conversion(mode, outcome, started.elapsed());

    result
}

async fn convert_upload(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<ConvertResponse, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(FILE_FIELD) {
            return convert_file_field(state, field).await;
        }
    }

    Err(AppError::BadRequest(anyhow::anyhow!("No file uploaded")))
}

async fn convert_file_field(
    state: &AppState,
    mut field: Field<'_>,
) -> Result<ConvertResponse, AppError> {
    let artifact = ModelArtifact::from_client_name(field.file_name().unwrap_or_default())?;
    let workspace = ConversionWorkspace::create(&state.config.server.work_dir).await?;
    let id = workspace.id();

    tracing::info!(
        conversion_id = %id,
        file_name = %artifact.file_name(),
        "Received model upload"
    );

    let input = workspace.file(artifact.file_name());
    let size = write_field(&mut field, &input).await?;
    tracing::debug!(conversion_id = %id, size, "Upload written to disk");

    state.converter.convert(&input).await?;

    // Successful results stay on disk for /api/download.
    workspace.keep();

    Ok(ConvertResponse {
        id: id.to_string(),
        name: artifact.converted_name(),
    })
}

async fn convert_from_bucket(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<CloudConvertResponse, AppError> {
    let storage = state.storage()?;

    let mut filename = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(FILENAME_FIELD) {
            filename = Some(field.text().await.map_err(multipart_error)?);
            break;
        }
    }

    let object = filename
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing 'filename' field")))?;

    let artifact = ModelArtifact::from_client_name(&object)?;
    let workspace = ConversionWorkspace::create(&state.config.server.work_dir).await?;
    let id = workspace.id();

    tracing::info!(conversion_id = %id, object = %object, "Converting bucket object");

    // `workspace` is removed when it goes out of scope, on every path.
    let input = workspace.file(artifact.file_name());
    storage.download(&object, &input).await?;

    let output = state.converter.convert(&input).await?;

    let object_path = converted_object_path(&object, &state.config.storage.output_prefix);
    storage.upload(&output, &object_path).await?;

    let uploaded_url = storage
        .signed_url(&object_path, state.config.storage.signed_url_ttl())
        .await?;

    tracing::info!(conversion_id = %id, object_path = %object_path, "Converted model uploaded");

    Ok(CloudConvertResponse {
        id: id.to_string(),
        name: artifact.converted_name(),
        uploaded_url,
        object_path,
    })
}

async fn write_field(field: &mut Field<'_>, dest: &Path) -> Result<u64, AppError> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written = 0u64;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(anyhow::anyhow!(
            "Failed to read multipart form: {}",
            err.body_text()
        ))
    }
}
