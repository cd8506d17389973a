use serde::{Deserialize, Serialize};

/// Local mode: the converted file stays on disk under `id`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub id: String,
    pub name: String,
}

/// Cloud mode: the converted file was uploaded to `object_path`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudConvertResponse {
    pub id: String,
    pub name: String,
    pub uploaded_url: String,
    pub object_path: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub id: Option<String>,
    pub name: Option<String>,
}
