use service_core::error::AppError;

pub const ALLOWED_EXTENSIONS: &[&str] = &["gltf", "glb"];
pub const OUTPUT_EXTENSION: &str = "usdz";

/// An input model file name that passed validation.
///
/// Only the final path component of whatever the client sent is kept, so the
/// name is always safe to join onto a request directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    file_name: String,
}

impl ModelArtifact {
    pub fn from_client_name(name: &str) -> Result<Self, AppError> {
        let file_name = last_segment(name.trim());

        if file_name.is_empty() || file_name == "." || file_name == ".." {
            return Err(AppError::BadRequest(anyhow::anyhow!("No file uploaded")));
        }

        match extension_of(file_name) {
            Some(ext) if is_allowed_extension(ext) => Ok(Self {
                file_name: file_name.to_string(),
            }),
            Some(ext) => Err(AppError::BadRequest(anyhow::anyhow!(
                "Unsupported file type '.{}': expected .gltf or .glb",
                ext
            ))),
            None => Err(AppError::BadRequest(anyhow::anyhow!(
                "File '{}' has no extension: expected .gltf or .glb",
                file_name
            ))),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// `chair.glb` -> `chair.usdz`
    pub fn converted_name(&self) -> String {
        replace_extension(&self.file_name, OUTPUT_EXTENSION)
    }
}

/// Bucket object that a converted file is uploaded to: same directory layout
/// as the source object, `.usdz` extension, optionally under `prefix`.
pub fn converted_object_path(source_object: &str, prefix: &str) -> String {
    let object = source_object.trim_start_matches('/');
    let converted = replace_extension(object, OUTPUT_EXTENSION);
    let prefix = prefix.trim_matches('/');

    if prefix.is_empty() {
        converted
    } else {
        format!("{}/{}", prefix, converted)
    }
}

/// True for a plain file name with no directory components.
pub fn is_bare_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

pub fn is_allowed_extension(ext: &str) -> bool {
    ALLOWED_EXTENSIONS
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(ext))
}

fn last_segment(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

fn extension_of(file_name: &str) -> Option<&str> {
    match file_name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&file_name[idx + 1..]).filter(|ext| !ext.is_empty()),
    }
}

fn replace_extension(path: &str, ext: &str) -> String {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => format!("{}.{}", &path[..name_start + dot], ext),
        _ => format!("{}.{}", path, ext),
    }
}
