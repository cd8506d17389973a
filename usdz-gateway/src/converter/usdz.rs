use crate::config::ConverterConfig;
use crate::converter::CommandExecutor;
use crate::models::artifact::OUTPUT_EXTENSION;
use service_core::error::AppError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Front for the external glTF -> USDZ binary.
///
/// The binary is called as `<binary> [leading args..] <input> <output>` and is
/// expected to write `output`. Whether that file exists afterwards is the only
/// success criterion; the exit status and stderr are logged.
pub struct UsdzConverter {
    binary: String,
    leading_args: Vec<String>,
    executor: CommandExecutor,
}

impl UsdzConverter {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            leading_args: config.leading_args.clone(),
            executor: CommandExecutor::new(config.timeout()),
        }
    }

    pub fn output_path_for(input: &Path) -> PathBuf {
        input.with_extension(OUTPUT_EXTENSION)
    }

    pub async fn convert(&self, input: &Path) -> Result<PathBuf, AppError> {
        let output_path = Self::output_path_for(input);

        let mut args: Vec<OsString> = self.leading_args.iter().map(OsString::from).collect();
        args.push(input.as_os_str().to_owned());
        args.push(output_path.as_os_str().to_owned());

        tracing::info!(
            input = %input.display(),
            output = %output_path.display(),
            converter = %self.binary,
            "Starting USDZ conversion"
        );

        let output = self.executor.run(&self.binary, &args, None).await?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::warn!(input = %input.display(), stderr = %stderr.trim(), "Converter stderr");
        }

        if !output.status.success() {
            tracing::warn!(
                input = %input.display(),
                status = %output.status,
                "Converter exited with non-zero status"
            );
        }

        let produced = tokio::fs::try_exists(&output_path).await.unwrap_or(false);
        if !produced {
            tracing::error!(
                input = %input.display(),
                output = %output_path.display(),
                "Converter did not produce an output file"
            );
            return Err(AppError::ConversionFailed(format!(
                "Conversion failed: no USDZ file was produced for '{}'",
                input
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            )));
        }

        tracing::info!(output = %output_path.display(), "USDZ conversion completed");

        Ok(output_path)
    }
}
