use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub common: core_config::Config,
    pub mode: ConversionMode,
    pub server: ServerConfig,
    pub converter: ConverterConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Which request shape `/api/convert` accepts and what happens to the
/// per-request directory afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionMode {
    /// Multipart upload, result kept on disk for `/api/download`.
    Local,
    /// Bucket object reference, result uploaded and working copy removed.
    Cloud,
}

impl ConversionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionMode::Local => "local",
            ConversionMode::Cloud => "cloud",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub work_dir: PathBuf,
    pub static_dir: PathBuf,
    pub cors_allowed_origin: String,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct ConverterConfig {
    pub binary: String,
    /// Arguments placed before `(input, output)`, e.g. a wrapper script.
    pub leading_args: Vec<String>,
    pub timeout_secs: u64,
}

impl ConverterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub gcs_bucket: Option<String>,
    pub gcs_credential_path: Option<String>,
    pub output_prefix: String,
    pub signed_url_ttl_secs: u64,
}

impl StorageConfig {
    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
    pub otlp_endpoint: Option<String>,
}

impl GatewayConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(GatewayConfig {
            common: common_config,
            mode: get_env("CONVERSION_MODE", Some("local"), is_prod)?
                .parse()
                .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            server: ServerConfig {
                work_dir: get_env("WORK_DIR", Some("tmp"), is_prod)?.into(),
                static_dir: get_env("STATIC_DIR", Some("static"), is_prod)?.into(),
                cors_allowed_origin: get_env("CORS_ALLOWED_ORIGIN", Some("*"), is_prod)?,
                max_body_bytes: parse_env("MAX_BODY_BYTES", 100 * 1024 * 1024)?,
            },
            converter: ConverterConfig {
                binary: get_env("CONVERTER_PATH", Some("usd_from_gltf"), is_prod)?,
                leading_args: env::var("CONVERTER_ARGS")
                    .map(|v| v.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default(),
                timeout_secs: parse_env("CONVERTER_TIMEOUT_SECS", 300)?,
            },
            storage: StorageConfig {
                gcs_bucket: non_empty_env("GCS_BUCKET"),
                gcs_credential_path: non_empty_env("GCS_CREDENTIAL_PATH"),
                output_prefix: env::var("GCS_OUTPUT_PREFIX").unwrap_or_default(),
                signed_url_ttl_secs: parse_env("SIGNED_URL_TTL_SECS", 3600)?,
            },
            logging: LoggingConfig {
                log_dir: non_empty_env("LOG_DIR").map(PathBuf::from),
                otlp_endpoint: non_empty_env("OTLP_ENDPOINT"),
            },
        })
    }
}

impl std::str::FromStr for ConversionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(ConversionMode::Local),
            "cloud" | "gcs" => Ok(ConversionMode::Cloud),
            _ => Err(format!("Invalid conversion mode: {}", s)),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val.trim().parse().map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, e))
        }),
        Err(_) => Ok(default),
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
