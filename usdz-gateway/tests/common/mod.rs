#![allow(dead_code)]

use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use usdz_gateway::config::{ConversionMode, GatewayConfig};
use usdz_gateway::services::Storage;
use usdz_gateway::startup::Application;

pub const TEST_BUCKET: &str = "test-bucket";

/// Behaviour of the stand-in converter, run through `/bin/sh -c`.
#[derive(Debug, Clone, Copy)]
pub enum FakeConverter {
    /// Copies the input to the output path.
    Copy,
    /// Writes to stderr and exits without producing anything.
    NoOutput,
    /// Sleeps far past the configured timeout.
    Hang,
}

impl FakeConverter {
    fn script(&self, invocations: &Path) -> String {
        let record = format!("echo invoked >> '{}'", invocations.display());
        match self {
            FakeConverter::Copy => format!(r#"{}; cp "$1" "$2""#, record),
            FakeConverter::NoOutput => format!("{}; echo 'failed to parse model' >&2", record),
            FakeConverter::Hang => format!("{}; sleep 30", record),
        }
    }
}

/// In-memory bucket that records signing requests.
#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    signed: Mutex<Vec<(String, Duration)>>,
}

impl FakeStorage {
    pub fn with_object(name: &str, data: &[u8]) -> Arc<Self> {
        let storage = Self::default();
        storage
            .objects
            .lock()
            .unwrap()
            .insert(name.to_string(), data.to_vec());
        Arc::new(storage)
    }

    pub fn object(&self, name: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(name).cloned()
    }

    pub fn signed_requests(&self) -> Vec<(String, Duration)> {
        self.signed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for FakeStorage {
    async fn download(&self, object: &str, dest: &Path) -> Result<(), AppError> {
        let data = self
            .object(object)
            .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("No such object: {}", object)))?;
        tokio::fs::write(dest, data).await?;
        Ok(())
    }

    async fn upload(&self, src: &Path, object: &str) -> Result<(), AppError> {
        let data = tokio::fs::read(src).await?;
        self.objects
            .lock()
            .unwrap()
            .insert(object.to_string(), data);
        Ok(())
    }

    async fn signed_url(&self, object: &str, ttl: Duration) -> Result<String, AppError> {
        self.signed
            .lock()
            .unwrap()
            .push((object.to_string(), ttl));
        Ok(format!(
            "https://storage.googleapis.com/{}/{}?X-Goog-Expires={}&X-Goog-Signature=deadbeef",
            TEST_BUCKET,
            object,
            ttl.as_secs()
        ))
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub work_dir: PathBuf,
    pub static_dir: PathBuf,
    pub invocations: PathBuf,
    pub client: reqwest::Client,
    _root: TempDir,
}

pub struct TestAppBuilder {
    mode: ConversionMode,
    converter: FakeConverter,
    timeout_secs: u64,
    storage: Option<Arc<dyn Storage>>,
    output_prefix: String,
    max_body_bytes: Option<usize>,
}

impl TestAppBuilder {
    pub fn converter(mut self, converter: FakeConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn output_prefix(mut self, prefix: &str) -> Self {
        self.output_prefix = prefix.to_string();
        self
    }

    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = Some(bytes);
        self
    }

    pub async fn spawn(self) -> TestApp {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        let work_dir = root.path().join("work");
        let static_dir = root.path().join("static");
        let invocations = root.path().join("converter-invocations");

        std::fs::create_dir_all(&static_dir).expect("Failed to create static dir");
        std::fs::write(
            static_dir.join("index.html"),
            "<!doctype html><title>USDZ converter</title>",
        )
        .expect("Failed to write index.html");

        let mut config = GatewayConfig::load().expect("Failed to load configuration");
        config.common.port = 0; // Random port for testing
        config.mode = self.mode;
        config.server.work_dir = work_dir.clone();
        config.server.static_dir = static_dir.clone();
        config.server.cors_allowed_origin = "*".to_string();
        if let Some(bytes) = self.max_body_bytes {
            config.server.max_body_bytes = bytes;
        }
        config.converter.binary = "/bin/sh".to_string();
        config.converter.leading_args = vec![
            "-c".to_string(),
            self.converter.script(&invocations),
            "converter".to_string(),
        ];
        config.converter.timeout_secs = self.timeout_secs;
        config.storage.output_prefix = self.output_prefix;
        config.storage.signed_url_ttl_secs = 3600;

        let app = Application::build_with_storage(config, self.storage)
            .await
            .expect("Failed to build test application");
        let port = app.port();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let address = format!("http://127.0.0.1:{}", port);
        for _ in 0..50 {
            if client
                .get(format!("{}/healthz", address))
                .send()
                .await
                .is_ok()
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            work_dir,
            static_dir,
            invocations,
            client,
            _root: root,
        }
    }
}

impl TestApp {
    pub fn local() -> TestAppBuilder {
        Self::builder(ConversionMode::Local)
    }

    pub fn cloud() -> TestAppBuilder {
        Self::builder(ConversionMode::Cloud)
    }

    fn builder(mode: ConversionMode) -> TestAppBuilder {
        TestAppBuilder {
            mode,
            converter: FakeConverter::Copy,
            timeout_secs: 30,
            storage: None,
            output_prefix: String::new(),
            max_body_bytes: None,
        }
    }

    /// How many times the fake converter ran.
    pub fn converter_invocations(&self) -> usize {
        std::fs::read_to_string(&self.invocations)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    /// Entries currently left under the working-directory root.
    pub fn work_dir_entries(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.work_dir) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub async fn upload(&self, file_name: &str, data: &[u8]) -> reqwest::Response {
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(data.to_vec()).file_name(file_name.to_string()),
        );

        self.client
            .post(format!("{}/api/convert", self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn convert_object(&self, object: &str) -> reqwest::Response {
        let form = reqwest::multipart::Form::new().text("filename", object.to_string());

        self.client
            .post(format!("{}/api/convert", self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }
}
