use service_core::error::AppError;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Directory owned by a single conversion request: `<root>/<id>/`.
///
/// The id is a fresh UUIDv4, so two requests uploading `chair.glb` at the
/// same time never share a path. The directory is removed when the value is
/// dropped, including when the request future is cancelled mid-conversion,
/// unless [`ConversionWorkspace::keep`] was called.
#[derive(Debug)]
pub struct ConversionWorkspace {
    id: Uuid,
    path: PathBuf,
    remove_on_drop: bool,
}

impl ConversionWorkspace {
    pub async fn create(root: &Path) -> Result<Self, AppError> {
        let id = Uuid::new_v4();
        let path = root.join(id.to_string());

        fs::create_dir_all(&path).await.map_err(|e| {
            AppError::InternalError(anyhow::anyhow!(
                "Failed to create working directory {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!(conversion_id = %id, path = %path.display(), "Created working directory");

        Ok(Self {
            id,
            path,
            remove_on_drop: true,
        })
    }

    /// Locate the directory of an earlier request. Nothing is created, and
    /// nothing is removed when the value goes away.
    pub fn existing(root: &Path, id: Uuid) -> Self {
        Self {
            id,
            path: root.join(id.to_string()),
            remove_on_drop: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Leave the directory on disk for a later `/api/download`.
    pub fn keep(mut self) -> Uuid {
        self.remove_on_drop = false;
        self.id
    }
}

impl Drop for ConversionWorkspace {
    fn drop(&mut self) {
        if !self.remove_on_drop {
            return;
        }

        // Synchronous so it also runs when an async caller is cancelled.
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {
                tracing::debug!(conversion_id = %self.id, "Removed working directory");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    conversion_id = %self.id,
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove working directory"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn workspaces_are_unique_per_request() {
        let root = tempfile::tempdir().unwrap();

        let a = ConversionWorkspace::create(root.path()).await.unwrap();
        let b = ConversionWorkspace::create(root.path()).await.unwrap();

        assert_ne!(a.id(), b.id());
        assert_ne!(a.file("chair.glb"), b.file("chair.glb"));
        assert!(a.path().is_dir());
        assert!(b.path().is_dir());
    }

    #[tokio::test]
    async fn drop_removes_directory_and_contents() {
        let root = tempfile::tempdir().unwrap();
        let workspace = ConversionWorkspace::create(root.path()).await.unwrap();
        tokio::fs::write(workspace.file("chair.glb"), b"glTF").await.unwrap();
        let path = workspace.path().to_path_buf();

        drop(workspace);

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn cancelled_task_still_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let task_root = root.path().to_path_buf();

        let task = tokio::spawn(async move {
            let workspace = ConversionWorkspace::create(&task_root).await.unwrap();
            tx.send(workspace.path().to_path_buf()).unwrap();
            std::future::pending::<()>().await;
            drop(workspace);
        });

        let path = rx.await.unwrap();
        assert!(path.is_dir());

        task.abort();
        let _ = task.await;

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn kept_workspace_survives_drop() {
        let root = tempfile::tempdir().unwrap();
        let workspace = ConversionWorkspace::create(root.path()).await.unwrap();
        let path = workspace.path().to_path_buf();

        let id = workspace.keep();

        assert!(path.is_dir());
        assert!(ConversionWorkspace::existing(root.path(), id).path().is_dir());
    }

    #[tokio::test]
    async fn existing_workspace_is_never_removed() {
        let root = tempfile::tempdir().unwrap();
        let id = ConversionWorkspace::create(root.path()).await.unwrap().keep();

        drop(ConversionWorkspace::existing(root.path(), id));

        assert!(root.path().join(id.to_string()).is_dir());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn lifecycle_logs_use_conversion_id_field() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .json()
            .with_writer(move || writer.clone())
            .finish();
        let _default = tracing::subscriber::set_default(subscriber);

        let root = tempfile::tempdir().unwrap();
        let workspace = ConversionWorkspace::create(root.path()).await.unwrap();
        let id = workspace.id();
        drop(workspace);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains(&format!("\"conversion_id\":\"{}\"", id)), "{output}");
        assert!(!output.contains("request_id"), "{output}");
    }
}
