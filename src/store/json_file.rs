//! One pretty-printed JSON file per snapshot kind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{Snapshot, SnapshotBackend, SnapshotKind};
use crate::errors::AppError;

pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn path_of(&self, kind: SnapshotKind) -> PathBuf {
        let file = match kind {
            SnapshotKind::Drives => "shared_drives.json",
            SnapshotKind::Permissions => "permissions.json",
        };
        self.dir.join(file)
    }
}

#[async_trait]
impl SnapshotBackend for JsonFileBackend {
    async fn get(&self, kind: SnapshotKind) -> Result<Option<Snapshot>, AppError> {
        let path = self.path_of(kind);
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => Snapshot::from_json(kind, &json).map(Some).map_err(|e| {
                AppError::Storage(format!("malformed snapshot {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, snapshot: &Snapshot) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_of(snapshot.kind());
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, snapshot.to_json()?).await?;
        // Readers see the old document or the new one, never a partial write.
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(path = %path.display(), drives = snapshot.len(), "Wrote snapshot");
        Ok(())
    }

    async fn invalidate(&self, kind: SnapshotKind) -> Result<bool, AppError> {
        match tokio::fs::remove_file(self.path_of(kind)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
