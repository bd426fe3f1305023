//! Local snapshot store.
//!
//! Caches the shared drive list and the permissions of every drive so that listing and
//! querying do not repeat the paginated (and, for permissions, N+1) gateway calls. A
//! present document is a cache hit and is trusted as complete; invalidation is the only
//! way to make the store fetch again.
//!
//! Fetches honour cooperative cancellation: whatever arrived before the user interrupted
//! is persisted and the caller receives [`AppError::Interrupted`]. A drive's permission
//! list is only ever stored whole.

mod json_file;
mod sqlite;

pub use json_file::JsonFileBackend;
pub use sqlite::SqliteBackend;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{CacheBackend, Config};
use crate::errors::AppError;
use crate::gateway::{fetch_all_drives, fetch_drive_permissions, FetchContext, Fetched};
use crate::models::{DrivePermissions, PermissionsSnapshot, SharedDrive};

/// The two cached documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    Drives,
    Permissions,
}

impl SnapshotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Drives => "drives",
            SnapshotKind::Permissions => "permissions",
        }
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which documents an invalidation or refresh applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotScope {
    Drives,
    Permissions,
    Both,
}

impl SnapshotScope {
    /// Kinds in this scope, drives first.
    pub fn kinds(&self) -> &'static [SnapshotKind] {
        match self {
            SnapshotScope::Drives => &[SnapshotKind::Drives],
            SnapshotScope::Permissions => &[SnapshotKind::Permissions],
            SnapshotScope::Both => &[SnapshotKind::Drives, SnapshotKind::Permissions],
        }
    }

    pub fn includes(&self, kind: SnapshotKind) -> bool {
        self.kinds().contains(&kind)
    }
}

/// A cached document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    Drives(Vec<SharedDrive>),
    Permissions(PermissionsSnapshot),
}

impl Snapshot {
    pub fn kind(&self) -> SnapshotKind {
        match self {
            Snapshot::Drives(_) => SnapshotKind::Drives,
            Snapshot::Permissions(_) => SnapshotKind::Permissions,
        }
    }

    /// Number of drives in the document.
    pub fn len(&self) -> usize {
        match self {
            Snapshot::Drives(drives) => drives.len(),
            Snapshot::Permissions(snapshot) => snapshot.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(match self {
            Snapshot::Drives(drives) => serde_json::to_string_pretty(drives)?,
            Snapshot::Permissions(snapshot) => serde_json::to_string_pretty(snapshot)?,
        })
    }

    pub fn from_json(kind: SnapshotKind, json: &str) -> Result<Self, AppError> {
        Ok(match kind {
            SnapshotKind::Drives => Snapshot::Drives(serde_json::from_str(json)?),
            SnapshotKind::Permissions => Snapshot::Permissions(serde_json::from_str(json)?),
        })
    }
}

/// Key-value storage for snapshot documents.
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    async fn get(&self, kind: SnapshotKind) -> Result<Option<Snapshot>, AppError>;

    /// Overwrite the whole document of `snapshot.kind()`.
    async fn put(&self, snapshot: &Snapshot) -> Result<(), AppError>;

    /// Remove a document. Returns whether it existed.
    async fn invalidate(&self, kind: SnapshotKind) -> Result<bool, AppError>;
}

/// Counts of drives fetched by a refresh, per kind refreshed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub drives: Option<usize>,
    pub permissions: Option<usize>,
}

/// Cache-or-fetch access to the drive and permission snapshots.
pub struct SnapshotStore {
    backend: Arc<dyn SnapshotBackend>,
    drive_page_size: u32,
}

impl SnapshotStore {
    pub fn new(backend: Arc<dyn SnapshotBackend>, drive_page_size: u32) -> Self {
        Self {
            backend,
            drive_page_size,
        }
    }

    /// Open the backend selected by the configuration.
    pub async fn open(config: &Config) -> Result<Self, AppError> {
        let backend: Arc<dyn SnapshotBackend> = match config.cache_backend {
            CacheBackend::Json => Arc::new(JsonFileBackend::new(&config.data_dir)),
            CacheBackend::Sqlite => {
                Arc::new(SqliteBackend::open(&config.data_dir.join("snapshots.sqlite")).await?)
            }
        };
        Ok(Self::new(backend, config.drive_page_size))
    }

    /// Cached drives, fetching and persisting them on a miss.
    pub async fn get_drives(&self, ctx: &FetchContext<'_>) -> Result<Vec<SharedDrive>, AppError> {
        if let Some(drives) = self.load_drives().await? {
            tracing::info!("Loaded {} shared drives from cache", drives.len());
            return Ok(drives);
        }
        self.fetch_drives(ctx, None).await
    }

    /// Cached permissions snapshot, building it from every cached drive on a miss.
    pub async fn get_permissions_snapshot(
        &self,
        ctx: &FetchContext<'_>,
    ) -> Result<PermissionsSnapshot, AppError> {
        if let Some(snapshot) = self.load_permissions().await? {
            tracing::info!("Loaded permissions of {} drives from cache", snapshot.len());
            return Ok(snapshot);
        }
        let drives = self.get_drives(ctx).await?;
        self.fetch_permissions(ctx, &drives, None).await
    }

    /// Delete the documents in `scope`, reporting whether each existed.
    pub async fn invalidate(
        &self,
        scope: SnapshotScope,
    ) -> Result<Vec<(SnapshotKind, bool)>, AppError> {
        let mut removed = Vec::with_capacity(scope.kinds().len());
        for &kind in scope.kinds() {
            let existed = self.backend.invalidate(kind).await?;
            tracing::debug!(kind = kind.as_str(), existed, "Invalidated snapshot");
            removed.push((kind, existed));
        }
        Ok(removed)
    }

    /// Invalidate and immediately re-fetch the documents in `scope`.
    ///
    /// Permissions are rebuilt from the drives snapshot, so with [`SnapshotScope::Both`]
    /// they reflect the freshly fetched drive list.
    pub async fn refresh(
        &self,
        scope: SnapshotScope,
        ctx: &FetchContext<'_>,
    ) -> Result<RefreshSummary, AppError> {
        let mut summary = RefreshSummary::default();

        if scope.includes(SnapshotKind::Drives) {
            let previous = self.load_drives().await.unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable drives snapshot: {}", e);
                None
            });
            self.backend.invalidate(SnapshotKind::Drives).await?;
            summary.drives = Some(self.fetch_drives(ctx, previous).await?.len());
        }

        if scope.includes(SnapshotKind::Permissions) {
            // The drive list must be in hand before the old document is dropped.
            let drives = self.get_drives(ctx).await?;
            let previous = self.load_permissions().await.unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable permissions snapshot: {}", e);
                None
            });
            self.backend.invalidate(SnapshotKind::Permissions).await?;
            summary.permissions = Some(self.fetch_permissions(ctx, &drives, previous).await?.len());
        }

        Ok(summary)
    }

    async fn load_drives(&self) -> Result<Option<Vec<SharedDrive>>, AppError> {
        match self.backend.get(SnapshotKind::Drives).await? {
            Some(Snapshot::Drives(drives)) => Ok(Some(drives)),
            Some(other) => Err(mismatched(SnapshotKind::Drives, &other)),
            None => Ok(None),
        }
    }

    async fn load_permissions(&self) -> Result<Option<PermissionsSnapshot>, AppError> {
        match self.backend.get(SnapshotKind::Permissions).await? {
            Some(Snapshot::Permissions(snapshot)) => Ok(Some(snapshot)),
            Some(other) => Err(mismatched(SnapshotKind::Permissions, &other)),
            None => Ok(None),
        }
    }

    async fn fetch_drives(
        &self,
        ctx: &FetchContext<'_>,
        previous: Option<Vec<SharedDrive>>,
    ) -> Result<Vec<SharedDrive>, AppError> {
        tracing::info!("Fetching shared drives");
        ctx.progress.start("Fetching shared drives", None);
        let fetched = fetch_all_drives(ctx.gateway, self.drive_page_size, ctx.cancel).await;
        ctx.progress.finish();

        match fetched? {
            Fetched::Complete(drives) => {
                self.backend.put(&Snapshot::Drives(drives.clone())).await?;
                tracing::info!("Cached {} shared drives", drives.len());
                Ok(drives)
            }
            Fetched::Interrupted(drives) => {
                let persisted = self
                    .persist_partial(Snapshot::Drives(drives), previous.map(Snapshot::Drives))
                    .await?;
                Err(AppError::Interrupted {
                    kind: SnapshotKind::Drives,
                    persisted,
                })
            }
        }
    }

    async fn fetch_permissions(
        &self,
        ctx: &FetchContext<'_>,
        drives: &[SharedDrive],
        previous: Option<PermissionsSnapshot>,
    ) -> Result<PermissionsSnapshot, AppError> {
        tracing::info!("Fetching permissions of {} shared drives", drives.len());
        ctx.progress
            .start("Fetching permissions", Some(drives.len() as u64));

        let mut snapshot = PermissionsSnapshot::new();
        let mut interrupted = false;
        for drive in drives {
            match fetch_drive_permissions(ctx.gateway, &drive.id, ctx.cancel).await {
                Ok(Fetched::Complete(permissions)) => {
                    snapshot.insert(
                        drive.id.clone(),
                        DrivePermissions {
                            name: drive.name.clone(),
                            permissions,
                        },
                    );
                    ctx.progress.advance(1);
                }
                // The drive's partial list is dropped; only whole drives are kept.
                Ok(Fetched::Interrupted(_)) => {
                    interrupted = true;
                    break;
                }
                Err(e) => {
                    ctx.progress.finish();
                    tracing::error!("Fetching permissions of drive {} failed: {}", drive.id, e);
                    return Err(e.into());
                }
            }
        }
        ctx.progress.finish();

        if interrupted {
            let persisted = self
                .persist_partial(
                    Snapshot::Permissions(snapshot),
                    previous.map(Snapshot::Permissions),
                )
                .await?;
            return Err(AppError::Interrupted {
                kind: SnapshotKind::Permissions,
                persisted,
            });
        }

        self.backend
            .put(&Snapshot::Permissions(snapshot.clone()))
            .await?;
        tracing::info!("Cached permissions of {} shared drives", snapshot.len());
        Ok(snapshot)
    }

    /// Persist an interrupted fetch. Partial new data wins over the previous document,
    /// unless nothing new arrived, in which case the previous document is put back.
    async fn persist_partial(
        &self,
        partial: Snapshot,
        previous: Option<Snapshot>,
    ) -> Result<usize, AppError> {
        let kind = partial.kind();
        let keep = match previous {
            Some(previous) if partial.is_empty() => {
                tracing::warn!(
                    "Interrupted before any {} arrived; restoring the previous snapshot",
                    kind
                );
                previous
            }
            _ if partial.is_empty() => {
                tracing::warn!("Interrupted before any {} arrived; nothing cached", kind);
                return Ok(0);
            }
            _ => partial,
        };

        self.backend.put(&keep).await?;
        tracing::warn!(
            "Interrupted; saved {} drive(s) to the {} snapshot",
            keep.len(),
            kind
        );
        Ok(keep.len())
    }
}

fn mismatched(expected: SnapshotKind, found: &Snapshot) -> AppError {
    AppError::Storage(format!(
        "backend returned a {} snapshot for {}",
        found.kind(),
        expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::{user_permission, FakeGateway};
    use crate::models::Role;
    use crate::progress::NoProgress;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn json_store(dir: &TempDir) -> SnapshotStore {
        SnapshotStore::new(Arc::new(JsonFileBackend::new(dir.path())), 100)
    }

    fn three_drives() -> FakeGateway {
        FakeGateway::with_page_size(2)
            .with_drive(
                "d1",
                "Finance",
                vec![user_permission("p1", "a@x.com", Role::Organizer)],
            )
            .with_drive(
                "d2",
                "Legal",
                vec![user_permission("p2", "b@x.com", Role::Writer)],
            )
            .with_drive(
                "d3",
                "Ops",
                vec![user_permission("p3", "a@x.com", Role::Reader)],
            )
    }

    #[tokio::test]
    async fn test_cache_hit_makes_no_gateway_calls() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(
            dir.path().join("shared_drives.json"),
            r#"[{"id":"zz","name":"Last"},{"id":"aa","name":"First"}]"#,
        )
        .await
        .unwrap();
        let store = json_store(&dir);
        let gateway = three_drives();
        let cancel = CancellationToken::new();
        let ctx = FetchContext::new(&gateway, &NoProgress, &cancel);

        let drives = store.get_drives(&ctx).await.unwrap();

        assert_eq!(
            drives,
            vec![SharedDrive::new("zz", "Last"), SharedDrive::new("aa", "First")]
        );
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cache_population_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = json_store(&dir);
        let gateway = three_drives();
        let cancel = CancellationToken::new();
        let ctx = FetchContext::new(&gateway, &NoProgress, &cancel);

        let first = store.get_drives(&ctx).await.unwrap();
        let calls_after_first = gateway.calls().len();
        let second = store.get_drives(&ctx).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls_after_first, 2);
        assert_eq!(gateway.calls().len(), calls_after_first);
        assert!(dir.path().join("shared_drives.json").exists());
    }

    #[tokio::test]
    async fn test_permissions_snapshot_built_from_every_drive() {
        let dir = TempDir::new().unwrap();
        let store = json_store(&dir);
        let gateway = three_drives();
        let cancel = CancellationToken::new();
        let ctx = FetchContext::new(&gateway, &NoProgress, &cancel);

        let snapshot = store.get_permissions_snapshot(&ctx).await.unwrap();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.get("d2").unwrap().name, "Legal");
        assert_eq!(
            snapshot.permissions_of("d3").unwrap()[0].email_address.as_deref(),
            Some("a@x.com")
        );
        assert_eq!(gateway.call_count("list_permissions"), 3);

        // Second call is served from the cache.
        let again = store.get_permissions_snapshot(&ctx).await.unwrap();
        assert_eq!(again, snapshot);
        assert_eq!(gateway.call_count("list_permissions"), 3);
    }

    #[tokio::test]
    async fn test_interrupted_build_keeps_completed_drives() {
        let dir = TempDir::new().unwrap();
        let store = json_store(&dir);
        let cancel = CancellationToken::new();
        let gateway = three_drives().cancel_after("list_permissions", 2, cancel.clone());
        let ctx = FetchContext::new(&gateway, &NoProgress, &cancel);

        let err = store.get_permissions_snapshot(&ctx).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Interrupted {
                kind: SnapshotKind::Permissions,
                persisted: 2
            }
        ));

        // The partial document is now a cache hit.
        let resumed = CancellationToken::new();
        let ctx = FetchContext::new(&gateway, &NoProgress, &resumed);
        let snapshot = store.get_permissions_snapshot(&ctx).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get("d3").is_none());
        assert!(matches!(
            snapshot.permissions_of("d3"),
            Err(AppError::StaleSnapshot { .. })
        ));
    }

    #[tokio::test]
    async fn test_refresh_replaces_cached_documents() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(
            dir.path().join("shared_drives.json"),
            r#"[{"id":"old","name":"Gone"}]"#,
        )
        .await
        .unwrap();
        tokio::fs::write(
            dir.path().join("permissions.json"),
            r#"{"old":{"name":"Gone","permissions":[]}}"#,
        )
        .await
        .unwrap();
        let store = json_store(&dir);
        let gateway = three_drives();
        let cancel = CancellationToken::new();
        let ctx = FetchContext::new(&gateway, &NoProgress, &cancel);

        let summary = store.refresh(SnapshotScope::Both, &ctx).await.unwrap();

        assert_eq!(
            summary,
            RefreshSummary {
                drives: Some(3),
                permissions: Some(3),
            }
        );
        let snapshot = store.get_permissions_snapshot(&ctx).await.unwrap();
        assert!(snapshot.get("old").is_none());
        assert_eq!(gateway.call_count("list_drives"), 2);
    }

    #[tokio::test]
    async fn test_refresh_interrupted_before_data_restores_previous() {
        let dir = TempDir::new().unwrap();
        let previous = r#"[{"id":"old","name":"Kept"}]"#;
        tokio::fs::write(dir.path().join("shared_drives.json"), previous)
            .await
            .unwrap();
        let store = json_store(&dir);
        let gateway = three_drives();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = FetchContext::new(&gateway, &NoProgress, &cancel);

        let err = store
            .refresh(SnapshotScope::Drives, &ctx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Interrupted {
                kind: SnapshotKind::Drives,
                persisted: 1
            }
        ));
        assert!(gateway.calls().is_empty());
        let fresh = CancellationToken::new();
        let ctx = FetchContext::new(&gateway, &NoProgress, &fresh);
        assert_eq!(
            store.get_drives(&ctx).await.unwrap(),
            vec![SharedDrive::new("old", "Kept")]
        );
    }

    #[tokio::test]
    async fn test_refresh_interrupted_mid_fetch_keeps_new_data() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(
            dir.path().join("shared_drives.json"),
            r#"[{"id":"old","name":"Replaced"}]"#,
        )
        .await
        .unwrap();
        let store = json_store(&dir);
        let cancel = CancellationToken::new();
        let gateway = three_drives().cancel_after("list_drives", 1, cancel.clone());
        let ctx = FetchContext::new(&gateway, &NoProgress, &cancel);

        let err = store
            .refresh(SnapshotScope::Drives, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Interrupted { persisted: 2, .. }));

        let json = tokio::fs::read_to_string(dir.path().join("shared_drives.json"))
            .await
            .unwrap();
        let drives: Vec<SharedDrive> = serde_json::from_str(&json).unwrap();
        let ids: Vec<&str> = drives.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["d1", "d2"]);
    }

    #[tokio::test]
    async fn test_permissions_refresh_without_drives_keeps_previous_document() {
        let dir = TempDir::new().unwrap();
        let previous = r#"{"old":{"name":"Kept","permissions":[]}}"#;
        tokio::fs::write(dir.path().join("permissions.json"), previous)
            .await
            .unwrap();
        let store = json_store(&dir);
        let gateway = three_drives();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = FetchContext::new(&gateway, &NoProgress, &cancel);

        let err = store
            .refresh(SnapshotScope::Permissions, &ctx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Interrupted {
                kind: SnapshotKind::Drives,
                persisted: 0
            }
        ));
        let json = tokio::fs::read_to_string(dir.path().join("permissions.json"))
            .await
            .unwrap();
        assert_eq!(json, previous);
        assert!(!dir.path().join("shared_drives.json").exists());
    }

    #[tokio::test]
    async fn test_permissions_refresh_uses_cached_drives() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(
            dir.path().join("shared_drives.json"),
            r#"[{"id":"d2","name":"Legal"}]"#,
        )
        .await
        .unwrap();
        tokio::fs::write(
            dir.path().join("permissions.json"),
            r#"{"old":{"name":"Gone","permissions":[]}}"#,
        )
        .await
        .unwrap();
        let store = json_store(&dir);
        let gateway = three_drives();
        let cancel = CancellationToken::new();
        let ctx = FetchContext::new(&gateway, &NoProgress, &cancel);

        let summary = store
            .refresh(SnapshotScope::Permissions, &ctx)
            .await
            .unwrap();

        assert_eq!(
            summary,
            RefreshSummary {
                drives: None,
                permissions: Some(1),
            }
        );
        assert_eq!(gateway.call_count("list_drives"), 0);
        let snapshot = store.get_permissions_snapshot(&ctx).await.unwrap();
        assert!(snapshot.get("old").is_none());
        assert_eq!(snapshot.get("d2").unwrap().name, "Legal");
    }

    #[tokio::test]
    async fn test_invalidate_reports_existence() {
        let dir = TempDir::new().unwrap();
        let store = json_store(&dir);
        let gateway = three_drives();
        let cancel = CancellationToken::new();
        let ctx = FetchContext::new(&gateway, &NoProgress, &cancel);
        store.get_drives(&ctx).await.unwrap();

        let removed = store.invalidate(SnapshotScope::Both).await.unwrap();
        assert_eq!(
            removed,
            vec![(SnapshotKind::Drives, true), (SnapshotKind::Permissions, false)]
        );

        let removed = store.invalidate(SnapshotScope::Both).await.unwrap();
        assert_eq!(
            removed,
            vec![(SnapshotKind::Drives, false), (SnapshotKind::Permissions, false)]
        );
    }

    #[tokio::test]
    async fn test_listing_error_is_fatal_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = json_store(&dir);
        let gateway = three_drives().fail_listing("d2");
        let cancel = CancellationToken::new();
        let ctx = FetchContext::new(&gateway, &NoProgress, &cancel);

        let err = store.get_permissions_snapshot(&ctx).await.unwrap_err();

        assert!(matches!(err, AppError::Gateway(_)));
        assert!(!dir.path().join("permissions.json").exists());
    }
}
