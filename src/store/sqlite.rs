//! SQLite snapshot backend: one row per snapshot kind.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::{Snapshot, SnapshotBackend, SnapshotKind};
use crate::errors::AppError;

#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open (creating if needed) the database file and run migrations.
    pub async fn open(db_path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        run_migrations(&pool).await?;

        Ok(Self { pool })
    }
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snapshots (
            kind TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            item_count INTEGER NOT NULL,
            fetched_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[async_trait]
impl SnapshotBackend for SqliteBackend {
    async fn get(&self, kind: SnapshotKind) -> Result<Option<Snapshot>, AppError> {
        let row = sqlx::query("SELECT body FROM snapshots WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let body: String = row.get("body");
                Snapshot::from_json(kind, &body).map(Some).map_err(|e| {
                    AppError::Storage(format!("malformed {} snapshot row: {}", kind, e))
                })
            }
            None => Ok(None),
        }
    }

    async fn put(&self, snapshot: &Snapshot) -> Result<(), AppError> {
        let body = snapshot.to_json()?;

        sqlx::query(
            r#"
            INSERT INTO snapshots (kind, body, item_count, fetched_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(kind) DO UPDATE SET
                body = excluded.body,
                item_count = excluded.item_count,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(snapshot.kind().as_str())
        .bind(&body)
        .bind(snapshot.len() as i64)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            kind = snapshot.kind().as_str(),
            drives = snapshot.len(),
            "Stored snapshot"
        );
        Ok(())
    }

    async fn invalidate(&self, kind: SnapshotKind) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM snapshots WHERE kind = ?")
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
