//! Bulk permission replacement across many shared drives.
//!
//! For each target drive, sequentially: list the live permissions, delete every one of
//! them, then create every requested grant. The two phases are NOT atomic. Each delete
//! and each create is attempted independently and a failure is recorded without stopping
//! the run, so a drive can end up with fewer permissions than requested (deletes went
//! through, some creates did not). Nothing is rolled back; the [`ReconcileReport`] says
//! exactly what happened per drive.
//!
//! Live permissions always come from the gateway, never from the snapshot store, and the
//! reconciler never writes the store.

use std::fmt;

use crate::errors::AppError;
use crate::gateway::{fetch_drive_permissions, FetchContext, Fetched};
use crate::models::{DriveRef, PermissionSpec, SharedDrive};
use crate::store::SnapshotStore;

/// Which drives a bulk replacement applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelection {
    /// These drive ids, in this order.
    Explicit(Vec<String>),
    /// Every cached drive except these ids, in cache order.
    AllExcept(Vec<String>),
}

impl TargetSelection {
    /// Turn the selection into concrete drives. `AllExcept` reads the drives snapshot
    /// (fetching it on a miss).
    pub async fn resolve(
        &self,
        store: &SnapshotStore,
        ctx: &FetchContext<'_>,
    ) -> Result<Vec<DriveRef>, AppError> {
        let targets: Vec<DriveRef> = match self {
            TargetSelection::Explicit(ids) => ids
                .iter()
                .map(|id| id.trim())
                .filter(|id| !id.is_empty())
                .map(DriveRef::from_id)
                .collect(),
            TargetSelection::AllExcept(excluded) => {
                let drives = store.get_drives(ctx).await?;
                select_all_except(&drives, excluded)
            }
        };

        if targets.is_empty() {
            return Err(AppError::Validation("no target drives selected".to_string()));
        }
        Ok(targets)
    }
}

/// Every drive whose id is not in `excluded`, keeping the input order.
pub fn select_all_except(drives: &[SharedDrive], excluded: &[String]) -> Vec<DriveRef> {
    drives
        .iter()
        .filter(|drive| !excluded.iter().any(|id| id == &drive.id))
        .map(DriveRef::from)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Delete,
    Create,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Delete => f.write_str("delete"),
            Phase::Create => f.write_str("create"),
        }
    }
}

/// A single delete or create that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub phase: Phase,
    /// Permission id for deletes, `type:member:role` for creates.
    pub target: String,
    pub error: String,
}

/// What happened to one drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveOutcome {
    pub drive: DriveRef,
    pub deleted: usize,
    pub deletion_failures: usize,
    pub created: usize,
    pub creation_failures: usize,
    /// Set when the live permission list could not be read; the drive was left untouched.
    pub listing_error: Option<String>,
    pub failures: Vec<ItemFailure>,
}

impl DriveOutcome {
    fn new(drive: DriveRef) -> Self {
        Self {
            drive,
            deleted: 0,
            deletion_failures: 0,
            created: 0,
            creation_failures: 0,
            listing_error: None,
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.listing_error.is_none() && self.deletion_failures == 0 && self.creation_failures == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub outcomes: Vec<DriveOutcome>,
    /// The user cancelled; drives after the last outcome were not touched.
    pub interrupted: bool,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        !self.interrupted && self.outcomes.iter().all(DriveOutcome::is_clean)
    }

    pub fn failed_drives(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_clean()).count()
    }
}

/// Replace the permissions of every target drive with `grants`.
///
/// An empty `grants` strips every permission from the targets. Fails only when no
/// target is given; gateway failures end up in the report.
pub async fn reconcile(
    ctx: &FetchContext<'_>,
    targets: &[DriveRef],
    grants: &[PermissionSpec],
) -> Result<ReconcileReport, AppError> {
    if targets.is_empty() {
        return Err(AppError::Validation("no target drives selected".to_string()));
    }
    tracing::info!(
        "Replacing permissions on {} drive(s) with {} grant(s)",
        targets.len(),
        grants.len()
    );
    ctx.progress
        .start("Replacing permissions", Some(targets.len() as u64));

    let mut report = ReconcileReport::default();
    for drive in targets {
        if ctx.cancel.is_cancelled() {
            report.interrupted = true;
            break;
        }
        match reconcile_drive(ctx, drive, grants).await {
            Some(outcome) => report.outcomes.push(outcome),
            None => {
                report.interrupted = true;
                break;
            }
        }
        ctx.progress.advance(1);
    }
    ctx.progress.finish();

    if report.interrupted {
        tracing::warn!(
            "Interrupted after {} of {} drive(s)",
            report.outcomes.len(),
            targets.len()
        );
    }
    Ok(report)
}

/// `None` when cancelled during listing, before anything was changed.
async fn reconcile_drive(
    ctx: &FetchContext<'_>,
    drive: &DriveRef,
    grants: &[PermissionSpec],
) -> Option<DriveOutcome> {
    let mut outcome = DriveOutcome::new(drive.clone());

    let current = match fetch_drive_permissions(ctx.gateway, &drive.id, ctx.cancel).await {
        Ok(Fetched::Complete(permissions)) => permissions,
        Ok(Fetched::Interrupted(_)) => return None,
        Err(e) => {
            tracing::warn!("Skipping drive {}: cannot list permissions: {}", drive.label(), e);
            outcome.listing_error = Some(e.to_string());
            return Some(outcome);
        }
    };

    for permission in &current {
        match ctx.gateway.delete_permission(&drive.id, &permission.id).await {
            Ok(()) => outcome.deleted += 1,
            Err(e) => {
                tracing::warn!(
                    "Failed to delete permission {} on {}: {}",
                    permission.id,
                    drive.label(),
                    e
                );
                outcome.deletion_failures += 1;
                outcome.failures.push(ItemFailure {
                    phase: Phase::Delete,
                    target: permission.id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    for grant in grants {
        match ctx.gateway.create_permission(&drive.id, grant).await {
            Ok(id) => {
                tracing::debug!("Created permission {} ({}) on {}", id, grant, drive.label());
                outcome.created += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to grant {} on {}: {}", grant, drive.label(), e);
                outcome.creation_failures += 1;
                outcome.failures.push(ItemFailure {
                    phase: Phase::Create,
                    target: grant.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        "{}: deleted {}/{}, created {}/{}",
        drive.label(),
        outcome.deleted,
        current.len(),
        outcome.created,
        grants.len()
    );
    Some(outcome)
}
