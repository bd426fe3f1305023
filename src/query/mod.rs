//! Read-only questions answered from the snapshots and the user directory.

use crate::errors::AppError;
use crate::gateway::{fetch_all_users, FetchContext, Fetched};
use crate::models::{PermissionsSnapshot, SharedDrive, User};
use crate::store::SnapshotStore;

/// Drives on which `email` holds a permission, in drives-snapshot order.
///
/// Populates either snapshot if it is missing. Email comparison is exact.
pub async fn drives_shared_with(
    store: &SnapshotStore,
    ctx: &FetchContext<'_>,
    email: &str,
) -> Result<Vec<SharedDrive>, AppError> {
    let drives = store.get_drives(ctx).await?;
    let snapshot = store.get_permissions_snapshot(ctx).await?;
    let shared = shared_with(&drives, &snapshot, email)?;
    tracing::info!("{} is a member of {} shared drive(s)", email, shared.len());
    Ok(shared)
}

/// Join the two snapshots. A drive missing from `snapshot` is a stale cache, not an
/// empty permission list.
pub fn shared_with(
    drives: &[SharedDrive],
    snapshot: &PermissionsSnapshot,
    email: &str,
) -> Result<Vec<SharedDrive>, AppError> {
    let mut shared = Vec::new();
    for drive in drives {
        let permissions = snapshot.permissions_of(&drive.id)?;
        if permissions
            .iter()
            .any(|p| p.email_address.as_deref() == Some(email))
        {
            shared.push(drive.clone());
        }
    }
    Ok(shared)
}

/// Every user of the domain. An interrupted listing returns what arrived.
pub async fn list_users(
    ctx: &FetchContext<'_>,
    customer: &str,
    max_results: u32,
) -> Result<Fetched<Vec<User>>, AppError> {
    ctx.progress.start("Fetching users", None);
    let fetched = fetch_all_users(ctx.gateway, customer, max_results, ctx.cancel).await;
    ctx.progress.finish();

    let fetched = fetched?;
    match &fetched {
        Fetched::Complete(users) => tracing::info!("Fetched {} users", users.len()),
        Fetched::Interrupted(users) => {
            tracing::warn!("Interrupted; showing the first {} users", users.len())
        }
    }
    Ok(fetched)
}

pub fn find_user_by_email<'a>(users: &'a [User], email: &str) -> Option<&'a User> {
    users.iter().find(|u| u.primary_email == email)
}

pub fn find_user_by_id<'a>(users: &'a [User], id: &str) -> Option<&'a User> {
    users.iter().find(|u| u.id == id)
}
