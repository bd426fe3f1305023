//! Cache maintenance: reload, clear, disconnect.

use clap::Args;

use super::ScopeArg;
use crate::auth::delete_token;
use crate::config::Config;
use crate::errors::AppError;
use crate::gateway::FetchContext;
use crate::store::{SnapshotScope, SnapshotStore};

#[derive(Args, Clone)]
pub struct ReloadArgs {
    /// Which snapshots to refresh
    #[arg(long, value_enum, default_value_t = ScopeArg::Both)]
    pub scope: ScopeArg,
}

#[derive(Args, Clone)]
pub struct ClearArgs {
    /// Which snapshots to delete
    #[arg(long, value_enum, default_value_t = ScopeArg::Both)]
    pub scope: ScopeArg,
}

pub async fn reload(
    store: &SnapshotStore,
    ctx: &FetchContext<'_>,
    args: &ReloadArgs,
) -> Result<(), AppError> {
    let summary = store.refresh(args.scope.into(), ctx).await?;

    if let Some(count) = summary.drives {
        println!("Reloaded {} shared drive(s)", count);
    }
    if let Some(count) = summary.permissions {
        println!("Reloaded permissions of {} shared drive(s)", count);
    }
    Ok(())
}

pub async fn clear(store: &SnapshotStore, args: &ClearArgs) -> Result<(), AppError> {
    for (kind, existed) in store.invalidate(args.scope.into()).await? {
        if existed {
            println!("Removed the {} snapshot", kind);
        } else {
            println!("No {} snapshot to remove", kind);
        }
    }
    Ok(())
}

pub async fn disconnect(config: &Config, store: &SnapshotStore) -> Result<(), AppError> {
    if delete_token(&config.token_path).await? {
        println!("Deleted {}", config.token_path.display());
    } else {
        println!("No stored token at {}", config.token_path.display());
    }

    for (kind, existed) in store.invalidate(SnapshotScope::Both).await? {
        if existed {
            println!("Removed the {} snapshot", kind);
        }
    }
    tracing::info!("Disconnected");
    Ok(())
}
