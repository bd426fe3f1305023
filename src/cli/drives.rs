use std::path::PathBuf;

use clap::Args;

use super::output;
use crate::errors::AppError;
use crate::gateway::FetchContext;
use crate::query;
use crate::store::SnapshotStore;

#[derive(Args, Clone)]
pub struct DrivesArgs {
    /// Write the drives to a CSV file instead of printing them
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,
}

#[derive(Args, Clone)]
pub struct SharedWithArgs {
    /// Member email, matched exactly
    #[arg(value_name = "EMAIL")]
    pub email: String,
}

pub async fn list(
    store: &SnapshotStore,
    ctx: &FetchContext<'_>,
    args: &DrivesArgs,
) -> Result<(), AppError> {
    let drives = store.get_drives(ctx).await?;

    match &args.export {
        Some(path) => {
            output::write_export(path, &output::drives_csv(&drives)).await?;
            println!("Exported {} drive(s) to {}", drives.len(), path.display());
        }
        None => {
            println!("{}", output::drives_table(&drives));
            eprintln!("{} shared drive(s)", drives.len());
        }
    }
    Ok(())
}

pub async fn shared_with(
    store: &SnapshotStore,
    ctx: &FetchContext<'_>,
    args: &SharedWithArgs,
) -> Result<(), AppError> {
    let drives = query::drives_shared_with(store, ctx, &args.email).await?;

    if drives.is_empty() {
        eprintln!("{} is not a member of any shared drive", args.email);
        return Ok(());
    }
    println!("{}", output::drives_table(&drives));
    eprintln!("{} is a member of {} shared drive(s)", args.email, drives.len());
    Ok(())
}
