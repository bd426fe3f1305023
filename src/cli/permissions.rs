//! Single-drive permission commands and the bulk replacement.

use clap::{ArgGroup, Args};

use super::output;
use crate::errors::AppError;
use crate::gateway::{fetch_drive_permissions, FetchContext, Fetched};
use crate::models::{Grantee, PermissionSpec};
use crate::reconcile::{reconcile, TargetSelection};
use crate::store::SnapshotStore;

#[derive(Args, Clone)]
pub struct ListArgs {
    #[arg(value_name = "DRIVE_ID")]
    pub drive_id: String,
}

#[derive(Args, Clone)]
pub struct GrantArgs {
    #[arg(value_name = "DRIVE_ID")]
    pub drive_id: String,

    /// user, group or domain
    #[arg(long = "type", value_name = "TYPE")]
    pub kind: String,

    /// organizer, fileOrganizer, writer, commenter or reader
    #[arg(long)]
    pub role: String,

    /// Email address, or the domain name for a domain permission
    #[arg(long)]
    pub member: String,
}

#[derive(Args, Clone)]
pub struct RevokeArgs {
    #[arg(value_name = "DRIVE_ID")]
    pub drive_id: String,

    #[arg(value_name = "PERMISSION_ID")]
    pub permission_id: String,
}

#[derive(Args, Clone)]
#[command(group(ArgGroup::new("targets").required(true).args(["drives", "all"])))]
pub struct ReplaceArgs {
    /// Permission to create, repeatable. Without any, every permission is removed.
    #[arg(long = "grant", value_name = "TYPE:MEMBER:ROLE")]
    pub grants: Vec<String>,

    /// Target drive id, repeatable
    #[arg(long = "drive", value_name = "DRIVE_ID")]
    pub drives: Vec<String>,

    /// Target every cached drive
    #[arg(long)]
    pub all: bool,

    /// Drive id to leave alone with --all, repeatable
    #[arg(long, value_name = "DRIVE_ID", requires = "all")]
    pub exclude: Vec<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

pub async fn list(ctx: &FetchContext<'_>, args: &ListArgs) -> Result<(), AppError> {
    let fetched = fetch_drive_permissions(ctx.gateway, &args.drive_id, ctx.cancel).await?;
    let permissions = match fetched {
        Fetched::Complete(permissions) => permissions,
        Fetched::Interrupted(permissions) => {
            tracing::warn!("Interrupted; the list below is incomplete");
            permissions
        }
    };

    println!("{}", output::permissions_table(&permissions));
    eprintln!("{} permission(s) on {}", permissions.len(), args.drive_id);
    Ok(())
}

pub async fn grant(ctx: &FetchContext<'_>, args: &GrantArgs) -> Result<(), AppError> {
    let spec = PermissionSpec::new(Grantee::parse(&args.kind, &args.member)?, args.role.parse()?)?;

    let id = ctx.gateway.create_permission(&args.drive_id, &spec).await?;

    tracing::info!("Created permission {} on {}", id, args.drive_id);
    println!("Granted {} on {} (permission {})", spec, args.drive_id, id);
    Ok(())
}

pub async fn revoke(ctx: &FetchContext<'_>, args: &RevokeArgs) -> Result<(), AppError> {
    ctx.gateway
        .delete_permission(&args.drive_id, &args.permission_id)
        .await?;

    tracing::info!("Deleted permission {} on {}", args.permission_id, args.drive_id);
    println!("Revoked permission {} on {}", args.permission_id, args.drive_id);
    Ok(())
}

pub async fn replace(
    store: &SnapshotStore,
    ctx: &FetchContext<'_>,
    args: &ReplaceArgs,
) -> Result<(), AppError> {
    let grants = args
        .grants
        .iter()
        .map(|g| PermissionSpec::parse_grant(g))
        .collect::<Result<Vec<_>, _>>()?;

    let selection = if args.all {
        TargetSelection::AllExcept(args.exclude.clone())
    } else {
        TargetSelection::Explicit(args.drives.clone())
    };
    let targets = selection.resolve(store, ctx).await?;

    if !args.yes {
        let granted = if grants.is_empty() {
            "nothing (drives are left with no members)".to_string()
        } else {
            grants
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let question = format!(
            "Delete ALL current permissions on {} drive(s) and grant {}?",
            targets.len(),
            granted
        );
        if !output::confirm(&question).await? {
            eprintln!("Aborted, nothing was changed");
            return Ok(());
        }
    }

    let report = reconcile(ctx, &targets, &grants).await?;

    println!("{}", output::report_table(&report));
    for outcome in &report.outcomes {
        for failure in &outcome.failures {
            eprintln!(
                "{}: {} {} failed: {}",
                outcome.drive.label(),
                failure.phase,
                failure.target,
                failure.error
            );
        }
    }
    if report.interrupted {
        eprintln!(
            "Interrupted: {} of {} drive(s) processed",
            report.outcomes.len(),
            targets.len()
        );
    } else if report.is_clean() {
        eprintln!("All {} drive(s) updated", report.outcomes.len());
    } else {
        eprintln!(
            "{} of {} drive(s) had failures",
            report.failed_drives(),
            report.outcomes.len()
        );
    }
    Ok(())
}
