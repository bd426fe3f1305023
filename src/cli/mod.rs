//! Command-line surface of `drive-admin`.

mod cache;
mod drives;
mod output;
mod permissions;
mod users;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use crate::auth::Session;
use crate::config::Config;
use crate::errors::AppError;
use crate::gateway::{FetchContext, GoogleGateway};
use crate::progress::BarProgress;
use crate::store::{SnapshotScope, SnapshotStore};

/// Inventory and bulk-edit Google Workspace shared drive permissions
#[derive(Parser)]
#[command(name = "drive-admin")]
#[command(author, version)]
#[command(after_help = "EXAMPLES:
    # Rebuild the local cache of drives and permissions
    drive-admin reload

    # Which drives can this person see?
    drive-admin shared-with jane@example.com

    # Make staff@ the only writer on every drive except two
    drive-admin replace --grant group:staff@example.com:writer --all --exclude 0AbC --exclude 0DeF
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Refresh the local drive and permission snapshots
    Reload(cache::ReloadArgs),

    /// List or export the cached shared drives
    Drives(drives::DrivesArgs),

    /// Drives on which a member holds a permission
    SharedWith(drives::SharedWithArgs),

    /// Live permissions of one drive
    Permissions(permissions::ListArgs),

    /// Add one permission to a drive
    Grant(permissions::GrantArgs),

    /// Remove one permission from a drive
    Revoke(permissions::RevokeArgs),

    /// Replace all permissions of many drives with a new set
    Replace(permissions::ReplaceArgs),

    /// List, export, or look up domain users
    Users(users::UsersArgs),

    /// Delete cached snapshots without re-fetching
    CacheClear(cache::ClearArgs),

    /// Delete the stored access token and the cache
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    Drives,
    Permissions,
    Both,
}

impl From<ScopeArg> for SnapshotScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Drives => SnapshotScope::Drives,
            ScopeArg::Permissions => SnapshotScope::Permissions,
            ScopeArg::Both => SnapshotScope::Both,
        }
    }
}

/// Run one command. Commands that never reach Google skip loading credentials.
pub async fn run(cli: Cli, config: Config, cancel: CancellationToken) -> Result<(), AppError> {
    let store = SnapshotStore::open(&config).await?;

    match cli.command {
        Commands::Disconnect => cache::disconnect(&config, &store).await,
        Commands::CacheClear(args) => cache::clear(&store, &args).await,
        command => {
            let session = Session::load(&config).await?;
            let gateway = GoogleGateway::new(&config, session)?;
            let progress = BarProgress::new();
            let ctx = FetchContext::new(&gateway, &progress, &cancel);
            dispatch(command, &config, &store, &ctx).await
        }
    }
}

async fn dispatch(
    command: Commands,
    config: &Config,
    store: &SnapshotStore,
    ctx: &FetchContext<'_>,
) -> Result<(), AppError> {
    match command {
        Commands::Reload(args) => cache::reload(store, ctx, &args).await,
        Commands::Drives(args) => drives::list(store, ctx, &args).await,
        Commands::SharedWith(args) => drives::shared_with(store, ctx, &args).await,
        Commands::Permissions(args) => permissions::list(ctx, &args).await,
        Commands::Grant(args) => permissions::grant(ctx, &args).await,
        Commands::Revoke(args) => permissions::revoke(ctx, &args).await,
        Commands::Replace(args) => permissions::replace(store, ctx, &args).await,
        Commands::Users(args) => users::execute(config, ctx, &args).await,
        Commands::Disconnect | Commands::CacheClear(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_requires_a_target() {
        let parsed = Cli::try_parse_from([
            "drive-admin",
            "replace",
            "--grant",
            "user:a@x.com:reader",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_drive_and_all_conflict() {
        let parsed = Cli::try_parse_from([
            "drive-admin",
            "replace",
            "--grant",
            "user:a@x.com:reader",
            "--drive",
            "d1",
            "--all",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_replace_all_with_exclusions() {
        let cli = Cli::try_parse_from([
            "drive-admin",
            "replace",
            "--grant",
            "user:a@x.com:reader",
            "--grant",
            "domain:x.com:commenter",
            "--all",
            "--exclude",
            "d2",
            "--yes",
        ])
        .unwrap();

        match cli.command {
            Commands::Replace(args) => {
                assert_eq!(args.grants.len(), 2);
                assert!(args.all);
                assert_eq!(args.exclude, ["d2"]);
                assert!(args.yes);
            }
            _ => panic!("expected replace"),
        }
    }

    #[test]
    fn test_replace_without_grants_strips_drives() {
        let cli = Cli::try_parse_from(["drive-admin", "replace", "--drive", "d1"]).unwrap();
        match cli.command {
            Commands::Replace(args) => {
                assert!(args.grants.is_empty());
                assert_eq!(args.drives, ["d1"]);
                assert!(!args.yes);
            }
            _ => panic!("expected replace"),
        }
    }

    #[test]
    fn test_reload_scope_defaults_to_both() {
        let cli = Cli::try_parse_from(["drive-admin", "reload"]).unwrap();
        match cli.command {
            Commands::Reload(args) => assert_eq!(args.scope, ScopeArg::Both),
            _ => panic!("expected reload"),
        }
    }
}
