use std::path::PathBuf;

use clap::Args;

use super::output;
use crate::config::Config;
use crate::errors::AppError;
use crate::gateway::FetchContext;
use crate::models::User;
use crate::query::{self, find_user_by_email, find_user_by_id};

#[derive(Args, Clone)]
pub struct UsersArgs {
    /// Write the users to a CSV file instead of printing them
    #[arg(long, value_name = "FILE", conflicts_with = "find")]
    pub export: Option<PathBuf>,

    /// Show only the user with this primary email or id
    #[arg(long, value_name = "EMAIL_OR_ID")]
    pub find: Option<String>,
}

/// Partial listings are shown but never exported, and a miss in one is not a "no match".
pub async fn execute(
    config: &Config,
    ctx: &FetchContext<'_>,
    args: &UsersArgs,
) -> Result<(), AppError> {
    let fetched = query::list_users(ctx, &config.customer, config.user_page_size).await?;
    let complete = fetched.is_complete();
    let users = fetched.into_inner();

    if let Some(needle) = &args.find {
        match lookup(&users, complete, needle)? {
            Some(user) => println!("{}", output::users_table(std::slice::from_ref(user))),
            None => eprintln!("No user matches {}", needle),
        }
        return Ok(());
    }

    if let Some(path) = &args.export {
        if !complete {
            return Err(cut_short(&users));
        }
        output::write_export(path, &output::users_csv(&users)).await?;
        println!("Exported {} user(s) to {}", users.len(), path.display());
        return Ok(());
    }

    println!("{}", output::users_table(&users));
    if !complete {
        return Err(cut_short(&users));
    }
    eprintln!("{} user(s)", users.len());
    Ok(())
}

fn lookup<'a>(
    users: &'a [User],
    complete: bool,
    needle: &str,
) -> Result<Option<&'a User>, AppError> {
    let found = if needle.contains('@') {
        find_user_by_email(users, needle)
    } else {
        find_user_by_id(users, needle)
    };
    match found {
        None if !complete => Err(cut_short(users)),
        found => Ok(found),
    }
}

fn cut_short(users: &[User]) -> AppError {
    AppError::ListingInterrupted {
        listing: "users",
        received: users.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Vec<User> {
        serde_json::from_str(
            r#"[{"id":"u1","primaryEmail":"a@x.com"},{"id":"u2","primaryEmail":"b@x.com"}]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_in_complete_listing() {
        let users = users();

        assert_eq!(lookup(&users, true, "b@x.com").unwrap().unwrap().id, "u2");
        assert_eq!(lookup(&users, true, "u1").unwrap().unwrap().primary_email, "a@x.com");
        assert!(lookup(&users, true, "zz@x.com").unwrap().is_none());
    }

    #[test]
    fn test_miss_in_interrupted_listing_is_not_a_miss() {
        let users = users();

        assert_eq!(lookup(&users, false, "a@x.com").unwrap().unwrap().id, "u1");
        let err = lookup(&users, false, "zz@x.com").unwrap_err();
        assert!(matches!(
            err,
            AppError::ListingInterrupted {
                listing: "users",
                received: 2
            }
        ));
        assert_eq!(err.error_code(), crate::errors::codes::INTERRUPTED);
    }
}
