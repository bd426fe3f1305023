//! Tables, CSV export, and the confirmation prompt.

use std::borrow::Cow;
use std::path::Path;

use comfy_table::{Cell, Color, Table};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::errors::AppError;
use crate::models::{Permission, SharedDrive, User};
use crate::reconcile::ReconcileReport;

pub fn drives_table(drives: &[SharedDrive]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name"]);
    for drive in drives {
        table.add_row(vec![drive.id.as_str(), drive.name.as_str()]);
    }
    table
}

pub fn permissions_table(permissions: &[Permission]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Permission ID", "Type", "Member", "Role"]);
    for permission in permissions {
        table.add_row(vec![
            Cell::new(&permission.id),
            Cell::new(permission.kind),
            Cell::new(permission.principal().unwrap_or("-")),
            Cell::new(permission.role),
        ]);
    }
    table
}

pub fn users_table(users: &[User]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Email", "Name", "Admin", "Status"]);
    for user in users {
        let status = if user.suspended {
            Cell::new("Suspended").fg(Color::Red)
        } else {
            Cell::new("Active").fg(Color::Green)
        };
        table.add_row(vec![
            Cell::new(&user.id),
            Cell::new(&user.primary_email),
            Cell::new(user.full_name().unwrap_or("-")),
            Cell::new(yes_no(user.is_admin)),
            status,
        ]);
    }
    table
}

pub fn report_table(report: &ReconcileReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Drive", "Deleted", "Created", "Result"]);
    for outcome in &report.outcomes {
        let result = match &outcome.listing_error {
            Some(error) => Cell::new(format!("skipped: {}", error)).fg(Color::Red),
            None if outcome.is_clean() => Cell::new("ok").fg(Color::Green),
            None => Cell::new(format!(
                "{} failure(s)",
                outcome.deletion_failures + outcome.creation_failures
            ))
            .fg(Color::Yellow),
        };
        table.add_row(vec![
            Cell::new(outcome.drive.label()),
            Cell::new(format!(
                "{}/{}",
                outcome.deleted,
                outcome.deleted + outcome.deletion_failures
            )),
            Cell::new(format!(
                "{}/{}",
                outcome.created,
                outcome.created + outcome.creation_failures
            )),
            result,
        ]);
    }
    table
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// Quote a CSV field when it contains a separator, a quote, or a line break.
pub fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn csv_line(fields: &[&str]) -> String {
    let mut line = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

pub fn drives_csv(drives: &[SharedDrive]) -> String {
    let mut out = csv_line(&["Id", "Name"]);
    for drive in drives {
        out.push_str(&csv_line(&[drive.id.as_str(), drive.name.as_str()]));
    }
    out
}

pub fn users_csv(users: &[User]) -> String {
    let mut out = csv_line(&["Id", "Email", "Name", "Admin", "Status"]);
    for user in users {
        let status = if user.suspended { "Suspended" } else { "Active" };
        out.push_str(&csv_line(&[
            user.id.as_str(),
            user.primary_email.as_str(),
            user.full_name().unwrap_or(""),
            yes_no(user.is_admin),
            status,
        ]));
    }
    out
}

pub async fn write_export(path: &Path, contents: &str) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await.map_err(|e| {
        AppError::Storage(format!("cannot write {}: {}", path.display(), e))
    })
}

/// Ask a yes/no question on stderr. Anything but `y`/`yes` is a no.
pub async fn confirm(question: &str) -> Result<bool, AppError> {
    let mut stderr = tokio::io::stderr();
    stderr
        .write_all(format!("{} [y/N] ", question).as_bytes())
        .await?;
    stderr.flush().await?;

    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
