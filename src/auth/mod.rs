//! Session credentials.
//!
//! The OAuth consent flow lives outside this tool; it only reads the access token the
//! flow stored in `token.json` (or takes one from the environment) and can delete that
//! file on disconnect.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::config::Config;
use crate::errors::AppError;

/// Authorized-user file written by the Google OAuth client libraries.
#[derive(Deserialize)]
struct StoredToken {
    #[serde(alias = "access_token")]
    token: Option<String>,
}

/// Credentials for one CLI session, passed explicitly to the gateway.
#[derive(Clone)]
pub struct Session {
    access_token: String,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    /// Resolve credentials from the environment override or the token file.
    pub async fn load(config: &Config) -> Result<Self, AppError> {
        if let Some(token) = &config.access_token {
            tracing::debug!("Using access token from DRIVE_ADMIN_ACCESS_TOKEN");
            return Ok(Self::new(token.clone()));
        }
        Self::from_token_file(&config.token_path).await
    }

    pub async fn from_token_file(path: &Path) -> Result<Self, AppError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Credentials(format!(
                "cannot read token file {}: {} (authorize first or set DRIVE_ADMIN_ACCESS_TOKEN)",
                path.display(),
                e
            ))
        })?;
        let stored: StoredToken = serde_json::from_str(&contents).map_err(|e| {
            AppError::Credentials(format!("malformed token file {}: {}", path.display(), e))
        })?;
        match stored.token {
            Some(token) if !token.trim().is_empty() => Ok(Self::new(token)),
            _ => Err(AppError::Credentials(format!(
                "token file {} holds no access token",
                path.display()
            ))),
        }
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Delete the stored token file. Returns whether it existed.
pub async fn delete_token(path: &Path) -> Result<bool, AppError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(AppError::Credentials(format!(
            "cannot delete token file {}: {}",
            path.display(),
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_token_file_formats() {
        let dir = TempDir::new().unwrap();

        let path = dir.path().join("token.json");
        tokio::fs::write(&path, r#"{"token":"ya29.abc","refresh_token":"r"}"#)
            .await
            .unwrap();
        let session = Session::from_token_file(&path).await.unwrap();
        assert_eq!(session.bearer(), "Bearer ya29.abc");

        tokio::fs::write(&path, r#"{"access_token":"ya29.def"}"#)
            .await
            .unwrap();
        let session = Session::from_token_file(&path).await.unwrap();
        assert_eq!(session.bearer(), "Bearer ya29.def");

        tokio::fs::write(&path, r#"{"refresh_token":"r"}"#).await.unwrap();
        assert!(matches!(
            Session::from_token_file(&path).await,
            Err(AppError::Credentials(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_token_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");

        assert!(matches!(
            Session::from_token_file(&path).await,
            Err(AppError::Credentials(_))
        ));
        assert!(!delete_token(&path).await.unwrap());

        tokio::fs::write(&path, "{}").await.unwrap();
        assert!(delete_token(&path).await.unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = Session::new("secret");
        assert!(!format!("{:?}", session).contains("secret"));
    }
}
