//! Configuration module for the shared drive admin tool.
//!
//! All configuration is loaded from environment variables (optionally via a `.env` file)
//! with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AppError;

pub const DEFAULT_DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_DIRECTORY_API_BASE: &str = "https://admin.googleapis.com/admin/directory/v1";

/// Where snapshots are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// `shared_drives.json` and `permissions.json` in the data directory
    Json,
    /// `snapshots.sqlite` in the data directory
    Sqlite,
}

impl FromStr for CacheBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(CacheBackend::Json),
            "sqlite" => Ok(CacheBackend::Sqlite),
            other => Err(AppError::Config(format!(
                "DRIVE_ADMIN_CACHE_BACKEND must be 'json' or 'sqlite', got '{}'",
                other
            ))),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the snapshot documents
    pub data_dir: PathBuf,
    /// Snapshot storage backend
    pub cache_backend: CacheBackend,
    /// Stored OAuth token file (`token.json`)
    pub token_path: PathBuf,
    /// Access token that takes precedence over the token file
    pub access_token: Option<String>,
    pub drive_api_base: String,
    pub directory_api_base: String,
    /// Directory API customer, `my_customer` for the caller's own domain
    pub customer: String,
    pub drive_page_size: u32,
    pub user_page_size: u32,
    /// Retries after the first attempt for retryable gateway failures
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub request_timeout: Duration,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let data_dir = env::var("DRIVE_ADMIN_DATA_DIR")
            .unwrap_or_else(|_| "./data".to_string())
            .into();

        let cache_backend = env::var("DRIVE_ADMIN_CACHE_BACKEND")
            .unwrap_or_else(|_| "json".to_string())
            .parse()?;

        let token_path = env::var("DRIVE_ADMIN_TOKEN_PATH")
            .unwrap_or_else(|_| "./token.json".to_string())
            .into();

        let access_token = env::var("DRIVE_ADMIN_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let drive_api_base = env::var("DRIVE_ADMIN_DRIVE_API_BASE")
            .unwrap_or_else(|_| DEFAULT_DRIVE_API_BASE.to_string());

        let directory_api_base = env::var("DRIVE_ADMIN_DIRECTORY_API_BASE")
            .unwrap_or_else(|_| DEFAULT_DIRECTORY_API_BASE.to_string());

        let customer =
            env::var("DRIVE_ADMIN_CUSTOMER").unwrap_or_else(|_| "my_customer".to_string());

        let drive_page_size = parse_var("DRIVE_ADMIN_DRIVE_PAGE_SIZE", 100)?;
        let user_page_size = parse_var("DRIVE_ADMIN_USER_PAGE_SIZE", 200)?;
        let max_retries = parse_var("DRIVE_ADMIN_MAX_RETRIES", 3)?;
        let retry_base_delay =
            Duration::from_millis(parse_var("DRIVE_ADMIN_RETRY_BASE_DELAY_MS", 500)?);
        let request_timeout =
            Duration::from_secs(parse_var("DRIVE_ADMIN_REQUEST_TIMEOUT_SECS", 30)?);

        let log_level = env::var("DRIVE_ADMIN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            data_dir,
            cache_backend,
            token_path,
            access_token,
            drive_api_base,
            directory_api_base,
            customer,
            drive_page_size,
            user_page_size,
            max_retries,
            retry_base_delay,
            request_timeout,
            log_level,
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value '{}'", name, raw))),
        Err(_) => Ok(default),
    }
}
