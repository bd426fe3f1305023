//! HTTP implementation of the gateway against the Google REST endpoints.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{DirectoryGateway, Page, RetryPolicy};
use crate::auth::Session;
use crate::config::Config;
use crate::errors::{AppError, GatewayError};
use crate::models::{Permission, PermissionSpec, SharedDrive, User};

const PERMISSION_FIELDS: &str = "nextPageToken,permissions(id,emailAddress,domain,type,kind,role)";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveList {
    #[serde(default)]
    drives: Vec<SharedDrive>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PermissionList {
    #[serde(default)]
    permissions: Vec<Permission>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserList {
    #[serde(default)]
    users: Vec<User>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct CreatedPermission {
    id: String,
}

/// `{"error": {"code": 403, "message": "...", "errors": [{"reason": "..."}]}}`
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Deserialize)]
struct ErrorItem {
    reason: Option<String>,
}

/// Drive v3 / Admin Directory v1 client bound to one session.
pub struct GoogleGateway {
    client: Client,
    session: Session,
    drive_base: Url,
    directory_base: Url,
    retry: RetryPolicy,
}

impl GoogleGateway {
    pub fn new(config: &Config, session: Session) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            session,
            drive_base: parse_base(&config.drive_api_base)?,
            directory_base: parse_base(&config.directory_api_base)?,
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Ids are pushed as single percent-encoded segments, so a `/` or `..` inside an id
    /// cannot address a different resource.
    fn permissions_url(&self, drive_id: &str) -> Url {
        with_segments(&self.drive_base, &["files", drive_id, "permissions"])
    }

    /// Send a request, retrying retryable failures with backoff.
    ///
    /// `build` is called once per attempt because a sent request cannot be reused.
    async fn execute(
        &self,
        operation: &str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response, GatewayError> {
        let mut attempt = 0;
        loop {
            tracing::debug!(operation, attempt, "Sending request");
            let err = match build()
                .header(AUTHORIZATION, self.session.bearer())
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => error_from_response(resp).await,
                Err(e) => GatewayError::from(e),
            };

            if !err.is_retryable() || attempt >= self.retry.max_retries {
                return Err(err);
            }

            let delay = self.retry.delay_for(attempt);
            tracing::warn!(
                operation,
                attempt = attempt + 1,
                status = ?err.status(),
                delay_ms = delay.as_millis() as u64,
                "Retrying after {}",
                err
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<T, GatewayError> {
        let resp = self.execute(operation, build).await?;
        Ok(resp.json::<T>().await?)
    }
}

fn parse_base(raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw)
        .map_err(|e| AppError::Config(format!("invalid API base URL {}: {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(AppError::Config(format!("invalid API base URL {}", raw)));
    }
    Ok(url)
}

fn with_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    // `parse_base` rejects cannot-be-a-base URLs, the only case where this fails.
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

async fn error_from_response(resp: Response) -> GatewayError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();

    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => {
            let reason = envelope.error.errors.iter().find_map(|e| e.reason.as_deref());
            GatewayError::from_status(status, reason, envelope.error.message.clone())
        }
        Err(_) => GatewayError::from_status(status, None, body),
    }
}

#[async_trait]
impl DirectoryGateway for GoogleGateway {
    async fn list_drives(
        &self,
        use_domain_admin_access: bool,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<Page<SharedDrive>, GatewayError> {
        let url = with_segments(&self.drive_base, &["drives"]);
        let admin = use_domain_admin_access.to_string();
        let size = page_size.to_string();

        let list: DriveList = self
            .get_json("drives.list", || {
                let req = self.client.get(url.clone()).query(&[
                    ("useDomainAdminAccess", admin.as_str()),
                    ("pageSize", size.as_str()),
                ]);
                with_page_token(req, page_token)
            })
            .await?;

        Ok(Page {
            items: list.drives,
            next_page_token: list.next_page_token,
        })
    }

    async fn list_permissions(
        &self,
        drive_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<Permission>, GatewayError> {
        let url = self.permissions_url(drive_id);

        let list: PermissionList = self
            .get_json("permissions.list", || {
                let req = self.client.get(url.clone()).query(&[
                    ("supportsAllDrives", "true"),
                    ("useDomainAdminAccess", "true"),
                    ("fields", PERMISSION_FIELDS),
                ]);
                with_page_token(req, page_token)
            })
            .await?;

        Ok(Page {
            items: list.permissions,
            next_page_token: list.next_page_token,
        })
    }

    async fn create_permission(
        &self,
        drive_id: &str,
        spec: &PermissionSpec,
    ) -> Result<String, GatewayError> {
        let url = self.permissions_url(drive_id);
        let body = spec.to_request_body();

        let created: CreatedPermission = self
            .get_json("permissions.create", || {
                self.client
                    .post(url.clone())
                    .query(&[
                        ("supportsAllDrives", "true"),
                        ("useDomainAdminAccess", "true"),
                        ("sendNotificationEmail", "false"),
                        ("fields", "id"),
                    ])
                    .json(&body)
            })
            .await?;

        Ok(created.id)
    }

    async fn delete_permission(
        &self,
        drive_id: &str,
        permission_id: &str,
    ) -> Result<(), GatewayError> {
        let mut url = self.permissions_url(drive_id);
        if let Ok(mut path) = url.path_segments_mut() {
            path.push(permission_id);
        }

        self.execute("permissions.delete", || {
            self.client.delete(url.clone()).query(&[
                ("supportsAllDrives", "true"),
                ("useDomainAdminAccess", "true"),
            ])
        })
        .await?;

        Ok(())
    }

    async fn list_users(
        &self,
        customer: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<Page<User>, GatewayError> {
        let url = with_segments(&self.directory_base, &["users"]);
        let max = max_results.to_string();

        let list: UserList = self
            .get_json("users.list", || {
                let req = self
                    .client
                    .get(url.clone())
                    .query(&[("customer", customer), ("maxResults", max.as_str())]);
                with_page_token(req, page_token)
            })
            .await?;

        Ok(Page {
            items: list.users,
            next_page_token: list.next_page_token,
        })
    }
}

fn with_page_token(req: RequestBuilder, page_token: Option<&str>) -> RequestBuilder {
    match page_token {
        Some(token) => req.query(&[("pageToken", token)]),
        None => req,
    }
}
