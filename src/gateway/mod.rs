//! Remote directory gateway.
//!
//! [`DirectoryGateway`] is the capability the rest of the crate consumes: one call per
//! REST request, one page per list call. The collectors in this module walk every page
//! sequentially and stop early on user cancellation, handing back what was gathered.

mod google;
mod retry;

#[cfg(test)]
pub mod fake;

pub use google::GoogleGateway;
pub use retry::RetryPolicy;

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::GatewayError;
use crate::models::{Permission, PermissionSpec, SharedDrive, User};
use crate::progress::Progress;

/// One page of a paginated list response.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

/// Drive v3 and Admin Directory v1 operations used by this tool.
#[async_trait]
pub trait DirectoryGateway: Send + Sync {
    async fn list_drives(
        &self,
        use_domain_admin_access: bool,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<Page<SharedDrive>, GatewayError>;

    async fn list_permissions(
        &self,
        drive_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<Permission>, GatewayError>;

    /// Returns the id of the created permission.
    async fn create_permission(
        &self,
        drive_id: &str,
        spec: &PermissionSpec,
    ) -> Result<String, GatewayError>;

    async fn delete_permission(
        &self,
        drive_id: &str,
        permission_id: &str,
    ) -> Result<(), GatewayError>;

    async fn list_users(
        &self,
        customer: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<Page<User>, GatewayError>;
}

/// Everything a gateway-calling operation needs, passed explicitly.
#[derive(Clone, Copy)]
pub struct FetchContext<'a> {
    pub gateway: &'a dyn DirectoryGateway,
    pub progress: &'a dyn Progress,
    pub cancel: &'a CancellationToken,
}

impl<'a> FetchContext<'a> {
    pub fn new(
        gateway: &'a dyn DirectoryGateway,
        progress: &'a dyn Progress,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            gateway,
            progress,
            cancel,
        }
    }
}

/// Result of a multi-request fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    Complete(T),
    /// Cancelled by the user; holds what arrived before the cancellation.
    Interrupted(T),
}

impl<T> Fetched<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, Fetched::Complete(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Fetched::Complete(value) | Fetched::Interrupted(value) => value,
        }
    }
}

/// Walk every page, racing each request against the cancellation token.
async fn collect_pages<T, F, Fut>(
    cancel: &CancellationToken,
    mut next_page: F,
) -> Result<Fetched<Vec<T>>, GatewayError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, GatewayError>>,
{
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(Fetched::Interrupted(items)),
            page = next_page(page_token.take()) => page?,
        };
        items.extend(page.items);

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => return Ok(Fetched::Complete(items)),
        }
    }
}

/// Every shared drive in the domain, using domain-admin access.
pub async fn fetch_all_drives(
    gateway: &dyn DirectoryGateway,
    page_size: u32,
    cancel: &CancellationToken,
) -> Result<Fetched<Vec<SharedDrive>>, GatewayError> {
    collect_pages(cancel, move |token| async move {
        gateway.list_drives(true, page_size, token.as_deref()).await
    })
    .await
}

/// The live permission list of one drive.
pub async fn fetch_drive_permissions(
    gateway: &dyn DirectoryGateway,
    drive_id: &str,
    cancel: &CancellationToken,
) -> Result<Fetched<Vec<Permission>>, GatewayError> {
    collect_pages(cancel, move |token| async move {
        gateway.list_permissions(drive_id, token.as_deref()).await
    })
    .await
}

/// Every user of the customer's domain.
pub async fn fetch_all_users(
    gateway: &dyn DirectoryGateway,
    customer: &str,
    max_results: u32,
    cancel: &CancellationToken,
) -> Result<Fetched<Vec<User>>, GatewayError> {
    collect_pages(cancel, move |token| async move {
        gateway
            .list_users(customer, max_results, token.as_deref())
            .await
    })
    .await
}
