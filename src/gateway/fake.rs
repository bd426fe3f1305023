//! In-memory gateway for tests.
//!
//! Records every call, paginates with numeric offsets as page tokens, and can be told to
//! fail specific operations or to trip a cancellation token after the n-th call of a kind.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{DirectoryGateway, Page};
use crate::errors::GatewayError;
use crate::models::{Permission, PermissionSpec, PermissionType, Role, SharedDrive, User};

#[derive(Default)]
struct FakeState {
    drives: Vec<SharedDrive>,
    permissions: HashMap<String, Vec<Permission>>,
    users: Vec<User>,
    failing_deletes: HashSet<(String, String)>,
    failing_creates: HashSet<String>,
    failing_listings: HashSet<String>,
    calls: Vec<String>,
    cancel_after: Option<(String, usize, CancellationToken)>,
    next_id: usize,
}

pub struct FakeGateway {
    page_size: usize,
    state: Mutex<FakeState>,
}

pub fn user_permission(id: &str, email: &str, role: Role) -> Permission {
    Permission {
        id: id.to_string(),
        email_address: Some(email.to_string()),
        domain: None,
        kind: PermissionType::User,
        role,
    }
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::with_page_size(100)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn with_drive(self, id: &str, name: &str, permissions: Vec<Permission>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.drives.push(SharedDrive::new(id, name));
            state.permissions.insert(id.to_string(), permissions);
        }
        self
    }

    pub fn with_user(self, user: User) -> Self {
        self.state.lock().unwrap().users.push(user);
        self
    }

    pub fn fail_delete(self, drive_id: &str, permission_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_deletes
            .insert((drive_id.to_string(), permission_id.to_string()));
        self
    }

    /// Fail every create whose member equals `member`.
    pub fn fail_create(self, member: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_creates
            .insert(member.to_string());
        self
    }

    pub fn fail_listing(self, drive_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_listings
            .insert(drive_id.to_string());
        self
    }

    /// Cancel `token` while serving the `n`-th call whose name starts with `prefix`.
    pub fn cancel_after(self, prefix: &str, n: usize, token: CancellationToken) -> Self {
        self.state.lock().unwrap().cancel_after = Some((prefix.to_string(), n, token));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn permissions(&self, drive_id: &str) -> Vec<Permission> {
        self.state
            .lock()
            .unwrap()
            .permissions
            .get(drive_id)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, state: &mut FakeState, call: String) {
        state.calls.push(call);
        if let Some((prefix, n, token)) = &state.cancel_after {
            let seen = state.calls.iter().filter(|c| c.starts_with(prefix.as_str())).count();
            if seen == *n {
                token.cancel();
            }
        }
    }

    fn page<T: Clone>(&self, items: &[T], page_token: Option<&str>) -> Page<T> {
        let start: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (start + self.page_size).min(items.len());
        Page {
            items: items[start.min(end)..end].to_vec(),
            next_page_token: (end < items.len()).then(|| end.to_string()),
        }
    }
}

fn not_found(what: &str) -> GatewayError {
    GatewayError::from_status(404, Some("notFound"), format!("{} not found", what))
}

#[async_trait]
impl DirectoryGateway for FakeGateway {
    async fn list_drives(
        &self,
        _use_domain_admin_access: bool,
        _page_size: u32,
        page_token: Option<&str>,
    ) -> Result<Page<SharedDrive>, GatewayError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "list_drives".to_string());
        Ok(self.page(&state.drives, page_token))
    }

    async fn list_permissions(
        &self,
        drive_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<Permission>, GatewayError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("list_permissions:{}", drive_id));
        if state.failing_listings.contains(drive_id) {
            return Err(GatewayError::from_status(
                403,
                Some("insufficientPermissions"),
                "listing denied".to_string(),
            ));
        }
        let permissions = state
            .permissions
            .get(drive_id)
            .ok_or_else(|| not_found(drive_id))?;
        Ok(self.page(permissions, page_token))
    }

    async fn create_permission(
        &self,
        drive_id: &str,
        spec: &PermissionSpec,
    ) -> Result<String, GatewayError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("create:{}:{}", drive_id, spec));
        if state.failing_creates.contains(spec.grantee.member()) {
            return Err(GatewayError::from_status(
                400,
                Some("invalid"),
                "invalid sharing request".to_string(),
            ));
        }
        state.next_id += 1;
        let id = format!("new{}", state.next_id);
        let body = spec.to_request_body();
        let permission = Permission {
            id: id.clone(),
            email_address: body.email_address,
            domain: body.domain,
            kind: body.kind,
            role: body.role,
        };
        state
            .permissions
            .get_mut(drive_id)
            .ok_or_else(|| not_found(drive_id))?
            .push(permission);
        Ok(id)
    }

    async fn delete_permission(
        &self,
        drive_id: &str,
        permission_id: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("delete:{}:{}", drive_id, permission_id));
        if state
            .failing_deletes
            .contains(&(drive_id.to_string(), permission_id.to_string()))
        {
            return Err(GatewayError::from_status(
                403,
                Some("cannotDeletePermission"),
                "cannot delete".to_string(),
            ));
        }
        let permissions = state
            .permissions
            .get_mut(drive_id)
            .ok_or_else(|| not_found(drive_id))?;
        let before = permissions.len();
        permissions.retain(|p| p.id != permission_id);
        if permissions.len() == before {
            return Err(not_found(permission_id));
        }
        Ok(())
    }

    async fn list_users(
        &self,
        _customer: &str,
        _max_results: u32,
        page_token: Option<&str>,
    ) -> Result<Page<User>, GatewayError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "list_users".to_string());
        Ok(self.page(&state.users, page_token))
    }
}
