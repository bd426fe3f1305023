//! Permission models matching the Drive v3 `permissions` resource.
//!
//! [`Permission`] is what the API reports; [`PermissionSpec`] is what this tool is
//! allowed to create. The split keeps `owner` and `anyone` parseable from responses
//! while never letting them into a create request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Principal kind of a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionType {
    User,
    Group,
    Domain,
    Anyone,
}

impl PermissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionType::User => "user",
            PermissionType::Group => "group",
            PermissionType::Domain => "domain",
            PermissionType::Anyone => "anyone",
        }
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drive role. `Owner` only appears in API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Owner,
    Organizer,
    FileOrganizer,
    Writer,
    Commenter,
    Reader,
}

/// Roles accepted as input, in the order they are offered to the user.
pub const ASSIGNABLE_ROLES: [Role; 5] = [
    Role::Organizer,
    Role::FileOrganizer,
    Role::Writer,
    Role::Commenter,
    Role::Reader,
];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Organizer => "organizer",
            Role::FileOrganizer => "fileOrganizer",
            Role::Writer => "writer",
            Role::Commenter => "commenter",
            Role::Reader => "reader",
        }
    }

    pub fn is_assignable(&self) -> bool {
        !matches!(self, Role::Owner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses only the five assignable roles. The match is exact, like the API.
impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ASSIGNABLE_ROLES
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| {
                let allowed: Vec<&str> = ASSIGNABLE_ROLES.iter().map(Role::as_str).collect();
                AppError::Validation(format!(
                    "invalid role '{}', expected one of: {}",
                    s,
                    allowed.join(", ")
                ))
            })
    }
}

/// A permission on a shared drive as reported by `permissions.list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(rename = "type")]
    pub kind: PermissionType,
    pub role: Role,
}

impl Permission {
    /// Email for user/group permissions, domain for domain permissions.
    pub fn principal(&self) -> Option<&str> {
        self.email_address.as_deref().or(self.domain.as_deref())
    }
}

/// Who a new permission is granted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grantee {
    User(String),
    Group(String),
    Domain(String),
}

impl Grantee {
    /// Build a grantee from a type string (`user`, `group`, `domain`) and its member.
    pub fn parse(kind: &str, member: &str) -> Result<Self, AppError> {
        let member = member.trim();
        if member.is_empty() {
            return Err(AppError::Validation(format!(
                "a {} permission needs a member",
                kind
            )));
        }
        match kind {
            "user" => Ok(Grantee::User(member.to_string())),
            "group" => Ok(Grantee::Group(member.to_string())),
            "domain" => Ok(Grantee::Domain(member.to_string())),
            other => Err(AppError::Validation(format!(
                "invalid permission type '{}', expected user, group or domain",
                other
            ))),
        }
    }

    pub fn kind(&self) -> PermissionType {
        match self {
            Grantee::User(_) => PermissionType::User,
            Grantee::Group(_) => PermissionType::Group,
            Grantee::Domain(_) => PermissionType::Domain,
        }
    }

    pub fn member(&self) -> &str {
        match self {
            Grantee::User(m) | Grantee::Group(m) | Grantee::Domain(m) => m,
        }
    }
}

/// A validated permission to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSpec {
    pub role: Role,
    pub grantee: Grantee,
}

impl PermissionSpec {
    pub fn new(grantee: Grantee, role: Role) -> Result<Self, AppError> {
        if !role.is_assignable() {
            return Err(AppError::Validation(format!(
                "role '{}' cannot be granted",
                role
            )));
        }
        Ok(Self { role, grantee })
    }

    /// Parse `TYPE:MEMBER:ROLE`, e.g. `group:staff@example.com:writer`.
    pub fn parse_grant(s: &str) -> Result<Self, AppError> {
        let mut parts = s.splitn(3, ':');
        let (Some(kind), Some(member), Some(role)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(AppError::Validation(format!(
                "invalid grant '{}', expected TYPE:MEMBER:ROLE",
                s
            )));
        };
        Self::new(Grantee::parse(kind, member)?, role.parse()?)
    }

    /// Request body for `permissions.create`.
    pub fn to_request_body(&self) -> CreatePermissionRequest {
        let (email_address, domain) = match &self.grantee {
            Grantee::User(email) | Grantee::Group(email) => (Some(email.clone()), None),
            Grantee::Domain(domain) => (None, Some(domain.clone())),
        };
        CreatePermissionRequest {
            kind: self.grantee.kind(),
            role: self.role,
            email_address,
            domain,
        }
    }
}

impl fmt::Display for PermissionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.grantee.kind(),
            self.grantee.member(),
            self.role
        )
    }
}

/// Request body for creating a permission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermissionRequest {
    #[serde(rename = "type")]
    pub kind: PermissionType,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}
