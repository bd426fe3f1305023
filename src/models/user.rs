//! Domain user model matching the Admin Directory `users` resource.

use serde::{Deserialize, Serialize};

/// Name block of a directory user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// A user of the Workspace domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub primary_email: String,
    #[serde(default)]
    pub name: Option<UserName>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub suspended: bool,
}

impl User {
    pub fn full_name(&self) -> Option<&str> {
        self.name.as_ref().and_then(|n| n.full_name.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_optional_fields() {
        let user: User =
            serde_json::from_str(r#"{"id":"u1","primaryEmail":"a@x.com"}"#).unwrap();
        assert!(!user.is_admin);
        assert!(!user.suspended);
        assert_eq!(user.full_name(), None);
    }
}
