//! Permissions-by-drive snapshot model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Permission;
use crate::errors::AppError;

/// One entry of the permissions snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrivePermissions {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// Permissions of every cached drive, keyed by drive id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionsSnapshot(pub BTreeMap<String, DrivePermissions>);

impl PermissionsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, drive_id: String, entry: DrivePermissions) {
        self.0.insert(drive_id, entry);
    }

    pub fn get(&self, drive_id: &str) -> Option<&DrivePermissions> {
        self.0.get(drive_id)
    }

    /// Permissions of a drive that must be in the snapshot.
    ///
    /// A missing entry means the snapshot was written by an interrupted refresh.
    pub fn permissions_of(&self, drive_id: &str) -> Result<&[Permission], AppError> {
        self.0
            .get(drive_id)
            .map(|entry| entry.permissions.as_slice())
            .ok_or_else(|| AppError::StaleSnapshot {
                drive_id: drive_id.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
