//! Shared drive models matching the Drive v3 `drives` resource.

use serde::{Deserialize, Serialize};

/// A shared drive as returned by `drives.list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedDrive {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl SharedDrive {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A drive targeted by a bulk operation.
///
/// Drives picked by explicit id carry no name; drives picked from the cache do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveRef {
    pub id: String,
    pub name: Option<String>,
}

impl DriveRef {
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    /// Name when known, otherwise the id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

impl From<&SharedDrive> for DriveRef {
    fn from(drive: &SharedDrive) -> Self {
        Self {
            id: drive.id.clone(),
            name: Some(drive.name.clone()),
        }
    }
}
