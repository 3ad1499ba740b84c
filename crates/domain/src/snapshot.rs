//! Opaque per-backend state captures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{SessionId, SnapshotId};

/// A saved target-state capture.
///
/// Only meaningful while the owning session exists; validity and on-disk
/// format are the owning backend's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: SnapshotId,
    pub session_id: SessionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// The id is minted by the caller so the storage path can embed it
    /// before the record exists.
    pub fn new(
        id: SnapshotId,
        session_id: SessionId,
        name: impl Into<String>,
        description: impl Into<String>,
        path: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            session_id,
            name: name.into(),
            description: description.into(),
            path: path.into(),
            created_at: now,
        }
    }
}
