//! Indexing Output Abstractions
//!
//! Records handed to the host ingestion framework and the collaborators that
//! produce them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::drive::{DriveItem, Permission, Principal};
use crate::error::Result;

/// A section of extracted document content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSection {
    pub link: Option<String>,
    pub text: String,
}

/// Fully converted document ready for indexing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub semantic_identifier: String,
    pub sections: Vec<DocumentSection>,
    pub doc_updated_at: Option<DateTime<Utc>>,
    pub primary_owners: Vec<String>,
    pub metadata: HashMap<String, String>,
}

/// Access information needed to reconcile permissions without re-indexing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSyncData {
    pub doc_id: String,
    pub drive_id: Option<String>,
    pub permissions: Vec<Permission>,
    pub permission_ids: Vec<String>,
    pub owner_emails: Vec<String>,
}

/// Lightweight document reference used for incremental reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlimDocument {
    pub id: String,
    pub perm_sync_data: PermissionSyncData,
}

/// Converts a raw item into an indexable document.
///
/// Conversion may issue further network calls as `owner`. `Ok(None)` means the
/// item is not indexable (unsupported type, empty body) and is skipped
/// silently; `Err` is logged by the caller and the item is dropped.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, item: &DriveItem, owner: &Principal) -> Result<Option<Document>>;
}

/// Host-side progress and stop signal for long crawls
pub trait IndexingHeartbeat: Send + Sync {
    /// Checked between emitted batches
    fn should_stop(&self) -> bool;

    /// Reported once per emitted batch
    fn progress(&self, tag: &str, amount: usize);
}
