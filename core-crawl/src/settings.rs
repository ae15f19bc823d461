//! # Connector Settings
//!
//! User-facing connector parameters and their normalization into a
//! [`RetrievalRequest`].
//!
//! ## Normalization rules
//!
//! - Comma-separated strings are split, trimmed and empty entries dropped.
//! - Sharing URLs are reduced to the ID they point at (last path segment).
//! - Asking for specific drives, folders or personal drives turns the broad
//!   `include_*` flags off, so a targeted request never becomes a full-domain
//!   crawl.
//! - Settings that select nothing at all are rejected before any network
//!   activity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

use crate::error::{CrawlError, Result};

/// Connector parameters as stored by the host framework.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConnectorSettings {
    /// Every shared drive in the domain
    pub include_shared_drives: bool,

    /// Every member's personal drive
    pub include_my_drives: bool,

    /// Files shared directly with the authenticated user
    pub include_files_shared_with_me: bool,

    /// Comma-separated shared drive URLs or IDs
    pub shared_drive_urls: Option<String>,

    /// Comma-separated addresses whose personal drives are crawled
    pub my_drive_emails: Option<String>,

    /// Comma-separated folder URLs or IDs
    pub shared_folder_urls: Option<String>,

    /// Documents per emitted batch
    pub batch_size: Option<usize>,

    /// Deprecated: use `shared_folder_urls`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_paths: Option<Vec<String>>,

    /// Deprecated: use `include_files_shared_with_me`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_shared: Option<bool>,

    /// Deprecated, ignored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_shortcuts: Option<bool>,

    /// Deprecated, ignored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_org_public: Option<bool>,

    /// Deprecated, ignored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_on_failure: Option<bool>,
}

/// The resolved, validated scope of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalRequest {
    /// Shared drives to retrieve in full (may turn out to be folders)
    pub drive_ids: BTreeSet<String>,

    /// Folders to retrieve recursively
    pub folder_ids: BTreeSet<String>,

    /// Principals whose personal drive is retrieved
    pub my_drive_emails: BTreeSet<String>,

    pub include_my_drives: bool,
    pub include_files_shared_with_me: bool,
    pub include_shared_drives: bool,
}

impl RetrievalRequest {
    /// `true` when explicit drives or folders were requested
    pub fn has_explicit_containers(&self) -> bool {
        !self.drive_ids.is_empty() || !self.folder_ids.is_empty()
    }

    /// `true` when all three broad flags are set
    pub fn includes_everything(&self) -> bool {
        self.include_my_drives && self.include_files_shared_with_me && self.include_shared_drives
    }

    /// Whether the personal drive of `email` is in scope
    pub fn wants_my_drive(&self, email: &str) -> bool {
        self.include_my_drives || self.my_drive_emails.contains(email)
    }
}

impl DriveConnectorSettings {
    /// Normalize the parameters into a [`RetrievalRequest`].
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Config`] when nothing is selected for indexing.
    pub fn resolve(&self) -> Result<RetrievalRequest> {
        self.warn_deprecated();

        let drive_ids = extract_ids_from_urls(self.shared_drive_urls.as_deref());
        let folder_ids = extract_ids_from_urls(self.shared_folder_urls.as_deref());
        let my_drive_emails: BTreeSet<String> =
            split_comma_list(self.my_drive_emails.as_deref()).into_iter().collect();

        let specific_requests =
            !drive_ids.is_empty() || !folder_ids.is_empty() || !my_drive_emails.is_empty();

        if !specific_requests
            && !self.include_shared_drives
            && !self.include_my_drives
            && !self.include_files_shared_with_me
        {
            return Err(CrawlError::Config(
                "Nothing to index. Please specify at least one of the following: \
                 include_shared_drives, include_my_drives, include_files_shared_with_me, \
                 shared_folder_urls, or my_drive_emails"
                    .to_string(),
            ));
        }

        Ok(RetrievalRequest {
            drive_ids,
            folder_ids,
            my_drive_emails,
            include_my_drives: !specific_requests && self.include_my_drives,
            include_files_shared_with_me: !specific_requests && self.include_files_shared_with_me,
            include_shared_drives: !specific_requests && self.include_shared_drives,
        })
    }

    fn warn_deprecated(&self) {
        if self.folder_paths.is_some() {
            warn!("The 'folder_paths' parameter is deprecated. Use 'shared_folder_urls' instead.");
        }
        if self.include_shared.is_some() {
            warn!(
                "The 'include_shared' parameter is deprecated. Use 'include_files_shared_with_me' instead."
            );
        }
        if self.follow_shortcuts.is_some() {
            warn!("The 'follow_shortcuts' parameter is deprecated.");
        }
        if self.only_org_public.is_some() {
            warn!("The 'only_org_public' parameter is deprecated.");
        }
        if self.continue_on_failure.is_some() {
            warn!("The 'continue_on_failure' parameter is deprecated.");
        }
    }
}

/// Split a comma-separated value, trimming entries and dropping empty ones.
pub fn split_comma_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Container ID a sharing URL points at.
///
/// Bare IDs are returned unchanged.
pub fn extract_id_from_url(url: &str) -> String {
    let without_query = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(without_query)
        .to_string()
}

fn extract_ids_from_urls(raw: Option<&str>) -> BTreeSet<String> {
    split_comma_list(raw)
        .iter()
        .map(|url| extract_id_from_url(url))
        .filter(|id| !id.is_empty())
        .collect()
}
