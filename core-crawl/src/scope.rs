//! # Scope Resolution
//!
//! Turns the requested drive/folder IDs into the sets a run actually
//! traverses, using the shared drive catalog visible to the acting identity.
//!
//! Sharing URLs do not say whether they point at a shared drive or a folder,
//! and both live in one ID namespace. A requested "drive" that is missing from
//! the catalog is therefore retried as a folder instead of being rejected.

use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::settings::RetrievalRequest;

/// Validated containers for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedScope {
    pub drive_ids: BTreeSet<String>,
    pub folder_ids: BTreeSet<String>,
}

impl ResolvedScope {
    pub fn is_empty(&self) -> bool {
        self.drive_ids.is_empty() && self.folder_ids.is_empty()
    }

    /// Every drive and folder ID in scope
    pub fn all_ids(&self) -> impl Iterator<Item = &String> {
        self.drive_ids.iter().chain(self.folder_ids.iter())
    }
}

pub struct ScopeResolver;

impl ScopeResolver {
    /// Reclassify requested IDs against the catalog.
    ///
    /// Requested drives absent from `catalog` move to the folder set. A
    /// requested folder that is in the catalog is a shared drive root and
    /// moves to the drive set.
    pub fn resolve(
        requested_drives: &BTreeSet<String>,
        requested_folders: &BTreeSet<String>,
        catalog: &BTreeSet<String>,
    ) -> ResolvedScope {
        let (drive_ids, unknown_drives): (BTreeSet<String>, BTreeSet<String>) = requested_drives
            .iter()
            .cloned()
            .partition(|id| catalog.contains(id));

        if !unknown_drives.is_empty() {
            warn!(
                "Some shared drive IDs were not found, checking for folder access instead. IDs: {:?}",
                unknown_drives
            );
        }

        let (drive_roots, mut folder_ids): (BTreeSet<String>, BTreeSet<String>) = requested_folders
            .iter()
            .cloned()
            .partition(|id| catalog.contains(id));

        if !drive_roots.is_empty() {
            info!(
                "Requested folders are shared drive roots, retrieving them as drives. IDs: {:?}",
                drive_roots
            );
        }

        folder_ids.extend(unknown_drives);
        let mut drive_ids = drive_ids;
        drive_ids.extend(drive_roots);

        ResolvedScope {
            drive_ids,
            folder_ids,
        }
    }

    /// Scope of a run: explicit containers win, otherwise the whole catalog
    /// when all shared drives were requested.
    pub fn for_request(request: &RetrievalRequest, catalog: &BTreeSet<String>) -> ResolvedScope {
        if request.has_explicit_containers() {
            Self::resolve(&request.drive_ids, &request.folder_ids, catalog)
        } else if request.include_shared_drives {
            ResolvedScope {
                drive_ids: catalog.clone(),
                folder_ids: BTreeSet::new(),
            }
        } else {
            ResolvedScope::default()
        }
    }
}
