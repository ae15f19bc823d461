//! Document Store Abstractions
//!
//! Contracts for the remote document store the crawler walks: the principal
//! roster, the shared drive catalog, paginated container listings and the
//! per-principal access probe.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// MIME type the store uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// An email-addressable identity that can be impersonated or is the sole
/// delegated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal(String);

impl Principal {
    pub fn new(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn email(&self) -> &str {
        &self.0
    }

    /// Domain part of the address (everything after the last `@`).
    pub fn domain(&self) -> &str {
        self.0.rsplit('@').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owner entry of a drive item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOwner {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

/// Sharing permission attached to a drive item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// `user`, `group`, `domain` or `anyone`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Raw item metadata as returned by the store.
///
/// The crawler only looks at `id`, `mime_type` and `owners`; everything else
/// is carried through to the conversion stage untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,

    #[serde(default)]
    pub name: String,

    pub mime_type: String,

    /// Modification time (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_id: Option<String>,

    #[serde(default)]
    pub parents: Vec<String>,

    #[serde(default)]
    pub owners: Vec<ItemOwner>,

    #[serde(default)]
    pub permissions: Vec<Permission>,

    #[serde(default)]
    pub permission_ids: Vec<String>,
}

impl DriveItem {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Email of the first listed owner, if the store reported one
    pub fn owner_email(&self) -> Option<&str> {
        self.owners
            .first()
            .and_then(|owner| owner.email_address.as_deref())
    }

    /// Parsed modification time
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.modified_time
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Shared drive catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedDrive {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One page of a paginated listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page_token: None,
        }
    }
}

/// Modification-time window applied to non-folder items.
///
/// Both bounds are inclusive; interpretation is up to the `DriveApi`
/// implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Which projection of item metadata a listing returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSet {
    /// Everything conversion needs
    Full,
    /// Only identifiers and permissions
    Slim,
}

/// What a listing call enumerates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    /// Every item the principal owns in their personal drive, folders included
    MyDrive,
    /// Every item of a shared drive, flat, folders included
    SharedDrive { drive_id: String },
    /// Immediate children of a folder, sub-folders included
    FolderChildren { folder_id: String },
    /// One call covering the coarse delegated-access options together
    Combined {
        include_my_drives: bool,
        include_files_shared_with_me: bool,
        include_shared_drives: bool,
    },
}

impl ListScope {
    /// Identifier of the container this listing enumerates, if it targets one
    pub fn container_id(&self) -> Option<&str> {
        match self {
            ListScope::SharedDrive { drive_id } => Some(drive_id),
            ListScope::FolderChildren { folder_id } => Some(folder_id),
            ListScope::MyDrive | ListScope::Combined { .. } => None,
        }
    }
}

/// A single listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub scope: ListScope,
    pub window: TimeWindow,
    pub fields: FieldSet,
}

/// Admin-role filter for roster listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterFilter {
    Admins,
    NonAdmins,
}

/// Remote document store API
///
/// All calls are made "as" a principal. Implementations own transport-level
/// retry for transient failures; callers only see the final outcome.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::drive::{DriveApi, ListRequest, ListScope, FieldSet, TimeWindow};
///
/// async fn first_page(api: &dyn DriveApi, admin: &Principal) -> Result<usize> {
///     let request = ListRequest {
///         scope: ListScope::MyDrive,
///         window: TimeWindow::unbounded(),
///         fields: FieldSet::Slim,
///     };
///     let page = api.list_items(admin, &request, None).await?;
///     Ok(page.items.len())
/// }
/// ```
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Minimal call used to detect whether the principal can use the API.
    ///
    /// Returns the id of the principal's personal drive root.
    async fn root_folder_id(&self, principal: &Principal) -> Result<String>;

    /// List member addresses of `domain`
    async fn list_users(
        &self,
        acting: &Principal,
        domain: &str,
        filter: RosterFilter,
        page_token: Option<String>,
    ) -> Result<Page<String>>;

    /// List shared drives visible to `acting`
    async fn list_shared_drives(
        &self,
        acting: &Principal,
        use_domain_admin_access: bool,
        page_token: Option<String>,
    ) -> Result<Page<SharedDrive>>;

    /// List items for a scope
    async fn list_items(
        &self,
        principal: &Principal,
        request: &ListRequest,
        page_token: Option<String>,
    ) -> Result<Page<DriveItem>>;

    /// Cheapest authenticated listing, used to validate settings
    async fn list_any(&self, principal: &Principal) -> Result<()>;
}
