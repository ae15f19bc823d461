//! Google API response types
//!
//! Data structures for deserializing Drive API v3 and Admin SDK Directory
//! API responses. File resources deserialize straight into
//! [`DriveItem`](bridge_traits::drive::DriveItem).

use bridge_traits::drive::{DriveItem, SharedDrive};
use serde::Deserialize;

/// Drive API files.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/files/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    #[serde(default)]
    pub files: Vec<DriveItem>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Drive API drives.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/drives/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrivesListResponse {
    #[serde(default)]
    pub drives: Vec<SharedDrive>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Directory API users.list entry
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    #[serde(default)]
    pub primary_email: Option<String>,
}

/// Directory API users.list response
///
/// See: https://developers.google.com/admin-sdk/directory/reference/rest/v1/users/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersListResponse {
    #[serde(default)]
    pub users: Vec<DirectoryUser>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Error envelope returned with non-2xx responses
///
/// See: https://developers.google.com/drive/api/guides/handle-errors
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub error: ApiErrorBody,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub reason: Option<String>,
}

impl ApiErrorResponse {
    /// `true` when any listed reason is a quota or rate limit
    pub fn is_rate_limited(&self) -> bool {
        self.error.errors.iter().any(|detail| {
            matches!(
                detail.reason.as_deref(),
                Some("userRateLimitExceeded" | "rateLimitExceeded")
            )
        })
    }
}

/// Drive API files.get response restricted to `fields=id`
#[derive(Debug, Deserialize)]
pub struct FileIdResponse {
    pub id: String,
}
