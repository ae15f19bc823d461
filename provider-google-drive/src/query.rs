//! files.list parameter building
//!
//! Translates a [`ListRequest`] into the `corpora`/`q`/`fields` parameters of
//! a Drive API v3 `files.list` call.

use bridge_traits::drive::{FieldSet, ListRequest, ListScope, TimeWindow, FOLDER_MIME_TYPE};
use chrono::{DateTime, SecondsFormat, Utc};

/// Maximum results per page (Google Drive API limit)
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Fields requested when items are converted into documents
pub const FULL_FILE_FIELDS: &str = "nextPageToken,files(mimeType,id,name,permissions,\
modifiedTime,webViewLink,driveId,parents,owners(emailAddress))";

/// Fields requested for permission-sync projections
pub const SLIM_FILE_FIELDS: &str = "nextPageToken,files(mimeType,id,name,\
permissions(id,emailAddress,type,domain,role),permissionIds,webViewLink,driveId,\
owners(emailAddress))";

/// Query parameters of one files.list call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesQuery {
    pub corpora: &'static str,
    pub drive_id: Option<String>,
    pub q: String,
    pub fields: &'static str,
}

impl FilesQuery {
    pub fn from_request(request: &ListRequest) -> Self {
        let fields = match request.fields {
            FieldSet::Full => FULL_FILE_FIELDS,
            FieldSet::Slim => SLIM_FILE_FIELDS,
        };

        match &request.scope {
            ListScope::MyDrive => Self {
                corpora: "user",
                drive_id: None,
                q: format!(
                    "'me' in owners and trashed = false{}",
                    folder_or_window(&request.window)
                ),
                fields,
            },
            ListScope::SharedDrive { drive_id } => Self {
                corpora: "drive",
                drive_id: Some(drive_id.clone()),
                q: format!("trashed = false{}", folder_or_window(&request.window)),
                fields,
            },
            ListScope::FolderChildren { folder_id } => Self {
                corpora: "allDrives",
                drive_id: None,
                q: format!(
                    "'{}' in parents and trashed = false{}",
                    escape(folder_id),
                    folder_or_window(&request.window)
                ),
                fields,
            },
            ListScope::Combined {
                include_my_drives,
                include_files_shared_with_me,
                include_shared_drives,
            } => {
                let everything =
                    *include_my_drives && *include_files_shared_with_me && *include_shared_drives;
                let mut q = format!("mimeType != '{}' and trashed = false", FOLDER_MIME_TYPE);
                q.push_str(&window_clause(&request.window));
                if !everything {
                    if *include_my_drives && !*include_files_shared_with_me {
                        q.push_str(" and 'me' in owners");
                    }
                    if !*include_my_drives && *include_files_shared_with_me {
                        q.push_str(" and not 'me' in owners");
                    }
                }
                Self {
                    corpora: if everything { "allDrives" } else { "user" },
                    drive_id: None,
                    q,
                    fields,
                }
            }
        }
    }

    /// Full request URL for the given API base and page token
    pub fn to_url(&self, base: &str, page_token: Option<&str>) -> String {
        let mut url = format!(
            "{}/files?corpora={}&q={}&fields={}&pageSize={}\
             &supportsAllDrives=true&includeItemsFromAllDrives=true",
            base,
            self.corpora,
            urlencoding::encode(&self.q),
            urlencoding::encode(self.fields),
            MAX_PAGE_SIZE
        );
        if let Some(drive_id) = &self.drive_id {
            url.push_str(&format!("&driveId={}", urlencoding::encode(drive_id)));
        }
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }
        url
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Modification-time clauses, empty for an unbounded window
fn window_clause(window: &TimeWindow) -> String {
    let mut clause = String::new();
    if let Some(start) = &window.start {
        clause.push_str(&format!(" and modifiedTime >= '{}'", format_time(start)));
    }
    if let Some(end) = &window.end {
        clause.push_str(&format!(" and modifiedTime <= '{}'", format_time(end)));
    }
    clause
}

/// Window restriction that never filters out folders, so traversal can still
/// descend into folders that were not modified themselves.
fn folder_or_window(window: &TimeWindow) -> String {
    if window.is_unbounded() {
        return String::new();
    }
    let bounds = window_clause(window);
    format!(
        " and (mimeType = '{}' or ({}))",
        FOLDER_MIME_TYPE,
        bounds.trim_start_matches(" and ")
    )
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
