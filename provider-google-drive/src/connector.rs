//! Google Drive API client implementation
//!
//! Implements the `DriveApi` trait on top of Drive API v3 and the Admin SDK
//! Directory API.

use async_trait::async_trait;
use bridge_traits::drive::{DriveApi, DriveItem, ListRequest, Page, Principal, RosterFilter, SharedDrive};
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_auth::TokenSource;
use core_runtime::config::RetryPolicy;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::GoogleDriveError;
use crate::query::FilesQuery;
use crate::types::{
    ApiErrorResponse, DrivesListResponse, FileIdResponse, FilesListResponse, UsersListResponse,
};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Admin SDK Directory API base URL
const DIRECTORY_API_BASE: &str = "https://admin.googleapis.com/admin/directory/v1";

/// Maximum shared drives per page (drives.list limit)
const MAX_DRIVES_PAGE_SIZE: u32 = 100;

/// Maximum users per page (users.list limit)
const MAX_USERS_PAGE_SIZE: u32 = 500;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Google Drive API client
///
/// Every call is made as a principal: the bearer token comes from the
/// [`TokenSource`], which mints impersonation tokens or hands back the single
/// delegated user's token.
///
/// # Features
///
/// - Directory roster listing filtered by admin role
/// - Shared drive catalog with optional domain-admin access
/// - Paginated `files.list` over personal drives, shared drives and folders
/// - Exponential backoff for rate limiting and server errors
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveClient;
///
/// let client = GoogleDriveClient::new(http_client, token_source);
/// let root = client.root_folder_id(&Principal::new("admin@example.com")).await?;
/// ```
pub struct GoogleDriveClient {
    http_client: Arc<dyn HttpClient>,
    tokens: Arc<dyn TokenSource>,
    retry: RetryPolicy,
    drive_base: String,
    directory_base: String,
}

impl GoogleDriveClient {
    pub fn new(http_client: Arc<dyn HttpClient>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http_client,
            tokens,
            retry: RetryPolicy::default(),
            drive_base: DRIVE_API_BASE.to_string(),
            directory_base: DIRECTORY_API_BASE.to_string(),
        }
    }

    /// Override the policy used for 429/5xx and transport failures
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Point the client at different API hosts
    pub fn with_base_urls(
        mut self,
        drive_base: impl Into<String>,
        directory_base: impl Into<String>,
    ) -> Self {
        self.drive_base = drive_base.into();
        self.directory_base = directory_base.into();
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        principal: &Principal,
        url: String,
        what: &str,
    ) -> Result<T> {
        let token = self
            .tokens
            .access_token(principal)
            .await
            .map_err(GoogleDriveError::from)?;
        let response = self.execute_with_retry(url, &token).await?;

        serde_json::from_slice(&response.body).map_err(|e| {
            GoogleDriveError::ParseError(format!("Failed to parse {}: {}", what, e)).into()
        })
    }

    /// Execute API request with retry logic
    ///
    /// 429 and 5xx responses, 403s whose reason is a rate limit, and transport
    /// failures are retried according to the retry policy; any other non-2xx
    /// status fails immediately. A rate-limited 403 that outlasts the policy
    /// is reported as 429 so it is never mistaken for a permission refusal.
    #[instrument(skip(self, token), fields(url = %url))]
    async fn execute_with_retry(&self, url: String, token: &str) -> Result<HttpResponse> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let request = HttpRequest::new(HttpMethod::Get, url.clone())
                .bearer_token(token)
                .header("Accept", "application/json")
                .timeout(REQUEST_TIMEOUT);

            match self.http_client.execute(request).await {
                Ok(response) if response.is_success() => {
                    debug!("API request succeeded: status={}", response.status);
                    return Ok(response);
                }
                Ok(response) if response.is_retryable() || is_rate_limited(&response) => {
                    let status = throttle_status(&response);
                    if attempt >= max_attempts {
                        warn!(
                            "API request failed after {} attempts: status={}",
                            attempt, response.status
                        );
                        return Err(GoogleDriveError::ApiError {
                            status_code: status,
                            message: response.text_lossy(),
                        }
                        .into());
                    }

                    let backoff = self.retry.delay_for(attempt);
                    warn!(
                        "API request failed (attempt {}/{}): status={}, retrying in {:?}",
                        attempt, max_attempts, response.status, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Ok(response) => {
                    debug!("API request rejected: status={}", response.status);
                    return Err(GoogleDriveError::ApiError {
                        status_code: response.status,
                        message: response.text_lossy(),
                    }
                    .into());
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if attempt >= max_attempts {
                        warn!("API request failed after {} attempts: {}", attempt, e);
                        return Err(e);
                    }

                    let backoff = self.retry.delay_for(attempt);
                    warn!(
                        "API request failed (attempt {}/{}): {}, retrying in {:?}",
                        attempt, max_attempts, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Drive signals per-user quota exhaustion with 403 instead of 429.
fn is_rate_limited(response: &HttpResponse) -> bool {
    response.status == 403
        && serde_json::from_slice::<ApiErrorResponse>(&response.body)
            .map(|body| body.is_rate_limited())
            .unwrap_or(false)
}

fn throttle_status(response: &HttpResponse) -> u16 {
    if response.status == 403 {
        429
    } else {
        response.status
    }
}

#[async_trait]
impl DriveApi for GoogleDriveClient {
    #[instrument(skip(self), fields(principal = %principal))]
    async fn root_folder_id(&self, principal: &Principal) -> Result<String> {
        let url = format!(
            "{}/files/root?fields=id&supportsAllDrives=true",
            self.drive_base
        );
        let root: FileIdResponse = self.get_json(principal, url, "root folder").await?;
        Ok(root.id)
    }

    #[instrument(skip(self, page_token), fields(acting = %acting))]
    async fn list_users(
        &self,
        acting: &Principal,
        domain: &str,
        filter: RosterFilter,
        page_token: Option<String>,
    ) -> Result<Page<String>> {
        let is_admin = match filter {
            RosterFilter::Admins => "true",
            RosterFilter::NonAdmins => "false",
        };
        let mut url = format!(
            "{}/users?domain={}&query={}&maxResults={}&fields={}",
            self.directory_base,
            urlencoding::encode(domain),
            urlencoding::encode(&format!("isAdmin={}", is_admin)),
            MAX_USERS_PAGE_SIZE,
            urlencoding::encode("nextPageToken,users(primaryEmail)")
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(&token)));
        }

        let response: UsersListResponse = self.get_json(acting, url, "users list").await?;
        let emails: Vec<String> = response
            .users
            .into_iter()
            .filter_map(|user| user.primary_email)
            .collect();

        debug!("Listed {} users ({:?})", emails.len(), filter);

        Ok(Page {
            items: emails,
            next_page_token: response.next_page_token,
        })
    }

    #[instrument(skip(self, page_token), fields(acting = %acting))]
    async fn list_shared_drives(
        &self,
        acting: &Principal,
        use_domain_admin_access: bool,
        page_token: Option<String>,
    ) -> Result<Page<SharedDrive>> {
        let mut url = format!(
            "{}/drives?pageSize={}&useDomainAdminAccess={}&fields={}",
            self.drive_base,
            MAX_DRIVES_PAGE_SIZE,
            use_domain_admin_access,
            urlencoding::encode("nextPageToken,drives(id,name)")
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(&token)));
        }

        let response: DrivesListResponse = self.get_json(acting, url, "drives list").await?;

        debug!("Listed {} shared drives", response.drives.len());

        Ok(Page {
            items: response.drives,
            next_page_token: response.next_page_token,
        })
    }

    #[instrument(skip(self, page_token), fields(principal = %principal, scope = ?request.scope))]
    async fn list_items(
        &self,
        principal: &Principal,
        request: &ListRequest,
        page_token: Option<String>,
    ) -> Result<Page<DriveItem>> {
        let url = FilesQuery::from_request(request).to_url(&self.drive_base, page_token.as_deref());

        let response: FilesListResponse = self.get_json(principal, url, "files list").await?;

        debug!("Listed {} items", response.files.len());

        Ok(Page {
            items: response.files,
            next_page_token: response.next_page_token,
        })
    }

    #[instrument(skip(self), fields(principal = %principal))]
    async fn list_any(&self, principal: &Principal) -> Result<()> {
        let url = format!(
            "{}/files?pageSize=1&fields={}&supportsAllDrives=true&includeItemsFromAllDrives=true",
            self.drive_base,
            urlencoding::encode("files(id)")
        );
        let _: FilesListResponse = self.get_json(principal, url, "files list").await?;

        info!("Drive API reachable");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::drive::{FieldSet, ListScope, TimeWindow};
    use bridge_traits::error::BridgeError;
    use bytes::Bytes;
    use core_auth::StaticTokenSource;
    use mockall::{mock, Sequence};
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    fn response(status: u16, body: &'static str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body),
        }
    }

    fn client(mock_http: MockHttpClient) -> GoogleDriveClient {
        GoogleDriveClient::new(
            Arc::new(mock_http),
            Arc::new(StaticTokenSource::shared("test_token")),
        )
        .with_retry_policy(RetryPolicy::fixed(3, Duration::ZERO))
        .with_base_urls("https://drive.test", "https://directory.test")
    }

    fn admin() -> Principal {
        Principal::new("admin@example.com")
    }

    #[tokio::test]
    async fn test_root_folder_id_success() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(
                req.headers.get("Authorization"),
                Some(&"Bearer test_token".to_string())
            );
            assert!(req.url.starts_with("https://drive.test/files/root"));
            Ok(response(200, r#"{"id": "root123"}"#))
        });

        let root = client(mock_http).root_folder_id(&admin()).await.unwrap();
        assert_eq!(root, "root123");
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(401, "Invalid Credentials")));

        let error = client(mock_http)
            .root_folder_id(&admin())
            .await
            .unwrap_err();

        assert!(error.is_unauthorized());
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();

        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(503, "Backend Error")));
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(200, r#"{"id": "root123"}"#)));

        let root = client(mock_http).root_folder_id(&admin()).await.unwrap();
        assert_eq!(root, "root123");
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_attempts() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(3)
            .returning(|_| Ok(response(429, "Rate Limit Exceeded")));

        let error = client(mock_http).list_any(&admin()).await.unwrap_err();
        assert_eq!(error.status(), Some(429));
    }

    #[tokio::test]
    async fn test_rate_limited_forbidden_is_retried() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();

        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(response(
                    403,
                    r#"{"error": {"code": 403, "message": "User Rate Limit Exceeded",
                        "errors": [{"domain": "usageLimits", "reason": "userRateLimitExceeded"}]}}"#,
                ))
            });
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(200, r#"{"files": [], "nextPageToken": null}"#)));

        let request = ListRequest {
            scope: ListScope::SharedDrive {
                drive_id: "D1".to_string(),
            },
            window: TimeWindow::unbounded(),
            fields: FieldSet::Full,
        };
        let page = client(mock_http)
            .list_items(&admin(), &request, None)
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_persistent_rate_limit_is_not_access_denied() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(3).returning(|_| {
            Ok(response(
                403,
                r#"{"error": {"errors": [{"reason": "rateLimitExceeded"}]}}"#,
            ))
        });

        let error = client(mock_http).list_any(&admin()).await.unwrap_err();
        assert_eq!(error.status(), Some(429));
        assert!(!error.is_access_denied());
    }

    #[tokio::test]
    async fn test_permission_forbidden_is_not_retried() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|_| {
            Ok(response(
                403,
                r#"{"error": {"errors": [{"reason": "insufficientFilePermissions"}]}}"#,
            ))
        });

        let error = client(mock_http).list_any(&admin()).await.unwrap_err();
        assert_eq!(error.status(), Some(403));
        assert!(error.is_access_denied());
    }

    #[tokio::test]
    async fn test_transport_failure_is_retried() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();

        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(BridgeError::Transport("connection reset".to_string())));
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(200, r#"{"id": "root123"}"#)));

        let root = client(mock_http).root_folder_id(&admin()).await.unwrap();
        assert_eq!(root, "root123");
    }

    #[tokio::test]
    async fn test_list_users_filters_by_role() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert!(req.url.contains("domain=example.com"));
            assert!(req.url.contains("query=isAdmin%3Dfalse"));
            assert!(req.url.contains("pageToken=next"));
            Ok(response(
                200,
                r#"{"users": [{"primaryEmail": "bob@example.com"}, {}], "nextPageToken": "more"}"#,
            ))
        });

        let page = client(mock_http)
            .list_users(
                &admin(),
                "example.com",
                RosterFilter::NonAdmins,
                Some("next".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(page.items, vec!["bob@example.com".to_string()]);
        assert_eq!(page.next_page_token, Some("more".to_string()));
    }

    #[tokio::test]
    async fn test_list_shared_drives_with_admin_access() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert!(req.url.contains("useDomainAdminAccess=true"));
            Ok(response(200, r#"{"drives": [{"id": "D1", "name": "Eng"}]}"#))
        });

        let page = client(mock_http)
            .list_shared_drives(&admin(), true, None)
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "D1");
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_list_items_folder_children() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert!(req.url.contains("corpora=allDrives"));
            assert!(req.url.contains("%27F1%27%20in%20parents"));
            Ok(response(
                200,
                r#"{
                    "files": [
                        {"id": "a", "name": "doc", "mimeType": "application/pdf"},
                        {"id": "sub", "name": "Sub", "mimeType": "application/vnd.google-apps.folder"}
                    ]
                }"#,
            ))
        });

        let request = ListRequest {
            scope: ListScope::FolderChildren {
                folder_id: "F1".to_string(),
            },
            window: TimeWindow::unbounded(),
            fields: FieldSet::Full,
        };
        let page = client(mock_http)
            .list_items(&admin(), &request, None)
            .await
            .unwrap();

        assert_eq!(page.items.len(), 2);
        assert!(page.items[1].is_folder());
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_request() {
        let mock_http = MockHttpClient::new();
        let client = GoogleDriveClient::new(
            Arc::new(mock_http),
            Arc::new(StaticTokenSource::default()),
        );

        let error = client.list_any(&admin()).await.unwrap_err();
        assert!(error.to_string().contains("Authentication failed"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, "not json")));

        let error = client(mock_http)
            .root_folder_id(&admin())
            .await
            .unwrap_err();
        assert!(error.to_string().contains("Parse error"));
    }
}
