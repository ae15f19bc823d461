use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

/// Error text the token endpoint returns when the OAuth client was not
/// granted the scopes the crawler asks for.
pub const MISSING_SCOPES_SIGNATURE: &str = "client not authorized for any of the scopes requested";

/// What an administrator has to do to fix a missing-scope failure.
pub const SCOPE_INSTRUCTIONS: &str = "The Google Drive credentials are missing required \
OAuth scopes. Grant https://www.googleapis.com/auth/drive.readonly, \
https://www.googleapis.com/auth/drive.metadata.readonly and \
https://www.googleapis.com/auth/admin.directory.user.readonly to the client \
(for service accounts, under domain-wide delegation in the Admin console), \
then reconnect.";

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing OAuth scopes: {0}")]
    MissingScopes(String),

    #[error("Credential expired: {0}")]
    CredentialExpired(String),

    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("API error: {0}")]
    Api(BridgeError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Crawl cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CrawlError>;

/// `true` when an error message carries the missing-scope signature.
pub fn is_missing_scopes(message: &str) -> bool {
    message.contains(MISSING_SCOPES_SIGNATURE)
}

impl From<BridgeError> for CrawlError {
    fn from(error: BridgeError) -> Self {
        if is_missing_scopes(&error.to_string()) {
            CrawlError::MissingScopes(SCOPE_INSTRUCTIONS.to_string())
        } else {
            CrawlError::Api(error)
        }
    }
}

impl From<core_runtime::Error> for CrawlError {
    fn from(error: core_runtime::Error) -> Self {
        match error {
            core_runtime::Error::Config(msg) => CrawlError::Config(msg),
            core_runtime::Error::Internal(msg) => CrawlError::Internal(msg),
        }
    }
}

impl From<tokio::task::JoinError> for CrawlError {
    fn from(error: tokio::task::JoinError) -> Self {
        if error.is_cancelled() {
            CrawlError::Cancelled
        } else {
            CrawlError::Internal(format!("crawl task panicked: {}", error))
        }
    }
}
