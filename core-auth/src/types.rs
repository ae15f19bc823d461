use bridge_traits::drive::Principal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{AuthError, Result};

/// Credential map key holding the primary administrator address
pub const PRIMARY_ADMIN_KEY: &str = "google_primary_admin";

/// Credential map key holding delegated OAuth tokens (JSON)
pub const OAUTH_TOKENS_KEY: &str = "google_tokens";

/// Credential map key holding a service account key (JSON)
pub const SERVICE_ACCOUNT_KEY: &str = "google_service_account_key";

/// Delegated-access OAuth tokens for a single user.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// The access token used for API requests
    pub access_token: String,
    /// The refresh token used to obtain new access tokens
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// When the access token expires (UTC)
    #[serde(default)]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Domain-wide delegation service account key.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("client_id", &self.client_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Which authorization model a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMode {
    /// Service identity acting as any member of the domain
    Impersonation,
    /// One user's own delegated access
    Delegated,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Impersonation => write!(f, "impersonation"),
            AuthMode::Delegated => write!(f, "delegated"),
        }
    }
}

/// The credential material a run was configured with.
#[derive(Debug, Clone)]
pub enum CredentialKind {
    OAuth(OAuthTokens),
    ServiceAccount(ServiceAccountKey),
}

impl CredentialKind {
    /// Credential/role discriminator: service accounts impersonate, OAuth
    /// tokens act only as their owner.
    pub fn auth_mode(&self) -> AuthMode {
        match self {
            CredentialKind::OAuth(_) => AuthMode::Delegated,
            CredentialKind::ServiceAccount(_) => AuthMode::Impersonation,
        }
    }
}

/// Credentials for one crawl connector.
///
/// # Examples
///
/// ```
/// use core_auth::{AuthMode, DriveCredentials};
/// use std::collections::HashMap;
///
/// let mut map = HashMap::new();
/// map.insert("google_primary_admin".to_string(), "admin@example.com".to_string());
/// map.insert("google_tokens".to_string(), r#"{"access_token": "ya29.token"}"#.to_string());
///
/// let credentials = DriveCredentials::from_map(&map).unwrap();
/// assert_eq!(credentials.auth_mode(), AuthMode::Delegated);
/// assert_eq!(credentials.google_domain(), "example.com");
/// ```
#[derive(Debug, Clone)]
pub struct DriveCredentials {
    primary_admin: Principal,
    kind: CredentialKind,
}

impl DriveCredentials {
    pub fn new(primary_admin_email: impl Into<String>, kind: CredentialKind) -> Self {
        Self {
            primary_admin: Principal::new(primary_admin_email),
            kind,
        }
    }

    /// Parse the host framework's credential map.
    ///
    /// A service account key wins when both kinds are present.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let primary_admin = map
            .get(PRIMARY_ADMIN_KEY)
            .map(|email| email.trim())
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AuthError::MissingField(PRIMARY_ADMIN_KEY.to_string()))?;

        if !primary_admin.contains('@') {
            return Err(AuthError::InvalidField {
                field: PRIMARY_ADMIN_KEY.to_string(),
                reason: "expected an email address".to_string(),
            });
        }

        let kind = if let Some(raw) = map.get(SERVICE_ACCOUNT_KEY) {
            CredentialKind::ServiceAccount(parse_json(SERVICE_ACCOUNT_KEY, raw)?)
        } else if let Some(raw) = map.get(OAUTH_TOKENS_KEY) {
            CredentialKind::OAuth(parse_json(OAUTH_TOKENS_KEY, raw)?)
        } else {
            return Err(AuthError::MissingField(format!(
                "{} or {}",
                OAUTH_TOKENS_KEY, SERVICE_ACCOUNT_KEY
            )));
        };

        Ok(Self::new(primary_admin, kind))
    }

    pub fn primary_admin(&self) -> &Principal {
        &self.primary_admin
    }

    /// Domain of the primary administrator
    pub fn google_domain(&self) -> &str {
        self.primary_admin.domain()
    }

    pub fn kind(&self) -> &CredentialKind {
        &self.kind
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.kind.auth_mode()
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(field: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| AuthError::InvalidField {
        field: field.to_string(),
        reason: e.to_string(),
    })
}
