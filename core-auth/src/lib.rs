//! # Authentication Module
//!
//! Credential loading and the credential/role discriminator.
//!
//! ## Overview
//!
//! A connector is configured either with a single user's OAuth tokens
//! (delegated access) or with a service account allowed to act as any member
//! of the domain (impersonation). [`DriveCredentials`] parses the host's
//! credential map, and [`CredentialKind::auth_mode`] picks which retrieval
//! path a run takes. Token minting and refresh stay with the host behind
//! [`TokenSource`].

pub mod error;
pub mod token;
pub mod types;

pub use error::{AuthError, Result};
pub use token::{StaticTokenSource, TokenSource};
pub use types::{
    AuthMode, CredentialKind, DriveCredentials, OAuthTokens, ServiceAccountKey,
    OAUTH_TOKENS_KEY, PRIMARY_ADMIN_KEY, SERVICE_ACCOUNT_KEY,
};
