//! Access token sources
//!
//! Token acquisition and refresh belong to the host; the crawler only asks
//! for a bearer token to act as a given principal.

use async_trait::async_trait;
use bridge_traits::drive::Principal;
use std::collections::HashMap;

use crate::error::{AuthError, Result};

/// Supplies bearer tokens per principal.
///
/// Impersonation hosts mint one token per impersonated user; delegated hosts
/// return the single user's token for every call.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self, principal: &Principal) -> Result<String>;
}

/// Fixed tokens, optionally with a fallback used for unknown principals.
#[derive(Clone, Default)]
pub struct StaticTokenSource {
    tokens: HashMap<String, String>,
    fallback: Option<String>,
}

impl StaticTokenSource {
    /// One token for every principal
    pub fn shared(token: impl Into<String>) -> Self {
        Self {
            tokens: HashMap::new(),
            fallback: Some(token.into()),
        }
    }

    pub fn with_token(mut self, email: impl Into<String>, token: impl Into<String>) -> Self {
        self.tokens.insert(email.into(), token.into());
        self
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self, principal: &Principal) -> Result<String> {
        self.tokens
            .get(principal.email())
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| AuthError::TokenUnavailable {
                principal: principal.to_string(),
                reason: "no token configured".to_string(),
            })
    }
}
