//! Point-of-use retry and pagination helpers for `DriveApi` calls.

use bridge_traits::drive::Page;
use bridge_traits::error::{BridgeError, Result};
use core_runtime::config::RetryPolicy;
use std::future::Future;
use tracing::warn;

/// Run `call` until it succeeds, `policy` is exhausted, or the error is one
/// retrying cannot fix.
///
/// Only transport failures are retried. HTTP statuses already went through
/// the provider's own backoff and are returned immediately.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}, retrying in {:?}",
                    operation, attempt, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_retryable(error: &BridgeError) -> bool {
    error.is_transient()
}

/// Drain every page of a listing, retrying each page per `policy`.
pub async fn collect_pages<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut fetch: F,
) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = with_retry(policy, operation, || fetch(page_token.clone())).await?;
        items.extend(page.items);

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(items)
}
