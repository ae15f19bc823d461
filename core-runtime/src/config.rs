//! # Crawler Configuration Module
//!
//! Runtime knobs for the crawl engine: batch sizes, worker pool widths,
//! channel capacities and retry policies.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `CrawlerConfig`. Every value has a default, and `build()` validates the
//! result so a bad value fails before any network activity.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::CrawlerConfig;
//!
//! let config = CrawlerConfig::builder()
//!     .batch_size(32)
//!     .max_principal_workers(4)
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.batch_size, 32);
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CrawlerConfig;
//!
//! // Zero-width pools are rejected
//! let config = CrawlerConfig::builder()
//!     .max_conversion_workers(0)
//!     .build()
//!     .expect("Should fail - zero workers");
//! ```

use crate::error::{Error, Result};
use std::time::Duration;

/// Documents per converted batch
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// References per slim batch
pub const DEFAULT_SLIM_BATCH_SIZE: usize = 500;

/// Principals retrieved concurrently
pub const DEFAULT_MAX_PRINCIPAL_WORKERS: usize = 10;

/// Items converted concurrently
pub const DEFAULT_MAX_CONVERSION_WORKERS: usize = 8;

/// Raw items buffered between retrieval and batching
pub const DEFAULT_ITEM_CHANNEL_CAPACITY: usize = 256;

/// Retry policy for remote calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Double the delay after every failed attempt
    pub use_exponential_backoff: bool,
}

impl RetryPolicy {
    /// Fixed delay between a bounded number of attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            use_exponential_backoff: false,
        }
    }

    /// Exponential backoff starting at `base_delay`
    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            use_exponential_backoff: true,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.use_exponential_backoff {
            return self.base_delay;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config(format!(
                "{} must allow at least one attempt",
                name
            )));
        }
        if self.base_delay > self.max_delay {
            return Err(Error::Config(format!(
                "{} base delay exceeds its maximum delay",
                name
            )));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_millis(100), Duration::from_secs(30))
    }
}

/// Crawl engine configuration.
///
/// Use [`CrawlerConfigBuilder`] to construct instances with validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlerConfig {
    /// Maximum converted documents per emitted batch
    pub batch_size: usize,

    /// Maximum slim references per emitted batch
    pub slim_batch_size: usize,

    /// Width of the principal fan-out pool
    pub max_principal_workers: usize,

    /// Width of the item conversion pool
    pub max_conversion_workers: usize,

    /// Capacity of the bounded channel between retrieval and batching
    pub item_channel_capacity: usize,

    /// Retry policy of the per-principal access probe
    ///
    /// Kept short so principals without API access are skipped quickly.
    pub probe_retry: RetryPolicy,

    /// Retry policy for transient API failures
    pub api_retry: RetryPolicy,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            slim_batch_size: DEFAULT_SLIM_BATCH_SIZE,
            max_principal_workers: DEFAULT_MAX_PRINCIPAL_WORKERS,
            max_conversion_workers: DEFAULT_MAX_CONVERSION_WORKERS,
            item_channel_capacity: DEFAULT_ITEM_CHANNEL_CAPACITY,
            probe_retry: RetryPolicy::fixed(3, Duration::from_secs(1)),
            api_retry: RetryPolicy::default(),
        }
    }
}

impl CrawlerConfig {
    /// Creates a new builder for constructing a `CrawlerConfig`.
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("Batch size must be greater than 0".to_string()));
        }

        if self.slim_batch_size == 0 {
            return Err(Error::Config(
                "Slim batch size must be greater than 0".to_string(),
            ));
        }

        if self.max_principal_workers == 0 {
            return Err(Error::Config(
                "Principal worker count must be greater than 0".to_string(),
            ));
        }

        if self.max_conversion_workers == 0 {
            return Err(Error::Config(
                "Conversion worker count must be greater than 0".to_string(),
            ));
        }

        if self.item_channel_capacity == 0 {
            return Err(Error::Config(
                "Item channel capacity must be greater than 0".to_string(),
            ));
        }

        self.probe_retry.validate("Probe retry policy")?;
        self.api_retry.validate("API retry policy")?;

        Ok(())
    }
}

/// Builder for [`CrawlerConfig`]
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    batch_size: Option<usize>,
    slim_batch_size: Option<usize>,
    max_principal_workers: Option<usize>,
    max_conversion_workers: Option<usize>,
    item_channel_capacity: Option<usize>,
    probe_retry: Option<RetryPolicy>,
    api_retry: Option<RetryPolicy>,
}

impl CrawlerConfigBuilder {
    /// Sets the converted batch size.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets the slim batch size.
    pub fn slim_batch_size(mut self, size: usize) -> Self {
        self.slim_batch_size = Some(size);
        self
    }

    /// Sets how many principals are retrieved concurrently.
    pub fn max_principal_workers(mut self, workers: usize) -> Self {
        self.max_principal_workers = Some(workers);
        self
    }

    /// Sets how many items are converted concurrently.
    pub fn max_conversion_workers(mut self, workers: usize) -> Self {
        self.max_conversion_workers = Some(workers);
        self
    }

    /// Sets the retrieval-to-batching channel capacity.
    pub fn item_channel_capacity(mut self, capacity: usize) -> Self {
        self.item_channel_capacity = Some(capacity);
        self
    }

    /// Sets the access probe retry policy.
    pub fn probe_retry(mut self, policy: RetryPolicy) -> Self {
        self.probe_retry = Some(policy);
        self
    }

    /// Sets the API retry policy.
    pub fn api_retry(mut self, policy: RetryPolicy) -> Self {
        self.api_retry = Some(policy);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<CrawlerConfig> {
        let defaults = CrawlerConfig::default();
        let config = CrawlerConfig {
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            slim_batch_size: self.slim_batch_size.unwrap_or(defaults.slim_batch_size),
            max_principal_workers: self
                .max_principal_workers
                .unwrap_or(defaults.max_principal_workers),
            max_conversion_workers: self
                .max_conversion_workers
                .unwrap_or(defaults.max_conversion_workers),
            item_channel_capacity: self
                .item_channel_capacity
                .unwrap_or(defaults.item_channel_capacity),
            probe_retry: self.probe_retry.unwrap_or(defaults.probe_retry),
            api_retry: self.api_retry.unwrap_or(defaults.api_retry),
        };

        config.validate()?;
        Ok(config)
    }
}
