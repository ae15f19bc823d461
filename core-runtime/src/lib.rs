//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the crawl workspace:
//! - Logging and tracing infrastructure
//! - Crawler configuration and retry policies
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other crates depend on. It
//! establishes the logging conventions and the validated configuration the
//! crawl engine and the API provider share.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CrawlerConfig, CrawlerConfigBuilder, RetryPolicy};
pub use error::{Error, Result};
