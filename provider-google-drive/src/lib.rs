//! # Google Drive Provider
//!
//! Implements the `DriveApi` trait for Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Directory roster listing for impersonation runs
//! - Shared drive catalog listing
//! - `files.list` queries for personal drives, shared drives, folders and
//!   the combined delegated-access listing
//! - Rate limiting and exponential backoff

pub mod connector;
pub mod error;
pub mod query;
pub mod types;

pub use connector::GoogleDriveClient;
pub use error::{GoogleDriveError, Result};
