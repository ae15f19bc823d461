//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for server and desktop hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let http_client = Arc::new(ReqwestHttpClient::new()?);
//!     // Hand to provider_google_drive::GoogleDriveClient
//!     Ok(())
//! }
//! ```

mod http;

pub use http::ReqwestHttpClient;
