//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-crawl`, `provider-google-drive`). Host
//! ingestion frameworks can depend on `drive-crawl-workspace` and enable the
//! documented features without needing to wire each crate individually.

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop as desktop;
#[cfg(feature = "desktop-shims")]
pub use core_crawl as crawl;
#[cfg(feature = "desktop-shims")]
pub use core_runtime as runtime;
#[cfg(feature = "desktop-shims")]
pub use provider_google_drive as google_drive;
