//! # Host Bridge Traits
//!
//! Contracts between the crawl engine and everything it treats as an external
//! collaborator.
//!
//! ## Overview
//!
//! The engine never talks to the network directly. Listing drives, users and
//! files, converting raw items into documents, and reporting progress to the
//! host ingestion framework all go through the traits defined here, so the
//! engine can be driven by the REST provider in production and by in-memory
//! fakes in tests.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with TLS
//!
//! ### Document store
//! - [`DriveApi`](drive::DriveApi) - Roster, shared drive catalog, container listings, access probe
//!
//! ### Indexing output
//! - [`DocumentConverter`](document::DocumentConverter) - Raw item to indexable document
//! - [`IndexingHeartbeat`](document::IndexingHeartbeat) - Progress and cooperative stop signal
//!
//! ## Error Handling
//!
//! Every trait returns [`BridgeError`](error::BridgeError). Remote failures keep
//! their HTTP status so callers can separate authorization loss from other
//! errors without parsing messages.

pub mod document;
pub mod drive;
pub mod error;
pub mod http;

pub use document::{
    Document, DocumentConverter, DocumentSection, IndexingHeartbeat, PermissionSyncData,
    SlimDocument,
};
pub use drive::{
    DriveApi, DriveItem, FieldSet, ItemOwner, ListRequest, ListScope, Page, Permission,
    Principal, RosterFilter, SharedDrive, TimeWindow, FOLDER_MIME_TYPE,
};
pub use error::{BridgeError, Result};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
