//! # Core Crawl Module
//!
//! Enumerates every document reachable in a Google Drive tenant and yields
//! them as deduplicated batches for indexing.
//!
//! ## Overview
//!
//! A run flows through these stages:
//! - [`DriveConnectorSettings`] are normalized into a [`RetrievalRequest`]
//! - the credential kind picks impersonation or delegated access
//! - [`FanOutOrchestrator`] resolves principals, the shared drive catalog and
//!   the target scope ([`ScopeResolver`]), then runs one
//!   [`PrincipalRetriever`] per principal on a bounded pool
//! - every retriever consults the shared [`TraversalLedger`] so no container
//!   is traversed twice
//! - [`BatchAssembler`] groups the merged items into converted or slim
//!   batches
//!
//! ## Failure handling
//!
//! A principal without API access contributes nothing and the run goes on.
//! A container whose listing is refused is skipped and reported at the end.
//! Items that fail conversion are dropped from their batch. Anything else
//! ends the stream with a [`CrawlError`].

pub mod batch;
pub mod connector;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod retriever;
pub mod retry;
pub mod scope;
pub mod settings;

pub use batch::{
    build_slim_document, BatchAssembler, CancellationHeartbeat, DocumentBatchStream,
    SlimBatchStream,
};
pub use connector::DriveConnector;
pub use error::{CrawlError, Result, MISSING_SCOPES_SIGNATURE, SCOPE_INSTRUCTIONS};
pub use ledger::{Claim, TraversalLedger};
pub use orchestrator::{report_gaps, FanOutOrchestrator, ItemStream, RunOptions};
pub use retriever::{AccessProbe, PrincipalRetriever, PrincipalWork, RetrievalOutcome};
pub use scope::{ResolvedScope, ScopeResolver};
pub use settings::{DriveConnectorSettings, RetrievalRequest};
