//! # Drive Connector
//!
//! Host-facing entry points: full crawl, windowed crawl, slim references and
//! settings validation.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_crawl::{DriveConnector, DriveConnectorSettings};
//! use futures::StreamExt;
//!
//! let connector = DriveConnector::new(settings, credentials, api, converter, config)?;
//! connector.validate_connector_settings().await?;
//!
//! let mut batches = connector.load_from_state();
//! while let Some(batch) = batches.next().await {
//!     index(batch?);
//! }
//! ```

use bridge_traits::document::{DocumentConverter, IndexingHeartbeat};
use bridge_traits::drive::{DriveApi, FieldSet, TimeWindow};
use bridge_traits::error::BridgeError;
use chrono::{DateTime, Utc};
use core_auth::{AuthMode, DriveCredentials};
use core_runtime::config::CrawlerConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::batch::{BatchAssembler, DocumentBatchStream, SlimBatchStream};
use crate::error::{is_missing_scopes, CrawlError, Result, SCOPE_INSTRUCTIONS};
use crate::ledger::TraversalLedger;
use crate::orchestrator::{FanOutOrchestrator, RunOptions};
use crate::retry::with_retry;
use crate::settings::{DriveConnectorSettings, RetrievalRequest};

pub struct DriveConnector {
    credentials: DriveCredentials,
    api: Arc<dyn DriveApi>,
    config: CrawlerConfig,
    orchestrator: FanOutOrchestrator,
    assembler: BatchAssembler,
    cancel: CancellationToken,
}

impl DriveConnector {
    /// Build a connector.
    ///
    /// `settings.batch_size` overrides `config.batch_size`.
    ///
    /// # Errors
    ///
    /// [`CrawlError::Config`] when the settings select nothing or the
    /// resulting configuration is invalid. No network call is made.
    pub fn new(
        settings: DriveConnectorSettings,
        credentials: DriveCredentials,
        api: Arc<dyn DriveApi>,
        converter: Arc<dyn DocumentConverter>,
        mut config: CrawlerConfig,
    ) -> Result<Self> {
        let request = settings.resolve()?;
        if let Some(batch_size) = settings.batch_size {
            config.batch_size = batch_size;
        }
        config.validate()?;

        info!(
            "Drive connector configured: mode={}, drives={}, folders={}, my_drive_emails={}",
            credentials.auth_mode(),
            request.drive_ids.len(),
            request.folder_ids.len(),
            request.my_drive_emails.len()
        );

        let orchestrator = FanOutOrchestrator::new(
            api.clone(),
            credentials.primary_admin().clone(),
            credentials.auth_mode(),
            request,
            config.clone(),
        );
        let assembler = BatchAssembler::new(
            converter,
            credentials.primary_admin().clone(),
            config.batch_size,
            config.max_conversion_workers,
        );

        Ok(Self {
            credentials,
            api,
            config,
            orchestrator,
            assembler,
            cancel: CancellationToken::new(),
        })
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.credentials.auth_mode()
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    pub fn request(&self) -> &RetrievalRequest {
        self.orchestrator.request()
    }

    /// Stop every crawl of this connector at its next page boundary.
    ///
    /// Running streams end with [`CrawlError::Cancelled`]; crawls started
    /// afterwards fail the same way.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Full crawl, converted batches.
    pub fn load_from_state(&self) -> DocumentBatchStream {
        self.document_batches(TimeWindow::unbounded())
    }

    /// Items modified within `[start, end]`, converted batches.
    pub fn poll_source(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> DocumentBatchStream {
        self.document_batches(TimeWindow::between(start, end))
    }

    /// Slim references for permission sync.
    ///
    /// `callback.should_stop()` is checked before every batch and
    /// `callback.progress()` is called once per emitted batch.
    pub fn retrieve_all_slim_documents(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        callback: Option<Arc<dyn IndexingHeartbeat>>,
    ) -> SlimBatchStream {
        let items = self.orchestrator.stream(
            TraversalLedger::new(),
            RunOptions {
                window: TimeWindow { start, end },
                fields: Some(FieldSet::Slim),
                cancel: self.cancel.child_token(),
            },
        );
        BatchAssembler::slim(items, self.config.slim_batch_size, callback)
    }

    fn document_batches(&self, window: TimeWindow) -> DocumentBatchStream {
        let items = self.orchestrator.stream(
            TraversalLedger::new(),
            RunOptions {
                window,
                fields: Some(FieldSet::Full),
                cancel: self.cancel.child_token(),
            },
        );
        self.assembler.documents(items)
    }

    /// One cheap authenticated listing as the primary admin, plus the access
    /// probe for service accounts.
    ///
    /// # Errors
    ///
    /// - [`CrawlError::CredentialExpired`] on 401
    /// - [`CrawlError::InsufficientPermissions`] on 403 or missing scopes
    /// - [`CrawlError::Validation`] for anything else
    #[instrument(skip(self), fields(admin = %self.credentials.primary_admin()))]
    pub async fn validate_connector_settings(&self) -> Result<()> {
        let admin = self.credentials.primary_admin();

        let result = async {
            self.api.list_any(admin).await?;
            if self.auth_mode() == AuthMode::Impersonation {
                with_retry(&self.config.api_retry, "root folder probe", || {
                    self.api.root_folder_id(admin)
                })
                .await?;
            }
            Ok::<(), BridgeError>(())
        }
        .await;

        match result {
            Ok(()) => {
                info!("Google Drive connector settings validated");
                Ok(())
            }
            Err(e) => Err(classify_validation_error(e)),
        }
    }
}

fn classify_validation_error(error: BridgeError) -> CrawlError {
    match error.status() {
        Some(401) => {
            CrawlError::CredentialExpired("Invalid or expired Google Drive credentials (401).".to_string())
        }
        Some(403) => CrawlError::InsufficientPermissions(
            "Google Drive app lacks required permissions (403). Please ensure the necessary \
             scopes are granted and Drive apps are enabled."
                .to_string(),
        ),
        Some(status) => CrawlError::Validation(format!(
            "Unexpected Google Drive error (status={}): {}",
            status, error
        )),
        None if is_missing_scopes(&error.to_string()) => CrawlError::InsufficientPermissions(
            format!(
                "Google Drive credentials are missing required scopes. {}",
                SCOPE_INSTRUCTIONS
            ),
        ),
        None => CrawlError::Validation(format!(
            "Unexpected error during Google Drive validation: {}",
            error
        )),
    }
}
