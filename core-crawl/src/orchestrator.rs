//! # Fan-Out Orchestrator
//!
//! Drives one crawl run and exposes its items as a single stream.
//!
//! ## Impersonation
//!
//! ResolvePrincipals → ResolveCatalog → ResolveScope → ConcurrentRetrieve →
//! ReportGaps. Every domain member gets a [`PrincipalRetriever`] on a pool of
//! `max_principal_workers` tasks. Each worker takes the drives and folders
//! still absent from the ledger when it starts, so later workers repeat less.
//!
//! ## Delegated access
//!
//! RetrieveOwnAndShared → ResolveCatalog → ResolveScope → RetrieveDrives →
//! RetrieveFolders → ReportGaps, all as the one authenticated user. When all
//! three broad flags are set the combined listing already covers everything
//! and the run ends after it.
//!
//! ## Output
//!
//! Retrievers push into a bounded channel; the returned stream is its
//! receiver, so items arrive in completion order. A fatal error is yielded as
//! the last item. Dropping the stream aborts the run.

use bridge_traits::drive::{DriveApi, DriveItem, FieldSet, Principal, RosterFilter, TimeWindow};
use core_auth::AuthMode;
use core_runtime::config::CrawlerConfig;
use futures::stream::{self, Stream};
use std::collections::{BTreeSet, HashSet};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{CrawlError, Result};
use crate::ledger::TraversalLedger;
use crate::retriever::{ItemSender, PrincipalRetriever, PrincipalWork, RetrievalOutcome};
use crate::retry::collect_pages;
use crate::scope::{ResolvedScope, ScopeResolver};
use crate::settings::RetrievalRequest;

/// Merged raw item stream of one run
pub type ItemStream = Pin<Box<dyn Stream<Item = Result<DriveItem>> + Send>>;

/// Options of a single run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub window: TimeWindow,
    pub fields: Option<FieldSet>,
    pub cancel: CancellationToken,
}

impl RunOptions {
    fn fields(&self) -> FieldSet {
        self.fields.unwrap_or(FieldSet::Full)
    }
}

/// Aborts the driver task (and with it every worker) when the stream goes away.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Clone)]
pub struct FanOutOrchestrator {
    api: Arc<dyn DriveApi>,
    primary_admin: Principal,
    mode: AuthMode,
    request: Arc<RetrievalRequest>,
    config: CrawlerConfig,
}

impl FanOutOrchestrator {
    pub fn new(
        api: Arc<dyn DriveApi>,
        primary_admin: Principal,
        mode: AuthMode,
        request: RetrievalRequest,
        config: CrawlerConfig,
    ) -> Self {
        Self {
            api,
            primary_admin,
            mode,
            request: Arc::new(request),
            config,
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn request(&self) -> &RetrievalRequest {
        &self.request
    }

    /// Start a run and return its item stream.
    ///
    /// Must be called from within a Tokio runtime. `ledger` should be fresh
    /// for every run; it is exposed so callers can inspect what was visited.
    pub fn stream(&self, ledger: TraversalLedger, options: RunOptions) -> ItemStream {
        let (tx, mut rx) = mpsc::channel(self.config.item_channel_capacity);
        let orchestrator = self.clone();
        let span = info_span!("crawl_run", run_id = %Uuid::new_v4(), mode = %self.mode);

        let driver = tokio::spawn(
            async move {
                let result = match orchestrator.mode {
                    AuthMode::Impersonation => {
                        orchestrator
                            .run_impersonation(&ledger, &options, &tx)
                            .await
                    }
                    AuthMode::Delegated => orchestrator.run_delegated(&ledger, &options, &tx).await,
                };

                if let Err(e) = result {
                    error!("Crawl run failed: {}", e);
                    let _ = tx.send(Err(e)).await;
                }
            }
            .instrument(span),
        );

        let guard = AbortOnDrop(driver);
        Box::pin(stream::poll_fn(move |cx| {
            let _guard = &guard;
            rx.poll_recv(cx)
        }))
    }

    /// Every principal to retrieve as, primary admin first, then admins, then
    /// everyone else. Delegated runs only have the authenticated user.
    pub async fn resolve_principals(&self) -> Result<Vec<Principal>> {
        let mut principals = vec![self.primary_admin.clone()];
        if self.mode == AuthMode::Delegated {
            return Ok(principals);
        }

        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(self.primary_admin.email().to_string());
        let domain = self.primary_admin.domain().to_string();

        for filter in [RosterFilter::Admins, RosterFilter::NonAdmins] {
            let emails = collect_pages(&self.config.api_retry, "users.list", |page_token| {
                self.api
                    .list_users(&self.primary_admin, &domain, filter, page_token)
            })
            .await?;

            for email in emails {
                if seen.insert(email.clone()) {
                    principals.push(Principal::new(email));
                }
            }
        }

        Ok(principals)
    }

    /// IDs of every shared drive visible to the primary admin.
    pub async fn resolve_catalog(&self) -> Result<BTreeSet<String>> {
        let use_domain_admin_access = self.mode == AuthMode::Impersonation;
        let drives = collect_pages(&self.config.api_retry, "drives.list", |page_token| {
            self.api
                .list_shared_drives(&self.primary_admin, use_domain_admin_access, page_token)
        })
        .await?;

        let catalog: BTreeSet<String> = drives.into_iter().map(|drive| drive.id).collect();
        if catalog.is_empty() && self.request.include_shared_drives {
            warn!("No drives found even though indexing shared drives was requested.");
        }
        Ok(catalog)
    }

    fn retriever(
        &self,
        principal: Principal,
        ledger: &TraversalLedger,
        options: &RunOptions,
        tx: &ItemSender,
    ) -> PrincipalRetriever {
        PrincipalRetriever::new(self.api.clone(), ledger.clone(), principal, tx.clone())
            .with_window(options.window)
            .with_fields(options.fields())
            .with_cancellation(options.cancel.clone())
    }

    async fn run_impersonation(
        &self,
        ledger: &TraversalLedger,
        options: &RunOptions,
        tx: &ItemSender,
    ) -> Result<()> {
        let principals = self.resolve_principals().await?;
        let catalog = self.resolve_catalog().await?;
        let scope = Arc::new(ScopeResolver::for_request(&self.request, &catalog));

        info!("Found {} users to impersonate", principals.len());
        debug!("Users: {:?}", principals);
        info!("Found {} drives to retrieve", scope.drive_ids.len());
        debug!("Drives: {:?}", scope.drive_ids);
        info!("Found {} folders to retrieve", scope.folder_ids.len());
        debug!("Folders: {:?}", scope.folder_ids);

        let semaphore = Arc::new(Semaphore::new(self.config.max_principal_workers));
        let mut workers = JoinSet::new();

        for principal in principals {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| CrawlError::Internal("principal worker pool closed".to_string()))?;

            if options.cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }

            // Fail fast on workers that already finished with an error.
            while let Some(joined) = workers.try_join_next() {
                check_worker(joined)?;
            }

            let include_my_drive = self.request.wants_my_drive(principal.email());
            let retriever = self.retriever(principal, ledger, options, tx);
            let ledger = ledger.clone();
            let scope = scope.clone();
            let probe_retry = self.config.probe_retry.clone();

            workers.spawn(async move {
                let _permit = permit;
                let work = PrincipalWork {
                    include_my_drive,
                    drive_ids: ledger.remaining(&scope.drive_ids).await,
                    folder_ids: ledger.remaining(&scope.folder_ids).await,
                };
                retriever.run(work, &probe_retry).await
            });
        }

        while let Some(joined) = workers.join_next().await {
            check_worker(joined)?;
        }

        report_gaps(ledger, &scope).await;
        Ok(())
    }

    async fn run_delegated(
        &self,
        ledger: &TraversalLedger,
        options: &RunOptions,
        tx: &ItemSender,
    ) -> Result<()> {
        let retriever = self.retriever(self.primary_admin.clone(), ledger, options, tx);
        let request = &self.request;

        if (request.include_files_shared_with_me || request.include_my_drives)
            && retriever.retrieve_combined(request).await? == RetrievalOutcome::ConsumerGone
        {
            return Ok(());
        }

        if request.includes_everything() {
            return Ok(());
        }

        let catalog = self.resolve_catalog().await?;
        let scope = ScopeResolver::for_request(request, &catalog);

        for drive_id in &scope.drive_ids {
            if retriever.retrieve_shared_drive(drive_id).await? == RetrievalOutcome::ConsumerGone {
                return Ok(());
            }
        }

        for folder_id in &scope.folder_ids {
            if retriever.crawl_folder(folder_id).await? == RetrievalOutcome::ConsumerGone {
                return Ok(());
            }
        }

        report_gaps(ledger, &scope).await;
        Ok(())
    }
}

fn check_worker(
    joined: std::result::Result<Result<RetrievalOutcome>, JoinError>,
) -> Result<RetrievalOutcome> {
    let outcome = joined??;
    debug!("Principal worker finished: {:?}", outcome);
    Ok(outcome)
}

/// Log every requested container that was never entered or could not be
/// listed. Never fails the run.
pub async fn report_gaps(ledger: &TraversalLedger, scope: &ResolvedScope) -> Vec<String> {
    let gaps = ledger.gaps(scope.all_ids()).await;
    if !gaps.is_empty() {
        warn!("Some folders/drives were not retrieved. IDs: {:?}", gaps);
    }
    gaps
}
