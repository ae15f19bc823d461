//! # Per-Principal Retrieval
//!
//! Lists everything one principal is asked to cover and pushes the items into
//! the run's bounded item channel.
//!
//! ## Workflow
//!
//! 1. Probe API access as the principal (short retry). A 401 ends the
//!    principal's contribution without failing the run.
//! 2. Personal drive, when in scope.
//! 3. Each assigned shared drive not yet in the ledger (flat listing).
//! 4. Each assigned folder not yet in the ledger, depth first.
//!
//! Shared drives and folders are claimed in the ledger before they are listed
//! and count as visited once their first page comes back. A refused listing
//! hands the claim back so a later principal with access can take it; the
//! container stays unreachable only if nobody ever lists it.

use bridge_traits::drive::{
    DriveApi, DriveItem, FieldSet, ListRequest, ListScope, Page, Principal, TimeWindow,
};
use bridge_traits::error::BridgeError;
use core_runtime::config::RetryPolicy;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{CrawlError, Result};
use crate::ledger::TraversalLedger;
use crate::retry::with_retry;
use crate::settings::RetrievalRequest;

/// Producer side of the run's item channel
pub type ItemSender = mpsc::Sender<Result<DriveItem>>;

/// Result of the per-principal access probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessProbe {
    /// The principal can use the API; carries its personal drive root ID
    Granted(String),
    Denied,
}

/// How a principal's retrieval ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalOutcome {
    Completed,
    /// Probe refused; the principal contributed nothing
    AccessDenied,
    /// The item stream was dropped downstream
    ConsumerGone,
}

/// Containers assigned to one principal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalWork {
    pub include_my_drive: bool,
    pub drive_ids: Vec<String>,
    pub folder_ids: Vec<String>,
}

enum Drain {
    Done,
    Denied(BridgeError),
    ConsumerGone,
}

#[derive(Debug, PartialEq, Eq)]
enum FolderListing {
    Listed,
    Refused,
    ConsumerGone,
}

pub struct PrincipalRetriever {
    api: Arc<dyn DriveApi>,
    ledger: TraversalLedger,
    principal: Principal,
    window: TimeWindow,
    fields: FieldSet,
    sink: ItemSender,
    cancel: CancellationToken,
}

impl PrincipalRetriever {
    pub fn new(
        api: Arc<dyn DriveApi>,
        ledger: TraversalLedger,
        principal: Principal,
        sink: ItemSender,
    ) -> Self {
        Self {
            api,
            ledger,
            principal,
            window: TimeWindow::unbounded(),
            fields: FieldSet::Full,
            sink,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_fields(mut self, fields: FieldSet) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Check that the principal can use the API at all.
    ///
    /// Only 401 counts as denied; anything else is retried per `policy` and
    /// then returned as an error.
    pub async fn probe(&self, policy: &RetryPolicy) -> Result<AccessProbe> {
        let result = with_retry(policy, "access probe", || {
            self.api.root_folder_id(&self.principal)
        })
        .await;

        match result {
            Ok(root_id) => Ok(AccessProbe::Granted(root_id)),
            Err(e) if e.is_unauthorized() => {
                warn!(
                    "User '{}' does not have access to the drive APIs.",
                    self.principal
                );
                Ok(AccessProbe::Denied)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Probe, then retrieve the assigned containers in order.
    #[instrument(skip(self, work, probe_policy), fields(principal = %self.principal))]
    pub async fn run(&self, work: PrincipalWork, probe_policy: &RetryPolicy) -> Result<RetrievalOutcome> {
        info!("Impersonating user {}", self.principal);

        let root_id = match self.probe(probe_policy).await? {
            AccessProbe::Granted(root_id) => root_id,
            AccessProbe::Denied => return Ok(RetrievalOutcome::AccessDenied),
        };

        if work.include_my_drive
            && self.retrieve_my_drive(Some(&root_id)).await? == RetrievalOutcome::ConsumerGone
        {
            return Ok(RetrievalOutcome::ConsumerGone);
        }

        for drive_id in &work.drive_ids {
            if self.retrieve_shared_drive(drive_id).await? == RetrievalOutcome::ConsumerGone {
                return Ok(RetrievalOutcome::ConsumerGone);
            }
        }

        for folder_id in &work.folder_ids {
            if self.crawl_folder(folder_id).await? == RetrievalOutcome::ConsumerGone {
                return Ok(RetrievalOutcome::ConsumerGone);
            }
        }

        debug!("Finished retrieval as {}", self.principal);
        Ok(RetrievalOutcome::Completed)
    }

    /// Every item the principal owns. Folders are marked, not emitted.
    pub async fn retrieve_my_drive(&self, root_id: Option<&str>) -> Result<RetrievalOutcome> {
        info!("Getting all files in my drive as '{}'", self.principal);

        match self.drain_flat(&ListScope::MyDrive, root_id).await? {
            Drain::Done => Ok(RetrievalOutcome::Completed),
            Drain::ConsumerGone => Ok(RetrievalOutcome::ConsumerGone),
            Drain::Denied(e) => {
                warn!("My drive of '{}' could not be listed: {}", self.principal, e);
                if let Some(root_id) = root_id {
                    self.ledger.release_refused(root_id).await;
                }
                Ok(RetrievalOutcome::Completed)
            }
        }
    }

    /// Every item of a shared drive, unless another retriever already took it.
    pub async fn retrieve_shared_drive(&self, drive_id: &str) -> Result<RetrievalOutcome> {
        if !self.ledger.acquire(drive_id).await {
            debug!("Shared drive '{}' already visited, skipping", drive_id);
            return Ok(RetrievalOutcome::Completed);
        }

        info!(
            "Getting files in shared drive '{}' as '{}'",
            drive_id, self.principal
        );

        let scope = ListScope::SharedDrive {
            drive_id: drive_id.to_string(),
        };
        let drained = self.drain_flat(&scope, Some(drive_id)).await;
        match drained {
            Ok(Drain::Done) => Ok(RetrievalOutcome::Completed),
            Ok(Drain::ConsumerGone) => {
                self.ledger.release(drive_id).await;
                Ok(RetrievalOutcome::ConsumerGone)
            }
            Ok(Drain::Denied(e)) => {
                warn!(
                    "Shared drive '{}' is not accessible as '{}': {}",
                    drive_id, self.principal, e
                );
                self.ledger.release_refused(drive_id).await;
                Ok(RetrievalOutcome::Completed)
            }
            Err(e) => {
                self.ledger.release(drive_id).await;
                Err(e)
            }
        }
    }

    /// Depth-first descent from `folder_id`, skipping visited subtrees.
    pub async fn crawl_folder(&self, folder_id: &str) -> Result<RetrievalOutcome> {
        info!(
            "Getting files in folder '{}' as '{}'",
            folder_id, self.principal
        );

        let mut pending = vec![folder_id.to_string()];

        while let Some(current) = pending.pop() {
            if !self.ledger.acquire(&current).await {
                debug!("Folder '{}' already visited, skipping", current);
                continue;
            }

            let listed = self.list_folder(&current, &mut pending).await;
            if !self.ledger.contains(&current).await {
                // Claim still held: the first page never came back.
                match &listed {
                    Ok(FolderListing::Refused) => self.ledger.release_refused(&current).await,
                    _ => self.ledger.release(&current).await,
                }
            }
            if listed? == FolderListing::ConsumerGone {
                return Ok(RetrievalOutcome::ConsumerGone);
            }
        }

        Ok(RetrievalOutcome::Completed)
    }

    /// List one claimed folder, queueing unvisited sub-folders on `pending`.
    async fn list_folder(&self, folder_id: &str, pending: &mut Vec<String>) -> Result<FolderListing> {
        let scope = ListScope::FolderChildren {
            folder_id: folder_id.to_string(),
        };
        let mut page_token = None;
        let mut first_page = true;

        loop {
            self.check_cancelled()?;

            let page = match self.fetch_page(&scope, page_token.take()).await {
                Ok(page) => page,
                Err(e) if e.is_access_denied() => {
                    warn!(
                        "Folder '{}' is not accessible as '{}', skipping its subtree: {}",
                        folder_id, self.principal, e
                    );
                    return Ok(FolderListing::Refused);
                }
                Err(e) => return Err(e.into()),
            };
            if first_page {
                first_page = false;
                self.ledger.complete(folder_id).await;
            }

            for item in page.items {
                if item.is_folder() {
                    if !self.ledger.contains(&item.id).await {
                        pending.push(item.id);
                    }
                } else if !self.emit(item).await {
                    return Ok(FolderListing::ConsumerGone);
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(FolderListing::Listed),
            }
        }
    }

    /// One listing covering the broad delegated-access flags together.
    pub async fn retrieve_combined(&self, request: &RetrievalRequest) -> Result<RetrievalOutcome> {
        info!(
            "Getting shared files/my drive files with include_files_shared_with_me={}, \
             include_my_drives={}, include_shared_drives={}. Using '{}' as the account.",
            request.include_files_shared_with_me,
            request.include_my_drives,
            request.include_shared_drives,
            self.principal
        );

        let scope = ListScope::Combined {
            include_my_drives: request.include_my_drives,
            include_files_shared_with_me: request.include_files_shared_with_me,
            include_shared_drives: request.include_shared_drives,
        };
        match self.drain_flat(&scope, None).await? {
            Drain::Done => Ok(RetrievalOutcome::Completed),
            Drain::ConsumerGone => Ok(RetrievalOutcome::ConsumerGone),
            Drain::Denied(e) => Err(e.into()),
        }
    }

    /// Page through a flat listing. `container` is marked visited once its
    /// first page comes back.
    async fn drain_flat(&self, scope: &ListScope, container: Option<&str>) -> Result<Drain> {
        let mut page_token = None;
        let mut first_page = true;

        loop {
            self.check_cancelled()?;

            let page = match self.fetch_page(scope, page_token.take()).await {
                Ok(page) => page,
                Err(e) if e.is_access_denied() => return Ok(Drain::Denied(e)),
                Err(e) => return Err(e.into()),
            };
            if first_page {
                first_page = false;
                if let Some(id) = container {
                    self.ledger.complete(id).await;
                }
            }

            for item in page.items {
                if item.is_folder() {
                    self.ledger.mark_visited(item.id).await;
                } else if !self.emit(item).await {
                    return Ok(Drain::ConsumerGone);
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(Drain::Done),
            }
        }
    }

    async fn fetch_page(
        &self,
        scope: &ListScope,
        page_token: Option<String>,
    ) -> bridge_traits::error::Result<Page<DriveItem>> {
        let request = ListRequest {
            scope: scope.clone(),
            window: self.window,
            fields: self.fields,
        };
        self.api
            .list_items(&self.principal, &request, page_token)
            .await
    }

    async fn emit(&self, item: DriveItem) -> bool {
        self.sink.send(Ok(item)).await.is_ok()
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(CrawlError::Cancelled);
        }
        Ok(())
    }
}
