//! # Batch Assembly
//!
//! Groups the merged item stream into batches for the host framework.
//!
//! The full path collects up to `batch_size` raw items, converts them on a
//! bounded pool of tasks and forwards the documents that converted. The slim
//! path is a pure projection and checks the heartbeat's stop signal between
//! batches.

use bridge_traits::document::{
    Document, DocumentConverter, IndexingHeartbeat, PermissionSyncData, SlimDocument,
};
use bridge_traits::drive::{DriveItem, Principal};
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::orchestrator::ItemStream;

/// Stream of converted document batches
pub type DocumentBatchStream = Pin<Box<dyn Stream<Item = Result<Vec<Document>>> + Send>>;

/// Stream of slim reference batches
pub type SlimBatchStream = Pin<Box<dyn Stream<Item = Result<Vec<SlimDocument>>> + Send>>;

const SLIM_PROGRESS_TAG: &str = "retrieve_all_slim_documents";

/// Converts raw items into documents in fixed-size batches.
#[derive(Clone)]
pub struct BatchAssembler {
    converter: Arc<dyn DocumentConverter>,
    fallback_owner: Principal,
    batch_size: usize,
    max_conversion_workers: usize,
}

struct DocumentState {
    items: ItemStream,
    assembler: BatchAssembler,
}

struct SlimState {
    items: ItemStream,
    batch_size: usize,
    heartbeat: Option<Arc<dyn IndexingHeartbeat>>,
}

impl BatchAssembler {
    /// `fallback_owner` converts items that report no owner.
    pub fn new(
        converter: Arc<dyn DocumentConverter>,
        fallback_owner: Principal,
        batch_size: usize,
        max_conversion_workers: usize,
    ) -> Self {
        Self {
            converter,
            fallback_owner,
            batch_size: batch_size.max(1),
            max_conversion_workers: max_conversion_workers.max(1),
        }
    }

    /// Converted batches of at most `batch_size` documents.
    ///
    /// Items that fail conversion are logged and dropped; batches where
    /// nothing converted are not emitted. A retrieval error ends the stream
    /// after being yielded.
    pub fn documents(&self, items: ItemStream) -> DocumentBatchStream {
        let state = DocumentState {
            items,
            assembler: self.clone(),
        };

        stream::try_unfold(state, |mut state| async move {
            loop {
                let raw = match next_chunk(&mut state.items, state.assembler.batch_size).await {
                    Ok(raw) => raw,
                    Err(e) => return Err(e),
                };
                if raw.is_empty() {
                    return Ok(None);
                }

                let raw_count = raw.len();
                let documents = state.assembler.convert_all(raw).await;
                if documents.is_empty() {
                    debug!("Dropping batch of {} items: nothing converted", raw_count);
                    continue;
                }

                debug!(
                    "Emitting batch of {} documents ({} raw items)",
                    documents.len(),
                    raw_count
                );
                return Ok(Some((documents, state)));
            }
        })
        .boxed()
    }

    async fn convert_all(&self, raw: Vec<DriveItem>) -> Vec<Document> {
        stream::iter(raw)
            .map(|item| {
                let converter = self.converter.clone();
                let owner = item
                    .owner_email()
                    .map(Principal::new)
                    .unwrap_or_else(|| self.fallback_owner.clone());
                tokio::spawn(async move {
                    let converted = converter.convert(&item, &owner).await;
                    (item.id, converted)
                })
            })
            .buffer_unordered(self.max_conversion_workers)
            .filter_map(|joined| async move {
                match joined {
                    Ok((_, Ok(document))) => document,
                    Ok((id, Err(e))) => {
                        error!("Error converting file '{}': {}", id, e);
                        None
                    }
                    Err(e) => {
                        error!("Conversion task failed: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await
    }

    /// Slim reference batches of at most `batch_size`.
    ///
    /// `heartbeat.should_stop()` is consulted before each batch is produced;
    /// a stop request ends the stream without an error. `progress` is called
    /// once for every emitted batch.
    pub fn slim(
        items: ItemStream,
        batch_size: usize,
        heartbeat: Option<Arc<dyn IndexingHeartbeat>>,
    ) -> SlimBatchStream {
        let state = SlimState {
            items,
            batch_size: batch_size.max(1),
            heartbeat,
        };

        stream::try_unfold(state, |mut state| async move {
            if let Some(heartbeat) = &state.heartbeat {
                if heartbeat.should_stop() {
                    info!("Stop signal detected, ending slim retrieval");
                    return Ok(None);
                }
            }

            let mut batch = Vec::new();
            while batch.len() < state.batch_size {
                match state.items.next().await {
                    Some(Ok(item)) => batch.extend(build_slim_document(&item)),
                    Some(Err(e)) => return Err(e),
                    None => break,
                }
            }

            if batch.is_empty() {
                return Ok(None);
            }

            if let Some(heartbeat) = &state.heartbeat {
                heartbeat.progress(SLIM_PROGRESS_TAG, 1);
            }
            Ok(Some((batch, state)))
        })
        .boxed()
    }
}

async fn next_chunk(items: &mut ItemStream, size: usize) -> Result<Vec<DriveItem>> {
    let mut chunk = Vec::with_capacity(size);
    while chunk.len() < size {
        match items.next().await {
            Some(Ok(item)) => chunk.push(item),
            Some(Err(e)) => return Err(e),
            None => break,
        }
    }
    Ok(chunk)
}

/// Permission-sync projection of a raw item.
///
/// The web view link is the document ID; items without one have no
/// indexable identity and project to nothing.
pub fn build_slim_document(item: &DriveItem) -> Option<SlimDocument> {
    let link = item.web_view_link.clone()?;

    Some(SlimDocument {
        id: link,
        perm_sync_data: PermissionSyncData {
            doc_id: item.id.clone(),
            drive_id: item.drive_id.clone(),
            permissions: item.permissions.clone(),
            permission_ids: item.permission_ids.clone(),
            owner_emails: item
                .owners
                .iter()
                .filter_map(|owner| owner.email_address.clone())
                .collect(),
        },
    })
}

/// [`IndexingHeartbeat`] driven by a cancellation token.
#[derive(Debug, Default)]
pub struct CancellationHeartbeat {
    token: CancellationToken,
    batches: AtomicUsize,
}

impl CancellationHeartbeat {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            batches: AtomicUsize::new(0),
        }
    }

    /// Total progress reported so far
    pub fn progress_count(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

impl IndexingHeartbeat for CancellationHeartbeat {
    fn should_stop(&self) -> bool {
        self.token.is_cancelled()
    }

    fn progress(&self, _tag: &str, amount: usize) {
        self.batches.fetch_add(amount, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::drive::ItemOwner;
    use bridge_traits::error::BridgeError;
    use crate::error::CrawlError;

    struct FailingOn(&'static str);

    #[async_trait]
    impl DocumentConverter for FailingOn {
        async fn convert(
            &self,
            item: &DriveItem,
            owner: &Principal,
        ) -> bridge_traits::error::Result<Option<Document>> {
            if item.id == self.0 {
                return Err(BridgeError::OperationFailed("unsupported".to_string()));
            }
            Ok(Some(Document {
                id: item.id.clone(),
                semantic_identifier: item.name.clone(),
                sections: Vec::new(),
                doc_updated_at: item.modified_at(),
                primary_owners: vec![owner.email().to_string()],
                metadata: Default::default(),
            }))
        }
    }

    fn item(id: &str) -> DriveItem {
        DriveItem {
            id: id.to_string(),
            name: format!("{id}.txt"),
            mime_type: "text/plain".to_string(),
            modified_time: None,
            web_view_link: Some(format!("https://drive.test/{id}")),
            drive_id: None,
            parents: Vec::new(),
            owners: Vec::new(),
            permissions: Vec::new(),
            permission_ids: Vec::new(),
        }
    }

    fn items(results: Vec<Result<DriveItem>>) -> ItemStream {
        stream::iter(results).boxed()
    }

    fn assembler(fail_on: &'static str, batch_size: usize) -> BatchAssembler {
        BatchAssembler::new(
            Arc::new(FailingOn(fail_on)),
            Principal::new("admin@example.com"),
            batch_size,
            4,
        )
    }

    #[tokio::test]
    async fn test_batches_respect_size() {
        let input = (0..5).map(|i| Ok(item(&format!("f{i}")))).collect();
        let batches: Vec<_> = assembler("none", 2)
            .documents(items(input))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|batch| batch.unwrap())
            .collect();

        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_failed_conversion_is_dropped() {
        let input = vec![Ok(item("good")), Ok(item("bad"))];
        let batches: Vec<_> = assembler("bad", 2)
            .documents(items(input))
            .collect::<Vec<_>>()
            .await;

        assert_eq!(batches.len(), 1);
        let batch = batches.into_iter().next().unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, "good");
    }

    #[tokio::test]
    async fn test_all_failed_batch_is_not_emitted() {
        let input = vec![Ok(item("bad")), Ok(item("ok"))];
        let batches: Vec<_> = assembler("bad", 1)
            .documents(items(input))
            .collect::<Vec<_>>()
            .await;

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].as_ref().unwrap()[0].id, "ok");
    }

    #[tokio::test]
    async fn test_owner_falls_back_to_admin() {
        let mut owned = item("owned");
        owned.owners = vec![ItemOwner {
            email_address: Some("alice@example.com".to_string()),
        }];
        let input = vec![Ok(owned), Ok(item("orphan"))];

        let mut documents: Vec<Document> = assembler("none", 2)
            .documents(items(input))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flat_map(|batch| batch.unwrap())
            .collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(documents[0].primary_owners, vec!["admin@example.com"]);
        assert_eq!(documents[1].primary_owners, vec!["alice@example.com"]);
    }

    #[tokio::test]
    async fn test_retrieval_error_is_surfaced() {
        let input = vec![Ok(item("a")), Err(CrawlError::Cancelled)];
        let batches: Vec<_> = assembler("none", 4)
            .documents(items(input))
            .collect::<Vec<_>>()
            .await;

        assert_eq!(batches.len(), 1);
        assert!(matches!(batches[0], Err(CrawlError::Cancelled)));
    }

    #[test]
    fn test_slim_projection() {
        let mut with_link = item("f1");
        with_link.owners = vec![ItemOwner {
            email_address: Some("alice@example.com".to_string()),
        }];
        with_link.permission_ids = vec!["p1".to_string()];

        let slim = build_slim_document(&with_link).unwrap();
        assert_eq!(slim.id, "https://drive.test/f1");
        assert_eq!(slim.perm_sync_data.doc_id, "f1");
        assert_eq!(slim.perm_sync_data.owner_emails, vec!["alice@example.com"]);

        let mut without_link = item("f2");
        without_link.web_view_link = None;
        assert!(build_slim_document(&without_link).is_none());
    }

    #[tokio::test]
    async fn test_slim_stops_between_batches() {
        let token = CancellationToken::new();
        let heartbeat = Arc::new(CancellationHeartbeat::new(token.clone()));
        let input = (0..6).map(|i| Ok(item(&format!("f{i}")))).collect();

        let mut batches = BatchAssembler::slim(items(input), 2, Some(heartbeat.clone()));

        let first = batches.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 2);

        token.cancel();
        assert!(batches.next().await.is_none());
        assert_eq!(heartbeat.progress_count(), 1);
    }

    #[tokio::test]
    async fn test_slim_skips_items_without_link() {
        let mut unlinked = item("f2");
        unlinked.web_view_link = None;
        let input = vec![Ok(item("f1")), Ok(unlinked), Ok(item("f3"))];

        let batches: Vec<_> = BatchAssembler::slim(items(input), 500, None)
            .collect::<Vec<_>>()
            .await;

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].as_ref().unwrap().len(), 2);
    }
}
