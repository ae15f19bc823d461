//! # Traversal Ledger
//!
//! Run-scoped record of which containers (personal drive roots, shared
//! drives, folders) have already been traversed.
//!
//! Every retriever of a run shares one ledger. A container moves through
//! three states:
//!
//! - **in flight**: one retriever holds the claim and is listing it; others
//!   wait for the outcome instead of listing it in parallel
//! - **visited**: its first page listed successfully; nobody lists it again
//! - **refused**: a principal was denied access; the claim is released so
//!   another principal can try, and the container only counts as
//!   unreachable while nobody has visited it
//!
//! `visited` only ever grows.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

#[derive(Debug, Default)]
struct LedgerState {
    visited: HashSet<String>,
    in_flight: HashSet<String>,
    refused: HashSet<String>,
}

/// Outcome of trying to claim a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller now holds the claim and must list the container
    Acquired,
    /// Already traversed
    Visited,
    /// Another retriever is listing it right now
    InFlight,
}

/// Shared record of traversed container IDs.
///
/// Cloning is cheap and yields a handle to the same ledger.
#[derive(Debug, Clone, Default)]
pub struct TraversalLedger {
    state: Arc<Mutex<LedgerState>>,
    settled: Arc<Notify>,
}

impl TraversalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once the container has been traversed
    pub async fn contains(&self, id: &str) -> bool {
        self.state.lock().await.visited.contains(id)
    }

    /// Record a container as traversed without a claim (personal drive roots,
    /// folders covered by a flat drive listing).
    pub async fn mark_visited(&self, id: impl Into<String>) {
        let id = id.into();
        let mut state = self.state.lock().await;
        if state.in_flight.remove(&id) {
            self.settled.notify_waiters();
        }
        state.visited.insert(id);
    }

    /// Atomic test-and-set against both visited and in-flight containers.
    pub async fn claim(&self, id: &str) -> Claim {
        let mut state = self.state.lock().await;
        if state.visited.contains(id) {
            Claim::Visited
        } else if !state.in_flight.insert(id.to_string()) {
            Claim::InFlight
        } else {
            Claim::Acquired
        }
    }

    /// Claim a container, waiting out any listing of it already in flight.
    ///
    /// Returns `true` when the caller should list the container, `false` when
    /// another retriever traversed it.
    pub async fn acquire(&self, id: &str) -> bool {
        loop {
            let settled = self.settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();

            match self.claim(id).await {
                Claim::Acquired => return true,
                Claim::Visited => return false,
                Claim::InFlight => settled.await,
            }
        }
    }

    /// The claimed container's first page listed successfully.
    pub async fn complete(&self, id: &str) {
        self.mark_visited(id).await;
    }

    /// The claimed container refused the current principal. The claim is
    /// dropped so another principal can try it.
    pub async fn release_refused(&self, id: &str) {
        let mut state = self.state.lock().await;
        state.in_flight.remove(id);
        state.refused.insert(id.to_string());
        self.settled.notify_waiters();
    }

    /// Drop a claim without a verdict (failed or abandoned listing).
    pub async fn release(&self, id: &str) {
        let mut state = self.state.lock().await;
        if state.in_flight.remove(id) {
            self.settled.notify_waiters();
        }
    }

    /// Containers refused to every principal that tried them
    pub async fn unreachable_ids(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut ids: Vec<String> = state
            .refused
            .iter()
            .filter(|id| !state.visited.contains(id.as_str()))
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// IDs from `ids` that nobody has traversed yet.
    ///
    /// Refused and in-flight containers are included; the claim taken at
    /// listing time decides who lists them.
    pub async fn remaining<'a, I>(&self, ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let state = self.state.lock().await;
        ids.into_iter()
            .filter(|id| !state.visited.contains(id.as_str()))
            .cloned()
            .collect()
    }

    /// Requested IDs that no principal managed to list.
    pub async fn gaps<'a, I>(&self, requested: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut gaps = self.remaining(requested).await;
        gaps.sort();
        gaps.dedup();
        gaps
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.visited.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.visited.is_empty()
    }

    /// Sorted copy of every visited ID
    pub async fn snapshot(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().await.visited.iter().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_claim_is_test_and_set() {
        let ledger = TraversalLedger::new();

        assert_eq!(ledger.claim("D1").await, Claim::Acquired);
        assert_eq!(ledger.claim("D1").await, Claim::InFlight);
        assert!(!ledger.contains("D1").await, "in flight is not visited");

        ledger.complete("D1").await;
        assert_eq!(ledger.claim("D1").await, Claim::Visited);
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_mark_visited_blocks_later_claims() {
        let ledger = TraversalLedger::new();
        ledger.mark_visited("F1").await;

        assert_eq!(ledger.claim("F1").await, Claim::Visited);
        assert!(!ledger.acquire("F1").await);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let ledger = TraversalLedger::new();
        let other = ledger.clone();

        other.mark_visited("F1").await;
        assert!(ledger.contains("F1").await);
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let ledger = TraversalLedger::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move { ledger.claim("D1").await }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() == Claim::Acquired {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_refused_claim_is_released_for_other_principals() {
        let ledger = TraversalLedger::new();

        assert!(ledger.acquire("D1").await);
        ledger.release_refused("D1").await;
        assert_eq!(ledger.unreachable_ids().await, vec!["D1"]);

        assert!(ledger.acquire("D1").await, "a second principal may try");
        ledger.complete("D1").await;
        assert!(ledger.unreachable_ids().await.is_empty());
        assert!(!ledger.acquire("D1").await);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_in_flight_listing() {
        let ledger = TraversalLedger::new();
        assert_eq!(ledger.claim("D1").await, Claim::Acquired);

        let waiter = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.acquire("D1").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        ledger.release_refused("D1").await;
        assert!(waiter.await.unwrap(), "released claim passes to the waiter");
    }

    #[tokio::test]
    async fn test_release_without_verdict_is_not_unreachable() {
        let ledger = TraversalLedger::new();
        assert!(ledger.acquire("F1").await);
        ledger.release("F1").await;

        assert!(ledger.unreachable_ids().await.is_empty());
        assert_eq!(ledger.claim("F1").await, Claim::Acquired);
    }

    #[tokio::test]
    async fn test_gaps_follow_successful_listings_only() {
        let ledger = TraversalLedger::new();
        ledger.mark_visited("D1").await;
        ledger.claim("F1").await;
        ledger.release_refused("F1").await;

        let requested = vec!["D1".to_string(), "F1".to_string(), "F2".to_string()];
        assert_eq!(ledger.gaps(&requested).await, vec!["F1", "F2"]);
        assert_eq!(ledger.remaining(&requested).await, vec!["F1", "F2"]);
        assert_eq!(ledger.unreachable_ids().await, vec!["F1"]);
    }
}
