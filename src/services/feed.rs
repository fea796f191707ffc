use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::MatchBuckets;
use crate::services::match_store::{MatchStore, MatchStoreError};
use crate::services::retry::{with_retry, RetryPolicy};

/// Errors that can occur while maintaining a live match feed
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Store error: {0}")]
    StoreError(#[from] MatchStoreError),
}

/// Current view of a tenant's match buckets plus staleness metadata.
///
/// `fetched_at` is `None` until the first successful refresh. `last_error`
/// carries the advisory message for the most recent exhausted retry; the
/// buckets themselves stay at the previous known-good state.
#[derive(Debug, Clone, Default)]
pub struct MatchSnapshot {
    pub buckets: Arc<MatchBuckets>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Orders refetches of one resource with monotonically increasing sequence
/// numbers.
///
/// A fetch result is applied only if no newer fetch has been issued and
/// applied in the meantime; stale results are discarded silently.
#[derive(Debug, Default)]
pub struct RefreshGate {
    issued: AtomicU64,
    applied: AtomicU64,
}

impl RefreshGate {
    /// Register a new fetch and return its sequence number.
    pub fn begin(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether `seq` is still the most recently issued fetch.
    pub fn is_current(&self, seq: u64) -> bool {
        self.issued.load(Ordering::SeqCst) == seq
    }

    /// Try to apply the result of fetch `seq`. Returns false when a newer
    /// fetch already applied, in which case the result must be dropped.
    pub fn commit(&self, seq: u64) -> bool {
        self.applied.fetch_max(seq, Ordering::SeqCst) < seq
    }
}

struct TenantFeed {
    tenant_id: Uuid,
    gate: RefreshGate,
    fetch_lock: tokio::sync::Mutex<()>,
    snapshot_tx: watch::Sender<MatchSnapshot>,
}

struct FeedEntry {
    feed: Arc<TenantFeed>,
    refs: usize,
    listener: JoinHandle<()>,
}

/// Reference-counted bookkeeping for the per-tenant feeds. All map access
/// happens under one sync lock, never held across an await.
struct FeedRegistry {
    feeds: Mutex<HashMap<Uuid, FeedEntry>>,
}

impl FeedRegistry {
    fn new() -> Self {
        Self {
            feeds: Mutex::new(HashMap::new()),
        }
    }

    /// Join an already-live feed, incrementing its reference count.
    fn join(&self, tenant_id: Uuid) -> Option<Arc<TenantFeed>> {
        let mut feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);
        feeds.get_mut(&tenant_id).map(|entry| {
            entry.refs += 1;
            Arc::clone(&entry.feed)
        })
    }

    /// Join the feed if a concurrent caller started it first, otherwise run
    /// `start` and register the result with one reference.
    fn join_or_start(
        &self,
        tenant_id: Uuid,
        start: impl FnOnce() -> (Arc<TenantFeed>, JoinHandle<()>),
    ) -> Arc<TenantFeed> {
        let mut feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = feeds.get_mut(&tenant_id) {
            entry.refs += 1;
            return Arc::clone(&entry.feed);
        }

        let (feed, listener) = start();
        feeds.insert(
            tenant_id,
            FeedEntry {
                feed: Arc::clone(&feed),
                refs: 1,
                listener,
            },
        );
        tracing::debug!(%tenant_id, "Started live match feed");
        feed
    }

    fn release(&self, tenant_id: Uuid) {
        let mut feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);

        let drained = match feeds.get_mut(&tenant_id) {
            Some(entry) => {
                entry.refs -= 1;
                entry.refs == 0
            }
            None => false,
        };

        if drained {
            if let Some(entry) = feeds.remove(&tenant_id) {
                entry.listener.abort();
                tracing::debug!(%tenant_id, "Last feed consumer released, subscription torn down");
            }
        }
    }

    fn len(&self) -> usize {
        self.feeds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

struct FeedManagerInner {
    store: Arc<MatchStore>,
    retry: RetryPolicy,
    feeds: FeedRegistry,
}

/// Shares one live bucket view and one change subscription per tenant across
/// any number of consumers.
///
/// `acquire` increments a reference count and lazily starts the realtime
/// subscription; dropping the last handle tears it down. This replaces the
/// legacy pattern of a global mutable cache with hand-managed subscriber
/// sets.
pub struct MatchFeedManager {
    inner: Arc<FeedManagerInner>,
}

impl MatchFeedManager {
    pub fn new(store: Arc<MatchStore>, retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(FeedManagerInner {
                store,
                retry,
                feeds: FeedRegistry::new(),
            }),
        }
    }

    /// Join (or start) the live feed for a tenant and load an initial
    /// snapshot.
    ///
    /// A failed initial refresh still yields a usable handle: the snapshot
    /// carries the advisory error and the next change event or manual
    /// refresh repairs it.
    pub async fn acquire(&self, tenant_id: Uuid) -> Result<FeedHandle, FeedError> {
        let feed = match self.inner.feeds.join(tenant_id) {
            Some(feed) => feed,
            None => {
                // Subscribe outside the registry lock, then re-check under
                // it: a concurrent acquire may have started the feed in the
                // meantime, in which case this extra subscription is simply
                // dropped.
                let stream = self.inner.store.listen(tenant_id).await?;
                let store = Arc::clone(&self.inner.store);
                let retry = self.inner.retry.clone();

                self.inner.feeds.join_or_start(tenant_id, move || {
                    let (snapshot_tx, _) = watch::channel(MatchSnapshot::default());
                    let feed = Arc::new(TenantFeed {
                        tenant_id,
                        gate: RefreshGate::default(),
                        fetch_lock: tokio::sync::Mutex::new(()),
                        snapshot_tx,
                    });
                    let listener =
                        tokio::spawn(drive_feed(stream, store, retry, Arc::clone(&feed)));
                    (feed, listener)
                })
            }
        };

        let handle = FeedHandle {
            inner: Arc::clone(&self.inner),
            feed,
        };

        if let Err(e) = handle.refresh().await {
            tracing::warn!(%tenant_id, "Initial feed refresh failed: {}", e);
        }

        Ok(handle)
    }

    /// Number of tenants with a live subscription, for diagnostics.
    pub fn live_feeds(&self) -> usize {
        self.inner.feeds.len()
    }
}

/// Listener loop: every change event for the tenant triggers a coalesced
/// refetch of the buckets.
async fn drive_feed(
    mut stream: crate::services::match_store::MatchChangeStream,
    store: Arc<MatchStore>,
    retry: RetryPolicy,
    feed: Arc<TenantFeed>,
) {
    while let Some(change) = stream.rx.recv().await {
        tracing::debug!(
            tenant_id = %feed.tenant_id,
            op = ?change.op,
            record_id = %change.record_id,
            "Match change received, refreshing feed"
        );
        if let Err(e) = run_refresh(&store, &retry, &feed).await {
            tracing::warn!(tenant_id = %feed.tenant_id, "Feed refresh after change failed: {}", e);
        }
    }
}

async fn run_refresh(
    store: &MatchStore,
    retry: &RetryPolicy,
    feed: &TenantFeed,
) -> Result<(), FeedError> {
    let seq = feed.gate.begin();

    // At most one outstanding fetch per tenant; queued triggers collapse
    // into whichever fetch runs next.
    let _guard = feed.fetch_lock.lock().await;
    if !feed.gate.is_current(seq) {
        tracing::trace!(tenant_id = %feed.tenant_id, seq, "Refresh superseded before fetch, skipping");
        return Ok(());
    }

    let now = Utc::now();
    match with_retry(retry, "fetch match buckets", || {
        store.buckets(feed.tenant_id, now)
    })
    .await
    {
        Ok(buckets) => {
            if feed.gate.commit(seq) {
                feed.snapshot_tx.send_replace(MatchSnapshot {
                    buckets: Arc::new(buckets),
                    fetched_at: Some(now),
                    last_error: None,
                });
            }
            Ok(())
        }
        Err(e) => {
            // Keep the previous known-good buckets; the error is advisory.
            feed.snapshot_tx
                .send_modify(|snap| snap.last_error = Some(e.to_string()));
            Err(e.into())
        }
    }
}

/// One consumer's handle on a tenant's live feed. Dropping it releases the
/// reference; the subscription ends with the last handle.
pub struct FeedHandle {
    inner: Arc<FeedManagerInner>,
    feed: Arc<TenantFeed>,
}

impl FeedHandle {
    pub fn tenant_id(&self) -> Uuid {
        self.feed.tenant_id
    }

    /// Current snapshot, including its staleness timestamp.
    pub fn snapshot(&self) -> MatchSnapshot {
        self.feed.snapshot_tx.borrow().clone()
    }

    /// Watch for snapshot updates without polling.
    pub fn subscribe(&self) -> watch::Receiver<MatchSnapshot> {
        self.feed.snapshot_tx.subscribe()
    }

    /// Force a refetch, e.g. on the periodic refresh timer.
    pub async fn refresh(&self) -> Result<(), FeedError> {
        run_refresh(&self.inner.store, &self.inner.retry, &self.feed).await
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.inner.feeds.release(self.feed.tenant_id);
    }
}
