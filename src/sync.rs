//! Offline-first data synchronization
//!
//! Maintains a durable FIFO queue of outbound items and drains it in batches
//! to the remote endpoint. Every mutation is flushed to storage before the
//! call returns, so process death never loses acknowledged-but-unsent data.
//! Being offline is a soft condition reported in the [`SyncReport`], not an
//! error; failed batches stay queued for the next attempt.

use crate::config::ConfigManager;
use crate::error::IntegrationError;
use crate::scheduler::Scheduler;
use crate::storage::{StorageBackend, QUEUE_KEY};
use crate::transport::{SyncBatch, SyncEndpoint};
use crate::types::{HealthDataPoint, QueueStats, SyncQueueItem, SyncReport, SyncStatus};
use rand::Rng;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// First retry delay; doubles per attempt
const BACKOFF_BASE: Duration = Duration::from_millis(500);
/// Ceiling on any single backoff delay
const BACKOFF_CAP: Duration = Duration::from_secs(30);
/// Random jitter added to every backoff delay (milliseconds)
const BACKOFF_JITTER_MS: u64 = 250;

/// Durable outbound queue with batched delivery and retry
pub struct DataSynchronizer {
    endpoint: Arc<dyn SyncEndpoint>,
    storage: Arc<dyn StorageBackend>,
    config: Arc<ConfigManager>,
    queue: Mutex<VecDeque<SyncQueueItem>>,
    // Serializes drains so periodic, opportunistic, and manual syncs
    // never interleave on the same queue
    sync_lock: tokio::sync::Mutex<()>,
    scheduler: Scheduler,
    online_tx: watch::Sender<bool>,
    online_rx: watch::Receiver<bool>,
}

impl DataSynchronizer {
    /// Create a synchronizer, restoring any queue persisted by a previous
    /// session. A corrupt queue document is dropped with a warning rather
    /// than failing startup.
    pub async fn load(
        endpoint: Arc<dyn SyncEndpoint>,
        storage: Arc<dyn StorageBackend>,
        config: Arc<ConfigManager>,
    ) -> Self {
        let queue = match storage.read(QUEUE_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<SyncQueueItem>>(&raw) {
                Ok(items) => {
                    debug!(items = items.len(), "restored persisted sync queue");
                    items.into()
                }
                Err(e) => {
                    warn!(error = %e, "persisted sync queue is corrupt, starting empty");
                    VecDeque::new()
                }
            },
            Ok(None) => VecDeque::new(),
            Err(e) => {
                warn!(error = %e, "could not read persisted sync queue, starting empty");
                VecDeque::new()
            }
        };

        let (online_tx, online_rx) = watch::channel(true);
        Self {
            endpoint,
            storage,
            config,
            queue: Mutex::new(queue),
            sync_lock: tokio::sync::Mutex::new(()),
            scheduler: Scheduler::new(),
            online_tx,
            online_rx,
        }
    }

    /// Enqueue a health data point for delivery
    pub async fn enqueue_data_point(
        &self,
        point: &HealthDataPoint,
    ) -> Result<(), IntegrationError> {
        self.add_to_queue(SyncQueueItem::from_data_point(point)?).await
    }

    /// Enqueue an item, evicting the oldest entries past the queue ceiling.
    ///
    /// The queue is persisted before this returns. When online, an
    /// opportunistic drain runs immediately unless one is already in flight.
    pub async fn add_to_queue(&self, mut item: SyncQueueItem) -> Result<(), IntegrationError> {
        if item.id.is_empty() {
            item.id = Uuid::new_v4().to_string();
        }

        let max = self.config.configuration().max_cache_size as usize;
        {
            let mut queue = self.lock_queue()?;
            queue.push_back(item);
            while queue.len() > max {
                queue.pop_front();
            }
        }
        self.persist().await?;

        if self.is_online() {
            // Skip rather than pile up behind an in-flight drain
            if let Ok(_guard) = self.sync_lock.try_lock() {
                self.drain_queue().await;
            }
        }
        Ok(())
    }

    /// Drain the queue now and report the outcome.
    ///
    /// Offline is a soft failure: the report carries the reason and the
    /// queue is left intact.
    pub async fn sync_now(&self) -> SyncReport {
        let _guard = self.sync_lock.lock().await;
        self.drain_queue().await
    }

    async fn drain_queue(&self) -> SyncReport {
        if self.queue_size() == 0 {
            return SyncReport::synced(0);
        }
        if !self.is_online() {
            debug!("sync skipped, device is offline");
            return SyncReport::failed("Device is offline");
        }

        let config = self.config.configuration();
        let batch_size = (config.sync_batch_size as usize).max(1);
        let mut total_synced = 0;

        loop {
            let batch_items: Vec<SyncQueueItem> = match self.queue.lock() {
                Ok(queue) => queue.iter().take(batch_size).cloned().collect(),
                Err(_) => break,
            };
            if batch_items.is_empty() {
                break;
            }

            if self.deliver_with_retry(&batch_items, config.max_retry_attempts).await {
                // Remove by id, never by position: the queue front can shift
                // underneath an in-flight batch when concurrent enqueues
                // evict past the ceiling.
                let acked: HashSet<&str> = batch_items.iter().map(|i| i.id.as_str()).collect();
                if let Ok(mut queue) = self.queue.lock() {
                    queue.retain(|item| !acked.contains(item.id.as_str()));
                }
                total_synced += batch_items.len();
                if let Err(e) = self.persist().await {
                    warn!(error = %e, "queue persistence failed after batch");
                }
            } else {
                // Undelivered items stay queued for the next drain
                return SyncReport {
                    success: false,
                    synced_count: total_synced,
                    error: Some("batch delivery failed after all retries".to_string()),
                };
            }
        }

        info!(synced = total_synced, "sync complete");
        SyncReport::synced(total_synced)
    }

    /// Submit one batch, retrying with exponential backoff and jitter
    async fn deliver_with_retry(&self, items: &[SyncQueueItem], max_attempts: u32) -> bool {
        for attempt in 0..max_attempts.max(1) {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            let batch = SyncBatch::new(items);
            match self.endpoint.submit(&batch).await {
                Ok(ack) if ack.success => return true,
                Ok(ack) => {
                    warn!(
                        attempt,
                        batch_id = %batch.batch_id,
                        error = ack.error.as_deref().unwrap_or("rejected"),
                        "batch rejected by endpoint"
                    );
                }
                Err(e) => {
                    warn!(attempt, batch_id = %batch.batch_id, error = %e, "batch submit failed");
                }
            }
        }
        false
    }

    /// Start (or replace) the periodic drain. A new interval always replaces
    /// the previous timer, never stacks on it.
    pub fn start_periodic_sync(self: &Arc<Self>, interval_minutes: u32) {
        let period = Duration::from_secs(u64::from(interval_minutes.max(1)) * 60);
        let this = Arc::clone(self);
        self.scheduler.start(period, move || {
            let this = Arc::clone(&this);
            async move {
                if this.is_online() && this.queue_size() > 0 {
                    this.sync_now().await;
                }
            }
        });
        info!(interval_minutes, "periodic sync started");
    }

    /// Stop the periodic drain. Idempotent.
    pub fn stop_periodic_sync(&self) {
        self.scheduler.stop();
    }

    /// Report a connectivity change. A transition back online triggers an
    /// immediate drain of anything queued while offline.
    pub async fn set_connectivity(&self, online: bool) {
        let was_online = *self.online_rx.borrow();
        let _ = self.online_tx.send(online);

        if online && !was_online && self.queue_size() > 0 {
            info!("connectivity restored, draining offline queue");
            self.sync_now().await;
        }
    }

    /// Online means connectivity is up and offline mode is not configured
    pub fn is_online(&self) -> bool {
        *self.online_rx.borrow() && !self.config.configuration().offline_mode
    }

    pub fn queue_size(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Snapshot of queue composition for diagnostics
    pub fn queue_stats(&self) -> QueueStats {
        let queue = match self.queue.lock() {
            Ok(queue) => queue,
            Err(_) => {
                return QueueStats {
                    size: 0,
                    counts_by_type: HashMap::new(),
                    oldest_enqueued_at: None,
                    newest_enqueued_at: None,
                }
            }
        };

        let mut counts_by_type: HashMap<String, usize> = HashMap::new();
        for item in queue.iter() {
            *counts_by_type.entry(item.item_type.clone()).or_insert(0) += 1;
        }
        QueueStats {
            size: queue.len(),
            counts_by_type,
            oldest_enqueued_at: queue.front().map(|i| i.enqueued_at),
            newest_enqueued_at: queue.back().map(|i| i.enqueued_at),
        }
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            online: self.is_online(),
            periodic_sync_active: self.scheduler.is_running(),
            queue: self.queue_stats(),
        }
    }

    /// Stop timers and flush the queue to storage
    pub async fn shutdown(&self) {
        self.stop_periodic_sync();
        if let Err(e) = self.persist().await {
            warn!(error = %e, "queue flush on shutdown failed");
        }
    }

    async fn persist(&self) -> Result<(), IntegrationError> {
        let snapshot: Vec<SyncQueueItem> = self
            .queue
            .lock()
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default();
        let raw = serde_json::to_string(&snapshot)?;
        self.storage.write(QUEUE_KEY, &raw).await
    }

    fn lock_queue(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, VecDeque<SyncQueueItem>>, IntegrationError> {
        self.queue
            .lock()
            .map_err(|_| IntegrationError::Storage("sync queue poisoned".to_string()))
    }
}

/// Exponential backoff with random jitter, capped
fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..BACKOFF_JITTER_MS));
    exp.min(BACKOFF_CAP) + jitter
}
