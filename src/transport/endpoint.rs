//! Remote sync endpoint seam
//!
//! Defines the batched wire payload submitted to the remote service and the
//! acknowledgement shape it answers with. A non-success acknowledgement with
//! no transport error still counts as a failed batch eligible for retry.

use crate::error::IntegrationError;
use crate::types::SyncQueueItem;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// One item inside a batch payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub device_id: Option<String>,
}

impl From<&SyncQueueItem> for BatchItem {
    fn from(item: &SyncQueueItem) -> Self {
        Self {
            id: item.id.clone(),
            item_type: item.item_type.clone(),
            data: item.payload.clone(),
            timestamp: item.enqueued_at,
            device_id: item.device_id.clone(),
        }
    }
}

/// Batched JSON payload submitted to the remote endpoint as one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBatch {
    pub items: Vec<BatchItem>,
    pub batch_id: String,
    pub timestamp: DateTime<Utc>,
}

impl SyncBatch {
    pub fn new(items: &[SyncQueueItem]) -> Self {
        Self {
            items: items.iter().map(BatchItem::from).collect(),
            batch_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Acknowledgement from the remote endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncAck {
    pub success: bool,
    pub error: Option<String>,
}

/// Remote delivery seam for the synchronizer
#[async_trait]
pub trait SyncEndpoint: Send + Sync {
    /// Submit one batch. `Err` models a transport fault; an ack with
    /// `success: false` models a rejection by the service.
    async fn submit(&self, batch: &SyncBatch) -> Result<SyncAck, IntegrationError>;
}

/// Simulated endpoint with scriptable failures
///
/// Records every submitted batch and can be told to reject the next N
/// submissions, which is how the retry/backoff paths are exercised.
#[derive(Default)]
pub struct SimulatedEndpoint {
    received: Mutex<Vec<SyncBatch>>,
    failures_remaining: AtomicUsize,
}

impl SimulatedEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `n` submissions with a non-success ack
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Batches accepted or rejected so far
    pub fn received(&self) -> Vec<SyncBatch> {
        self.received
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Total items across all acknowledged batches
    pub fn acknowledged_items(&self) -> usize {
        self.received().iter().map(|b| b.items.len()).sum()
    }
}

#[async_trait]
impl SyncEndpoint for SimulatedEndpoint {
    async fn submit(&self, batch: &SyncBatch) -> Result<SyncAck, IntegrationError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Ok(SyncAck {
                success: false,
                error: Some("simulated server error".to_string()),
            });
        }

        if let Ok(mut received) = self.received.lock() {
            received.push(batch.clone());
        }
        Ok(SyncAck {
            success: true,
            error: None,
        })
    }
}
