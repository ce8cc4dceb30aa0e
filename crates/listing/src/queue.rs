//! Reference enumerator over an in-memory queue.
//!
//! [`QueueEnumerator`] walks a snapshot of the queue taken when the job starts,
//! so producers appending concurrently neither block the walk nor shift the
//! progress estimate. Items come back in queue order, which is also the order
//! [`Enumerator::retain`] keeps when the result cap is hit.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enumerator::{Enumerator, ListingContext};

/// Summary of one queued item, as returned in listing results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItemSummary {
    pub uuid: Uuid,
    #[serde(default)]
    pub filename: String,
    /// 1-based position in the queue.
    #[serde(default)]
    pub position: u64,
    /// Content size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Time spent in this queue.
    #[serde(default)]
    pub queued_duration_ms: u64,
    /// Time since the item entered the flow.
    #[serde(default)]
    pub lineage_duration_ms: u64,
    /// Whether the item is being held back from processing.
    #[serde(default)]
    pub penalized: bool,
}

enum QueueSource<T> {
    Snapshot(Vec<T>),
    Shared(Arc<RwLock<VecDeque<T>>>),
}

pub struct QueueEnumerator<T> {
    source: QueueSource<T>,
    items: Vec<T>,
    cursor: usize,
    batch_size: usize,
}

impl<T: Clone> QueueEnumerator<T> {
    /// Walk a fixed list of items.
    pub fn new(items: Vec<T>, batch_size: usize) -> Self {
        Self::with_source(QueueSource::Snapshot(items), batch_size)
    }

    /// Walk a live queue; its contents are copied when the job starts.
    pub fn from_shared(queue: Arc<RwLock<VecDeque<T>>>, batch_size: usize) -> Self {
        Self::with_source(QueueSource::Shared(queue), batch_size)
    }

    fn with_source(source: QueueSource<T>, batch_size: usize) -> Self {
        Self {
            source,
            items: Vec::new(),
            cursor: 0,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Enumerator for QueueEnumerator<T> {
    type Item = T;

    fn name(&self) -> &str {
        "queue"
    }

    async fn start(&mut self, ctx: &ListingContext) -> anyhow::Result<()> {
        self.items = match &mut self.source {
            QueueSource::Snapshot(items) => std::mem::take(items),
            QueueSource::Shared(queue) => {
                let queue = queue.read().unwrap_or_else(PoisonError::into_inner);
                queue.iter().cloned().collect()
            }
        };
        self.cursor = 0;
        ctx.report_progress(0, self.items.len() as u64);
        Ok(())
    }

    async fn next_batch(&mut self, ctx: &ListingContext) -> anyhow::Result<Option<Vec<T>>> {
        let total = self.items.len();
        if self.cursor >= total {
            return Ok(None);
        }

        let end = (self.cursor + self.batch_size).min(total);
        let batch = self.items[self.cursor..end].to_vec();
        self.cursor = end;
        ctx.report_progress(end as u64, total as u64);

        // Let pollers and cancel requests in between batches.
        tokio::task::yield_now().await;
        Ok(Some(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use tokio_util::sync::CancellationToken;

    use crate::enumerator::{Progress, ProgressReporter};

    fn ctx_with_log() -> (ListingContext, Arc<Mutex<Vec<Progress>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let ctx = ListingContext::new(
            CancellationToken::new(),
            ProgressReporter::new(move |p| sink.lock().unwrap().push(p)),
            100,
        );
        (ctx, log)
    }

    async fn drain<E: Enumerator>(e: &mut E, ctx: &ListingContext) -> Vec<Vec<E::Item>> {
        e.start(ctx).await.unwrap();
        let mut batches = Vec::new();
        while let Some(batch) = e.next_batch(ctx).await.unwrap() {
            batches.push(batch);
        }
        batches
    }

    #[tokio::test]
    async fn test_batches_in_queue_order() {
        let (ctx, log) = ctx_with_log();
        let mut e = QueueEnumerator::new((1..=5).collect::<Vec<u32>>(), 2);
        let batches = drain(&mut e, &ctx).await;

        assert_eq!(batches, vec![vec![1, 2], vec![3, 4], vec![5]]);
        let percents: Vec<u8> = log.lock().unwrap().iter().map(|p| p.percent()).collect();
        assert_eq!(percents, vec![0, 40, 80, 100]);
    }

    #[tokio::test]
    async fn test_empty_queue_finishes_immediately() {
        let (ctx, _log) = ctx_with_log();
        let mut e = QueueEnumerator::<u32>::new(Vec::new(), 10);
        assert!(drain(&mut e, &ctx).await.is_empty());
        assert!(e.next_batch(&ctx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shared_queue_is_snapshotted_at_start() {
        let queue = Arc::new(RwLock::new(VecDeque::from(vec![1u32, 2, 3])));
        let (ctx, _log) = ctx_with_log();
        let mut e = QueueEnumerator::from_shared(queue.clone(), 2);
        e.start(&ctx).await.unwrap();

        queue.write().unwrap().push_back(4);
        let mut seen = Vec::new();
        while let Some(batch) = e.next_batch(&ctx).await.unwrap() {
            seen.extend(batch);
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(queue.read().unwrap().len(), 4, "queue itself is not consumed");
    }

    #[test]
    fn test_item_summary_defaults_and_names() {
        let json = r#"{"uuid":"00000000-0000-0000-0000-000000000001","filename":"a.txt","queuedDurationMs":12}"#;
        let item: QueueItemSummary = serde_json::from_str(json).unwrap();
        assert_eq!(item.filename, "a.txt");
        assert_eq!(item.queued_duration_ms, 12);
        assert_eq!(item.position, 0);
        assert!(!item.penalized);

        let out = serde_json::to_string(&item).unwrap();
        assert!(out.contains("lineageDurationMs"));
    }
}
