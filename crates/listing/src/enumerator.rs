//! Enumerator trait and the context handed to it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Work done so far versus work discovered so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub processed: u64,
    pub total: u64,
}

impl Progress {
    pub fn new(processed: u64, total: u64) -> Self {
        Self { processed, total }
    }

    /// Integer percentage in [0, 100]. Nothing discovered yet reads as 0.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = self.processed.min(self.total).saturating_mul(100) / self.total;
        pct as u8
    }
}

/// Callback through which an enumerator reports progress.
///
/// Safe to call from the enumerator's task; the receiving side does O(1)
/// work under a single record lock.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn Fn(Progress) + Send + Sync>,
}

impl ProgressReporter {
    pub fn new(sink: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        Self { sink: Arc::new(sink) }
    }

    /// A reporter that discards everything.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn report(&self, processed: u64, total: u64) {
        (self.sink)(Progress::new(processed, total));
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressReporter")
    }
}

/// Per-job handles passed to every [`Enumerator`] call.
#[derive(Debug, Clone)]
pub struct ListingContext {
    cancel: CancellationToken,
    progress: ProgressReporter,
    max_results: usize,
}

impl ListingContext {
    pub fn new(cancel: CancellationToken, progress: ProgressReporter, max_results: usize) -> Self {
        Self {
            cancel,
            progress,
            max_results,
        }
    }

    /// Whether the job has been asked to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The token itself, for enumerators that `select!` on it while blocked.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn report_progress(&self, processed: u64, total: u64) {
        self.progress.report(processed, total);
    }

    /// How many items the job will keep in the end.
    pub fn max_results(&self) -> usize {
        self.max_results
    }
}

/// Walks one collection for one job.
///
/// Enumerators are single-use: once `next_batch` returns `Ok(None)` the walk is
/// over, and re-running it means submitting a new job. Implementations must
/// return from `next_batch` within a bounded time so cancellation, which the
/// manager checks between batches, takes effect promptly. They only read the
/// collection they walk; errors are returned, never patched over.
#[async_trait]
pub trait Enumerator: Send {
    type Item: Clone + Send + Sync + 'static;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }

    /// Prepare the walk. An error here is recorded as a launch failure.
    async fn start(&mut self, _ctx: &ListingContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Produce the next batch, or `None` once the collection is exhausted.
    async fn next_batch(&mut self, ctx: &ListingContext) -> anyhow::Result<Option<Vec<Self::Item>>>;

    /// Shrink `items` to at most `max`, keeping the ones that matter most.
    ///
    /// The default keeps the first `max` in enumeration order.
    fn retain(&self, items: &mut Vec<Self::Item>, max: usize) {
        items.truncate(max);
    }
}
