use crate::browser::{Driver, DriverError};
use crate::enrich::detail::{DetailFields, parse_detail_documents};
use crate::outcome::Outcome;
use crate::utils::fmt_duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, trace, warn};
use url::Url;

/// Visits slower than this are logged at warn.
const SLOW_VISIT: Duration = Duration::from_secs(10);

/// One eligible record: its position in the extracted list and its detail URL.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub index: usize,
    pub url: String,
}

/// Work shared by every worker. Each index is handed out exactly once.
#[derive(Debug)]
pub struct WorkQueue {
    items: Vec<WorkItem>,
    cursor: AtomicUsize,
}

impl WorkQueue {
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next unvisited item; `None` once the queue is drained.
    pub fn claim(&self) -> Option<&WorkItem> {
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(slot)
    }
}

/// What a worker produced before it stopped.
#[derive(Debug, Default)]
pub struct WorkerOutput {
    pub visited: usize,
    pub failed: usize,
    /// Record index and the fields its detail page resolved.
    pub merges: Vec<(usize, DetailFields)>,
}

/// A single enrichment worker owning one tab.
pub struct Worker {
    id: usize,
    driver: Box<dyn Driver>,
    visit_timeout: Duration,
    idle_timeout: Duration,
}

impl Worker {
    pub fn new(
        id: usize,
        driver: Box<dyn Driver>,
        visit_timeout: Duration,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            id,
            driver,
            visit_timeout,
            idle_timeout,
        }
    }

    /// Claim and visit items until the queue drains or `cancel` fires. An
    /// in-flight visit is abandoned on cancellation; finished merges are kept.
    pub async fn run(self, queue: Arc<WorkQueue>, cancel: CancellationToken) -> WorkerOutput {
        let span = tracing::info_span!("enrich_worker", worker_id = self.id);
        let output = self.work(&queue, &cancel).instrument(span).await;

        if let Err(e) = self.driver.close().await {
            debug!(error = %e, "failed to close worker tab");
        }
        output
    }

    async fn work(&self, queue: &WorkQueue, cancel: &CancellationToken) -> WorkerOutput {
        debug!("worker started");
        let mut output = WorkerOutput::default();

        loop {
            if cancel.is_cancelled() {
                info!(visited = output.visited, "run deadline reached, worker stopping");
                break;
            }
            let Some(item) = queue.claim() else {
                trace!("queue drained");
                break;
            };

            let start = Instant::now();
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(index = item.index, "run deadline reached during visit, abandoning it");
                    break;
                }
                outcome = self.visit(&item.url) => outcome,
            };
            let elapsed = start.elapsed();
            output.visited += 1;

            if elapsed > SLOW_VISIT {
                warn!(index = item.index, duration = fmt_duration(elapsed), "slow detail visit");
            }

            match outcome {
                Outcome::Success(fields) => {
                    debug!(index = item.index, duration = fmt_duration(elapsed), "detail enriched");
                    output.merges.push((item.index, fields));
                }
                other => {
                    debug!(
                        index = item.index,
                        url = %item.url,
                        outcome = other.label(),
                        "detail visit produced nothing"
                    );
                    output.failed += 1;
                }
            }
        }

        debug!(visited = output.visited, failed = output.failed, "worker finished");
        output
    }

    /// Load one detail page and parse it. `Empty` when nothing was parsable.
    async fn visit(&self, url: &str) -> Outcome<DetailFields> {
        Outcome::bounded(self.visit_timeout, async {
            self.driver.goto(url).await?;
            if !self.driver.wait_for_idle(self.idle_timeout).await? {
                trace!(url, "detail page never went idle, parsing anyway");
            }
            let documents = self.driver.documents().await?;
            let base = Url::parse(url).map_err(|e| DriverError::NavigationFailed {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;
            let fields = parse_detail_documents(&documents, &base);
            Ok((!fields.is_empty()).then_some(fields))
        })
        .await
    }
}
