//! Enrichment pool: visits every record's detail page with bounded
//! concurrency and merges ownership/clause data back by index.

pub mod detail;
pub mod worker;

use crate::browser::TabSource;
use crate::models::Record;
use crate::utils::fmt_duration;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use worker::{WorkItem, WorkQueue, Worker, WorkerOutput};

/// Counters for one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub eligible: usize,
    pub workers: usize,
    pub visited: usize,
    pub enriched: usize,
    pub failed: usize,
}

pub struct EnrichmentPool {
    tabs: Arc<dyn TabSource>,
    concurrency: usize,
    visit_timeout: Duration,
    idle_timeout: Duration,
}

impl EnrichmentPool {
    pub fn new(
        tabs: Arc<dyn TabSource>,
        concurrency: usize,
        visit_timeout: Duration,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            tabs,
            concurrency,
            visit_timeout,
            idle_timeout,
        }
    }

    /// Enrich `records` in place. Order and length never change; a record
    /// whose visit fails is left as extracted.
    pub async fn enrich(
        &self,
        records: &mut [Record],
        cancel: &CancellationToken,
    ) -> EnrichmentReport {
        let items: Vec<WorkItem> = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                record.detail_url.clone().map(|url| WorkItem { index, url })
            })
            .collect();

        let mut report = EnrichmentReport {
            eligible: items.len(),
            ..EnrichmentReport::default()
        };
        if items.is_empty() {
            info!("no records with detail pages, skipping enrichment");
            return report;
        }

        let wanted = self.concurrency.clamp(1, items.len());
        let start = Instant::now();
        let queue = Arc::new(WorkQueue::new(items));

        let mut handles = Vec::with_capacity(wanted);
        for id in 0..wanted {
            let driver = match self.tabs.new_tab().await {
                Ok(driver) => driver,
                Err(e) => {
                    warn!(worker_id = id, error = %e, "could not open worker tab");
                    continue;
                }
            };
            let worker = Worker::new(id, driver, self.visit_timeout, self.idle_timeout);
            handles.push(tokio::spawn(worker.run(queue.clone(), cancel.clone())));
        }
        report.workers = handles.len();
        if handles.is_empty() {
            warn!(eligible = report.eligible, "no worker tabs available, records left unenriched");
            return report;
        }
        info!(eligible = report.eligible, workers = report.workers, "enrichment started");

        for handle in handles {
            let output = match handle.await {
                Ok(output) => output,
                Err(e) => {
                    warn!(error = %e, "enrichment worker panicked");
                    WorkerOutput::default()
                }
            };
            report.visited += output.visited;
            report.failed += output.failed;
            for (index, fields) in output.merges {
                if let Some(record) = records.get_mut(index) {
                    fields.merge_into(record);
                    report.enriched += 1;
                }
            }
        }

        info!(
            eligible = report.eligible,
            visited = report.visited,
            enriched = report.enriched,
            failed = report.failed,
            duration = fmt_duration(start.elapsed()),
            "enrichment finished"
        );
        report
    }
}
