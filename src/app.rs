use crate::browser::{Driver, TabSource};
use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::enrich::{EnrichmentPool, EnrichmentReport};
use crate::error::RunError;
use crate::extract::{ViewData, extract_view};
use crate::models::{Record, Snapshot, ViewTarget};
use crate::navigator::Navigator;
use crate::outcome::Outcome;
use crate::session::SessionController;
use crate::snapshot::{SnapshotWriter, WrittenSnapshot};
use crate::utils::fmt_duration;
use anyhow::Context;
use chrono::{DateTime, Utc};
use figment::{Figment, providers::Env};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Load configuration from the environment (after `.env` has been applied).
pub fn load_config() -> Result<Config, anyhow::Error> {
    Figment::new()
        .merge(Env::raw())
        .extract()
        .context("Failed to load config")
}

/// What a successful run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub team: usize,
    pub market: usize,
    pub balance: Option<i64>,
    pub enrichment: EnrichmentReport,
    pub written: WrittenSnapshot,
    pub duration: Duration,
}

/// One scrape run: login, both views, enrichment, snapshot.
pub struct App {
    config: Config,
    base_url: Url,
    tabs: Arc<dyn TabSource>,
}

impl App {
    pub fn new(config: Config, tabs: Arc<dyn TabSource>) -> Result<Self, anyhow::Error> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("BASE_URL is not a valid URL: {}", config.base_url))?;
        Ok(Self {
            config,
            base_url,
            tabs,
        })
    }

    /// Run the pipeline under the configured run timeout. Fatal errors get a
    /// diagnostics capture of the session tab before they are returned.
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let run_started = Utc::now();
        let cancel = CancellationToken::new();
        let deadline = {
            let cancel = cancel.clone();
            let limit = self.config.run_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                warn!(limit = fmt_duration(limit), "run time limit reached");
                cancel.cancel();
            })
        };

        let session = match self.tabs.new_tab().await {
            Ok(session) => session,
            Err(e) => {
                deadline.abort();
                return Err(RunError::Browser(e));
            }
        };

        let result = self.pipeline(session.as_ref(), run_started, &cancel).await;
        deadline.abort();

        if let Err(ref error) = result {
            Diagnostics::new(&self.config.diagnostics_dir)
                .capture(session.as_ref(), error, run_started)
                .await;
        }
        if let Err(e) = session.close().await {
            debug!(error = %e, "failed to close session tab");
        }
        result
    }

    async fn pipeline(
        &self,
        session: &dyn Driver,
        run_started: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, RunError> {
        let start = Instant::now();

        let credential = self.config.credential();
        let mut controller = SessionController::new(session, &self.config);
        tokio::select! {
            _ = cancel.cancelled() => return Err(RunError::RunTimedOut),
            result = controller.login(&credential) => result?,
        }

        let navigator = Navigator::new(session, &self.config);
        let mut roster = ViewData::default();
        let mut market = ViewData::default();
        for view in ViewTarget::ALL {
            let data = tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(view = view.as_str(), "run deadline reached, view left empty");
                    ViewData::default()
                }
                data = self.collect_view(&navigator, session, view) => data,
            };
            match view {
                ViewTarget::Roster => roster = data,
                ViewTarget::Market => market = data,
            }
        }

        let balance = roster.balance.or(market.balance);
        let team_len = roster.records.len();
        let mut records: Vec<Record> = roster.records;
        records.extend(market.records);

        let enrichment = if cancel.is_cancelled() {
            warn!("run deadline reached, skipping enrichment");
            EnrichmentReport::default()
        } else {
            EnrichmentPool::new(
                self.tabs.clone(),
                self.config.concurrency(),
                self.config.detail_timeout,
                self.config.idle_timeout,
            )
            .enrich(&mut records, cancel)
            .await
        };

        let market_records = records.split_off(team_len);
        let snapshot = Snapshot {
            scraped_at: Utc::now(),
            league_id: self.config.league_id.clone(),
            balance,
            team: records,
            market: market_records,
        };

        let written = SnapshotWriter::new(&self.config.out_path, self.config.history_dir())
            .write(&snapshot, run_started)
            .await?;

        Ok(RunSummary {
            team: snapshot.team.len(),
            market: snapshot.market.len(),
            balance,
            enrichment,
            written,
            duration: start.elapsed(),
        })
    }

    /// Navigate to `view` and extract whatever page the session ends up on.
    /// An unreachable view shows up as an empty result.
    async fn collect_view(
        &self,
        navigator: &Navigator<'_>,
        session: &dyn Driver,
        view: ViewTarget,
    ) -> ViewData {
        let opened = navigator.open(view).await;
        if !opened.is_success() {
            debug!(view = view.as_str(), outcome = opened.label(), "extracting from the current page");
        }

        match extract_view(session, view, &self.base_url, self.config.navigation_timeout).await {
            Outcome::Success(data) if data.records.is_empty() && !opened.is_success() => {
                warn!(view = view.as_str(), outcome = opened.label(), "view unreachable, nothing extracted");
                data
            }
            Outcome::Success(data) => {
                info!(
                    view = view.as_str(),
                    records = data.records.len(),
                    balance = ?data.balance,
                    "view extracted"
                );
                data
            }
            other => {
                warn!(view = view.as_str(), outcome = other.label(), "extraction failed, view left empty");
                ViewData::default()
            }
        }
    }
}
