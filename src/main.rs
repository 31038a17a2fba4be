use anyhow::Context;
use biwenger_scraper::app::{App, load_config};
use biwenger_scraper::browser::TabSource;
use biwenger_scraper::browser::chrome::ChromeBrowser;
use biwenger_scraper::cli::Args;
use biwenger_scraper::logging::setup_logging;
use biwenger_scraper::utils::fmt_duration;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Config comes first so logging can honor LOG_LEVEL; nothing is logged yet
    let mut config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    if args.headed {
        config.headless = false;
    }
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT_SHORT"),
        league_id = %config.league_id,
        concurrency = config.concurrency(),
        run_timeout = fmt_duration(config.run_timeout),
        "starting biwenger-scraper"
    );

    let browser = match ChromeBrowser::launch(&config)
        .await
        .context("Failed to launch browser")
    {
        Ok(browser) => Arc::new(browser),
        Err(e) => {
            error!(error = format!("{e:#}"), "startup failed");
            return ExitCode::FAILURE;
        }
    };

    let tabs: Arc<dyn TabSource> = browser.clone();
    let app = match App::new(config, tabs) {
        Ok(app) => app,
        Err(e) => {
            error!(error = format!("{e:#}"), "startup failed");
            return ExitCode::FAILURE;
        }
    };

    let result = app.run().await;
    drop(app);

    match Arc::try_unwrap(browser) {
        Ok(browser) => browser.shutdown().await,
        Err(_) => warn!("browser still in use at exit, leaving it to the OS"),
    }

    match result {
        Ok(summary) => {
            info!(
                team = summary.team,
                market = summary.market,
                balance = ?summary.balance,
                enriched = summary.enrichment.enriched,
                enrichment_failed = summary.enrichment.failed,
                latest = %summary.written.latest.display(),
                history = %summary.written.history.display(),
                duration = fmt_duration(summary.duration),
                "run complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(kind = e.kind(), error = %e, "run failed");
            ExitCode::from(e.exit_code())
        }
    }
}
