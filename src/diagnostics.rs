//! Failure captures: a full-page screenshot and a short text sidecar.
//!
//! Capturing is best effort. Nothing here can turn a failed run into a
//! different failure.

use crate::browser::Driver;
use crate::error::RunError;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const CAPTURE_TIMEOUT: Duration = Duration::from_secs(15);

/// Files produced by one capture; either may be missing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Capture {
    pub screenshot: Option<PathBuf>,
    pub sidecar: Option<PathBuf>,
}

pub struct Diagnostics {
    dir: PathBuf,
}

impl Diagnostics {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Record what the session looked like when `error` ended the run.
    pub async fn capture(
        &self,
        driver: &dyn Driver,
        error: &RunError,
        run_started: DateTime<Utc>,
    ) -> Capture {
        let mut capture = Capture::default();

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!(dir = %self.dir.display(), error = %e, "cannot create diagnostics directory");
            return capture;
        }

        let stem = format!("{}-{}", run_started.format("%Y-%m-%dT%H-%M-%S"), error.kind());

        let url = match tokio::time::timeout(CAPTURE_TIMEOUT, driver.current_url()).await {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => {
                warn!(error = %e, "diagnostics could not read the current url");
                String::from("unknown")
            }
            Err(_) => String::from("unknown"),
        };

        match tokio::time::timeout(CAPTURE_TIMEOUT, driver.screenshot()).await {
            Ok(Ok(png)) => {
                let path = self.dir.join(format!("{stem}.png"));
                capture.screenshot = write_file(&path, &png).await.then_some(path);
            }
            Ok(Err(e)) => warn!(error = %e, "diagnostics screenshot failed"),
            Err(_) => warn!("diagnostics screenshot timed out"),
        }

        let sidecar = format!(
            "kind: {}\nerror: {}\nurl: {}\nrun_started: {}\ncaptured_at: {}\n",
            error.kind(),
            error,
            url,
            run_started.to_rfc3339(),
            Utc::now().to_rfc3339(),
        );
        let path = self.dir.join(format!("{stem}.txt"));
        capture.sidecar = write_file(&path, sidecar.as_bytes()).await.then_some(path);

        info!(
            kind = error.kind(),
            screenshot = capture.screenshot.is_some(),
            dir = %self.dir.display(),
            "diagnostics captured"
        );
        capture
    }
}

async fn write_file(path: &Path, body: &[u8]) -> bool {
    match tokio::fs::write(path, body).await {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to write diagnostics file");
            false
        }
    }
}
