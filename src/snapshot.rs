//! Snapshot persistence: one "latest" file plus an append-only history.

use crate::error::SnapshotError;
use crate::models::Snapshot;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Numeric suffixes tried after every timestamp precision collided.
const MAX_SUFFIX: usize = 10_000;

/// Where a snapshot ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenSnapshot {
    pub latest: PathBuf,
    pub history: PathBuf,
}

pub struct SnapshotWriter {
    out_path: PathBuf,
    history_dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(out_path: impl Into<PathBuf>, history_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            history_dir: history_dir.into(),
        }
    }

    /// Write the latest file, then a new history entry keyed by `run_started`.
    pub async fn write(
        &self,
        snapshot: &Snapshot,
        run_started: DateTime<Utc>,
    ) -> Result<WrittenSnapshot, SnapshotError> {
        let mut body = serde_json::to_vec_pretty(snapshot)?;
        body.push(b'\n');

        write_atomic(&self.out_path, &body).await?;
        let history = self.append_history(&body, run_started).await?;

        info!(
            latest = %self.out_path.display(),
            history = %history.display(),
            team = snapshot.team.len(),
            market = snapshot.market.len(),
            "snapshot written"
        );
        Ok(WrittenSnapshot {
            latest: self.out_path.clone(),
            history,
        })
    }

    async fn append_history(
        &self,
        body: &[u8],
        run_started: DateTime<Utc>,
    ) -> Result<PathBuf, SnapshotError> {
        create_dir(&self.history_dir).await?;

        for key in history_keys(run_started) {
            let path = self.history_dir.join(format!("{key}.json"));
            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            let mut file = match file {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "history key taken, refining");
                    continue;
                }
                Err(source) => return Err(SnapshotError::Io { path, source }),
            };

            let written = async {
                file.write_all(body).await?;
                file.flush().await
            }
            .await;
            return match written {
                Ok(()) => Ok(path),
                Err(source) => Err(SnapshotError::Io { path, source }),
            };
        }

        Err(SnapshotError::Io {
            path: self.history_dir.clone(),
            source: std::io::Error::new(ErrorKind::AlreadyExists, "no free history key"),
        })
    }
}

/// Candidate history keys, coarsest first: minute, second, millisecond,
/// then the millisecond key with `-1`, `-2`, ... appended.
pub fn history_keys(at: DateTime<Utc>) -> impl Iterator<Item = String> {
    let minute = at.format("%Y-%m-%dT%H-%M").to_string();
    let second = at.format("%Y-%m-%dT%H-%M-%S").to_string();
    let milli = at.format("%Y-%m-%dT%H-%M-%S-%3f").to_string();
    let suffixed = milli.clone();

    [minute, second, milli]
        .into_iter()
        .chain((1..=MAX_SUFFIX).map(move |n| format!("{suffixed}-{n}")))
}

async fn create_dir(dir: &Path) -> Result<(), SnapshotError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| SnapshotError::Io {
            path: dir.to_path_buf(),
            source,
        })
}

/// Write via a sibling temp file and rename, so readers never see a partial file.
async fn write_atomic(path: &Path, body: &[u8]) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir(parent).await?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp, body)
        .await
        .map_err(|source| SnapshotError::Io {
            path: tmp.clone(),
            source,
        })?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })
}
