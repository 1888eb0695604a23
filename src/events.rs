//! Append-only training-event log.
//!
//! [`EventLog`] writes one newline-delimited JSON record per turn to a
//! file named by the `(user_id, case_id)` pair.  Lines are never
//! rewritten or deleted.  No operation in the session flow calls this
//! today; the `debug log-event` subcommand and the test suite are the
//! only callers, and the contract is kept for gateways that want to
//! persist turns themselves.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// A single logged turn, serialised as one JSONL line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Local wall-clock time, `YYYY-MM-DD HH:MM:SS`.
    pub ts: String,
    pub user_id: i64,
    pub case_id: String,
    pub step: u32,
    /// The simulated client's line for this turn.
    pub client: String,
    /// The trainee's chosen reply.
    pub reply: String,
    pub is_good: bool,
}

/// Writer for per-(user, case) JSONL event files under a fixed root.
#[derive(Debug, Clone)]
pub struct EventLog {
    root: PathBuf,
}

impl EventLog {
    /// Create a handle rooted at `root` (does NOT touch the filesystem).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Handle rooted at the default location, `<cogni_home>/logs`.
    pub fn default_location() -> Self {
        Self::new(crate::utils::logs_dir())
    }

    /// Path of the event file for a `(user_id, case_id)` pair.
    pub fn file_path(&self, user_id: i64, case_id: &str) -> PathBuf {
        self.root.join(format!("session_{user_id}_{case_id}.jsonl"))
    }

    /// Append one record, creating the root directory if necessary.
    ///
    /// Uses `OpenOptions::append` with a single newline-terminated
    /// `write_all`.  Write failures propagate to the caller; there is
    /// no local retry or recovery.
    pub async fn log_event(
        &self,
        user_id: i64,
        case_id: &str,
        step: u32,
        client_text: &str,
        user_reply: &str,
        is_good: bool,
    ) -> anyhow::Result<PathBuf> {
        let record = EventRecord {
            ts: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            user_id,
            case_id: case_id.to_string(),
            step,
            client: client_text.to_string(),
            reply: user_reply.to_string(),
            is_good,
        };

        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("create event log dir {}", self.root.display()))?;

        let path = self.file_path(user_id, case_id);
        let mut line = serde_json::to_string(&record).context("serialize EventRecord")?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("open event log {}", path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("write to {}", path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flush {}", path.display()))?;

        debug!(path = %path.display(), step, "event appended");
        Ok(path)
    }

    /// Read all records back from a `(user_id, case_id)` file.
    /// Missing files yield an empty vec; malformed lines are skipped.
    pub async fn load(&self, user_id: i64, case_id: &str) -> anyhow::Result<Vec<EventRecord>> {
        let path = self.file_path(user_id, case_id);
        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
        };

        let mut records = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<EventRecord>(line) {
                Ok(rec) => records.push(rec),
                Err(e) => debug!(error = %e, "skipping malformed JSONL line"),
            }
        }
        Ok(records)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
