//! Append-only step ledger persisted as `install-state.json`.
//!
//! Every mutation rewrites the complete snapshot before returning, so a crash
//! mid-run leaves a readable partial history. There is no locking: two runs
//! against one workspace overwrite each other's snapshot (last writer wins).

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::types::StepStatus;
use crate::error::error_kind;

/// File name of the ledger inside its directory.
pub const STATE_FILE_NAME: &str = "install-state.json";
const STATE_VERSION: u32 = 1;

/// Structured detail attached to a step or stored as metadata.
pub type Details = Map<String, Value>;

/// One immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Stage tag (`repo`, `canonical`, `model`, ...).
    #[serde(default)]
    pub name: String,
    #[serde(default = "unknown_status")]
    pub status: StepStatus,
    /// RFC 3339 UTC timestamp.
    #[serde(default)]
    pub at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
    /// Fields this version does not know, written back unchanged.
    #[serde(flatten)]
    pub extra: Details,
}

fn unknown_status() -> StepStatus {
    StepStatus::Unknown(String::new())
}

fn state_version() -> u32 {
    STATE_VERSION
}

/// On-disk shape: `{version, metadata, steps}`.
#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    #[serde(default = "state_version")]
    version: u32,
    #[serde(default)]
    metadata: Details,
    #[serde(default)]
    steps: Vec<StepRecord>,
    #[serde(flatten)]
    extra: Details,
}

/// Ledger for one workspace, exclusively owned by the running engine.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallState {
    dir: PathBuf,
    steps: Vec<StepRecord>,
    metadata: Details,
    /// Format version read from disk. Never lowered on save.
    version: u32,
    extra: Details,
}

impl InstallState {
    /// Empty ledger rooted at `dir`. Nothing is written until the first mutation.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            steps: Vec::new(),
            metadata: Details::new(),
            version: STATE_VERSION,
            extra: Details::new(),
        }
    }

    /// Load `<dir>/install-state.json`, or start empty when it does not exist.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut state = Self::new(dir);
        let path = state.file_path();
        if !path.exists() {
            debug!(path = %path.display(), "no ledger on disk, starting empty");
            return Ok(state);
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read ledger {}", path.display()))?;
        let file: StateFile = serde_json::from_str(&contents)
            .with_context(|| format!("parse ledger {}", path.display()))?;
        debug!(
            path = %path.display(),
            version = file.version,
            steps = file.steps.len(),
            "ledger loaded"
        );
        state.metadata = file.metadata;
        state.steps = file.steps;
        state.version = file.version;
        state.extra = file.extra;
        Ok(state)
    }

    pub fn file_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE_NAME)
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn metadata(&self) -> &Details {
        &self.metadata
    }

    /// Most recent record with the given stage tag.
    pub fn last_named(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().rev().find(|step| step.name == name)
    }

    pub fn count(&self, name: &str, status: StepStatus) -> usize {
        self.steps
            .iter()
            .filter(|step| step.name == name && step.status == status)
            .count()
    }

    /// Append a step and persist the full snapshot.
    pub fn record(
        &mut self,
        name: &str,
        status: StepStatus,
        message: Option<&str>,
        details: Option<Details>,
    ) -> Result<()> {
        debug!(step = name, status = status.as_str(), msg = message, "ledger record");
        self.steps.push(StepRecord {
            name: name.to_string(),
            status,
            at: Utc::now().to_rfc3339(),
            message: message.map(str::to_string),
            details: details.filter(|d| !d.is_empty()),
            extra: Details::new(),
        });
        self.save()
    }

    /// Record `err` as a `failed` step, tagging its kind under `details.type`.
    pub fn fail(&mut self, name: &str, err: &anyhow::Error) -> Result<()> {
        let details = Details::from_iter([("type".to_string(), Value::from(error_kind(err)))]);
        self.record(
            name,
            StepStatus::Failed,
            Some(&format!("{err:#}")),
            Some(details),
        )
    }

    /// Merge `pairs` into the metadata map and persist.
    pub fn set_meta<K, V, I>(&mut self, pairs: I) -> Result<()>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in pairs {
            self.metadata.insert(key.into(), value.into());
        }
        self.save()
    }

    /// Atomically write the full snapshot (temp file + fsync + rename).
    ///
    /// A ledger loaded from a newer format keeps its version and unknown
    /// top-level fields.
    pub fn save(&self) -> Result<()> {
        let file = StateFile {
            version: self.version.max(STATE_VERSION),
            metadata: self.metadata.clone(),
            steps: self.steps.clone(),
            extra: self.extra.clone(),
        };
        let mut buf = serde_json::to_string_pretty(&file).context("serialize ledger")?;
        buf.push('\n');
        write_atomic(&self.file_path(), &buf)
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("ledger path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    let mut file = File::create(&tmp_path)
        .with_context(|| format!("create temp ledger {}", tmp_path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("write temp ledger {}", tmp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("sync temp ledger {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace ledger {}", path.display()))?;
    Ok(())
}
