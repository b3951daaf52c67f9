//! Model staging stage.
//!
//! Artifacts are not downloaded here. Staging creates the target directory and
//! a checksum marker per artifact; a marker whose first line already equals
//! the declared checksum is left untouched.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::core::types::StepStatus;
use crate::engine::{InstallerEngine, details, path_value, stage};
use crate::io::catalog::CatalogFetcher;
use crate::io::executor::CommandExecutor;
use crate::io::manifest::{ModelArtifact, ModelDescriptor};

impl<E: CommandExecutor, F: CatalogFetcher> InstallerEngine<'_, E, F> {
    #[instrument(skip_all, fields(count = self.manifest.models.len()))]
    pub(crate) fn prepare_models(&mut self) -> Result<()> {
        let manifest = self.manifest;
        if manifest.models.is_empty() {
            return self.record(
                stage::MODELS,
                StepStatus::Skipped,
                "No models configured",
                None,
            );
        }
        for model in &manifest.models {
            self.prepare_model(model)?;
        }
        Ok(())
    }

    fn prepare_model(&mut self, model: &ModelDescriptor) -> Result<()> {
        let target = self.paths.resolve(&model.target_path);
        let meta = details([
            ("name", Value::from(model.name.as_str())),
            ("provider", Value::from(model.provider.as_str())),
            ("path", path_value(&target)),
        ]);
        let msg = format!("Preparing model {}", model.name);
        self.record(stage::MODEL, StepStatus::Start, &msg, Some(&meta))?;
        if self.options.dry_run {
            return self.record(
                stage::MODEL,
                StepStatus::Ok,
                "Model staging would run",
                Some(&meta),
            );
        }

        let dir = staging_dir(&target);
        fs::create_dir_all(&dir)
            .with_context(|| format!("create model directory {}", dir.display()))?;
        for artifact in &model.files {
            self.stage_artifact(artifact, &dir)?;
        }

        let msg = format!("Model prepared: {}", model.name);
        self.record(stage::MODEL, StepStatus::Ok, &msg, Some(&meta))
    }

    fn stage_artifact(&mut self, artifact: &ModelArtifact, dir: &Path) -> Result<()> {
        let Some(checksum) = artifact
            .checksum
            .as_deref()
            .map(str::trim)
            .filter(|checksum| !checksum.is_empty())
        else {
            debug!(source = %artifact.source, "artifact has no checksum; nothing to mark");
            return Ok(());
        };
        let file_name = artifact_file_name(&artifact.source);
        let marker = dir.join(format!(".{file_name}.checksum"));
        let meta = details([
            ("source", Value::from(artifact.source.as_str())),
            ("marker", path_value(&marker)),
        ]);

        if marker_matches(&marker, checksum)? {
            let msg = format!("Model artifact already cached: {file_name}");
            return self.record(stage::MODEL, StepStatus::Info, &msg, Some(&meta));
        }

        let contents = format!("{checksum}\n{}\n", source_digest(&artifact.source));
        fs::write(&marker, contents)
            .with_context(|| format!("write checksum marker {}", marker.display()))?;
        let msg = format!("Model artifact staged: {file_name}");
        self.record(stage::MODEL, StepStatus::Info, &msg, Some(&meta))
    }
}

/// A target with a file extension names a file; stage into its parent.
fn staging_dir(target: &Path) -> PathBuf {
    match (target.extension(), target.parent()) {
        (Some(_), Some(parent)) => parent.to_path_buf(),
        _ => target.to_path_buf(),
    }
}

/// Last path segment of an artifact source (path or URL).
fn artifact_file_name(source: &str) -> String {
    let trimmed = source.trim_end_matches('/');
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(trimmed)
        .to_string()
}

/// Short fingerprint of the artifact source, kept on the marker's second line.
fn source_digest(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    hex::encode(&digest[..4])
}

fn marker_matches(marker: &Path, checksum: &str) -> Result<bool> {
    if !marker.exists() {
        return Ok(false);
    }
    let contents = fs::read_to_string(marker)
        .with_context(|| format!("read checksum marker {}", marker.display()))?;
    Ok(contents.lines().next().map(str::trim) == Some(checksum))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_targets_stage_into_parent() {
        assert_eq!(
            staging_dir(Path::new("/ws/models/embedder/model.gguf")),
            PathBuf::from("/ws/models/embedder")
        );
        assert_eq!(
            staging_dir(Path::new("/ws/models/embedder")),
            PathBuf::from("/ws/models/embedder")
        );
    }

    #[test]
    fn artifact_names_come_from_last_segment() {
        assert_eq!(artifact_file_name("hf://org/embedder/model.gguf"), "model.gguf");
        assert_eq!(artifact_file_name("weights.bin"), "weights.bin");
        assert_eq!(artifact_file_name("https://host/models/"), "models");
    }

    #[test]
    fn source_digest_is_short_and_stable() {
        let digest = source_digest("hf://org/embedder/model.gguf");
        assert_eq!(digest.len(), 8);
        assert_eq!(digest, source_digest("hf://org/embedder/model.gguf"));
        assert_ne!(digest, source_digest("hf://org/other/model.gguf"));
    }

    #[test]
    fn marker_compares_first_line_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let marker = dir.path().join(".model.gguf.checksum");
        assert!(!marker_matches(&marker, "sha256:abc").expect("probe"));

        fs::write(&marker, "sha256:abc\n1a2b3c4d\n").expect("write marker");
        assert!(marker_matches(&marker, "sha256:abc").expect("probe"));
        assert!(!marker_matches(&marker, "sha256:def").expect("probe"));
        assert!(!marker_matches(&marker, "1a2b3c4d").expect("probe"));
    }
}
