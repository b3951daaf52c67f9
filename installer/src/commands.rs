//! CLI command implementations.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::engine::InstallerEngine;
use crate::io::catalog::HttpCatalogFetcher;
use crate::io::config::{InstallOptions, OptionFlags};
use crate::io::executor::ProcessExecutor;
use crate::io::manifest::Manifest;
use crate::io::mount::expand_home;
use crate::io::paths::InstallerPaths;

/// Inputs for `install` / `repair`.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub manifest: PathBuf,
    pub workspace: Option<PathBuf>,
    pub flags: OptionFlags,
    pub include_models: bool,
}

/// Run the install pipeline with live collaborators. Returns the ledger path.
pub fn install(request: &InstallRequest) -> Result<PathBuf> {
    let manifest = Manifest::load(&request.manifest)?;
    let workspace = match request.workspace.as_deref() {
        Some(raw) => override_workspace(raw)?,
        None => manifest.workspace()?,
    };
    let options = InstallOptions::resolve(&request.flags, &manifest);
    debug!(?options, workspace = %workspace.display(), "install options resolved");

    let executor = ProcessExecutor::new(options.dry_run);
    let fetcher = HttpCatalogFetcher;
    let mut engine = InstallerEngine::new(&manifest, workspace, options, &executor, &fetcher)?;
    engine.run(request.include_models)?;
    Ok(engine.paths().state_path.clone())
}

/// Workspace for `status` / `clean`. The manifest is only read without an override.
pub fn locate_workspace(manifest: &Path, workspace: Option<&Path>) -> Result<PathBuf> {
    match workspace {
        Some(raw) => override_workspace(raw),
        None => Manifest::load(manifest)?.workspace(),
    }
}

/// Raw ledger contents, or `None` when no run has been recorded.
pub fn status(workspace: &Path) -> Result<Option<String>> {
    let paths = InstallerPaths::new(workspace);
    if !paths.state_path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&paths.state_path)
        .with_context(|| format!("read {}", paths.state_path.display()))?;
    Ok(Some(contents))
}

/// Remove installer-owned files. Returns the paths actually removed.
pub fn clean(workspace: &Path) -> Result<Vec<PathBuf>> {
    let paths = InstallerPaths::new(workspace);
    let mut removed = Vec::new();
    for path in paths.generated_files() {
        if !path.exists() {
            continue;
        }
        fs::remove_file(path).with_context(|| format!("remove {}", path.display()))?;
        info!(path = %path.display(), "removed");
        removed.push(path.to_path_buf());
    }
    Ok(removed)
}

fn override_workspace(raw: &Path) -> Result<PathBuf> {
    let expanded = expand_home(&raw.to_string_lossy());
    std::path::absolute(&expanded)
        .with_context(|| format!("resolve workspace {}", expanded.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_none_without_ledger() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert_eq!(status(temp.path()).expect("status"), None);
    }

    #[test]
    fn clean_removes_only_generated_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = InstallerPaths::new(temp.path());
        fs::write(&paths.state_path, "{}\n").expect("write state");
        fs::write(temp.path().join("notes.md"), "keep").expect("write notes");

        let removed = clean(temp.path()).expect("clean");
        assert_eq!(removed, vec![paths.state_path.clone()]);
        assert!(!paths.state_path.exists());
        assert!(temp.path().join("notes.md").exists());

        assert!(clean(temp.path()).expect("clean again").is_empty());
    }

    #[test]
    fn override_skips_manifest() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing_manifest = temp.path().join("absent.yaml");
        let workspace =
            locate_workspace(&missing_manifest, Some(temp.path())).expect("locate workspace");
        assert_eq!(workspace, temp.path());
        assert!(locate_workspace(&missing_manifest, None).is_err());
    }
}
