//! Filesystem probes and link creation for source-of-truth bindings.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;
use tracing::debug;

use crate::core::binding::AdapterState;

/// Expand a leading `~` to the current user's home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    let home = || BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    if raw == "~" {
        if let Some(home) = home() {
            return home;
        }
    } else if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = home()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

/// Expand `~` and resolve symlinks when the path exists.
///
/// A missing path is returned expanded but unresolved so it can be reported.
pub fn resolve_canonical(raw: &str) -> PathBuf {
    let expanded = expand_home(raw);
    fs::canonicalize(&expanded).unwrap_or(expanded)
}

/// Classify what currently sits at `adapter` without following a final symlink.
pub fn inspect_adapter(adapter: &Path) -> AdapterState {
    match fs::symlink_metadata(adapter) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => AdapterState::Missing,
        Err(err) => AdapterState::Unusable(err.to_string()),
        Ok(meta) if meta.file_type().is_symlink() => AdapterState::Symlink {
            resolved: fs::canonicalize(adapter).ok(),
        },
        Ok(meta) if meta.is_dir() || meta.is_file() => AdapterState::Materialized,
        Ok(_) => AdapterState::Unusable("not a directory, file, or symlink".to_string()),
    }
}

/// Creates an adapter mount pointing at its canonical source.
///
/// The engine uses [`link_adapter`] unless another linker is installed with
/// `InstallerEngine::with_linker`.
pub type AdapterLinker = fn(adapter: &Path, canonical: &Path) -> Result<()>;

/// Create `adapter` as a symbolic link to `canonical`, creating parent directories.
pub fn link_adapter(adapter: &Path, canonical: &Path) -> Result<()> {
    if let Some(parent) = adapter.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create adapter parent {}", parent.display()))?;
    }
    debug!(adapter = %adapter.display(), canonical = %canonical.display(), "linking adapter");
    symlink_dir(canonical, adapter)
        .with_context(|| format!("link {} -> {}", adapter.display(), canonical.display()))
}

/// Materialize `adapter` as an ordinary empty directory (copy fallback).
pub fn create_adapter_dir(adapter: &Path) -> Result<()> {
    debug!(adapter = %adapter.display(), "creating adapter directory");
    fs::create_dir_all(adapter)
        .with_context(|| format!("create adapter directory {}", adapter.display()))
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink_dir(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}
