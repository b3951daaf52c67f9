//! Well-known paths inside an installer workspace.

use std::path::{Path, PathBuf};

use crate::io::ledger::STATE_FILE_NAME;

/// Human-readable completion marker written by a successful live run.
pub const REPORT_FILE_NAME: &str = "installer-report.md";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerPaths {
    pub workspace: PathBuf,
    pub state_path: PathBuf,
    pub report_path: PathBuf,
}

impl InstallerPaths {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        let workspace = workspace.into();
        Self {
            state_path: workspace.join(STATE_FILE_NAME),
            report_path: workspace.join(REPORT_FILE_NAME),
            workspace,
        }
    }

    /// Resolve a manifest path relative to the workspace.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.workspace.join(relative)
    }

    /// Installer-owned files removed by `clean`.
    pub fn generated_files(&self) -> [&Path; 2] {
        [&self.state_path, &self.report_path]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_stable() {
        let paths = InstallerPaths::new("/ws");
        assert_eq!(paths.state_path, PathBuf::from("/ws/install-state.json"));
        assert_eq!(paths.report_path, PathBuf::from("/ws/installer-report.md"));
        assert_eq!(
            paths.resolve("state/provider-catalog.json"),
            PathBuf::from("/ws/state/provider-catalog.json")
        );
    }
}
