//! Repository synchronization stage.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::core::types::StepStatus;
use crate::engine::{InstallerEngine, details, path_value, stage};
use crate::error::InstallFailure;
use crate::io::catalog::CatalogFetcher;
use crate::io::executor::{CommandExecutor, run_checked, split_command};
use crate::io::git;
use crate::io::ledger::Details;
use crate::io::manifest::RepositoryDescriptor;

impl<E: CommandExecutor, F: CatalogFetcher> InstallerEngine<'_, E, F> {
    /// Clone or update every declared repository in manifest order.
    #[instrument(skip_all, fields(count = self.manifest.repositories.len()))]
    pub(crate) fn sync_repositories(&mut self) -> Result<()> {
        let manifest = self.manifest;
        for repo in &manifest.repositories {
            self.sync_repository(repo)?;
        }
        Ok(())
    }

    fn sync_repository(&mut self, repo: &RepositoryDescriptor) -> Result<()> {
        let target = self.paths.resolve(&repo.local_path);
        let meta = details([
            ("name", Value::from(repo.name.as_str())),
            ("url", Value::from(repo.url.as_str())),
            ("path", path_value(&target)),
            ("branch", Value::from(repo.branch.as_str())),
        ]);
        let msg = format!("Syncing {}", repo.name);
        self.record(stage::REPO, StepStatus::Start, &msg, Some(&meta))?;

        match self.sync_checkout(repo, &target, &meta) {
            Ok(()) => Ok(()),
            Err(err) if repo.required => {
                self.record(
                    stage::REPO,
                    StepStatus::Failed,
                    &format!("{err:#}"),
                    Some(&meta),
                )?;
                Err(err)
            }
            Err(err) => {
                warn!(repo = %repo.name, err = %format!("{err:#}"), "optional repository skipped");
                let mut skipped = meta;
                skipped.insert("error".to_string(), Value::from(format!("{err:#}")));
                let msg = format!("Optional repo skipped: {}", repo.name);
                self.record(stage::REPO, StepStatus::Skipped, &msg, Some(&skipped))
            }
        }
    }

    fn sync_checkout(
        &mut self,
        repo: &RepositoryDescriptor,
        target: &Path,
        meta: &Details,
    ) -> Result<()> {
        if target.exists() {
            if repo.required && !git::is_repository(target) {
                return Err(InstallFailure::policy(format!(
                    "required repository path exists but is not a git checkout: {}",
                    target.display()
                ))
                .into());
            }
            if self.options.dry_run {
                let msg = format!("Would update {}", repo.name);
                return self.record(stage::REPO, StepStatus::Ok, &msg, Some(meta));
            }
            for argv in [
                git::fetch_all(),
                git::checkout(&repo.branch),
                git::pull_fast_forward(&repo.branch),
            ] {
                run_checked(self.executor, &argv, target)?;
            }
        } else {
            if self.options.dry_run {
                let msg = format!("Would clone {}", repo.name);
                return self.record(stage::REPO, StepStatus::Ok, &msg, Some(meta));
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create directory {}", parent.display()))?;
            }
            let argv = git::shallow_clone(&repo.url, &repo.branch, target);
            run_checked(self.executor, &argv, &self.paths.workspace)?;
        }

        for step in &repo.post_pull_steps {
            let argv = split_command(step);
            if argv.is_empty() {
                continue;
            }
            run_checked(self.executor, &argv, target)?;
        }

        info!(repo = %repo.name, "repository synced");
        let msg = format!("Synced {}", repo.name);
        self.record(stage::REPO, StepStatus::Ok, &msg, Some(meta))
    }
}
