//! Orchestration for a single install run.
//!
//! The pipeline is strictly linear: `precheck → workspace → repositories →
//! source bindings → models → provider catalog → onboarding → smoke →
//! finalize`. Each stage records its own ledger entries. Any error escaping a
//! stage is recorded once as a failed `install` step and returned; optional
//! items degrade in place inside their stage and never reach this boundary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::core::catalog::ProviderCatalog;
use crate::core::types::StepStatus;
use crate::io::catalog::CatalogFetcher;
use crate::io::config::InstallOptions;
use crate::io::executor::{CommandExecutor, run_checked, split_command};
use crate::io::ledger::{Details, InstallState};
use crate::io::manifest::{Manifest, WorkflowCommand};
use crate::io::mount::{AdapterLinker, link_adapter};
use crate::io::paths::InstallerPaths;
use crate::io::report::{ReportInput, write_report};

/// Stage tags used as ledger step names.
pub mod stage {
    pub const PRECHECK: &str = "precheck";
    pub const WORKSPACE: &str = "workspace";
    pub const REPO: &str = "repo";
    pub const CANONICAL: &str = "canonical";
    /// Stage-level entry when no model is staged at all.
    pub const MODELS: &str = "models";
    pub const MODEL: &str = "model";
    pub const PROVIDER_CATALOG: &str = "provider_catalog";
    pub const ONBOARDING: &str = "onboarding";
    pub const SMOKE: &str = "smoke";
    pub const FINALIZE: &str = "finalize";
    /// Failure boundary around the whole run.
    pub const INSTALL: &str = "install";
}

/// Drives one install run against a workspace.
///
/// Owns the workspace ledger for its lifetime. Collaborators are borrowed so
/// tests can inspect scripted executors and fetchers after the run.
pub struct InstallerEngine<'a, E, F> {
    pub(crate) manifest: &'a Manifest,
    pub(crate) paths: InstallerPaths,
    pub(crate) options: InstallOptions,
    pub(crate) executor: &'a E,
    pub(crate) fetcher: &'a F,
    pub(crate) state: InstallState,
    pub(crate) catalog: Option<ProviderCatalog>,
    pub(crate) linker: AdapterLinker,
}

impl<'a, E: CommandExecutor, F: CatalogFetcher> InstallerEngine<'a, E, F> {
    /// Load the workspace ledger and stamp run metadata.
    pub fn new(
        manifest: &'a Manifest,
        workspace: impl Into<PathBuf>,
        options: InstallOptions,
        executor: &'a E,
        fetcher: &'a F,
    ) -> Result<Self> {
        let paths = InstallerPaths::new(workspace);
        let mut state = InstallState::load(&paths.workspace)?;
        state.set_meta([
            ("manifest", Value::from(manifest.file_name())),
            (
                "workspace",
                Value::from(paths.workspace.display().to_string()),
            ),
            ("dry_run", Value::from(options.dry_run)),
        ])?;
        Ok(Self {
            manifest,
            paths,
            options,
            executor,
            fetcher,
            state,
            catalog: None,
            linker: link_adapter,
        })
    }

    /// Replace the symlink step used when an adapter mount is missing.
    pub fn with_linker(mut self, linker: AdapterLinker) -> Self {
        self.linker = linker;
        self
    }

    pub fn state(&self) -> &InstallState {
        &self.state
    }

    pub fn paths(&self) -> &InstallerPaths {
        &self.paths
    }

    pub fn options(&self) -> InstallOptions {
        self.options
    }

    /// Catalog accepted during this run (fresh or from cache).
    pub fn catalog(&self) -> Option<&ProviderCatalog> {
        self.catalog.as_ref()
    }

    /// Run the full pipeline.
    ///
    /// On failure the error is recorded as a failed `install` step and returned.
    #[instrument(skip_all, fields(workspace = %self.paths.workspace.display(), dry_run = self.options.dry_run))]
    pub fn run(&mut self, include_models: bool) -> Result<()> {
        info!("install started");
        match self.run_stages(include_models) {
            Ok(()) => {
                info!("install finished");
                Ok(())
            }
            Err(err) => {
                error!(err = %format!("{err:#}"), "install failed");
                if let Err(record_err) = self.state.fail(stage::INSTALL, &err) {
                    warn!(err = %format!("{record_err:#}"), "could not record install failure");
                }
                Err(err)
            }
        }
    }

    fn run_stages(&mut self, include_models: bool) -> Result<()> {
        self.precheck()?;
        self.bootstrap_workspace()?;
        self.sync_repositories()?;
        self.apply_source_bindings()?;
        if include_models {
            self.prepare_models()?;
        } else {
            self.record(
                stage::MODELS,
                StepStatus::Skipped,
                "Model staging disabled",
                None,
            )?;
        }
        self.validate_provider_catalog()?;
        let manifest = self.manifest;
        let workflows = &manifest.workflows;
        self.run_workflow(
            stage::ONBOARDING,
            &workflows.onboarding,
            "Running onboarding",
            "Onboarding command completed",
        )?;
        self.run_workflow(
            stage::SMOKE,
            &workflows.smoke,
            "Running smoke check",
            "Smoke check completed",
        )?;
        self.finalize()
    }

    pub(crate) fn record(
        &mut self,
        name: &str,
        status: StepStatus,
        message: &str,
        details: Option<&Details>,
    ) -> Result<()> {
        self.state
            .record(name, status, Some(message), details.cloned())
    }

    fn precheck(&mut self) -> Result<()> {
        if self.manifest.repositories.is_empty() {
            return self.record(
                stage::PRECHECK,
                StepStatus::Warning,
                "No repositories configured",
                None,
            );
        }
        let msg = format!("Loaded manifest v{}", self.manifest.version);
        self.record(stage::PRECHECK, StepStatus::Ok, &msg, None)
    }

    fn bootstrap_workspace(&mut self) -> Result<()> {
        let workspace = self.paths.workspace.clone();
        if workspace.exists() {
            let msg = format!("Using existing workspace: {}", workspace.display());
            return self.record(stage::WORKSPACE, StepStatus::Ok, &msg, None);
        }
        let msg = format!("Creating workspace: {}", workspace.display());
        self.record(stage::WORKSPACE, StepStatus::Start, &msg, None)?;
        if self.options.dry_run {
            return self.record(
                stage::WORKSPACE,
                StepStatus::Ok,
                "Dry-run: workspace create skipped",
                None,
            );
        }
        fs::create_dir_all(&workspace)
            .with_context(|| format!("create workspace {}", workspace.display()))?;
        self.record(stage::WORKSPACE, StepStatus::Ok, "Workspace created", None)
    }

    /// Run an optional single-command workflow from the workspace root.
    fn run_workflow(
        &mut self,
        name: &str,
        workflow: &WorkflowCommand,
        start_message: &str,
        done_message: &str,
    ) -> Result<()> {
        let Some(command) = workflow.configured() else {
            let msg = format!("No {name} workflow configured");
            return self.record(name, StepStatus::Skipped, &msg, None);
        };
        self.record(name, StepStatus::Start, start_message, None)?;
        if self.options.dry_run {
            let msg = format!("Would run command: {command}");
            return self.record(name, StepStatus::Ok, &msg, None);
        }
        run_checked(
            self.executor,
            &split_command(command),
            &self.paths.workspace,
        )?;
        self.record(name, StepStatus::Ok, done_message, None)
    }

    fn finalize(&mut self) -> Result<()> {
        if self.options.dry_run {
            return self.record(stage::FINALIZE, StepStatus::Ok, "Dry-run complete", None);
        }
        let manifest_name = self.manifest.file_name();
        write_report(
            &self.paths.report_path,
            &ReportInput {
                manifest: &manifest_name,
                workspace: &self.paths.workspace,
                steps: self.state.steps(),
            },
        )?;
        self.record(stage::FINALIZE, StepStatus::Ok, "Installer finished", None)
    }
}

/// Build a details map from string keys.
pub(crate) fn details<I>(pairs: I) -> Details
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

pub(crate) fn path_value(path: &Path) -> Value {
    Value::from(path.display().to_string())
}
