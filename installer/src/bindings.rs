//! Source-of-truth binding stage.
//!
//! Each binding mounts a canonical host path into the workspace as a symlink.
//! The on-disk observation is classified by [`crate::core::binding`]; this
//! module only performs the link and applies escalation.

use std::path::Path;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::core::binding::{AdapterState, classify_adapter, missing_canonical};
use crate::core::types::{Outcome, StepStatus};
use crate::engine::{InstallerEngine, details, path_value, stage};
use crate::error::InstallFailure;
use crate::io::catalog::CatalogFetcher;
use crate::io::executor::CommandExecutor;
use crate::io::manifest::SourceBinding;
use crate::io::mount::{create_adapter_dir, inspect_adapter, resolve_canonical};

impl<E: CommandExecutor, F: CatalogFetcher> InstallerEngine<'_, E, F> {
    #[instrument(skip_all, fields(count = self.manifest.canonical_bindings().len()))]
    pub(crate) fn apply_source_bindings(&mut self) -> Result<()> {
        let manifest = self.manifest;
        let bindings = manifest.canonical_bindings();
        if bindings.is_empty() {
            return self.record(
                stage::CANONICAL,
                StepStatus::Skipped,
                "No source-of-truth entries configured",
                None,
            );
        }
        for binding in bindings {
            self.apply_source_binding(binding)?;
        }
        Ok(())
    }

    fn apply_source_binding(&mut self, binding: &SourceBinding) -> Result<()> {
        let canonical = resolve_canonical(&binding.canonical_path);
        let adapter = self.paths.resolve(&binding.adapter_mount);
        let meta = details([
            ("name", Value::from(binding.name.as_str())),
            ("canonical", path_value(&canonical)),
            ("adapter", path_value(&adapter)),
            ("required", Value::from(binding.required)),
        ]);
        let msg = format!("Binding source {}", binding.name);
        self.record(stage::CANONICAL, StepStatus::Start, &msg, Some(&meta))?;

        let escalates = self.options.policy.escalates(binding.required);
        let outcome = match self.bind(binding, &canonical, &adapter) {
            Ok(outcome) => outcome,
            Err(err) if escalates => {
                let reason = format!("{err:#}");
                self.record(stage::CANONICAL, StepStatus::Failed, &reason, Some(&meta))?;
                return Err(err);
            }
            Err(err) => Outcome::Warning(format!("{err:#}")),
        };
        match outcome.escalate(escalates) {
            Outcome::Ok(msg) => self.record(stage::CANONICAL, StepStatus::Ok, &msg, Some(&meta)),
            Outcome::Warning(reason) => {
                warn!(binding = %binding.name, reason = %reason, "source binding degraded");
                self.record(stage::CANONICAL, StepStatus::Warning, &reason, Some(&meta))
            }
            Outcome::Fatal(reason) => {
                self.record(stage::CANONICAL, StepStatus::Failed, &reason, Some(&meta))?;
                Err(InstallFailure::Policy(reason).into())
            }
        }
    }

    /// Observe (and in live mode, create) the adapter, then classify it.
    fn bind(&self, binding: &SourceBinding, canonical: &Path, adapter: &Path) -> Result<Outcome> {
        let policy = self.options.policy;
        if !canonical.exists() {
            return Ok(missing_canonical(canonical, binding.required, policy));
        }

        let mut observed = inspect_adapter(adapter);
        if observed == AdapterState::Missing {
            if self.options.dry_run {
                return Ok(Outcome::Ok(format!(
                    "Would link {} -> {}",
                    adapter.display(),
                    canonical.display()
                )));
            }
            self.mount_adapter(adapter, canonical)?;
            observed = inspect_adapter(adapter);
        }
        debug!(binding = %binding.name, state = ?observed, "adapter observed");
        Ok(classify_adapter(
            &binding.name,
            canonical,
            adapter,
            &observed,
            policy,
        ))
    }

    /// Link the adapter, or materialize a directory when fallback is allowed.
    ///
    /// Strict mode still rejects the directory when it is classified.
    fn mount_adapter(&self, adapter: &Path, canonical: &Path) -> Result<()> {
        match (self.linker)(adapter, canonical) {
            Ok(()) => Ok(()),
            Err(err) if self.options.policy.fallback_allowed => {
                warn!(
                    adapter = %adapter.display(),
                    err = %format!("{err:#}"),
                    "symlink failed; creating adapter directory"
                );
                create_adapter_dir(adapter)
            }
            Err(err) => Err(err),
        }
    }
}
