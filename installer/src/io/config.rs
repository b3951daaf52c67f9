//! Run options resolved from command-line flags, environment, and manifest.

use crate::core::types::SourcePolicy;
use crate::io::manifest::Manifest;

/// `1` forces strict source-of-truth mode.
pub const ENFORCE_ENV: &str = "INSTALLER_CANONICAL_ENFORCE";
/// `1` allows copy fallback for adapter mounts.
pub const FALLBACK_ENV: &str = "INSTALLER_CANONICAL_FALLBACK_ALLOWED";

/// Options fixed for the lifetime of one engine run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Plan-only: no repository, link, model, report, or network side effects.
    pub dry_run: bool,
    pub policy: SourcePolicy,
}

/// Command-line flags that feed [`InstallOptions::resolve`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionFlags {
    pub dry_run: bool,
    pub strict_source: bool,
    pub allow_copy_fallback: bool,
}

impl InstallOptions {
    /// Resolve options using the process environment.
    pub fn resolve(flags: &OptionFlags, manifest: &Manifest) -> Self {
        Self::resolve_with_env(flags, manifest, |key| std::env::var(key).ok())
    }

    /// Resolve options with an explicit environment lookup.
    ///
    /// The manifest's `allow_copy_fallback` only applies when neither policy
    /// flag was passed on the command line.
    pub fn resolve_with_env<F>(flags: &OptionFlags, manifest: &Manifest, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let strict_source = flags.strict_source || env_enabled(env(ENFORCE_ENV));
        let mut fallback_allowed = flags.allow_copy_fallback || env_enabled(env(FALLBACK_ENV));
        if !flags.allow_copy_fallback && !flags.strict_source {
            fallback_allowed |= manifest.source_of_truth.allow_copy_fallback;
        }
        Self {
            dry_run: flags.dry_run,
            policy: SourcePolicy {
                strict_source,
                fallback_allowed,
            },
        }
    }
}

fn env_enabled(value: Option<String>) -> bool {
    value.as_deref().map(str::trim) == Some("1")
}
