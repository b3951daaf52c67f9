//! Provider catalog validation stage.
//!
//! A freshly fetched payload must pass the catalog schema before it replaces
//! the cache. When it does not, a required catalog falls back to the last
//! accepted cache or aborts; an optional catalog only warns.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::core::catalog::{CatalogCheck, ProviderCatalog, check_catalog};
use crate::core::types::StepStatus;
use crate::engine::{InstallerEngine, details, path_value, stage};
use crate::error::InstallFailure;
use crate::io::catalog::{CatalogFetcher, read_cache, write_cache};
use crate::io::executor::CommandExecutor;
use crate::io::ledger::Details;

/// Why a fetched catalog was not accepted.
#[derive(Debug)]
enum Rejection {
    FetchError(String),
    Invalid(Vec<String>),
}

impl Rejection {
    fn reason(&self) -> &'static str {
        match self {
            Rejection::FetchError(_) => "fetch_error",
            Rejection::Invalid(_) => "invalid",
        }
    }

    fn errors(&self) -> Vec<String> {
        match self {
            Rejection::FetchError(err) => vec![err.clone()],
            Rejection::Invalid(errors) => errors.clone(),
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            Rejection::FetchError(_) => "Provider catalog fetch failed",
            Rejection::Invalid(_) => "Provider catalog failed validation",
        }
    }
}

impl<E: CommandExecutor, F: CatalogFetcher> InstallerEngine<'_, E, F> {
    #[instrument(skip_all, fields(enabled = self.manifest.provider_catalog.enabled))]
    pub(crate) fn validate_provider_catalog(&mut self) -> Result<()> {
        let manifest = self.manifest;
        let config = &manifest.provider_catalog;
        if !config.enabled {
            return self.record(
                stage::PROVIDER_CATALOG,
                StepStatus::Skipped,
                "Provider catalog disabled",
                None,
            );
        }

        let cache_path = self.paths.resolve(&config.cache_path);
        let mut meta = details([
            ("url", Value::from(config.url.as_str())),
            ("cache_path", path_value(&cache_path)),
            ("required", Value::from(config.required)),
        ]);
        if self.options.dry_run {
            return self.record(
                stage::PROVIDER_CATALOG,
                StepStatus::Ok,
                "Dry-run: catalog fetch skipped",
                Some(&meta),
            );
        }

        let msg = format!("Fetching provider catalog {}", config.url);
        self.record(stage::PROVIDER_CATALOG, StepStatus::Start, &msg, Some(&meta))?;

        let timeout = Duration::from_secs(config.timeout_seconds);
        let rejection = match self.fetcher.fetch(&config.url, timeout) {
            Ok(payload) => match check_catalog(&payload)? {
                CatalogCheck::Valid(catalog) => {
                    write_cache(&cache_path, &payload)?;
                    let msg = format!(
                        "Provider catalog validated ({} providers, {} models)",
                        catalog.providers.len(),
                        catalog.model_count()
                    );
                    info!(providers = catalog.providers.len(), "provider catalog accepted");
                    self.catalog = Some(catalog);
                    return self.record(stage::PROVIDER_CATALOG, StepStatus::Ok, &msg, Some(&meta));
                }
                CatalogCheck::Invalid(errors) => Rejection::Invalid(errors),
            },
            Err(err) => Rejection::FetchError(format!("{err:#}")),
        };

        meta.insert("reason".to_string(), Value::from(rejection.reason()));
        meta.insert("errors".to_string(), Value::from(rejection.errors()));
        warn!(reason = rejection.reason(), "provider catalog rejected");

        if config.required {
            self.fall_back_to_cache(&cache_path, &rejection, &meta)
        } else {
            let msg = format!("{}; continuing without catalog", rejection.summary());
            self.record(stage::PROVIDER_CATALOG, StepStatus::Warning, &msg, Some(&meta))
        }
    }

    /// Reuse the last accepted catalog or abort. The cache file is never rewritten here.
    fn fall_back_to_cache(
        &mut self,
        cache_path: &Path,
        rejection: &Rejection,
        meta: &Details,
    ) -> Result<()> {
        match load_cached_catalog(cache_path) {
            Some(catalog) => {
                self.catalog = Some(catalog);
                let msg = format!("{}; using cached catalog", rejection.summary());
                self.record(stage::PROVIDER_CATALOG, StepStatus::Warning, &msg, Some(meta))
            }
            None => {
                let failure = InstallFailure::CatalogUnavailable {
                    path: cache_path.to_path_buf(),
                };
                self.record(
                    stage::PROVIDER_CATALOG,
                    StepStatus::Failed,
                    &failure.to_string(),
                    Some(meta),
                )?;
                Err(failure.into())
            }
        }
    }
}

/// A previously accepted cache, or `None` when absent or unreadable.
fn load_cached_catalog(path: &Path) -> Option<ProviderCatalog> {
    if !path.exists() {
        return None;
    }
    let parsed: Result<ProviderCatalog> = read_cache(path)
        .and_then(|payload| serde_json::from_value(payload).context("parse cached catalog"));
    match parsed {
        Ok(catalog) => Some(catalog),
        Err(err) => {
            warn!(path = %path.display(), err = %format!("{err:#}"), "catalog cache unusable");
            None
        }
    }
}
