//! Installer manifest: the declarative description of a workspace.
//!
//! Manifests are YAML (`.yaml`/`.yml`) or TOML (`.toml`). Missing optional
//! fields default to the values documented on each field; the engine only
//! reads a loaded manifest.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::io::mount::expand_home;

/// Default cache location for the provider catalog, relative to the workspace.
pub const DEFAULT_CATALOG_CACHE: &str = "state/provider-catalog.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Absolute path the manifest was loaded from (empty for in-memory manifests).
    #[serde(skip)]
    pub path: PathBuf,
    /// Free-form manifest version, recorded in the precheck step.
    #[serde(deserialize_with = "version_string")]
    pub version: String,
    pub description: Option<String>,
    pub workspace: WorkspaceConfig,
    pub repositories: Vec<RepositoryDescriptor>,
    pub models: Vec<ModelDescriptor>,
    pub source_of_truth: SourceOfTruth,
    pub workflows: Workflows,
    pub provider_catalog: ProviderCatalogConfig,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            version: "0".to_string(),
            description: None,
            workspace: WorkspaceConfig::default(),
            repositories: Vec::new(),
            models: Vec::new(),
            source_of_truth: SourceOfTruth::default(),
            workflows: Workflows::default(),
            provider_catalog: ProviderCatalogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Workspace root; `~` is expanded, relative paths resolve against the current directory.
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    pub name: String,
    pub url: String,
    /// Checkout location relative to the workspace.
    pub local_path: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// A required repository's failure aborts the run.
    #[serde(default)]
    pub required: bool,
    /// Commands run inside the checkout after every sync.
    #[serde(default)]
    pub post_pull_steps: Vec<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Staging location relative to the workspace; a path with an extension stages into its parent.
    #[serde(default)]
    pub target_path: String,
    pub files: Vec<ModelArtifact>,
}

fn default_provider() -> String {
    "local".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub source: String,
    #[serde(default)]
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOfTruth {
    pub allow_copy_fallback: bool,
    pub entries: Vec<SourceBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBinding {
    pub name: String,
    /// Authoritative location on the host (`~` expanded).
    pub canonical_path: String,
    /// Mount location relative to the workspace.
    pub adapter_mount: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workflows {
    pub onboarding: WorkflowCommand,
    pub smoke: WorkflowCommand,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowCommand {
    /// Whitespace-separated command line run from the workspace root.
    pub command: Option<String>,
}

impl WorkflowCommand {
    /// The configured command, ignoring blank strings.
    pub fn configured(&self) -> Option<&str> {
        self.command.as_deref().filter(|cmd| !cmd.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderCatalogConfig {
    pub enabled: bool,
    /// A required catalog without a valid fetch must fall back to its cache or abort.
    pub required: bool,
    pub url: String,
    /// Cache file relative to the workspace.
    pub cache_path: String,
    pub timeout_seconds: u64,
}

impl Default for ProviderCatalogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            required: false,
            url: String::new(),
            cache_path: DEFAULT_CATALOG_CACHE.to_string(),
            timeout_seconds: 10,
        }
    }
}

/// Serialization format of a manifest file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Yaml,
    Toml,
}

impl ManifestFormat {
    /// Pick the format from the file extension; anything but `.toml` is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ManifestFormat::Toml,
            _ => ManifestFormat::Yaml,
        }
    }
}

impl Manifest {
    /// Load, parse and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let path = std::path::absolute(path)
            .with_context(|| format!("resolve manifest path {}", path.display()))?;
        debug!(path = %path.display(), "loading manifest");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("read manifest {}", path.display()))?;
        let mut manifest = Self::parse(&contents, ManifestFormat::from_path(&path))
            .with_context(|| format!("parse manifest {}", path.display()))?;
        manifest.path = path;
        manifest.validate()?;
        debug!(
            repositories = manifest.repositories.len(),
            models = manifest.models.len(),
            bindings = manifest.source_of_truth.entries.len(),
            "manifest loaded"
        );
        Ok(manifest)
    }

    /// Parse manifest text without validating it. An empty document is the default manifest.
    pub fn parse(contents: &str, format: ManifestFormat) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let manifest = match format {
            ManifestFormat::Yaml => serde_yaml::from_str(contents)?,
            ManifestFormat::Toml => toml::from_str(contents)?,
        };
        Ok(manifest)
    }

    /// Reject manifests the engine cannot act on.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        for repo in &self.repositories {
            if repo.name.trim().is_empty() {
                errors.push(format!("repository {} has an empty name", repo.url));
            }
        }
        for binding in &self.source_of_truth.entries {
            if binding.name.trim().is_empty() {
                errors.push(format!(
                    "source binding for {} has an empty name",
                    binding.canonical_path
                ));
            }
        }
        for model in &self.models {
            if model.files.is_empty() {
                errors.push(format!("model config {} requires files", model.name));
            }
        }
        let catalog = &self.provider_catalog;
        if catalog.enabled {
            if catalog.url.trim().is_empty() {
                errors.push("provider_catalog.url must be set when enabled".to_string());
            }
            if catalog.timeout_seconds == 0 {
                errors.push("provider_catalog.timeout_seconds must be > 0".to_string());
            }
        }
        if !errors.is_empty() {
            bail!("invalid manifest:\n- {}", errors.join("\n- "));
        }
        Ok(())
    }

    /// File name recorded in ledger metadata.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Resolve the workspace root declared by the manifest.
    ///
    /// Relative paths are made absolute against the current directory with
    /// `.` components dropped.
    pub fn workspace(&self) -> Result<PathBuf> {
        match self.workspace.path.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                let expanded = expand_home(raw);
                std::path::absolute(&expanded)
                    .with_context(|| format!("resolve workspace {}", expanded.display()))
            }
            _ => std::env::current_dir().context("read current directory"),
        }
    }

    pub fn canonical_bindings(&self) -> &[SourceBinding] {
        &self.source_of_truth.entries
    }
}

/// Accept `version: 1`, `version: 1.0` and `version: "1.0"` alike.
fn version_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawVersion {
        Text(String),
        Int(i64),
        Float(f64),
    }
    Ok(match RawVersion::deserialize(deserializer)? {
        RawVersion::Text(text) => text,
        RawVersion::Int(value) => value.to_string(),
        RawVersion::Float(value) => format!("{value:?}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML_MANIFEST: &str = r#"
version: "1.0"
workspace:
  path: "./workspace"
repositories:
  - name: core
    url: https://example.invalid/core.git
    local_path: repos/core
    required: true
    post_pull_steps:
      - "make setup"
models: []
source_of_truth:
  allow_copy_fallback: true
  entries:
    - name: RangeWriter4-a
      canonical_path: "~/canons/rw4"
      adapter_mount: "core/vendor/rangewriter"
      required: true
workflows:
  onboarding:
    command: "make onboard"
"#;

    fn write_manifest(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).expect("write manifest");
        path
    }

    #[test]
    fn loads_yaml_with_workspace_and_source_mappings() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_manifest(temp.path(), "manifest.yaml", YAML_MANIFEST);

        let manifest = Manifest::load(&path).expect("load");
        assert_eq!(manifest.version, "1.0");
        assert_eq!(manifest.file_name(), "manifest.yaml");
        assert!(manifest.source_of_truth.allow_copy_fallback);
        let bindings = manifest.canonical_bindings();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].name, "RangeWriter4-a");
        assert!(bindings[0].required);

        let repo = &manifest.repositories[0];
        assert_eq!(repo.branch, "main");
        assert_eq!(repo.post_pull_steps, vec!["make setup"]);
        assert_eq!(
            manifest.workflows.onboarding.configured(),
            Some("make onboard")
        );
        assert_eq!(manifest.workflows.smoke.configured(), None);
        assert!(!manifest.provider_catalog.enabled);
        assert_eq!(manifest.provider_catalog.cache_path, DEFAULT_CATALOG_CACHE);
    }

    #[test]
    fn loads_provider_catalog_block() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_manifest(
            temp.path(),
            "manifest.yml",
            r#"
version: 1.0
provider_catalog:
  enabled: true
  required: true
  url: "https://example.invalid/provider-catalog.json"
  cache_path: "state/provider-catalog.json"
  timeout_seconds: 4
"#,
        );
        let manifest = Manifest::load(&path).expect("load");
        assert_eq!(manifest.version, "1.0");
        let catalog = &manifest.provider_catalog;
        assert!(catalog.enabled);
        assert!(catalog.required);
        assert_eq!(catalog.url, "https://example.invalid/provider-catalog.json");
        assert_eq!(catalog.cache_path, "state/provider-catalog.json");
        assert_eq!(catalog.timeout_seconds, 4);
    }

    #[test]
    fn loads_toml_manifest() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_manifest(
            temp.path(),
            "manifest.toml",
            r#"
version = 2

[[models]]
name = "embedder"
target_path = "models/embedder/model.gguf"
files = [{ source = "hf://org/embedder/model.gguf", checksum = "abc123" }]

[workflows.smoke]
command = "make smoke"
"#,
        );
        let manifest = Manifest::load(&path).expect("load");
        assert_eq!(manifest.version, "2");
        assert_eq!(manifest.models[0].provider, "local");
        assert_eq!(
            manifest.models[0].files[0].checksum.as_deref(),
            Some("abc123")
        );
        assert_eq!(manifest.workflows.smoke.configured(), Some("make smoke"));
    }

    #[test]
    fn empty_manifest_is_default() {
        let manifest = Manifest::parse("  \n", ManifestFormat::Yaml).expect("parse");
        assert_eq!(manifest, Manifest::default());
        assert_eq!(manifest.version, "0");
    }

    #[test]
    fn validate_collects_all_problems() {
        let mut manifest = Manifest::default();
        manifest.models.push(ModelDescriptor {
            name: "empty".to_string(),
            provider: default_provider(),
            target_path: "models/empty".to_string(),
            files: Vec::new(),
        });
        manifest.provider_catalog.enabled = true;
        manifest.provider_catalog.timeout_seconds = 0;

        let msg = manifest.validate().unwrap_err().to_string();
        assert!(msg.contains("model config empty requires files"));
        assert!(msg.contains("provider_catalog.url"));
        assert!(msg.contains("timeout_seconds"));
    }

    #[test]
    fn repository_requires_url_and_local_path() {
        let err = Manifest::parse(
            "repositories:\n  - name: core\n",
            ManifestFormat::Yaml,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("missing field"));
    }

    #[test]
    fn workspace_resolves_relative_to_current_dir() {
        let mut manifest = Manifest::default();
        let cwd = std::env::current_dir().expect("cwd");
        assert_eq!(manifest.workspace().expect("workspace"), cwd);

        manifest.workspace.path = Some("./ws".to_string());
        let resolved = manifest.workspace().expect("workspace");
        assert_eq!(
            resolved.as_os_str(),
            cwd.join("ws").as_os_str(),
            "current-dir components must not leak into the workspace path"
        );

        manifest.workspace.path = Some("nested/./ws".to_string());
        assert_eq!(
            manifest.workspace().expect("workspace").as_os_str(),
            cwd.join("nested/ws").as_os_str()
        );

        manifest.workspace.path = Some("/abs/ws".to_string());
        assert_eq!(
            manifest.workspace().expect("workspace"),
            PathBuf::from("/abs/ws")
        );
    }
}
