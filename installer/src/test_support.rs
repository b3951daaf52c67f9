//! Test-only collaborators and manifest builders.

use std::cell::{Cell, RefCell};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::io::catalog::CatalogFetcher;
use crate::io::executor::{CommandExecutor, render_command};
use crate::io::manifest::{
    Manifest, ModelArtifact, ModelDescriptor, ProviderCatalogConfig, RepositoryDescriptor,
    SourceBinding,
};

/// One command observed by [`ScriptedExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub command: String,
    pub cwd: PathBuf,
}

/// Executor that records every call and returns scripted exit codes.
///
/// `git clone` calls create `<target>/.git` so later runs see a checkout.
pub struct ScriptedExecutor {
    calls: RefCell<Vec<RecordedCall>>,
    failures: Vec<(String, i32)>,
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            failures: Vec::new(),
        }
    }

    /// Commands whose rendered form starts with `prefix` exit with `code`.
    pub fn failing(mut self, prefix: &str, code: i32) -> Self {
        self.failures.push((prefix.to_string(), code));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|call| call.command.clone())
            .collect()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.command.starts_with(prefix))
            .count()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn run(&self, argv: &[String], cwd: &Path) -> Result<i32> {
        let command = render_command(argv);
        self.calls.borrow_mut().push(RecordedCall {
            command: command.clone(),
            cwd: cwd.to_path_buf(),
        });
        if let Some((_, code)) = self
            .failures
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
        {
            return Ok(*code);
        }
        if argv.get(1).map(String::as_str) == Some("clone")
            && let Some(target) = argv.last()
        {
            fs::create_dir_all(Path::new(target).join(".git"))?;
        }
        Ok(0)
    }
}

/// Fetcher returning a fixed payload or a fixed transport error.
pub struct StaticCatalogFetcher {
    response: std::result::Result<Value, String>,
    calls: Cell<usize>,
}

impl StaticCatalogFetcher {
    pub fn payload(payload: Value) -> Self {
        Self {
            response: Ok(payload),
            calls: Cell::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl CatalogFetcher for StaticCatalogFetcher {
    fn fetch(&self, _url: &str, _timeout: Duration) -> Result<Value> {
        self.calls.set(self.calls.get() + 1);
        self.response.clone().map_err(|message| anyhow!(message))
    }
}

/// Adapter linker for hosts that refuse symlinks. Fails like a real link error.
pub fn refuse_link(adapter: &Path, canonical: &Path) -> Result<()> {
    Err(io::Error::from(io::ErrorKind::PermissionDenied))
        .with_context(|| format!("link {} -> {}", adapter.display(), canonical.display()))
}

/// Catalog payload that passes schema validation.
pub fn valid_catalog() -> Value {
    json!({
        "providers": [
            {"name": "openai", "models": ["gpt-4o", {"id": "o3"}]},
            {"name": "local", "models": ["llama3"]}
        ]
    })
}

/// Catalog payload with a provider missing its models.
pub fn invalid_catalog() -> Value {
    json!({"providers": [{"name": "openai"}]})
}

/// Temporary root holding a workspace and canonical source directories.
pub struct TestWorkspace {
    root: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Workspace directory (not created).
    pub fn workspace(&self) -> PathBuf {
        self.root.path().join("ws")
    }

    /// Create a canonical source directory outside the workspace and return its resolved path.
    pub fn canonical_dir(&self, name: &str) -> PathBuf {
        let dir = self.root.path().join("canonical").join(name);
        fs::create_dir_all(&dir).expect("create canonical dir");
        fs::canonicalize(&dir).expect("canonicalize")
    }

    /// Empty manifest whose file name reports as `installer-manifest.yaml`.
    pub fn manifest(&self) -> Manifest {
        Manifest {
            path: self.root.path().join("installer-manifest.yaml"),
            ..Manifest::default()
        }
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

pub fn repo(name: &str, required: bool) -> RepositoryDescriptor {
    RepositoryDescriptor {
        name: name.to_string(),
        url: format!("https://example.invalid/{name}.git"),
        local_path: format!("repos/{name}"),
        branch: "main".to_string(),
        required,
        post_pull_steps: Vec::new(),
    }
}

pub fn binding(name: &str, canonical: &Path, mount: &str, required: bool) -> SourceBinding {
    SourceBinding {
        name: name.to_string(),
        canonical_path: canonical.display().to_string(),
        adapter_mount: mount.to_string(),
        required,
    }
}

pub fn model(name: &str, target_path: &str, files: &[(&str, Option<&str>)]) -> ModelDescriptor {
    ModelDescriptor {
        name: name.to_string(),
        provider: "local".to_string(),
        target_path: target_path.to_string(),
        files: files
            .iter()
            .map(|(source, checksum)| ModelArtifact {
                source: (*source).to_string(),
                checksum: checksum.map(str::to_string),
            })
            .collect(),
    }
}

pub fn catalog_config(required: bool) -> ProviderCatalogConfig {
    ProviderCatalogConfig {
        enabled: true,
        required,
        url: "https://catalog.example.invalid/providers.json".to_string(),
        ..ProviderCatalogConfig::default()
    }
}
