//! Provider catalog transport and on-disk cache.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, instrument};

/// Abstraction over catalog retrieval.
pub trait CatalogFetcher {
    /// Fetch the raw catalog payload. Shape validation is the caller's job.
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Value>;
}

/// Fetcher that performs a blocking HTTP GET and decodes the body as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpCatalogFetcher;

impl CatalogFetcher for HttpCatalogFetcher {
    #[instrument(skip_all, fields(url = %url, timeout_secs = timeout.as_secs()))]
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Value> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;
        let response = client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("fetch catalog {url}"))?;
        let payload: Value = response
            .json()
            .with_context(|| format!("decode catalog {url}"))?;
        debug!("catalog fetched");
        Ok(payload)
    }
}

/// Read a previously accepted catalog payload.
pub fn read_cache(path: &Path) -> Result<Value> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read catalog cache {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parse catalog cache {}", path.display()))
}

/// Atomically persist an accepted payload, creating parent directories.
pub fn write_cache(path: &Path, payload: &Value) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("catalog cache path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut buf = serde_json::to_string_pretty(payload).context("serialize catalog")?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp catalog cache {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace catalog cache {}", path.display()))?;
    debug!(path = %path.display(), "catalog cache written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cache_round_trips_with_nested_parent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state/cache/provider-catalog.json");
        let payload = json!({"providers": [{"name": "local", "models": ["llama3"]}]});

        write_cache(&path, &payload).expect("write");
        assert_eq!(read_cache(&path).expect("read"), payload);
    }

    #[test]
    fn corrupt_cache_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("provider-catalog.json");
        fs::write(&path, "{not json").expect("write");
        let err = read_cache(&path).unwrap_err();
        assert!(err.to_string().contains("parse catalog cache"));
    }
}
