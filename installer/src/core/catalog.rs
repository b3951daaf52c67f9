//! Provider catalog shape validation.
//!
//! Transport-independent: the payload is checked against an embedded JSON
//! Schema and then parsed into typed structs. A payload that parses as JSON but
//! fails either check is *invalid*, which the engine treats differently from a
//! fetch error.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const CATALOG_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/provider_catalog.schema.json"
));

/// Accepted provider catalog (`{providers: [{name, models: [...]}]}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCatalog {
    pub providers: Vec<CatalogProvider>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProvider {
    pub name: String,
    pub models: Vec<CatalogModel>,
}

/// A model listed by a provider: a bare id, or an object with an `id` and
/// provider-specific extras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatalogModel {
    Id(String),
    Entry {
        id: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

impl CatalogModel {
    pub fn id(&self) -> &str {
        match self {
            CatalogModel::Id(id) | CatalogModel::Entry { id, .. } => id,
        }
    }
}

impl ProviderCatalog {
    pub fn provider(&self, name: &str) -> Option<&CatalogProvider> {
        self.providers.iter().find(|provider| provider.name == name)
    }

    pub fn model_count(&self) -> usize {
        self.providers.iter().map(|provider| provider.models.len()).sum()
    }
}

/// Result of checking a fetched payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogCheck {
    Valid(ProviderCatalog),
    /// Shape violations, one message per problem.
    Invalid(Vec<String>),
}

/// Validate `payload` against the catalog schema and parse it.
///
/// Errors only when the embedded schema itself is unusable.
pub fn check_catalog(payload: &Value) -> Result<CatalogCheck> {
    let schema: Value = serde_json::from_str(CATALOG_SCHEMA).context("parse catalog schema")?;
    let validator = jsonschema::validator_for(&schema)
        .map_err(|err| anyhow!("invalid catalog schema: {}", err))?;
    let messages: Vec<String> = validator
        .iter_errors(payload)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Ok(CatalogCheck::Invalid(messages));
    }
    match serde_json::from_value::<ProviderCatalog>(payload.clone()) {
        Ok(catalog) => Ok(CatalogCheck::Valid(catalog)),
        Err(err) => Ok(CatalogCheck::Invalid(vec![err.to_string()])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(payload: Value) -> CatalogCheck {
        check_catalog(&payload).expect("schema compiles")
    }

    #[test]
    fn accepts_string_and_object_models() {
        let outcome = check(json!({
            "providers": [
                {"name": "openai", "models": ["gpt-4o", {"id": "o3", "context": 200000}]},
                {"name": "local", "models": ["llama3"]}
            ]
        }));
        let CatalogCheck::Valid(catalog) = outcome else {
            panic!("expected valid catalog");
        };
        assert_eq!(catalog.model_count(), 3);
        let openai = catalog.provider("openai").expect("provider");
        assert_eq!(openai.models[1].id(), "o3");
    }

    #[test]
    fn rejects_provider_without_name() {
        let outcome = check(json!({"providers": [{"models": ["m"]}]}));
        assert!(matches!(outcome, CatalogCheck::Invalid(ref errors) if !errors.is_empty()));
    }

    #[test]
    fn rejects_empty_or_mistyped_model_lists() {
        assert!(matches!(
            check(json!({"providers": [{"name": "p", "models": []}]})),
            CatalogCheck::Invalid(_)
        ));
        assert!(matches!(
            check(json!({"providers": [{"name": "p", "models": [42]}]})),
            CatalogCheck::Invalid(_)
        ));
        assert!(matches!(
            check(json!({"providers": [{"name": "p", "models": "gpt"}]})),
            CatalogCheck::Invalid(_)
        ));
    }

    #[test]
    fn rejects_non_object_payload() {
        assert!(matches!(check(json!(["providers"])), CatalogCheck::Invalid(_)));
        assert!(matches!(check(json!({})), CatalogCheck::Invalid(_)));
    }
}
