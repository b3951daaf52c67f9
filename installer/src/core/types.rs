//! Shared types for installer decision logic.
//!
//! These types define stable contracts between the engine, the ledger and the
//! policy functions in [`crate::core`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Status carried by a ledger step record.
///
/// Serialized as a lowercase string. Strings this version does not know are
/// kept verbatim in [`StepStatus::Unknown`] so re-saving a ledger written by a
/// newer installer does not rewrite its history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepStatus {
    Start,
    Ok,
    Info,
    Warning,
    Skipped,
    Failed,
    Unknown(String),
}

impl StepStatus {
    pub fn as_str(&self) -> &str {
        match self {
            StepStatus::Start => "start",
            StepStatus::Ok => "ok",
            StepStatus::Info => "info",
            StepStatus::Warning => "warning",
            StepStatus::Skipped => "skipped",
            StepStatus::Failed => "failed",
            StepStatus::Unknown(raw) => raw,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "start" => StepStatus::Start,
            "ok" => StepStatus::Ok,
            "info" => StepStatus::Info,
            "warning" => StepStatus::Warning,
            "skipped" => StepStatus::Skipped,
            "failed" => StepStatus::Failed,
            other => StepStatus::Unknown(other.to_string()),
        }
    }

    /// True for statuses that close a stage rather than open or annotate it.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Ok | StepStatus::Warning | StepStatus::Skipped | StepStatus::Failed
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StepStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StepStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(StepStatus::parse(&raw))
    }
}

/// Source-of-truth policy for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourcePolicy {
    /// Any non-canonical mount is fatal. Overrides `fallback_allowed`.
    pub strict_source: bool,
    /// Independently materialized copies may stand in for canonical links.
    pub fallback_allowed: bool,
}

impl SourcePolicy {
    /// Copy fallback is honoured only outside strict mode.
    pub fn accepts_copy(&self) -> bool {
        self.fallback_allowed && !self.strict_source
    }

    /// Whether a fatal outcome for this item must abort the whole run.
    pub fn escalates(&self, required: bool) -> bool {
        required || self.strict_source
    }
}

/// Result of resolving a single item (binding, catalog, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Item is in the desired state.
    Ok(String),
    /// Item degraded; the run continues.
    Warning(String),
    /// Item violates policy; the caller decides whether the run aborts.
    Fatal(String),
}

impl Outcome {
    /// Downgrade `Fatal` to `Warning` unless the item escalates.
    pub fn escalate(self, escalates: bool) -> Outcome {
        match self {
            Outcome::Fatal(reason) if !escalates => Outcome::Warning(reason),
            other => other,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Outcome::Ok(msg) | Outcome::Warning(msg) | Outcome::Fatal(msg) => msg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_overrides_fallback() {
        let policy = SourcePolicy {
            strict_source: true,
            fallback_allowed: true,
        };
        assert!(!policy.accepts_copy());
        assert!(policy.escalates(false));
    }

    #[test]
    fn fatal_downgrades_only_when_not_escalating() {
        let fatal = Outcome::Fatal("boom".to_string());
        assert_eq!(
            fatal.clone().escalate(false),
            Outcome::Warning("boom".to_string())
        );
        assert_eq!(fatal.clone().escalate(true), fatal);
        assert_eq!(
            Outcome::Ok("fine".to_string()).escalate(false),
            Outcome::Ok("fine".to_string())
        );
    }

    #[test]
    fn unknown_status_keeps_its_raw_text() {
        let status: StepStatus = serde_json::from_str("\"paused\"").expect("parse");
        assert_eq!(status, StepStatus::Unknown("paused".to_string()));
        assert!(!status.is_terminal());
        assert_eq!(serde_json::to_string(&status).expect("serialize"), "\"paused\"");
        let status: StepStatus = serde_json::from_str("\"warning\"").expect("parse");
        assert_eq!(status, StepStatus::Warning);
        assert_eq!(serde_json::to_string(&status).expect("serialize"), "\"warning\"");
    }
}
