//! Source-of-truth binding policy.
//!
//! The engine observes the canonical path and the adapter mount on disk, then
//! asks these functions what the observation means under the active
//! [`SourcePolicy`]. Escalation of [`Outcome::Fatal`] is left to the caller.

use std::path::{Path, PathBuf};

use crate::core::types::{Outcome, SourcePolicy};

/// Observed shape of an adapter mount path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterState {
    /// Nothing at the path.
    Missing,
    /// Symbolic link. `resolved` is the fully resolved target, `None` when dangling.
    Symlink { resolved: Option<PathBuf> },
    /// Regular directory or file standing in for the canonical source.
    Materialized,
    /// Present but not usable as a mount (permission denied, socket, fifo, ...).
    Unusable(String),
}

/// Outcome when the canonical source does not exist.
pub fn missing_canonical(canonical: &Path, required: bool, policy: SourcePolicy) -> Outcome {
    let msg = format!("canonical source missing: {}", canonical.display());
    if policy.escalates(required) {
        Outcome::Fatal(msg)
    } else {
        Outcome::Warning(msg)
    }
}

/// Outcome for an adapter mount once the canonical source is known to exist.
///
/// `canonical` must already be fully resolved so it compares equal to a
/// resolved symlink target.
pub fn classify_adapter(
    name: &str,
    canonical: &Path,
    adapter: &Path,
    state: &AdapterState,
    policy: SourcePolicy,
) -> Outcome {
    match state {
        AdapterState::Missing => Outcome::Fatal(format!(
            "adapter mount missing after link attempt: {}",
            adapter.display()
        )),
        AdapterState::Symlink {
            resolved: Some(target),
        } if target == canonical => Outcome::Ok(format!("Canonical symlink active for {name}")),
        AdapterState::Symlink {
            resolved: Some(target),
        } => {
            if policy.accepts_copy() {
                Outcome::Warning(format!(
                    "Symlink target mismatch; keeping explicit state ({} -> {})",
                    adapter.display(),
                    target.display()
                ))
            } else {
                Outcome::Fatal(format!(
                    "adapter points to unexpected source: {}",
                    target.display()
                ))
            }
        }
        AdapterState::Symlink { resolved: None } => Outcome::Fatal(format!(
            "adapter symlink is dangling: {}",
            adapter.display()
        )),
        AdapterState::Materialized => {
            if policy.accepts_copy() {
                Outcome::Ok(format!("Accepting adapter copy for {name}"))
            } else {
                Outcome::Fatal(format!(
                    "canonical path must be mounted as symlink: {} -> {}; copy fallback disabled",
                    adapter.display(),
                    canonical.display()
                ))
            }
        }
        AdapterState::Unusable(reason) => Outcome::Fatal(format!(
            "adapter path unusable: {}: {reason}",
            adapter.display()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERMISSIVE: SourcePolicy = SourcePolicy {
        strict_source: false,
        fallback_allowed: true,
    };
    const DEFAULT: SourcePolicy = SourcePolicy {
        strict_source: false,
        fallback_allowed: false,
    };
    const STRICT_WITH_FALLBACK: SourcePolicy = SourcePolicy {
        strict_source: true,
        fallback_allowed: true,
    };

    fn classify(state: &AdapterState, policy: SourcePolicy) -> Outcome {
        classify_adapter(
            "rw",
            Path::new("/canon/rw"),
            Path::new("/ws/vendor/rw"),
            state,
            policy,
        )
    }

    #[test]
    fn missing_canonical_is_fatal_when_required_or_strict() {
        let canonical = Path::new("/canon/missing");
        assert!(matches!(
            missing_canonical(canonical, true, DEFAULT),
            Outcome::Fatal(_)
        ));
        let strict = SourcePolicy {
            strict_source: true,
            fallback_allowed: false,
        };
        assert!(matches!(
            missing_canonical(canonical, false, strict),
            Outcome::Fatal(_)
        ));
        let outcome = missing_canonical(canonical, false, PERMISSIVE);
        assert_eq!(
            outcome,
            Outcome::Warning("canonical source missing: /canon/missing".to_string())
        );
    }

    #[test]
    fn matching_symlink_is_ok_under_every_policy() {
        let state = AdapterState::Symlink {
            resolved: Some(PathBuf::from("/canon/rw")),
        };
        for policy in [PERMISSIVE, DEFAULT, STRICT_WITH_FALLBACK] {
            assert_eq!(
                classify(&state, policy),
                Outcome::Ok("Canonical symlink active for rw".to_string())
            );
        }
    }

    #[test]
    fn mismatched_symlink_warns_only_with_fallback_outside_strict() {
        let state = AdapterState::Symlink {
            resolved: Some(PathBuf::from("/elsewhere")),
        };
        assert!(matches!(classify(&state, PERMISSIVE), Outcome::Warning(_)));
        assert!(matches!(classify(&state, DEFAULT), Outcome::Fatal(_)));
        assert!(matches!(
            classify(&state, STRICT_WITH_FALLBACK),
            Outcome::Fatal(_)
        ));
    }

    #[test]
    fn materialized_copy_requires_fallback_outside_strict() {
        let state = AdapterState::Materialized;
        assert_eq!(
            classify(&state, PERMISSIVE),
            Outcome::Ok("Accepting adapter copy for rw".to_string())
        );
        let Outcome::Fatal(reason) = classify(&state, DEFAULT) else {
            panic!("expected fatal outcome");
        };
        assert!(reason.contains("copy fallback disabled"));
        assert!(matches!(
            classify(&state, STRICT_WITH_FALLBACK),
            Outcome::Fatal(_)
        ));
    }

    #[test]
    fn dangling_and_unusable_adapters_are_explicit_errors() {
        let dangling = AdapterState::Symlink { resolved: None };
        assert!(matches!(classify(&dangling, PERMISSIVE), Outcome::Fatal(_)));
        let unusable = AdapterState::Unusable("permission denied".to_string());
        let outcome = classify(&unusable, PERMISSIVE);
        assert!(outcome.message().contains("permission denied"));
    }
}
