//! Typed failures that abort an install run.
//!
//! Everything else travels as `anyhow::Error`; an [`InstallFailure`] inside it
//! marks a policy decision rather than an I/O accident, and callers can recover
//! it with `downcast_ref`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal policy violation or propagated command/validation failure.
#[derive(Debug, Error)]
pub enum InstallFailure {
    /// An external command exited non-zero (`-1` when killed by a signal).
    #[error("command failed (rc={code}): {command}")]
    CommandFailed { command: String, code: i32 },
    /// A required or strict-mode entity violated installer policy.
    #[error("{0}")]
    Policy(String),
    /// A required provider catalog could not be fetched, validated, or loaded from cache.
    #[error("required provider catalog unavailable (no usable cache at {})", path.display())]
    CatalogUnavailable { path: PathBuf },
}

impl InstallFailure {
    pub fn policy(message: impl Into<String>) -> Self {
        Self::Policy(message.into())
    }
}

/// Classify an error for the ledger's `details.type` field.
pub fn error_kind(err: &anyhow::Error) -> &'static str {
    if err.downcast_ref::<InstallFailure>().is_some() {
        return "InstallFailure";
    }
    if err.chain().any(|cause| cause.is::<io::Error>()) {
        return "IoError";
    }
    "Error"
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    #[test]
    fn command_failure_renders_command_and_code() {
        let err = InstallFailure::CommandFailed {
            command: "git fetch --all".to_string(),
            code: 128,
        };
        assert_eq!(err.to_string(), "command failed (rc=128): git fetch --all");
    }

    #[test]
    fn error_kind_sees_through_context() {
        let err = anyhow::Error::new(InstallFailure::policy("strict"))
            .context("apply binding");
        assert_eq!(error_kind(&err), "InstallFailure");

        let io_err: anyhow::Result<()> =
            Err(io::Error::from(io::ErrorKind::PermissionDenied)).context("write ledger");
        assert_eq!(error_kind(&io_err.unwrap_err()), "IoError");

        assert_eq!(error_kind(&anyhow!("plain")), "Error");
    }
}
