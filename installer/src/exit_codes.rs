//! Stable exit codes for installer CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Install failed, the manifest was invalid, or `status` found no ledger.
pub const FAILED: i32 = 1;
