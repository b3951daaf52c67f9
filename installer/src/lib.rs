//! Manifest-driven workspace installer.
//!
//! Brings a workspace directory into a known-good state from a declarative
//! manifest (repositories, canonical-source bindings, model artifacts, a
//! provider catalog and workflow hooks) and records every step in an
//! append-only ledger (`install-state.json`). The architecture keeps a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic policy decisions (binding outcomes,
//!   catalog shape checks). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (ledger persistence, process
//!   execution, filesystem probes, HTTP fetches, manifest loading).
//!
//! Orchestration modules ([`engine`], [`repositories`], [`bindings`],
//! [`models`], [`provider_catalog`], [`commands`]) coordinate core logic with
//! I/O to implement the install pipeline and CLI commands.

pub mod bindings;
pub mod commands;
pub mod core;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod models;
pub mod provider_catalog;
pub mod repositories;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
