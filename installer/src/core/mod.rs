//! Deterministic, pure logic shared by the installer engine.
//!
//! Core modules must be free of I/O side effects. They operate on observed
//! state handed in by the engine and return outcomes suitable for tests.

pub mod binding;
pub mod catalog;
pub mod types;
