//! I/O helpers for installer stages.

pub mod catalog;
pub mod config;
pub mod executor;
pub mod git;
pub mod ledger;
pub mod manifest;
pub mod mount;
pub mod paths;
pub mod report;
