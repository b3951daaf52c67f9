//! Git command lines for repository sync.
//!
//! Commands are only built here; they run through the injected
//! [`CommandExecutor`](crate::io::executor::CommandExecutor) so dry-runs and
//! tests never reach a real remote.

use std::path::Path;

fn git(args: &[&str]) -> Vec<String> {
    std::iter::once("git")
        .chain(args.iter().copied())
        .map(str::to_string)
        .collect()
}

/// True if `path` carries a repository marker (`.git` directory or worktree file).
pub fn is_repository(path: &Path) -> bool {
    path.join(".git").exists()
}

pub fn fetch_all() -> Vec<String> {
    git(&["fetch", "--all"])
}

pub fn checkout(branch: &str) -> Vec<String> {
    git(&["checkout", branch])
}

/// Fast-forward only, so local divergence surfaces as a failure instead of a merge.
pub fn pull_fast_forward(branch: &str) -> Vec<String> {
    git(&["pull", "--ff-only", "origin", branch])
}

pub fn shallow_clone(url: &str, branch: &str, target: &Path) -> Vec<String> {
    let target = target.to_string_lossy();
    git(&["clone", "--depth", "1", "--branch", branch, url, &target])
}
