//! Completion report rendered on a successful live run.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::types::StepStatus;
use crate::io::ledger::StepRecord;

const REPORT_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/templates/report.md.j2"
));

/// Inputs for the report template.
#[derive(Debug, Clone)]
pub struct ReportInput<'a> {
    pub manifest: &'a str,
    pub workspace: &'a Path,
    pub steps: &'a [StepRecord],
}

#[derive(Debug, Serialize)]
struct StatusCount<'a> {
    status: &'a str,
    count: usize,
}

#[derive(Debug, Serialize)]
struct Note<'a> {
    name: &'a str,
    status: &'a str,
    message: &'a str,
}

/// Render the report markdown.
pub fn render_report(input: &ReportInput<'_>) -> Result<String> {
    let mut counts: BTreeMap<&StepStatus, usize> = BTreeMap::new();
    for step in input.steps {
        *counts.entry(&step.status).or_default() += 1;
    }
    let counts: Vec<StatusCount<'_>> = counts
        .into_iter()
        .map(|(status, count)| StatusCount {
            status: status.as_str(),
            count,
        })
        .collect();
    let notes: Vec<Note<'_>> = input
        .steps
        .iter()
        .filter(|step| matches!(step.status, StepStatus::Warning | StepStatus::Skipped))
        .map(|step| Note {
            name: &step.name,
            status: step.status.as_str(),
            message: step.message.as_deref().unwrap_or(""),
        })
        .collect();

    let mut env = Environment::new();
    env.add_template("report", REPORT_TEMPLATE)
        .context("parse report template")?;
    let template = env.get_template("report")?;
    let mut rendered = template
        .render(context! {
            manifest => input.manifest,
            workspace => input.workspace.display().to_string(),
            finished_at => Utc::now().to_rfc3339(),
            counts => counts,
            notes => notes,
        })
        .context("render report")?;
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }
    Ok(rendered)
}

/// Render and write the report to `path`.
pub fn write_report(path: &Path, input: &ReportInput<'_>) -> Result<()> {
    let rendered = render_report(input)?;
    fs::write(path, rendered).with_context(|| format!("write report {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str, status: StepStatus, message: Option<&str>) -> StepRecord {
        StepRecord {
            name: name.to_string(),
            status,
            at: "2026-01-01T00:00:00+00:00".to_string(),
            message: message.map(str::to_string),
            details: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn report_counts_statuses_and_lists_degraded_steps() {
        let steps = vec![
            step("precheck", StepStatus::Ok, Some("Loaded manifest v1")),
            step("repo", StepStatus::Start, None),
            step("repo", StepStatus::Skipped, Some("Optional repo skipped: docs")),
            step("smoke", StepStatus::Skipped, Some("No smoke workflow configured")),
        ];
        let rendered = render_report(&ReportInput {
            manifest: "manifest.yaml",
            workspace: Path::new("/ws"),
            steps: &steps,
        })
        .expect("render");

        assert!(rendered.starts_with("# Installer report\n"));
        assert!(rendered.contains("Install completed."));
        assert!(rendered.contains("- Manifest: manifest.yaml"));
        assert!(rendered.contains("| ok | 1 |"));
        assert!(rendered.contains("| skipped | 2 |"));
        assert!(rendered.contains("- repo (skipped): Optional repo skipped: docs"));
        assert!(rendered.ends_with('\n'));
    }

    #[test]
    fn report_without_degraded_steps_has_no_notes() {
        let steps = vec![step("finalize", StepStatus::Ok, None)];
        let rendered = render_report(&ReportInput {
            manifest: "m.yaml",
            workspace: Path::new("/ws"),
            steps: &steps,
        })
        .expect("render");
        assert!(!rendered.contains("## Notes"));
    }
}
