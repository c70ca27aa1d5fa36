//! Output-directory artifacts.
//!
//! `findings.json` and `coverage.json` split the report for consumers that
//! only gate on one of them; `report.txt` is the text rendering. All three
//! are pure functions of the report.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::report::model::{ClassificationInfo, Coverage, Finding, InputInfo, Report, RulesInfo};
use crate::report::render::render_text;

pub const FINDINGS_FILE: &str = "findings.json";
pub const COVERAGE_FILE: &str = "coverage.json";
pub const REPORT_FILE: &str = "report.txt";

#[derive(Serialize)]
struct FindingsArtifact<'a> {
    schema_version: &'a str,
    findings: &'a [Finding],
    classification: &'a ClassificationInfo,
}

#[derive(Serialize)]
struct CoverageArtifact<'a> {
    schema_version: &'a str,
    input: &'a InputInfo,
    rules: &'a RulesInfo,
    coverage: &'a Coverage,
}

fn to_json<T: Serialize>(value: &T) -> io::Result<String> {
    let mut text = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    text.push('\n');
    Ok(text)
}

/// Write all artifacts into `dir`, creating it if needed. Returns the paths
/// written, in a fixed order.
pub fn write_artifacts(report: &Report, dir: &Path) -> io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let findings = to_json(&FindingsArtifact {
        schema_version: &report.schema_version,
        findings: &report.findings,
        classification: &report.classification,
    })?;
    let coverage = to_json(&CoverageArtifact {
        schema_version: &report.schema_version,
        input: &report.input,
        rules: &report.rules,
        coverage: &report.coverage,
    })?;

    let mut written = Vec::with_capacity(3);
    for (name, contents) in [
        (FINDINGS_FILE, findings),
        (COVERAGE_FILE, coverage),
        (REPORT_FILE, render_text(report)),
    ] {
        let path = dir.join(name);
        std::fs::write(&path, contents)?;
        written.push(path);
    }
    Ok(written)
}
