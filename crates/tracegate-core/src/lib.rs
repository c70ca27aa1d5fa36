pub mod analyzers;
pub mod error;
pub mod report;
pub mod rules;
pub mod trace;
pub mod util;

use std::io::BufRead;

pub use error::AnalyzeError;

use crate::analyzers::analyze_record;
use crate::report::aggregate::Aggregator;
use crate::report::model::{InputInfo, Report, ToolInfo};
use crate::rules::config::RuleSet;
use crate::trace::ingest::{Records, TraceSource};

pub const TOOL_NAME: &str = "tracegate";

/// JSON schema version of tracegate reports.
/// Bump only when the report structure changes semantically.
pub const SCHEMA_VERSION: &str = "0.1.0";

pub const RULE_CATALOG_VERSION: &str = "0.1.0";

/// No blocker found.
pub const EXIT_CLEAN: i32 = 0;
/// At least one blocker found.
pub const EXIT_BLOCKED: i32 = 2;
/// Input could not be read, or nothing in it parsed.
pub const EXIT_FATAL: i32 = 4;

/// Analyze a trace file or standard input.
pub fn analyze(source: &TraceSource, rules: &RuleSet, tool: ToolInfo) -> Result<Report, AnalyzeError> {
    let records = source.open().map_err(|error| AnalyzeError::Open {
        input: source.label(),
        error,
    })?;
    run(records, source.label(), rules, tool)
}

/// Analyze any buffered reader. `label` names the input in the report.
pub fn analyze_reader<R: BufRead>(
    reader: R,
    label: impl Into<String>,
    rules: &RuleSet,
    tool: ToolInfo,
) -> Result<Report, AnalyzeError> {
    run(Records::new(reader), label.into(), rules, tool)
}

fn run<R: BufRead>(
    mut records: Records<R>,
    label: String,
    rules: &RuleSet,
    tool: ToolInfo,
) -> Result<Report, AnalyzeError> {
    let mut aggregator = Aggregator::new();

    for item in records.by_ref() {
        match item {
            Ok(record) => {
                let outcome = analyze_record(&record, rules);
                aggregator.record_outcome(&record, outcome);
            }
            Err(err) => aggregator.record_parse_error(&err),
        }
    }

    let digest = records.finish().map_err(AnalyzeError::Read)?;
    let summary = aggregator.finalize();

    if digest.non_blank_lines > 0 && summary.coverage.records_scanned == 0 {
        tracing::warn!(
            input = %label,
            lines = digest.non_blank_lines,
            "no line of the input parsed as a trace record"
        );
        return Err(AnalyzeError::NoValidRecords {
            lines: digest.non_blank_lines,
            parse_errors: summary.coverage.parse_errors,
        });
    }

    tracing::info!(
        input = %label,
        records = summary.coverage.records_scanned,
        parse_errors = summary.coverage.parse_errors,
        findings = summary.findings.len(),
        gaps = summary.coverage.gaps.total(),
        "analysis complete"
    );

    Ok(Report::new(
        tool,
        InputInfo {
            source: label,
            sha256: digest.sha256,
        },
        rules,
        summary.findings,
        summary.coverage,
    ))
}
