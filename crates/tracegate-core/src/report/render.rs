use std::fmt::Write;

use crate::TOOL_NAME;
use crate::report::model::Report;

/// Fixed-format text report. Same report in, same bytes out.
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let c = &report.coverage;
    let roles = &c.by_role;

    // Writing to a String cannot fail.
    let _ = writeln!(out, "{} {}", TOOL_NAME, report.tool.version);
    let _ = writeln!(
        out,
        "Input: {} (sha256 {})",
        report.input.source, report.input.sha256
    );

    if report.findings.is_empty() {
        out.push_str("No issues detected\n");
    } else {
        out.push_str("Findings:\n");
        for f in &report.findings {
            let _ = writeln!(
                out,
                "  [{}] {} {} x{}: {}",
                f.severity.sev_label(),
                f.severity,
                f.category,
                f.count,
                f.title
            );
            let _ = writeln!(out, "      example: {}", f.example);
            if !f.subjects.is_empty() {
                let subjects: Vec<&str> = f.subjects.iter().map(String::as_str).collect();
                let _ = writeln!(out, "      subjects: {}", subjects.join(", "));
            }
            let _ = writeln!(out, "      fix: {}", f.remediation);
        }
    }

    let _ = writeln!(
        out,
        "Scope: {} records scanned (http {}, sql {}, redis {}, mongo {}, s3 {}, other {}); \
         {} analyzed, {} not applicable; {} unparsed lines skipped",
        c.records_scanned,
        roles.http,
        roles.sql,
        roles.redis,
        roles.mongo,
        roles.s3,
        roles.other,
        c.analyzed,
        c.not_applicable,
        c.parse_errors
    );
    let _ = writeln!(
        out,
        "Gap in coverage: {} records outside analyzer scope \
         (unknown role {}, uncovered host {}, unanalyzable SQL {})",
        c.gaps.total(),
        c.gaps.unknown_role,
        c.gaps.uncovered_host,
        c.gaps.unanalyzable_sql
    );
    let _ = writeln!(
        out,
        "Classification: {} (exit {})",
        report.classification.level, report.classification.exit_code
    );
    out
}
