use std::io::{Cursor, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tracegate_core::report::model::{ClassificationLevel, Report, ToolInfo};
use tracegate_core::report::render::render_text;
use tracegate_core::rules::catalog::Severity;
use tracegate_core::rules::config::RuleSet;
use tracegate_core::trace::ingest::TraceSource;
use tracegate_core::{AnalyzeError, analyze, analyze_reader};

/// Path to the fixtures directory relative to the crate root.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn tool() -> ToolInfo {
    ToolInfo {
        name: "tracegate".into(),
        version: "0.1.0-test".into(),
        commit: None,
    }
}

/// Runs the full pipeline over a fixture file with the built-in rules.
fn analyze_fixture(name: &str) -> Report {
    let source = TraceSource::Path(fixtures_dir().join(name));
    analyze(&source, &RuleSet::builtin(), tool()).expect("analysis should succeed")
}

/// Runs the full pipeline over in-memory trace text.
fn analyze_text(text: &str) -> Report {
    analyze_reader(Cursor::new(text.as_bytes().to_vec()), "inline", &RuleSet::builtin(), tool())
        .expect("analysis should succeed")
}

fn categories(report: &Report) -> Vec<&str> {
    report.findings.iter().map(|f| f.category.as_str()).collect()
}

fn has_category(report: &Report, category: &str) -> bool {
    report.findings.iter().any(|f| f.category.as_str() == category)
}

fn sql(query: &str) -> String {
    serde_json::json!({"role": "sql", "meta": {"sql": {"query": query}}}).to_string()
}

#[test]
fn clean_session_exits_0_with_no_findings() {
    let report = analyze_fixture("clean_session.jsonl");

    assert_eq!(report.classification.level, ClassificationLevel::Clean);
    assert_eq!(report.exit_code(), 0);
    assert!(
        report.findings.is_empty(),
        "expected no findings, got: {:?}",
        categories(&report)
    );

    assert_eq!(report.coverage.records_scanned, 5);
    assert_eq!(report.coverage.parse_errors, 0);
    assert_eq!(report.coverage.by_role.sql, 2);
    assert_eq!(report.coverage.by_role.http, 2);
    assert_eq!(report.coverage.by_role.redis, 1);
    // api.github.com is not a payment provider.
    assert_eq!(report.coverage.gaps.uncovered_host, 1);

    let text = render_text(&report);
    assert!(text.contains("No issues detected"));
    assert!(text.contains("Scope: 5 records scanned"));
}

#[test]
fn mixed_incident_is_blocked() {
    let report = analyze_fixture("mixed_incident.jsonl");

    assert_eq!(report.classification.level, ClassificationLevel::Blocked);
    assert_eq!(report.classification.highest_severity, Some(Severity::Blocker));
    assert_eq!(report.exit_code(), 2);

    assert!(has_category(&report, "sql.delete-no-where"));
    assert!(has_category(&report, "sql.delete-tautology"));
    assert!(has_category(&report, "payment.missing-idempotency"));
    assert!(has_category(&report, "infra.cache-flush-all"));
    assert!(!has_category(&report, "sql.truncate"), "tmp_ tables are exempt");
    assert_eq!(report.classification.blocker_categories, 4);

    assert_eq!(report.coverage.records_scanned, 6);
    assert_eq!(report.coverage.parse_errors, 1);
    assert_eq!(report.coverage.gaps.unknown_role, 1);
    assert_eq!(report.coverage.by_role.other, 1);
}

#[test]
fn mixed_incident_text_report_names_every_category() {
    let text = render_text(&analyze_fixture("mixed_incident.jsonl"));

    assert!(text.contains("[SEV0] BLOCKER"));
    assert!(text.contains("sql.delete-no-where"));
    assert!(text.contains("payment.missing-idempotency"));
    assert!(text.contains("infra.cache-flush-all"));
    assert!(text.contains("1 unparsed lines skipped"));
    assert!(text.contains("Gap in coverage:"));
    assert!(text.contains("Classification: BLOCKED (exit 2)"));
}

#[test]
fn identical_input_gives_identical_reports() {
    let a = analyze_fixture("mixed_incident.jsonl");
    let b = analyze_fixture("mixed_incident.jsonl");

    assert_eq!(
        serde_json::to_string_pretty(&a).unwrap(),
        serde_json::to_string_pretty(&b).unwrap()
    );
    assert_eq!(render_text(&a), render_text(&b));
}

#[test]
fn report_is_bound_to_input_hash() {
    let a = analyze_fixture("clean_session.jsonl");
    let b = analyze_fixture("mixed_incident.jsonl");

    assert_eq!(a.input.sha256.len(), 64);
    assert_ne!(a.input.sha256, b.input.sha256);
}

#[test]
fn findings_are_ordered_by_severity_then_category() {
    let report = analyze_fixture("mixed_incident.jsonl");
    let cats = categories(&report);

    let mut sorted = cats.clone();
    sorted.sort();
    assert_eq!(cats, sorted, "all blockers, so category order only");
}

#[test]
fn tautology_in_delete_is_blocker() {
    let report = analyze_text(&sql("DELETE FROM users WHERE 1=1"));

    assert_eq!(categories(&report), vec!["sql.delete-tautology"]);
    assert_eq!(report.exit_code(), 2);
}

#[test]
fn update_without_where_is_blocker() {
    let report = analyze_text(&sql("UPDATE accounts SET balance = 0"));

    assert_eq!(categories(&report), vec!["sql.update-no-where"]);
    assert_eq!(report.findings[0].example, "UPDATE accounts SET balance = 0");
}

#[test]
fn scoped_update_is_clean() {
    let report = analyze_text(&sql("UPDATE accounts SET balance = 0 WHERE id = 7"));

    assert!(report.findings.is_empty());
    assert_eq!(report.coverage.analyzed, 1);
}

#[test]
fn truncate_of_scratch_table_is_exempt() {
    let trace = [
        sql("TRUNCATE TABLE tmp_import"),
        sql("TRUNCATE TABLE scratch_rows"),
        sql("TRUNCATE TABLE orders"),
    ]
    .join("\n");
    let report = analyze_text(&trace);

    assert_eq!(categories(&report), vec!["sql.truncate"]);
    assert_eq!(report.findings[0].count, 1);
}

#[test]
fn drop_statements_are_blockers() {
    let trace = [sql("DROP TABLE customers"), sql("DROP DATABASE prod")].join("\n");
    let report = analyze_text(&trace);

    assert_eq!(
        categories(&report),
        vec!["sql.drop-database", "sql.drop-table"]
    );
}

#[test]
fn unparsable_sql_is_a_coverage_gap() {
    let report = analyze_text(&sql("DELEET FROM users"));

    assert!(report.findings.is_empty());
    assert_eq!(report.coverage.gaps.unanalyzable_sql, 1);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn stripe_with_key_is_compliant() {
    let line = r#"{"role": "http", "meta": {"http": {"method": "POST", "url": "https://api.stripe.com/v1/payment_intents", "headers": {"Idempotency-Key": "pi-123"}}}}"#;
    let report = analyze_text(line);

    assert!(report.findings.is_empty());
    assert_eq!(report.coverage.analyzed, 1);
}

#[test]
fn stripe_header_lookup_is_case_insensitive() {
    let line = r#"{"role": "http", "meta": {"http": {"method": "post", "url": "https://api.stripe.com/v1/charges", "headers": {"idempotency-key": "ch-1"}}}}"#;
    let report = analyze_text(line);

    assert!(report.findings.is_empty());
}

#[test]
fn stripe_without_key_is_blocker() {
    let line = r#"{"role": "http", "meta": {"http": {"method": "POST", "url": "https://api.stripe.com/v1/charges"}}}"#;
    let report = analyze_text(line);

    assert_eq!(categories(&report), vec!["payment.missing-idempotency"]);
    let finding = &report.findings[0];
    assert!(finding.subjects.contains("stripe"));
    assert!(finding.example.contains("Idempotency-Key missing"));
}

#[test]
fn read_only_stripe_call_is_not_applicable() {
    let line = r#"{"role": "http", "meta": {"http": {"method": "GET", "url": "https://api.stripe.com/v1/charges/ch_1"}}}"#;
    let report = analyze_text(line);

    assert!(report.findings.is_empty());
    assert_eq!(report.coverage.not_applicable, 1);
}

#[test]
fn vendor_conventions_and_spoofed_host() {
    let report = analyze_fixture("vendors.jsonl");

    // PayPal is compliant; Square lacks the body field; Adyen uses a placeholder.
    assert_eq!(categories(&report), vec!["payment.missing-idempotency"]);
    let finding = &report.findings[0];
    assert_eq!(finding.count, 2);
    let subjects: Vec<&str> = finding.subjects.iter().map(String::as_str).collect();
    assert_eq!(subjects, vec!["adyen", "square"]);

    // The lookalike host resolves to evil.com.
    assert_eq!(report.coverage.gaps.uncovered_host, 1);
}

#[test]
fn destructive_infra_commands_are_blockers() {
    let report = analyze_fixture("infra.jsonl");

    assert_eq!(
        categories(&report),
        vec![
            "infra.bucket-delete",
            "infra.cache-flush-db",
            "infra.database-drop"
        ]
    );
    assert_eq!(report.coverage.by_role.mongo, 2);
    assert_eq!(report.coverage.by_role.s3, 2);
    assert_eq!(report.coverage.analyzed, 5);
}

#[test]
fn redis_flushall_blocks_but_get_does_not() {
    let flush = analyze_text(r#"{"role": "redis", "meta": {"redis": {"command": "FLUSHALL"}}}"#);
    let get = analyze_text(r#"{"role": "redis", "meta": {"redis": {"command": "GET user:1"}}}"#);

    assert_eq!(flush.exit_code(), 2);
    assert_eq!(get.exit_code(), 0);
    assert!(get.findings.is_empty());
}

#[test]
fn malformed_lines_are_counted_not_fatal() {
    let trace = format!(
        "{}\n{{not json\n{}\n",
        sql("SELECT 1"),
        sql("SELECT 2")
    );
    let report = analyze_text(&trace);

    assert_eq!(report.coverage.records_scanned, 2);
    assert_eq!(report.coverage.parse_errors, 1);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn input_with_no_valid_record_is_fatal() {
    let err = analyze_reader(
        Cursor::new(b"garbage\n{\"no_role\": 1}\n".to_vec()),
        "inline",
        &RuleSet::builtin(),
        tool(),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        AnalyzeError::NoValidRecords {
            lines: 2,
            parse_errors: 2
        }
    ));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn empty_input_is_clean() {
    let report = analyze_text("\n\n");

    assert_eq!(report.coverage.records_scanned, 0);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn missing_file_is_fatal() {
    let source = TraceSource::Path(fixtures_dir().join("does_not_exist.jsonl"));
    let err = analyze(&source, &RuleSet::builtin(), tool()).unwrap_err();

    assert!(matches!(err, AnalyzeError::Open { .. }));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn file_and_reader_paths_agree() {
    let text = std::fs::read_to_string(fixtures_dir().join("mixed_incident.jsonl")).unwrap();
    let mut tmp = NamedTempFile::new().expect("create temp file");
    tmp.write_all(text.as_bytes()).expect("write trace");
    tmp.flush().expect("flush");

    let from_file = analyze(
        &TraceSource::Path(tmp.path().to_path_buf()),
        &RuleSet::builtin(),
        tool(),
    )
    .unwrap();
    let from_reader = analyze_text(&text);

    assert_eq!(from_file.input.sha256, from_reader.input.sha256);
    assert_eq!(from_file.findings, from_reader.findings);
    assert_eq!(from_file.coverage, from_reader.coverage);
}

#[test]
fn custom_rules_extend_builtin_tables() {
    let rules = RuleSet::from_toml_str(
        r#"
[[destructive]]
system = "mongo"
command = "drop"
category = "infra.collection-drop"
title = "MongoDB collection drop"
remediation = "Revoke dropCollection from the agent's role."
"#,
    )
    .unwrap();

    let trace = r#"{"role": "mongo", "meta": {"mongo": {"op": "drop", "collection": "users"}}}"#;
    let report = analyze_reader(Cursor::new(trace.as_bytes().to_vec()), "inline", &rules, tool())
        .unwrap();

    assert_eq!(categories(&report), vec!["infra.collection-drop"]);
    assert_eq!(report.rules.destructive_commands, 5);
}

#[test]
fn warning_only_trace_is_advisory_and_exits_0() {
    let rules = RuleSet::from_toml_str(
        r#"
[[destructive]]
system = "redis"
command = "KEYS"
category = "infra.cache-keys-scan"
severity = "WARNING"
title = "Redis full keyspace scan"
remediation = "Use SCAN with a MATCH pattern."
"#,
    )
    .unwrap();

    let trace = [
        r#"{"role": "redis", "meta": {"redis": {"command": "KEYS *"}}}"#,
        r#"{"role": "redis", "meta": {"redis": {"command": "GET user:1"}}}"#,
    ]
    .join("\n");
    let report = analyze_reader(Cursor::new(trace.into_bytes()), "inline", &rules, tool()).unwrap();

    assert_eq!(categories(&report), vec!["infra.cache-keys-scan"]);
    assert_eq!(report.findings[0].severity, Severity::Warning);
    assert_eq!(report.classification.level, ClassificationLevel::Advisory);
    assert_eq!(report.classification.highest_severity, Some(Severity::Warning));
    assert_eq!(report.classification.blocker_categories, 0);
    assert_eq!(report.exit_code(), 0);

    let text = render_text(&report);
    assert!(text.contains("[SEV1] WARNING infra.cache-keys-scan x1"));
    assert!(text.contains("Classification: ADVISORY (exit 0)"));
}

#[test]
fn warning_does_not_mask_a_blocker() {
    let rules = RuleSet::from_toml_str(
        r#"
[[destructive]]
system = "redis"
command = "KEYS"
category = "infra.cache-keys-scan"
severity = "WARNING"
title = "Redis full keyspace scan"
remediation = "Use SCAN with a MATCH pattern."
"#,
    )
    .unwrap();

    let trace = [
        r#"{"role": "redis", "meta": {"redis": {"command": "KEYS *"}}}"#,
        r#"{"role": "redis", "meta": {"redis": {"command": "FLUSHALL"}}}"#,
    ]
    .join("\n");
    let report = analyze_reader(Cursor::new(trace.into_bytes()), "inline", &rules, tool()).unwrap();

    // Blockers sort ahead of warnings.
    assert_eq!(
        categories(&report),
        vec!["infra.cache-flush-all", "infra.cache-keys-scan"]
    );
    assert_eq!(report.classification.level, ClassificationLevel::Blocked);
    assert_eq!(report.exit_code(), 2);
}

#[test]
fn placeholder_key_is_reported_as_invalid() {
    let line = r#"{"role": "http", "meta": {"http": {"method": "POST", "url": "https://api.stripe.com/v1/charges", "headers": {"Idempotency-Key": "test"}}}}"#;
    let report = analyze_text(line);

    assert_eq!(categories(&report), vec!["payment.missing-idempotency"]);
    assert!(report.findings[0].example.contains(r#"Invalid idempotency key "test""#));
    assert!(render_text(&report).contains("Invalid idempotency"));
}
