//! Per-run finding aggregation.
//!
//! An [`Aggregator`] collects outcomes while records stream past and is
//! consumed by [`Aggregator::finalize`], so a finalized run cannot be
//! appended to. State is keyed by category: memory is bounded by the rule
//! tables, not by input size.

use std::collections::{BTreeMap, BTreeSet};

use crate::analyzers::{Detection, GapKind, Outcome};
use crate::report::model::{Coverage, Finding};
use crate::rules::catalog::RuleId;
use crate::trace::record::{ParseError, Role, TraceRecord};
use crate::util::deterministic::{compact_example, sort_findings};

#[derive(Debug, Default)]
pub struct Aggregator {
    findings: BTreeMap<RuleId, Finding>,
    coverage: Coverage,
}

/// Result of a finalized run, in report order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub findings: Vec<Finding>,
    pub coverage: Coverage,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_parse_error(&mut self, err: &ParseError) {
        tracing::debug!(line = err.line(), error = %err, "skipping unparsable line");
        self.coverage.parse_errors += 1;
    }

    /// Fold one record's outcome into the run.
    pub fn record_outcome(&mut self, record: &TraceRecord, outcome: Outcome) {
        self.coverage.records_scanned += 1;
        let roles = &mut self.coverage.by_role;
        match record.role {
            Role::Http => roles.http += 1,
            Role::Sql => roles.sql += 1,
            Role::Redis => roles.redis += 1,
            Role::Mongo => roles.mongo += 1,
            Role::S3 => roles.s3 += 1,
            Role::Other(_) => roles.other += 1,
        }

        match outcome {
            Outcome::Analyzed(detections) => {
                self.coverage.analyzed += 1;
                self.merge(detections);
            }
            Outcome::NotApplicable => self.coverage.not_applicable += 1,
            Outcome::Gap(kind) => {
                tracing::debug!(
                    line = record.line,
                    role = %record.role,
                    gap = kind.label(),
                    "record outside analyzer scope"
                );
                let gaps = &mut self.coverage.gaps;
                match kind {
                    GapKind::UnknownRole => gaps.unknown_role += 1,
                    GapKind::UncoveredHost => gaps.uncovered_host += 1,
                    GapKind::UnanalyzableSql => gaps.unanalyzable_sql += 1,
                }
            }
        }
    }

    /// Merge one record's detections. A category counts at most once per
    /// record; the first example seen for a category is kept.
    fn merge(&mut self, detections: Vec<Detection>) {
        let mut seen: BTreeSet<RuleId> = BTreeSet::new();
        for d in detections {
            let first_in_record = seen.insert(d.rule.id.clone());
            let entry = self
                .findings
                .entry(d.rule.id.clone())
                .or_insert_with(|| Finding {
                    severity: d.rule.severity,
                    category: d.rule.id.clone(),
                    title: d.rule.title.clone(),
                    count: 0,
                    example: compact_example(&d.example),
                    remediation: d.rule.remediation.clone(),
                    subjects: BTreeSet::new(),
                });
            if first_in_record {
                entry.count += 1;
            }
            if let Some(subject) = d.subject {
                entry.subjects.insert(subject);
            }
        }
    }

    pub fn finalize(self) -> Summary {
        let mut findings: Vec<Finding> = self.findings.into_values().collect();
        sort_findings(&mut findings);
        Summary {
            findings,
            coverage: self.coverage,
        }
    }
}
