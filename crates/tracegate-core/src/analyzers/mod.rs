//! Per-role rule analyzers.
//!
//! Every analyzer is a pure function of one record and the rule tables.
//! Dispatch happens here; the aggregator only ever sees [`Outcome`]s.

pub mod infra;
pub mod payment;
pub mod sql;

use serde::{Deserialize, Serialize};

use crate::rules::catalog::Rule;
use crate::rules::config::RuleSet;
use crate::trace::record::{Payload, TraceRecord};

/// One rule match on one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub rule: Rule,
    /// Offending value shown to humans (query text, request line, command).
    pub example: String,
    /// Rule-table name involved (provider or system), if any.
    pub subject: Option<String>,
}

/// Why a record could not be checked against any rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    UnknownRole,
    UncoveredHost,
    UnanalyzableSql,
}

impl GapKind {
    pub fn label(self) -> &'static str {
        match self {
            GapKind::UnknownRole => "unknown role",
            GapKind::UncoveredHost => "uncovered host",
            GapKind::UnanalyzableSql => "unanalyzable SQL",
        }
    }
}

/// Result of running the matching analyzer over one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Checked against its rules; zero or more detections.
    Analyzed(Vec<Detection>),
    /// A rule table matched the record, but the record is outside that
    /// rule's scope (e.g. a GET to a payment host).
    NotApplicable,
    /// No analyzer could check this record.
    Gap(GapKind),
}

/// Route a record to its analyzer.
pub fn analyze_record(record: &TraceRecord, rules: &RuleSet) -> Outcome {
    match &record.payload {
        Payload::Http(call) => payment::check(call, rules),
        Payload::Sql(stmt) => sql::check(&stmt.query),
        Payload::Command(call) => match record.role.infra_system() {
            Some(system) => Outcome::Analyzed(infra::check(system, call, rules)),
            None => Outcome::Gap(GapKind::UnknownRole),
        },
        Payload::Uncovered => Outcome::Gap(GapKind::UnknownRole),
    }
}
