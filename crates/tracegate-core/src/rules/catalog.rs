use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a finding category, e.g. `sql.delete-no-where`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct RuleId(pub String);

impl RuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Severity tier. Declaration order is the semantic order: `Info < Warning < Blocker`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Blocker,
}

impl Severity {
    /// Incident-style label used in the text report.
    pub fn sev_label(self) -> &'static str {
        match self {
            Severity::Blocker => "SEV0",
            Severity::Warning => "SEV1",
            Severity::Info => "SEV2",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Blocker => "BLOCKER",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog entry: everything about a category except its occurrences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    pub id: RuleId,
    pub severity: Severity,
    pub title: String,
    pub remediation: String,
}

impl Rule {
    pub fn blocker(id: &str, title: &str, remediation: &str) -> Self {
        Self {
            id: RuleId::new(id),
            severity: Severity::Blocker,
            title: title.to_string(),
            remediation: remediation.to_string(),
        }
    }
}

pub const SQL_DELETE_NO_WHERE: &str = "sql.delete-no-where";
pub const SQL_UPDATE_NO_WHERE: &str = "sql.update-no-where";
pub const SQL_DELETE_TAUTOLOGY: &str = "sql.delete-tautology";
pub const SQL_UPDATE_TAUTOLOGY: &str = "sql.update-tautology";
pub const SQL_TRUNCATE: &str = "sql.truncate";
pub const SQL_DROP_TABLE: &str = "sql.drop-table";
pub const SQL_DROP_DATABASE: &str = "sql.drop-database";
pub const PAYMENT_MISSING_IDEMPOTENCY: &str = "payment.missing-idempotency";

/// Built-in SQL and payment rules.
///
/// Infrastructure rules live in the destructive command table
/// (`rules::config`) because each entry carries its own category.
pub fn sql_rule(id: &str) -> Option<Rule> {
    let rule = match id {
        SQL_DELETE_NO_WHERE => Rule::blocker(
            id,
            "SQL DELETE/UPDATE without WHERE",
            "Add a WHERE clause that restricts the rows being deleted.",
        ),
        SQL_UPDATE_NO_WHERE => Rule::blocker(
            id,
            "SQL DELETE/UPDATE without WHERE",
            "Add a WHERE clause that restricts the rows being updated.",
        ),
        SQL_DELETE_TAUTOLOGY => Rule::blocker(
            id,
            "SQL with tautology in WHERE",
            "Replace the always-true predicate with a condition on real columns.",
        ),
        SQL_UPDATE_TAUTOLOGY => Rule::blocker(
            id,
            "SQL with tautology in WHERE",
            "Replace the always-true predicate with a condition on real columns.",
        ),
        SQL_TRUNCATE => Rule::blocker(
            id,
            "Destructive SQL: TRUNCATE",
            "Use a bounded DELETE, or prefix disposable tables with tmp_, scratch_ or temp_.",
        ),
        SQL_DROP_TABLE => Rule::blocker(
            id,
            "Destructive SQL: DROP TABLE",
            "Run schema removals through a reviewed migration, not an agent action.",
        ),
        SQL_DROP_DATABASE => Rule::blocker(
            id,
            "Destructive SQL: DROP DATABASE",
            "Database removal must never be issued by an agent; revoke the privilege.",
        ),
        _ => return None,
    };
    Some(rule)
}

pub fn payment_rule() -> Rule {
    Rule::blocker(
        PAYMENT_MISSING_IDEMPOTENCY,
        "Missing payment idempotency",
        "Send a unique, per-operation idempotency key in the location the provider documents.",
    )
}

/// Every built-in rule id, sorted.
pub fn builtin_ids() -> Vec<&'static str> {
    let mut ids = vec![
        SQL_DELETE_NO_WHERE,
        SQL_UPDATE_NO_WHERE,
        SQL_DELETE_TAUTOLOGY,
        SQL_UPDATE_TAUTOLOGY,
        SQL_TRUNCATE,
        SQL_DROP_TABLE,
        SQL_DROP_DATABASE,
        PAYMENT_MISSING_IDEMPOTENCY,
    ];
    ids.sort_unstable();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_blocker_highest() {
        assert!(Severity::Blocker > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert_eq!(
            [Severity::Warning, Severity::Blocker, Severity::Info]
                .into_iter()
                .max(),
            Some(Severity::Blocker)
        );
    }

    #[test]
    fn severity_serializes_screaming_case() {
        assert_eq!(
            serde_json::to_string(&Severity::Blocker).unwrap(),
            "\"BLOCKER\""
        );
        assert_eq!(Severity::Blocker.sev_label(), "SEV0");
    }

    #[test]
    fn every_sql_id_has_a_rule() {
        for id in builtin_ids() {
            if id.starts_with("sql.") {
                let rule = sql_rule(id).unwrap_or_else(|| panic!("missing rule for {id}"));
                assert_eq!(rule.id.as_str(), id);
                assert_eq!(rule.severity, Severity::Blocker);
                assert!(!rule.remediation.is_empty());
            }
        }
        assert!(sql_rule("sql.unknown").is_none());
    }

    #[test]
    fn rule_id_serializes_as_plain_string() {
        let id = RuleId::new("infra.cache-flush-all");
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"infra.cache-flush-all\""
        );
    }
}
