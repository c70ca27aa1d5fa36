use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::rules::catalog::{RuleId, Severity};
use crate::rules::classify::classify;
use crate::rules::config::RuleSet;
use crate::{RULE_CATALOG_VERSION, SCHEMA_VERSION};

/// Top-level tracegate report.
///
/// This struct is the stable JSON contract. It must remain deterministic for
/// identical input: no timestamps, no host-dependent values, fixed ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub schema_version: String,
    pub tool: ToolInfo,
    pub input: InputInfo,
    pub rules: RulesInfo,
    pub findings: Vec<Finding>,
    pub coverage: Coverage,
    pub classification: ClassificationInfo,
}

impl Report {
    /// Assemble a report from a finalized run.
    ///
    /// Assumes `findings` are already in report order.
    pub fn new(
        tool: ToolInfo,
        input: InputInfo,
        rules: &RuleSet,
        findings: Vec<Finding>,
        coverage: Coverage,
    ) -> Self {
        let classification = classify(&findings);

        let mut providers: Vec<String> = rules
            .vendors
            .iter()
            .map(|v| v.provider_name.clone())
            .collect();
        providers.sort();
        providers.dedup();

        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            tool,
            input,
            rules: RulesInfo {
                catalog_version: RULE_CATALOG_VERSION.to_string(),
                providers,
                destructive_commands: rules.destructive.len(),
            },
            findings,
            coverage,
            classification,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.classification.exit_code
    }
}

/// Tool metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
    pub commit: Option<String>,
}

/// The trace this report is bound to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    pub source: String,
    pub sha256: String,
}

/// Which rule tables were in force.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesInfo {
    pub catalog_version: String,
    pub providers: Vec<String>,
    pub destructive_commands: usize,
}

/// One finding category, aggregated over the whole run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub category: RuleId,
    pub title: String,
    /// Records that matched this category.
    pub count: u64,
    /// First offending value seen.
    pub example: String,
    pub remediation: String,
    /// Providers or systems involved.
    pub subjects: BTreeSet<String>,
}

/// Records per role. Unknown roles share one bucket so memory does not grow
/// with the number of distinct role names in the input.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleCounts {
    pub http: u64,
    pub sql: u64,
    pub redis: u64,
    pub mongo: u64,
    pub s3: u64,
    pub other: u64,
}

/// Records that no analyzer could check.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GapCounts {
    pub unknown_role: u64,
    pub uncovered_host: u64,
    pub unanalyzable_sql: u64,
}

impl GapCounts {
    pub fn total(&self) -> u64 {
        self.unknown_role + self.uncovered_host + self.unanalyzable_sql
    }
}

/// Scope and gap disclosure. Always present, even when nothing was found.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Coverage {
    /// Well-formed records read.
    pub records_scanned: u64,
    /// Lines skipped because they did not parse.
    pub parse_errors: u64,
    pub by_role: RoleCounts,
    /// Records checked against at least one rule.
    pub analyzed: u64,
    /// Records matched to a rule table but outside its scope.
    pub not_applicable: u64,
    pub gaps: GapCounts,
}

/// Final classification level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationLevel {
    Clean,
    Advisory,
    Blocked,
}

impl ClassificationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassificationLevel::Clean => "CLEAN",
            ClassificationLevel::Advisory => "ADVISORY",
            ClassificationLevel::Blocked => "BLOCKED",
        }
    }
}

impl std::fmt::Display for ClassificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final classification block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationInfo {
    pub level: ClassificationLevel,
    pub highest_severity: Option<Severity>,
    pub blocker_categories: u64,
    pub exit_code: i32,
}
