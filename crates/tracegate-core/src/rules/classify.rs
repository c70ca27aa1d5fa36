//! Run verdict derivation.
//!
//! Turns the aggregated findings of a run into a classification level and a
//! CI-compatible exit code.
//!
//!   - Any BLOCKER finding     → BLOCKED  (exit 2)
//!   - Else any finding at all → ADVISORY (exit 0)
//!   - Else                    → CLEAN    (exit 0)
//!
//! Fatal ingestion failures never reach this stage; they map to exit 4 in
//! [`crate::AnalyzeError::exit_code`].

use crate::report::model::{ClassificationInfo, ClassificationLevel, Finding};
use crate::rules::catalog::Severity;
use crate::{EXIT_BLOCKED, EXIT_CLEAN};

/// Derives a final classification from aggregated findings.
///
/// Depends only on the set of severities present, never on finding order.
pub fn classify(findings: &[Finding]) -> ClassificationInfo {
    let highest_severity = findings.iter().map(|f| f.severity).max();

    let blocker_categories = findings
        .iter()
        .filter(|f| f.severity == Severity::Blocker)
        .count() as u64;

    let level = match highest_severity {
        Some(Severity::Blocker) => ClassificationLevel::Blocked,
        Some(_) => ClassificationLevel::Advisory,
        None => ClassificationLevel::Clean,
    };

    let exit_code = match level {
        ClassificationLevel::Blocked => EXIT_BLOCKED,
        ClassificationLevel::Advisory | ClassificationLevel::Clean => EXIT_CLEAN,
    };

    ClassificationInfo {
        level,
        highest_severity,
        blocker_categories,
        exit_code,
    }
}
