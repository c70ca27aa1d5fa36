//! Deterministic ordering helpers.
//!
//! These utilities enforce the stable ordering guarantees of the report
//! schema. Identical input must always produce identical output, so every
//! list that reaches a report is ordered here and nowhere else.

use std::cmp::Reverse;

use crate::report::model::Finding;

/// Longest example kept in a finding, in characters.
pub const EXAMPLE_MAX_CHARS: usize = 200;

/// Sort findings by `(severity descending, category ascending)`.
///
/// Categories are unique within a run, so this is a total order and the
/// result does not depend on the order findings were first seen.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        (Reverse(a.severity), a.category.as_str()).cmp(&(Reverse(b.severity), b.category.as_str()))
    });
}

/// Collapse whitespace runs and cap at [`EXAMPLE_MAX_CHARS`] characters.
pub fn compact_example(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= EXAMPLE_MAX_CHARS {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(EXAMPLE_MAX_CHARS - 3).collect();
    out.push_str("...");
    out
}
