//! Destructive infrastructure command matching.
//!
//! Deliberately narrow: only commands in the destructive table raise a
//! finding. Key-level reads and writes are not analyzed further.

use crate::analyzers::Detection;
use crate::rules::config::{InfraSystem, RuleSet};
use crate::trace::record::CommandCall;

/// Canonical operation name: first token, without a `db.` / `s3:` style
/// qualifier or a trailing call `()`.
fn operation_name(call: &CommandCall) -> &str {
    let token = call.name();
    token
        .rsplit(['.', ':'])
        .next()
        .unwrap_or(token)
        .trim_end_matches("()")
}

pub fn check(system: InfraSystem, call: &CommandCall, rules: &RuleSet) -> Vec<Detection> {
    let op = operation_name(call);
    let Some(entry) = rules.destructive_for(system, op) else {
        return vec![];
    };

    let example = match call.target.as_deref().map(str::trim) {
        Some(target) if !target.is_empty() => format!("{system} {} {target}", entry.command),
        _ => format!("{system} {}", entry.command),
    };

    vec![Detection {
        rule: entry.rule(),
        example,
        subject: Some(system.to_string()),
    }]
}
