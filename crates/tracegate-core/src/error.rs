use std::io;

use thiserror::Error;

use crate::EXIT_FATAL;

/// Run-level failure. No report is produced when one of these occurs.
///
/// Per-line problems are never surfaced here; they are counted in the
/// report's coverage block instead.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("cannot open trace input {input}: {error}")]
    Open {
        input: String,
        #[source]
        error: io::Error,
    },

    #[error("failed reading trace input: {0}")]
    Read(#[source] io::Error),

    #[error("no valid records in {lines} non-blank line(s), {parse_errors} failed to parse")]
    NoValidRecords { lines: usize, parse_errors: u64 },
}

impl AnalyzeError {
    pub fn exit_code(&self) -> i32 {
        EXIT_FATAL
    }
}
