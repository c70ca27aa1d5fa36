//! Line-delimited record ingestion.
//!
//! Records are produced lazily, one line at a time. The raw bytes are
//! fingerprinted while they stream past so the report can be bound to the
//! exact input without holding it in memory.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::trace::record::{ParseError, TraceRecord};

/// Where trace lines come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceSource {
    Path(PathBuf),
    Stdin,
}

impl TraceSource {
    /// `-` selects standard input; anything else is a file path.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            TraceSource::Stdin
        } else {
            TraceSource::Path(PathBuf::from(arg))
        }
    }

    /// Label shown in reports.
    pub fn label(&self) -> String {
        match self {
            TraceSource::Path(p) => p.display().to_string(),
            TraceSource::Stdin => "<stdin>".to_string(),
        }
    }

    /// Open a fresh record stream. Each call on a `Path` source restarts from
    /// the first line; standard input can only be consumed once.
    pub fn open(&self) -> io::Result<Records<Box<dyn BufRead>>> {
        let reader: Box<dyn BufRead> = match self {
            TraceSource::Path(p) => Box::new(BufReader::new(File::open(p)?)),
            TraceSource::Stdin => Box::new(io::stdin().lock()),
        };
        Ok(Records::new(reader))
    }
}

/// Fingerprint and line statistics of a fully consumed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDigest {
    pub sha256: String,
    pub non_blank_lines: usize,
}

/// Lazy iterator over the records of a line-delimited trace.
///
/// Blank lines are skipped. An I/O failure ends iteration early and is
/// reported by [`Records::finish`].
pub struct Records<R> {
    reader: R,
    line: usize,
    non_blank: usize,
    hasher: Sha256,
    buf: Vec<u8>,
    io_error: Option<io::Error>,
}

impl<R: BufRead> Records<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            non_blank: 0,
            hasher: Sha256::new(),
            buf: Vec::new(),
            io_error: None,
        }
    }

    /// Drain any unread input and return the digest, or the I/O error that
    /// stopped iteration.
    pub fn finish(mut self) -> io::Result<InputDigest> {
        while self.next().is_some() {}
        if let Some(e) = self.io_error.take() {
            return Err(e);
        }
        Ok(InputDigest {
            sha256: hex::encode(self.hasher.finalize()),
            non_blank_lines: self.non_blank,
        })
    }
}

impl<R: BufRead> Iterator for Records<R> {
    type Item = Result<TraceRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.io_error.is_some() {
            return None;
        }
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.io_error = Some(e);
                    return None;
                }
            }
            self.hasher.update(&self.buf);
            self.line += 1;

            let text = match std::str::from_utf8(&self.buf) {
                Ok(text) => text,
                Err(_) => {
                    self.non_blank += 1;
                    return Some(Err(ParseError::InvalidUtf8 { line: self.line }));
                }
            };
            let text = text.trim_start_matches('\u{feff}').trim();
            if text.is_empty() {
                continue;
            }
            self.non_blank += 1;
            return Some(TraceRecord::from_line(self.line, text));
        }
    }
}
