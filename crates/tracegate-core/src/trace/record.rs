use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::rules::config::InfraSystem;

/// Per-line ingestion failure. Recoverable: the run counts it and moves on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: not valid UTF-8")]
    InvalidUtf8 { line: usize },

    #[error("line {line}: invalid JSON: {reason}")]
    InvalidJson { line: usize, reason: String },

    #[error("line {line}: record is not a JSON object")]
    NotAnObject { line: usize },

    #[error("line {line}: missing or non-string 'role'")]
    MissingRole { line: usize },

    #[error("line {line}: missing 'meta.{role}' payload")]
    MissingPayload { line: usize, role: String },

    #[error("line {line}: invalid {role} payload: {reason}")]
    InvalidPayload {
        line: usize,
        role: String,
        reason: String,
    },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::InvalidUtf8 { line }
            | ParseError::InvalidJson { line, .. }
            | ParseError::NotAnObject { line }
            | ParseError::MissingRole { line }
            | ParseError::MissingPayload { line, .. }
            | ParseError::InvalidPayload { line, .. } => *line,
        }
    }
}

/// Analyzer selector. Unknown roles are kept so they can be reported as gaps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Http,
    Sql,
    Redis,
    Mongo,
    S3,
    Other(String),
}

impl Role {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "http" => Role::Http,
            "sql" => Role::Sql,
            "redis" => Role::Redis,
            "mongo" => Role::Mongo,
            "s3" => Role::S3,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Http => "http",
            Role::Sql => "sql",
            Role::Redis => "redis",
            Role::Mongo => "mongo",
            Role::S3 => "s3",
            Role::Other(tag) => tag,
        }
    }

    pub fn infra_system(&self) -> Option<InfraSystem> {
        match self {
            Role::Redis => Some(InfraSystem::Redis),
            Role::Mongo => Some(InfraSystem::Mongo),
            Role::S3 => Some(InfraSystem::S3),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_method() -> String {
    "GET".to_string()
}

/// `meta.http` payload.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HttpCall {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, Value>,
    #[serde(default)]
    pub body: Option<Value>,
}

impl HttpCall {
    pub fn is_mutating(&self) -> bool {
        matches!(
            self.method.trim().to_ascii_uppercase().as_str(),
            "POST" | "PUT" | "PATCH"
        )
    }

    /// Every value sent under `name`, compared case-insensitively, in key
    /// order. A trace may carry the same header under several casings.
    /// Scalars are rendered as text; `null` and structured values count as
    /// empty.
    pub fn header_values(&self, name: &str) -> Vec<String> {
        self.headers
            .iter()
            .filter(|(k, _)| k.trim().eq_ignore_ascii_case(name))
            .map(|(_, v)| scalar_text(v))
            .collect()
    }
}

/// `meta.sql` payload.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SqlStatement {
    #[serde(alias = "sql")]
    pub query: String,
}

/// `meta.redis`, `meta.mongo` and `meta.s3` payloads.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CommandCall {
    #[serde(alias = "op")]
    pub command: String,
    #[serde(default, alias = "key", alias = "bucket", alias = "collection", alias = "database")]
    pub target: Option<String>,
}

impl CommandCall {
    /// Command name without arguments (`"GET user:1"` → `"GET"`).
    pub fn name(&self) -> &str {
        self.command.split_whitespace().next().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Http(HttpCall),
    Sql(SqlStatement),
    Command(CommandCall),
    /// Role the engine has no analyzer for; payload is not inspected.
    Uncovered,
}

/// One observed agent action, built from one input line.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    /// 1-based input line number.
    pub line: usize,
    pub trace_id: Option<String>,
    pub role: Role,
    pub payload: Payload,
}

impl TraceRecord {
    /// Parse one non-blank input line.
    pub fn from_line(line: usize, text: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(text).map_err(|e| ParseError::InvalidJson {
            line,
            reason: e.to_string(),
        })?;

        let Value::Object(mut obj) = value else {
            return Err(ParseError::NotAnObject { line });
        };

        let role = match obj.get("role") {
            Some(Value::String(tag)) if !tag.trim().is_empty() => Role::parse(tag.trim()),
            _ => return Err(ParseError::MissingRole { line }),
        };

        let trace_id = match obj.get("trace_id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        if let Role::Other(_) = role {
            return Ok(Self {
                line,
                trace_id,
                role,
                payload: Payload::Uncovered,
            });
        }

        let raw = obj
            .get_mut("meta")
            .and_then(|meta| meta.get_mut(role.as_str()))
            .map(Value::take)
            .filter(|v| !v.is_null())
            .ok_or_else(|| ParseError::MissingPayload {
                line,
                role: role.to_string(),
            })?;

        let invalid = |e: serde_json::Error| ParseError::InvalidPayload {
            line,
            role: role.to_string(),
            reason: e.to_string(),
        };

        let payload = match role {
            Role::Http => Payload::Http(serde_json::from_value(raw).map_err(invalid)?),
            Role::Sql => Payload::Sql(serde_json::from_value(raw).map_err(invalid)?),
            _ => Payload::Command(serde_json::from_value(raw).map_err(invalid)?),
        };

        Ok(Self {
            line,
            trace_id,
            role,
            payload,
        })
    }
}

/// Text form of a JSON scalar as it would appear on the wire.
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}
