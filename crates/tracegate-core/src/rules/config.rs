//! Rule tables consumed by the analyzers.
//!
//! Vendor and destructive-command rules are plain data. The built-in tables
//! cover the common payment providers and the well-known wipe commands; a
//! TOML file can extend or replace them. Adding a provider is a data change.
//!
//! ```toml
//! replace_builtin = false
//!
//! [[vendor]]
//! provider_name = "acme"
//! host_allowlist = ["acmepay.com"]
//! path_prefixes = ["/v1/"]
//! idempotency_location = "header"
//! key_name = "X-Acme-Idempotency"
//! invalid_placeholder_values = ["test"]
//!
//! [[destructive]]
//! system = "redis"
//! command = "SHUTDOWN"
//! category = "infra.cache-shutdown"
//! title = "Redis server shutdown"
//! remediation = "Never let an agent stop the cache server."
//!
//! [[destructive]]
//! system = "redis"
//! command = "KEYS"
//! category = "infra.cache-keys-scan"
//! severity = "WARNING"
//! title = "Redis full keyspace scan"
//! remediation = "Use SCAN with a MATCH pattern."
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules::catalog::{self, Rule, RuleId, Severity};
use crate::util::domain::registrable_domain;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read rules file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rules file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid vendor rule '{provider}': {reason}")]
    InvalidVendor { provider: String, reason: String },

    #[error("invalid destructive command '{command}': {reason}")]
    InvalidCommand { command: String, reason: String },
}

/// Where a provider expects its idempotency key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyLocation {
    Header,
    BodyField,
}

/// One payment provider's idempotency contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct VendorRule {
    pub provider_name: String,
    /// Registrable domains (eTLD+1) operated by the provider.
    pub host_allowlist: Vec<String>,
    pub path_prefixes: Vec<String>,
    pub idempotency_location: IdempotencyLocation,
    pub key_name: String,
    /// Values that count as an absent key. Compared case-insensitively.
    #[serde(default)]
    pub invalid_placeholder_values: Vec<String>,
}

impl VendorRule {
    pub fn allows_domain(&self, registrable: &str) -> bool {
        self.host_allowlist
            .iter()
            .any(|d| d.eq_ignore_ascii_case(registrable))
    }

    pub fn covers_path(&self, path: &str) -> bool {
        self.path_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    pub fn is_placeholder(&self, value: &str) -> bool {
        let value = value.trim();
        value.is_empty()
            || self
                .invalid_placeholder_values
                .iter()
                .any(|p| p.trim().eq_ignore_ascii_case(value))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fail = |reason: &str| ConfigError::InvalidVendor {
            provider: self.provider_name.clone(),
            reason: reason.to_string(),
        };
        if self.provider_name.trim().is_empty() {
            return Err(fail("provider_name is empty"));
        }
        if self.host_allowlist.is_empty() || self.host_allowlist.iter().any(|h| h.trim().is_empty()) {
            return Err(fail("host_allowlist must contain non-empty domains"));
        }
        // Hosts are matched by eTLD+1, so a subdomain entry could never match.
        if let Some(host) = self.host_allowlist.iter().map(|h| normalize_host(h)).find(|h| {
            registrable_domain(h).as_deref() != Some(h.as_str())
        }) {
            return Err(fail(&format!(
                "host_allowlist entry '{host}' is not a registrable domain"
            )));
        }
        if self.path_prefixes.is_empty() || self.path_prefixes.iter().any(|p| !p.starts_with('/')) {
            return Err(fail("path_prefixes must be non-empty and start with '/'"));
        }
        if self.key_name.trim().is_empty() {
            return Err(fail("key_name is empty"));
        }
        Ok(())
    }

    fn normalized(mut self) -> Self {
        for host in &mut self.host_allowlist {
            *host = normalize_host(host);
        }
        self
    }
}

fn normalize_host(host: &str) -> String {
    host.trim()
        .trim_start_matches('.')
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Systems covered by the destructive command matcher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InfraSystem {
    Redis,
    Mongo,
    S3,
}

impl InfraSystem {
    pub fn as_str(self) -> &'static str {
        match self {
            InfraSystem::Redis => "redis",
            InfraSystem::Mongo => "mongo",
            InfraSystem::S3 => "s3",
        }
    }
}

impl fmt::Display for InfraSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_severity() -> Severity {
    Severity::Blocker
}

/// A risky operation on one system. Built-in entries are all BLOCKER; rules
/// files may lower an entry to WARNING or INFO.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DestructiveCommand {
    pub system: InfraSystem,
    pub command: String,
    pub category: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    pub title: String,
    pub remediation: String,
}

impl DestructiveCommand {
    fn new(system: InfraSystem, command: &str, category: &str, title: &str, remediation: &str) -> Self {
        Self {
            system,
            command: command.to_string(),
            category: category.to_string(),
            severity: Severity::Blocker,
            title: title.to_string(),
            remediation: remediation.to_string(),
        }
    }

    pub fn rule(&self) -> Rule {
        Rule {
            id: RuleId::new(self.category.clone()),
            severity: self.severity,
            title: self.title.clone(),
            remediation: self.remediation.clone(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fail = |reason: &str| ConfigError::InvalidCommand {
            command: self.command.clone(),
            reason: reason.to_string(),
        };
        if self.command.trim().is_empty() || self.command.contains(char::is_whitespace) {
            return Err(fail("command must be a single non-empty token"));
        }
        if !self.category.contains('.') {
            return Err(fail("category must be a dotted rule id"));
        }
        if catalog::builtin_ids().contains(&self.category.as_str()) {
            return Err(fail("category collides with a built-in rule"));
        }
        Ok(())
    }
}

/// File format accepted by [`RuleSet::from_toml_str`].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RulesFile {
    #[serde(default)]
    replace_builtin: bool,
    #[serde(default)]
    vendor: Vec<VendorRule>,
    #[serde(default)]
    destructive: Vec<DestructiveCommand>,
}

/// Immutable rule tables for one run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RuleSet {
    pub vendors: Vec<VendorRule>,
    pub destructive: Vec<DestructiveCommand>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const PLACEHOLDERS: &[&str] = &[
    "test",
    "none",
    "null",
    "undefined",
    "placeholder",
    "changeme",
    "xxx",
    "idempotency-key",
];

impl RuleSet {
    pub fn builtin() -> Self {
        let vendors = vec![
            VendorRule {
                provider_name: "stripe".into(),
                host_allowlist: strings(&["stripe.com"]),
                path_prefixes: strings(&["/v1/"]),
                idempotency_location: IdempotencyLocation::Header,
                key_name: "Idempotency-Key".into(),
                invalid_placeholder_values: strings(PLACEHOLDERS),
            },
            VendorRule {
                provider_name: "paypal".into(),
                host_allowlist: strings(&["paypal.com"]),
                path_prefixes: strings(&["/v1/", "/v2/"]),
                idempotency_location: IdempotencyLocation::Header,
                key_name: "PayPal-Request-Id".into(),
                invalid_placeholder_values: strings(PLACEHOLDERS),
            },
            VendorRule {
                provider_name: "square".into(),
                host_allowlist: strings(&["squareup.com", "squareupsandbox.com"]),
                path_prefixes: strings(&["/v2/"]),
                idempotency_location: IdempotencyLocation::BodyField,
                key_name: "idempotency_key".into(),
                invalid_placeholder_values: strings(PLACEHOLDERS),
            },
            VendorRule {
                provider_name: "adyen".into(),
                host_allowlist: strings(&["adyen.com", "adyenpayments.com"]),
                path_prefixes: strings(&["/v", "/checkout/"]),
                idempotency_location: IdempotencyLocation::Header,
                key_name: "Idempotency-Key".into(),
                invalid_placeholder_values: strings(PLACEHOLDERS),
            },
        ];

        let destructive = vec![
            DestructiveCommand::new(
                InfraSystem::Redis,
                "FLUSHALL",
                "infra.cache-flush-all",
                "Redis cache wipe: FLUSHALL",
                "Delete specific keys or use key expiry instead of wiping every database.",
            ),
            DestructiveCommand::new(
                InfraSystem::Redis,
                "FLUSHDB",
                "infra.cache-flush-db",
                "Redis cache wipe: FLUSHDB",
                "Delete specific keys or use key expiry instead of wiping the database.",
            ),
            DestructiveCommand::new(
                InfraSystem::Mongo,
                "dropDatabase",
                "infra.database-drop",
                "MongoDB destructive operation: dropDatabase",
                "Remove the dropDatabase privilege from the agent's role.",
            ),
            DestructiveCommand::new(
                InfraSystem::S3,
                "DeleteBucket",
                "infra.bucket-delete",
                "S3 bucket deletion: DeleteBucket",
                "Deny s3:DeleteBucket in the agent's IAM policy and enable versioning.",
            ),
        ];

        Self {
            vendors,
            destructive,
        }
    }

    pub fn from_toml_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse a rules file and merge it over the built-in tables.
    ///
    /// Entries with the same provider name, or the same system and command,
    /// replace the built-in entry in place; new entries are appended.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: RulesFile = toml::from_str(text)?;

        let mut set = if file.replace_builtin {
            Self {
                vendors: vec![],
                destructive: vec![],
            }
        } else {
            Self::builtin()
        };

        for vendor in file.vendor {
            vendor.validate()?;
            let vendor = vendor.normalized();
            match set
                .vendors
                .iter_mut()
                .find(|v| v.provider_name == vendor.provider_name)
            {
                Some(existing) => *existing = vendor,
                None => set.vendors.push(vendor),
            }
        }

        for command in file.destructive {
            command.validate()?;
            match set.destructive.iter_mut().find(|c| {
                c.system == command.system && c.command.eq_ignore_ascii_case(&command.command)
            }) {
                Some(existing) => *existing = command,
                None => set.destructive.push(command),
            }
        }

        tracing::debug!(
            vendors = set.vendors.len(),
            destructive = set.destructive.len(),
            "loaded rule tables"
        );

        Ok(set)
    }

    pub fn destructive_for(&self, system: InfraSystem, command: &str) -> Option<&DestructiveCommand> {
        self.destructive
            .iter()
            .find(|c| c.system == system && c.command.eq_ignore_ascii_case(command))
    }

    pub fn vendor_for_domain(&self, registrable: &str) -> Option<&VendorRule> {
        self.vendors.iter().find(|v| v.allows_domain(registrable))
    }
}
