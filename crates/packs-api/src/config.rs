//! # Configuration
//!
//! [`AppConfig`] comes from the environment; [`PolicyConfig`] holds every
//! business threshold and loads from an optional YAML file named by
//! `PACKS_CONFIG`. Missing sections and fields take their defaults, and the
//! whole policy is validated on load.
//!
//! ```yaml
//! escrow:
//!   chat: { refund_window_hours: 48, auto_release_after_hours: 72 }
//! fraud:
//!   velocity_max_tokens: 8000
//! refund:
//!   escalation_hours: 24
//! ```

use std::path::{Path, PathBuf};

use packs_core::ValidationError;
use packs_engagement::PricingConfig;
use packs_ledger::EscrowPolicy;
use packs_refund::RefundConfig;
use packs_rules::{AbuseConfig, FraudThresholds, SafetyConfig};
use serde::{Deserialize, Serialize};

use crate::auth::SecretString;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The policy file could not be read.
    #[error("cannot read policy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The policy file is not valid YAML for [`PolicyConfig`].
    #[error("cannot parse policy file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A policy value violates a constraint.
    #[error("invalid policy: {0}")]
    Invalid(#[from] ValidationError),

    /// An environment variable has an unusable value.
    #[error("invalid value for {var}: \"{value}\"")]
    Env { var: &'static str, value: String },
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// Process-level settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared bearer secret. `None` disables authentication.
    pub auth_token: Option<SecretString>,
    /// YAML policy file, if any.
    pub policy_path: Option<PathBuf>,
    /// Whether the scheduler task runs.
    pub jobs_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            policy_path: None,
            jobs_enabled: true,
        }
    }
}

impl AppConfig {
    /// Read `PORT`, `AUTH_TOKEN`, `PACKS_CONFIG` and `PACKS_JOBS_ENABLED`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Env { var: "PORT", value: raw })?,
            None => 8080,
        };
        let auth_token = lookup("AUTH_TOKEN")
            .filter(|t| !t.is_empty())
            .map(SecretString::new);
        let policy_path = lookup("PACKS_CONFIG")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let jobs_enabled = match lookup("PACKS_JOBS_ENABLED") {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::Env {
                var: "PACKS_JOBS_ENABLED",
                value: raw,
            })?,
            None => true,
        };
        Ok(Self {
            port,
            auth_token,
            policy_path,
            jobs_enabled,
        })
    }

    /// The policy named by `policy_path`, or defaults.
    pub fn load_policy(&self) -> Result<PolicyConfig, ConfigError> {
        match &self.policy_path {
            Some(path) => PolicyConfig::load(path),
            None => Ok(PolicyConfig::default()),
        }
    }
}

/// Parse a boolean environment flag.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// PolicyConfig
// ---------------------------------------------------------------------------

/// Every business threshold, grouped by subsystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Escrow refund windows and auto-release delays.
    pub escrow: EscrowPolicy,
    /// Fraud rule thresholds and phrase lists.
    pub fraud: FraudThresholds,
    /// Abuse firewall threshold and sanction ladder.
    pub abuse: AbuseConfig,
    /// Safety score decay.
    pub safety: SafetyConfig,
    /// Price bands and multiplier limits.
    pub pricing: PricingConfig,
    /// Refund evaluation and escalation.
    pub refund: RefundConfig,
}

impl PolicyConfig {
    /// Parse and validate YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let policy: PolicyConfig = serde_yaml::from_str(yaml)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let policy = Self::from_yaml_str(&yaml)?;
        tracing::info!(path = %path.display(), "policy loaded");
        Ok(policy)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.escrow.validate()?;
        self.fraud.validate()?;
        self.abuse.validate()?;
        self.safety.validate()?;
        self.pricing.validate()?;
        self.refund.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn env_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.port, 8080);
        assert!(cfg.auth_token.is_none());
        assert!(cfg.policy_path.is_none());
        assert!(cfg.jobs_enabled);
    }

    #[test]
    fn env_values_parsed() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("PORT", "9090"),
            ("AUTH_TOKEN", "s3cret"),
            ("PACKS_CONFIG", "/etc/packs.yaml"),
            ("PACKS_JOBS_ENABLED", "off"),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.auth_token.as_ref().map(|t| t.expose()), Some("s3cret"));
        assert_eq!(cfg.policy_path, Some(PathBuf::from("/etc/packs.yaml")));
        assert!(!cfg.jobs_enabled);
        assert!(!format!("{cfg:?}").contains("s3cret"));
    }

    #[test]
    fn bad_env_values_rejected() {
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("PORT", "eighty")])),
            Err(ConfigError::Env { var: "PORT", .. })
        ));
        assert!(AppConfig::from_lookup(lookup(&[("PACKS_JOBS_ENABLED", "maybe")])).is_err());
    }

    #[test]
    fn empty_yaml_is_default_policy() {
        let policy = PolicyConfig::from_yaml_str("{}").unwrap();
        assert_eq!(policy, PolicyConfig::default());
    }

    #[test]
    fn partial_yaml_overrides_fields() {
        let policy = PolicyConfig::from_yaml_str(
            "fraud:\n  velocity_max_tokens: 8000\nrefund:\n  escalation_hours: 24\n",
        )
        .unwrap();
        assert_eq!(policy.fraud.velocity_max_tokens, 8000);
        assert_eq!(policy.fraud.farming_min_requests, 5);
        assert_eq!(policy.refund.escalation_hours, 24);
        assert_eq!(policy.refund.partial_refund_percent, 50);
    }

    #[test]
    fn invalid_policy_rejected() {
        let err = PolicyConfig::from_yaml_str("refund:\n  partial_refund_percent: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = PolicyConfig::from_yaml_str("surprise: true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "safety:\n  decay_per_day: 5").unwrap();
        let policy = PolicyConfig::load(file.path()).unwrap();
        assert_eq!(policy.safety.decay_per_day, 5);

        let missing = PolicyConfig::load(Path::new("/nonexistent/packs.yaml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
