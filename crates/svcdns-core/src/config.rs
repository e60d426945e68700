//! Configuration types for svcdns
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default Nomad API address
pub const DEFAULT_NOMAD_ADDRESS: &str = "http://127.0.0.1:4646";

/// Default per-request timeout for the zone store, in seconds
pub const DEFAULT_ZONE_STORE_TIMEOUT_SECS: u64 = 5;

/// Main svcdns configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvcDnsConfig {
    /// Service directory configuration
    pub directory: DirectoryConfig,

    /// Zone store configuration
    pub zone_store: ZoneStoreConfig,

    /// Reconciliation settings
    pub reconcile: ReconcileConfig,
}

impl SvcDnsConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.directory.validate()?;
        self.zone_store.validate()?;
        self.reconcile.validate()?;
        Ok(())
    }
}

/// Service directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectoryConfig {
    /// HashiCorp Nomad native service registrations
    Nomad {
        /// Base URL of the Nomad HTTP API
        #[serde(default = "default_nomad_address")]
        address: String,
        /// ACL token (optional)
        #[serde(default)]
        token: Option<String>,
        /// Region to query (optional)
        #[serde(default)]
        region: Option<String>,
        /// HTTP basic auth as `user[:password]` (optional)
        #[serde(default)]
        http_auth: Option<String>,
        /// TLS trust and client identity
        #[serde(default)]
        tls: NomadTlsConfig,
    },

    /// Custom directory
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl DirectoryConfig {
    /// Validate the directory configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            DirectoryConfig::Nomad {
                address,
                http_auth,
                tls,
                ..
            } => {
                if address.is_empty() {
                    return Err(crate::Error::config("Nomad address cannot be empty"));
                }
                if !address.starts_with("http://") && !address.starts_with("https://") {
                    return Err(crate::Error::config(format!(
                        "Nomad address must be an http(s) URL, got: {}",
                        address
                    )));
                }
                if let Some(auth) = http_auth
                    && auth.split(':').next().is_none_or(str::is_empty)
                {
                    return Err(crate::Error::config(
                        "Nomad HTTP auth needs a username (user[:password])",
                    ));
                }
                tls.validate()
            }
            DirectoryConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom directory factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom directory config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the directory type name
    pub fn type_name(&self) -> &str {
        match self {
            DirectoryConfig::Nomad { .. } => "nomad",
            DirectoryConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        DirectoryConfig::Nomad {
            address: default_nomad_address(),
            token: None,
            region: None,
            http_auth: None,
            tls: NomadTlsConfig::default(),
        }
    }
}

/// TLS settings for the Nomad API client
///
/// Paths are read when the directory is created. The client key must be a
/// PKCS#8 PEM file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NomadTlsConfig {
    /// PEM file with extra CA certificates to trust
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,

    /// Directory of PEM files with extra CA certificates to trust
    #[serde(default)]
    pub ca_path: Option<PathBuf>,

    /// PEM client certificate for mutual TLS
    #[serde(default)]
    pub client_cert: Option<PathBuf>,

    /// PEM client key for mutual TLS
    #[serde(default)]
    pub client_key: Option<PathBuf>,

    /// Accept any server certificate
    #[serde(default)]
    pub skip_verify: bool,
}

impl NomadTlsConfig {
    /// Validate the TLS settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        match (&self.client_cert, &self.client_key) {
            (Some(_), None) => Err(crate::Error::config(
                "Nomad client certificate given without a client key",
            )),
            (None, Some(_)) => Err(crate::Error::config(
                "Nomad client key given without a client certificate",
            )),
            _ => Ok(()),
        }
    }

    /// True when nothing overrides the platform TLS defaults
    pub fn is_default(&self) -> bool {
        self == &Self::default()
    }
}

/// Zone store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ZoneStoreConfig {
    /// MikroTik RouterOS REST API
    RouterOs {
        /// `host[:port]` or a full `http(s)://` base URL
        address: String,
        /// API username
        username: String,
        /// API password
        password: String,
        /// Per-request timeout in seconds
        #[serde(default = "default_zone_store_timeout_secs")]
        timeout_secs: u64,
        /// Verify the store's TLS certificate
        #[serde(default)]
        verify_tls: bool,
    },

    /// In-process store (not persistent)
    Memory,

    /// Custom zone store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ZoneStoreConfig {
    /// Validate the zone store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ZoneStoreConfig::RouterOs {
                address,
                username,
                timeout_secs,
                ..
            } => {
                if address.is_empty() {
                    return Err(crate::Error::config("RouterOS address cannot be empty"));
                }
                if username.is_empty() {
                    return Err(crate::Error::config("RouterOS username cannot be empty"));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("RouterOS timeout must be > 0"));
                }
                Ok(())
            }
            ZoneStoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom zone store factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom zone store config cannot be null",
                    ));
                }
                Ok(())
            }
            ZoneStoreConfig::Memory => Ok(()),
        }
    }

    /// Get the zone store type name
    pub fn type_name(&self) -> &str {
        match self {
            ZoneStoreConfig::RouterOs { .. } => "routeros",
            ZoneStoreConfig::Memory => "memory",
            ZoneStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// What a pass does when one service name cannot be reconciled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first error, before any pruning
    #[default]
    Abort,
    /// Record the failure, keep going, and report `Error::Incomplete` at the end
    Continue,
}

impl std::str::FromStr for FailurePolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(crate::Error::config(format!(
                "Unknown failure policy '{}'. Valid: abort, continue",
                other
            ))),
        }
    }
}

/// Reconciliation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Domain suffix appended to every service name
    pub domain: String,

    /// Tag used to filter directory services (empty = all services)
    #[serde(default)]
    pub service_tag: String,

    /// Tag written to the comment of managed records.
    /// Falls back to `service_tag` when unset.
    #[serde(default)]
    pub owner_tag: Option<String>,

    /// Behaviour on per-name failures
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Log creates and deletes instead of sending them
    #[serde(default)]
    pub dry_run: bool,

    /// Capacity of the progress event channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ReconcileConfig {
    /// Create settings for a domain and a tag used for both filtering and ownership
    pub fn new(domain: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            service_tag: tag.into(),
            owner_tag: None,
            failure_policy: FailurePolicy::default(),
            dry_run: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Set a distinct ownership tag
    pub fn with_owner_tag(mut self, tag: impl Into<String>) -> Self {
        self.owner_tag = Some(tag.into());
        self
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Enable or disable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The tag that marks records as managed by this reconciler
    pub fn effective_owner_tag(&self) -> &str {
        match self.owner_tag.as_deref() {
            Some(tag) if !tag.is_empty() => tag,
            _ => &self.service_tag,
        }
    }

    /// Fully-qualified record name for a service
    pub fn fqdn(&self, service: &str) -> String {
        format!("{}.{}", service, self.domain)
    }

    /// Validate the reconciliation settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_domain_name(&self.domain)?;

        // An empty comment filter would select every untagged record in the zone
        if self.effective_owner_tag().is_empty() {
            return Err(crate::Error::config(
                "Ownership tag cannot be empty: refusing to manage untagged records",
            ));
        }

        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        Ok(())
    }
}

/// Validate that a string is a usable DNS domain suffix
///
/// Basic RFC 1035 checks; catches common mistakes rather than every
/// malformed name.
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    if domain.is_empty() {
        return Err(crate::Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Domain name too long: {} chars (max 253)",
            domain.len()
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(crate::Error::config(format!(
                "Domain label contains invalid characters: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Domain label cannot start or end with hyphen: '{}'",
                label
            )));
        }
    }

    Ok(())
}

fn default_nomad_address() -> String {
    DEFAULT_NOMAD_ADDRESS.to_string()
}

fn default_zone_store_timeout_secs() -> u64 {
    DEFAULT_ZONE_STORE_TIMEOUT_SECS
}

fn default_event_channel_capacity() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_tag_falls_back_to_service_tag() {
        let config = ReconcileConfig::new("example.com", "dns");
        assert_eq!(config.effective_owner_tag(), "dns");

        let config = config.with_owner_tag("svcdns");
        assert_eq!(config.effective_owner_tag(), "svcdns");

        let config = ReconcileConfig::new("example.com", "dns").with_owner_tag("");
        assert_eq!(config.effective_owner_tag(), "dns");
    }

    #[test]
    fn test_empty_owner_tag_rejected() {
        let config = ReconcileConfig::new("example.com", "");
        assert!(config.validate().is_err());

        let config = ReconcileConfig::new("example.com", "").with_owner_tag("svcdns");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fqdn() {
        let config = ReconcileConfig::new("lan.example.com", "dns");
        assert_eq!(config.fqdn("web"), "web.lan.example.com");
    }

    #[test]
    fn test_domain_validation() {
        assert!(validate_domain_name("example.com").is_ok());
        assert!(validate_domain_name("lan").is_ok());
        assert!(validate_domain_name("").is_err());
        assert!(validate_domain_name("example..com").is_err());
        assert!(validate_domain_name("-bad.com").is_err());
        assert!(validate_domain_name("bad_label.com").is_err());
        assert!(validate_domain_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_failure_policy_parse() {
        assert_eq!("abort".parse::<FailurePolicy>().unwrap(), FailurePolicy::Abort);
        assert_eq!(
            "Continue".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::Continue
        );
        assert!("retry".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn test_zone_store_config_deserialize() {
        let json = r#"{
            "type": "router_os",
            "address": "192.168.88.1",
            "username": "admin",
            "password": "secret"
        }"#;

        let config: ZoneStoreConfig = serde_json::from_str(json).unwrap();
        match &config {
            ZoneStoreConfig::RouterOs {
                timeout_secs,
                verify_tls,
                ..
            } => {
                assert_eq!(*timeout_secs, DEFAULT_ZONE_STORE_TIMEOUT_SECS);
                assert!(!verify_tls);
            }
            other => panic!("unexpected config: {:?}", other),
        }
        assert_eq!(config.type_name(), "routeros");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_directory_config_validation() {
        assert!(DirectoryConfig::default().validate().is_ok());

        let bad = DirectoryConfig::Nomad {
            address: "127.0.0.1:4646".to_string(),
            token: None,
            region: None,
            http_auth: None,
            tls: NomadTlsConfig::default(),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_nomad_tls_needs_cert_and_key_together() {
        let tls = NomadTlsConfig {
            client_cert: Some(PathBuf::from("/etc/nomad/cli.pem")),
            ..Default::default()
        };
        assert!(tls.validate().is_err());

        let tls = NomadTlsConfig {
            client_cert: Some(PathBuf::from("/etc/nomad/cli.pem")),
            client_key: Some(PathBuf::from("/etc/nomad/cli-key.pem")),
            ..Default::default()
        };
        assert!(tls.validate().is_ok());
    }

    #[test]
    fn test_nomad_config_deserialize_tls() {
        let json = r#"{
            "type": "nomad",
            "address": "https://nomad.service.consul:4646",
            "http_auth": "ops:hunter2",
            "tls": {"ca_cert": "/etc/nomad/ca.pem", "skip_verify": true}
        }"#;

        let config: DirectoryConfig = serde_json::from_str(json).unwrap();
        match &config {
            DirectoryConfig::Nomad { tls, http_auth, .. } => {
                assert_eq!(tls.ca_cert, Some(PathBuf::from("/etc/nomad/ca.pem")));
                assert!(tls.skip_verify);
                assert!(!tls.is_default());
                assert_eq!(http_auth.as_deref(), Some("ops:hunter2"));
            }
            other => panic!("unexpected config: {:?}", other),
        }
        assert!(config.validate().is_ok());

        let no_user = DirectoryConfig::Nomad {
            address: DEFAULT_NOMAD_ADDRESS.to_string(),
            token: None,
            region: None,
            http_auth: Some(":secret".to_string()),
            tls: NomadTlsConfig::default(),
        };
        assert!(no_user.validate().is_err());
    }
}
