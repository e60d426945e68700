// # svcdnsd - service DNS reconciler
//
// One-shot integration layer. Reads configuration from the environment,
// lists tagged services from Nomad, reconciles them into RouterOS static DNS,
// then exits. All reconciliation logic lives in svcdns-core.
//
// ## Configuration
//
// ### Directory
// - `NOMAD_TAG`: Service tag to publish; also the ownership tag unless overridden
// - `NOMAD_ADDR`: Nomad API base URL (default http://127.0.0.1:4646)
// - `NOMAD_TOKEN`: ACL token (optional)
// - `NOMAD_REGION`: Region to query (optional)
// - `NOMAD_HTTP_AUTH`: Basic auth as `user[:password]` (optional)
// - `NOMAD_CACERT` / `NOMAD_CAPATH`: Extra CA file / directory to trust
// - `NOMAD_CLIENT_CERT` / `NOMAD_CLIENT_KEY`: Client identity for mutual TLS
// - `NOMAD_SKIP_VERIFY`: `true` to accept any Nomad certificate (default false)
//
// ### Zone store
// - `ROS_ADDRESS`: RouterOS address, `host[:port]` or full URL (required)
// - `ROS_USERNAME` / `ROS_PASSWORD`: REST API credentials (username required)
// - `ROS_TIMEOUT_SECS`: Per-request timeout, 1..=60 (default 5)
// - `ROS_VERIFY_TLS`: `true` to verify the router's certificate (default false)
//
// ### Reconciliation
// - `DNS_DOMAIN`: Domain suffix appended to service names (required)
// - `SVCDNS_OWNER_TAG`: Comment marking managed records (default `NOMAD_TAG`)
// - `SVCDNS_FAILURE_POLICY`: `abort` or `continue` (default abort)
// - `SVCDNS_MODE`: `live` or `dry-run` (default live)
// - `SVCDNS_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export NOMAD_TAG=nomad-dns
// export ROS_ADDRESS=192.168.88.1
// export ROS_USERNAME=svcdns
// export ROS_PASSWORD=secret
// export DNS_DOMAIN=lab.example.com
//
// svcdnsd
// ```

use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use svcdns_core::config::{
    DEFAULT_NOMAD_ADDRESS, DEFAULT_ZONE_STORE_TIMEOUT_SECS, DirectoryConfig, NomadTlsConfig,
    ReconcileConfig, SvcDnsConfig, ZoneStoreConfig,
};
use svcdns_core::{BackendRegistry, FailurePolicy, ReconcileReport, Reconciler};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SvcDnsExitCode {
    /// The zone matches the directory
    Success = 0,
    /// Configuration error
    ConfigError = 1,
    /// Failure talking to the directory or the zone store
    RuntimeError = 2,
}

impl From<SvcDnsExitCode> for ExitCode {
    fn from(code: SvcDnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Step of a run, named in the diagnostic line on failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Configuration,
    DirectoryInit,
    Listing,
    ZoneStoreInit,
    Reconciliation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Configuration => "configuration",
            Stage::DirectoryInit => "directory init",
            Stage::Listing => "service listing",
            Stage::ZoneStoreInit => "zone store init",
            Stage::Reconciliation => "reconciliation",
        })
    }
}

/// A run failure tagged with the stage it happened in
#[derive(Debug)]
struct StageError {
    stage: Stage,
    source: anyhow::Error,
}

impl StageError {
    fn at(stage: Stage) -> impl FnOnce(svcdns_core::Error) -> Self {
        move |e| Self {
            stage,
            source: e.into(),
        }
    }

    fn exit_code(&self) -> SvcDnsExitCode {
        let config_error = matches!(
            self.source.downcast_ref::<svcdns_core::Error>(),
            Some(svcdns_core::Error::Config(_))
        );
        if self.stage == Stage::Configuration || config_error {
            SvcDnsExitCode::ConfigError
        } else {
            SvcDnsExitCode::RuntimeError
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {:#}", self.stage, self.source)
    }
}

/// Application configuration, as read from the environment
struct Config {
    nomad_tag: String,
    nomad_address: String,
    nomad_token: Option<String>,
    nomad_region: Option<String>,
    nomad_http_auth: Option<String>,
    nomad_tls: NomadTlsConfig,
    ros_address: String,
    ros_username: String,
    ros_password: String,
    ros_timeout_secs: u64,
    ros_verify_tls: bool,
    dns_domain: String,
    owner_tag: Option<String>,
    failure_policy: String,
    mode: String,
    log_level: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("nomad_tag", &self.nomad_tag)
            .field("nomad_address", &self.nomad_address)
            .field("nomad_token", &self.nomad_token.as_ref().map(|_| "<REDACTED>"))
            .field("nomad_region", &self.nomad_region)
            .field(
                "nomad_http_auth",
                &self.nomad_http_auth.as_ref().map(|_| "<REDACTED>"),
            )
            .field("nomad_tls", &self.nomad_tls)
            .field("ros_address", &self.ros_address)
            .field("ros_username", &self.ros_username)
            .field("ros_password", &"<REDACTED>")
            .field("ros_timeout_secs", &self.ros_timeout_secs)
            .field("ros_verify_tls", &self.ros_verify_tls)
            .field("dns_domain", &self.dns_domain)
            .field("owner_tag", &self.owner_tag)
            .field("failure_policy", &self.failure_policy)
            .field("mode", &self.mode)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let required = |key: &str| {
            optional(key).with_context(|| {
                format!("{} is required. Set it via: export {}=...", key, key)
            })
        };

        let ros_timeout_secs = match optional("ROS_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("ROS_TIMEOUT_SECS must be a number. Got: {}", raw))?,
            None => DEFAULT_ZONE_STORE_TIMEOUT_SECS,
        };

        let ros_verify_tls = match optional("ROS_VERIFY_TLS") {
            Some(raw) => parse_bool(&raw)
                .with_context(|| format!("ROS_VERIFY_TLS must be true or false. Got: {}", raw))?,
            None => false,
        };

        let nomad_skip_verify = match optional("NOMAD_SKIP_VERIFY") {
            Some(raw) => parse_bool(&raw).with_context(|| {
                format!("NOMAD_SKIP_VERIFY must be true or false. Got: {}", raw)
            })?,
            None => false,
        };

        let nomad_tls = NomadTlsConfig {
            ca_cert: optional("NOMAD_CACERT").map(PathBuf::from),
            ca_path: optional("NOMAD_CAPATH").map(PathBuf::from),
            client_cert: optional("NOMAD_CLIENT_CERT").map(PathBuf::from),
            client_key: optional("NOMAD_CLIENT_KEY").map(PathBuf::from),
            skip_verify: nomad_skip_verify,
        };

        Ok(Self {
            nomad_tag: lookup("NOMAD_TAG").unwrap_or_default(),
            nomad_address: optional("NOMAD_ADDR")
                .unwrap_or_else(|| DEFAULT_NOMAD_ADDRESS.to_string()),
            nomad_token: optional("NOMAD_TOKEN"),
            nomad_region: optional("NOMAD_REGION"),
            nomad_http_auth: optional("NOMAD_HTTP_AUTH"),
            nomad_tls,
            ros_address: required("ROS_ADDRESS")?,
            ros_username: required("ROS_USERNAME")?,
            ros_password: lookup("ROS_PASSWORD").unwrap_or_default(),
            ros_timeout_secs,
            ros_verify_tls,
            dns_domain: required("DNS_DOMAIN")?,
            owner_tag: optional("SVCDNS_OWNER_TAG"),
            failure_policy: optional("SVCDNS_FAILURE_POLICY")
                .unwrap_or_else(|| "abort".to_string()),
            mode: optional("SVCDNS_MODE").unwrap_or_else(|| "live".to_string()),
            log_level: optional("SVCDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if !(1..=60).contains(&self.ros_timeout_secs) {
            anyhow::bail!(
                "ROS_TIMEOUT_SECS must be between 1 and 60 seconds. Got: {}",
                self.ros_timeout_secs
            );
        }

        self.dry_run()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "SVCDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        if self.nomad_address.starts_with("http://")
            && !is_loopback_url(&self.nomad_address)
            && (self.nomad_token.is_some() || self.nomad_http_auth.is_some())
        {
            eprintln!(
                "WARNING: Nomad credentials are sent over plain HTTP to {}. Consider using HTTPS.",
                self.nomad_address
            );
        }

        self.to_core()?.validate()?;
        Ok(())
    }

    /// Whether `SVCDNS_MODE` asks for a dry run
    fn dry_run(&self) -> Result<bool> {
        match self.mode.to_lowercase().as_str() {
            "live" => Ok(false),
            "dry-run" | "dry_run" | "dryrun" => Ok(true),
            _ => anyhow::bail!(
                "SVCDNS_MODE '{}' is not valid. Valid modes: live, dry-run",
                self.mode
            ),
        }
    }

    /// Convert into the core configuration
    fn to_core(&self) -> Result<SvcDnsConfig> {
        let failure_policy: FailurePolicy = self.failure_policy.parse()?;

        let mut reconcile = ReconcileConfig::new(self.dns_domain.as_str(), self.nomad_tag.as_str())
            .with_failure_policy(failure_policy)
            .with_dry_run(self.dry_run()?);
        if let Some(owner_tag) = &self.owner_tag {
            reconcile = reconcile.with_owner_tag(owner_tag.as_str());
        }

        Ok(SvcDnsConfig {
            directory: DirectoryConfig::Nomad {
                address: self.nomad_address.clone(),
                token: self.nomad_token.clone(),
                region: self.nomad_region.clone(),
                http_auth: self.nomad_http_auth.clone(),
                tls: self.nomad_tls.clone(),
            },
            zone_store: ZoneStoreConfig::RouterOs {
                address: self.ros_address.clone(),
                username: self.ros_username.clone(),
                password: self.ros_password.clone(),
                timeout_secs: self.ros_timeout_secs,
                verify_tls: self.ros_verify_tls,
            },
            reconcile,
        })
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn is_loopback_url(url: &str) -> bool {
    let rest = url.trim_start_matches("http://");
    rest.starts_with("127.") || rest.starts_with("localhost") || rest.starts_with("[::1]")
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("svcdnsd: {} failed: {:#}", Stage::Configuration, e);
            return SvcDnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("svcdnsd: {} failed: {:#}", Stage::Configuration, e);
        return SvcDnsExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SvcDnsExitCode::ConfigError.into();
    }

    // One request at a time: a single-threaded runtime is all a pass needs
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create tokio runtime: {}", e);
            return SvcDnsExitCode::RuntimeError.into();
        }
    };

    match rt.block_on(run(&config)) {
        Ok(report) => {
            info!(
                "Done: {} created, {} retained, {} deleted{}",
                report.created.len(),
                report.retained.len(),
                report.deleted.len(),
                if report.dry_run { " (dry-run)" } else { "" }
            );
            SvcDnsExitCode::Success.into()
        }
        Err(e) => {
            eprintln!("svcdnsd: {}", e);
            e.exit_code().into()
        }
    }
}

/// Run one reconciliation pass
async fn run(config: &Config) -> std::result::Result<ReconcileReport, StageError> {
    let core = config.to_core().map_err(|e| StageError {
        stage: Stage::Configuration,
        source: e,
    })?;

    let registry = BackendRegistry::with_builtins();
    svcdns_directory_nomad::register(&registry);
    svcdns_zone_routeros::register(&registry);

    info!(
        "Starting svcdnsd: {} -> {} [domain: {}]",
        core.directory.type_name(),
        core.zone_store.type_name(),
        core.reconcile.domain
    );

    let directory = registry
        .create_directory(&core.directory)
        .map_err(StageError::at(Stage::DirectoryInit))?;

    let desired = directory
        .list_services(&core.reconcile.service_tag)
        .await
        .map_err(StageError::at(Stage::Listing))?;

    let store = registry
        .create_zone_store(&core.zone_store)
        .map_err(StageError::at(Stage::ZoneStoreInit))?;

    let (reconciler, events) = Reconciler::new(store, core.reconcile)
        .map_err(StageError::at(Stage::Reconciliation))?;
    // Progress is logged by the reconciler itself; nobody consumes events here
    drop(events);

    reconciler
        .reconcile(&desired)
        .await
        .map_err(StageError::at(Stage::Reconciliation))
}
