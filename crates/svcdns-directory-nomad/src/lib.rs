// # Nomad Service Directory
//
// This crate provides a HashiCorp Nomad service directory for svcdns.
//
// ## Architecture
//
// Reads Nomad native service registrations over the HTTP API:
//
// 1. `GET /v1/namespaces` lists the namespaces the token can see
// 2. `GET /v1/services?namespace=<ns>` lists service stubs (name + tags)
// 3. `GET /v1/service/<name>?namespace=<ns>` lists registered instances
//
// Only allocations that are running keep a registration, so every returned
// instance address is treated as serving.
//
// Pagination is not followed: each call is expected to return the complete
// result set.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use svcdns_core::config::{DirectoryConfig, NomadTlsConfig};
use svcdns_core::traits::{ServiceDirectory, ServiceDirectoryFactory};
use svcdns_core::{BackendRegistry, DesiredState, Error, Result};

/// Default HTTP timeout for Nomad API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the Nomad ACL token
const TOKEN_HEADER: &str = "X-Nomad-Token";

/// A namespace from `GET /v1/namespaces`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Namespace {
    pub name: String,
}

/// Services of one namespace from `GET /v1/services`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NamespaceServices {
    pub namespace: String,
    #[serde(default)]
    pub services: Vec<ServiceStub>,
}

/// A service name and the union of its tags
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceStub {
    pub service_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ServiceStub {
    /// Whether this service passes the tag filter (empty tag = everything)
    pub fn matches_tag(&self, tag: &str) -> bool {
        tag.is_empty() || self.tags.iter().any(|t| t == tag)
    }
}

/// One registered instance from `GET /v1/service/<name>`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRegistration {
    #[serde(rename = "ID", default)]
    pub id: String,
    pub service_name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: u16,
}

/// Connection settings for [`NomadDirectory`]
#[derive(Clone)]
pub struct NomadSettings {
    /// Base URL of the Nomad HTTP API
    pub address: String,

    /// ACL token
    /// ⚠️ NEVER log this value
    pub token: Option<String>,

    /// Region to query (None = the agent's region)
    pub region: Option<String>,

    /// HTTP basic auth as `user[:password]`
    /// ⚠️ NEVER log this value
    pub http_auth: Option<String>,

    /// CA trust, client identity and verification switch
    pub tls: NomadTlsConfig,

    /// Per-request timeout
    pub timeout: Duration,
}

// Custom Debug implementation that hides credentials
impl std::fmt::Debug for NomadSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NomadSettings")
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .field("region", &self.region)
            .field("http_auth", &self.http_auth.as_ref().map(|_| "<REDACTED>"))
            .field("tls", &self.tls)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl NomadSettings {
    /// Settings for an address with no credentials and platform TLS defaults
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: None,
            region: None,
            http_auth: None,
            tls: NomadTlsConfig::default(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region.filter(|r| !r.is_empty());
        self
    }

    pub fn with_http_auth(mut self, auth: Option<String>) -> Self {
        self.http_auth = auth.filter(|a| !a.is_empty());
        self
    }

    pub fn with_tls(mut self, tls: NomadTlsConfig) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Nomad-backed service directory
pub struct NomadDirectory {
    /// Base URL of the Nomad HTTP API
    address: String,

    /// ACL token
    /// ⚠️ NEVER log this value
    token: Option<String>,

    /// Region to query
    region: Option<String>,

    /// Basic auth username and optional password
    basic_auth: Option<(String, Option<String>)>,

    /// HTTP client
    client: reqwest::Client,
}

// Custom Debug implementation that hides credentials
impl std::fmt::Debug for NomadDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NomadDirectory")
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .field("region", &self.region)
            .field(
                "basic_auth",
                &self.basic_auth.as_ref().map(|(user, _)| user.as_str()),
            )
            .finish()
    }
}

impl NomadDirectory {
    /// Create a new Nomad directory with platform TLS defaults
    ///
    /// # Parameters
    ///
    /// - `address`: Base URL of the API (e.g., "http://127.0.0.1:4646")
    /// - `token`: ACL token, if ACLs are enabled
    /// - `region`: Region to query (None = the agent's region)
    pub fn new(
        address: impl Into<String>,
        token: Option<String>,
        region: Option<String>,
    ) -> Result<Self> {
        Self::from_settings(
            NomadSettings::new(address)
                .with_token(token)
                .with_region(region),
        )
    }

    /// Create from full connection settings
    ///
    /// CA and client-identity files are read here; a missing or unparsable
    /// file is a configuration error.
    pub fn from_settings(settings: NomadSettings) -> Result<Self> {
        let address = settings.address.trim_end_matches('/').to_string();
        reqwest::Url::parse(&address)
            .map_err(|e| Error::config(format!("Invalid Nomad address '{}': {}", address, e)))?;
        settings.tls.validate()?;

        let mut builder = reqwest::Client::builder().timeout(settings.timeout);
        if !settings.tls.is_default() {
            tracing::debug!("Nomad TLS overrides: {:?}", settings.tls);
        }

        for certificate in load_ca_certificates(&settings.tls)? {
            builder = builder.add_root_certificate(certificate);
        }
        if let Some(identity) = load_client_identity(&settings.tls)? {
            builder = builder.identity(identity);
        }
        if settings.tls.skip_verify {
            tracing::warn!("TLS verification disabled for Nomad at {}", address);
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let basic_auth = settings.http_auth.as_deref().map(|auth| match auth.split_once(':') {
            Some((user, password)) => (user.to_string(), Some(password.to_string())),
            None => (auth.to_string(), None),
        });

        Ok(Self {
            address,
            token: settings.token,
            region: settings.region,
            basic_auth,
            client,
        })
    }

    /// Build an endpoint URL from path segments
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.address)
            .map_err(|e| Error::config(format!("Invalid Nomad address: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::config("Nomad address cannot be a base URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET an endpoint and decode its JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        namespace: Option<&str>,
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();

        let mut request = self.client.get(url);
        if let Some(namespace) = namespace {
            request = request.query(&[("namespace", namespace)]);
        }
        if let Some(region) = &self.region {
            request = request.query(&[("region", region.as_str())]);
        }
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }
        if let Some((user, password)) = &self.basic_auth {
            request = request.basic_auth(user, password.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::transport(format!("Nomad GET {} failed: {}", path, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("Nomad GET {} response unreadable: {}", path, e)))?;

        if !status.is_success() {
            return Err(Error::directory(format!(
                "Nomad GET {} returned {}: {}",
                path,
                status,
                body.trim()
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            Error::malformed(format!("Nomad GET {} returned unexpected body: {}", path, e))
        })
    }

    /// List namespaces visible to the token
    pub async fn namespaces(&self) -> Result<Vec<Namespace>> {
        self.get_json(&["v1", "namespaces"], None).await
    }

    /// List service stubs in a namespace
    pub async fn services(&self, namespace: &str) -> Result<Vec<NamespaceServices>> {
        self.get_json(&["v1", "services"], Some(namespace)).await
    }

    /// List registered instances of a service in a namespace
    pub async fn instances(&self, namespace: &str, service: &str) -> Result<Vec<ServiceRegistration>> {
        self.get_json(&["v1", "service", service], Some(namespace))
            .await
    }
}

fn read_tls_file(path: &Path, what: &str) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| Error::config(format!("Cannot read Nomad {} {}: {}", what, path.display(), e)))
}

/// CA certificates from `ca_cert` and every file under `ca_path`
fn load_ca_certificates(tls: &NomadTlsConfig) -> Result<Vec<reqwest::Certificate>> {
    let mut files: Vec<PathBuf> = tls.ca_cert.iter().cloned().collect();

    if let Some(dir) = &tls.ca_path {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            Error::config(format!("Cannot read Nomad CA directory {}: {}", dir.display(), e))
        })?;
        let mut found: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        found.sort();
        files.extend(found);
    }

    files
        .iter()
        .map(|path| {
            let pem = read_tls_file(path, "CA certificate")?;
            reqwest::Certificate::from_pem(&pem).map_err(|e| {
                Error::config(format!("Invalid Nomad CA certificate {}: {}", path.display(), e))
            })
        })
        .collect()
}

/// Client identity for mutual TLS, when both halves are configured
fn load_client_identity(tls: &NomadTlsConfig) -> Result<Option<reqwest::Identity>> {
    let (Some(cert_path), Some(key_path)) = (&tls.client_cert, &tls.client_key) else {
        return Ok(None);
    };

    let cert = read_tls_file(cert_path, "client certificate")?;
    let key = read_tls_file(key_path, "client key")?;
    reqwest::Identity::from_pkcs8_pem(&cert, &key)
        .map(Some)
        .map_err(|e| {
            Error::config(format!(
                "Invalid Nomad client identity {}: {}",
                cert_path.display(),
                e
            ))
        })
}

#[async_trait]
impl ServiceDirectory for NomadDirectory {
    async fn list_services(&self, tag: &str) -> Result<DesiredState> {
        let mut desired = DesiredState::new();

        for namespace in self.namespaces().await? {
            tracing::debug!("Listing Nomad services in namespace {}", namespace.name);

            for group in self.services(&namespace.name).await? {
                for stub in group.services {
                    if !stub.matches_tag(tag) {
                        tracing::trace!(
                            "Skipping {}/{}: tag '{}' not present",
                            group.namespace,
                            stub.service_name,
                            tag
                        );
                        continue;
                    }

                    let instances = self.instances(&namespace.name, &stub.service_name).await?;
                    for instance in instances {
                        if instance.address.is_empty() {
                            tracing::debug!(
                                "Skipping instance {} of {}: no address",
                                instance.id,
                                stub.service_name
                            );
                            continue;
                        }
                        desired.add_address(stub.service_name.clone(), instance.address);
                    }
                }
            }
        }

        tracing::info!(
            "Nomad reported {} service(s) matching tag '{}'",
            desired.len(),
            tag
        );
        Ok(desired)
    }

    fn directory_name(&self) -> &'static str {
        "nomad"
    }
}

/// Factory for creating Nomad directories
pub struct NomadFactory;

impl ServiceDirectoryFactory for NomadFactory {
    fn create(&self, config: &DirectoryConfig) -> Result<Box<dyn ServiceDirectory>> {
        match config {
            DirectoryConfig::Nomad {
                address,
                token,
                region,
                http_auth,
                tls,
            } => {
                let settings = NomadSettings::new(address.clone())
                    .with_token(token.clone())
                    .with_region(region.clone())
                    .with_http_auth(http_auth.clone())
                    .with_tls(tls.clone());
                Ok(Box::new(NomadDirectory::from_settings(settings)?))
            }
            _ => Err(Error::config("Invalid config for Nomad directory")),
        }
    }
}

/// Register the Nomad directory with a registry
pub fn register(registry: &BackendRegistry) {
    registry.register_directory("nomad", Box::new(NomadFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creation() {
        let config = DirectoryConfig::default();

        let directory = NomadFactory.create(&config);
        assert!(directory.is_ok());
    }

    #[test]
    fn test_invalid_address_rejected() {
        assert!(NomadDirectory::new("not a url", None, None).is_err());
    }

    #[test]
    fn test_endpoint_keeps_path_prefix() {
        let directory = NomadDirectory::new("https://proxy.lan/nomad/", None, None).unwrap();
        let url = directory.endpoint(&["v1", "service", "web"]).unwrap();
        assert_eq!(url.as_str(), "https://proxy.lan/nomad/v1/service/web");
    }

    #[test]
    fn test_token_not_exposed_in_debug() {
        let directory = NomadDirectory::new(
            "http://127.0.0.1:4646",
            Some("s3cr3t-acl-token".to_string()),
            None,
        )
        .unwrap();

        let debug_str = format!("{:?}", directory);
        assert!(!debug_str.contains("s3cr3t"));
        assert!(debug_str.contains("REDACTED"));
    }

    #[test]
    fn test_factory_applies_tls_settings() {
        let config = DirectoryConfig::Nomad {
            address: "https://nomad.lan:4646".to_string(),
            token: None,
            region: None,
            http_auth: None,
            tls: NomadTlsConfig {
                skip_verify: true,
                ..Default::default()
            },
        };
        assert!(NomadFactory.create(&config).is_ok());

        let config = DirectoryConfig::Nomad {
            address: "https://nomad.lan:4646".to_string(),
            token: None,
            region: None,
            http_auth: None,
            tls: NomadTlsConfig {
                ca_cert: Some(PathBuf::from("/nonexistent/svcdns/ca.pem")),
                ..Default::default()
            },
        };
        match NomadFactory.create(&config) {
            Err(Error::Config(msg)) => assert!(msg.contains("/nonexistent/svcdns/ca.pem")),
            Err(other) => panic!("expected config error, got {:?}", other),
            Ok(_) => panic!("missing CA file must be rejected"),
        }
    }

    #[test]
    fn test_client_cert_without_key_rejected() {
        let settings = NomadSettings::new("https://nomad.lan:4646").with_tls(NomadTlsConfig {
            client_cert: Some(PathBuf::from("/etc/nomad/cli.pem")),
            ..Default::default()
        });
        assert!(matches!(
            NomadDirectory::from_settings(settings),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_http_auth_not_exposed_in_debug() {
        let settings = NomadSettings::new("http://127.0.0.1:4646")
            .with_http_auth(Some("ops:hunter2".to_string()));
        assert!(!format!("{:?}", settings).contains("hunter2"));

        let directory = NomadDirectory::from_settings(settings).unwrap();
        let debug_str = format!("{:?}", directory);
        assert!(debug_str.contains("ops"));
        assert!(!debug_str.contains("hunter2"));
    }

    #[test]
    fn test_tag_filter() {
        let stub = ServiceStub {
            service_name: "web".to_string(),
            tags: vec!["dns".to_string(), "http".to_string()],
        };

        assert!(stub.matches_tag(""));
        assert!(stub.matches_tag("dns"));
        assert!(!stub.matches_tag("grpc"));
    }

    #[test]
    fn test_registration_decodes_nomad_shape() {
        let json = r#"{
            "Address": "10.0.0.1",
            "AllocID": "3b1c4d8e",
            "CreateIndex": 12,
            "Datacenter": "dc1",
            "ID": "_nomad-task-3b1c4d8e-web-web-http",
            "JobID": "web",
            "ModifyIndex": 12,
            "Namespace": "default",
            "NodeID": "f1a2",
            "Port": 8080,
            "ServiceName": "web",
            "Tags": ["dns"]
        }"#;

        let registration: ServiceRegistration = serde_json::from_str(json).unwrap();
        assert_eq!(registration.address, "10.0.0.1");
        assert_eq!(registration.port, 8080);
        assert_eq!(registration.id, "_nomad-task-3b1c4d8e-web-web-http");
    }
}
