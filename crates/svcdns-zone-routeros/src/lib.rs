// # RouterOS Zone Store
//
// This crate provides a MikroTik RouterOS zone store for svcdns. Records live
// in the router's static DNS table and are reached over the RouterOS REST API.
//
// ## Behaviour
//
// - One HTTP request per trait call
// - HTTP basic authentication on every request
// - Short per-request timeout (5 seconds by default)
// - Certificate verification off by default: routers usually serve a
//   self-signed certificate
// - No retry, no backoff, no caching: every error goes straight back to the
//   reconciler
//
// ## Security Requirements
//
// - The password NEVER appears in logs or `Debug` output
// - Credentials travel in the `Authorization` header, never in the URL
//
// ## API Reference
//
// - List:   GET    `/rest/ip/dns/static?<field>=<value>`
// - Create: PUT    `/rest/ip/dns/static`  (201 Created + the new entry)
// - Delete: DELETE `/rest/ip/dns/static/<.id>`

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use svcdns_core::config::ZoneStoreConfig;
use svcdns_core::traits::{ZoneStore, ZoneStoreFactory};
use svcdns_core::{BackendRegistry, Error, ManagedRecord, RecordField, Result};

/// Path of the static DNS table in the REST API
const STATIC_DNS_PATH: &str = "/rest/ip/dns/static";

/// Default HTTP timeout for API requests (5 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Error body returned by the RouterOS REST API
///
/// ```json
/// {"error": 400, "message": "Bad Request", "detail": "failure: entry already exists"}
/// ```
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    detail: Option<String>,
}

/// Connection settings for a RouterOS device
///
/// Passed explicitly to [`RouterOsZoneStore::new`]; nothing here is global.
#[derive(Clone)]
pub struct RouterOsSettings {
    /// Base URL, e.g. `https://192.168.88.1`
    pub base_url: String,
    /// API username
    pub username: String,
    /// API password
    /// ⚠️ NEVER log this value
    pub password: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Verify the router's TLS certificate
    pub verify_tls: bool,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for RouterOsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterOsSettings")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("timeout", &self.timeout)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

impl RouterOsSettings {
    /// Settings with the default timeout and certificate verification off
    ///
    /// `address` is either `host[:port]` (HTTPS is implied) or a full
    /// `http://` / `https://` base URL.
    pub fn new(
        address: impl AsRef<str>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url(address.as_ref()),
            username: username.into(),
            password: password.into(),
            timeout: DEFAULT_HTTP_TIMEOUT,
            verify_tls: false,
        }
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable certificate verification
    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }
}

/// Normalize a configured address into a base URL without trailing slash
fn base_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("https://{}", address)
    }
}

/// RouterOS static DNS zone store
///
/// Stateless and single-shot: each trait call is one HTTP exchange.
pub struct RouterOsZoneStore {
    /// Connection settings
    settings: RouterOsSettings,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for RouterOsZoneStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterOsZoneStore")
            .field("settings", &self.settings)
            .finish()
    }
}

impl RouterOsZoneStore {
    /// Create a new RouterOS zone store
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the username is empty or the HTTP
    /// client cannot be built.
    pub fn new(settings: RouterOsSettings) -> Result<Self> {
        if settings.username.is_empty() {
            return Err(Error::config("RouterOS username cannot be empty"));
        }

        if !settings.verify_tls {
            tracing::debug!(
                "TLS certificate verification disabled for {}",
                settings.base_url
            );
        }

        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { settings, client })
    }

    fn collection_url(&self) -> String {
        format!("{}{}", self.settings.base_url, STATIC_DNS_PATH)
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}{}/{}", self.settings.base_url, STATIC_DNS_PATH, id)
    }

    /// Authenticate and send a request, mapping failures to transport errors
    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        request
            .basic_auth(&self.settings.username, Some(&self.settings.password))
            .send()
            .await
            .map_err(|e| Error::transport(format!("RouterOS {} failed: {}", what, e)))
    }

    /// Read the full response body
    async fn body(response: reqwest::Response, what: &str) -> Result<String> {
        response
            .text()
            .await
            .map_err(|e| Error::transport(format!("RouterOS {} response unreadable: {}", what, e)))
    }
}

/// Build a store rejection from a non-success response body
fn rejection(name: &str, status: reqwest::StatusCode, body: &str) -> Error {
    let message = match serde_json::from_str::<ApiError>(body) {
        Ok(ApiError {
            message,
            detail: Some(detail),
        }) => format!("{}: {}", message, detail),
        Ok(ApiError { message, detail: None }) if !message.is_empty() => message,
        _ => body.trim().to_string(),
    };
    Error::store_rejected(name, status.as_u16(), message)
}

#[async_trait]
impl ZoneStore for RouterOsZoneStore {
    /// Query the static table by exact field match
    ///
    /// ```http
    /// GET /rest/ip/dns/static?name=web.example.com
    /// Authorization: Basic <credentials>
    /// ```
    async fn list_by_field(&self, field: RecordField, value: &str) -> Result<Vec<ManagedRecord>> {
        tracing::debug!("Listing RouterOS static DNS where {}={}", field, value);

        let request = self
            .client
            .get(self.collection_url())
            .query(&[(field.as_str(), value)]);
        let response = self.send(request, "list").await?;

        let status = response.status();
        let body = Self::body(response, "list").await?;

        if !status.is_success() {
            if body.trim().is_empty() {
                tracing::warn!(
                    "RouterOS list {}={} returned {} without a body, treating as empty",
                    field,
                    value,
                    status
                );
                return Ok(Vec::new());
            }
            return Err(rejection(value, status, &body));
        }

        serde_json::from_str::<Vec<ManagedRecord>>(&body).map_err(|e| {
            Error::malformed(format!(
                "RouterOS list {}={} returned unexpected body: {}",
                field, value, e
            ))
        })
    }

    /// Create a static entry
    ///
    /// ```http
    /// PUT /rest/ip/dns/static
    /// {"name": "web.example.com", "address": "10.0.0.1", "type": "A", "comment": "dns"}
    /// ```
    async fn create(&self, mut record: ManagedRecord) -> Result<ManagedRecord> {
        if record.is_stored() {
            return Err(Error::invalid_input(format!(
                "Record {} already carries identifier {}",
                record.name, record.id
            )));
        }

        tracing::debug!("Creating RouterOS static DNS {} -> {}", record.name, record.address);

        let request = self.client.put(self.collection_url()).json(&record);
        let response = self.send(request, "create").await?;

        let status = response.status();
        let body = Self::body(response, "create").await?;

        if status != reqwest::StatusCode::CREATED {
            return Err(rejection(&record.name, status, &body));
        }

        let created: ManagedRecord = serde_json::from_str(&body).map_err(|e| {
            Error::malformed(format!(
                "RouterOS create of {} returned unexpected body: {}",
                record.name, e
            ))
        })?;

        if !created.is_stored() {
            return Err(Error::malformed(format!(
                "RouterOS create of {} returned no identifier",
                record.name
            )));
        }

        record.id = created.id;
        Ok(record)
    }

    /// Remove a static entry by identifier
    ///
    /// ```http
    /// DELETE /rest/ip/dns/static/*1A
    /// ```
    async fn delete(&self, record: &ManagedRecord) -> Result<()> {
        if !record.is_stored() {
            return Err(Error::invalid_input(format!(
                "Cannot delete {} without an identifier",
                record.name
            )));
        }

        tracing::debug!("Deleting RouterOS static DNS {}", record);

        let request = self.client.delete(self.item_url(&record.id));
        let response = self.send(request, "delete").await?;

        let status = response.status();
        if !status.is_success() {
            let body = Self::body(response, "delete").await?;
            return Err(rejection(
                &format!("{} ({})", record.name, record.id),
                status,
                &body,
            ));
        }

        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "routeros"
    }
}

/// Factory for creating RouterOS zone stores
pub struct RouterOsFactory;

impl ZoneStoreFactory for RouterOsFactory {
    fn create(&self, config: &ZoneStoreConfig) -> Result<Box<dyn ZoneStore>> {
        match config {
            ZoneStoreConfig::RouterOs {
                address,
                username,
                password,
                timeout_secs,
                verify_tls,
            } => {
                if address.is_empty() {
                    return Err(Error::config("RouterOS address is required"));
                }

                let settings = RouterOsSettings::new(address, username.clone(), password.clone())
                    .with_timeout(Duration::from_secs(*timeout_secs))
                    .with_verify_tls(*verify_tls);

                Ok(Box::new(RouterOsZoneStore::new(settings)?))
            }
            _ => Err(Error::config("Invalid config for RouterOS zone store")),
        }
    }
}

/// Register the RouterOS zone store with a registry
///
/// # Example
///
/// ```rust
/// use svcdns_core::BackendRegistry;
///
/// let registry = BackendRegistry::new();
/// svcdns_zone_routeros::register(&registry);
/// assert!(registry.has_zone_store("routeros"));
/// ```
pub fn register(registry: &BackendRegistry) {
    registry.register_zone_store("routeros", Box::new(RouterOsFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(address: &str, username: &str) -> ZoneStoreConfig {
        ZoneStoreConfig::RouterOs {
            address: address.to_string(),
            username: username.to_string(),
            password: "secret".to_string(),
            timeout_secs: 5,
            verify_tls: false,
        }
    }

    #[test]
    fn test_base_url_normalization() {
        assert_eq!(base_url("192.168.88.1"), "https://192.168.88.1");
        assert_eq!(base_url("router.lan:8443/"), "https://router.lan:8443");
        assert_eq!(base_url("http://127.0.0.1:8080"), "http://127.0.0.1:8080");
        assert_eq!(base_url(" https://router.lan/ "), "https://router.lan");
    }

    #[test]
    fn test_factory_creation() {
        let store = RouterOsFactory.create(&config("192.168.88.1", "admin"));
        assert!(store.is_ok());
        assert_eq!(store.unwrap().store_name(), "routeros");
    }

    #[test]
    fn test_factory_missing_address() {
        assert!(RouterOsFactory.create(&config("", "admin")).is_err());
    }

    #[test]
    fn test_factory_wrong_config() {
        assert!(RouterOsFactory.create(&ZoneStoreConfig::Memory).is_err());
    }

    #[test]
    fn test_empty_username_rejected() {
        let settings = RouterOsSettings::new("192.168.88.1", "", "secret");
        assert!(RouterOsZoneStore::new(settings).is_err());
    }

    #[test]
    fn test_password_not_exposed_in_debug() {
        let settings = RouterOsSettings::new("192.168.88.1", "admin", "hunter2-secret");
        let store = RouterOsZoneStore::new(settings).unwrap();

        let debug_str = format!("{:?}", store);
        assert!(!debug_str.contains("hunter2"));
        assert!(debug_str.contains("RouterOsZoneStore"));
        assert!(debug_str.contains("admin"));
    }

    #[test]
    fn test_defaults() {
        let settings = RouterOsSettings::new("192.168.88.1", "admin", "secret");
        assert_eq!(settings.timeout, DEFAULT_HTTP_TIMEOUT);
        assert!(!settings.verify_tls);
    }

    #[test]
    fn test_rejection_message_from_api_error() {
        let body = r#"{"error":400,"message":"Bad Request","detail":"failure: entry already exists"}"#;
        let err = rejection("web.example.com", reqwest::StatusCode::BAD_REQUEST, body);
        match err {
            Error::StoreRejected { name, status, message } => {
                assert_eq!(name, "web.example.com");
                assert_eq!(status, 400);
                assert_eq!(message, "Bad Request: failure: entry already exists");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_rejection_message_from_plain_body() {
        let err = rejection("web.example.com", reqwest::StatusCode::BAD_GATEWAY, "upstream down\n");
        assert!(err.to_string().ends_with("upstream down"));
    }
}
