//! Data model shared by directories, zone stores and the reconciler

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv6Addr;

/// Record kind for an IPv4 address
pub const IPV4_RECORD_KIND: &str = "A";

/// Record kind for an IPv6 address
pub const IPV6_RECORD_KIND: &str = "AAAA";

/// Record kind matching the family of `address`
///
/// Anything that does not parse as IPv6 is written as `A` and left for the
/// store to validate.
pub fn record_kind_for(address: &str) -> &'static str {
    if address.parse::<Ipv6Addr>().is_ok() {
        IPV6_RECORD_KIND
    } else {
        IPV4_RECORD_KIND
    }
}

/// Desired state: service name → addresses currently advertised for it
///
/// Built fresh on every run and never persisted. A name appears at most
/// once. Addresses keep the order the directory reported them in and may
/// contain duplicates; the reconciler collapses them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    services: BTreeMap<String, Vec<String>>,
}

impl DesiredState {
    /// Create an empty desired state
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an address under a service name
    pub fn add_address(&mut self, name: impl Into<String>, address: impl Into<String>) {
        self.services
            .entry(name.into())
            .or_default()
            .push(address.into());
    }

    /// Builder-style variant of [`DesiredState::add_address`] for a whole list
    pub fn with_service<I, S>(mut self, name: impl Into<String>, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.services.entry(name.into()).or_default();
        entry.extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Addresses for a name, if present
    pub fn addresses(&self, name: &str) -> Option<&[String]> {
        self.services.get(name).map(Vec::as_slice)
    }

    /// Iterate over (name, addresses)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.services
            .iter()
            .map(|(name, addrs)| (name.as_str(), addrs.as_slice()))
    }

    /// Number of service names
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// True when no service is present
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl<N, A> FromIterator<(N, A)> for DesiredState
where
    N: Into<String>,
    A: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (N, A)>>(iter: T) -> Self {
        let mut state = Self::new();
        for (name, address) in iter {
            state.add_address(name, address);
        }
        state
    }
}

/// One address binding as stored in the zone
///
/// Field names follow the RouterOS REST representation of
/// `/ip/dns/static` entries. Fields the reconciler does not use
/// (`ttl`, `disabled`, ...) are ignored when reading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedRecord {
    /// Store-assigned identifier, empty until created
    #[serde(rename = ".id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Fully-qualified record name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Address the name resolves to
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,

    /// Record kind (`A` or `AAAA` for records this crate creates)
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    /// Free-text comment, used as the ownership tag
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl ManagedRecord {
    /// A new, not yet stored, address record whose kind follows the address family
    pub fn address(
        name: impl Into<String>,
        address: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        let address = address.into();
        Self {
            id: String::new(),
            name: name.into(),
            kind: record_kind_for(&address).to_string(),
            address,
            comment: tag.into(),
        }
    }

    /// Whether the store has assigned an identifier yet
    pub fn is_stored(&self) -> bool {
        !self.id.is_empty()
    }
}

impl fmt::Display for ManagedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.id, self.name, self.address)?;
        if !self.comment.is_empty() {
            write!(f, " [{}]", self.comment)?;
        }
        Ok(())
    }
}

/// Fields a zone store can filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    /// Fully-qualified name
    Name,
    /// Address
    Address,
    /// Comment (ownership tag)
    Comment,
}

impl RecordField {
    /// Wire name of the field
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordField::Name => "name",
            RecordField::Address => "address",
            RecordField::Comment => "comment",
        }
    }

    /// Read this field from a record
    pub fn value_of<'a>(&self, record: &'a ManagedRecord) -> &'a str {
        match self {
            RecordField::Name => &record.name,
            RecordField::Address => &record.address,
            RecordField::Comment => &record.comment,
        }
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
