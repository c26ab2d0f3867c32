//! Wire types for the two bootstrap documents and their decode functions.
//!
//! Instance metadata is authored by the cloud provider (identity), user data
//! by the operator or deploy tool (registry location, DNS overrides, network
//! layout, initial settings). Key names are the integration contract with
//! cloud-provider-interface emitters and are preserved exactly. Unknown
//! fields are ignored; absent optional fields are not a parse error.

use std::collections::BTreeMap;

use facet::Facet;

use crate::error::KeelError;

// ── instance metadata ─────────────────────────────────────

/// Cloud-provider-authored identity document.
///
/// `public-keys` nests ordinal -> label -> key material. The shape supports
/// multiple keys but only ordinal "0", label "openssh-key" is consumed.
#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(default)]
pub struct InstanceMetadata {
    #[facet(rename = "instance-id")]
    #[facet(default)]
    pub instance_id: String,
    #[facet(rename = "public-keys")]
    #[facet(default)]
    pub public_keys: BTreeMap<String, BTreeMap<String, String>>,
}

impl InstanceMetadata {
    /// The one key material callers actually read: ordinal "0", label
    /// "openssh-key".
    pub fn openssh_key(&self) -> Option<&str> {
        self.public_keys
            .get("0")
            .and_then(|labels| labels.get("openssh-key"))
            .map(String::as_str)
    }
}

// ── user data ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(default)]
pub struct ServerSpec {
    #[facet(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(default)]
pub struct RegistrySpec {
    #[facet(default)]
    pub endpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(default)]
pub struct DnsSpec {
    #[facet(default)]
    pub nameserver: Vec<String>,
}

/// A single network entry, keyed by name in the `networks` map.
///
/// `type` stays a plain string on the wire (`manual`, `dynamic`, ...) so
/// newer emitters cannot break parsing.
#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(default)]
pub struct Network {
    #[facet(rename = "type")]
    #[facet(default)]
    pub kind: String,
    #[facet(default)]
    pub ip: String,
    #[facet(default)]
    pub netmask: String,
    #[facet(default)]
    pub gateway: String,
    #[facet(default)]
    pub default: Vec<String>,
    #[facet(default)]
    pub dns: Vec<String>,
    #[facet(default)]
    pub mac: String,
}

pub type Networks = BTreeMap<String, Network>;

/// Operator-supplied bootstrap document. Every top-level field is optional;
/// the specific getter that needs a value surfaces its absence.
#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(default)]
pub struct UserData {
    pub server: Option<ServerSpec>,
    pub registry: Option<RegistrySpec>,
    pub dns: Option<DnsSpec>,
    pub networks: Option<Networks>,
    #[facet(default)]
    pub agent_id: String,
    #[facet(default)]
    pub mbus: String,
}

impl UserData {
    pub fn server_name(&self) -> Option<&str> {
        self.server
            .as_ref()
            .map(|s| s.name.as_str())
            .filter(|n| !n.is_empty())
    }

    pub fn registry_endpoint(&self) -> Option<&str> {
        self.registry
            .as_ref()
            .map(|r| r.endpoint.as_str())
            .filter(|e| !e.is_empty())
    }

    /// DNS servers declared for registry resolution; empty when no override.
    pub fn nameservers(&self) -> &[String] {
        self.dns.as_ref().map(|d| d.nameserver.as_slice()).unwrap_or(&[])
    }

    /// The network map, or `None` when absent or empty — both mean "let the
    /// platform auto-detect networking" (older cloud-provider-interface
    /// versions omit the map entirely).
    pub fn network_map(&self) -> Option<Networks> {
        match &self.networks {
            Some(map) if !map.is_empty() => Some(map.clone()),
            _ => None,
        }
    }
}

// ── decode ────────────────────────────────────────────────

/// Decode an instance metadata document. Malformed JSON (truncated,
/// syntactically invalid, not UTF-8) is a hard parse error.
pub fn parse_instance_metadata(raw: &[u8], location: &str) -> Result<InstanceMetadata, KeelError> {
    let text = std::str::from_utf8(raw).map_err(|e| KeelError::DocumentMalformed {
        document: "instance metadata",
        location: location.to_string(),
        message: e.to_string(),
    })?;
    facet_json::from_str(text).map_err(|e| KeelError::DocumentMalformed {
        document: "instance metadata",
        location: location.to_string(),
        message: e.to_string(),
    })
}

/// Decode a user data document. Field absence is fine; bad JSON is not.
pub fn parse_user_data(raw: &[u8], location: &str) -> Result<UserData, KeelError> {
    let text = std::str::from_utf8(raw).map_err(|e| KeelError::DocumentMalformed {
        document: "user data",
        location: location.to_string(),
        message: e.to_string(),
    })?;
    facet_json::from_str(text).map_err(|e| KeelError::DocumentMalformed {
        document: "user data",
        location: location.to_string(),
        message: e.to_string(),
    })
}
