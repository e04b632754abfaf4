//! Domain primitive types used across the strata workspace.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// Reachability class of a subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubnetClass {
    /// Routed to and from the internet.
    Public,
    /// Outbound-only through NAT; hosts compute workloads.
    Private,
    /// No route outside the network; hosts stateful data.
    Isolated,
}

impl SubnetClass {
    /// Every class, in reachability order.
    pub const ALL: [Self; 3] = [Self::Public, Self::Private, Self::Isolated];

    /// Returns the lowercase class name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Isolated => "isolated",
        }
    }
}

impl fmt::Display for SubnetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubnetClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "isolated" => Ok(Self::Isolated),
            other => Err(format!("unknown subnet class: {other}")),
        }
    }
}

/// Kind tag of a provisioned entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// An isolated address space.
    Network,
    /// A subnet of the given class.
    Subnet(SubnetClass),
    /// A traffic filter (security group or network ACL).
    Filter,
    /// A machine fleet, instance set, or container workload.
    Compute,
    /// A container orchestration cluster.
    Cluster,
    /// A load balancer.
    Distribution,
    /// A routing target (target group) owned by a distribution.
    Target,
    /// A content-delivery distribution.
    Edge,
    /// An object-storage bucket.
    Storage,
    /// A relational store, cache, or shared filesystem.
    Datastore,
}

impl ResourceKind {
    /// Returns the subnet class when this is a subnet kind.
    #[must_use]
    pub const fn subnet_class(self) -> Option<SubnetClass> {
        match self {
            Self::Subnet(class) => Some(class),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => f.write_str("network"),
            Self::Subnet(class) => write!(f, "subnet({class})"),
            Self::Filter => f.write_str("filter"),
            Self::Compute => f.write_str("compute"),
            Self::Cluster => f.write_str("cluster"),
            Self::Distribution => f.write_str("distribution"),
            Self::Target => f.write_str("target"),
            Self::Edge => f.write_str("edge"),
            Self::Storage => f.write_str("storage"),
            Self::Datastore => f.write_str("datastore"),
        }
    }
}

/// Registry key of a handle: the owning unit plus the handle's logical name.
///
/// Written as `unit.name` in manifests and messages.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HandleKey {
    unit: String,
    name: String,
}

impl HandleKey {
    /// Creates a key from its unit and handle name.
    #[must_use]
    pub fn new(unit: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            name: name.into(),
        }
    }

    /// Returns the owning unit name.
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Returns the handle name within its unit.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for HandleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.unit, self.name)
    }
}

impl FromStr for HandleKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((unit, name)) if !unit.is_empty() && !name.is_empty() && !name.contains('.') => {
                Ok(Self::new(unit, name))
            }
            _ => Err(format!("handle reference must look like \"unit.name\": {s:?}")),
        }
    }
}

impl TryFrom<String> for HandleKey {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HandleKey> for String {
    fn from(key: HandleKey) -> Self {
        key.to_string()
    }
}

/// Opaque reference to a provisioned entity.
///
/// Created once by the template of its owning unit and never mutated
/// afterwards; consumers only read its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    name: String,
    kind: ResourceKind,
    attributes: BTreeMap<String, String>,
}

impl ResourceHandle {
    /// Creates a handle with no attributes.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an exposed attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns the logical name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the kind tag.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Returns an attribute value if exposed.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Returns an attribute or fails naming the consuming unit.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::InvalidUnitConfiguration`] if the attribute
    /// is not exposed by this handle.
    pub fn require_attribute(&self, consumer: &str, key: &str) -> Result<&str> {
        self.attribute(key).ok_or_else(|| {
            StrataError::invalid(
                consumer,
                format!("handle \"{}\" exposes no attribute \"{key}\"", self.name),
            )
        })
    }

    /// Returns the provider identifier (`id` attribute) or the logical name.
    #[must_use]
    pub fn id(&self) -> &str {
        self.attribute("id").unwrap_or(&self.name)
    }

    /// Returns all exposed attributes.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}

/// Default outbound policy of a filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EgressPolicy {
    /// Only explicitly declared egress rules are permitted.
    #[default]
    DenyAll,
    /// All outbound traffic is permitted.
    AllowAll,
}

impl fmt::Display for EgressPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DenyAll => f.write_str("deny-all"),
            Self::AllowAll => f.write_str("allow-all"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_key_parses_dotted_form() {
        let key: HandleKey = "network.private-a".parse().expect("parse");
        assert_eq!(key.unit(), "network");
        assert_eq!(key.name(), "private-a");
        assert_eq!(key.to_string(), "network.private-a");
    }

    #[test]
    fn handle_key_rejects_missing_parts() {
        assert!("network".parse::<HandleKey>().is_err());
        assert!(".vpc".parse::<HandleKey>().is_err());
        assert!("network.".parse::<HandleKey>().is_err());
        assert!("a.b.c".parse::<HandleKey>().is_err());
    }

    #[test]
    fn handle_key_deserializes_from_string() {
        let key: HandleKey = serde_json::from_str("\"security.app\"").expect("deserialize");
        assert_eq!(key, HandleKey::new("security", "app"));
    }

    #[test]
    fn handle_id_falls_back_to_name() {
        let bare = ResourceHandle::new("vpc", ResourceKind::Network);
        assert_eq!(bare.id(), "vpc");
        let named = bare.with_attribute("id", "dev-shop-vpc");
        assert_eq!(named.id(), "dev-shop-vpc");
    }

    #[test]
    fn require_attribute_names_consumer() {
        let handle = ResourceHandle::new("vpc", ResourceKind::Network);
        let err = handle.require_attribute("security", "cidr").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("security"), "got: {msg}");
        assert!(msg.contains("cidr"), "got: {msg}");
    }

    #[test]
    fn subnet_kind_exposes_class() {
        assert_eq!(
            ResourceKind::Subnet(SubnetClass::Isolated).subnet_class(),
            Some(SubnetClass::Isolated)
        );
        assert_eq!(ResourceKind::Filter.subnet_class(), None);
    }
}
