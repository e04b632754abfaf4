//! Unit descriptors and the template seam.
//!
//! A [`UnitDescriptor`] names a unit and carries its kind-specific
//! configuration. Required inputs and declared outputs are derived from
//! that configuration, so the composition can check every edge before a
//! single template runs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strata_common::config::{ComposeConfig, ProjectContext};
use strata_common::error::{Result, StrataError};
use strata_common::types::{HandleKey, ResourceHandle, ResourceKind};

use crate::registry::Inputs;
use crate::templates::{
    access::AccessControlConfig, cluster::ClusterConfig, compute::ComputeConfig, datastore::DataTierConfig,
    distribution::DistributionConfig, edge::EdgeConfig, network::NetworkConfig,
    storage::StorageConfig,
};

/// A handle a template promises to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDecl {
    /// Handle name within the unit.
    pub name: String,
    /// Kind of the produced handle.
    pub kind: ResourceKind,
}

impl OutputDecl {
    /// Creates an output declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A second-phase link from one of the unit's own outputs to a routing target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDecl {
    /// Output of this unit being attached.
    pub source: String,
    /// Routing target produced by another unit.
    pub target: HandleKey,
}

/// Everything a template may read besides its input handles.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    /// Project identity and naming.
    pub project: &'a ProjectContext,
    /// Composition-wide knobs.
    pub config: &'a ComposeConfig,
    /// Name of the unit being built.
    pub unit: &'a str,
}

impl BuildContext<'_> {
    /// Builds an [`StrataError::InvalidUnitConfiguration`] for this unit.
    #[must_use]
    pub fn invalid(&self, message: impl Into<String>) -> StrataError {
        StrataError::invalid(self.unit, message)
    }

    /// Fails unless `handle` has the expected kind.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::InvalidUnitConfiguration`] naming the handle.
    pub fn expect_kind(
        &self,
        key: &HandleKey,
        handle: &ResourceHandle,
        expected: ResourceKind,
    ) -> Result<()> {
        if handle.kind() == expected {
            Ok(())
        } else {
            Err(self.invalid(format!(
                "\"{key}\" is a {} handle, expected {expected}",
                handle.kind()
            )))
        }
    }
}

/// Per-kind declaration template.
///
/// Implementations describe resource shape only; ordering and registry
/// bookkeeping belong to the composition.
pub trait UnitTemplate {
    /// Short kind name used in logs and plans.
    fn kind(&self) -> &'static str;

    /// Handles this template reads.
    fn requires(&self) -> Vec<HandleKey>;

    /// Handles this template will produce, known before construction.
    fn outputs(&self) -> Vec<OutputDecl>;

    /// Second-phase attachments to routing targets.
    fn attachments(&self) -> Vec<AttachmentDecl> {
        Vec::new()
    }

    /// Produces the declared handles.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::InvalidUnitConfiguration`] when concrete
    /// values are malformed or violate a placement contract.
    fn construct(&self, ctx: &BuildContext<'_>, inputs: &Inputs<'_>) -> Result<Vec<ResourceHandle>>;
}

/// Kind-specific configuration of a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum UnitSpec {
    /// Address space and subnets.
    Network(NetworkConfig),
    /// Security groups and network ACLs.
    AccessControl(AccessControlConfig),
    /// Container orchestration clusters.
    Cluster(ClusterConfig),
    /// Fleets, instances, and container workloads.
    Compute(ComputeConfig),
    /// Load balancer with listeners and routing targets.
    Distribution(DistributionConfig),
    /// Content-delivery layer.
    Edge(EdgeConfig),
    /// Object-storage buckets.
    Storage(StorageConfig),
    /// Relational stores, caches, and shared filesystems.
    DataTier(DataTierConfig),
}

impl UnitSpec {
    /// Returns the template implementing this kind.
    #[must_use]
    pub fn template(&self) -> &dyn UnitTemplate {
        match self {
            Self::Network(config) => config,
            Self::AccessControl(config) => config,
            Self::Cluster(config) => config,
            Self::Compute(config) => config,
            Self::Distribution(config) => config,
            Self::Edge(config) => config,
            Self::Storage(config) => config,
            Self::DataTier(config) => config,
        }
    }
}

/// A named unit plus its configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitDescriptor {
    /// Unit name, unique within a composition.
    pub name: String,
    /// Extra ordering edges not implied by the configuration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<HandleKey>,
    /// Kind-specific configuration.
    #[serde(flatten)]
    pub spec: UnitSpec,
}

impl UnitDescriptor {
    /// Creates a descriptor with no explicit `depends_on` edges.
    #[must_use]
    pub fn new(name: impl Into<String>, spec: UnitSpec) -> Self {
        Self {
            name: name.into(),
            depends_on: Vec::new(),
            spec,
        }
    }

    /// Adds an explicit ordering edge.
    #[must_use]
    pub fn depends_on(mut self, key: HandleKey) -> Self {
        self.depends_on.push(key);
        self
    }

    /// Short kind name of the unit.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.spec.template().kind()
    }

    /// Every handle this unit reads, deduplicated.
    #[must_use]
    pub fn requires(&self) -> BTreeSet<HandleKey> {
        self.depends_on
            .iter()
            .cloned()
            .chain(self.spec.template().requires())
            .collect()
    }

    /// Every handle this unit declares.
    #[must_use]
    pub fn produces(&self) -> Vec<OutputDecl> {
        self.spec.template().outputs()
    }

    /// Second-phase attachments this unit declares.
    #[must_use]
    pub fn attachments(&self) -> Vec<AttachmentDecl> {
        self.spec.template().attachments()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_deserializes_with_kind_tag() {
        let yaml = r"
name: storage
kind: storage
buckets:
  - name: assets
";
        let unit: UnitDescriptor = serde_yaml::from_str(yaml).expect("deserialize");
        assert_eq!(unit.name, "storage");
        assert_eq!(unit.kind(), "storage");
        assert_eq!(unit.produces().len(), 1);
    }

    #[test]
    fn requires_merges_explicit_and_implied_edges() {
        let yaml = r"
name: security
kind: access-control
network: network.vpc
depends_on: [network.vpc, bootstrap.marker]
filters:
  - name: app
";
        let unit: UnitDescriptor = serde_yaml::from_str(yaml).expect("deserialize");
        let requires = unit.requires();
        assert_eq!(requires.len(), 2);
        assert!(requires.contains(&HandleKey::new("bootstrap", "marker")));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let yaml = "name: x\nkind: mainframe\n";
        assert!(serde_yaml::from_str::<UnitDescriptor>(yaml).is_err());
    }
}
