//! Cluster unit: container orchestration clusters in private subnets.
//!
//! Container groups of a compute unit name a cluster handle and run on it,
//! so the cluster unit is always instantiated first.

use serde::{Deserialize, Serialize};
use strata_common::error::Result;
use strata_common::types::{HandleKey, ResourceHandle, ResourceKind, SubnetClass};

use super::{filters, join_ids, placement, unique_names};
use crate::registry::Inputs;
use crate::unit::{BuildContext, OutputDecl, UnitTemplate};

const fn yes() -> bool {
    true
}

/// Configuration of a cluster unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Clusters, each producing one handle.
    pub clusters: Vec<ClusterSpec>,
}

/// Orchestrator behind a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterEngine {
    /// Managed container service.
    Ecs,
    /// Managed Kubernetes.
    Eks,
}

impl ClusterEngine {
    /// Engine name as written in manifests.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ecs => "ecs",
            Self::Eks => "eks",
        }
    }
}

/// One cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSpec {
    /// Handle name.
    pub name: String,
    /// Orchestrator.
    pub engine: ClusterEngine,
    /// Private subnets the cluster's nodes run in.
    pub subnets: Vec<HandleKey>,
    /// Filters governing the control plane and nodes.
    #[serde(default)]
    pub filters: Vec<HandleKey>,
    /// Orchestrator version; required for `eks`.
    #[serde(default)]
    pub version: Option<String>,
    /// Collect container-level metrics.
    #[serde(default = "yes")]
    pub insights: bool,
}

impl ClusterSpec {
    fn build(&self, ctx: &BuildContext<'_>, inputs: &Inputs<'_>) -> Result<ResourceHandle> {
        let what = format!("cluster \"{}\"", self.name);
        let version = self.version.as_deref().map(str::trim).filter(|v| !v.is_empty());
        match (self.engine, version) {
            (ClusterEngine::Eks, None) => {
                return Err(ctx.invalid(format!("{what} (eks) needs a version")));
            }
            (ClusterEngine::Ecs, Some(_)) => {
                return Err(ctx.invalid(format!("{what} (ecs) takes no version")));
            }
            _ => {}
        }

        let (subnets, network_id) =
            placement(ctx, inputs, &self.subnets, SubnetClass::Private, &what)?;
        let filters = filters(ctx, inputs, &self.filters)?;
        let engine = self.engine.as_str();

        let mut handle = ResourceHandle::new(&self.name, ResourceKind::Cluster)
            .with_attribute("id", ctx.project.resource_name(&format!("{engine}-{}", self.name)))
            .with_attribute("engine", engine)
            .with_attribute("network_id", network_id)
            .with_attribute("subnet_ids", join_ids(&subnets))
            .with_attribute("filter_ids", join_ids(&filters))
            .with_attribute("insights", self.insights.to_string());
        if let Some(version) = version {
            handle = handle.with_attribute("version", version);
        }
        Ok(handle)
    }
}

impl UnitTemplate for ClusterConfig {
    fn kind(&self) -> &'static str {
        "cluster"
    }

    fn requires(&self) -> Vec<HandleKey> {
        self.clusters
            .iter()
            .flat_map(|c| c.subnets.iter().chain(&c.filters))
            .cloned()
            .collect()
    }

    fn outputs(&self) -> Vec<OutputDecl> {
        self.clusters
            .iter()
            .map(|c| OutputDecl::new(&c.name, ResourceKind::Cluster))
            .collect()
    }

    fn construct(&self, ctx: &BuildContext<'_>, inputs: &Inputs<'_>) -> Result<Vec<ResourceHandle>> {
        unique_names(ctx, "cluster", self.clusters.iter().map(|c| c.name.as_str()))?;
        let handles = self
            .clusters
            .iter()
            .map(|c| c.build(ctx, inputs))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(unit = ctx.unit, clusters = handles.len(), "clusters declared");
        Ok(handles)
    }
}
