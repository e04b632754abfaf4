//! Compute unit: machine fleets, fixed instances, and container services.
//!
//! Workloads go to private subnets unless they are edge-facing (bastions,
//! self-managed proxies), which go to public subnets. Fleets attach to
//! routing targets in the second phase through `attach_to`. Container
//! services read a cluster handle and must share its network.

use serde::{Deserialize, Serialize};
use strata_common::error::Result;
use strata_common::types::{HandleKey, ResourceHandle, ResourceKind, SubnetClass};

use super::{filters, join_ids, placement, unique_names};
use crate::registry::Inputs;
use crate::unit::{AttachmentDecl, BuildContext, OutputDecl, UnitTemplate};

/// Configuration of a compute unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// Workload groups, each producing one handle.
    pub groups: Vec<ComputeGroup>,
}

/// Sizing model of a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ComputeShape {
    /// Auto-scaling fleet.
    Fleet {
        /// Lower bound.
        min: u32,
        /// Initial size.
        desired: u32,
        /// Upper bound.
        max: u32,
    },
    /// Fixed number of standalone instances.
    Instance {
        /// Number of instances.
        count: u32,
    },
    /// Container service on a cluster.
    Container {
        /// Cluster the service runs on.
        cluster: HandleKey,
        /// Number of running tasks.
        tasks: u32,
    },
}

/// One workload group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeGroup {
    /// Handle name.
    pub name: String,
    /// Placement subnets.
    pub subnets: Vec<HandleKey>,
    /// Governing filters.
    #[serde(default)]
    pub filters: Vec<HandleKey>,
    /// Edge-facing workloads are placed in public subnets.
    #[serde(default)]
    pub edge_facing: bool,
    /// Machine type; required for fleets and instances.
    #[serde(default)]
    pub instance_type: Option<String>,
    /// Machine or container image.
    #[serde(default)]
    pub image: Option<String>,
    /// SSH key pair; defaults to the project's.
    #[serde(default)]
    pub key_pair: Option<String>,
    /// Sizing model.
    pub shape: ComputeShape,
    /// Routing targets to join after all units are built.
    #[serde(default)]
    pub attach_to: Vec<HandleKey>,
}

impl ComputeGroup {
    fn check_shape(&self, ctx: &BuildContext<'_>) -> Result<(&'static str, String)> {
        let what = format!("compute group \"{}\"", self.name);
        let needs_type = || {
            self.instance_type
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .map(|_| ())
                .ok_or_else(|| ctx.invalid(format!("{what} needs an instance_type")))
        };
        match &self.shape {
            ComputeShape::Fleet { min, desired, max } => {
                needs_type()?;
                if *max == 0 || min > desired || desired > max {
                    return Err(ctx.invalid(format!(
                        "{what} needs 0 < max and min <= desired <= max, got {min}/{desired}/{max}"
                    )));
                }
                Ok(("asg", format!("{min}/{desired}/{max}")))
            }
            ComputeShape::Instance { count } => {
                needs_type()?;
                if *count == 0 {
                    return Err(ctx.invalid(format!("{what} needs at least one instance")));
                }
                Ok(("ec2", count.to_string()))
            }
            ComputeShape::Container { tasks, .. } => {
                if *tasks == 0 {
                    return Err(ctx.invalid(format!("{what} needs at least one task")));
                }
                Ok(("svc", tasks.to_string()))
            }
        }
    }

    fn build(&self, ctx: &BuildContext<'_>, inputs: &Inputs<'_>) -> Result<ResourceHandle> {
        let (prefix, capacity) = self.check_shape(ctx)?;
        if !self.attach_to.is_empty() && !matches!(self.shape, ComputeShape::Fleet { .. }) {
            return Err(ctx.invalid(format!(
                "compute group \"{}\" can only attach to routing targets as a fleet",
                self.name
            )));
        }

        let class = if self.edge_facing {
            SubnetClass::Public
        } else {
            SubnetClass::Private
        };
        let what = format!("compute group \"{}\"", self.name);
        let (subnets, network_id) = placement(ctx, inputs, &self.subnets, class, &what)?;
        let filters = filters(ctx, inputs, &self.filters)?;

        let shape = match self.shape {
            ComputeShape::Fleet { .. } => "fleet",
            ComputeShape::Instance { .. } => "instance",
            ComputeShape::Container { .. } => "container",
        };
        let mut handle = ResourceHandle::new(&self.name, ResourceKind::Compute)
            .with_attribute("id", ctx.project.resource_name(&format!("{prefix}-{}", self.name)))
            .with_attribute("shape", shape)
            .with_attribute("capacity", capacity)
            .with_attribute("placement", class.as_str())
            .with_attribute("network_id", &network_id)
            .with_attribute("subnet_ids", join_ids(&subnets))
            .with_attribute("filter_ids", join_ids(&filters));
        if let Some(instance_type) = &self.instance_type {
            handle = handle.with_attribute("instance_type", instance_type);
        }
        if let Some(image) = &self.image {
            handle = handle.with_attribute("image", image);
        }
        if let ComputeShape::Container { cluster: key, .. } = &self.shape {
            let cluster = inputs.get(key)?;
            ctx.expect_kind(key, cluster, ResourceKind::Cluster)?;
            let cluster_network = cluster.require_attribute(ctx.unit, "network_id")?;
            if cluster_network != network_id {
                return Err(ctx.invalid(format!(
                    "{what} runs in \"{network_id}\" but cluster \"{key}\" is in \"{cluster_network}\""
                )));
            }
            handle = handle.with_attribute("cluster", cluster.id());
        }
        if let Some(key_pair) = self.key_pair.as_ref().or(ctx.project.key_pair.as_ref()) {
            handle = handle.with_attribute("key_pair", key_pair);
        }
        Ok(handle)
    }
}

impl UnitTemplate for ComputeConfig {
    fn kind(&self) -> &'static str {
        "compute"
    }

    fn requires(&self) -> Vec<HandleKey> {
        self.groups
            .iter()
            .flat_map(|g| {
                let cluster = match &g.shape {
                    ComputeShape::Container { cluster, .. } => Some(cluster),
                    _ => None,
                };
                g.subnets.iter().chain(&g.filters).chain(cluster)
            })
            .cloned()
            .collect()
    }

    fn outputs(&self) -> Vec<OutputDecl> {
        self.groups
            .iter()
            .map(|g| OutputDecl::new(&g.name, ResourceKind::Compute))
            .collect()
    }

    fn attachments(&self) -> Vec<AttachmentDecl> {
        self.groups
            .iter()
            .flat_map(|g| {
                g.attach_to.iter().map(|target| AttachmentDecl {
                    source: g.name.clone(),
                    target: target.clone(),
                })
            })
            .collect()
    }

    fn construct(&self, ctx: &BuildContext<'_>, inputs: &Inputs<'_>) -> Result<Vec<ResourceHandle>> {
        unique_names(ctx, "compute group", self.groups.iter().map(|g| g.name.as_str()))?;
        self.groups.iter().map(|g| g.build(ctx, inputs)).collect()
    }
}
