//! Data-tier unit: relational databases, caches, and shared filesystems.
//!
//! Every store lives in isolated subnets behind filters that admit no
//! public ingress.

use serde::{Deserialize, Serialize};
use strata_common::error::Result;
use strata_common::types::{HandleKey, ResourceHandle, ResourceKind, SubnetClass};

use super::{filters, join_ids, placement, unique_names};
use crate::registry::Inputs;
use crate::unit::{BuildContext, OutputDecl, UnitTemplate};

const fn yes() -> bool {
    true
}

const fn one() -> u32 {
    1
}

/// Supported store engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Engine {
    /// MySQL instance.
    Mysql,
    /// PostgreSQL instance.
    Postgres,
    /// Aurora cluster, MySQL-compatible.
    AuroraMysql,
    /// Aurora cluster, PostgreSQL-compatible.
    AuroraPostgres,
    /// Redis replication group.
    Redis,
    /// Memcached cluster.
    Memcached,
    /// Shared NFS filesystem.
    Nfs,
}

impl Engine {
    /// Wire name of the engine.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
            Self::AuroraMysql => "aurora-mysql",
            Self::AuroraPostgres => "aurora-postgres",
            Self::Redis => "redis",
            Self::Memcached => "memcached",
            Self::Nfs => "nfs",
        }
    }

    /// Listener port used when the store does not override it.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Mysql | Self::AuroraMysql => 3306,
            Self::Postgres | Self::AuroraPostgres => 5432,
            Self::Redis => 6379,
            Self::Memcached => 11211,
            Self::Nfs => 2049,
        }
    }

    /// Broad family used for naming and plans.
    #[must_use]
    pub const fn family(self) -> &'static str {
        match self {
            Self::Mysql | Self::Postgres | Self::AuroraMysql | Self::AuroraPostgres => "database",
            Self::Redis | Self::Memcached => "cache",
            Self::Nfs => "filesystem",
        }
    }

    const fn id_prefix(self) -> &'static str {
        match self {
            Self::Mysql | Self::Postgres => "rds",
            Self::AuroraMysql | Self::AuroraPostgres => "aurora",
            Self::Redis | Self::Memcached => "cache",
            Self::Nfs => "efs",
        }
    }

    const fn needs_instance_class(self) -> bool {
        !matches!(self, Self::Nfs)
    }
}

/// Configuration of a data-tier unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataTierConfig {
    /// Isolated placement subnets shared by every store.
    pub subnets: Vec<HandleKey>,
    /// Governing filters; at least one, none publicly reachable.
    pub filters: Vec<HandleKey>,
    /// Stores, each producing one handle.
    pub stores: Vec<StoreConfig>,
}

/// One store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Handle name.
    pub name: String,
    /// Engine.
    pub engine: Engine,
    /// Listener port override.
    #[serde(default)]
    pub port: Option<u16>,
    /// Machine class; required for every engine except `nfs`.
    #[serde(default)]
    pub instance_class: Option<String>,
    /// Encrypt data at rest.
    #[serde(default = "yes")]
    pub encrypted: bool,
    /// Number of nodes or readers.
    #[serde(default = "one")]
    pub replicas: u32,
}

impl DataTierConfig {
    fn check_filters(&self, ctx: &BuildContext<'_>, inputs: &Inputs<'_>) -> Result<String> {
        if self.filters.is_empty() {
            return Err(ctx.invalid("data tier declares no governing filters"));
        }
        let handles = filters(ctx, inputs, &self.filters)?;
        for (key, handle) in self.filters.iter().zip(&handles) {
            if handle.attribute("public_ingress") != Some("false") {
                return Err(ctx.invalid(format!(
                    "data tier filter \"{key}\" admits public ingress"
                )));
            }
        }
        Ok(join_ids(&handles))
    }

    fn build_store(
        &self,
        ctx: &BuildContext<'_>,
        store: &StoreConfig,
        subnet_ids: &str,
        filter_ids: &str,
        network_id: &str,
    ) -> Result<ResourceHandle> {
        let engine = store.engine;
        if store.port == Some(0) {
            return Err(ctx.invalid(format!("store \"{}\" has port 0", store.name)));
        }
        if store.replicas == 0 {
            return Err(ctx.invalid(format!("store \"{}\" needs at least one replica", store.name)));
        }
        let instance_class = store.instance_class.as_deref().filter(|c| !c.trim().is_empty());
        if engine.needs_instance_class() && instance_class.is_none() {
            return Err(ctx.invalid(format!(
                "store \"{}\" ({}) needs an instance_class",
                store.name,
                engine.as_str()
            )));
        }
        let port = store.port.unwrap_or_else(|| engine.default_port());

        let mut handle = ResourceHandle::new(&store.name, ResourceKind::Datastore)
            .with_attribute(
                "id",
                ctx.project
                    .resource_name(&format!("{}-{}", engine.id_prefix(), store.name)),
            )
            .with_attribute("engine", engine.as_str())
            .with_attribute("family", engine.family())
            .with_attribute("port", port.to_string())
            .with_attribute("replicas", store.replicas.to_string())
            .with_attribute("encrypted", store.encrypted.to_string())
            .with_attribute("network_id", network_id)
            .with_attribute("subnet_ids", subnet_ids)
            .with_attribute("filter_ids", filter_ids);
        if let Some(class) = instance_class {
            handle = handle.with_attribute("instance_class", class);
        }
        Ok(handle)
    }
}

impl UnitTemplate for DataTierConfig {
    fn kind(&self) -> &'static str {
        "data-tier"
    }

    fn requires(&self) -> Vec<HandleKey> {
        self.subnets.iter().chain(&self.filters).cloned().collect()
    }

    fn outputs(&self) -> Vec<OutputDecl> {
        self.stores
            .iter()
            .map(|s| OutputDecl::new(&s.name, ResourceKind::Datastore))
            .collect()
    }

    fn construct(&self, ctx: &BuildContext<'_>, inputs: &Inputs<'_>) -> Result<Vec<ResourceHandle>> {
        unique_names(ctx, "store", self.stores.iter().map(|s| s.name.as_str()))?;
        let (subnets, network_id) =
            placement(ctx, inputs, &self.subnets, SubnetClass::Isolated, "data tier")?;
        let filter_ids = self.check_filters(ctx, inputs)?;
        let subnet_ids = join_ids(&subnets);
        self.stores
            .iter()
            .map(|store| self.build_store(ctx, store, &subnet_ids, &filter_ids, &network_id))
            .collect()
    }
}
