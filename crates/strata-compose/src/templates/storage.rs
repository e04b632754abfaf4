//! Storage unit: object-storage buckets, typically fronted by an edge unit.

use serde::{Deserialize, Serialize};
use strata_common::error::Result;
use strata_common::types::{HandleKey, ResourceHandle, ResourceKind};

use super::unique_names;
use crate::registry::Inputs;
use crate::unit::{BuildContext, OutputDecl, UnitTemplate};

const fn yes() -> bool {
    true
}

/// Configuration of a storage unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Buckets, each producing one handle.
    pub buckets: Vec<BucketConfig>,
}

/// One bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Handle name; the provider name is `{prefix}-{name}`.
    pub name: String,
    /// Keep object versions.
    #[serde(default)]
    pub versioned: bool,
    /// Encrypt objects at rest.
    #[serde(default = "yes")]
    pub encrypted: bool,
    /// Block every form of public access.
    #[serde(default = "yes")]
    pub block_public_access: bool,
}

fn valid_bucket_name(name: &str) -> bool {
    (3..=63).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
}

impl UnitTemplate for StorageConfig {
    fn kind(&self) -> &'static str {
        "storage"
    }

    fn requires(&self) -> Vec<HandleKey> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<OutputDecl> {
        self.buckets
            .iter()
            .map(|b| OutputDecl::new(&b.name, ResourceKind::Storage))
            .collect()
    }

    fn construct(&self, ctx: &BuildContext<'_>, _inputs: &Inputs<'_>) -> Result<Vec<ResourceHandle>> {
        unique_names(ctx, "bucket", self.buckets.iter().map(|b| b.name.as_str()))?;
        self.buckets
            .iter()
            .map(|bucket| {
                let id = ctx.project.resource_name(&bucket.name);
                if !valid_bucket_name(&id) {
                    return Err(ctx.invalid(format!(
                        "bucket name \"{id}\" must be 3-63 lowercase letters, digits, or '-'"
                    )));
                }
                Ok(ResourceHandle::new(&bucket.name, ResourceKind::Storage)
                    .with_attribute("id", &id)
                    .with_attribute("domain", format!("{id}.s3.{}.amazonaws.com", ctx.project.region))
                    .with_attribute("versioned", bucket.versioned.to_string())
                    .with_attribute("encrypted", bucket.encrypted.to_string())
                    .with_attribute("block_public_access", bucket.block_public_access.to_string()))
            })
            .collect()
    }
}
