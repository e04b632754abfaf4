//! Per-kind declaration templates.
//!
//! Each template turns `(context, input handles, configuration)` into the
//! handles its unit owns. Templates perform no graph reasoning.

pub mod access;
pub mod cluster;
pub mod compute;
pub mod datastore;
pub mod distribution;
pub mod edge;
pub mod network;
pub mod storage;

use strata_common::error::Result;
use strata_common::types::{HandleKey, ResourceHandle, ResourceKind, SubnetClass};

use crate::registry::Inputs;
use crate::unit::BuildContext;

/// Resolves placement subnets, enforcing one subnet class and one network.
///
/// Returns the handles plus the shared `network_id`.
pub(crate) fn placement<'a>(
    ctx: &BuildContext<'_>,
    inputs: &Inputs<'a>,
    subnets: &[HandleKey],
    class: SubnetClass,
    what: &str,
) -> Result<(Vec<&'a ResourceHandle>, String)> {
    if subnets.is_empty() {
        return Err(ctx.invalid(format!("{what} declares no placement subnets")));
    }
    let mut handles = Vec::with_capacity(subnets.len());
    let mut network_id: Option<String> = None;
    for key in subnets {
        let handle = inputs.get(key)?;
        match handle.kind().subnet_class() {
            Some(found) if found == class => {}
            Some(found) => {
                return Err(ctx.invalid(format!(
                    "{what} must be placed in {class} subnets, \"{key}\" is {found}"
                )));
            }
            None => {
                return Err(ctx.invalid(format!(
                    "{what} placement \"{key}\" is a {} handle, not a subnet",
                    handle.kind()
                )));
            }
        }
        let owner = handle.require_attribute(ctx.unit, "network_id")?;
        match &network_id {
            Some(first) if first != owner => {
                return Err(ctx.invalid(format!(
                    "{what} spans networks \"{first}\" and \"{owner}\""
                )));
            }
            Some(_) => {}
            None => network_id = Some(owner.to_string()),
        }
        handles.push(handle);
    }
    Ok((handles, network_id.unwrap_or_default()))
}

/// Resolves filter handles, rejecting anything that is not a filter.
pub(crate) fn filters<'a>(
    ctx: &BuildContext<'_>,
    inputs: &Inputs<'a>,
    keys: &[HandleKey],
) -> Result<Vec<&'a ResourceHandle>> {
    keys.iter()
        .map(|key| {
            let handle = inputs.get(key)?;
            ctx.expect_kind(key, handle, ResourceKind::Filter)?;
            Ok(handle)
        })
        .collect()
}

/// Comma-joined provider identifiers.
pub(crate) fn join_ids(handles: &[&ResourceHandle]) -> String {
    handles
        .iter()
        .map(|h| h.id())
        .collect::<Vec<_>>()
        .join(",")
}

/// Fails if two entries share a name.
pub(crate) fn unique_names<'a>(
    ctx: &BuildContext<'_>,
    what: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(ctx.invalid(format!("{what} with empty name")));
        }
        if !seen.insert(name) {
            return Err(ctx.invalid(format!("duplicate {what} name: \"{name}\"")));
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared handles and contexts for template tests.

    use std::collections::BTreeSet;

    use strata_common::config::{ComposeConfig, ProjectContext};

    use super::*;
    use crate::registry::HandleRegistry;

    pub fn project() -> ProjectContext {
        ProjectContext::new("123456789012", "us-east-1", "dev", "shop")
    }

    pub fn subnet(name: &str, class: SubnetClass, network_id: &str) -> ResourceHandle {
        ResourceHandle::new(name, ResourceKind::Subnet(class))
            .with_attribute("id", format!("dev-shop-subnet-{name}"))
            .with_attribute("network_id", network_id)
            .with_attribute("class", class.as_str())
    }

    pub fn filter(name: &str, public_ingress: bool) -> ResourceHandle {
        ResourceHandle::new(name, ResourceKind::Filter)
            .with_attribute("id", format!("dev-shop-sg-{name}"))
            .with_attribute("public_ingress", public_ingress.to_string())
    }

    pub fn cluster(name: &str, network_id: &str) -> ResourceHandle {
        ResourceHandle::new(name, ResourceKind::Cluster)
            .with_attribute("id", format!("dev-shop-ecs-{name}"))
            .with_attribute("engine", "ecs")
            .with_attribute("network_id", network_id)
    }

    /// Registry holding a small three-tier network plus filters under units
    /// `network` and `security`, and clusters under `platform`.
    pub fn registry() -> HandleRegistry {
        let mut registry = HandleRegistry::new();
        let entries = [
            ("network", subnet("public-a", SubnetClass::Public, "dev-shop-vpc")),
            ("network", subnet("private-a", SubnetClass::Private, "dev-shop-vpc")),
            ("network", subnet("private-b", SubnetClass::Private, "dev-shop-vpc")),
            ("network", subnet("data-a", SubnetClass::Isolated, "dev-shop-vpc")),
            ("other", subnet("private-x", SubnetClass::Private, "dev-shop-other")),
            ("security", filter("alb", true)),
            ("security", filter("app", false)),
            ("security", filter("db", false)),
            ("platform", cluster("main", "dev-shop-vpc")),
            ("platform", cluster("elsewhere", "dev-shop-other")),
        ];
        for (unit, handle) in entries {
            let name = handle.name().to_string();
            registry.put(unit, &name, handle).expect("fixture handle");
        }
        registry
    }

    /// Runs `f` with a build context and an input view over every key the
    /// registry holds.
    pub fn with_inputs<T>(
        registry: &HandleRegistry,
        unit: &str,
        f: impl FnOnce(&BuildContext<'_>, &Inputs<'_>) -> T,
    ) -> T {
        let project = project();
        let config = ComposeConfig::default();
        let ctx = BuildContext {
            project: &project,
            config: &config,
            unit,
        };
        let declared: BTreeSet<HandleKey> = registry.iter().map(|(k, _)| k.clone()).collect();
        f(&ctx, &Inputs::new(registry, &declared))
    }
}
