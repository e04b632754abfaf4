//! Dependency-ordered unit graph.
//!
//! A [`Composition`] owns the registered unit descriptors. Resolution and
//! instantiation never mutate it, so both may be repeated and always
//! produce the same result for the same registrations.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use strata_common::config::{ComposeConfig, ProjectContext};
use strata_common::error::{Result, StrataError};
use strata_common::types::{HandleKey, ResourceKind};

use crate::graph::DependencyGraph;
use crate::registry::{HandleRegistry, Inputs};
use crate::unit::{BuildContext, UnitDescriptor};
use crate::validator;

/// A resolved second-phase link from a compute workload to a routing target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Compute handle being attached.
    pub source: HandleKey,
    /// Routing-target handle receiving it.
    pub target: HandleKey,
}

/// Result of a successful [`Composition::instantiate_all`] run.
#[derive(Debug, Clone)]
pub struct Instantiation {
    /// Unit names in instantiation order.
    pub order: Vec<String>,
    /// Every handle produced, in instantiation order.
    pub registry: HandleRegistry,
    /// Attachments resolved after all units were built.
    pub attachments: Vec<Attachment>,
}

/// A set of units for one project, ready to be resolved and instantiated.
#[derive(Debug, Clone)]
pub struct Composition {
    project: ProjectContext,
    config: ComposeConfig,
    units: Vec<UnitDescriptor>,
    index: HashMap<String, usize>,
}

impl Composition {
    /// Creates an empty composition.
    #[must_use]
    pub fn new(project: ProjectContext, config: ComposeConfig) -> Self {
        Self {
            project,
            config,
            units: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Project identity threaded into every template.
    #[must_use]
    pub const fn project(&self) -> &ProjectContext {
        &self.project
    }

    /// Composition-wide knobs.
    #[must_use]
    pub const fn config(&self) -> &ComposeConfig {
        &self.config
    }

    /// Registered units, in registration order.
    #[must_use]
    pub fn units(&self) -> &[UnitDescriptor] {
        &self.units
    }

    /// Looks up a registered unit by name.
    #[must_use]
    pub fn unit(&self, name: &str) -> Option<&UnitDescriptor> {
        self.index.get(name).map(|&pos| &self.units[pos])
    }

    /// Registers a unit.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::DuplicateUnit`] if the name is taken, or
    /// [`StrataError::InvalidUnitConfiguration`] if the name is empty or
    /// contains `.`.
    pub fn register(&mut self, descriptor: UnitDescriptor) -> Result<()> {
        if descriptor.name.is_empty() {
            return Err(StrataError::invalid("", "unit name must not be empty"));
        }
        if descriptor.name.contains('.') {
            return Err(StrataError::invalid(
                &descriptor.name,
                "unit name must not contain '.'",
            ));
        }
        if self.index.contains_key(&descriptor.name) {
            return Err(StrataError::DuplicateUnit {
                unit: descriptor.name,
            });
        }
        tracing::debug!(unit = %descriptor.name, kind = descriptor.kind(), "registered unit");
        let _ = self
            .index
            .insert(descriptor.name.clone(), self.units.len());
        self.units.push(descriptor);
        Ok(())
    }

    /// Validates every requirement and builds the unit dependency graph.
    ///
    /// Attachments are checked but never become graph edges.
    ///
    /// # Errors
    ///
    /// Returns the first validation error; see [`validator::validate`].
    pub fn dependency_graph(&self) -> Result<DependencyGraph> {
        let _ = validator::validate(&self.units)?;
        let mut graph = DependencyGraph::new();
        let nodes: HashMap<&str, _> = self
            .units
            .iter()
            .map(|unit| (unit.name.as_str(), graph.add_unit(&unit.name)))
            .collect();
        for unit in &self.units {
            let dependent = nodes[unit.name.as_str()];
            for key in unit.requires() {
                // Validation guarantees the producing unit exists.
                if let Some(&dependency) = nodes.get(key.unit()) {
                    graph.add_dependency(dependent, dependency, key);
                }
            }
        }
        Ok(graph)
    }

    /// Returns the order in which units must be instantiated.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnsatisfiedDependency`] if a required handle
    /// has no producer, or [`StrataError::CyclicDependency`] naming the
    /// units along a cycle.
    pub fn resolve_order(&self) -> Result<Vec<String>> {
        self.dependency_graph()?.resolve_order()
    }

    /// Runs every unit template in dependency order, then the attachment pass.
    ///
    /// Nothing is constructed unless the dry run and the ordering succeed.
    ///
    /// # Errors
    ///
    /// Returns any resolution error, or the first error raised by a
    /// template or by the registry.
    pub fn instantiate_all(&self) -> Result<Instantiation> {
        let order = self.resolve_order()?;
        tracing::info!(units = order.len(), "instantiating composition");

        let mut registry = HandleRegistry::new();
        for name in &order {
            let unit = self
                .unit(name)
                .ok_or_else(|| StrataError::invalid(name, "unit vanished during instantiation"))?;
            self.instantiate_unit(unit, &mut registry)?;
        }

        let attachments = self.attach(&order, &registry)?;
        tracing::info!(
            handles = registry.len(),
            attachments = attachments.len(),
            "composition instantiated"
        );
        Ok(Instantiation {
            order,
            registry,
            attachments,
        })
    }

    fn instantiate_unit(&self, unit: &UnitDescriptor, registry: &mut HandleRegistry) -> Result<()> {
        let ctx = BuildContext {
            project: &self.project,
            config: &self.config,
            unit: &unit.name,
        };
        let declared: BTreeSet<HandleKey> = unit.requires();
        let handles = {
            let inputs = Inputs::new(registry, &declared);
            unit.spec.template().construct(&ctx, &inputs)?
        };

        let expected: HashMap<String, ResourceKind> = unit
            .produces()
            .into_iter()
            .map(|decl| (decl.name, decl.kind))
            .collect();
        let mut produced = HashSet::new();
        for handle in &handles {
            match expected.get(handle.name()) {
                Some(&kind) if kind == handle.kind() => {}
                Some(kind) => {
                    return Err(ctx.invalid(format!(
                        "template produced \"{}\" as {}, declared {kind}",
                        handle.name(),
                        handle.kind()
                    )));
                }
                None => {
                    return Err(ctx.invalid(format!(
                        "template produced undeclared handle \"{}\"",
                        handle.name()
                    )));
                }
            }
            let _ = produced.insert(handle.name().to_string());
        }
        if let Some(missing) = expected.keys().find(|name| !produced.contains(*name)) {
            return Err(ctx.invalid(format!(
                "template did not produce declared handle \"{missing}\""
            )));
        }

        let count = handles.len();
        for handle in handles {
            let name = handle.name().to_string();
            registry.put(&unit.name, &name, handle)?;
        }
        tracing::info!(unit = %unit.name, kind = unit.kind(), handles = count, "instantiated unit");
        Ok(())
    }

    fn attach(&self, order: &[String], registry: &HandleRegistry) -> Result<Vec<Attachment>> {
        let mut attachments = Vec::new();
        for name in order {
            let Some(unit) = self.unit(name) else {
                continue;
            };
            for decl in unit.attachments() {
                let source = HandleKey::new(&unit.name, &decl.source);
                let source_kind = registry.lookup(&source)?.kind();
                let target_kind = registry.lookup(&decl.target)?.kind();
                if source_kind != ResourceKind::Compute || target_kind != ResourceKind::Target {
                    return Err(StrataError::invalid(
                        &unit.name,
                        format!(
                            "cannot attach {source_kind} \"{source}\" to {target_kind} \"{}\"",
                            decl.target
                        ),
                    ));
                }
                tracing::debug!(source = %source, target = %decl.target, "attached workload");
                attachments.push(Attachment {
                    source,
                    target: decl.target,
                });
            }
        }
        Ok(attachments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> ProjectContext {
        ProjectContext::new("123456789012", "us-east-1", "dev", "shop")
    }

    fn unit(yaml: &str) -> UnitDescriptor {
        serde_yaml::from_str(yaml).expect("descriptor")
    }

    fn network() -> UnitDescriptor {
        unit(
            r"
name: network
kind: network
cidr: 10.0.0.0/16
subnets:
  - { name: public-a, class: public, cidr_mask: 24 }
  - { name: private-a, class: private, cidr_mask: 24 }
",
        )
    }

    fn security() -> UnitDescriptor {
        unit(
            r"
name: security
kind: access-control
network: network.vpc
filters:
  - name: app
    rules:
      - { direction: ingress, protocol: tcp, ports: 8080, peer: { class: public } }
",
        )
    }

    fn app() -> UnitDescriptor {
        unit(
            r"
name: app
kind: compute
groups:
  - name: web
    subnets: [network.private-a]
    filters: [security.app]
    instance_type: t3.micro
    shape: { type: fleet, min: 1, desired: 2, max: 4 }
",
        )
    }

    fn composition(units: Vec<UnitDescriptor>) -> Composition {
        let mut composition = Composition::new(project(), ComposeConfig::default());
        for unit in units {
            composition.register(unit).expect("register");
        }
        composition
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut composition = composition(vec![network()]);
        let err = composition.register(network()).unwrap_err();
        assert!(matches!(err, StrataError::DuplicateUnit { unit } if unit == "network"));
    }

    #[test]
    fn register_rejects_dotted_names() {
        let mut composition = composition(Vec::new());
        let mut bad = network();
        bad.name = "net.work".into();
        assert!(matches!(
            composition.register(bad),
            Err(StrataError::InvalidUnitConfiguration { .. })
        ));
    }

    #[test]
    fn three_tier_resolves_in_dependency_order() {
        // Registered consumer-first to show order is not registration order.
        let composition = composition(vec![app(), security(), network()]);
        let order = composition.resolve_order().expect("order");
        assert_eq!(order, ["network", "security", "app"]);

        let result = composition.instantiate_all().expect("instantiate");
        assert_eq!(result.order, order);
        assert_eq!(result.registry.units(), ["network", "security", "app"]);
        let web = result.registry.get("app", "web").expect("web");
        assert_eq!(web.attribute("subnet_ids"), Some("dev-shop-subnet-private-a"));
        assert_eq!(web.attribute("filter_ids"), Some("dev-shop-sg-app"));
    }

    #[test]
    fn network_depending_on_compute_is_a_cycle() {
        let composition = composition(vec![
            network().depends_on(HandleKey::new("app", "web")),
            security(),
            app(),
        ]);
        match composition.resolve_order().unwrap_err() {
            StrataError::CyclicDependency { cycle } => {
                assert!(cycle.contains(&"network".to_string()));
                assert!(cycle.contains(&"app".to_string()));
                assert_eq!(cycle.first(), cycle.last());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(composition.instantiate_all().is_err());
    }

    #[test]
    fn unsatisfied_dependency_fails_before_any_template() {
        // The network template would reject this config if it ever ran.
        let mut broken = network();
        if let crate::unit::UnitSpec::Network(config) = &mut broken.spec {
            config.subnets.clear();
        }
        let composition = composition(vec![broken, app()]);
        match composition.instantiate_all().unwrap_err() {
            StrataError::UnsatisfiedDependency { consumer, handle } => {
                assert_eq!(consumer, "app");
                assert_eq!(handle.to_string(), "network.private-a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn attachment_back_to_distribution_is_not_a_cycle() {
        let lb = unit(
            r"
name: lb
kind: distribution
subnets: [network.public-a]
listeners:
  - { port: 80, default_target: web }
target_groups:
  - { name: web, port: 8080 }
",
        );
        let mut attached = app();
        if let crate::unit::UnitSpec::Compute(config) = &mut attached.spec {
            config.groups[0].attach_to = vec![HandleKey::new("lb", "web")];
        }
        let composition = composition(vec![network(), security(), lb, attached]);
        let result = composition.instantiate_all().expect("instantiate");
        assert_eq!(
            result.attachments,
            [Attachment {
                source: HandleKey::new("app", "web"),
                target: HandleKey::new("lb", "web"),
            }]
        );
        assert_eq!(result.registry.owned_by("lb").count(), 2);
    }

    #[test]
    fn instantiation_is_repeatable() {
        let composition = composition(vec![network(), security(), app()]);
        let first = composition.instantiate_all().expect("first");
        let second = composition.instantiate_all().expect("second");
        assert_eq!(first.order, second.order);
        let keys = |i: &Instantiation| {
            i.registry
                .iter()
                .map(|(k, h)| (k.clone(), h.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(keys(&first), keys(&second));
    }

    #[test]
    fn template_errors_abort_the_run() {
        let mut bad = app();
        if let crate::unit::UnitSpec::Compute(config) = &mut bad.spec {
            config.groups[0].subnets = vec![HandleKey::new("network", "public-a")];
        }
        let composition = composition(vec![network(), security(), bad]);
        let err = composition.instantiate_all().unwrap_err();
        assert!(err.to_string().contains("private subnets"), "got: {err}");
    }
}
