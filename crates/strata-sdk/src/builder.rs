//! Fluent API for assembling a composition in code.

use strata_common::config::{ComposeConfig, ProjectContext};
use strata_common::error::Result;
use strata_common::types::EgressPolicy;
use strata_compose::{Composition, UnitDescriptor, UnitSpec};

/// Builder for a [`Composition`].
#[derive(Debug)]
pub struct StackBuilder {
    project: ProjectContext,
    config: ComposeConfig,
    units: Vec<UnitDescriptor>,
}

impl StackBuilder {
    /// Creates a builder for `{env}-{name}` in the given account and region.
    #[must_use]
    pub fn new(
        account: impl Into<String>,
        region: impl Into<String>,
        env: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::from_project(ProjectContext::new(account, region, env, name))
    }

    /// Creates a builder from an existing project context.
    #[must_use]
    pub fn from_project(project: ProjectContext) -> Self {
        Self {
            project,
            config: ComposeConfig::default(),
            units: Vec::new(),
        }
    }

    /// Overrides the naming prefix.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.project.prefix = Some(prefix.into());
        self
    }

    /// Sets the default SSH key pair for compute workloads.
    #[must_use]
    pub fn key_pair(mut self, key_pair: impl Into<String>) -> Self {
        self.project.key_pair = Some(key_pair.into());
        self
    }

    /// Sets the credential scope handed to the provisioning engine.
    #[must_use]
    pub fn credential_scope(mut self, scope: impl Into<String>) -> Self {
        self.project.credential_scope = Some(scope.into());
        self
    }

    /// Sets the egress policy of filters that do not choose one.
    #[must_use]
    pub const fn default_egress(mut self, policy: EgressPolicy) -> Self {
        self.config.default_egress = policy;
        self
    }

    /// Replaces every composition-wide knob.
    #[must_use]
    pub fn config(mut self, config: ComposeConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a unit.
    #[must_use]
    pub fn unit(mut self, name: impl Into<String>, spec: UnitSpec) -> Self {
        self.units.push(UnitDescriptor::new(name, spec));
        self
    }

    /// Adds a prepared descriptor, for units with explicit `depends_on` edges.
    #[must_use]
    pub fn descriptor(mut self, descriptor: UnitDescriptor) -> Self {
        self.units.push(descriptor);
        self
    }

    /// Registers every unit and returns the composition.
    ///
    /// # Errors
    ///
    /// Returns the first registration error, such as a duplicate unit name.
    pub fn build(self) -> Result<Composition> {
        let mut composition = Composition::new(self.project, self.config);
        for unit in self.units {
            composition.register(unit)?;
        }
        Ok(composition)
    }
}

#[cfg(test)]
mod tests {
    use strata_common::error::StrataError;
    use strata_common::types::SubnetClass;
    use strata_compose::templates::network::{NetworkConfig, SubnetConfig};
    use strata_compose::templates::storage::{BucketConfig, StorageConfig};

    use super::*;

    fn network() -> UnitSpec {
        UnitSpec::Network(NetworkConfig {
            handle: "vpc".into(),
            cidr: "10.0.0.0/16".into(),
            subnets: vec![SubnetConfig {
                name: "public-a".into(),
                class: SubnetClass::Public,
                cidr_mask: 24,
                zone: Some("eu-west-1a".into()),
            }],
            nat_gateways: 0,
            flow_logs: true,
            endpoints: Vec::new(),
        })
    }

    fn storage() -> UnitSpec {
        UnitSpec::Storage(StorageConfig {
            buckets: vec![BucketConfig {
                name: "media".into(),
                versioned: true,
                encrypted: true,
                block_public_access: true,
            }],
        })
    }

    #[test]
    fn builds_a_composition() {
        let composition = StackBuilder::new("123456789012", "eu-west-1", "prod", "blog")
            .prefix("blog")
            .key_pair("ops")
            .default_egress(EgressPolicy::AllowAll)
            .unit("network", network())
            .unit("storage", storage())
            .build()
            .expect("build");
        assert_eq!(composition.units().len(), 2);
        assert_eq!(composition.project().resource_name("vpc"), "blog-vpc");
        assert_eq!(composition.config().default_egress, EgressPolicy::AllowAll);

        let result = composition.instantiate_all().expect("instantiate");
        let bucket = result.registry.get("storage", "media").expect("bucket");
        assert_eq!(bucket.id(), "blog-media");
    }

    #[test]
    fn duplicate_unit_fails_at_build() {
        let err = StackBuilder::new("1", "eu-west-1", "prod", "blog")
            .unit("storage", storage())
            .unit("storage", storage())
            .build()
            .unwrap_err();
        assert!(matches!(err, StrataError::DuplicateUnit { .. }));
    }
}
