//! Project context and composition-wide configuration.

use serde::{Deserialize, Serialize};

use crate::types::EgressPolicy;

/// Read-only identity of the project being composed.
///
/// Threaded into every unit template for the duration of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext {
    /// Target account identifier.
    pub account: String,
    /// Target region.
    pub region: String,
    /// Environment name (`dev`, `prod`, ...).
    pub env: String,
    /// Project name.
    pub name: String,
    /// Naming prefix override; defaults to `{env}-{name}`.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Credential scope handed to the provisioning engine.
    #[serde(default)]
    pub credential_scope: Option<String>,
    /// Default SSH key pair for compute workloads.
    #[serde(default)]
    pub key_pair: Option<String>,
}

impl ProjectContext {
    /// Creates a context with the default naming prefix.
    #[must_use]
    pub fn new(
        account: impl Into<String>,
        region: impl Into<String>,
        env: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
            env: env.into(),
            name: name.into(),
            prefix: None,
            credential_scope: None,
            key_pair: None,
        }
    }

    /// Returns the naming prefix applied to every provider identifier.
    #[must_use]
    pub fn prefix(&self) -> String {
        self.prefix
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.env, self.name))
    }

    /// Builds a provider identifier such as `dev-shop-sg-app`.
    #[must_use]
    pub fn resource_name(&self, suffix: &str) -> String {
        format!("{}-{suffix}", self.prefix())
    }
}

/// Knobs shared by every template during one composition run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// Egress policy of filters that do not choose one.
    pub default_egress: EgressPolicy,
    /// Distance between consecutive subnet-level ACL rule numbers.
    pub acl_rule_step: u32,
    /// First identifier of instance-level filter rules.
    pub group_rule_start: u32,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            default_egress: EgressPolicy::DenyAll,
            acl_rule_step: crate::constants::DEFAULT_ACL_RULE_STEP,
            group_rule_start: crate::constants::DEFAULT_GROUP_RULE_START,
        }
    }
}
