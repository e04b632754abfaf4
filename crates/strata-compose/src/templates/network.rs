//! Network unit: one address space carved into named subnets, plus the
//! private service endpoints reachable from inside it.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use strata_common::constants::MAX_SUBNET_PREFIX;
use strata_common::error::Result;
use strata_common::types::{HandleKey, ResourceHandle, ResourceKind, SubnetClass};

use crate::net::{CidrAllocator, Ipv4Cidr};
use crate::registry::Inputs;
use crate::unit::{BuildContext, OutputDecl, UnitTemplate};

/// Services reachable through a gateway endpoint; every other service
/// needs an interface endpoint.
const GATEWAY_SERVICES: [&str; 2] = ["s3", "dynamodb"];

fn default_handle() -> String {
    "vpc".into()
}

const fn default_endpoint_class() -> SubnetClass {
    SubnetClass::Private
}

/// Configuration of a network unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Name of the address-space handle.
    #[serde(default = "default_handle")]
    pub handle: String,
    /// Address space, e.g. `10.0.0.0/16`.
    pub cidr: String,
    /// Subnets, allocated in declaration order.
    #[serde(default)]
    pub subnets: Vec<SubnetConfig>,
    /// NAT gateways for private subnets; each needs a public subnet.
    #[serde(default)]
    pub nat_gateways: u8,
    /// Whether traffic flow logs are enabled.
    #[serde(default)]
    pub flow_logs: bool,
    /// Private endpoints for provider services.
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

/// How an endpoint reaches its service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointKind {
    /// Route-table entry; only for `s3` and `dynamodb`.
    Gateway,
    /// Network interface placed in the served subnets.
    Interface,
}

impl EndpointKind {
    /// Kind name as written in manifests.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::Interface => "interface",
        }
    }
}

/// One service endpoint, e.g. `{ service: s3, kind: gateway }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Provider service name, such as `s3` or `ssm`.
    pub service: String,
    /// Gateway or interface.
    pub kind: EndpointKind,
    /// Class of the subnets the endpoint serves.
    #[serde(default = "default_endpoint_class")]
    pub subnets: SubnetClass,
}

/// One subnet of a network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubnetConfig {
    /// Handle name of the subnet.
    pub name: String,
    /// Reachability class.
    pub class: SubnetClass,
    /// Prefix length of the subnet block.
    pub cidr_mask: u8,
    /// Availability zone.
    #[serde(default)]
    pub zone: Option<String>,
}

impl NetworkConfig {
    fn check_names(&self, ctx: &BuildContext<'_>) -> Result<()> {
        if self.subnets.is_empty() {
            return Err(ctx.invalid("network declares no subnets"));
        }
        let mut seen = HashSet::from([self.handle.as_str()]);
        for subnet in &self.subnets {
            if subnet.name.is_empty() {
                return Err(ctx.invalid("subnet with empty name"));
            }
            if !seen.insert(subnet.name.as_str()) {
                return Err(ctx.invalid(format!("duplicate subnet name: \"{}\"", subnet.name)));
            }
        }
        let public = self
            .subnets
            .iter()
            .filter(|s| s.class == SubnetClass::Public)
            .count();
        if usize::from(self.nat_gateways) > public {
            return Err(ctx.invalid(format!(
                "{} NAT gateway(s) need as many public subnets, found {public}",
                self.nat_gateways
            )));
        }
        Ok(())
    }

    fn check_endpoints(&self, ctx: &BuildContext<'_>) -> Result<()> {
        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            let service = endpoint.service.as_str();
            let well_formed = !service.is_empty()
                && service
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
            if !well_formed {
                return Err(ctx.invalid(format!(
                    "endpoint service {service:?} must be lowercase letters, digits, '-' or '.'"
                )));
            }
            if !seen.insert(service) {
                return Err(ctx.invalid(format!("duplicate endpoint for service \"{service}\"")));
            }
            match endpoint.kind {
                EndpointKind::Gateway if !GATEWAY_SERVICES.contains(&service) => {
                    return Err(ctx.invalid(format!(
                        "service \"{service}\" has no gateway endpoint, use an interface endpoint"
                    )));
                }
                EndpointKind::Interface if endpoint.subnets == SubnetClass::Public => {
                    return Err(ctx.invalid(format!(
                        "interface endpoint for \"{service}\" must serve private or isolated subnets"
                    )));
                }
                _ => {}
            }
            if !self.subnets.iter().any(|s| s.class == endpoint.subnets) {
                return Err(ctx.invalid(format!(
                    "endpoint for \"{service}\" serves {} subnets, but the network has none",
                    endpoint.subnets
                )));
            }
        }
        Ok(())
    }
}

impl UnitTemplate for NetworkConfig {
    fn kind(&self) -> &'static str {
        "network"
    }

    fn requires(&self) -> Vec<HandleKey> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<OutputDecl> {
        std::iter::once(OutputDecl::new(&self.handle, ResourceKind::Network))
            .chain(
                self.subnets
                    .iter()
                    .map(|s| OutputDecl::new(&s.name, ResourceKind::Subnet(s.class))),
            )
            .collect()
    }

    fn construct(&self, ctx: &BuildContext<'_>, _inputs: &Inputs<'_>) -> Result<Vec<ResourceHandle>> {
        self.check_names(ctx)?;
        self.check_endpoints(ctx)?;
        let base: Ipv4Cidr = self.cidr.parse().map_err(|e: String| ctx.invalid(e))?;
        let network_id = ctx.project.resource_name(&self.handle);

        let mut allocator = CidrAllocator::new(base);
        let mut by_class: BTreeMap<SubnetClass, Vec<String>> = BTreeMap::new();
        let mut subnets = Vec::with_capacity(self.subnets.len());
        for subnet in &self.subnets {
            if subnet.cidr_mask < base.prefix() || subnet.cidr_mask > MAX_SUBNET_PREFIX {
                return Err(ctx.invalid(format!(
                    "subnet \"{}\" mask /{} must lie between /{} and /{MAX_SUBNET_PREFIX}",
                    subnet.name,
                    subnet.cidr_mask,
                    base.prefix()
                )));
            }
            let block = allocator.allocate(subnet.cidr_mask).ok_or_else(|| {
                ctx.invalid(format!(
                    "address space {base} exhausted while allocating subnet \"{}\"",
                    subnet.name
                ))
            })?;
            by_class
                .entry(subnet.class)
                .or_default()
                .push(block.to_string());

            let mut handle = ResourceHandle::new(&subnet.name, ResourceKind::Subnet(subnet.class))
                .with_attribute("id", ctx.project.resource_name(&format!("subnet-{}", subnet.name)))
                .with_attribute("cidr", block.to_string())
                .with_attribute("class", subnet.class.as_str())
                .with_attribute("network_id", &network_id);
            if let Some(zone) = &subnet.zone {
                handle = handle.with_attribute("zone", zone);
            }
            tracing::debug!(unit = ctx.unit, subnet = %subnet.name, cidr = %block, "allocated subnet");
            subnets.push(handle);
        }

        let mut network = ResourceHandle::new(&self.handle, ResourceKind::Network)
            .with_attribute("id", &network_id)
            .with_attribute("cidr", base.to_string())
            .with_attribute("region", &ctx.project.region)
            .with_attribute("nat_gateways", self.nat_gateways.to_string())
            .with_attribute("flow_logs", self.flow_logs.to_string());
        for class in SubnetClass::ALL {
            if let Some(blocks) = by_class.get(&class) {
                network = network.with_attribute(format!("cidrs.{class}"), blocks.join(","));
            }
        }
        if !self.endpoints.is_empty() {
            let services: Vec<&str> = self.endpoints.iter().map(|e| e.service.as_str()).collect();
            network = network.with_attribute("endpoints", services.join(","));
        }
        for endpoint in &self.endpoints {
            let service = &endpoint.service;
            let id = ctx.project.resource_name(&format!("vpce-{service}"));
            tracing::debug!(unit = ctx.unit, service = %service, kind = endpoint.kind.as_str(), "declared endpoint");
            network = network
                .with_attribute(format!("endpoint.{service}.id"), id)
                .with_attribute(format!("endpoint.{service}.kind"), endpoint.kind.as_str())
                .with_attribute(format!("endpoint.{service}.subnets"), endpoint.subnets.as_str());
        }

        Ok(std::iter::once(network).chain(subnets).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use strata_common::config::{ComposeConfig, ProjectContext};

    use super::*;
    use crate::registry::HandleRegistry;

    fn subnet(name: &str, class: SubnetClass, mask: u8) -> SubnetConfig {
        SubnetConfig {
            name: name.into(),
            class,
            cidr_mask: mask,
            zone: Some("us-east-1a".into()),
        }
    }

    fn build(config: &NetworkConfig) -> Result<Vec<ResourceHandle>> {
        let project = ProjectContext::new("123456789012", "us-east-1", "dev", "shop");
        let compose = ComposeConfig::default();
        let ctx = BuildContext {
            project: &project,
            config: &compose,
            unit: "network",
        };
        let registry = HandleRegistry::new();
        let declared = BTreeSet::new();
        config.construct(&ctx, &Inputs::new(&registry, &declared))
    }

    fn three_tier() -> NetworkConfig {
        NetworkConfig {
            handle: default_handle(),
            cidr: "10.0.0.0/16".into(),
            subnets: vec![
                subnet("public-a", SubnetClass::Public, 20),
                subnet("private-a", SubnetClass::Private, 20),
                subnet("data-a", SubnetClass::Isolated, 24),
            ],
            nat_gateways: 1,
            flow_logs: true,
            endpoints: Vec::new(),
        }
    }

    fn endpoint(service: &str, kind: EndpointKind) -> EndpointConfig {
        EndpointConfig {
            service: service.into(),
            kind,
            subnets: SubnetClass::Private,
        }
    }

    #[test]
    fn outputs_cover_network_and_subnets() {
        let outputs = three_tier().outputs();
        assert_eq!(outputs.len(), 4);
        assert_eq!(outputs[0], OutputDecl::new("vpc", ResourceKind::Network));
        assert_eq!(
            outputs[3],
            OutputDecl::new("data-a", ResourceKind::Subnet(SubnetClass::Isolated))
        );
    }

    #[test]
    fn allocates_subnets_in_order() {
        let handles = build(&three_tier()).expect("build");
        let cidrs: Vec<&str> = handles[1..]
            .iter()
            .map(|h| h.attribute("cidr").expect("cidr"))
            .collect();
        assert_eq!(cidrs, vec!["10.0.0.0/20", "10.0.16.0/20", "10.0.32.0/24"]);
        assert_eq!(handles[0].id(), "dev-shop-vpc");
        assert_eq!(handles[1].attribute("network_id"), Some("dev-shop-vpc"));
        assert_eq!(handles[1].attribute("zone"), Some("us-east-1a"));
    }

    #[test]
    fn network_handle_lists_cidrs_per_class() {
        let handles = build(&three_tier()).expect("build");
        assert_eq!(handles[0].attribute("cidrs.private"), Some("10.0.16.0/20"));
        assert_eq!(handles[0].attribute("cidrs.isolated"), Some("10.0.32.0/24"));
    }

    #[test]
    fn rejects_malformed_cidr() {
        let mut config = three_tier();
        config.cidr = "10.0.0/16".into();
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("malformed CIDR"), "got: {err}");
    }

    #[test]
    fn rejects_exhausted_space() {
        let mut config = three_tier();
        config.cidr = "10.0.0.0/20".into();
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("exhausted"), "got: {err}");
    }

    #[test]
    fn rejects_mask_wider_than_network() {
        let mut config = three_tier();
        config.subnets[0].cidr_mask = 8;
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("must lie between"), "got: {err}");
    }

    #[test]
    fn rejects_duplicate_subnet_names() {
        let mut config = three_tier();
        config.subnets[1].name = "public-a".into();
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate subnet"), "got: {err}");
    }

    #[test]
    fn endpoints_are_exposed_on_network_handle() {
        let mut config = three_tier();
        config.endpoints = vec![
            endpoint("s3", EndpointKind::Gateway),
            endpoint("ssm", EndpointKind::Interface),
        ];
        let handles = build(&config).expect("build");
        let vpc = &handles[0];
        assert_eq!(vpc.attribute("endpoints"), Some("s3,ssm"));
        assert_eq!(vpc.attribute("endpoint.s3.id"), Some("dev-shop-vpce-s3"));
        assert_eq!(vpc.attribute("endpoint.s3.kind"), Some("gateway"));
        assert_eq!(vpc.attribute("endpoint.ssm.kind"), Some("interface"));
        assert_eq!(vpc.attribute("endpoint.ssm.subnets"), Some("private"));
        assert_eq!(handles.len(), 4);
    }

    #[test]
    fn no_endpoints_no_attributes() {
        let handles = build(&three_tier()).expect("build");
        assert_eq!(handles[0].attribute("endpoints"), None);
    }

    #[test]
    fn endpoints_deserialize_with_default_class() {
        let yaml = r"
cidr: 10.0.0.0/16
subnets:
  - { name: private-a, class: private, cidr_mask: 24 }
endpoints:
  - { service: s3, kind: gateway }
  - { service: ssm, kind: interface, subnets: isolated }
";
        let config: NetworkConfig = serde_yaml::from_str(yaml).expect("deserialize");
        assert_eq!(config.endpoints[0].subnets, SubnetClass::Private);
        assert_eq!(config.endpoints[1].subnets, SubnetClass::Isolated);
        assert_eq!(config.endpoints[1].kind, EndpointKind::Interface);
    }

    #[test]
    fn gateway_only_for_gateway_services() {
        let mut config = three_tier();
        config.endpoints = vec![endpoint("ssm", EndpointKind::Gateway)];
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("has no gateway endpoint"), "got: {err}");
    }

    #[test]
    fn interface_endpoint_rejects_public_subnets() {
        let mut config = three_tier();
        let mut ssm = endpoint("ssm", EndpointKind::Interface);
        ssm.subnets = SubnetClass::Public;
        config.endpoints = vec![ssm];
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("private or isolated"), "got: {err}");
    }

    #[test]
    fn endpoint_services_are_unique_and_well_formed() {
        let mut config = three_tier();
        config.endpoints = vec![
            endpoint("s3", EndpointKind::Gateway),
            endpoint("s3", EndpointKind::Gateway),
        ];
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate endpoint"), "got: {err}");

        config.endpoints = vec![endpoint("", EndpointKind::Interface)];
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("endpoint service"), "got: {err}");
    }

    #[test]
    fn endpoint_needs_served_subnets() {
        let mut config = three_tier();
        config.subnets.retain(|s| s.class != SubnetClass::Private);
        config.nat_gateways = 0;
        config.endpoints = vec![endpoint("s3", EndpointKind::Gateway)];
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("has none"), "got: {err}");
    }

    #[test]
    fn nat_gateways_need_public_subnets() {
        let mut config = three_tier();
        config.nat_gateways = 2;
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("NAT gateway"), "got: {err}");
    }
}
