//! Traffic-distribution unit: a load balancer, its listeners and routing
//! rules, and the routing targets compute fleets attach to.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strata_common::error::Result;
use strata_common::types::{HandleKey, ResourceHandle, ResourceKind, SubnetClass};

use super::{filters, join_ids, placement, unique_names};
use crate::registry::Inputs;
use crate::unit::{BuildContext, OutputDecl, UnitTemplate};

const MAX_ROUTE_PRIORITY: u32 = 50_000;

fn default_handle() -> String {
    "alb".into()
}

const fn default_internet_facing() -> bool {
    true
}

fn default_health_check_path() -> String {
    "/".into()
}

/// Configuration of a distribution unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Name of the balancer handle.
    #[serde(default = "default_handle")]
    pub handle: String,
    /// Placement subnets: public when internet-facing, private otherwise.
    pub subnets: Vec<HandleKey>,
    /// Governing filters.
    #[serde(default)]
    pub filters: Vec<HandleKey>,
    /// Whether the balancer has a public address.
    #[serde(default = "default_internet_facing")]
    pub internet_facing: bool,
    /// Listeners.
    #[serde(default)]
    pub listeners: Vec<ListenerConfig>,
    /// Routing targets, each producing one handle.
    #[serde(default)]
    pub target_groups: Vec<TargetGroupConfig>,
    /// Compute workloads registered directly into target groups.
    #[serde(default)]
    pub members: Vec<MemberConfig>,
}

/// Application protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppProtocol {
    /// Plain HTTP.
    #[default]
    Http,
    /// TLS-terminated HTTP.
    Https,
}

/// One listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Listening port.
    pub port: u16,
    /// Protocol.
    #[serde(default)]
    pub protocol: AppProtocol,
    /// Certificate identifier, required for HTTPS.
    #[serde(default)]
    pub certificate: Option<String>,
    /// Target group receiving unmatched requests; a fixed 404 when absent.
    #[serde(default)]
    pub default_target: Option<String>,
    /// Path-based routing rules.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// One routing rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Evaluation priority, unique per listener.
    pub priority: u32,
    /// Path patterns such as `/api/*`.
    pub path_patterns: Vec<String>,
    /// Target group name.
    pub target: String,
}

/// How targets are registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetType {
    /// Instances by identifier.
    #[default]
    Instance,
    /// Addresses, for container tasks.
    Ip,
}

/// One routing target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetGroupConfig {
    /// Handle name.
    pub name: String,
    /// Port traffic is forwarded to.
    pub port: u16,
    /// Protocol towards targets.
    #[serde(default)]
    pub protocol: AppProtocol,
    /// Health-check path.
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
    /// Registration type.
    #[serde(default)]
    pub target_type: TargetType,
}

/// A compute workload registered into a target group at build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberConfig {
    /// Compute handle.
    pub workload: HandleKey,
    /// Target group name.
    pub target: String,
}

#[derive(Serialize)]
struct ListenerSummary<'a> {
    port: u16,
    protocol: AppProtocol,
    default: String,
    routes: Vec<RouteSummary<'a>>,
}

#[derive(Serialize)]
struct RouteSummary<'a> {
    priority: u32,
    paths: &'a [String],
    target: String,
}

impl DistributionConfig {
    fn target_id(&self, ctx: &BuildContext<'_>, name: &str) -> String {
        ctx.project.resource_name(&format!("tg-{name}"))
    }

    fn check_listeners(&self, ctx: &BuildContext<'_>, targets: &HashSet<&str>) -> Result<String> {
        let mut ports = HashSet::new();
        let mut summaries = Vec::with_capacity(self.listeners.len());
        let known = |name: &str| {
            if targets.contains(name) {
                Ok(self.target_id(ctx, name))
            } else {
                Err(ctx.invalid(format!("unknown target group \"{name}\"")))
            }
        };
        for listener in &self.listeners {
            if listener.port == 0 {
                return Err(ctx.invalid("listener port 0"));
            }
            if !ports.insert(listener.port) {
                return Err(ctx.invalid(format!("duplicate listener port {}", listener.port)));
            }
            if listener.protocol == AppProtocol::Https && listener.certificate.is_none() {
                return Err(ctx.invalid(format!(
                    "HTTPS listener on port {} needs a certificate",
                    listener.port
                )));
            }
            let default = match &listener.default_target {
                Some(name) => known(name.as_str())?,
                None => "fixed-response:404".to_string(),
            };
            let mut priorities = HashSet::new();
            let mut routes = Vec::with_capacity(listener.routes.len());
            for route in &listener.routes {
                if route.priority == 0 || route.priority > MAX_ROUTE_PRIORITY {
                    return Err(ctx.invalid(format!(
                        "route priority {} outside 1..={MAX_ROUTE_PRIORITY}",
                        route.priority
                    )));
                }
                if !priorities.insert(route.priority) {
                    return Err(ctx.invalid(format!(
                        "duplicate route priority {} on listener {}",
                        route.priority, listener.port
                    )));
                }
                if route.path_patterns.is_empty() {
                    return Err(ctx.invalid(format!(
                        "route {} has no path patterns",
                        route.priority
                    )));
                }
                routes.push(RouteSummary {
                    priority: route.priority,
                    paths: &route.path_patterns,
                    target: known(route.target.as_str())?,
                });
            }
            summaries.push(ListenerSummary {
                port: listener.port,
                protocol: listener.protocol,
                default,
                routes,
            });
        }
        Ok(serde_json::to_string(&summaries)?)
    }
}

impl UnitTemplate for DistributionConfig {
    fn kind(&self) -> &'static str {
        "distribution"
    }

    fn requires(&self) -> Vec<HandleKey> {
        self.subnets
            .iter()
            .chain(&self.filters)
            .chain(self.members.iter().map(|m| &m.workload))
            .cloned()
            .collect()
    }

    fn outputs(&self) -> Vec<OutputDecl> {
        std::iter::once(OutputDecl::new(&self.handle, ResourceKind::Distribution))
            .chain(
                self.target_groups
                    .iter()
                    .map(|t| OutputDecl::new(&t.name, ResourceKind::Target)),
            )
            .collect()
    }

    fn construct(&self, ctx: &BuildContext<'_>, inputs: &Inputs<'_>) -> Result<Vec<ResourceHandle>> {
        unique_names(
            ctx,
            "distribution output",
            std::iter::once(self.handle.as_str())
                .chain(self.target_groups.iter().map(|t| t.name.as_str())),
        )?;

        let class = if self.internet_facing {
            SubnetClass::Public
        } else {
            SubnetClass::Private
        };
        let what = if self.internet_facing {
            "internet-facing balancer"
        } else {
            "internal balancer"
        };
        let (subnets, network_id) = placement(ctx, inputs, &self.subnets, class, what)?;
        let filters = filters(ctx, inputs, &self.filters)?;

        let target_names: HashSet<&str> = self.target_groups.iter().map(|t| t.name.as_str()).collect();
        let listeners = self.check_listeners(ctx, &target_names)?;

        let balancer_id = ctx.project.resource_name(&self.handle);
        let balancer = ResourceHandle::new(&self.handle, ResourceKind::Distribution)
            .with_attribute("id", &balancer_id)
            .with_attribute(
                "scheme",
                if self.internet_facing { "internet-facing" } else { "internal" },
            )
            .with_attribute("network_id", &network_id)
            .with_attribute("subnet_ids", join_ids(&subnets))
            .with_attribute("filter_ids", join_ids(&filters))
            .with_attribute("listeners", listeners);

        let mut handles = vec![balancer];
        for target in &self.target_groups {
            if target.port == 0 {
                return Err(ctx.invalid(format!("target group \"{}\" has port 0", target.name)));
            }
            if !target.health_check_path.starts_with('/') {
                return Err(ctx.invalid(format!(
                    "target group \"{}\" health check path must start with '/'",
                    target.name
                )));
            }
            let mut members = Vec::new();
            for member in self.members.iter().filter(|m| m.target == target.name) {
                let workload = inputs.get(&member.workload)?;
                ctx.expect_kind(&member.workload, workload, ResourceKind::Compute)?;
                members.push(workload);
            }
            let mut handle = ResourceHandle::new(&target.name, ResourceKind::Target)
                .with_attribute("id", self.target_id(ctx, &target.name))
                .with_attribute("balancer_id", &balancer_id)
                .with_attribute("network_id", &network_id)
                .with_attribute("port", target.port.to_string())
                .with_attribute(
                    "protocol",
                    match target.protocol {
                        AppProtocol::Http => "http",
                        AppProtocol::Https => "https",
                    },
                )
                .with_attribute("health_check_path", &target.health_check_path)
                .with_attribute(
                    "target_type",
                    match target.target_type {
                        TargetType::Instance => "instance",
                        TargetType::Ip => "ip",
                    },
                );
            if !members.is_empty() {
                handle = handle.with_attribute("members", join_ids(&members));
            }
            handles.push(handle);
        }

        if let Some(orphan) = self.members.iter().find(|m| !target_names.contains(m.target.as_str())) {
            return Err(ctx.invalid(format!(
                "member \"{}\" names unknown target group \"{}\"",
                orphan.workload, orphan.target
            )));
        }
        Ok(handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::fixtures::{registry, with_inputs};

    fn key(s: &str) -> HandleKey {
        s.parse().expect("key")
    }

    fn https(routes: Vec<RouteConfig>) -> ListenerConfig {
        ListenerConfig {
            port: 443,
            protocol: AppProtocol::Https,
            certificate: Some("arn:cert/web".into()),
            default_target: None,
            routes,
        }
    }

    fn route(priority: u32, target: &str) -> RouteConfig {
        RouteConfig {
            priority,
            path_patterns: vec!["/*".into()],
            target: target.into(),
        }
    }

    fn web() -> DistributionConfig {
        DistributionConfig {
            handle: "ext-alb".into(),
            subnets: vec![key("network.public-a")],
            filters: vec![key("security.alb")],
            internet_facing: true,
            listeners: vec![https(vec![route(10, "web")])],
            target_groups: vec![TargetGroupConfig {
                name: "web".into(),
                port: 8080,
                protocol: AppProtocol::Http,
                health_check_path: "/healthcheck".into(),
                target_type: TargetType::Instance,
            }],
            members: Vec::new(),
        }
    }

    fn build(config: &DistributionConfig) -> Result<Vec<ResourceHandle>> {
        let registry = registry();
        with_inputs(&registry, "lb", |ctx, inputs| config.construct(ctx, inputs))
    }

    #[test]
    fn produces_balancer_and_targets() {
        let handles = build(&web()).expect("build");
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].kind(), ResourceKind::Distribution);
        assert_eq!(handles[0].id(), "dev-shop-ext-alb");
        assert_eq!(handles[0].attribute("scheme"), Some("internet-facing"));
        assert_eq!(handles[1].kind(), ResourceKind::Target);
        assert_eq!(handles[1].attribute("balancer_id"), Some("dev-shop-ext-alb"));
        assert_eq!(handles[1].attribute("port"), Some("8080"));
        let listeners: serde_json::Value =
            serde_json::from_str(handles[0].attribute("listeners").expect("listeners"))
                .expect("json");
        assert_eq!(listeners[0]["routes"][0]["target"], "dev-shop-tg-web");
        assert_eq!(listeners[0]["default"], "fixed-response:404");
    }

    #[test]
    fn internet_facing_balancer_needs_public_subnets() {
        let mut config = web();
        config.subnets = vec![key("network.private-a")];
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("public subnets"), "got: {err}");
    }

    #[test]
    fn internal_balancer_goes_private() {
        let mut config = web();
        config.internet_facing = false;
        config.subnets = vec![key("network.private-a"), key("network.private-b")];
        let handles = build(&config).expect("build");
        assert_eq!(handles[0].attribute("scheme"), Some("internal"));
    }

    #[test]
    fn https_needs_certificate() {
        let mut config = web();
        config.listeners[0].certificate = None;
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("certificate"), "got: {err}");
    }

    #[test]
    fn route_to_unknown_target_fails() {
        let mut config = web();
        config.listeners[0].routes.push(route(20, "ghost"));
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("ghost"), "got: {err}");
    }

    #[test]
    fn duplicate_priorities_fail() {
        let mut config = web();
        config.listeners[0].routes.push(route(10, "web"));
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate route priority"), "got: {err}");
    }

    #[test]
    fn duplicate_listener_ports_fail() {
        let mut config = web();
        config.listeners.push(https(Vec::new()));
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate listener port"), "got: {err}");
    }

    #[test]
    fn health_check_path_must_be_absolute() {
        let mut config = web();
        config.target_groups[0].health_check_path = "health".into();
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("must start with"), "got: {err}");
    }

    #[test]
    fn members_must_be_compute() {
        let mut config = web();
        config.members.push(MemberConfig {
            workload: key("security.app"),
            target: "web".into(),
        });
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("expected compute"), "got: {err}");
        assert!(config.requires().contains(&key("security.app")));
    }

    #[test]
    fn balancer_name_cannot_shadow_target() {
        let mut config = web();
        config.handle = "web".into();
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate distribution output"), "got: {err}");
    }
}
