//! Access-control unit: security groups and network ACLs scoped to a network.
//!
//! Every rule on a filter carries an identifier unique within that filter.
//! Identifiers come from a per-filter counter; instance-level filters count
//! by one from [`ComposeConfig::group_rule_start`], subnet-level ACLs count
//! by [`ComposeConfig::acl_rule_step`] and stop at [`MAX_ACL_RULE_NUMBER`].
//!
//! [`ComposeConfig::group_rule_start`]: strata_common::config::ComposeConfig
//! [`ComposeConfig::acl_rule_step`]: strata_common::config::ComposeConfig

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use strata_common::constants::MAX_ACL_RULE_NUMBER;
use strata_common::error::Result;
use strata_common::types::{EgressPolicy, HandleKey, ResourceHandle, ResourceKind, SubnetClass};

use crate::net::{Ipv4Cidr, PortRange};
use crate::registry::Inputs;
use crate::unit::{BuildContext, OutputDecl, UnitTemplate};

const PROTOCOLS: [&str; 4] = ["tcp", "udp", "icmp", "all"];

/// Configuration of an access-control unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessControlConfig {
    /// Network the filters belong to.
    pub network: HandleKey,
    /// Filters, each producing one handle.
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

/// What a filter is attached to, written `instance` or `{ subnets: <class> }`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ScopeRepr", into = "ScopeRepr")]
pub enum FilterScope {
    /// Stateful filter attached to individual workloads.
    #[default]
    Instance,
    /// Stateless ACL attached to every subnet of a class.
    Subnets(SubnetClass),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum InstanceTag {
    Instance,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ScopeRepr {
    Instance(InstanceTag),
    Subnets { subnets: SubnetClass },
}

impl From<ScopeRepr> for FilterScope {
    fn from(repr: ScopeRepr) -> Self {
        match repr {
            ScopeRepr::Instance(InstanceTag::Instance) => Self::Instance,
            ScopeRepr::Subnets { subnets } => Self::Subnets(subnets),
        }
    }
}

impl From<FilterScope> for ScopeRepr {
    fn from(scope: FilterScope) -> Self {
        match scope {
            FilterScope::Instance => Self::Instance(InstanceTag::Instance),
            FilterScope::Subnets(subnets) => Self::Subnets { subnets },
        }
    }
}

/// Traffic direction of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Inbound traffic.
    Ingress,
    /// Outbound traffic.
    Egress,
}

/// The other end of a rule, written as a map with exactly one of
/// `cidr`, `filter`, or `class`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PeerRepr", into = "PeerRepr")]
pub enum Peer {
    /// An IPv4 block.
    Cidr(String),
    /// Another filter of the same unit.
    Filter(String),
    /// Every subnet of a class in the network, one rule per subnet.
    Class(SubnetClass),
}

#[derive(Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PeerRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    class: Option<SubnetClass>,
}

impl TryFrom<PeerRepr> for Peer {
    type Error = String;

    fn try_from(repr: PeerRepr) -> std::result::Result<Self, Self::Error> {
        match (repr.cidr, repr.filter, repr.class) {
            (Some(cidr), None, None) => Ok(Self::Cidr(cidr)),
            (None, Some(filter), None) => Ok(Self::Filter(filter)),
            (None, None, Some(class)) => Ok(Self::Class(class)),
            _ => Err("peer must set exactly one of `cidr`, `filter`, or `class`".into()),
        }
    }
}

impl From<Peer> for PeerRepr {
    fn from(peer: Peer) -> Self {
        match peer {
            Peer::Cidr(cidr) => Self {
                cidr: Some(cidr),
                ..Self::default()
            },
            Peer::Filter(filter) => Self {
                filter: Some(filter),
                ..Self::default()
            },
            Peer::Class(class) => Self {
                class: Some(class),
                ..Self::default()
            },
        }
    }
}

/// One filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Handle name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Attachment scope.
    #[serde(default)]
    pub scope: FilterScope,
    /// Outbound policy; falls back to the composition default.
    #[serde(default)]
    pub egress: Option<EgressPolicy>,
    /// Explicit rules.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// One rule of a filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Explicit identifier; assigned from the filter's counter when absent.
    #[serde(default)]
    pub id: Option<u32>,
    /// Direction.
    pub direction: Direction,
    /// `tcp`, `udp`, `icmp`, or `all`.
    pub protocol: String,
    /// Port or port range.
    pub ports: PortRange,
    /// Source (ingress) or destination (egress).
    pub peer: Peer,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

/// A rule after identifier assignment and peer expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRule {
    /// Identifier unique within the filter.
    pub id: u32,
    /// Direction.
    pub direction: Direction,
    /// Protocol.
    pub protocol: String,
    /// Port range.
    pub ports: PortRange,
    /// Peer CIDR or filter identifier.
    pub peer: String,
    /// Description.
    pub description: String,
}

/// Monotonic identifier source for the rules of one filter.
#[derive(Debug)]
struct RuleIds {
    first: u32,
    step: u32,
    limit: Option<u32>,
    last: Option<u32>,
    used: BTreeSet<u32>,
}

impl RuleIds {
    fn new(first: u32, step: u32, limit: Option<u32>) -> Self {
        Self {
            first,
            step,
            limit,
            last: None,
            used: BTreeSet::new(),
        }
    }

    fn assign(&mut self, explicit: Option<u32>) -> std::result::Result<u32, String> {
        let id = match (explicit, self.last) {
            (Some(id), _) => id,
            (None, None) => self.first,
            (None, Some(last)) => last
                .checked_add(self.step)
                .ok_or_else(|| "rule identifier overflow".to_string())?,
        };
        if id == 0 {
            return Err("rule identifier 0 is reserved".into());
        }
        if let Some(limit) = self.limit.filter(|&limit| id > limit) {
            return Err(format!("rule identifier {id} exceeds the maximum of {limit}"));
        }
        if !self.used.insert(id) {
            return Err(format!("duplicate rule identifier {id}"));
        }
        self.last = Some(self.last.map_or(id, |last| last.max(id)));
        Ok(id)
    }
}

struct FilterBuild<'a> {
    ctx: &'a BuildContext<'a>,
    network: &'a ResourceHandle,
    network_cidr: Ipv4Cidr,
    public_blocks: Vec<Ipv4Cidr>,
    names: HashSet<&'a str>,
    /// Filters admitting traffic from the internet or a public subnet directly.
    exposed: HashSet<&'a str>,
}

impl<'a> FilterBuild<'a> {
    /// A block is public when it leaves the network or overlaps a public subnet.
    fn is_public_block(&self, cidr: Ipv4Cidr) -> bool {
        !self.network_cidr.contains(cidr) || self.public_blocks.iter().any(|b| b.overlaps(cidr))
    }

    /// Marks the filters with a direct public ingress rule. Malformed blocks
    /// are skipped here and reported when the filter is built.
    fn mark_exposed(&mut self, filters: &'a [FilterConfig]) {
        for filter in filters {
            let exposed = filter
                .rules
                .iter()
                .filter(|r| r.direction == Direction::Ingress)
                .any(|r| match &r.peer {
                    Peer::Cidr(block) => block
                        .parse::<Ipv4Cidr>()
                        .is_ok_and(|cidr| self.is_public_block(cidr)),
                    Peer::Class(class) => *class == SubnetClass::Public,
                    Peer::Filter(_) => false,
                });
            if exposed {
                let _ = self.exposed.insert(filter.name.as_str());
            }
        }
    }

    fn filter_id(&self, name: &str, scope: FilterScope) -> String {
        match scope {
            FilterScope::Instance => self.ctx.project.resource_name(&format!("sg-{name}")),
            FilterScope::Subnets(_) => self.ctx.project.resource_name(&format!("nacl-{name}")),
        }
    }

    /// Expands a peer into concrete targets; the flag marks public reachability.
    fn expand_peer(&self, filter: &FilterConfig, peer: &Peer) -> Result<Vec<(String, bool)>> {
        match peer {
            Peer::Cidr(block) => {
                let cidr: Ipv4Cidr = block.parse().map_err(|e: String| self.ctx.invalid(e))?;
                Ok(vec![(cidr.to_string(), self.is_public_block(cidr))])
            }
            Peer::Filter(name) => {
                if filter.scope != FilterScope::Instance {
                    return Err(self.ctx.invalid(format!(
                        "filter \"{}\" is subnet-scoped and cannot reference filter \"{name}\"",
                        filter.name
                    )));
                }
                if !self.names.contains(name.as_str()) {
                    return Err(self.ctx.invalid(format!(
                        "filter \"{}\" references unknown filter \"{name}\"",
                        filter.name
                    )));
                }
                Ok(vec![(
                    self.filter_id(name, FilterScope::Instance),
                    self.exposed.contains(name.as_str()),
                )])
            }
            Peer::Class(class) => {
                let blocks = self
                    .network
                    .attribute(&format!("cidrs.{class}"))
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| {
                        self.ctx
                            .invalid(format!("network has no {class} subnets to reference"))
                    })?;
                Ok(blocks
                    .split(',')
                    .map(|b| (b.to_string(), *class == SubnetClass::Public))
                    .collect())
            }
        }
    }

    fn build(&self, filter: &FilterConfig) -> Result<ResourceHandle> {
        let config = self.ctx.config;
        let mut ids = match filter.scope {
            FilterScope::Instance => RuleIds::new(config.group_rule_start, 1, None),
            FilterScope::Subnets(_) => RuleIds::new(
                config.acl_rule_step,
                config.acl_rule_step,
                Some(MAX_ACL_RULE_NUMBER),
            ),
        };

        let mut resolved = Vec::new();
        let mut public_ingress = false;
        for rule in &filter.rules {
            let protocol = rule.protocol.trim().to_ascii_lowercase();
            if protocol.is_empty() {
                return Err(self.ctx.invalid(format!(
                    "filter \"{}\" has a rule with an empty protocol",
                    filter.name
                )));
            }
            if !PROTOCOLS.contains(&protocol.as_str()) {
                return Err(self.ctx.invalid(format!(
                    "filter \"{}\" has a rule with unknown protocol \"{protocol}\"",
                    filter.name
                )));
            }

            let peers = self.expand_peer(filter, &rule.peer)?;
            if rule.id.is_some() && peers.len() > 1 {
                return Err(self.ctx.invalid(format!(
                    "filter \"{}\": explicit rule identifier on a peer expanding to {} subnets",
                    filter.name,
                    peers.len()
                )));
            }
            for (peer, public) in peers {
                let id = ids
                    .assign(rule.id)
                    .map_err(|e| self.ctx.invalid(format!("filter \"{}\": {e}", filter.name)))?;
                if rule.direction == Direction::Ingress && public {
                    public_ingress = true;
                }
                resolved.push(ResolvedRule {
                    id,
                    direction: rule.direction,
                    protocol: protocol.clone(),
                    ports: rule.ports,
                    peer,
                    description: rule.description.clone(),
                });
            }
        }

        let egress = filter.egress.unwrap_or(config.default_egress);
        let count = |direction: Direction| {
            resolved
                .iter()
                .filter(|r| r.direction == direction)
                .count()
                .to_string()
        };
        let scope = match filter.scope {
            FilterScope::Instance => "instance".to_string(),
            FilterScope::Subnets(class) => format!("subnets:{class}"),
        };

        Ok(ResourceHandle::new(&filter.name, ResourceKind::Filter)
            .with_attribute("id", self.filter_id(&filter.name, filter.scope))
            .with_attribute("network_id", self.network.id())
            .with_attribute("scope", scope)
            .with_attribute("egress", egress.to_string())
            .with_attribute("description", &filter.description)
            .with_attribute("public_ingress", public_ingress.to_string())
            .with_attribute("ingress_rules", count(Direction::Ingress))
            .with_attribute("egress_rules", count(Direction::Egress))
            .with_attribute("rules", serde_json::to_string(&resolved)?))
    }
}

impl UnitTemplate for AccessControlConfig {
    fn kind(&self) -> &'static str {
        "access-control"
    }

    fn requires(&self) -> Vec<HandleKey> {
        vec![self.network.clone()]
    }

    fn outputs(&self) -> Vec<OutputDecl> {
        self.filters
            .iter()
            .map(|f| OutputDecl::new(&f.name, ResourceKind::Filter))
            .collect()
    }

    fn construct(&self, ctx: &BuildContext<'_>, inputs: &Inputs<'_>) -> Result<Vec<ResourceHandle>> {
        let network = inputs.get(&self.network)?;
        ctx.expect_kind(&self.network, network, ResourceKind::Network)?;
        let network_cidr: Ipv4Cidr = network
            .require_attribute(ctx.unit, "cidr")?
            .parse()
            .map_err(|e: String| ctx.invalid(e))?;

        let mut names = HashSet::new();
        for filter in &self.filters {
            if filter.name.is_empty() {
                return Err(ctx.invalid("filter with empty name"));
            }
            if !names.insert(filter.name.as_str()) {
                return Err(ctx.invalid(format!("duplicate filter name: \"{}\"", filter.name)));
            }
        }

        let public_blocks = network
            .attribute(&format!("cidrs.{}", SubnetClass::Public))
            .unwrap_or_default()
            .split(',')
            .filter(|b| !b.is_empty())
            .map(str::parse)
            .collect::<std::result::Result<Vec<Ipv4Cidr>, String>>()
            .map_err(|e| ctx.invalid(e))?;

        let mut build = FilterBuild {
            ctx,
            network,
            network_cidr,
            public_blocks,
            names,
            exposed: HashSet::new(),
        };
        build.mark_exposed(&self.filters);
        self.filters.iter().map(|f| build.build(f)).collect()
    }
}
