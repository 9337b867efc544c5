use crate::cidr;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::node::{stable_id, NodeRef, ResourceKind, ResourceNode, Tags};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const DEFAULT_MONTHLY_BUDGET: &str = "500.00";

/// Which private route table layout to emit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteTableScope {
    /// One route table per private subnet (the default)
    #[default]
    PerSubnet,

    /// A single route table shared by all private subnets
    Shared,
}

/// How NAT egress is paired with private subnets
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NatScope {
    /// One NAT gateway per private subnet, placed in the same-index public
    /// subnet so egress stays within the availability zone (the default)
    #[default]
    PerIndex,

    /// A single NAT gateway in the first public subnet, shared by every
    /// private subnet to cut gateway cost at the price of cross-AZ traffic
    Shared,
}

/// Inputs for one landing-zone synthesis run
///
/// Subnet pairing is strictly positional: index i binds one public subnet to
/// at most one NAT gateway and, when a private CIDR exists at i, to one
/// private subnet in the same availability zone.
#[derive(Clone, Debug)]
pub struct TopologyParams {
    /// Namespace prefix for every stable id in the graph
    pub name: String,

    pub cidr_block: String,
    pub public_subnet_cidrs: Vec<String>,
    pub private_subnet_cidrs: Vec<String>,

    /// Ordered zone identifiers, resolved by subnet index
    ///
    /// Must be at least as long as the public subnet list. Zones are never
    /// reused across indexes.
    pub availability_zones: Vec<String>,

    pub tags: Tags,

    /// Monthly cost ceiling as a decimal string, "500.00" when unset
    pub monthly_budget: Option<String>,

    pub route_table_scope: RouteTableScope,
    pub nat_scope: NatScope,
}

/// Derive the complete network resource graph from the parameters
///
/// The result is a pure function of the input: repeated calls with identical
/// parameters produce structurally identical graphs, which lets the
/// reconciliation engine diff them down to a no-op. All validation happens
/// before the first node is emitted, so an error never leaves a partial
/// graph behind.
pub fn synthesize(params: &TopologyParams) -> Result<Graph> {
    validate(params)?;

    let name = &params.name;
    let tags = &params.tags;
    let private_count = params.private_subnet_cidrs.len();
    let mut graph = Graph::new();

    // Cost ceiling declared alongside the topology. Nothing depends on it
    // and it blocks nothing, it only feeds a monitoring alert.
    let budget = params
        .monthly_budget
        .clone()
        .unwrap_or_else(|| DEFAULT_MONTHLY_BUDGET.to_string());

    graph.push(
        ResourceNode::new(
            ResourceKind::Budget,
            stable_id(name, "budget", None),
            json!({
                "budget_type": "COST",
                "limit_amount": budget,
                "limit_unit": "USD",
                "time_unit": "MONTHLY",
                "time_period_start": "2010-01-01_00:00",
            }),
        )
        .tags(tags),
    )?;

    let vpc_id = stable_id(name, "vpc", None);

    graph.push(
        ResourceNode::new(
            ResourceKind::Vpc,
            vpc_id.clone(),
            json!({
                "cidr_block": params.cidr_block,
                "enable_dns_hostnames": true,
            }),
        )
        .tags(tags),
    )?;

    let igw_id = stable_id(name, "igw", None);

    graph.push(
        ResourceNode::new(
            ResourceKind::InternetGateway,
            igw_id.clone(),
            json!({"vpc_id": vpc_id}),
        )
        .tags(tags)
        .parent(NodeRef::Internal(vpc_id.clone())),
    )?;

    let public_rt_id = stable_id(name, "public-rt", None);

    graph.push(
        ResourceNode::new(
            ResourceKind::RouteTable,
            public_rt_id.clone(),
            json!({"vpc_id": vpc_id}),
        )
        .tags(tags)
        .parent(NodeRef::Internal(vpc_id.clone())),
    )?;

    graph.push(
        ResourceNode::new(
            ResourceKind::Route,
            stable_id(name, "public-route", None),
            json!({
                "route_table_id": public_rt_id,
                "destination_cidr_block": "0.0.0.0/0",
                "gateway_id": igw_id,
            }),
        )
        .parent(NodeRef::Internal(public_rt_id.clone()))
        .depends_on(NodeRef::Internal(igw_id.clone())),
    )?;

    // Private route tables come first so that routes and associations at any
    // index always reference an already emitted table
    for rt_id in private_route_table_ids(params) {
        graph.push(
            ResourceNode::new(
                ResourceKind::RouteTable,
                rt_id,
                json!({"vpc_id": vpc_id}),
            )
            .tags(tags)
            .parent(NodeRef::Internal(vpc_id.clone())),
        )?;
    }

    for (i, public_cidr) in params.public_subnet_cidrs.iter().enumerate() {
        let zone = &params.availability_zones[i];
        let public_subnet_id = stable_id(name, "public-subnet", Some(i));

        graph.push(
            ResourceNode::new(
                ResourceKind::Subnet,
                public_subnet_id.clone(),
                json!({
                    "vpc_id": vpc_id,
                    "availability_zone": zone,
                    "cidr_block": public_cidr,
                    "map_public_ip_on_launch": true,
                }),
            )
            .tags(tags)
            .parent(NodeRef::Internal(vpc_id.clone())),
        )?;

        graph.push(
            ResourceNode::new(
                ResourceKind::RouteTableAssociation,
                stable_id(name, "public-rta", Some(i)),
                json!({
                    "subnet_id": public_subnet_id,
                    "route_table_id": public_rt_id,
                }),
            )
            .parent(NodeRef::Internal(public_subnet_id.clone()))
            .depends_on(NodeRef::Internal(public_rt_id.clone())),
        )?;

        if i >= private_count {
            continue;
        }

        let nat_id = match params.nat_scope {
            NatScope::PerIndex => {
                emit_nat_gateway(&mut graph, params, &igw_id, &public_subnet_id, Some(i))?
            }

            // The single shared gateway lives in the first public subnet
            NatScope::Shared if i == 0 => {
                emit_nat_gateway(&mut graph, params, &igw_id, &public_subnet_id, None)?
            }

            NatScope::Shared => stable_id(name, "nat", None),
        };

        let private_subnet_id = stable_id(name, "private-subnet", Some(i));

        graph.push(
            ResourceNode::new(
                ResourceKind::Subnet,
                private_subnet_id.clone(),
                json!({
                    "vpc_id": vpc_id,
                    "availability_zone": zone,
                    "cidr_block": params.private_subnet_cidrs[i],
                    "map_public_ip_on_launch": false,
                }),
            )
            .tags(tags)
            .parent(NodeRef::Internal(vpc_id.clone())),
        )?;

        let (rt_id, route_id) = match params.route_table_scope {
            RouteTableScope::PerSubnet => (
                stable_id(name, "private-rt", Some(i)),
                Some(stable_id(name, "private-route", Some(i))),
            ),

            // The shared table gets its single default route once, bound to
            // the first NAT gateway; later indexes reuse it
            RouteTableScope::Shared => (
                stable_id(name, "private-rt", None),
                (i == 0).then(|| stable_id(name, "private-route", None)),
            ),
        };

        if let Some(route_id) = route_id {
            graph.push(
                ResourceNode::new(
                    ResourceKind::Route,
                    route_id,
                    json!({
                        "route_table_id": rt_id,
                        "destination_cidr_block": "0.0.0.0/0",
                        "nat_gateway_id": nat_id,
                    }),
                )
                .parent(NodeRef::Internal(rt_id.clone()))
                .depends_on(NodeRef::Internal(nat_id.clone())),
            )?;
        }

        graph.push(
            ResourceNode::new(
                ResourceKind::RouteTableAssociation,
                stable_id(name, "private-rta", Some(i)),
                json!({
                    "subnet_id": private_subnet_id,
                    "route_table_id": rt_id,
                }),
            )
            .parent(NodeRef::Internal(private_subnet_id))
            .depends_on(NodeRef::Internal(rt_id)),
        )?;
    }

    graph.validate()?;
    Ok(graph)
}

/// Stable ids of the private route tables implied by the configuration
fn private_route_table_ids(params: &TopologyParams) -> Vec<String> {
    if params.private_subnet_cidrs.is_empty() {
        return Vec::new();
    }

    match params.route_table_scope {
        RouteTableScope::Shared => vec![stable_id(&params.name, "private-rt", None)],

        RouteTableScope::PerSubnet => (0..params.private_subnet_cidrs.len())
            .map(|i| stable_id(&params.name, "private-rt", Some(i)))
            .collect(),
    }
}

/// Emit one elastic IP and the NAT gateway bound to it and a public subnet
///
/// The address allocation depends on the internet gateway because NAT egress
/// cannot come up before the VPC has an internet path.
fn emit_nat_gateway(
    graph: &mut Graph,
    params: &TopologyParams,
    igw_id: &str,
    public_subnet_id: &str,
    index: Option<usize>,
) -> Result<String> {
    let eip_id = stable_id(&params.name, "nat-eip", index);
    let nat_id = stable_id(&params.name, "nat", index);

    graph.push(
        ResourceNode::new(ResourceKind::ElasticIp, eip_id.clone(), json!({"domain": "vpc"}))
            .tags(&params.tags)
            .depends_on(NodeRef::Internal(igw_id.to_string())),
    )?;

    graph.push(
        ResourceNode::new(
            ResourceKind::NatGateway,
            nat_id.clone(),
            json!({
                "subnet_id": public_subnet_id,
                "allocation_id": eip_id,
            }),
        )
        .tags(&params.tags)
        .depends_on(NodeRef::Internal(eip_id))
        .depends_on(NodeRef::Internal(public_subnet_id.to_string())),
    )?;

    Ok(nat_id)
}

/// Reject malformed or inconsistent parameters before any node is emitted
fn validate(params: &TopologyParams) -> Result<()> {
    if params.name.trim().is_empty() {
        return Err(Error::Configuration("name must not be empty".to_string()));
    }

    cidr::check(&params.cidr_block, "cidr_block")?;

    if params.public_subnet_cidrs.is_empty() {
        return Err(Error::Configuration(
            "at least one public subnet CIDR is required".to_string(),
        ));
    }

    for (i, block) in params.public_subnet_cidrs.iter().enumerate() {
        cidr::check(block, &format!("public_subnet_cidrs[{i}]"))?;
    }

    if params.private_subnet_cidrs.len() > params.public_subnet_cidrs.len() {
        return Err(Error::Configuration(format!(
            "{} private subnet CIDRs for {} public ones: pairing is positional, \
             every private subnet needs a public subnet at the same index",
            params.private_subnet_cidrs.len(),
            params.public_subnet_cidrs.len(),
        )));
    }

    for (i, block) in params.private_subnet_cidrs.iter().enumerate() {
        cidr::check(block, &format!("private_subnet_cidrs[{i}]"))?;
    }

    if params.availability_zones.len() < params.public_subnet_cidrs.len() {
        return Err(Error::Configuration(format!(
            "{} availability zones supplied for {} public subnets: zones are \
             resolved by index and never reused",
            params.availability_zones.len(),
            params.public_subnet_cidrs.len(),
        )));
    }

    if let Some(budget) = &params.monthly_budget {
        if budget.parse::<f64>().is_err() {
            return Err(Error::Configuration(format!(
                "monthly_budget is not a decimal amount: {budget:?}"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params() -> TopologyParams {
        TopologyParams {
            name: "web".to_string(),
            cidr_block: "10.0.0.0/20".to_string(),
            public_subnet_cidrs: vec![
                "10.0.0.0/24".to_string(),
                "10.0.1.0/24".to_string(),
                "10.0.2.0/24".to_string(),
            ],
            private_subnet_cidrs: vec![],
            availability_zones: vec![
                "use1-az1".to_string(),
                "use1-az2".to_string(),
                "use1-az3".to_string(),
            ],
            tags: Tags::new(),
            monthly_budget: None,
            route_table_scope: RouteTableScope::default(),
            nat_scope: NatScope::default(),
        }
    }

    /// Follow association -> table -> route to the default route's target
    fn default_route_target(graph: &Graph, subnet_id: &str) -> Vec<String> {
        let tables: Vec<String> = graph
            .nodes_of_kind(ResourceKind::RouteTableAssociation)
            .iter()
            .filter(|a| a.property("subnet_id").and_then(|v| v.as_str()) == Some(subnet_id))
            .filter_map(|a| a.property("route_table_id")?.as_str().map(String::from))
            .collect();

        graph
            .nodes_of_kind(ResourceKind::Route)
            .iter()
            .filter(|r| {
                let table = r.property("route_table_id").and_then(|v| v.as_str());
                table.is_some_and(|t| tables.iter().any(|owned| owned == t))
                    && r.property("destination_cidr_block").and_then(|v| v.as_str())
                        == Some("0.0.0.0/0")
            })
            .filter_map(|r| {
                r.property("gateway_id")
                    .or_else(|| r.property("nat_gateway_id"))?
                    .as_str()
                    .map(String::from)
            })
            .collect()
    }

    #[test]
    fn public_only_scenario() {
        let graph = synthesize(&params()).unwrap();

        assert_eq!(graph.nodes_of_kind(ResourceKind::Vpc).len(), 1);
        assert_eq!(graph.nodes_of_kind(ResourceKind::InternetGateway).len(), 1);
        assert_eq!(graph.nodes_of_kind(ResourceKind::RouteTable).len(), 1);
        assert_eq!(graph.nodes_of_kind(ResourceKind::Subnet).len(), 3);
        assert_eq!(
            graph.nodes_of_kind(ResourceKind::RouteTableAssociation).len(),
            3,
        );
        assert_eq!(graph.nodes_of_kind(ResourceKind::ElasticIp).len(), 0);
        assert_eq!(graph.nodes_of_kind(ResourceKind::NatGateway).len(), 0);
    }

    #[test]
    fn every_public_subnet_routes_to_the_internet_gateway() {
        let graph = synthesize(&params()).unwrap();

        for i in 0..3 {
            let targets = default_route_target(&graph, &format!("web-public-subnet-{i}"));
            assert_eq!(targets, vec!["web-igw".to_string()], "subnet {i}");
        }
    }

    #[test]
    fn nat_gateways_match_private_subnets_one_to_one() {
        let mut params = params();
        params.private_subnet_cidrs = vec!["10.0.3.0/24".to_string(), "10.0.4.0/24".to_string()];

        let graph = synthesize(&params).unwrap();
        let gateways = graph.nodes_of_kind(ResourceKind::NatGateway);

        assert_eq!(gateways.len(), params.private_subnet_cidrs.len());

        for (i, gateway) in gateways.iter().enumerate() {
            // Bound to the same-index public subnet, never another zone's
            assert_eq!(
                gateway.property("subnet_id").and_then(|v| v.as_str()),
                Some(format!("web-public-subnet-{i}").as_str()),
            );

            let eip_deps = gateway
                .depends_on
                .iter()
                .filter(|d| d.id().contains("nat-eip"))
                .count();
            assert_eq!(eip_deps, 1);
        }
    }

    #[test]
    fn every_private_subnet_has_exactly_one_nat_route() {
        let mut params = params();
        params.private_subnet_cidrs = vec!["10.0.3.0/24".to_string(), "10.0.4.0/24".to_string()];

        let graph = synthesize(&params).unwrap();

        for i in 0..2 {
            let targets = default_route_target(&graph, &format!("web-private-subnet-{i}"));
            assert_eq!(targets, vec![format!("web-nat-{i}")], "subnet {i}");
        }
    }

    #[test]
    fn shared_route_table_scenario() {
        let mut params = params();
        params.private_subnet_cidrs = vec!["10.0.3.0/24".to_string(), "10.0.4.0/24".to_string()];
        params.route_table_scope = RouteTableScope::Shared;

        let graph = synthesize(&params).unwrap();

        assert_eq!(graph.nodes_of_kind(ResourceKind::ElasticIp).len(), 2);
        assert_eq!(graph.nodes_of_kind(ResourceKind::NatGateway).len(), 2);

        let private_tables: Vec<_> = graph
            .nodes_of_kind(ResourceKind::RouteTable)
            .into_iter()
            .filter(|t| t.stable_id.contains("private"))
            .collect();
        assert_eq!(private_tables.len(), 1);

        let private_associations = graph
            .nodes_of_kind(ResourceKind::RouteTableAssociation)
            .into_iter()
            .filter(|a| a.stable_id.contains("private"))
            .count();
        assert_eq!(private_associations, 2);

        // The unpaired third public subnet carries no NAT gateway
        assert!(graph
            .nodes_of_kind(ResourceKind::NatGateway)
            .iter()
            .all(|n| {
                n.property("subnet_id").and_then(|v| v.as_str())
                    != Some("web-public-subnet-2")
            }));

        // Both subnets reach egress through the table's single default route
        for i in 0..2 {
            let targets = default_route_target(&graph, &format!("web-private-subnet-{i}"));
            assert_eq!(targets.len(), 1, "subnet {i}");
        }
    }

    #[test]
    fn shared_nat_scope_emits_one_gateway() {
        let mut params = params();
        params.private_subnet_cidrs = vec!["10.0.3.0/24".to_string(), "10.0.4.0/24".to_string()];
        params.nat_scope = NatScope::Shared;

        let graph = synthesize(&params).unwrap();

        assert_eq!(graph.nodes_of_kind(ResourceKind::ElasticIp).len(), 1);
        assert_eq!(graph.nodes_of_kind(ResourceKind::NatGateway).len(), 1);

        for i in 0..2 {
            let targets = default_route_target(&graph, &format!("web-private-subnet-{i}"));
            assert_eq!(targets, vec!["web-nat".to_string()], "subnet {i}");
        }
    }

    #[test]
    fn identical_inputs_produce_identical_graphs() {
        let mut params = params();
        params.private_subnet_cidrs = vec!["10.0.3.0/24".to_string()];

        assert_eq!(synthesize(&params).unwrap(), synthesize(&params).unwrap());
    }

    #[test]
    fn more_private_than_public_is_a_configuration_error() {
        let mut params = params();
        params.public_subnet_cidrs.truncate(1);
        params.private_subnet_cidrs =
            vec!["10.0.3.0/24".to_string(), "10.0.4.0/24".to_string()];

        assert!(matches!(
            synthesize(&params),
            Err(Error::Configuration(_)),
        ));
    }

    #[test]
    fn too_few_availability_zones_is_a_configuration_error() {
        let mut params = params();
        params.availability_zones.truncate(2);

        let err = synthesize(&params).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("availability zones"));
    }

    #[test]
    fn malformed_subnet_cidr_names_the_index() {
        let mut params = params();
        params.public_subnet_cidrs[1] = "10.0.1.0".to_string();

        let err = synthesize(&params).unwrap_err();
        assert!(err.to_string().contains("public_subnet_cidrs[1]"));
    }

    #[test]
    fn budget_defaults_to_500() {
        let graph = synthesize(&params()).unwrap();
        let budget = graph.get("web-budget").unwrap();

        assert_eq!(budget.kind, ResourceKind::Budget);
        assert_eq!(
            budget.property("limit_amount").and_then(|v| v.as_str()),
            Some("500.00"),
        );
        assert_eq!(budget.parent, None);
        assert!(budget.depends_on.is_empty());
    }
}
