use crate::cidr;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::node::{stable_id, NodeRef, ResourceKind, ResourceNode, Tags};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const DEFAULT_INSTANCE_TYPE: &str = "t3.medium";

/// Script baked into the launch template so that fresh instances come up
/// serving traffic before the target group starts health checking them
const WEB_SERVER_USER_DATA: &str = "#!/bin/bash
dnf install -y httpd
systemctl enable httpd
systemctl start httpd
";

/// How the compute tier is shaped
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComputeMode {
    /// A fixed list of directly declared instances (the default)
    #[default]
    Fixed,

    /// A launch template driving an autoscaling group behind an application
    /// load balancer
    Autoscaled,
}

/// Inputs for one compute-tier synthesis run
///
/// The VPC id and subnet ids are identifiers extracted from a previously
/// synthesized network graph; they enter this graph as external references
/// so the compute tier's lifecycle is parented under the network's.
#[derive(Clone, Debug)]
pub struct ComputeParams {
    /// Namespace prefix for every stable id in the graph
    pub name: String,

    pub vpc_id: String,
    pub vpc_cidr_block: String,
    pub subnet_ids: Vec<String>,

    /// Fixed mode: number of instances. Autoscaled mode: desired and maximum
    /// group size (minimum is always 1).
    pub instance_count: u32,

    pub image_id: String,

    /// "t3.medium" when unset
    pub instance_type: Option<String>,

    pub tags: Tags,
    pub mode: ComputeMode,
}

/// Derive the compute resource graph from the parameters
///
/// Both modes share one security group and one SSH key pair. Administrative
/// and application traffic (TCP/22, TCP/80) is only admitted from the VPC's
/// own address space, never from 0.0.0.0/0.
pub fn synthesize(params: &ComputeParams) -> Result<Graph> {
    validate(params)?;

    let name = &params.name;
    let tags = &params.tags;
    let mut graph = Graph::new();

    let sg_id = stable_id(name, "sg", None);

    graph.push(
        ResourceNode::new(
            ResourceKind::SecurityGroup,
            sg_id.clone(),
            json!({
                "vpc_id": params.vpc_id,
                "ingress": [
                    {
                        "protocol": "tcp",
                        "from_port": 22,
                        "to_port": 22,
                        "cidr_blocks": [params.vpc_cidr_block],
                    },
                    {
                        "protocol": "tcp",
                        "from_port": 80,
                        "to_port": 80,
                        "cidr_blocks": [params.vpc_cidr_block],
                    },
                ],
                "egress": [
                    {
                        "protocol": "-1",
                        "from_port": 0,
                        "to_port": 0,
                        "cidr_blocks": ["0.0.0.0/0"],
                    },
                ],
            }),
        )
        .tags(tags)
        .parent(NodeRef::External(params.vpc_id.clone())),
    )?;

    // The registered key pair is owned by the generated key material, so
    // destroying the pair can never outlive the key it was registered from
    let key_id = stable_id(name, "ssh-key", None);
    let keypair_id = stable_id(name, "keypair", None);

    graph.push(
        ResourceNode::new(
            ResourceKind::PrivateKey,
            key_id.clone(),
            json!({"algorithm": "RSA"}),
        )
        .tags(tags),
    )?;

    graph.push(
        ResourceNode::new(
            ResourceKind::KeyPair,
            keypair_id.clone(),
            json!({"public_key_from": key_id}),
        )
        .tags(tags)
        .parent(NodeRef::Internal(key_id)),
    )?;

    let instance_type = params
        .instance_type
        .clone()
        .unwrap_or_else(|| DEFAULT_INSTANCE_TYPE.to_string());

    match params.mode {
        ComputeMode::Fixed => {
            // Every instance lands in the first subnet. A known limitation
            // kept for compatibility, see README.
            let subnet_id = &params.subnet_ids[0];

            for i in 0..params.instance_count {
                graph.push(
                    ResourceNode::new(
                        ResourceKind::Instance,
                        stable_id(name, "server", Some(i as usize)),
                        json!({
                            "image_id": params.image_id,
                            "instance_type": instance_type,
                            "subnet_id": subnet_id,
                            "associate_public_ip_address": true,
                            "key_name": keypair_id,
                            "security_group_ids": [sg_id],
                        }),
                    )
                    .tags(tags)
                    .parent(NodeRef::External(subnet_id.clone()))
                    .depends_on(NodeRef::Internal(sg_id.clone()))
                    .depends_on(NodeRef::Internal(keypair_id.clone())),
                )?;
            }
        }

        ComputeMode::Autoscaled => {
            emit_autoscaled_tier(&mut graph, params, &instance_type, &sg_id, &keypair_id)?;
        }
    }

    graph.validate()?;
    Ok(graph)
}

/// Launch template, autoscaling group, and the load balancing chain
fn emit_autoscaled_tier(
    graph: &mut Graph,
    params: &ComputeParams,
    instance_type: &str,
    sg_id: &str,
    keypair_id: &str,
) -> Result<()> {
    let name = &params.name;
    let tags = &params.tags;

    let template_id = stable_id(name, "launch-template", None);

    graph.push(
        ResourceNode::new(
            ResourceKind::LaunchTemplate,
            template_id.clone(),
            json!({
                "image_id": params.image_id,
                "instance_type": instance_type,
                "key_name": keypair_id,
                "security_group_ids": [sg_id],
                "user_data": WEB_SERVER_USER_DATA,
            }),
        )
        .tags(tags)
        .depends_on(NodeRef::Internal(sg_id.to_string()))
        .depends_on(NodeRef::Internal(keypair_id.to_string())),
    )?;

    let asg_id = stable_id(name, "asg", None);

    graph.push(
        ResourceNode::new(
            ResourceKind::AutoscalingGroup,
            asg_id.clone(),
            json!({
                "launch_template_id": template_id,
                "desired_capacity": params.instance_count,
                "max_size": params.instance_count,
                "min_size": 1,
                "subnet_ids": params.subnet_ids,
            }),
        )
        .tags(tags)
        .parent(NodeRef::External(params.vpc_id.clone()))
        .depends_on(NodeRef::Internal(template_id)),
    )?;

    let lb_id = stable_id(name, "lb", None);

    graph.push(
        ResourceNode::new(
            ResourceKind::LoadBalancer,
            lb_id.clone(),
            json!({
                "internal": false,
                "load_balancer_type": "application",
                "subnet_ids": params.subnet_ids,
                "security_group_ids": [sg_id],
            }),
        )
        .tags(tags)
        .parent(NodeRef::External(params.vpc_id.clone()))
        .depends_on(NodeRef::Internal(sg_id.to_string())),
    )?;

    let tg_id = stable_id(name, "tg", None);

    graph.push(
        ResourceNode::new(
            ResourceKind::TargetGroup,
            tg_id.clone(),
            json!({
                "vpc_id": params.vpc_id,
                "port": 80,
                "protocol": "HTTP",
                "target_type": "instance",
            }),
        )
        .tags(tags)
        .parent(NodeRef::External(params.vpc_id.clone())),
    )?;

    graph.push(
        ResourceNode::new(
            ResourceKind::Listener,
            stable_id(name, "listener", None),
            json!({
                "load_balancer_id": lb_id,
                "port": 80,
                "protocol": "HTTP",
                "default_action": {"type": "forward", "target_group_id": tg_id},
            }),
        )
        .parent(NodeRef::Internal(lb_id))
        .depends_on(NodeRef::Internal(tg_id.clone())),
    )?;

    // Scale events flow through this binding without re-synthesis: the
    // engine and the cloud control plane keep membership current
    graph.push(
        ResourceNode::new(
            ResourceKind::Attachment,
            stable_id(name, "asg-attachment", None),
            json!({
                "autoscaling_group_id": asg_id,
                "target_group_id": tg_id,
            }),
        )
        .depends_on(NodeRef::Internal(asg_id))
        .depends_on(NodeRef::Internal(tg_id)),
    )?;

    Ok(())
}

/// Reject malformed or inconsistent parameters before any node is emitted
fn validate(params: &ComputeParams) -> Result<()> {
    if params.name.trim().is_empty() {
        return Err(Error::Configuration("name must not be empty".to_string()));
    }

    if params.vpc_id.trim().is_empty() {
        return Err(Error::Configuration(
            "vpc_id is required to scope the security group".to_string(),
        ));
    }

    if params.vpc_cidr_block.trim().is_empty() {
        return Err(Error::Configuration(
            "vpc_cidr_block is required to restrict ingress".to_string(),
        ));
    }

    cidr::check(&params.vpc_cidr_block, "vpc_cidr_block")?;

    if params.subnet_ids.is_empty() {
        return Err(Error::Configuration(
            "at least one subnet id is required".to_string(),
        ));
    }

    if params.instance_count < 1 {
        return Err(Error::Configuration(format!(
            "instance_count must be positive, got {}",
            params.instance_count,
        )));
    }

    if params.image_id.trim().is_empty() {
        return Err(Error::Configuration("image_id must not be empty".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params() -> ComputeParams {
        ComputeParams {
            name: "web".to_string(),
            vpc_id: "web-vpc".to_string(),
            vpc_cidr_block: "10.0.0.0/20".to_string(),
            subnet_ids: vec!["s1".to_string(), "s2".to_string()],
            instance_count: 3,
            image_id: "ami-0f3e6b1c7d2a9e8b4".to_string(),
            instance_type: None,
            tags: Tags::new(),
            mode: ComputeMode::Fixed,
        }
    }

    #[test]
    fn fixed_mode_pins_every_instance_to_the_first_subnet() {
        let graph = synthesize(&params()).unwrap();
        let instances = graph.nodes_of_kind(ResourceKind::Instance);

        assert_eq!(instances.len(), 3);

        for instance in &instances {
            assert_eq!(
                instance.property("subnet_id").and_then(|v| v.as_str()),
                Some("s1"),
            );
        }

        assert_eq!(graph.nodes_of_kind(ResourceKind::SecurityGroup).len(), 1);
        assert_eq!(graph.nodes_of_kind(ResourceKind::KeyPair).len(), 1);
        assert_eq!(graph.nodes_of_kind(ResourceKind::PrivateKey).len(), 1);
    }

    #[test]
    fn autoscaled_mode_emits_the_load_balancing_chain() {
        let mut params = params();
        params.mode = ComputeMode::Autoscaled;
        params.instance_count = 4;

        let graph = synthesize(&params).unwrap();

        assert_eq!(graph.nodes_of_kind(ResourceKind::Instance).len(), 0);
        assert_eq!(graph.nodes_of_kind(ResourceKind::LaunchTemplate).len(), 1);
        assert_eq!(graph.nodes_of_kind(ResourceKind::LoadBalancer).len(), 1);
        assert_eq!(graph.nodes_of_kind(ResourceKind::TargetGroup).len(), 1);
        assert_eq!(graph.nodes_of_kind(ResourceKind::Listener).len(), 1);
        assert_eq!(graph.nodes_of_kind(ResourceKind::Attachment).len(), 1);

        let groups = graph.nodes_of_kind(ResourceKind::AutoscalingGroup);
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].property("desired_capacity").and_then(|v| v.as_u64()),
            Some(4),
        );
        assert_eq!(groups[0].property("max_size").and_then(|v| v.as_u64()), Some(4));
        assert_eq!(groups[0].property("min_size").and_then(|v| v.as_u64()), Some(1));

        // Unlike fixed mode, the group spreads across every subnet
        assert_eq!(
            groups[0]
                .property("subnet_ids")
                .and_then(|v| v.as_array())
                .map(Vec::len),
            Some(2),
        );
    }

    #[test]
    fn ingress_never_opens_to_the_world() {
        let graph = synthesize(&params()).unwrap();
        let groups = graph.nodes_of_kind(ResourceKind::SecurityGroup);

        let ingress = groups[0]
            .property("ingress")
            .and_then(|v| v.as_array())
            .unwrap();

        assert_eq!(ingress.len(), 2);

        for rule in ingress {
            assert_eq!(
                rule["cidr_blocks"],
                serde_json::json!(["10.0.0.0/20"]),
            );
        }
    }

    #[test]
    fn key_pair_is_owned_by_its_key_material() {
        let graph = synthesize(&params()).unwrap();
        let keypair = graph.get("web-keypair").unwrap();

        assert_eq!(
            keypair.parent,
            Some(NodeRef::Internal("web-ssh-key".to_string())),
        );
    }

    #[test]
    fn zero_instances_is_a_configuration_error() {
        let mut params = params();
        params.instance_count = 0;

        assert!(matches!(
            synthesize(&params),
            Err(Error::Configuration(_)),
        ));
    }

    #[test]
    fn empty_subnet_list_is_a_configuration_error() {
        let mut params = params();
        params.subnet_ids.clear();

        assert!(matches!(
            synthesize(&params),
            Err(Error::Configuration(_)),
        ));
    }

    #[test]
    fn missing_vpc_cidr_is_a_configuration_error() {
        let mut params = params();
        params.vpc_cidr_block = String::new();

        assert!(matches!(
            synthesize(&params),
            Err(Error::Configuration(_)),
        ));
    }
}
