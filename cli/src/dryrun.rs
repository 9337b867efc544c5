use async_trait::async_trait;
use landzone_synth::{Engine, Error, Graph, NodeRef, Outcome, ResourceNode, Result};
use std::collections::BTreeSet;

/// Engine stand-in that resolves execution order but touches nothing
///
/// Parents and dependencies go first on apply and last on destroy, the same
/// order a real reconciliation engine would schedule. Every node is reported
/// as it would be executed, so `apply` doubles as a plan preview.
pub struct DryRun;

/// Topological order over the internal parent/dependency edges
///
/// External references are owned by another graph and impose no ordering
/// here. A cycle can only come from a broken synthesizer.
fn creation_order(graph: &Graph) -> Result<Vec<&ResourceNode>> {
    let mut remaining: Vec<&ResourceNode> = graph.nodes().iter().collect();
    let mut ordered: Vec<&ResourceNode> = Vec::new();
    let mut emitted: BTreeSet<String> = BTreeSet::new();

    while !remaining.is_empty() {
        let before = remaining.len();

        remaining.retain(|node| {
            let ready = node
                .parent
                .iter()
                .chain(node.depends_on.iter())
                .all(|reference| match reference {
                    NodeRef::Internal(id) => emitted.contains(id),
                    NodeRef::External(_) => true,
                });

            if ready {
                emitted.insert(node.stable_id.clone());
                ordered.push(*node);
            }

            !ready
        });

        if remaining.len() == before {
            return Err(Error::InvariantViolation(format!(
                "dependency cycle involving {}",
                remaining[0].stable_id,
            )));
        }
    }

    Ok(ordered)
}

#[async_trait]
impl Engine for DryRun {
    async fn apply(&self, graph: &Graph) -> Result<Vec<(String, Outcome)>> {
        Ok(creation_order(graph)?
            .into_iter()
            .map(|node| {
                log::debug!("would create {:?} {}", node.kind, node.stable_id);
                (node.stable_id.clone(), Outcome::Created)
            })
            .collect())
    }

    async fn destroy(&self, graph: &Graph) -> Result<Vec<(String, Outcome)>> {
        Ok(creation_order(graph)?
            .into_iter()
            .rev()
            .map(|node| {
                log::debug!("would delete {:?} {}", node.kind, node.stable_id);
                (node.stable_id.clone(), Outcome::Deleted)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use landzone_synth::{topology, NatScope, RouteTableScope, Tags, TopologyParams};

    fn network() -> Graph {
        topology::synthesize(&TopologyParams {
            name: "web".to_string(),
            cidr_block: "10.0.0.0/20".to_string(),
            public_subnet_cidrs: vec!["10.0.0.0/24".to_string(), "10.0.1.0/24".to_string()],
            private_subnet_cidrs: vec!["10.0.3.0/24".to_string()],
            availability_zones: vec!["use1-az1".to_string(), "use1-az2".to_string()],
            tags: Tags::new(),
            monthly_budget: None,
            route_table_scope: RouteTableScope::default(),
            nat_scope: NatScope::default(),
        })
        .unwrap()
    }

    fn position(order: &[(String, Outcome)], id: &str) -> usize {
        order
            .iter()
            .position(|(node, _)| node == id)
            .unwrap_or_else(|| panic!("{id} missing from the plan"))
    }

    #[tokio::test]
    async fn apply_respects_the_partial_order() {
        let graph = network();
        let plan = DryRun.apply(&graph).await.unwrap();

        assert_eq!(plan.len(), graph.len());

        // Address allocation before the gateway that consumes it, tables
        // before their routes, the VPC before everything it owns
        assert!(position(&plan, "web-nat-eip-0") < position(&plan, "web-nat-0"));
        assert!(position(&plan, "web-public-rt") < position(&plan, "web-public-route"));
        assert!(position(&plan, "web-private-rt-0") < position(&plan, "web-private-route-0"));
        assert!(position(&plan, "web-vpc") < position(&plan, "web-igw"));
        assert!(position(&plan, "web-public-subnet-0") < position(&plan, "web-nat-0"));
    }

    #[tokio::test]
    async fn destroy_is_the_reverse_of_apply() {
        let graph = network();
        let apply: Vec<String> = DryRun
            .apply(&graph)
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        let destroy: Vec<String> = DryRun
            .destroy(&graph)
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        assert_eq!(apply.iter().rev().cloned().collect::<Vec<_>>(), destroy);
    }
}
