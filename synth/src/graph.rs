use crate::error::{Error, Result};
use crate::node::{NodeRef, ResourceKind, ResourceNode};
use serde::{Deserialize, Serialize};

/// The ordered collection of nodes produced by one synthesis call
///
/// Structural equality is derived so that two graphs synthesized from
/// identical inputs compare equal, ids and edges included.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    nodes: Vec<ResourceNode>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    /// Add a node, rejecting duplicates
    ///
    /// Stable ids are unique within a graph. A collision means the
    /// synthesizer itself is broken, not the caller's input.
    pub fn push(&mut self, node: ResourceNode) -> Result<()> {
        if self.get(&node.stable_id).is_some() {
            return Err(Error::InvariantViolation(format!(
                "duplicate stable id within one graph: {}",
                node.stable_id,
            )));
        }

        self.nodes.push(node);
        Ok(())
    }

    pub fn get(&self, stable_id: &str) -> Option<&ResourceNode> {
        self.nodes.iter().find(|n| n.stable_id == stable_id)
    }

    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn nodes_of_kind(&self, kind: ResourceKind) -> Vec<&ResourceNode> {
        self.nodes.iter().filter(|n| n.kind == kind).collect()
    }

    pub fn ids_of_kind(&self, kind: ResourceKind) -> Vec<String> {
        self.nodes_of_kind(kind)
            .iter()
            .map(|n| n.stable_id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check that every internal parent/dependency reference resolves
    ///
    /// External references are imported identifiers owned by another graph
    /// and are not checked here.
    pub fn validate(&self) -> Result<()> {
        for node in &self.nodes {
            for reference in node.parent.iter().chain(node.depends_on.iter()) {
                if let NodeRef::Internal(id) = reference {
                    if self.get(id).is_none() {
                        return Err(Error::InvariantViolation(format!(
                            "node {} references {id} which is not in the graph",
                            node.stable_id,
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
