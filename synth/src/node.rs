use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Mapping of tag keys to values attached to every emitted node
pub type Tags = BTreeMap<String, String>;

/// The kinds of cloud objects a synthesizer can emit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Vpc,
    InternetGateway,
    Subnet,
    RouteTable,
    Route,
    RouteTableAssociation,
    ElasticIp,
    NatGateway,
    SecurityGroup,
    PrivateKey,
    KeyPair,
    Instance,
    LaunchTemplate,
    AutoscalingGroup,
    LoadBalancer,
    TargetGroup,
    Listener,
    Attachment,
    Budget,
}

/// Reference to another node
///
/// Internal references point at a node in the same graph by stable id.
/// External references carry an identifier owned by another graph, e.g. the
/// VPC id the compute tier is parented under.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeRef {
    Internal(String),
    External(String),
}

impl NodeRef {
    pub fn id(&self) -> &str {
        match self {
            NodeRef::Internal(id) | NodeRef::External(id) => id,
        }
    }
}

/// A typed cloud object within a synthesized graph
///
/// `parent` is an ownership relation used for lifecycle ordering, while
/// `depends_on` lists nodes that must be created before (and destroyed after)
/// this one. The two are kept as distinct edge kinds on purpose.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub kind: ResourceKind,
    pub stable_id: String,
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub tags: Tags,
    pub parent: Option<NodeRef>,
    pub depends_on: BTreeSet<NodeRef>,
}

impl ResourceNode {
    pub fn new(kind: ResourceKind, stable_id: String, properties: serde_json::Value) -> Self {
        ResourceNode {
            kind,
            stable_id,
            properties: properties.as_object().cloned().unwrap_or_default(),
            tags: Tags::new(),
            parent: None,
            depends_on: BTreeSet::new(),
        }
    }

    /// Merge caller tags over the system defaults
    pub fn tags(mut self, caller: &Tags) -> Self {
        self.tags
            .insert("Name".to_string(), self.stable_id.clone());
        self.tags
            .insert("ManagedBy".to_string(), "landzone".to_string());
        self.tags.extend(caller.clone());
        self
    }

    pub fn parent(mut self, parent: NodeRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn depends_on(mut self, dep: NodeRef) -> Self {
        self.depends_on.insert(dep);
        self
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }
}

/// Deterministic node name derived from a namespace, a role, and an index
///
/// Identical inputs always produce identical ids, which is what lets a
/// reconciliation engine diff repeated synthesis runs down to a no-op.
pub fn stable_id(namespace: &str, role: &str, index: Option<usize>) -> String {
    match index {
        Some(i) => format!("{namespace}-{role}-{i}"),
        None => format!("{namespace}-{role}"),
    }
}
