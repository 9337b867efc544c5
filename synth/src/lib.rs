mod cidr;
pub mod compute;
mod engine;
mod error;
mod graph;
mod node;
pub mod topology;

pub use compute::{ComputeMode, ComputeParams};
pub use engine::{Engine, Outcome};
pub use error::{Error, Result};
pub use graph::Graph;
pub use node::{stable_id, NodeRef, ResourceKind, ResourceNode, Tags};
pub use topology::{NatScope, RouteTableScope, TopologyParams};
