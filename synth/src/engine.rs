use crate::error::Result;
use crate::graph::Graph;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What happened to one node during apply or destroy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
    Deleted,
    Failed,
}

/// A declarative reconciliation engine the synthesized graphs are handed to
///
/// The engine owns everything the synthesizer does not: talking to the cloud
/// control plane, diffing against live state, retrying throttled calls, and
/// ordering destroys as the reverse of the parent/dependency partial order.
/// Re-applying an unchanged graph against converged remote state is a no-op.
#[async_trait]
pub trait Engine {
    async fn apply(&self, graph: &Graph) -> Result<Vec<(String, Outcome)>>;

    async fn destroy(&self, graph: &Graph) -> Result<Vec<(String, Outcome)>>;
}
