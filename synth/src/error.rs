use thiserror::Error;

/// Failure taxonomy for synthesis and graph execution
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or internally inconsistent input
    ///
    /// Always raised before any node is emitted, so a failed synthesis never
    /// leaves a partial graph behind.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal consistency check that should be unreachable with a correct
    /// synthesizer, e.g. two nodes sharing a stable id within one graph
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Raised only by a reconciliation engine while applying or destroying a
    /// graph, never by synthesis itself
    #[error("external execution error: {0}")]
    ExternalExecution(String),
}

pub type Result<T> = std::result::Result<T, Error>;
