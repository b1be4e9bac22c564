//! Error types for the engine.

use thiserror::Error;

use crate::graph::WorkerId;

/// Failure raised by a vertex-program callback.
///
/// These are deterministic program bugs; the coordinator never retries them.
#[derive(Error, Debug)]
pub enum ProgramError {
    /// A callback addressed a vertex slot that does not exist.
    #[error("vertex {vertex} is out of range for {len} slots")]
    VertexOutOfRange {
        /// Offending local id.
        vertex: usize,
        /// Number of valid slots.
        len: usize,
    },

    /// A callback observed a value it cannot handle.
    #[error("invalid value at vertex {vertex}: {reason}")]
    InvalidValue {
        /// Local id of the vertex.
        vertex: usize,
        /// Human-readable description.
        reason: String,
    },

    /// A callback panicked on a scheduler thread.
    #[error("vertex callback panicked on thread {thread}: {message}")]
    Panicked {
        /// Scheduler thread index.
        thread: usize,
        /// Panic payload, if it was a string.
        message: String,
    },

    /// Several threads failed in the same dispatch.
    #[error("{} vertex callbacks failed; first: {}", .0.len(), .0[0])]
    Many(Vec<ProgramError>),

    /// Program-defined failure.
    #[error("{0}")]
    Custom(String),
}

/// Engine error types.
#[derive(Error, Debug)]
pub enum Error {
    /// A vertex program violated its contract; the run is aborted.
    #[error("program logic error on worker {worker} in epoch {epoch}: {source}")]
    ProgramLogic {
        /// Worker whose callback failed.
        worker: WorkerId,
        /// Epoch in which it failed.
        epoch: u64,
        /// Underlying failure.
        #[source]
        source: ProgramError,
    },

    /// A buffered message could not be delivered.
    #[error("message delivery error on worker {worker}: {reason}")]
    MessageDelivery {
        /// Receiving worker.
        worker: WorkerId,
        /// Description of the failure.
        reason: String,
    },

    /// Thread or buffer allocation failed.
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// A fragment was built from inconsistent input.
    #[error("invalid fragment: {0}")]
    InvalidFragment(String),

    /// The coordinator was driven out of order.
    #[error("invalid state transition from {from} to {to}")]
    InvalidState {
        /// State the coordinator was in.
        from: &'static str,
        /// State that was requested.
        to: &'static str,
    },

    /// The run did not reach global quiescence in time.
    #[error("computation did not converge within {0} epochs")]
    EpochLimitExceeded(u64),

    /// The run was cancelled between barriers.
    #[error("computation aborted before epoch {epoch}")]
    Aborted {
        /// Epoch that would have run next.
        epoch: u64,
    },

    /// An edge list could not be parsed.
    #[error("edge list line {line}: {reason}")]
    EdgeList {
        /// One-based line number.
        line: usize,
        /// Description of the problem.
        reason: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn many_reports_count_and_first() {
        let err = ProgramError::Many(vec![
            ProgramError::Custom("first".into()),
            ProgramError::Custom("second".into()),
        ]);
        assert_eq!(err.to_string(), "2 vertex callbacks failed; first: first");
    }

    #[test]
    fn program_logic_carries_source() {
        let err = Error::ProgramLogic {
            worker: 1,
            epoch: 3,
            source: ProgramError::VertexOutOfRange { vertex: 9, len: 4 },
        };
        let msg = err.to_string();
        assert!(msg.contains("worker 1"));
        assert!(msg.contains("epoch 3"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
