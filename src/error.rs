use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON input: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Failed to write statistics: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown algorithm or strategy name: '{0}'")]
    UnknownAlgorithm(String),

    #[error("Unknown vertex label: '{0}'")]
    UnknownVertex(String),

    #[error("Malformed input in line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },

    #[error("No feasible hypervisor cover, {} switch(es) stay uncovered: {uncovered:?}", .uncovered.len())]
    NoFeasibleCover { uncovered: Vec<String> },

    #[error("No feasible hypervisor assignment: {0}")]
    NoFeasibleAssignment(String),

    #[error("External solver failed: {0}")]
    ExternalSolver(String),
}

pub type Result<T> = std::result::Result<T, Error>;
