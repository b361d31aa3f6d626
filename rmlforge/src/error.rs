//! Error types for the mapping pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, RmlForgeError>;

/// Terminal and transport errors of the pipeline.
///
/// Only `InputMissing`, `ShaclViolation` and `Exhausted` escape the
/// orchestrator; everything else is absorbed by the retry controller via
/// prompt mutation.
#[derive(Debug, Error)]
pub enum RmlForgeError {
    /// A required input file does not exist. Fatal, no retry.
    #[error("required input file not found: {0}")]
    InputMissing(PathBuf),

    /// A phase spent its whole retry budget.
    #[error("{phase} failed after {attempts} attempts: {last_diagnostic}")]
    Exhausted {
        phase: String,
        attempts: u32,
        last_diagnostic: String,
    },

    /// The final conformance gate rejected the artifact. There is no
    /// refinement path for this; it is surfaced directly to the caller.
    #[error("SHACL validation failed:\n{0}")]
    ShaclViolation(String),

    /// Transport, timeout or API failure while talking to the generator.
    #[error("generator error: {0}")]
    Generation(String),

    /// The configured shape graph could not be read or compiled.
    #[error("shape graph error: {0}")]
    Shapes(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
