//! Storyreel Error Definitions
//!
//! Defines error types used throughout the project.

use thiserror::Error;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Request Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid word timeline: {0}")]
    InvalidTimeline(String),

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Media probe failed: {0}")]
    Probe(String),

    // =========================================================================
    // Render Errors
    // =========================================================================
    #[error("Audio padding failed: {0}")]
    Padding(String),

    #[error("Composition failed: {0}")]
    Composition(String),

    #[error("Render cancelled")]
    Cancelled,

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// Only ever logged; cleanup never fails a job.
    #[error("Cleanup failed: {0}")]
    Cleanup(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Name of the pipeline stage this error belongs to
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::NotFound(_) => "validation",
            Self::Synthesis(_) => "speech",
            Self::InvalidTimeline(_) => "timeline",
            Self::Padding(_) => "duration",
            Self::Probe(_) => "probe",
            Self::Composition(_) | Self::Cancelled => "composition",
            Self::Cleanup(_) => "cleanup",
            Self::Io(_) | Self::Json(_) => "io",
        }
    }

    /// Whether the caller, rather than the system, is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::InvalidTimeline(_)
        )
    }
}
