//! Error types for the document analysis service

use thiserror::Error;

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Error, Debug)]
pub enum AnalysisError {

    // =============================
    // Analysis Pipeline Errors
    // =============================

    #[error("Invalid upload: {0}")]
    ValidationFailure(String),

    #[error("Could not read document: {0}")]
    EncodingFailure(String),

    #[error("API key is missing. Please check your environment configuration.")]
    MissingCredential,

    #[error("Model request failed: {0}")]
    TransportFailure(String),

    #[error("No data returned from analysis.")]
    EmptyResponse,

    #[error("Model response does not match the extraction schema: {0}")]
    SchemaViolation(String),

    // =============================
    // Flow Controller Rejections
    // =============================

    #[error("No document was provided")]
    NoDocument,

    #[error("An analysis is already in progress")]
    AnalysisInFlight,

    // =============================
    // Ambient Errors
    // =============================

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Profile store error: {0}")]
    Profile(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AnalysisError {
    /// Stable machine-readable code, stored on the session next to the message.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::ValidationFailure(_) => "ValidationFailure",
            AnalysisError::EncodingFailure(_) => "EncodingFailure",
            AnalysisError::MissingCredential => "MissingCredential",
            AnalysisError::TransportFailure(_) => "TransportFailure",
            AnalysisError::EmptyResponse => "EmptyResponse",
            AnalysisError::SchemaViolation(_) => "SchemaViolation",
            AnalysisError::NoDocument => "NoDocument",
            AnalysisError::AnalysisInFlight => "AnalysisInFlight",
            AnalysisError::Config(_) => "Config",
            AnalysisError::Profile(_) => "Profile",
            AnalysisError::SerializationError(_) => "SerializationError",
            AnalysisError::IoError(_) => "IoError",
        }
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(e: reqwest::Error) -> Self {
        AnalysisError::TransportFailure(e.to_string())
    }
}
