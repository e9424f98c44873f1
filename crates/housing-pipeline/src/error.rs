//! Error types for the housing pipeline.
//!
//! Every stage returns [`Result<T>`]; the driver never recovers from a stage
//! error, it marks the run as failed and hands the error back to the caller.
//!
//! Errors are serializable so that the CLI's `--json` mode can emit them
//! alongside the run summary.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for pipeline stages and the driver.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The dataset source could not be reached (missing file, HTTP failure).
    #[error("Dataset source '{source_id}' is unavailable: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    /// The table does not have the shape a stage needs.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The input table has no rows.
    #[error("Input table '{0}' has no rows")]
    EmptyInput(String),

    /// The target column is absent from a table.
    #[error("Target column '{column}' not found in '{path}'")]
    MissingTargetColumn { column: String, path: String },

    /// Not enough rows to split, fit or score.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// The persisted model is missing or unreadable.
    #[error("Failed to load model from '{path}': {reason}")]
    ModelLoad { path: String, reason: String },

    /// Test features differ from the features the model was fit on.
    #[error("Feature columns do not match the model (missing: {missing:?}, unexpected: {unexpected:?})")]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The tracking backend failed to open or close a run.
    #[error("Tracking error: {0}")]
    Tracking(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code, independent of the message text.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "SOURCE_UNAVAILABLE",
            Self::Schema(_) => "SCHEMA_ERROR",
            Self::EmptyInput(_) => "EMPTY_INPUT",
            Self::MissingTargetColumn { .. } => "MISSING_TARGET_COLUMN",
            Self::InsufficientData(_) => "INSUFFICIENT_DATA",
            Self::ModelLoad { .. } => "MODEL_LOAD_ERROR",
            Self::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Tracking(_) => "TRACKING_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Strip any context wrappers and return the underlying error.
    pub fn root(&self) -> &PipelineError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Errors are serialized as `{ "code": ..., "message": ... }`.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Io(e).with_context(context))
    }
}
