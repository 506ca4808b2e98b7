use thiserror::Error;

/// Reasons an uploaded document is refused before any external call is made
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("Only PDF files are accepted (got content type {0:?})")]
    WrongContentType(Option<String>),

    #[error("Uploaded file is empty")]
    Empty,

    #[error("File exceeds maximum size of {max_mib} MB ({size} bytes)")]
    TooLarge { size: usize, max_mib: usize },

    #[error("File does not appear to be a valid PDF")]
    BadSignature,
}

#[derive(Error, Debug)]
pub enum CarmsError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Program not found: id {0}")]
    ProgramNotFound(i64),

    #[error("Report '{0}' not found")]
    ReportNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to read catalog export: {0}")]
    CatalogRead(String),

    #[error("Upload rejected: {0}")]
    UploadRejected(#[from] UploadRejection),

    #[error("Profile extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Feature not available: {0}")]
    FeatureDisabled(String),

    #[error("{0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, CarmsError>;
