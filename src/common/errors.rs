//! Error types for the application

use thiserror::Error;

/// Result type alias using our PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for ingestion, storage and calculation operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Network or WebDriver transport failure while reaching the source
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Dynamic content did not materialize within the bounded wait
    #[error("source render timed out after {0} seconds")]
    SourceRenderTimeout(u64),

    /// The source actively refused the request (rate limiting, bot detection)
    #[error("source blocked the request: {0}")]
    SourceBlocked(String),

    /// Expected columns/headers missing or unrecognizable in the payload
    #[error("schema drift detected: {0}")]
    SchemaDrift(String),

    /// A cell could not be coerced to its expected type
    #[error("value parse error in column '{column}': {message}")]
    ValueParse { column: String, message: String },

    /// Storage connection/transport failure
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Invariant breach at the storage layer (malformed key, bad value)
    #[error("storage constraint violation: {0}")]
    ConstraintViolation(String),

    /// Calculation inputs rejected before any arithmetic
    #[error("invalid calculation input: {0}")]
    InvalidCalculationInput(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A second ingestion trigger arrived while a run was in flight
    #[error("an ingestion run is already in flight")]
    RunInFlight,

    /// The run exceeded its total wall-clock budget
    #[error("ingestion run exceeded its wall-clock budget of {0} seconds")]
    RunBudgetExceeded(u64),
}

impl PipelineError {
    /// Whether the ingestion retry policy may re-attempt after this error.
    ///
    /// `SourceBlocked` is deliberately non-transient: it signals a policy
    /// issue with the source, not transient trouble.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::SourceUnavailable(_) | PipelineError::SourceRenderTimeout(_)
        )
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                // Unique/check/not-null violations map to the SQLSTATE 23xxx
                // class on postgres and extended result codes on sqlite.
                let code = db.code().map(|c| c.to_string()).unwrap_or_default();
                let constraint = code.starts_with("23")
                    || code == "275"
                    || code == "1555"
                    || code == "787"
                    || db.message().contains("constraint");
                if constraint {
                    PipelineError::ConstraintViolation(db.message().to_string())
                } else {
                    PipelineError::StorageUnavailable(db.message().to_string())
                }
            }
            sqlx::Error::RowNotFound => {
                PipelineError::ConstraintViolation("expected row missing".to_string())
            }
            _ => PipelineError::StorageUnavailable(err.to_string()),
        }
    }
}

impl From<fantoccini::error::NewSessionError> for PipelineError {
    fn from(err: fantoccini::error::NewSessionError) -> Self {
        PipelineError::SourceUnavailable(format!("webdriver session: {err}"))
    }
}

impl From<fantoccini::error::CmdError> for PipelineError {
    fn from(err: fantoccini::error::CmdError) -> Self {
        PipelineError::SourceUnavailable(format!("webdriver command: {err}"))
    }
}
