use athenaviz_core::BackendError;

/// Errors that can occur during Athena operations.
#[derive(Debug, thiserror::Error)]
pub enum AthenaError {
    /// An AWS SDK error (stringified).
    #[error("AWS SDK error: {0}")]
    AwsSdk(String),

    /// Failed to interpret Athena result data.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A caller-supplied regex does not compile.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("No query with that name found: {0}")]
    NamedQueryNotFound(String),

    /// Ad-hoc queries are refused unless the workgroup caps scanned bytes.
    #[error("Workgroup '{0}' has no scan data limit set")]
    NoScanLimit(String),

    /// The query execution failed on the Athena side.
    #[error("Query {query_id} failed: {reason}")]
    QueryFailed { query_id: String, reason: String },

    #[error("Query {query_id} did not finish after {attempts} checks")]
    QueryTimeout { query_id: String, attempts: u32 },

    #[error("Invalid parameter {name}='{value}': {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),
}

impl From<AthenaError> for BackendError {
    fn from(e: AthenaError) -> Self {
        match e {
            AthenaError::AwsSdk(msg) => BackendError::Aws(msg),
            AthenaError::InvalidParameter {
                name,
                value,
                reason,
            } => BackendError::InvalidParameter {
                name: name.to_string(),
                value,
                reason,
            },
            AthenaError::InvalidPattern { pattern, reason } => BackendError::InvalidParameter {
                name: "pattern".to_string(),
                value: pattern,
                reason,
            },
            AthenaError::MissingParameter(name) => BackendError::MissingParameter(name.to_string()),
            AthenaError::UnknownResource(name) => BackendError::UnknownResource(name),
            other => BackendError::Other(other.to_string()),
        }
    }
}
