use athenaviz_core::BackendError;
use thiserror::Error;

/// Failures of the template-query engine and the panel query path.
///
/// An unrecognized query string is not an error; it yields an empty list.
#[derive(Error, Debug)]
pub enum QueryError {
    /// A required argument failed to parse after template substitution.
    #[error("Invalid argument {argument}='{value}': {reason}")]
    InvalidArgument {
        argument: &'static str,
        value: String,
        reason: String,
    },

    /// The backend lookup or query call failed.
    #[error("Backend failure: {0}")]
    Backend(#[from] BackendError),
}
