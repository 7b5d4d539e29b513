use thiserror::Error;

/// Failures of a backend resource lookup.
///
/// Produced by every [`ResourceClient`](crate::ResourceClient) implementation,
/// whether the lookup crossed the network or ran in-process.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter {name}='{value}': {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    #[error("AWS error: {0}")]
    Aws(String),

    #[error("{0}")]
    Other(String),
}

/// Failures while decoding a duration string such as `cacheDuration`.
#[derive(Error, Debug, PartialEq)]
pub enum DurationError {
    #[error("invalid duration '{0}'")]
    Invalid(String),

    #[error("unknown unit '{unit}' in duration '{input}'")]
    UnknownUnit { input: String, unit: String },
}
