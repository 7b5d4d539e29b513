//! The backend resource lookup seam.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::model::{QueryRequest, QueryResponse};

/// A lookup parameter: the backend accepts strings and integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Text(String),
}

impl ParamValue {
    /// Text view; integers are rendered in base 10.
    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        match self {
            ParamValue::Text(s) => std::borrow::Cow::Borrowed(s),
            ParamValue::Int(i) => std::borrow::Cow::Owned(i.to_string()),
        }
    }

    /// Integer view; text is parsed as base 10.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            ParamValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

/// Named parameters of a resource lookup, keyed by wire name.
pub type ResourceParams = BTreeMap<String, ParamValue>;

/// Performs a named remote lookup and returns the parsed JSON reply.
///
/// A successful reply is an object keyed by the resource name, e.g.
/// `{"regions": ["us-east-1", ...]}`. Retries, if any, are the
/// implementation's business.
#[async_trait::async_trait]
pub trait ResourceClient: Send + Sync {
    async fn fetch(
        &self,
        resource: &str,
        params: &ResourceParams,
    ) -> Result<serde_json::Value, BackendError>;
}

/// Runs panel queries. The reply carries one result per requested `refId`;
/// per-target failures travel inside the result, not as `Err`.
#[async_trait::async_trait]
pub trait QueryBackend: Send + Sync {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, BackendError>;
}
