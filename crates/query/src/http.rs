//! reqwest-backed client for a running resource server.

use std::time::Duration;

use async_trait::async_trait;
use athenaviz_core::{
    BackendError, QueryBackend, QueryRequest, QueryResponse, ResourceClient, ResourceParams,
};
use tracing::debug;

pub struct HttpResourceClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpResourceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn resource_url(&self, resource: &str) -> String {
        format!("{}/resources/{}", self.base_url, resource)
    }

    pub fn query_url(&self) -> String {
        format!("{}/query", self.base_url)
    }
}

/// Query-string pairs for `params`; integers are rendered in base 10.
pub fn query_pairs(params: &ResourceParams) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| (k.clone(), v.as_text().into_owned()))
        .collect()
}

/// Map a non-2xx reply to [`BackendError::Remote`], preferring the
/// server's `{"error": "..."}` message over the raw body.
fn remote_error(status: u16, body: &str) -> BackendError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string());
    BackendError::Remote { status, message }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| BackendError::Transport(e.to_string()))?;
    if !status.is_success() {
        return Err(remote_error(status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|e| BackendError::MalformedReply(e.to_string()))
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
    async fn fetch(
        &self,
        resource: &str,
        params: &ResourceParams,
    ) -> Result<serde_json::Value, BackendError> {
        let url = self.resource_url(resource);
        debug!("Resource request to {}", url);

        let response = self
            .client
            .get(&url)
            .query(&query_pairs(params))
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        read_json(response).await
    }
}

#[async_trait]
impl QueryBackend for HttpResourceClient {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, BackendError> {
        let url = self.query_url();
        debug!(targets = request.queries.len(), "Query request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use athenaviz_core::ParamValue;

    use super::*;

    #[test]
    fn urls_strip_trailing_slash() {
        let client = HttpResourceClient::new("http://localhost:3100/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3100");
        assert_eq!(
            client.resource_url("named_query_names"),
            "http://localhost:3100/resources/named_query_names"
        );
        assert_eq!(client.query_url(), "http://localhost:3100/query");
    }

    #[test]
    fn params_become_query_pairs() {
        let mut params = ResourceParams::new();
        params.insert("limit".into(), ParamValue::Int(-1));
        params.insert("workGroup".into(), ParamValue::from("primary"));
        assert_eq!(
            query_pairs(&params),
            vec![
                ("limit".to_string(), "-1".to_string()),
                ("workGroup".to_string(), "primary".to_string()),
            ]
        );
    }

    #[test]
    fn remote_error_prefers_server_message() {
        match remote_error(400, r#"{"error":"no named query matches 'x'"}"#) {
            BackendError::Remote { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "no named query matches 'x'");
            }
            other => panic!("unexpected: {other}"),
        }
        match remote_error(502, "Bad Gateway") {
            BackendError::Remote { message, .. } => assert_eq!(message, "Bad Gateway"),
            other => panic!("unexpected: {other}"),
        }
    }
}
