//! HTTP transport for catalog requests

use crate::error::{Error, Result};
use crate::translate::BackendPair;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Status, headers and decoded body of one catalog response.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    /// Header names are lower-cased.
    pub headers: HashMap<String, String>,
    /// JSON body, or the raw text as a JSON string when it is not JSON.
    pub body: Value,
}

impl TransportResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends form-encoded POST requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        form: &[BackendPair],
        headers: &[(String, String)],
    ) -> Result<TransportResponse>;
}

/// [`Transport`] over a shared reqwest client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("granule-search/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        form: &[BackendPair],
        headers: &[(String, String)],
    ) -> Result<TransportResponse> {
        let mut request = self.client.post(url).form(form);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// Map a non-success response to a client or server error.
///
/// 4xx is a client request error; 5xx and any other non-success status is a
/// server error. The catalog's own message is carried through unchanged.
pub fn check_status(response: &TransportResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }

    let status = response.status;
    let message = error_message(&response.body);
    tracing::warn!(status, message = %message, "Catalog request failed");

    if (400..500).contains(&status) {
        Err(Error::ClientRequest { status, message })
    } else {
        Err(Error::Server { status, message })
    }
}

/// CMR reports `{"errors": [...]}`; older endpoints `{"error": {"report": ...}}`.
fn error_message(body: &Value) -> String {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        let messages: Vec<String> = errors
            .iter()
            .map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        if !messages.is_empty() {
            return messages.join("; ");
        }
    }

    if let Some(report) = body
        .get("error")
        .and_then(|e| e.get("report"))
        .and_then(Value::as_str)
    {
        return report.to_string();
    }

    match body {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: Value) -> TransportResponse {
        TransportResponse {
            status,
            headers: HashMap::new(),
            body,
        }
    }

    #[test]
    fn test_success_passes() {
        assert!(check_status(&response(200, json!({"items": []}))).is_ok());
    }

    #[test]
    fn test_client_error_carries_message() {
        let err = check_status(&response(
            400,
            json!({"errors": ["Parameter [foo] was not recognized."]}),
        ))
        .unwrap_err();
        match err {
            Error::ClientRequest { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Parameter [foo] was not recognized.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_server_error_and_other_statuses() {
        let err = check_status(&response(503, json!({"error": {"report": "down"}}))).unwrap_err();
        assert!(matches!(err, Error::Server { status: 503, ref message } if message == "down"));

        let err = check_status(&response(302, Value::String("moved".into()))).unwrap_err();
        assert!(matches!(err, Error::Server { status: 302, .. }));
        assert_eq!(err.status(), Some(302));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_multiple_errors_are_joined() {
        let body = json!({"errors": ["first", "second"]});
        assert_eq!(error_message(&body), "first; second");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut resp = response(200, Value::Null);
        resp.headers.insert("cmr-hits".into(), "42".into());
        assert_eq!(resp.header("CMR-Hits"), Some("42"));
    }
}
