//! Blocking JSON-over-HTTP client for OpenAI-compatible endpoints.

use std::time::Duration;

use serde_json::Value;

use crate::analysis::error::{AnalysisError, AnalysisResult};
use crate::config::ServiceConfig;

/// One configured endpoint family: base URL, bearer token and HTTP agent.
#[derive(Clone)]
pub struct ServiceClient {
    service: &'static str,
    base_url: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("service", &self.service)
            .field("base_url", &self.base_url)
            .field("has_credential", &self.api_key.is_some())
            .finish()
    }
}

impl ServiceClient {
    /// `service` names the caller in logs and errors.
    pub fn new(service: &'static str, config: &ServiceConfig) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Self {
            service,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            agent: builder.build(),
        }
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// POST `body` to `{base_url}{path}` and parse the JSON response.
    ///
    /// Non-2xx answers become `ServiceStatus` with the response body attached.
    pub fn post_json(&self, path: &str, body: &Value) -> AnalysisResult<Value> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AnalysisError::MissingCredential {
                service: self.service.to_string(),
            })?;

        let url = format!("{}{path}", self.base_url);
        let body_str = serde_json::to_string(body).map_err(|e| self.malformed(e))?;

        tracing::debug!(service = self.service, %url, bytes = body_str.len(), "sending request");

        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {api_key}"))
            .send_string(&body_str);

        let response = match response {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                return Err(AnalysisError::ServiceStatus {
                    service: self.service.to_string(),
                    status: code,
                    body: truncate(&body, 500),
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(AnalysisError::Transport {
                    service: self.service.to_string(),
                    message: transport.to_string(),
                });
            }
        };

        let text = response.into_string().map_err(|e| AnalysisError::Transport {
            service: self.service.to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| self.malformed(e))
    }

    pub(crate) fn malformed(&self, message: impl std::fmt::Display) -> AnalysisError {
        AnalysisError::MalformedResponse {
            service: self.service.to_string(),
            message: message.to_string(),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_fails_before_any_request() {
        let config = ServiceConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        };
        let client = ServiceClient::new("tagging", &config);
        assert!(!client.has_credential());
        let err = client.post_json("/chat/completions", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingCredential { .. }));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = ServiceConfig {
            api_key: Some("   ".into()),
            ..Default::default()
        };
        assert!(!ServiceClient::new("embedding", &config).has_credential());
    }

    #[test]
    fn long_bodies_are_truncated() {
        let long = "x".repeat(600);
        let cut = truncate(&long, 500);
        assert_eq!(cut.chars().count(), 501);
        assert_eq!(truncate("short", 500), "short");
    }
}
