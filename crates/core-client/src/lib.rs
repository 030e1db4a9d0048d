//! Inference server client.
//!
//! One JSON POST per submitted question. The request carries the question
//! verbatim alongside the behavior-enriched system prompt; the response's
//! `answer` field is optional. Failures are typed so the caller can render
//! them in place of the pending placeholder. Nothing is retried.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceRequest {
    pub question: String,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InferenceResponse {
    #[serde(default)]
    pub answer: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("{details}")]
    Status { status: u16, details: String },
    #[error("failed to parse response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn ask(&self, request: &InferenceRequest) -> Result<InferenceResponse, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpInferenceClient {
    client: Client,
    url: String,
}

impl HttpInferenceClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::Build(err.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn ask(&self, request: &InferenceRequest) -> Result<InferenceResponse, ClientError> {
        debug!(
            target: "client",
            question_len = request.question.len(),
            prompt_len = request.system_prompt.len(),
            max_tokens = request.max_tokens,
            "request_sent"
        );
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|err| {
                warn!(target: "client", timeout = err.is_timeout(), connect = err.is_connect(), "transport_failed");
                ClientError::Transport(err.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(target: "client", status = status.as_u16(), body_len = body.len(), "status_failed");
            return Err(map_http_error(status, &body));
        }

        let parsed: InferenceResponse = response
            .json()
            .await
            .map_err(|err| ClientError::Decode(err.to_string()))?;
        debug!(target: "client", has_answer = parsed.answer.is_some(), "response_received");
        Ok(parsed)
    }
}

fn map_http_error(status: StatusCode, body: &str) -> ClientError {
    ClientError::Status {
        status: status.as_u16(),
        details: error_details(status.as_u16(), body),
    }
}

/// Human-readable details for a non-2xx response.
///
/// A JSON body yields its truthy `error` field, or the whole JSON otherwise.
/// Anything else is appended to the status line, or a fixed note when empty.
pub fn error_details(status: u16, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        return match json.get("error") {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            Some(v) if is_truthy(v) => v.to_string(),
            _ => json.to_string(),
        };
    }
    if body.is_empty() {
        format!("HTTP error! Status: {status} - No further details from server.")
    } else {
        format!("HTTP error! Status: {status} - {body}")
    }
}

fn is_truthy(v: &serde_json::Value) -> bool {
    match v {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}
