//! Anthropic Messages API client.

use super::{
    Generation, GenerationService, UsageTracker, credential_header, status_error, transport_error,
};
use crate::models::{Result, ServiceError};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: Option<String>,
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Client for `POST {base_url}/v1/messages`.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: HeaderValue,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    timeout: Duration,
    usage: UsageTracker,
}

impl AnthropicClient {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        max_tokens: u32,
        temperature: f64,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ServiceError::Network)?;

        let api_key = credential_header(&api_key)?;

        Ok(Self {
            client,
            api_key,
            base_url,
            model,
            max_tokens,
            temperature,
            timeout,
            usage: UsageTracker::default(),
        })
    }

    /// Build headers for a request.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", self.api_key.clone());
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    /// Token usage across successful calls.
    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }
}

#[async_trait]
impl GenerationService for AnthropicClient {
    async fn generate(&self, prompt: &str) -> Result<Generation> {
        let start = Instant::now();
        let url = format!("{}/v1/messages", self.base_url);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![RequestMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &headers, body, &self.model).into());
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let text: String = body
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();
        if text.is_empty() {
            return Err(ServiceError::InvalidResponse("No text content in response".into()).into());
        }

        let (input_tokens, output_tokens) = body
            .usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or((0, 0));
        self.usage.record(input_tokens, output_tokens);

        let duration = start.elapsed();
        debug!(
            model = %self.model,
            input_tokens,
            output_tokens,
            duration_ms = duration.as_millis() as u64,
            "Messages call complete"
        );

        Ok(Generation {
            text,
            model: body.model.unwrap_or_else(|| self.model.clone()),
            input_tokens,
            output_tokens,
            duration,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TriviaError;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: String) -> AnthropicClient {
        AnthropicClient::new(
            "sk-test".to_string(),
            base_url,
            "claude-3-sonnet-20240229".to_string(),
            4000,
            0.2,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "model": "claude-3-sonnet-20240229",
                "content": [
                    { "type": "text", "text": "[{\"question\": " },
                    { "type": "text", "text": "\"Q?\"}]" }
                ],
                "stop_reason": "end_turn",
                "usage": { "input_tokens": 12, "output_tokens": 34 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(server.uri());
        let generation = client.generate("make questions").await.unwrap();

        assert_eq!(generation.text, "[{\"question\": \"Q?\"}]");
        assert_eq!(generation.input_tokens, 12);
        assert_eq!(client.usage().total_tokens(), (12, 34));
    }

    #[tokio::test]
    async fn test_auth_failure_is_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "type": "error",
                "error": { "type": "authentication_error", "message": "invalid x-api-key" }
            })))
            .mount(&server)
            .await;

        let err = client(server.uri()).generate("p").await.unwrap_err();
        assert!(matches!(
            err,
            TriviaError::Service(ServiceError::AuthenticationFailed)
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "3")
                    .set_body_json(json!({
                        "type": "error",
                        "error": { "type": "rate_limit_error", "message": "slow down" }
                    })),
            )
            .mount(&server)
            .await;

        let err = client(server.uri()).generate("p").await.unwrap_err();
        assert_eq!(err.retry_after(), Some(3.0));
    }

    #[tokio::test]
    async fn test_empty_content_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [],
                "usage": { "input_tokens": 1, "output_tokens": 0 }
            })))
            .mount(&server)
            .await;

        let err = client(server.uri()).generate("p").await.unwrap_err();
        assert!(matches!(
            err,
            TriviaError::Service(ServiceError::InvalidResponse(_))
        ));
    }
}
