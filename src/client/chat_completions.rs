//! Generic client for OpenAI-compatible chat completion endpoints.
//!
//! Covers aggregators (OpenRouter, Together AI, Groq) and on-prem servers
//! (vLLM, Ollama, llama.cpp) that speak `POST {base_url}/chat/completions`.

use super::{
    Generation, GenerationService, UsageTracker, credential_header, status_error, transport_error,
};
use crate::models::{Result, ServiceError};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Message in a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion request payload.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
}

/// Chat completion response.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Client for any OpenAI-compatible endpoint.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    /// Bearer credential (None for local endpoints without auth)
    authorization: Option<HeaderValue>,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    timeout: Duration,
    usage: UsageTracker,
}

impl ChatCompletionsClient {
    pub fn new(
        api_key: Option<String>,
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

        let authorization = api_key
            .map(|key| credential_header(&format!("Bearer {key}")))
            .transpose()?;

        Ok(Self {
            client,
            authorization,
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
        if let Some(authorization) = &self.authorization {
            headers.insert(AUTHORIZATION, authorization.clone());
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        // OpenRouter attribution headers (harmless for other providers)
        headers.insert("X-Title", HeaderValue::from_static("hero-trivia"));
        headers
    }

    /// Token usage across successful calls.
    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }
}

#[async_trait]
impl GenerationService for ChatCompletionsClient {
    async fn generate(&self, prompt: &str) -> Result<Generation> {
        let start = Instant::now();
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![Message::user(prompt)],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
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

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ServiceError::InvalidResponse("No choices in response".into()))?;

        let (input_tokens, output_tokens) = body
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));
        self.usage.record(input_tokens, output_tokens);

        let duration = start.elapsed();
        debug!(
            model = %self.model,
            input_tokens,
            output_tokens,
            duration_ms = duration.as_millis() as u64,
            "Chat completion complete"
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

    fn client(base_url: String, api_key: Option<&str>) -> ChatCompletionsClient {
        ChatCompletionsClient::new(
            api_key.map(String::from),
            base_url,
            "llama3:70b".to_string(),
            4000,
            0.2,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-or"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3:70b",
                "choices": [{ "message": { "role": "assistant", "content": "[]" } }],
                "usage": { "prompt_tokens": 5, "completion_tokens": 1, "total_tokens": 6 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(format!("{}/v1", server.uri()), Some("sk-or"));
        let generation = client.generate("p").await.unwrap();

        assert_eq!(generation.text, "[]");
        assert_eq!(generation.model, "llama3:70b");
        assert_eq!(client.usage().total_tokens(), (5, 1));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = client(server.uri(), None).generate("p").await.unwrap_err();
        match err {
            TriviaError::Service(ServiceError::Api { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_choices_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = client(server.uri(), None).generate("p").await.unwrap_err();
        assert!(matches!(
            err,
            TriviaError::Service(ServiceError::InvalidResponse(_))
        ));
    }
}
