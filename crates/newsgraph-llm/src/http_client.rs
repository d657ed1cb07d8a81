use std::time::Duration;

use async_trait::async_trait;
use newsgraph_core::error::{CoreError, Result};
use newsgraph_core::retry::with_backoff;
use newsgraph_core::traits::{ChatRole, CompletionRequest, CompletionResponse, LlmClient};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Chat-completion transport, grounded on the teacher's Anthropic provider
/// (timeout client, retry-wrapped POST, non-retry on 4xx) but reduced to the
/// single generic request/response shape the spec needs — no per-vendor
/// factory, since the pipeline only ever sees one opaque LLM.
pub struct HttpLlmClient {
    client: Client,
    api_base: String,
    api_key: SecretString,
    model: String,
    max_retries: u32,
    max_wait: Duration,
}

impl HttpLlmClient {
    pub fn new(
        api_base: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        timeout_seconds: u64,
        max_retries: u32,
        max_wait_seconds: u64,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into(),
            api_key,
            model: model.into(),
            max_retries,
            max_wait: Duration::from_secs(max_wait_seconds),
        })
    }

    async fn try_once(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let body = ChatCompletionBody {
            model: self.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| ChatCompletionMessage {
                    role: match m.role {
                        ChatRole::System => "system",
                        ChatRole::User => "user",
                        ChatRole::Assistant => "assistant",
                    }
                    .to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::llm_transient(format!("request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(CoreError::llm_transient(format!("{status}: {text}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CoreError::llm_permanent(format!("{status}: {text}")));
        }

        let parsed: ChatCompletionResponseBody = response
            .json()
            .await
            .map_err(|e| CoreError::llm_transient(format!("malformed response body: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::llm_permanent("response contained no choices"))?;

        Ok(CompletionResponse {
            content: choice.message.content,
            finish_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        with_backoff("llm.complete", self.max_retries, self.max_wait, || {
            self.try_once(&request)
        })
        .await
    }
}

#[derive(Serialize)]
struct ChatCompletionBody {
    model: String,
    messages: Vec<ChatCompletionMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct ChatCompletionMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponseBody {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
    finish_reason: Option<String>,
}
