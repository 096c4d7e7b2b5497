//! OpenAI-compatible augmenter
//!
//! Posts the request prompt to `{endpoint}/chat/completions` and returns the
//! first choice's content. Transient failures (transport errors, 429, 5xx)
//! are retried with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AugmentConfig;
use crate::error::{FlowcError, Result};
use crate::util::constants::CONNECT_TIMEOUT;

use super::retry::{RetryConfig, RetryPolicy};
use super::{AugmentRequest, Augmenter, NO_CHANGE};

/// Augmenter backed by a chat-completions HTTP endpoint
pub struct HttpAugmenter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpAugmenter {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .user_agent(concat!("flowc/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FlowcError::ConfigError {
                reason: format!("cannot build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            timeout,
            retry: RetryPolicy::default(),
        })
    }

    pub fn from_config(config: &AugmentConfig) -> Result<Self> {
        let mut augmenter = Self::new(
            config.endpoint.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )?
        .with_retry(RetryPolicy::new(
            RetryConfig::default().with_max_retries(config.max_retries),
        ));
        augmenter.api_key = config.api_key.clone().filter(|k| !k.is_empty());
        Ok(augmenter)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    async fn send(&self, request: &AugmentRequest) -> Result<String> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt(),
            }],
            temperature: 0.0,
        };

        tracing::debug!(
            model = %self.model,
            key = %request.key,
            "sending augmentation request"
        );

        let mut builder = self.client.post(self.url()).json(&payload);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                FlowcError::AugmentationTimeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else {
                FlowcError::AugmentationFailed {
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlowcError::AugmentationHttp {
                status: status.as_u16(),
                reason: truncate(&body, 200),
            });
        }

        let parsed: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|e| FlowcError::AugmentationMalformed {
                    reason: format!("invalid response body: {}", e),
                })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| FlowcError::AugmentationMalformed {
                reason: "response has no choices".to_string(),
            })
    }
}

#[async_trait]
impl Augmenter for HttpAugmenter {
    fn name(&self) -> &str {
        "http"
    }

    /// Each attempt is bounded by the client; the caller waits for all of them
    fn time_budget(&self, per_attempt: Duration) -> Duration {
        self.retry.budget(per_attempt.max(self.timeout))
    }

    async fn rewrite(&self, request: &AugmentRequest) -> Result<Option<String>> {
        let content = self.retry.execute(|| self.send(request)).await?;
        if content.trim() == NO_CHANGE {
            return Ok(None);
        }
        Ok(Some(content))
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

// ============================================================================
// API TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}
