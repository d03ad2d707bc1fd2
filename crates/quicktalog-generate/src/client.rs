//! Completion client — a single non-streaming call to an OpenAI-compatible
//! chat-completions endpoint.
//!
//! No retries here. The pipeline decides per stage whether a failure is
//! fatal, skippable, or degrades to a fallback.

use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use quicktalog_core::{Error, Result};

use crate::config::GeneratorConfig;

/// Seam for the text-completion service so the pipeline can run against
/// scripted fakes in tests.
pub trait CompletionBackend: Send + Sync {
    /// One prompt in, the raw model text out.
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// Production completion client for OpenAI-compatible APIs.
pub struct OpenAiCompletion {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
}

impl OpenAiCompletion {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            client,
            url: config.completion_url.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    async fn request(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.2,
        });

        debug!("Completion request to {} with model {}", self.url, self.model);

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 => Error::RateLimited(detail),
                401 | 403 => Error::UpstreamAuth(detail),
                402 => Error::QuotaExceeded(detail),
                _ => Error::UpstreamUnavailable(format!("HTTP {status}: {detail}")),
            });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| Error::UpstreamUnavailable("response had no message content".into()))
    }
}

impl CompletionBackend for OpenAiCompletion {
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.request(prompt))
    }
}
