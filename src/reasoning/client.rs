//! Reasoning Client (C4): a typed, health-probed HTTP client for a local
//! text-generation endpoint.
//!
//! Grounded on `agent::provider::build_http_client` (env-driven proxy/timeout
//! wiring) and `agent::provider_glm::GlmProvider` (typed request/response
//! structs, non-2xx -> error), simplified to the single-shot, non-streaming
//! Ollama-style contract documented in the external interfaces section.
//! `unavailable` is a first-class `Option::None`, never a propagated error —
//! every network/timeout/4xx/5xx failure collapses to it and the client
//! never retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const HEALTH_TIMEOUT: Duration = Duration::from_millis(800);
const COMPLETE_TIMEOUT: Duration = Duration::from_secs(20);

/// Exactly the fields named in the C4 contract.
#[derive(Debug, Clone)]
pub struct CompletionParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stop: Vec<String>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: CompletionOptions<'a>,
}

#[derive(Serialize)]
struct CompletionOptions<'a> {
    num_predict: u32,
    temperature: f32,
    stop: &'a [String],
}

#[derive(Deserialize)]
struct CompletionResponse {
    response: String,
    #[allow(dead_code)]
    done: bool,
}

pub struct ReasoningClient {
    client: reqwest::Client,
    base_url: String,
}

impl ReasoningClient {
    /// Builds the shared HTTP client once (proxy support via `HTTP_PROXY`
    /// env vars comes from `reqwest` itself). Timeouts are fixed per-call
    /// instead of on the client, since the two call shapes (health probe vs
    /// completion) have very different latency budgets.
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Ok(proxy_url) = std::env::var("HTTP_PROXY") {
            builder = builder.proxy(reqwest::Proxy::all(&proxy_url)?);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into(),
        })
    }

    /// Fast, bounded-latency health probe.
    pub async fn healthy(&self) -> bool {
        let Ok(response) = self
            .client
            .get(format!("{}/", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        else {
            return false;
        };
        response.status().is_success() || response.status().is_redirection()
    }

    /// Single-shot text completion. Any failure — connection refused,
    /// timeout, non-2xx — collapses to `None`; callers substitute their own
    /// documented fallback string.
    pub async fn complete(&self, prompt: &str, params: &CompletionParams) -> Option<String> {
        let body = CompletionRequest {
            model: &params.model,
            prompt,
            stream: false,
            options: CompletionOptions {
                num_predict: params.max_tokens,
                temperature: params.temperature,
                stop: &params.stop,
            },
        };

        let response = match self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .timeout(COMPLETE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "reasoning client request failed, degrading to fallback");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "reasoning endpoint returned non-success status");
            return None;
        }

        match response.json::<CompletionResponse>().await {
            Ok(parsed) => Some(parsed.response),
            Err(err) => {
                debug!(error = %err, "failed to parse reasoning response, degrading to fallback");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_params_carry_exactly_the_documented_fields() {
        let params = CompletionParams {
            model: "mistral".to_string(),
            max_tokens: 128,
            temperature: 0.2,
            stop: vec!["\n\n".to_string()],
        };
        assert_eq!(params.model, "mistral");
        assert_eq!(params.max_tokens, 128);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable_not_an_error() {
        // Port 1 is reserved and never accepts connections locally.
        let client = ReasoningClient::new("http://127.0.0.1:1").unwrap();
        assert!(!client.healthy().await);
        let params = CompletionParams {
            model: "mistral".to_string(),
            max_tokens: 16,
            temperature: 0.0,
            stop: vec![],
        };
        assert_eq!(client.complete("hello", &params).await, None);
    }
}
