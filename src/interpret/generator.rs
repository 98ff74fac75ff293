//! Text-generation backends.
//!
//! The interpreter only needs "prompt in, one sentence out". [`AnthropicGenerator`]
//! talks to the Messages API; tests plug in their own [`TextGenerator`].

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::GeneratorConfig;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

pub const SYSTEM_PROMPT: &str = "You turn sign-language gesture glosses into speech. \
Reply with exactly one sentence and nothing else.";

pub struct AnthropicGenerator {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    api_key: Option<String>,
}

impl AnthropicGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        // The interpreter enforces its own deadline; this only guards a stuck socket.
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms.saturating_mul(2)))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_key: config.api_key.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("no ANTHROPIC_API_KEY configured");
        };

        debug!("Calling text generation with prompt length: {}", prompt.len());

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("text generation request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("text generation returned error status: {status}"));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .context("failed to parse text generation response")?;

        parsed
            .content
            .into_iter()
            .map(|block| block.text)
            .find(|text| !text.trim().is_empty())
            .ok_or_else(|| anyhow!("text generation returned no text"))
    }
}
