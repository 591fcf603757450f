// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! OpenAI chat-completions driver.
//!
//! Speaks the plain (non-streaming) `/chat/completions` wire format, so it
//! also works against OpenAI-compatible servers such as Ollama, vLLM or
//! LiteLLM via `base_url`.

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, trace, warn};

use crate::{Completion, CompletionRequest, Usage};

/// The chat-completions API accepts at most this many stop sequences.
const MAX_STOP_SEQUENCES: usize = 4;

pub struct OpenAiProvider {
    model: String,
    api_key: Option<String>,
    chat_url: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(
        model: String,
        api_key: Option<String>,
        base_url: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Self {
        let base = base_url.as_deref().unwrap_or("https://api.openai.com/v1");
        Self {
            model,
            api_key,
            chat_url: format!("{}/chat/completions", base.trim_end_matches('/')),
            max_tokens: max_tokens.unwrap_or(1024),
            temperature: temperature.unwrap_or(0.0),
            client: reqwest::Client::new(),
        }
    }

    pub(crate) fn request_body(&self, req: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": req.messages,
            "max_tokens": req.max_tokens.unwrap_or(self.max_tokens),
            "temperature": req.temperature.unwrap_or(self.temperature),
        });
        if !req.stop.is_empty() {
            if req.stop.len() > MAX_STOP_SEQUENCES {
                warn!(
                    count = req.stop.len(),
                    "too many stop sequences; extra ones are enforced client-side"
                );
            }
            let stop: Vec<&String> = req.stop.iter().take(MAX_STOP_SEQUENCES).collect();
            body["stop"] = json!(stop);
        }
        body
    }
}

/// Pull the assistant text and usage out of a chat-completions response.
pub(crate) fn parse_response(body: &Value) -> anyhow::Result<Completion> {
    let text = body["choices"][0]["message"]["content"]
        .as_str()
        .context("response has no choices[0].message.content")?
        .to_string();
    let usage = body.get("usage").map(|u| Usage {
        input_tokens: u["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: u["completion_tokens"].as_u64().unwrap_or(0) as u32,
    });
    Ok(Completion { text, usage })
}

#[async_trait]
impl crate::ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<Completion> {
        let body = self.request_body(&req);
        debug!(
            model = %self.model,
            message_count = req.messages.len(),
            approx_tokens = req.messages.iter().map(|m| m.approx_tokens()).sum::<usize>(),
            "sending completion request"
        );
        trace!(request_body = ?body, "full completion request");

        let mut http_req = self.client.post(&self.chat_url).json(&body);
        if let Some(key) = self.api_key.as_deref() {
            http_req = http_req.bearer_auth(key);
        }

        let resp = http_req.send().await.context("openai request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("openai error {status}: {text}");
        }

        let value: Value = resp.json().await.context("decoding openai response")?;
        let mut completion = parse_response(&value)?;
        completion.text = crate::truncate_at_stop(&completion.text, &req.stop).to_string();
        Ok(completion)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
