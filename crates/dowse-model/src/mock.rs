// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::{truncate_at_stop, Completion, CompletionRequest, Usage};

/// Deterministic mock provider for tests.  Echoes the last user message
/// back as the assistant response.
#[derive(Default)]
pub struct MockProvider;

#[async_trait]
impl crate::ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<Completion> {
        let reply = req.last_user_text().unwrap_or("[no input]");
        Ok(Completion {
            text: format!("MOCK: {reply}"),
            usage: Some(Usage { input_tokens: 10, output_tokens: 10 }),
        })
    }
}

/// One canned response of a [`ScriptedMockProvider`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Return this text (cut at the request's stop sequences).
    Text(String),
    /// Fail the call with this message, as a provider outage would.
    Error(String),
    /// Sleep, then return the text.  Used to exercise time budgets.
    Delayed { after: Duration, text: String },
}

impl ScriptedReply {
    pub fn text(t: impl Into<String>) -> Self {
        Self::Text(t.into())
    }
}

/// A pre-scripted mock provider.  Each call to `complete` pops the next
/// reply from the front of the queue, so tests can specify exact model
/// behaviour without network access.
pub struct ScriptedMockProvider {
    scripts: Arc<Mutex<VecDeque<ScriptedReply>>>,
    /// Replayed forever once the queue is empty.
    repeat: Option<ScriptedReply>,
    name: String,
    /// Every request seen by this provider, oldest first.
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedMockProvider {
    /// Build a provider from an ordered list of replies, one per call.
    pub fn new(scripts: Vec<ScriptedReply>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into())),
            repeat: None,
            name: "scripted-mock".into(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Convenience: one text reply per call, in order.
    pub fn texts<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|r| ScriptedReply::Text(r.into())).collect())
    }

    /// Convenience: provider that always returns the same text.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(Vec::new()).repeating(ScriptedReply::Text(reply.into()))
    }

    /// Reply with `reply` once the scripted queue is exhausted.
    pub fn repeating(mut self, reply: ScriptedReply) -> Self {
        self.repeat = Some(reply);
        self
    }

    /// Number of `complete` calls received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

#[async_trait]
impl crate::ModelProvider for ScriptedMockProvider {
    fn name(&self) -> &str {
        &self.name
    }
    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<Completion> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(req.clone());
        let next = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .or_else(|| self.repeat.clone())
            // Default fallback when all scripts are consumed
            .unwrap_or_else(|| ScriptedReply::text("[no more scripts]"));

        let text = match next {
            ScriptedReply::Text(t) => t,
            ScriptedReply::Error(e) => anyhow::bail!("{e}"),
            ScriptedReply::Delayed { after, text } => {
                tokio::time::sleep(after).await;
                text
            }
        };
        Ok(Completion::text(truncate_at_stop(&text, &req.stop)))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
