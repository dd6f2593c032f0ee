//! Text-generation collaborator.
//!
//! [`CompletionService`] is what the dialogue engine calls. [`HttpCompletion`]
//! talks to an Ollama server or an OpenAI-compatible endpoint; the scripted
//! and failing services are deterministic doubles for tests and dry runs.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use homecat_core::config::{LlmConfig, LlmProvider};
use homecat_core::domain::conversation::Turn;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::prompt::{build_prompt, clean_completion, has_real_listing, STOP_SEQUENCES};

/// OpenAI-compatible APIs accept at most this many stop sequences.
const OPENAI_MAX_STOP: usize = 4;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(8);

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, user_input: &str, history: &[Turn]) -> Result<String>;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub repeat_penalty: f32,
    pub frequency_penalty: f32,
}

impl GenerationOptions {
    /// Longer budgets for listing descriptions and long user messages.
    pub fn for_turn(user_input: &str, history: &[Turn]) -> Self {
        let max_tokens = if has_real_listing(history) {
            768
        } else {
            match user_input.chars().count() {
                0..=199 => 512,
                200..=499 => 768,
                _ => 1024,
            }
        };

        Self {
            max_tokens,
            temperature: 0.4,
            top_p: 0.85,
            top_k: 30,
            repeat_penalty: 1.2,
            frequency_penalty: 0.3,
        }
    }
}

pub struct HttpCompletion {
    client: reqwest::Client,
    provider: LlmProvider,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    max_retries: u32,
    template: String,
}

impl HttpCompletion {
    pub fn new(config: &LlmConfig, template: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client for completion backend")?;

        Ok(Self {
            client,
            provider: config.provider,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            template: template.into(),
        })
    }

    pub fn endpoint(&self) -> String {
        match self.provider {
            LlmProvider::Ollama => format!("{}/api/generate", self.base_url),
            LlmProvider::OpenAi => format!("{}/v1/chat/completions", self.base_url),
        }
    }

    pub fn request_body(&self, prompt: &str, options: &GenerationOptions) -> Value {
        match self.provider {
            LlmProvider::Ollama => json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
                "raw": true,
                "options": {
                    "num_predict": options.max_tokens,
                    "temperature": options.temperature,
                    "top_p": options.top_p,
                    "top_k": options.top_k,
                    "repeat_penalty": options.repeat_penalty,
                    "frequency_penalty": options.frequency_penalty,
                    "stop": STOP_SEQUENCES,
                }
            }),
            LlmProvider::OpenAi => json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
                "max_tokens": options.max_tokens,
                "temperature": options.temperature,
                "top_p": options.top_p,
                "frequency_penalty": options.frequency_penalty,
                "stop": &STOP_SEQUENCES[..OPENAI_MAX_STOP],
            }),
        }
    }

    async fn send_once(&self, body: &Value) -> std::result::Result<Value, AttemptError> {
        let mut request = self.client.post(self.endpoint()).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|error| AttemptError::Retryable(error.into()))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let error = anyhow!("completion backend returned {status}: {}", truncate(&detail, 200));
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                AttemptError::Retryable(error)
            } else {
                AttemptError::Fatal(error)
            });
        }

        response.json::<Value>().await.map_err(|error| AttemptError::Fatal(error.into()))
    }
}

enum AttemptError {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

/// Generated text from a provider response body.
pub fn response_text(provider: LlmProvider, body: &Value) -> Result<String> {
    let text = match provider {
        LlmProvider::Ollama => body.get("response").and_then(Value::as_str),
        LlmProvider::OpenAi => body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.pointer("/message/content").or_else(|| choice.get("text")))
            .and_then(Value::as_str),
    };
    text.map(str::to_string).ok_or_else(|| anyhow!("completion response has no text"))
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[async_trait]
impl CompletionService for HttpCompletion {
    async fn complete(&self, user_input: &str, history: &[Turn]) -> Result<String> {
        let prompt = build_prompt(user_input, history, &self.template);
        let options = GenerationOptions::for_turn(user_input, history);
        let body = self.request_body(&prompt, &options);
        debug!(
            provider = self.provider.as_str(),
            model = %self.model,
            max_tokens = options.max_tokens,
            prompt_chars = prompt.chars().count(),
            "requesting completion"
        );

        let started = Instant::now();
        let mut attempt = 0u32;
        let payload = loop {
            match self.send_once(&body).await {
                Ok(payload) => break payload,
                Err(AttemptError::Retryable(error)) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(attempt, max_retries = self.max_retries, %error, "completion attempt failed");
                    tokio::time::sleep(retry_delay(attempt)).await;
                }
                Err(AttemptError::Retryable(error)) | Err(AttemptError::Fatal(error)) => {
                    return Err(error.context("completion request failed"));
                }
            }
        };

        let raw = response_text(self.provider, &payload)?;
        let Some(text) = clean_completion(&raw) else {
            bail!("completion backend returned empty text");
        };
        info!(
            provider = self.provider.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            reply_chars = text.chars().count(),
            "completion received"
        );
        Ok(text)
    }
}

/// Replies from a fixed queue and records what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
    requests: Mutex<Vec<(String, Vec<Turn>)>>,
}

impl ScriptedCompletion {
    pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fallback: "Cuéntame un poco más de lo que buscas.".to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(String, Vec<Turn>)> {
        self.requests.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, user_input: &str, history: &[Turn]) -> Result<String> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((user_input.to_string(), history.to_vec()));
        let next = self.replies.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

#[derive(Debug, Default)]
pub struct FailingCompletion;

#[async_trait]
impl CompletionService for FailingCompletion {
    async fn complete(&self, _user_input: &str, _history: &[Turn]) -> Result<String> {
        bail!("completion backend unavailable")
    }
}

/// Exponential backoff from [`RETRY_BASE_DELAY`], capped at [`MAX_RETRY_DELAY`].
fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY
        .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
        .min(MAX_RETRY_DELAY)
}
