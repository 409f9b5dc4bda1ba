//! Text-generation backends.
//!
//! Defines the [`TextGenerator`] trait and concrete implementations:
//! - **[`EchoGenerator`]**: offline backend that streams the last prompt
//!   line back word by word. Used by tests and as the default provider.
//! - **[`OllamaGenerator`]**: calls an Ollama-compatible
//!   `POST /api/generate` endpoint with retry and backoff.
//!
//! Backends never return partial results through the `Result`: they report
//! progress as [`WorkerEvent`]s on the channel and always finish with a
//! terminal `Done` or `Error` event.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use teapot_core::protocol::{GenerateRequest, LoadStatus, WorkerEvent};

use crate::config::GenerationConfig;

/// A text-generation service that streams its output as events.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend identifier (e.g. `"echo"`, `"ollama"`).
    fn name(&self) -> &str;

    /// Run one generation, sending `Start`, `Output`* and a terminal event.
    ///
    /// An `Err` means the channel was closed by the receiver.
    async fn generate(
        &self,
        request: GenerateRequest,
        events: mpsc::Sender<WorkerEvent>,
    ) -> Result<()>;
}

/// Instantiate the backend named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn TextGenerator>> {
    match config.provider.as_str() {
        "echo" => Ok(Box::new(EchoGenerator)),
        "ollama" => Ok(Box::new(OllamaGenerator::new(config.clone()))),
        other => bail!("Unknown generation provider: {}", other),
    }
}

async fn send(events: &mpsc::Sender<WorkerEvent>, event: WorkerEvent) -> Result<()> {
    events
        .send(event)
        .await
        .map_err(|_| anyhow::anyhow!("generation event receiver dropped"))
}

/// Split text into tokens that concatenate back to the original.
fn stream_tokens(text: &str) -> Vec<&str> {
    text.split_inclusive(char::is_whitespace).collect()
}

// ============ Echo ============

/// Replies with the last line of the prompt, one word per token.
pub struct EchoGenerator;

#[async_trait]
impl TextGenerator for EchoGenerator {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(
        &self,
        request: GenerateRequest,
        events: mpsc::Sender<WorkerEvent>,
    ) -> Result<()> {
        let prompt = request.prompt();
        let reply = prompt.lines().last().unwrap_or_default();

        send(&events, WorkerEvent::Start).await?;
        for token in stream_tokens(reply) {
            send(&events, WorkerEvent::output(token)).await?;
        }
        send(&events, WorkerEvent::Done).await
    }
}

// ============ Ollama ============

/// Backend for an Ollama-compatible HTTP server.
pub struct OllamaGenerator {
    config: GenerationConfig,
}

impl OllamaGenerator {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }

    async fn complete(&self, prompt: &str, model: &str) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()?;

        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
        });

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, ?delay, "retrying generation request");
                tokio::time::sleep(delay).await;
            }

            let resp = client.post(&url).json(&body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_generate_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "generation API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("generation API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("generation failed after retries")))
    }
}

/// Extract the `response` text from an `/api/generate` reply.
fn parse_generate_response(json: &serde_json::Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid generation response: missing response field"))
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(
        &self,
        request: GenerateRequest,
        events: mpsc::Sender<WorkerEvent>,
    ) -> Result<()> {
        let model = if request.model.is_empty() {
            self.config.model.clone()
        } else {
            request.model.clone()
        };

        send(
            &events,
            WorkerEvent::Status(LoadStatus::Loading {
                model: model.clone(),
            }),
        )
        .await?;

        let started = Instant::now();
        let text = match self.complete(&request.prompt(), &model).await {
            Ok(text) => text,
            Err(e) => return send(&events, WorkerEvent::error(e.to_string())).await,
        };

        send(&events, WorkerEvent::Status(LoadStatus::Ready { model })).await?;
        send(&events, WorkerEvent::Start).await?;

        let tokens = stream_tokens(&text);
        let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);
        let tps = (tokens.len() as f64 / elapsed * 100.0).round() / 100.0;
        for token in tokens {
            send(
                &events,
                WorkerEvent::Output {
                    token: token.to_string(),
                    tps: Some(tps),
                },
            )
            .await?;
        }
        send(&events, WorkerEvent::Done).await
    }
}
