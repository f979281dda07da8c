//! Gemini REST backend.
//!
//! Each conversation keeps its own turns and resends the whole history
//! with every request; the service itself is stateless. Answers arrive
//! over `streamGenerateContent?alt=sse` and are decoded chunk by chunk.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use campus_core::config::GenerativeConfig;
use futures::{stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapters::{Conversation, GenerativeAdapter, TextStream, Turn};
use crate::context::Context;
use crate::error::GenerativeError;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// =============================================================================
// Generator
// =============================================================================

#[derive(Debug, Clone)]
struct Settings {
    api_key: String,
    model: String,
    temperature: f32,
    system_instruction: Option<String>,
    timeout: Duration,
    base_url: String,
}

/// Opens Gemini-backed conversations.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: Client,
    settings: Arc<Settings>,
}

impl GeminiGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            settings: Arc::new(Settings {
                api_key: api_key.into(),
                model: model.into(),
                temperature: 0.7,
                system_instruction: None,
                timeout: Duration::from_secs(30),
                base_url: BASE_URL.to_string(),
            }),
        }
    }

    /// Build from config, reading the API key from the configured
    /// environment variable.
    pub fn from_config(config: &GenerativeConfig) -> Result<Self, GenerativeError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                GenerativeError::NotConfigured(format!(
                    "environment variable {} is not set",
                    config.api_key_env
                ))
            })?;

        let mut generator = Self::new(api_key, config.model.clone())
            .with_temperature(config.temperature)
            .with_timeout(Duration::from_secs(config.request_timeout_secs));
        if !config.system_prompt.trim().is_empty() {
            generator = generator.with_system_instruction(config.system_prompt.clone());
        }
        Ok(generator)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        Arc::make_mut(&mut self.settings).temperature = temperature;
        self
    }

    /// Adds a system instruction that is sent alongside every request.
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.settings).system_instruction = Some(instruction.into());
        self
    }

    /// Limit on establishing a generation stream.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        Arc::make_mut(&mut self.settings).timeout = timeout;
        self
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Point at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.settings).base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }
}

impl GenerativeAdapter for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    fn open_conversation(&self) -> Box<dyn Conversation> {
        Box::new(GeminiConversation {
            client: self.client.clone(),
            settings: Arc::clone(&self.settings),
            turns: Vec::new(),
        })
    }
}

// =============================================================================
// Conversation
// =============================================================================

struct GeminiConversation {
    client: Client,
    settings: Arc<Settings>,
    turns: Vec<Turn>,
}

impl GeminiConversation {
    fn build_request(&self, context: &Context) -> GenerateContentRequest {
        let mut contents = Vec::with_capacity(self.turns.len() * 2 + 1);
        for turn in &self.turns {
            contents.push(Content::text("user", &turn.prompt));
            contents.push(Content::text("model", &turn.assistant));
        }
        contents.push(Content::text("user", context.render_prompt()));

        GenerateContentRequest {
            contents,
            system_instruction: self
                .settings
                .system_instruction
                .as_ref()
                .map(|text| Content::text("system", text)),
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
            },
        }
    }
}

#[async_trait]
impl Conversation for GeminiConversation {
    async fn stream(&mut self, context: &Context) -> Result<TextStream, GenerativeError> {
        let settings = &self.settings;
        let url = format!(
            "{}/{model}:streamGenerateContent",
            settings.base_url.trim_end_matches('/'),
            model = settings.model
        );
        let body = self.build_request(context);
        debug!(model = %settings.model, history = self.turns.len(), "Opening Gemini stream");

        let send = self
            .client
            .post(url)
            .query(&[("alt", "sse"), ("key", settings.api_key.as_str())])
            .json(&body)
            .send();
        let response = tokio::time::timeout(settings.timeout, send)
            .await
            .map_err(|_| GenerativeError::Timeout(settings.timeout))?
            .map_err(|err| GenerativeError::Request(format!("Gemini API request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            let err = map_http_error(status, &body_text);
            warn!(status = status.as_u16(), error = %err, "Gemini rejected request");
            return Err(err);
        }

        let events = response
            .bytes_stream()
            .scan(SseDecoder::default(), |decoder, chunk| {
                let items = match chunk {
                    Ok(bytes) => decoder.push(&bytes),
                    Err(err) => vec![Err(GenerativeError::Stream(err.to_string()))],
                };
                futures::future::ready(Some(stream::iter(items)))
            })
            .flatten();
        Ok(Box::pin(events))
    }

    fn record(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    fn turns(&self) -> &[Turn] {
        &self.turns
    }
}

// =============================================================================
// SSE decoding
// =============================================================================

/// Incremental decoder for `data:` lines of a server-sent event stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed raw bytes; returns the text of every complete event.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<String, GenerativeError>> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);
            if let Some(item) = decode_line(line) {
                out.push(item);
            }
        }
        out
    }
}

fn decode_line(line: &str) -> Option<Result<String, GenerativeError>> {
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    let chunk: StreamChunk = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(err) => {
            return Some(Err(GenerativeError::Stream(format!(
                "malformed Gemini event: {err}"
            ))))
        }
    };
    if let Some(error) = chunk.error {
        return Some(Err(GenerativeError::Api {
            status: error.code.unwrap_or(500),
            message: error.message.unwrap_or_default(),
        }));
    }
    let text: String = chunk
        .candidates
        .unwrap_or_default()
        .into_iter()
        .take(1)
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts.unwrap_or_default())
        .filter_map(|part| part.text)
        .collect();
    (!text.is_empty()).then_some(Ok(text))
}

fn map_http_error(status: StatusCode, body: &str) -> GenerativeError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| body.to_string());
    GenerativeError::Api {
        status: status.as_u16(),
        message,
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct StreamChunk {
    candidates: Option<Vec<Candidate>>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    parts: Option<Vec<PartResponse>>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<u16>,
    message: Option<String>,
    status: Option<String>,
}
