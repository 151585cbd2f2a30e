//! OpenAI-compatible chat-completions client used as the boundary oracle.

use super::assembler::WordLimits;
use super::{Batch, BoundaryDecision, BoundaryOracle};
use crate::config::Config;
use crate::error::{Result, SplitError};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, error};

/// Timeout for the connectivity probe.
const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-request timeout for boundary requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Marker the model inserts between segments.
const BREAK_MARKER: &str = "<br>";

pub struct OpenAiOracle {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    limits: WordLimits,
}

impl OpenAiOracle {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
            limits: WordLimits::default(),
        }
    }

    /// Build a client from a validated configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .ok_or_else(|| SplitError::Config(format!("{} not set", name)))
        };

        Ok(Self::new(
            required(&config.base_url, "OPENAI_BASE_URL")?,
            required(&config.api_key, "OPENAI_API_KEY")?,
            required(&config.model, "LLM_MODEL")?,
        )
        .with_timeout(config.request_timeout())
        .with_word_limits(WordLimits {
            cjk: config.max_word_count_cjk,
            other: config.max_word_count_other,
        }))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Word caps quoted to the model as guidance; the assembler enforces them.
    pub fn with_word_limits(mut self, limits: WordLimits) -> Self {
        self.limits = limits;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn system_prompt(&self) -> String {
        format!(
            r#"You split subtitle transcripts into readable subtitle lines.
The user sends a run of transcribed speech without punctuation-aware breaks.
Insert the marker {BREAK_MARKER} wherever one subtitle line should end and the next begin.

Rules:
- Break at the end of sentences and at natural phrase boundaries.
- If the text ends where a sentence ends, finish with {BREAK_MARKER} as well.
- Keep each line under {cjk} characters for Chinese, Japanese or Korean text and under {other} words for other languages.
- Do not add, remove, translate or reorder any words. Keep the original spelling.
- Return ONLY the text with the {BREAK_MARKER} markers, nothing else."#,
            cjk = self.limits.cjk,
            other = self.limits.other,
        )
    }

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: Option<u32>,
        timeout: Duration,
    ) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: 0.1,
            max_tokens,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| SplitError::OracleUnavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SplitError::OracleUnavailable(format!("failed to read response: {}", e)))?;
        debug!("Oracle response status: {}", status);

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SplitError::OracleUnavailable(format!(
                "rate limited ({}): {}",
                status,
                truncate(&body, 300)
            )));
        }

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| truncate(&body, 300));
            return Err(SplitError::OracleUnavailable(format!(
                "API error ({}): {}",
                status, message
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            SplitError::OracleResponseInvalid(format!("undecodable completion: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| SplitError::OracleResponseInvalid("completion has no content".to_string()))
    }
}

#[async_trait]
impl BoundaryOracle for OpenAiOracle {
    async fn classify_boundaries(&self, batch: &Batch) -> Result<BoundaryDecision> {
        if batch.len() < 2 {
            return Ok(BoundaryDecision::normalized(batch, Vec::new()));
        }

        let messages = vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(batch.text()),
        ];
        let reply = self.complete(messages, None, self.timeout).await?;
        debug!(
            "Batch {} reply: {}",
            batch.index,
            truncate(&reply, 200)
        );

        parse_reply(batch, &reply)
    }

    async fn ping(&self) -> bool {
        let messages = vec![
            ChatMessage::system("You are a helpful assistant now.".to_string()),
            ChatMessage::user("Hello!".to_string()),
        ];

        match self.complete(messages, Some(100), PING_TIMEOUT).await {
            Ok(_) => true,
            Err(e) => {
                error!("Oracle connectivity check failed: {}", e);
                false
            }
        }
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Map a `<br>`-separated reply back onto the batch's tokens.
///
/// The reply must reproduce the batch text up to case, whitespace and
/// punctuation. Each break becomes a cut before the first token that starts at
/// or after the break's position; punctuation-only tokens stay with the
/// preceding segment.
pub fn parse_reply(batch: &Batch, reply: &str) -> Result<BoundaryDecision> {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    static BREAK: OnceLock<Regex> = OnceLock::new();
    let fence_re =
        FENCE.get_or_init(|| Regex::new(r"(?m)^```[a-zA-Z]*\s*$").expect("valid fence regex"));
    let break_re = BREAK.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("valid break regex"));

    let reply = fence_re.replace_all(reply, "");
    let segments: Vec<String> = break_re.split(&reply).map(normalize).collect();

    let token_lens: Vec<usize> = batch
        .tokens
        .iter()
        .map(|t| normalize(&t.text).chars().count())
        .collect();

    let source: String = batch.tokens.iter().map(|t| normalize(&t.text)).collect();
    let answer: String = segments.concat();
    if source != answer {
        return Err(SplitError::OracleResponseInvalid(format!(
            "reply for batch {} does not reproduce the input text",
            batch.index
        )));
    }

    let mut offsets = Vec::with_capacity(token_lens.len());
    let mut acc = 0usize;
    for len in &token_lens {
        offsets.push(acc);
        acc += len;
    }

    let mut cuts = Vec::new();
    let mut boundary = 0usize;
    for segment in &segments[..segments.len().saturating_sub(1)] {
        boundary += segment.chars().count();
        let local = offsets
            .iter()
            .zip(&token_lens)
            .position(|(&start, &len)| !(start < boundary || (len == 0 && start <= boundary)))
            .unwrap_or(token_lens.len());
        cuts.push(batch.start + local);
    }

    Ok(BoundaryDecision::normalized(batch, cuts))
}

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn system(content: String) -> Self {
        Self {
            role: "system",
            content,
        }
    }

    fn user(content: String) -> Self {
        Self {
            role: "user",
            content,
        }
    }
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}
