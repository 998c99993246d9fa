//! Extraction oracle client
//!
//! The oracle is an opaque text-understanding service: it receives up to one
//! batch of `{identity, body}` pairs inside a fixed instruction and answers
//! in free text. Only the answer markers parsed by
//! [`answer_parser`](crate::services::answer_parser) are relied on.
//!
//! [`ChatCompletionOracle`] talks to an OpenAI-compatible
//! `/chat/completions` endpoint. Tests substitute their own
//! [`ExtractionOracle`] implementations.

use async_trait::async_trait;
use coachlink_common::config::OracleConfig;
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

use crate::services::answer_parser::{ANSWER_MARKER, IDENTITY_MARKER, SOURCE_MARKER, UNRECOGNIZED};

const USER_AGENT: &str = concat!("coachlink-addr/", env!("CARGO_PKG_VERSION"));

/// Fixed system preamble
pub const SYSTEM_PREAMBLE: &str =
    "你是一名收货地址信息抽取助手，只根据用户提供的聊天消息提取收货地址，不编造任何信息。";

/// One message handed to the oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleInput {
    pub identity: String,
    pub body: String,
}

/// Extraction oracle errors. All of them are transient from the batch
/// runner's point of view.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Oracle call timed out")]
    Timeout,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Oracle returned no answer text")]
    EmptyResponse,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Text-understanding function extracting addresses from chat messages
#[async_trait]
pub trait ExtractionOracle: Send + Sync {
    /// Oracle name for logging
    fn name(&self) -> &'static str;

    /// Extract addresses from one batch, returning the raw answer text
    async fn extract(&self, batch: &[OracleInput]) -> Result<String, OracleError>;
}

/// Build the per-batch user instruction
pub fn build_instruction(batch: &[OracleInput]) -> String {
    let mut instruction = format!(
        "请从下面的聊天消息中识别收货地址。每条消息输出一行，格式严格为：\n\
         {IDENTITY_MARKER} <用户标识> | {ANSWER_MARKER} <省-市-区县-详细地址> {SOURCE_MARKER} <消息原文>)\n\
         地址各级之间用\"-\"连接，不要输出姓名和电话。无法识别地址时，地址分析结果填写\"{UNRECOGNIZED}\"。\n\n\
         消息列表：\n"
    );
    for (index, input) in batch.iter().enumerate() {
        let body = input.body.replace(['\r', '\n'], " ");
        instruction.push_str(&format!(
            "{}. {} {} | 消息: {}\n",
            index + 1,
            IDENTITY_MARKER,
            input.identity,
            body
        ));
    }
    instruction
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions oracle
pub struct ChatCompletionOracle {
    http_client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl ChatCompletionOracle {
    pub fn new(config: &OracleConfig, api_key: String) -> Result<Self, OracleError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| OracleError::NetworkError(e.to_string()))?;

        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            url: format!("{}/chat/completions", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            rate_limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ExtractionOracle for ChatCompletionOracle {
    fn name(&self) -> &'static str {
        "chat-completions"
    }

    async fn extract(&self, batch: &[OracleInput]) -> Result<String, OracleError> {
        self.rate_limiter.until_ready().await;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatRequestMessage {
                    role: "system",
                    content: SYSTEM_PREAMBLE.to_string(),
                },
                ChatRequestMessage {
                    role: "user",
                    content: build_instruction(batch),
                },
            ],
            temperature: 0.0,
        };

        tracing::debug!(
            model = %self.model,
            batch_size = batch.len(),
            "Querying extraction oracle"
        );

        let response = self
            .http_client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout
                } else {
                    OracleError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == 401 {
            return Err(OracleError::InvalidApiKey);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OracleError::ApiError(status.as_u16(), error_text));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::ParseError(e.to_string())
            }
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(OracleError::EmptyResponse)
    }
}
