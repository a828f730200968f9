//! AI adapter: provider abstraction for the external generative model.
//!
//! A provider turns `(system, user)` prompt text into the raw completion text.
//! Parsing and validation of that text belong to the arbitrator; every failure
//! here is an `ArbitrationError`, which the pipeline answers with the fallback.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ai::AiConfig;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const OPENAI_CHAT_PATH: &str = "/v1/chat/completions";
const ANTHROPIC_MESSAGES_PATH: &str = "/v1/messages";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-latest";

const USER_AGENT: &str = "headline-curator/0.1";

#[derive(Debug, thiserror::Error)]
pub enum ArbitrationError {
    #[error("model arbitration disabled")]
    Disabled,
    #[error("missing API key for {0}")]
    MissingApiKey(&'static str),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("model call timed out")]
    Timeout,
    #[error("model returned an empty completion")]
    EmptyCompletion,
    #[error("response is not valid selection JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no valid selections in model response")]
    NoValidSelections,
}

impl From<reqwest::Error> for ArbitrationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ArbitrationError::Timeout
        } else {
            ArbitrationError::Transport(e.to_string())
        }
    }
}

pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, ArbitrationError>> + Send + 'a>>;

/// Low-level provider: one remote completion call.
pub trait CompletionProvider: Send + Sync {
    fn complete<'a>(&'a self, system: &'a str, user: &'a str) -> CompletionFuture<'a>;
    /// Provider name for diagnostics/metadata.
    fn name(&self) -> &'static str;
}

pub type DynProvider = Arc<dyn CompletionProvider>;

/// Factory: build a provider according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock provider.
/// * Else if `config.enabled == false`, returns a disabled provider.
/// * Else builds the real provider for `config.provider`.
pub fn build_provider(config: &AiConfig) -> DynProvider {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockProvider::selecting(&[0, 1, 2, 3, 4]));
    }

    if !config.enabled {
        return Arc::new(DisabledProvider);
    }

    let built: anyhow::Result<DynProvider> = match config.provider.as_str() {
        "openai" => OpenAiProvider::new(config).map(|p| Arc::new(p) as DynProvider),
        "anthropic" => AnthropicProvider::new(config).map(|p| Arc::new(p) as DynProvider),
        other => Err(anyhow::anyhow!("unsupported provider `{other}`")),
    };
    built.unwrap_or_else(|e| {
        warn!(error = %e, "model provider unavailable; arbitration disabled");
        Arc::new(DisabledProvider)
    })
}

fn http_client(config: &AiConfig) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .timeout(Duration::from_millis(config.timeout_ms))
        .build()?)
}

fn endpoint(config: &AiConfig, default_base: &str, path: &str) -> String {
    format!("{}{path}", config.base_url.as_deref().unwrap_or(default_base))
}

fn model_or(config: &AiConfig, default: &str) -> String {
    let m = config.model.trim();
    if m.is_empty() {
        default.to_string()
    } else {
        m.to_string()
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, ArbitrationError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ArbitrationError::HttpStatus {
        status: status.as_u16(),
        body: body.chars().take(300).collect(),
    })
}

// ------------------------------------------------------------
// OpenAI (Chat Completions, JSON mode)
// ------------------------------------------------------------

pub struct OpenAiProvider {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(config: &AiConfig) -> anyhow::Result<Self> {
        let api_key = if config.api_key.trim().is_empty() {
            std::env::var("OPENAI_API_KEY").unwrap_or_default()
        } else {
            config.api_key.clone()
        };
        Ok(Self {
            http: http_client(config)?,
            url: endpoint(config, OPENAI_BASE_URL, OPENAI_CHAT_PATH),
            api_key,
            model: model_or(config, DEFAULT_OPENAI_MODEL),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

impl CompletionProvider for OpenAiProvider {
    fn complete<'a>(&'a self, system: &'a str, user: &'a str) -> CompletionFuture<'a> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(ArbitrationError::MissingApiKey("openai"));
            }

            #[derive(Serialize)]
            struct Msg<'m> {
                role: &'m str,
                content: &'m str,
            }
            #[derive(Serialize)]
            struct ResponseFormat {
                #[serde(rename = "type")]
                kind: &'static str,
            }
            #[derive(Serialize)]
            struct Req<'m> {
                model: &'m str,
                messages: Vec<Msg<'m>>,
                temperature: f32,
                max_tokens: u32,
                response_format: ResponseFormat,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                #[serde(default)]
                content: Option<String>,
            }

            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: system,
                    },
                    Msg {
                        role: "user",
                        content: user,
                    },
                ],
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                response_format: ResponseFormat {
                    kind: "json_object",
                },
            };

            let resp = self
                .http
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await?;
            let resp = ensure_success(resp).await?;
            let body: Resp = resp.json().await?;

            let content = body
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default();
            if content.trim().is_empty() {
                return Err(ArbitrationError::EmptyCompletion);
            }
            Ok(content)
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Anthropic (Messages API)
// ------------------------------------------------------------

pub struct AnthropicProvider {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicProvider {
    pub fn new(config: &AiConfig) -> anyhow::Result<Self> {
        let api_key = if config.api_key.trim().is_empty() {
            std::env::var("ANTHROPIC_API_KEY").unwrap_or_default()
        } else {
            config.api_key.clone()
        };
        Ok(Self {
            http: http_client(config)?,
            url: endpoint(config, ANTHROPIC_BASE_URL, ANTHROPIC_MESSAGES_PATH),
            api_key,
            model: model_or(config, DEFAULT_ANTHROPIC_MODEL),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

impl CompletionProvider for AnthropicProvider {
    fn complete<'a>(&'a self, system: &'a str, user: &'a str) -> CompletionFuture<'a> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(ArbitrationError::MissingApiKey("anthropic"));
            }

            #[derive(Serialize)]
            struct Msg<'m> {
                role: &'m str,
                content: &'m str,
            }
            #[derive(Serialize)]
            struct Req<'m> {
                model: &'m str,
                max_tokens: u32,
                temperature: f32,
                system: &'m str,
                messages: Vec<Msg<'m>>,
            }
            #[derive(Deserialize)]
            struct Resp {
                #[serde(default)]
                content: Vec<Block>,
            }
            #[derive(Deserialize)]
            struct Block {
                #[serde(rename = "type")]
                kind: String,
                #[serde(default)]
                text: Option<String>,
            }

            let req = Req {
                model: &self.model,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                system,
                messages: vec![Msg {
                    role: "user",
                    content: user,
                }],
            };

            let resp = self
                .http
                .post(&self.url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&req)
                .send()
                .await?;
            let resp = ensure_success(resp).await?;
            let body: Resp = resp.json().await?;

            let text = body
                .content
                .into_iter()
                .filter(|b| b.kind == "text")
                .find_map(|b| b.text)
                .unwrap_or_default();
            if text.trim().is_empty() {
                return Err(ArbitrationError::EmptyCompletion);
            }
            Ok(text)
        })
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

// ------------------------------------------------------------
// Disabled + mock
// ------------------------------------------------------------

/// Always fails with `Disabled`; used when AI is off.
pub struct DisabledProvider;

impl CompletionProvider for DisabledProvider {
    fn complete<'a>(&'a self, _system: &'a str, _user: &'a str) -> CompletionFuture<'a> {
        Box::pin(async { Err(ArbitrationError::Disabled) })
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Returns a fixed completion text; for tests and local runs.
#[derive(Clone)]
pub struct MockProvider {
    pub fixed: String,
}

impl MockProvider {
    pub fn new(fixed: impl Into<String>) -> Self {
        Self {
            fixed: fixed.into(),
        }
    }

    /// A well-formed response picking the given indices.
    pub fn selecting(indices: &[i64]) -> Self {
        let selections: Vec<_> = indices
            .iter()
            .map(|i| serde_json::json!({ "index": i }))
            .collect();
        let body = serde_json::json!({
            "selections": selections,
            "rationale": "Mock selection (deterministic)."
        });
        Self::new(body.to_string())
    }
}

impl CompletionProvider for MockProvider {
    fn complete<'a>(&'a self, _system: &'a str, _user: &'a str) -> CompletionFuture<'a> {
        let out = self.fixed.clone();
        Box::pin(async move { Ok(out) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}
