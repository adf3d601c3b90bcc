use crate::digest::config::Credentials;
use crate::digest::util::truncate_with_ellipsis;
use crate::error::DigestError;
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde_json::{Value, json};
use std::fmt;
use std::time::Duration;

pub const TEMPERATURE: f64 = 0.3;
pub const MAX_OUTPUT_TOKENS: u32 = 4000;
const REQUEST_TIMEOUT_SECS: u64 = 300;
const ERROR_BODY_PREVIEW_CHARS: usize = 300;
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
}

impl LlmProvider {
    pub fn parse(raw: &str) -> Result<Self, DigestError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(DigestError::config(format!(
                "unsupported LLM provider: {other} (expected openai or anthropic)"
            ))),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-haiku-20240307",
        }
    }

    pub fn credential_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One chat completion: a system instruction plus one user message in, text out.
pub trait ChatBackend {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

pub struct OpenAiChat {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

pub struct AnthropicChat {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

fn build_client() -> Result<Client, DigestError> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|err| DigestError::config(format!("failed to build HTTP client: {err}")))
}

fn openai_payload(model: &str, system_prompt: &str, user_prompt: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system_prompt},
            {"role": "user", "content": user_prompt}
        ],
        "temperature": TEMPERATURE,
        "max_tokens": MAX_OUTPUT_TOKENS
    })
}

fn anthropic_payload(model: &str, system_prompt: &str, user_prompt: &str) -> Value {
    json!({
        "model": model,
        "system": system_prompt,
        "messages": [
            {"role": "user", "content": user_prompt}
        ],
        "temperature": TEMPERATURE,
        "max_tokens": MAX_OUTPUT_TOKENS
    })
}

fn extract_openai_text(json: &Value) -> Option<String> {
    let choices = json.get("choices").and_then(Value::as_array)?;
    let first = choices.first()?;
    let content = first.get("message")?.get("content")?;
    match content {
        Value::String(s) => Some(s.to_string()),
        Value::Array(parts) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            if texts.is_empty() {
                None
            } else {
                Some(texts.join("\n"))
            }
        }
        _ => None,
    }
}

fn extract_anthropic_text(json: &Value) -> Option<String> {
    let content = json.get("content").and_then(Value::as_array)?;
    let texts: Vec<&str> = content
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}

fn read_json(response: reqwest::blocking::Response, provider: LlmProvider) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        anyhow::bail!(
            "{provider} call failed with status {status}: {}",
            truncate_with_ellipsis(body.trim(), ERROR_BODY_PREVIEW_CHARS)
        );
    }
    response
        .json()
        .with_context(|| format!("{provider} response was not valid JSON"))
}

impl ChatBackend for OpenAiChat {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&openai_payload(&self.model, system_prompt, user_prompt))
            .send()
            .with_context(|| format!("openai request to {url} failed"))?;
        let json = read_json(response, LlmProvider::OpenAi)?;
        extract_openai_text(&json).context("openai response missing text content")
    }
}

impl ChatBackend for AnthropicChat {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&anthropic_payload(&self.model, system_prompt, user_prompt))
            .send()
            .with_context(|| format!("anthropic request to {url} failed"))?;
        let json = read_json(response, LlmProvider::Anthropic)?;
        extract_anthropic_text(&json).context("anthropic response missing text content")
    }
}

enum Backend {
    OpenAi(OpenAiChat),
    Anthropic(AnthropicChat),
}

/// The selected provider binding, fixed for the client's lifetime.
pub struct LlmClient {
    provider: LlmProvider,
    model: String,
    backend: Backend,
}

fn normalize_base(raw: Option<&String>, fallback: &str) -> String {
    raw.map(String::as_str)
        .unwrap_or(fallback)
        .trim_end_matches('/')
        .to_string()
}

impl LlmClient {
    /// Fails before any network activity when the provider is unknown or its key is missing.
    pub fn new(
        provider: &str,
        model: Option<&str>,
        credentials: &Credentials,
    ) -> Result<Self, DigestError> {
        let provider = LlmProvider::parse(provider)?;
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(provider.default_model())
            .to_string();

        let key = match provider {
            LlmProvider::OpenAi => credentials.openai_api_key.clone(),
            LlmProvider::Anthropic => credentials.anthropic_api_key.clone(),
        };
        let Some(api_key) = key else {
            return Err(DigestError::config(format!(
                "{} not set; required for provider {provider}",
                provider.credential_var()
            )));
        };

        let client = build_client()?;
        let backend = match provider {
            LlmProvider::OpenAi => Backend::OpenAi(OpenAiChat {
                client,
                api_key,
                model: model.clone(),
                base_url: normalize_base(
                    credentials.openai_base_url.as_ref(),
                    DEFAULT_OPENAI_BASE_URL,
                ),
            }),
            LlmProvider::Anthropic => Backend::Anthropic(AnthropicChat {
                client,
                api_key,
                model: model.clone(),
                base_url: normalize_base(
                    credentials.anthropic_base_url.as_ref(),
                    DEFAULT_ANTHROPIC_BASE_URL,
                ),
            }),
        };

        Ok(Self {
            provider,
            model,
            backend,
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ChatBackend for LlmClient {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        match &self.backend {
            Backend::OpenAi(chat) => chat.complete(system_prompt, user_prompt),
            Backend::Anthropic(chat) => chat.complete(system_prompt, user_prompt),
        }
    }
}
