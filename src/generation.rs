use async_trait::async_trait;
use log::debug;

use crate::{Error, Result};

/// A text-generation backend: prompt in, free text out
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

const GEMINI: &str = "gemini";
const OPENAI: &str = "openai";
const ANTHROPIC: &str = "anthropic";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAi,
    Anthropic,
}

impl Provider {
    pub fn for_model(model: &str) -> Self {
        if model.starts_with("claude") {
            Provider::Anthropic
        } else if model.starts_with("gemini") {
            Provider::Gemini
        } else {
            Provider::OpenAi
        }
    }

    pub fn env_var(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// Build the generator for a model name, reading its API key from the environment.
pub fn generator_for_model(client: reqwest::Client, model: &str) -> Result<Box<dyn TextGenerator>> {
    let provider = Provider::for_model(model);
    let api_key = std::env::var(provider.env_var()).map_err(|_| {
        Error::Config(format!(
            "{} environment variable not set (required for model {model})",
            provider.env_var()
        ))
    })?;
    debug!("Using {provider:?} generator with model {model}");

    let model = model.to_string();
    let generator: Box<dyn TextGenerator> = match provider {
        Provider::Gemini => Box::new(GeminiGenerator { client, api_key, model }),
        Provider::OpenAi => Box::new(OpenAiGenerator { client, api_key, model }),
        Provider::Anthropic => Box::new(AnthropicGenerator { client, api_key, model }),
    };
    Ok(generator)
}

async fn post_json(service: &'static str, request: reqwest::RequestBuilder, body: &serde_json::Value) -> Result<serde_json::Value> {
    let resp = request
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| Error::from_reqwest(service, e))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::http_status(service, status, body));
    }

    resp.json().await.map_err(|e| {
        if e.is_decode() {
            Error::parse("response body", format!("{service}: {e}"))
        } else {
            Error::from_reqwest(service, e)
        }
    })
}

pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let body = serde_json::json!({
            "contents": [{
                "parts": [{"text": prompt}]
            }]
        });
        let request = self.client.post(&url).header("x-goog-api-key", &self.api_key);
        let json = post_json(GEMINI, request, &body).await?;
        extract_gemini_text(&json)
    }
}

fn extract_gemini_text(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array());
    if let Some(parts) = parts {
        let text: String = parts.iter().filter_map(|p| p.get("text")?.as_str()).collect();
        if !text.is_empty() {
            return Ok(text);
        }
    }
    Err(Error::parse("Gemini response", "no text in candidates"))
}

pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });
        let request = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key);
        let json = post_json(OPENAI, request, &body).await?;
        extract_openai_text(&json)
    }
}

fn extract_openai_text(json: &serde_json::Value) -> Result<String> {
    if let Some(text) = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
    {
        return Ok(text.to_string());
    }
    Err(Error::parse("OpenAI response", "no message content"))
}

pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 4096,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });
        let request = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01");
        let json = post_json(ANTHROPIC, request, &body).await?;
        extract_anthropic_text(&json)
    }
}

fn extract_anthropic_text(json: &serde_json::Value) -> Result<String> {
    if let Some(content) = json.get("content").and_then(|c| c.as_array()) {
        let text: String = content
            .iter()
            .filter_map(|block| {
                if block.get("type")?.as_str()? == "text" {
                    block.get("text")?.as_str().map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");
        if !text.is_empty() {
            return Ok(text);
        }
    }
    Err(Error::parse("Anthropic response", "no text blocks"))
}
