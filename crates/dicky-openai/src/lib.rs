//! OpenAI adapter (Responses API).
//!
//! Implements the `dicky-core` completion port over `POST /v1/responses`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use dicky_core::{
    completion::{CompletionClient, CompletionRequest},
    config::Config,
    errors::Error,
    Result,
};

#[derive(Clone, Debug)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: &'a str,
    max_output_tokens: u32,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            cfg.openai_api_key.clone(),
            cfg.openai_base_url.clone(),
            cfg.openai_timeout,
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, req: CompletionRequest) -> Result<String> {
        let body = ResponsesRequest {
            model: &req.model,
            instructions: &req.instructions,
            input: &req.input,
            max_output_tokens: req.max_output_tokens,
        };

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Http(format!("openai request error: {e}")))?;

        let status = resp.status();
        let raw = resp
            .text()
            .await
            .map_err(|e| Error::Http(format!("openai response read error: {e}")))?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: api_error_message(&raw),
            });
        }

        let v: serde_json::Value = serde_json::from_str(&raw)?;
        let text = extract_output_text(&v);
        debug!(model = %req.model, chars = text.chars().count(), "completion received");
        Ok(text)
    }
}

/// Pull the answer text out of a Responses API payload.
///
/// Prefers the top-level `output_text`; otherwise joins every `output_text`
/// content part of the `output` items. Missing text is an empty answer.
fn extract_output_text(v: &serde_json::Value) -> String {
    if let Some(t) = v.get("output_text").and_then(|t| t.as_str()) {
        return t.trim().to_string();
    }

    let Some(items) = v.get("output").and_then(|o| o.as_array()) else {
        return String::new();
    };

    let mut out = String::new();
    for part in items
        .iter()
        .filter_map(|item| item.get("content").and_then(|c| c.as_array()))
        .flatten()
    {
        if part.get("type").and_then(|t| t.as_str()) != Some("output_text") {
            continue;
        }
        if let Some(t) = part.get("text").and_then(|t| t.as_str()) {
            out.push_str(t);
        }
    }
    out.trim().to_string()
}

fn api_error_message(raw: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
        });

    match from_json {
        Some(m) if !m.trim().is_empty() => m,
        _ => raw.chars().take(200).collect(),
    }
}
