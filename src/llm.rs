//! OpenAI chat completions client.
//!
//! Implements [`ChatModel`] over `POST {base_url}/v1/chat/completions`.
//! One attempt per call: failures surface to the caller, who may resubmit.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use tinypilot_core::generator::ChatModel;

use crate::config::{LlmConfig, OPENAI_API_KEY_ENV};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAIChat {
    client: reqwest::Client,
    model: String,
    url: String,
    api_key: String,
}

impl OpenAIChat {
    /// Build the client. Fails when no API key was resolved at startup.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("{} environment variable is not set", OPENAI_API_KEY_ENV))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            model: config.model.clone(),
            url: format!(
                "{}/v1/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            api_key,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let req = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
        };

        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "chat completion");

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("Failed to call the OpenAI chat API")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("OpenAI chat API returned {}: {}", status, body);
        }

        let body: ChatResponse = resp.json().await?;
        parse_answer(body)
    }
}

fn parse_answer(body: ChatResponse) -> Result<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| anyhow::anyhow!("OpenAI chat API returned no content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_api_key() {
        let cfg = LlmConfig::default();
        let err = OpenAIChat::new(&cfg).err().unwrap();
        assert!(err.to_string().contains(OPENAI_API_KEY_ENV));
    }

    #[test]
    fn test_new_builds_url() {
        let cfg = LlmConfig {
            base_url: "http://localhost:8080/".to_string(),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let chat = OpenAIChat::new(&cfg).unwrap();
        assert_eq!(chat.url, "http://localhost:8080/v1/chat/completions");
        assert_eq!(chat.model_name(), "gpt-4o-mini-2024-07-18");
    }

    #[test]
    fn test_request_shape() {
        let req = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.0,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_parse_answer() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"42"}}]}"#,
        )
        .unwrap();
        assert_eq!(parse_answer(body).unwrap(), "42");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(parse_answer(empty).is_err());
    }
}
