//! Chat-completion backends.
//!
//! - **[`OpenAIChat`]**: `POST /v1/chat/completions`. The base URL is
//!   configurable, so any OpenAI-compatible server works.
//! - **[`OllamaChat`]**: `POST /api/chat` on a local Ollama instance.
//!
//! A response that parses but carries no text yields
//! `Completion { answer: None }`; the pipeline turns that into its fallback
//! answer instead of failing.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use textgpt_core::llm::{ChatMessage, ChatModel, Completion};

use crate::config::{Config, LlmConfig};
use crate::http;

const OPENAI_URL: &str = "https://api.openai.com";
const OLLAMA_URL: &str = "http://localhost:11434";

fn messages_json(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "role": m.role.as_api_role(),
                "content": m.content,
            })
        })
        .collect()
}

// ============ OpenAI ============

pub struct OpenAIChat {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_retries: u32,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config.url.clone().unwrap_or_else(|| OPENAI_URL.to_string()),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages_json(messages),
            "temperature": self.temperature,
        });
        let json = http::post_json(
            &self.client,
            &http::endpoint(&self.url, "/v1/chat/completions"),
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;
        Ok(parse_openai_completion(&json))
    }
}

/// `choices[0].message.content`, if present.
fn parse_openai_completion(json: &serde_json::Value) -> Completion {
    let answer = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string);
    Completion { answer }
}

// ============ Ollama ============

pub struct OllamaChat {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    max_retries: u32,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config.url.clone().unwrap_or_else(|| OLLAMA_URL.to_string()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages_json(messages),
            "stream": false,
            "options": { "temperature": self.temperature },
        });
        let json = http::post_json(
            &self.client,
            &http::endpoint(&self.url, "/api/chat"),
            None,
            &body,
            self.max_retries,
            "Ollama",
        )
        .await?;
        Ok(parse_ollama_completion(&json))
    }
}

/// `message.content`, if present.
fn parse_ollama_completion(json: &serde_json::Value) -> Completion {
    let answer = json
        .pointer("/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string);
    Completion { answer }
}

/// Create the [`ChatModel`] selected by `llm.provider`.
pub fn create_chat_model(config: &Config) -> Result<Arc<dyn ChatModel>> {
    match config.llm.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIChat::new(&config.llm, config.api_key()?)?)),
        "ollama" => Ok(Arc::new(OllamaChat::new(&config.llm)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_use_api_roles() {
        let json = messages_json(&[
            ChatMessage::system("ctx"),
            ChatMessage::human("q"),
            ChatMessage::ai("a"),
        ]);
        let roles: Vec<&str> = json.iter().map(|m| m["role"].as_str().unwrap()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
        assert_eq!(json[1]["content"], "q");
    }

    #[test]
    fn test_parse_openai_completion() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Paris."}}]
        });
        assert_eq!(parse_openai_completion(&json), Completion::text("Paris."));
    }

    #[test]
    fn test_openai_missing_answer_is_none() {
        let no_choices = serde_json::json!({"choices": []});
        assert_eq!(parse_openai_completion(&no_choices).answer, None);
        let null_content = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        });
        assert_eq!(parse_openai_completion(&null_content).answer, None);
    }

    #[test]
    fn test_parse_ollama_completion() {
        let json = serde_json::json!({"message": {"role": "assistant", "content": "Paris."}, "done": true});
        assert_eq!(parse_ollama_completion(&json), Completion::text("Paris."));
        assert_eq!(parse_ollama_completion(&serde_json::json!({"done": true})).answer, None);
    }

    #[test]
    fn test_create_ollama_chat_needs_no_key() {
        let config = crate::config::parse_config(
            "[llm]\nprovider = \"ollama\"\nmodel = \"llama3.2\"\n",
        )
        .unwrap();
        let chat = create_chat_model(&config).unwrap();
        assert_eq!(chat.model_name(), "llama3.2");
    }
}
