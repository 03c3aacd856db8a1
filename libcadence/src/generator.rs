//! Content generation through an OpenAI-compatible chat completions endpoint
//!
//! The processor only sees the [`ContentGenerator`] trait, so tests swap in
//! [`MockGenerator`] and never touch the network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::GeneratorConfig;
use crate::error::GenerationError;

/// Language tag that needs no explicit instruction in the system prompt
pub const DEFAULT_LANGUAGE: &str = "en";

/// Produces post text from a template prompt
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate post text for `prompt`, written in `language` when given
    ///
    /// Returned text is trimmed and never empty.
    async fn generate(
        &self,
        prompt: &str,
        language: Option<&str>,
    ) -> std::result::Result<String, GenerationError>;
}

/// System prompt sent ahead of the user's template text
pub fn system_prompt(language: Option<&str>) -> String {
    let mut prompt = String::from(
        "You are a creative social media content creator. Generate an engaging, \
         authentic post based on the user's comment. The post should be:\n\
         - Natural and conversational\n\
         - Around 150-300 characters\n\
         - Include relevant hashtags if appropriate\n\
         - Match the tone and intent of the original comment\n",
    );

    if let Some(language) = language
        .map(str::trim)
        .filter(|lang| !lang.is_empty() && !lang.eq_ignore_ascii_case(DEFAULT_LANGUAGE))
    {
        prompt.push_str(&format!("- Written in {}\n", language));
    }

    prompt.push_str(
        "Respond with the post text only. Do not add any introduction, explanation \
         or quotation marks around it.",
    );
    prompt
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Generator backed by a chat completions API
pub struct ChatCompletionGenerator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    api_key_env: String,
}

impl ChatCompletionGenerator {
    /// Build a generator, reading the API key from the configured env var
    ///
    /// A missing key is not an error here; every `generate` call fails with
    /// `MissingApiKey` instead, so schedules with overrides still publish.
    pub fn new(config: &GeneratorConfig) -> std::result::Result<Self, GenerationError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from);

        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(
        config: &GeneratorConfig,
        api_key: Option<SecretString>,
    ) -> std::result::Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GenerationError::Request(format!("Failed to build HTTP client: {}", e)))?;

        if api_key.is_none() {
            tracing::warn!(
                "{} is not set; schedules without content overrides will be skipped",
                config.api_key_env
            );
        }

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
        })
    }
}

#[async_trait]
impl ContentGenerator for ChatCompletionGenerator {
    async fn generate(
        &self,
        prompt: &str,
        language: Option<&str>,
    ) -> std::result::Result<String, GenerationError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| GenerationError::MissingApiKey(self.api_key_env.clone()))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt(language) },
                { "role": "user", "content": prompt },
            ],
        });

        tracing::debug!(model = %self.model, "Requesting generated content");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Request(format!("Malformed completion: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

/// Generator double for tests
///
/// Returns the configured outcome and records every prompt it receives.
#[derive(Clone)]
pub struct MockGenerator {
    outcome: std::result::Result<String, GenerationError>,
    prompts: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl MockGenerator {
    /// Always returns `text`
    pub fn returning(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always fails with an HTTP 500
    pub fn failing() -> Self {
        Self {
            outcome: Err(GenerationError::Api {
                status: 500,
                body: "mock generator failure".to_string(),
            }),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// `(prompt, language)` pairs in call order
    pub fn prompts(&self) -> Vec<(String, Option<String>)> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    async fn generate(
        &self,
        prompt: &str,
        language: Option<&str>,
    ) -> std::result::Result<String, GenerationError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((prompt.to_string(), language.map(str::to_string)));
        }
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_default_language_has_no_instruction() {
        let prompt = system_prompt(Some("en"));
        assert!(!prompt.contains("Written in"));
        assert!(prompt.contains("150-300 characters"));
        assert!(prompt.contains("post text only"));

        assert!(!system_prompt(None).contains("Written in"));
        assert!(!system_prompt(Some("  ")).contains("Written in"));
    }

    #[test]
    fn test_system_prompt_requests_other_language() {
        let prompt = system_prompt(Some("es"));
        assert!(prompt.contains("- Written in es"));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_each_call() {
        let generator =
            ChatCompletionGenerator::with_api_key(&GeneratorConfig::default(), None).unwrap();

        let err = generator.generate("Rust tips", None).await.unwrap_err();
        assert_eq!(
            err,
            GenerationError::MissingApiKey("CADENCE_GENERATOR_API_KEY".to_string())
        );
    }

    #[tokio::test]
    async fn test_mock_generator_records_prompts() {
        let generator = MockGenerator::returning("Hello #world");

        let text = generator.generate("greet people", Some("fr")).await.unwrap();

        assert_eq!(text, "Hello #world");
        assert_eq!(generator.call_count(), 1);
        assert_eq!(
            generator.prompts(),
            vec![("greet people".to_string(), Some("fr".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_failing_mock_generator() {
        let generator = MockGenerator::failing();
        assert!(generator.generate("anything", None).await.is_err());
        assert_eq!(generator.call_count(), 1);
    }
}
