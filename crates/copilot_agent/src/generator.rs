//! Text generator abstraction.
//!
//! `OllamaGenerator` calls an Ollama-style `/api/generate` endpoint over
//! blocking HTTP. `FakeGenerator` replays scripted responses and records
//! every prompt it was given.

use crate::config::LlmConfig;
use copilot_shared::GenerationError;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Prompt in, raw completion text out
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Short label for trace and doctor output
    fn describe(&self) -> String {
        "text generator".to_string()
    }
}

/// HTTP client for an Ollama server
pub struct OllamaGenerator {
    config: LlmConfig,
    client: reqwest::blocking::Client,
}

impl OllamaGenerator {
    pub fn new(config: LlmConfig) -> Result<Self, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn map_send_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.config.timeout_secs)
        } else {
            GenerationError::Http(format!("Request failed: {}", e))
        }
    }

    /// Check the server answers and the configured model is pulled
    pub fn ping(&self) -> Result<bool, GenerationError> {
        let url = format!("{}/api/tags", self.config.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;
        if !response.status().is_success() {
            return Err(GenerationError::Http(format!("HTTP {} from Ollama", response.status())));
        }
        let body: serde_json::Value = response
            .json()
            .map_err(|e| GenerationError::Http(format!("Failed to parse response: {}", e)))?;
        let has_model = body
            .get("models")
            .and_then(|m| m.as_array())
            .map(|models| {
                models.iter().any(|m| {
                    m.get("name").and_then(|n| n.as_str()) == Some(self.config.model.as_str())
                })
            })
            .unwrap_or(false);
        Ok(has_model)
    }
}

impl TextGenerator for OllamaGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if !self.config.enabled {
            return Err(GenerationError::Disabled);
        }

        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        let request_body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "num_predict": self.config.num_predict,
            },
        });

        debug!("Generating with {} ({} byte prompt)", self.config.model, prompt.len());
        let response = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(GenerationError::Http(format!(
                "HTTP {} from Ollama",
                response.status()
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .map_err(|e| GenerationError::Http(format!("Failed to parse response: {}", e)))?;

        let text = response_json
            .get("response")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text.to_string())
    }

    fn describe(&self) -> String {
        format!("ollama {} at {}", self.config.model, self.config.endpoint)
    }
}

/// Scripted generator for tests
pub struct FakeGenerator {
    responses: Mutex<Vec<Result<String, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    /// Responses are returned in order; the last one repeats
    pub fn new(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn always_error(error: GenerationError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Generator that must not be called; any call fails with `Disabled`
    pub fn unused() -> Self {
        Self::always_error(GenerationError::Disabled)
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Every prompt received, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl TextGenerator for FakeGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let mut responses = match self.responses.lock() {
            Ok(r) => r,
            Err(poisoned) => poisoned.into_inner(),
        };
        match responses.len() {
            0 => Err(GenerationError::EmptyResponse),
            // Keep returning the same response
            1 => responses[0].clone(),
            _ => responses.remove(0),
        }
    }

    fn describe(&self) -> String {
        "fake generator".to_string()
    }
}
