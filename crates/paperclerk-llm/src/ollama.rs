//! Ollama Backend Implementation
//!
//! Talks to a local Ollama instance so documents never leave the machine.
//!
//! # Features
//!
//! - JSON mode (`"format": "json"`) with a fixed temperature
//! - Per-request timeout
//! - Retry with exponential backoff on transport errors
//!
//! Calls are blocking. The pipeline runs them on tokio's blocking pool under
//! its own stage timeout, so the HTTP client is built per call on that thread.
//!
//! # Examples
//!
//! ```no_run
//! use paperclerk_llm::OllamaBackend;
//! use paperclerk_domain::traits::ModelBackend;
//!
//! let backend = OllamaBackend::new("http://localhost:11434");
//! let raw = backend.infer("qwen2.5:1.5b-instruct", "Classify this").unwrap();
//! ```

use crate::LlmError;
use paperclerk_domain::traits::ModelBackend;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default timeout for a single HTTP request (90 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Default number of attempts per call
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Ollama API backend for local inference
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    endpoint: String,
    timeout: Duration,
    temperature: f64,
    max_retries: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'static str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f64,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaBackend {
    /// Create a new Ollama backend for the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            temperature: 0.0,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Create a backend for `http://localhost:11434`
    pub fn default_endpoint() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the maximum number of attempts per call (at least one)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Endpoint this backend talks to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.endpoint);
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| LlmError::Communication(format!("Client setup failed: {}", e)))?;

        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_retries {
            match client.post(&url).json(&body).send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<GenerateResponse>()
                            .map(|r| r.response.trim().to_string())
                            .map_err(|e| {
                                LlmError::InvalidResponse(format!("Failed to parse response: {}", e))
                            });
                    }
                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(LlmError::ModelNotAvailable(model.to_string()));
                    }
                    let text = response
                        .text()
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    last_error = Some(LlmError::Communication(format!("HTTP {}: {}", status, text)));
                }
                Err(e) => {
                    last_error = Some(LlmError::Communication(format!("Request failed: {}", e)));
                }
            }

            attempts += 1;
            if attempts < self.max_retries {
                let delay = Duration::from_secs(2u64.pow(attempts - 1));
                warn!(model, attempt = attempts, "Ollama call failed, retrying in {:?}", delay);
                std::thread::sleep(delay);
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
    }
}

impl ModelBackend for OllamaBackend {
    type Error = LlmError;

    fn infer(&self, model: &str, prompt: &str) -> Result<String, Self::Error> {
        debug!(model, prompt_len = prompt.len(), "Calling Ollama");
        self.generate(model, prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_backend_creation() {
        let backend = OllamaBackend::new("http://localhost:11434/");
        assert_eq!(backend.endpoint(), "http://localhost:11434");
        assert_eq!(backend.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(backend.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_ollama_backend_builders() {
        let backend = OllamaBackend::default_endpoint()
            .with_timeout(Duration::from_secs(5))
            .with_temperature(0.2)
            .with_max_retries(0);
        assert_eq!(backend.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(backend.timeout, Duration::from_secs(5));
        assert_eq!(backend.temperature, 0.2);
        assert_eq!(backend.max_retries, 1);
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateRequest {
            model: "m",
            prompt: "p",
            stream: false,
            format: "json",
            options: GenerateOptions { temperature: 0.0 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["format"], "json");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["temperature"], 0.0);
    }

    #[test]
    fn test_ollama_error_handling() {
        // Port 9 (discard) is not an HTTP server
        let backend = OllamaBackend::new("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2))
            .with_max_retries(1);

        let result = backend.infer("llama", "test");
        assert!(matches!(result, Err(LlmError::Communication(_))));
    }

    #[test]
    #[ignore] // Only run when Ollama is available
    fn test_ollama_infer_integration() {
        let backend = OllamaBackend::default_endpoint();
        let result = backend.infer("qwen2.5:1.5b-instruct", "Reply with {\"ok\": true}");
        if let Ok(response) = result {
            assert!(!response.is_empty());
        }
    }
}
