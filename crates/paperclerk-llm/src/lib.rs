//! Paperclerk Model Backends
//!
//! Implementations of the `ModelBackend` trait from `paperclerk-domain`.
//!
//! # Backends
//!
//! - `MockBackend`: Deterministic, scriptable backend for tests
//! - `OllamaBackend`: Local Ollama API integration
//!
//! # Examples
//!
//! ```
//! use paperclerk_llm::MockBackend;
//! use paperclerk_domain::traits::ModelBackend;
//!
//! let backend = MockBackend::new(r#"{"label": "Invoices", "confidence": 0.9}"#);
//! let raw = backend.infer("any-model", "prompt").unwrap();
//! assert!(raw.contains("Invoices"));
//! ```

#![warn(missing_docs)]

pub mod ollama;

use paperclerk_domain::traits::ModelBackend;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

pub use ollama::OllamaBackend;

/// Errors that can occur during model calls
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Response envelope could not be read
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Model not available on the backend
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(String),
    Fail,
}

/// Mock backend for deterministic testing
///
/// Responses are scripted per model identifier, so a test can make the cheap
/// model hesitate and the strong model answer confidently.
///
/// # Examples
///
/// ```
/// use paperclerk_llm::MockBackend;
/// use paperclerk_domain::traits::ModelBackend;
///
/// let mut backend = MockBackend::default();
/// backend.add_response("small", "first");
/// backend.add_response("large", "second");
/// assert_eq!(backend.infer("small", "p").unwrap(), "first");
/// assert_eq!(backend.infer("large", "p").unwrap(), "second");
/// assert_eq!(backend.calls_for("small"), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockBackend {
    default_response: String,
    scripts: Arc<Mutex<HashMap<String, Scripted>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockBackend {
    /// Create a MockBackend with a fixed response for every model
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            scripts: Arc::new(Mutex::new(HashMap::new())),
            delays: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script the response of a specific model
    pub fn add_response(&mut self, model: impl Into<String>, response: impl Into<String>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(model.into(), Scripted::Respond(response.into()));
    }

    /// Make a specific model fail with a communication error
    pub fn add_error(&mut self, model: impl Into<String>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(model.into(), Scripted::Fail);
    }

    /// Make a specific model sleep before answering (for timeout tests)
    pub fn add_delay(&mut self, model: impl Into<String>, delay: Duration) {
        self.delays.lock().unwrap().insert(model.into(), delay);
    }

    /// Total number of calls across all models
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of calls made to one model
    pub fn calls_for(&self, model: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == model)
            .count()
    }

    /// Prompts received, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, p)| p.clone())
            .collect()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(r#"{"label": "unclear", "confidence": 0.0}"#)
    }
}

impl ModelBackend for MockBackend {
    type Error = LlmError;

    fn infer(&self, model: &str, prompt: &str) -> Result<String, Self::Error> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), prompt.to_string()));

        let delay = self.delays.lock().unwrap().get(model).copied();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let scripted = self.scripts.lock().unwrap().get(model).cloned();
        match scripted {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail) => Err(LlmError::Communication(format!(
                "mock failure for model {}",
                model
            ))),
            None => Ok(self.default_response.clone()),
        }
    }
}
