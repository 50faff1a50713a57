//! Paperclerk Staged Classifier
//!
//! Decides the sender label of a document with a cheap model first and a
//! stronger model only when the cheap one is not confident enough.
//!
//! # Architecture
//!
//! ```text
//! text + hints → PromptBuilder → ModelBackend (stage 1) → parse_response
//!                                      │ confidence < escalation threshold
//!                                      ▼
//!                               ModelBackend (stage 2) → parse_response
//!                                      │
//!                                      ▼
//!                 final confidence < acceptance threshold ⇒ "unclear"
//! ```
//!
//! Model calls run on tokio's blocking pool under a per-call timeout. A stage
//! that times out, errors or answers with something unparsable is recorded
//! as a `StageFailure` and contributes zero confidence.
//!
//! # Example Usage
//!
//! ```no_run
//! use paperclerk_classifier::{ClassificationHints, ClassifierConfig, StagedClassifier};
//! use paperclerk_llm::OllamaBackend;
//!
//! # async fn example() {
//! let classifier = StagedClassifier::new(
//!     OllamaBackend::default_endpoint(),
//!     ClassifierConfig::default(),
//! );
//! let decision = classifier
//!     .classify("Rechnung Nr. 4711 ...", &ClassificationHints::default())
//!     .await;
//! println!("{} ({})", decision.label, decision.confidence);
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
pub mod parser;
pub mod prompt;
mod staged;

pub use config::ClassifierConfig;
pub use error::ClassificationAttemptError;
pub use parser::{parse_response, ParsedResponse};
pub use prompt::PromptBuilder;
pub use staged::{finalize, ClassificationHints, StagedClassifier};
