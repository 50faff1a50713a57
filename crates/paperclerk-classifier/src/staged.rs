//! Staged classification: cheap model first, one escalation at most

use crate::config::ClassifierConfig;
use crate::error::ClassificationAttemptError;
use crate::parser::{parse_response, ParsedResponse};
use crate::prompt::{excerpt, PromptBuilder};
use paperclerk_domain::traits::ModelBackend;
use paperclerk_domain::{
    ClassificationAttempt, ClassificationDecision, Confidence, Label, Stage, StageFailure,
    UnclearReason,
};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Metadata hints passed to the model alongside the text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationHints {
    /// Canonical sender names the archive already knows
    pub known_labels: Vec<String>,
    /// Folder names that already exist in the archive
    pub existing_folders: Vec<String>,
}

/// Outcome of running one stage
type StageOutcome = Result<ClassificationAttempt, (ClassificationAttemptError, Option<String>)>;

/// The Staged Classifier
///
/// Stage 1 runs the cheap model. If its confidence is below the escalation
/// threshold (or it failed), stage 2 runs the strong model and its result is
/// final, whatever its confidence. There is no third stage.
pub struct StagedClassifier<B>
where
    B: ModelBackend,
{
    backend: Arc<B>,
    config: ClassifierConfig,
}

impl<B> StagedClassifier<B>
where
    B: ModelBackend + Send + Sync + 'static,
    B::Error: std::fmt::Display,
{
    /// Create a new classifier
    pub fn new(backend: B, config: ClassifierConfig) -> Self {
        Self::with_shared_backend(Arc::new(backend), config)
    }

    /// Create a classifier over a backend shared with other components
    pub fn with_shared_backend(backend: Arc<B>, config: ClassifierConfig) -> Self {
        Self { backend, config }
    }

    /// Get the configuration
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify a document's text
    ///
    /// Never fails: every failure mode ends in an unclear decision.
    pub async fn classify(&self, text: &str, hints: &ClassificationHints) -> ClassificationDecision {
        let mut attempts = Vec::new();
        let mut failures = Vec::new();

        let first = self.run_stage(Stage::Cheap, text, hints).await;
        let escalate = match &first {
            Ok(attempt) => !attempt.confidence.meets(self.config.escalation_threshold),
            Err(_) => true,
        };
        record(first, Stage::Cheap, &self.config.stage1_model, &mut attempts, &mut failures);

        if escalate {
            debug!(threshold = self.config.escalation_threshold, "Escalating to stage 2");
            let second = self.run_stage(Stage::Escalated, text, hints).await;
            record(second, Stage::Escalated, &self.config.stage2_model, &mut attempts, &mut failures);
        }

        let decision = finalize(attempts, failures, escalate, self.config.acceptance_threshold);
        info!(
            label = %decision.label,
            confidence = %decision.confidence,
            stages = decision.attempts.len() + decision.failures.len(),
            "Classified document"
        );
        decision
    }

    async fn run_stage(&self, stage: Stage, text: &str, hints: &ClassificationHints) -> StageOutcome {
        let (model, max_chars) = match stage {
            Stage::Cheap => (&self.config.stage1_model, self.config.excerpt_chars),
            Stage::Escalated => (&self.config.stage2_model, self.config.escalated_excerpt_chars),
        };
        let excerpt = excerpt(text, max_chars).to_string();
        let prompt = PromptBuilder::new(excerpt.clone())
            .with_known_labels(&hints.known_labels)
            .with_existing_folders(&hints.existing_folders)
            .with_max_hints(self.config.max_label_hints)
            .build();

        let raw = self.call_model(model, prompt).await.map_err(|e| (e, None))?;

        match parse_response(&raw) {
            ParsedResponse::Label { label, confidence } => {
                debug!(%stage, model = model.as_str(), %confidence, label = label.as_str(), "Stage answered");
                Ok(ClassificationAttempt {
                    stage,
                    model: model.clone(),
                    excerpt,
                    raw_response: raw,
                    label,
                    confidence,
                })
            }
            ParsedResponse::ParseError(reason) => {
                Err((ClassificationAttemptError::Malformed(reason), Some(raw)))
            }
        }
    }

    /// Call the backend on the blocking pool, bounded by the model timeout
    async fn call_model(&self, model: &str, prompt: String) -> Result<String, ClassificationAttemptError> {
        let backend = Arc::clone(&self.backend);
        let model_id = model.to_string();

        let task = tokio::task::spawn_blocking(move || {
            backend
                .infer(&model_id, &prompt)
                .map_err(|e| ClassificationAttemptError::Backend(e.to_string()))
        });

        timeout(self.config.model_timeout(), task)
            .await
            .map_err(|_| ClassificationAttemptError::Timeout(self.config.model_timeout_secs))?
            .map_err(|e| ClassificationAttemptError::Backend(format!("Task join error: {}", e)))?
    }
}

fn record(
    outcome: StageOutcome,
    stage: Stage,
    model: &str,
    attempts: &mut Vec<ClassificationAttempt>,
    failures: &mut Vec<StageFailure>,
) {
    match outcome {
        Ok(attempt) => attempts.push(attempt),
        Err((error, raw_response)) => {
            warn!(%stage, model, error = %error, "Classification stage failed");
            failures.push(StageFailure {
                stage,
                model: model.to_string(),
                reason: error.to_string(),
                raw_response,
            });
        }
    }
}

/// Turn the stage results into the final decision
///
/// The escalated attempt supersedes the cheap one whenever escalation ran,
/// even with lower confidence. A missing final attempt counts as zero
/// confidence.
pub fn finalize(
    attempts: Vec<ClassificationAttempt>,
    failures: Vec<StageFailure>,
    escalated: bool,
    acceptance_threshold: f64,
) -> ClassificationDecision {
    let final_stage = if escalated { Stage::Escalated } else { Stage::Cheap };
    let final_attempt = attempts.iter().find(|a| a.stage == final_stage);

    let (label, confidence, unclear_reason) = match final_attempt {
        None => {
            let reason = if attempts.is_empty() {
                UnclearReason::NoSuccessfulAttempt
            } else {
                // Stage 1 answered but was not good enough, stage 2 failed
                UnclearReason::LowConfidence
            };
            (Label::Unclear, Confidence::ZERO, Some(reason))
        }
        Some(attempt) if !attempt.confidence.meets(acceptance_threshold) => {
            (Label::Unclear, attempt.confidence, Some(UnclearReason::LowConfidence))
        }
        Some(attempt) => match Label::from_stored(&attempt.label) {
            Label::Unclear => (Label::Unclear, attempt.confidence, Some(UnclearReason::ModelUnclear)),
            named => (named, attempt.confidence, None),
        },
    };

    ClassificationDecision {
        label,
        confidence,
        attempts,
        failures,
        unclear_reason,
    }
}
