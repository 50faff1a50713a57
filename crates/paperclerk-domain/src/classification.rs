//! Classification attempts and decisions

use crate::Confidence;
use std::fmt;

/// Classification stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Cheap, fast first pass
    Cheap,
    /// Stronger, slower pass, run at most once per document
    Escalated,
}

impl Stage {
    /// Numeric stage identifier (1 or 2)
    pub fn number(&self) -> u8 {
        match self {
            Stage::Cheap => 1,
            Stage::Escalated => 2,
        }
    }

    /// Parse a numeric stage identifier
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Stage::Cheap),
            2 => Some(Stage::Escalated),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {}", self.number())
    }
}

/// Final label of a decision
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    /// A sender or category proposed by a model and accepted
    Named(String),
    /// The fallback sentinel for low-confidence or failed classification
    Unclear,
}

impl Label {
    /// Sentinel string stored for [`Label::Unclear`]
    pub const UNCLEAR: &'static str = "unclear";

    /// Label text, the sentinel for [`Label::Unclear`]
    pub fn as_str(&self) -> &str {
        match self {
            Label::Named(name) => name,
            Label::Unclear => Self::UNCLEAR,
        }
    }

    /// Whether this is the unclear sentinel
    pub fn is_unclear(&self) -> bool {
        matches!(self, Label::Unclear)
    }

    /// Rebuild a label from its stored text
    pub fn from_stored(s: &str) -> Self {
        if s == Self::UNCLEAR {
            Label::Unclear
        } else {
            Label::Named(s.to_string())
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One successful model call
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationAttempt {
    /// Which stage produced it
    pub stage: Stage,
    /// Model identifier used for the call
    pub model: String,
    /// Text excerpt sent to the model
    pub excerpt: String,
    /// Raw model response, kept verbatim for the audit trail
    pub raw_response: String,
    /// Label the model proposed (already normalized)
    pub label: String,
    /// Confidence the model reported, clamped into `[0, 1]`
    pub confidence: Confidence,
}

/// A stage that did not produce an attempt
#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    /// Which stage failed
    pub stage: Stage,
    /// Model identifier used for the call
    pub model: String,
    /// Human-readable reason (timeout, backend error, malformed response)
    pub reason: String,
    /// Raw response when one was received but could not be parsed
    pub raw_response: Option<String>,
}

/// Why a decision resolved to [`Label::Unclear`]
#[derive(Debug, Clone, PartialEq)]
pub enum UnclearReason {
    /// Final confidence was below the acceptance threshold
    LowConfidence,
    /// Every attempted stage failed
    NoSuccessfulAttempt,
    /// The model itself answered with the unclear sentinel
    ModelUnclear,
    /// Text extraction failed; classification was skipped
    ExtractionFailed(String),
}

impl fmt::Display for UnclearReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnclearReason::LowConfidence => f.write_str("confidence below acceptance threshold"),
            UnclearReason::NoSuccessfulAttempt => f.write_str("no classification stage succeeded"),
            UnclearReason::ModelUnclear => f.write_str("model reported unclear"),
            UnclearReason::ExtractionFailed(e) => write!(f, "extraction failed: {}", e),
        }
    }
}

/// Final outcome of classifying one document
///
/// Classification never fails: every failure mode resolves to
/// [`Label::Unclear`] with an [`UnclearReason`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationDecision {
    /// Chosen label
    pub label: Label,
    /// Final confidence (of the superseding attempt, zero if none)
    pub confidence: Confidence,
    /// Successful attempts in stage order
    pub attempts: Vec<ClassificationAttempt>,
    /// Stages that failed, in stage order
    pub failures: Vec<StageFailure>,
    /// Set when the label is [`Label::Unclear`]
    pub unclear_reason: Option<UnclearReason>,
}

impl ClassificationDecision {
    /// Decision for a document whose text could not be extracted
    pub fn extraction_failed(reason: impl Into<String>) -> Self {
        Self {
            label: Label::Unclear,
            confidence: Confidence::ZERO,
            attempts: Vec::new(),
            failures: Vec::new(),
            unclear_reason: Some(UnclearReason::ExtractionFailed(reason.into())),
        }
    }

    /// Whether the decision routes to the unclear folder
    pub fn is_unclear(&self) -> bool {
        self.label.is_unclear()
    }

    /// Highest stage that produced an attempt, if any
    pub fn stage_used(&self) -> Option<Stage> {
        self.attempts.iter().map(|a| a.stage).max()
    }
}
