//! Paperclerk Pipeline
//!
//! Sequences the components over a snapshot of the inbox:
//!
//! ```text
//! scan_inbox → load_document → TextExtractor → StagedClassifier
//!     → PathResolver → DecisionRecorder → FilingExecutor → RunReport
//! ```
//!
//! Every document runs to a [`DocumentOutcome`]; nothing a single document
//! does can abort the run. A [`RunContext`] carries the run identity and the
//! placement lock through the calls.

#![warn(missing_docs)]

mod config;
mod context;
mod error;
pub mod metadata;
mod orchestrator;
mod report;
mod scan;

pub use config::{PathsConfig, PipelineConfig, RunConfig};
pub use context::RunContext;
pub use error::PipelineError;
pub use metadata::{document_date, fingerprint, load_document};
pub use orchestrator::Pipeline;
pub use report::{DocumentOutcome, DocumentReport, RunReport};
pub use scan::scan_inbox;
