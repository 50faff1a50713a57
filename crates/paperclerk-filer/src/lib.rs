//! Paperclerk Filer
//!
//! Turns a classification decision into a place in the archive and puts the
//! document there, in a fixed order:
//!
//! ```text
//! PathResolver::resolve → DecisionRecorder::record → FilingExecutor::file
//! ```
//!
//! The resolver derives the folder from the label (through the optional
//! [`SenderMapping`]) and the file name from the document's metadata date,
//! never from document text. The recorder appends the audit record before the
//! executor touches the filesystem; in a dry run the executor only reports the
//! planned destination.

#![warn(missing_docs)]

mod config;
mod error;
mod executor;
mod mapping;
pub mod naming;
mod recorder;

pub use config::{NamingConfig, DATE_TOKEN};
pub use error::FilingError;
pub use executor::{FilingExecutor, FilingOutcome};
pub use mapping::{SenderMapping, SenderRoute};
pub use naming::{sanitize_component, ArchiveView, FsArchiveView, PathResolver, ReservedView};
pub use recorder::{redact, DecisionRecorder, RecordRequest};
