//! Command implementations.

pub mod init_config;
pub mod review;
pub mod run;

pub use self::init_config::execute_init_config;
pub use self::review::{execute_review, execute_runs, execute_show};
pub use self::run::execute_run;

use crate::error::Result;
use paperclerk_pipeline::PipelineConfig;
use paperclerk_store::SqliteAuditStore;

/// Open the audit database named by the configuration.
pub(crate) fn open_store(config: &PipelineConfig) -> Result<SqliteAuditStore> {
    if let Some(parent) = config.paths.audit_db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(SqliteAuditStore::new(&config.paths.audit_db)?)
}
