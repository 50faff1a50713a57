//! Filing Executor: the only component that mutates the filesystem

use crate::error::FilingError;
use paperclerk_domain::{Document, ResolvedTarget, RunMode};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What the executor did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilingOutcome {
    /// The document now lives at `destination`
    Moved {
        /// Final path of the document
        destination: PathBuf,
    },
    /// Dry run: nothing was touched
    Planned {
        /// Where the document would have gone
        destination: PathBuf,
    },
}

impl FilingOutcome {
    /// Destination path, moved or planned
    pub fn destination(&self) -> &Path {
        match self {
            FilingOutcome::Moved { destination } | FilingOutcome::Planned { destination } => {
                destination
            }
        }
    }
}

/// Moves documents into the archive
#[derive(Debug, Clone, Copy, Default)]
pub struct FilingExecutor;

impl FilingExecutor {
    /// Create an executor
    pub fn new() -> Self {
        Self
    }

    /// File `document` at `target`
    ///
    /// The move never overwrites: the destination is linked first and the
    /// source removed afterwards. On any failure the document stays at its
    /// source path and a folder created here is removed again if empty.
    pub fn file(
        &self,
        document: &Document,
        target: &ResolvedTarget,
        mode: RunMode,
    ) -> Result<FilingOutcome, FilingError> {
        let destination = target.path();
        if !mode.executes() {
            debug!(destination = %destination.display(), "Dry run, not moving");
            return Ok(FilingOutcome::Planned { destination });
        }

        let folder = target.folder_path();
        let created_folder = if folder.is_dir() {
            false
        } else {
            fs::create_dir_all(&folder).map_err(|e| FilingError::io(&folder, e))?;
            true
        };

        if let Err(e) = move_no_clobber(&document.source_path, &destination) {
            if created_folder {
                let _ = fs::remove_dir(&folder);
            }
            return Err(e);
        }

        info!(
            source = %document.source_path.display(),
            destination = %destination.display(),
            "Filed document"
        );
        Ok(FilingOutcome::Moved { destination })
    }
}

fn move_no_clobber(source: &Path, destination: &Path) -> Result<(), FilingError> {
    move_with_link(source, destination, |s, d| fs::hard_link(s, d))
}

fn move_with_link<L>(source: &Path, destination: &Path, link: L) -> Result<(), FilingError>
where
    L: FnOnce(&Path, &Path) -> std::io::Result<()>,
{
    match link(source, destination) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(FilingError::CollisionRace(destination.to_path_buf()));
        }
        // vfat, exFAT and many network mounts answer EPERM instead of ENOTSUP
        Err(e) if links_unavailable(e.kind()) => {
            debug!(
                destination = %destination.display(),
                error = %e,
                "Hard links unavailable, renaming"
            );
            if destination.symlink_metadata().is_ok() {
                return Err(FilingError::CollisionRace(destination.to_path_buf()));
            }
            return fs::rename(source, destination).map_err(|e| FilingError::io(source, e));
        }
        Err(e) => return Err(FilingError::io(destination, e)),
    }

    if let Err(e) = fs::remove_file(source) {
        if let Err(rollback) = fs::remove_file(destination) {
            warn!(
                destination = %destination.display(),
                error = %rollback,
                "Failed to roll back destination link"
            );
        }
        return Err(FilingError::io(source, e));
    }
    Ok(())
}

fn links_unavailable(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Unsupported | ErrorKind::PermissionDenied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperclerk_domain::DocumentId;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Document, ResolvedTarget) {
        let dir = TempDir::new().unwrap();
        let inbox = dir.path().join("inbox");
        fs::create_dir(&inbox).unwrap();
        let source = inbox.join("scan.pdf");
        fs::write(&source, b"%PDF-1.4 test").unwrap();

        let document = Document {
            id: DocumentId::new(),
            source_path: source,
            size_bytes: 13,
            fingerprint: "f".to_string(),
            date: None,
        };
        let target = ResolvedTarget {
            archive_root: dir.path().join("archive"),
            folder: "Invoices".to_string(),
            file_name: "2024-03-02.pdf".to_string(),
            collision_suffix: None,
            unclear: false,
            folder_created: true,
        };
        (dir, document, target)
    }

    #[test]
    fn test_move_creates_folder() {
        let (_dir, document, target) = setup();

        let outcome = FilingExecutor::new()
            .file(&document, &target, RunMode::Normal)
            .unwrap();

        assert_eq!(outcome, FilingOutcome::Moved { destination: target.path() });
        assert!(!document.source_path.exists());
        assert_eq!(fs::read(target.path()).unwrap(), b"%PDF-1.4 test");
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let (_dir, document, target) = setup();

        let outcome = FilingExecutor::new()
            .file(&document, &target, RunMode::DryRun)
            .unwrap();

        assert_eq!(outcome.destination(), target.path());
        assert!(document.source_path.exists());
        assert!(!target.archive_root.exists());
    }

    #[test]
    fn test_existing_destination_is_a_race() {
        let (_dir, document, target) = setup();
        fs::create_dir_all(target.folder_path()).unwrap();
        fs::write(target.path(), b"other").unwrap();

        let err = FilingExecutor::new()
            .file(&document, &target, RunMode::Normal)
            .unwrap_err();

        assert!(matches!(err, FilingError::CollisionRace(_)));
        assert!(document.source_path.exists());
        assert_eq!(fs::read(target.path()).unwrap(), b"other");
    }

    fn no_links(_source: &Path, _destination: &Path) -> std::io::Result<()> {
        Err(std::io::Error::from(ErrorKind::PermissionDenied))
    }

    #[test]
    fn test_rename_when_links_are_refused() {
        let (_dir, document, target) = setup();
        fs::create_dir_all(target.folder_path()).unwrap();

        move_with_link(&document.source_path, &target.path(), no_links).unwrap();

        assert!(!document.source_path.exists());
        assert_eq!(fs::read(target.path()).unwrap(), b"%PDF-1.4 test");
    }

    #[test]
    fn test_rename_fallback_never_clobbers() {
        let (_dir, document, target) = setup();
        fs::create_dir_all(target.folder_path()).unwrap();
        fs::write(target.path(), b"other").unwrap();

        let err = move_with_link(&document.source_path, &target.path(), no_links).unwrap_err();

        assert!(matches!(err, FilingError::CollisionRace(_)));
        assert!(document.source_path.exists());
        assert_eq!(fs::read(target.path()).unwrap(), b"other");
    }

    #[test]
    fn test_missing_source_leaves_no_folder() {
        let (_dir, document, target) = setup();
        fs::remove_file(&document.source_path).unwrap();

        let err = FilingExecutor::new()
            .file(&document, &target, RunMode::Normal)
            .unwrap_err();

        assert!(matches!(err, FilingError::Io { .. }));
        assert!(!target.folder_path().exists());
    }
}
