//! Resolved filing target

use std::path::{Path, PathBuf};

/// Canonical destination of a document
///
/// Derived only from document metadata and the classification label, so the
/// same metadata and label always resolve to the same name (modulo collisions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Archive root the folder lives in
    pub archive_root: PathBuf,
    /// Folder name relative to the archive root
    pub folder: String,
    /// Final file name including collision suffix and extension
    pub file_name: String,
    /// Collision suffix (`_n`) appended, if any
    pub collision_suffix: Option<u32>,
    /// Whether this is the unclear fallback folder
    pub unclear: bool,
    /// Whether the folder did not exist at resolution time
    pub folder_created: bool,
}

impl ResolvedTarget {
    /// Absolute destination folder
    pub fn folder_path(&self) -> PathBuf {
        self.archive_root.join(&self.folder)
    }

    /// Absolute destination path
    pub fn path(&self) -> PathBuf {
        self.folder_path().join(&self.file_name)
    }

    /// Destination path relative to the archive root
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.folder).join(&self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let target = ResolvedTarget {
            archive_root: PathBuf::from("/Archive"),
            folder: "Invoices".to_string(),
            file_name: "2024-03-02.pdf".to_string(),
            collision_suffix: None,
            unclear: false,
            folder_created: false,
        };
        assert_eq!(target.path(), PathBuf::from("/Archive/Invoices/2024-03-02.pdf"));
        assert_eq!(target.relative_path(), PathBuf::from("Invoices/2024-03-02.pdf"));
    }
}
