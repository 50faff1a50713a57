//! Destination folders, file names and collision resolution

use crate::config::NamingConfig;
use crate::error::FilingError;
use crate::mapping::SenderMapping;
use paperclerk_domain::{ClassificationDecision, Document, DocumentDate, ResolvedTarget};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

const MAX_COMPONENT_CHARS: usize = 120;
const EMPTY_COMPONENT: &str = "Document";

/// Read access to the archive used while resolving a destination
pub trait ArchiveView {
    /// Whether `folder` exists
    fn folder_exists(&self, folder: &Path) -> bool;

    /// Whether `path` is occupied
    fn is_taken(&self, path: &Path) -> bool;
}

/// The archive as it currently is on disk
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArchiveView;

impl FsArchiveView {
    /// Names of the visible folders directly below `root`, sorted
    pub fn folders(root: &Path) -> std::io::Result<Vec<String>> {
        let mut folders = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                folders.push(name);
            }
        }
        folders.sort();
        Ok(folders)
    }
}

impl ArchiveView for FsArchiveView {
    fn folder_exists(&self, folder: &Path) -> bool {
        folder.is_dir()
    }

    fn is_taken(&self, path: &Path) -> bool {
        path.symlink_metadata().is_ok()
    }
}

/// An archive view that also treats names planned earlier in the run as taken
pub struct ReservedView<'a, V: ?Sized> {
    inner: &'a V,
    reserved: &'a HashSet<PathBuf>,
}

impl<'a, V: ArchiveView + ?Sized> ReservedView<'a, V> {
    /// Layer `reserved` over `inner`
    pub fn new(inner: &'a V, reserved: &'a HashSet<PathBuf>) -> Self {
        Self { inner, reserved }
    }
}

impl<V: ArchiveView + ?Sized> ArchiveView for ReservedView<'_, V> {
    fn folder_exists(&self, folder: &Path) -> bool {
        self.inner.folder_exists(folder)
            || self.reserved.iter().any(|p| p.parent() == Some(folder))
    }

    fn is_taken(&self, path: &Path) -> bool {
        self.reserved.contains(path) || self.inner.is_taken(path)
    }
}

/// Make `name` safe to use as a single folder or file name component
///
/// Path separators, reserved characters and control characters become `-`,
/// whitespace collapses to single spaces, leading and trailing dots and spaces
/// are trimmed and the result is capped at 120 characters.
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() && !c.is_whitespace() => '-',
            c => c,
        })
        .collect();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        return EMPTY_COMPONENT.to_string();
    }

    let capped: String = trimmed.chars().take(MAX_COMPONENT_CHARS).collect();
    capped.trim_end_matches(|c| c == ' ' || c == '.').to_string()
}

/// Values substituted into a naming template
#[derive(Debug, Clone, Default)]
pub struct NameTokens<'a> {
    /// Canonical sender name
    pub label: Option<&'a str>,
    /// Destination folder name
    pub folder: Option<&'a str>,
    /// Sender abbreviation
    pub abbrev: Option<&'a str>,
}

/// Render the base file name (without extension)
///
/// Literal text directly before an empty token is dropped along with it, so
/// `{date}_{abbrev}` renders as the bare date when no abbreviation exists.
pub fn render_base_name(template: &str, date: &DocumentDate, tokens: &NameTokens<'_>) -> String {
    let mut rendered = String::new();
    let mut pending = String::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        pending.push_str(&rest[..open]);
        let Some(close) = rest[open..].find('}') else {
            pending.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let value = match &rest[open..open + close + 1] {
            "{date}" => Some(date.prefix()),
            "{label}" => tokens.label.map(sanitize_component),
            "{folder}" => tokens.folder.map(sanitize_component),
            "{abbrev}" => tokens.abbrev.map(sanitize_component),
            _ => None,
        };
        if let Some(value) = value {
            rendered.push_str(&pending);
            rendered.push_str(&value);
        }
        pending.clear();
        rest = &rest[open + close + 1..];
    }
    rendered.push_str(&pending);
    rendered.push_str(rest);

    sanitize_component(&rendered)
}

/// Resolves where a classified document goes
#[derive(Debug, Clone)]
pub struct PathResolver {
    archive_root: PathBuf,
    config: NamingConfig,
    mapping: SenderMapping,
}

impl PathResolver {
    /// Create a resolver for `archive_root`
    pub fn new(archive_root: impl Into<PathBuf>, config: NamingConfig, mapping: SenderMapping) -> Self {
        Self {
            archive_root: archive_root.into(),
            config,
            mapping,
        }
    }

    /// Archive root
    pub fn archive_root(&self) -> &Path {
        &self.archive_root
    }

    /// Naming configuration
    pub fn config(&self) -> &NamingConfig {
        &self.config
    }

    /// Sender mapping
    pub fn mapping(&self) -> &SenderMapping {
        &self.mapping
    }

    /// Resolve the destination of `document`
    ///
    /// The date comes only from the document's metadata; the folder and the
    /// template tokens come only from the decision's label. Names occupied in
    /// `view` get the first free `_N` suffix.
    pub fn resolve<V: ArchiveView + ?Sized>(
        &self,
        document: &Document,
        decision: &ClassificationDecision,
        view: &V,
    ) -> Result<ResolvedTarget, FilingError> {
        let date = document
            .date
            .as_ref()
            .ok_or_else(|| FilingError::MissingDate(document.file_name()))?;

        // A label naming the fallback folder is no sender folder
        let route = (!decision.is_unclear())
            .then(|| self.mapping.route(decision.label.as_str()))
            .filter(|r| r.known || !self.config.route_unknown_to_unclear)
            .filter(|r| !self.is_unclear_folder(&sanitize_component(&r.folder)));

        let (folder, tokens) = match &route {
            Some(route) => {
                let folder = sanitize_component(&route.folder);
                let tokens = NameTokens {
                    label: Some(route.canonical.as_str()),
                    folder: Some(route.folder.as_str()),
                    abbrev: route.abbrev.as_deref(),
                };
                (folder, tokens)
            }
            None => (self.config.unclear_folder.clone(), NameTokens::default()),
        };

        let folder_path = self.archive_root.join(&folder);
        let folder_created = !view.folder_exists(&folder_path);
        if folder_created && !self.config.create_folders {
            return Err(FilingError::FolderMissing(folder_path));
        }

        let base = render_base_name(&self.config.template, date, &tokens);
        let extension = document.extension();
        let (file_name, collision_suffix) =
            self.first_free_name(&folder_path, &base, &extension, view)?;

        debug!(
            document = %document.file_name(),
            folder = %folder,
            file_name = %file_name,
            suffix = ?collision_suffix,
            "Resolved destination"
        );

        Ok(ResolvedTarget {
            archive_root: self.archive_root.clone(),
            folder,
            file_name,
            collision_suffix,
            unclear: route.is_none(),
            folder_created,
        })
    }

    fn is_unclear_folder(&self, folder: &str) -> bool {
        folder.eq_ignore_ascii_case(&self.config.unclear_folder)
    }

    fn first_free_name<V: ArchiveView + ?Sized>(
        &self,
        folder_path: &Path,
        base: &str,
        extension: &str,
        view: &V,
    ) -> Result<(String, Option<u32>), FilingError> {
        let plain = format!("{}{}", base, extension);
        if !view.is_taken(&folder_path.join(&plain)) {
            return Ok((plain, None));
        }
        for n in 1..=self.config.collision_bound {
            let candidate = format!("{}_{}{}", base, n, extension);
            if !view.is_taken(&folder_path.join(&candidate)) {
                return Ok((candidate, Some(n)));
            }
        }
        Err(FilingError::CollisionResolutionExhausted {
            folder: folder_path.to_path_buf(),
            base: base.to_string(),
            extension: extension.to_string(),
            bound: self.config.collision_bound,
        })
    }
}
