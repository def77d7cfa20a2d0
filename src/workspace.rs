//! Scratch directory shared by an authoring team
//!
//! Every run gets a fresh subdirectory under a base path, so concurrent runs
//! never collide. All document tools resolve file names through
//! [`Workspace::resolve`], which confines access to the directory.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tower::BoxError;
use tracing::debug;

/// Listing shown to authoring agents when the directory is empty.
pub const NO_FILES: &str = "No files written.";

/// Handle to a run-scoped working directory. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: Arc<PathBuf>,
}

impl Workspace {
    /// Create a fresh uniquely named workspace under `base`.
    pub fn create(base: impl AsRef<Path>) -> std::io::Result<Self> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let root = base.as_ref().join(&id[..8]);
        std::fs::create_dir_all(&root)?;
        debug!(path = %root.display(), "created workspace");
        Ok(Self {
            root: Arc::new(root),
        })
    }

    /// Wrap an existing directory, for tests and resumed runs.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(path.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a tool-supplied file name inside the workspace. Absolute paths
    /// and parent traversal are rejected.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, BoxError> {
        let candidate = Path::new(name);
        if candidate.is_absolute() {
            return Err(format!("absolute paths are not allowed: {name}").into());
        }
        for component in candidate.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(format!("path escapes the workspace: {name}").into()),
            }
        }
        Ok(self.root.join(candidate))
    }

    /// Human-readable listing of files currently in the workspace, in sorted
    /// order. This is what authoring prompts see as `{current_files}`.
    pub fn listing(&self) -> String {
        let mut names: Vec<String> = std::fs::read_dir(self.root.as_path())
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().is_file())
                    .filter_map(|e| e.file_name().into_string().ok())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();

        if names.is_empty() {
            return NO_FILES.to_string();
        }
        let mut out =
            String::from("Below are files your team has written to the directory:\n");
        for name in names {
            out.push_str(&format!(" - {name}\n"));
        }
        out.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_makes_unique_subdirectories() {
        let base = tempfile::tempdir().unwrap();
        let a = Workspace::create(base.path()).unwrap();
        let b = Workspace::create(base.path()).unwrap();
        assert_ne!(a.root(), b.root());
        assert!(a.root().is_dir());
        assert!(b.root().is_dir());
    }

    #[test]
    fn test_listing_empty_and_populated() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::at(dir.path());
        assert_eq!(ws.listing(), NO_FILES);

        std::fs::write(dir.path().join("outline.txt"), "1. intro").unwrap();
        std::fs::write(dir.path().join("draft.txt"), "text").unwrap();
        let listing = ws.listing();
        assert!(listing.starts_with("Below are files your team has written"));
        // Sorted order.
        let draft = listing.find("draft.txt").unwrap();
        let outline = listing.find("outline.txt").unwrap();
        assert!(draft < outline);
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::at(dir.path());
        assert!(ws.resolve("notes.txt").is_ok());
        assert!(ws.resolve("../outside.txt").is_err());
        assert!(ws.resolve("/etc/passwd").is_err());
    }
}
