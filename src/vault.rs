//! Obsidian vault scanning and note loading

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};

/// Enumerate Markdown notes under `root`, recursively, in sorted order.
///
/// Hidden files and anything under hidden directories (`.obsidian`, `.trash`,
/// `.git`) are skipped. Unreadable entries below the root are logged and
/// skipped; an unreadable or missing root is an error.
pub fn scan(root: &Path) -> Result<Vec<PathBuf>> {
    let meta = std::fs::metadata(root).map_err(|e| Error::filesystem(root, e))?;
    if !meta.is_dir() {
        return Err(Error::filesystem(
            root,
            std::io::Error::other("not a directory"),
        ));
    }
    // Surface permission problems on the root itself rather than an empty walk.
    std::fs::read_dir(root).map_err(|e| Error::filesystem(root, e))?;

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        match entry {
            Ok(entry) if is_markdown_file(&entry) => files.push(entry.into_path()),
            Ok(_) => {}
            Err(err) => warn!("Skipping unreadable vault entry: {}", err),
        }
    }

    files.sort();
    debug!("Found {} markdown files under {}", files.len(), root.display());
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn is_markdown_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

/// A note read from the vault, ready to hand to the graph builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDocument {
    pub path: PathBuf,
    /// Path relative to the vault root, `/`-separated
    pub relative_path: String,
    pub title: String,
    pub content: String,
}

impl NoteDocument {
    /// Read a note from disk.
    pub fn load(path: &Path, vault_root: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::filesystem(path, e))?;
        Ok(Self::from_content(path, vault_root, content))
    }

    pub fn from_content(path: &Path, vault_root: &Path, content: String) -> Self {
        let relative_path = path
            .strip_prefix(vault_root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        Self {
            path: path.to_path_buf(),
            relative_path,
            title: note_title(path, &content),
            content,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Title is the first-line `# ` heading when present, else the file stem.
pub fn note_title(path: &Path, content: &str) -> String {
    if let Some(rest) = content.strip_prefix("# ") {
        let heading = rest.lines().next().unwrap_or_default().trim();
        if !heading.is_empty() {
            return heading.to_string();
        }
    }

    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn relative(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn finds_markdown_recursively_in_sorted_order() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "zeta.md", "z");
        write(dir.path(), "alpha.md", "a");
        write(dir.path(), "projects/beta.md", "b");
        write(dir.path(), "readme.txt", "not a note");
        write(dir.path(), "Upper.MD", "upper");

        let files = scan(dir.path()).unwrap();
        assert_eq!(
            relative(dir.path(), &files),
            vec!["Upper.MD", "alpha.md", "projects/beta.md", "zeta.md"]
        );
    }

    #[test]
    fn skips_hidden_directories_and_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "visible.md", "v");
        write(dir.path(), ".obsidian/workspace.md", "cfg");
        write(dir.path(), ".trash/old.md", "old");
        write(dir.path(), "notes/.draft.md", "draft");

        let files = scan(dir.path()).unwrap();
        assert_eq!(relative(dir.path(), &files), vec!["visible.md"]);
    }

    #[test]
    fn empty_vault_yields_no_files() {
        let dir = TempDir::new().unwrap();
        assert!(scan(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_root_is_filesystem_error() {
        let dir = TempDir::new().unwrap();
        let err = scan(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::Filesystem { .. }));
    }

    #[test]
    fn file_root_is_filesystem_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "note.md", "x");
        let err = scan(&dir.path().join("note.md")).unwrap_err();
        assert!(matches!(err, Error::Filesystem { .. }));
    }

    #[test]
    fn scan_is_stable_across_runs() {
        let dir = TempDir::new().unwrap();
        for i in 0..12 {
            write(dir.path(), &format!("n{:02}.md", (i * 7) % 12), "x");
        }
        assert_eq!(scan(dir.path()).unwrap(), scan(dir.path()).unwrap());
    }

    #[test]
    fn title_from_first_heading() {
        let title = note_title(Path::new("vault/file-name.md"), "# Deep Work\n\nBody");
        assert_eq!(title, "Deep Work");
    }

    #[test]
    fn title_falls_back_to_file_stem() {
        assert_eq!(
            note_title(Path::new("vault/Reading List.md"), "Some text\n# Later heading"),
            "Reading List"
        );
        assert_eq!(note_title(Path::new("vault/x.md"), "## Subheading"), "x");
        assert_eq!(note_title(Path::new("vault/empty.md"), "# \nbody"), "empty");
    }

    #[test]
    fn load_sets_relative_path_and_content() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "books/Dune.md", "# Dune\nFrank Herbert");

        let path = dir.path().join("books/Dune.md");
        let doc = NoteDocument::load(&path, dir.path()).unwrap();

        assert_eq!(doc.relative_path, "books/Dune.md");
        assert_eq!(doc.title, "Dune");
        assert!(doc.content.contains("Frank Herbert"));
        assert!(!doc.is_blank());
    }

    #[test]
    fn load_missing_file_is_filesystem_error() {
        let dir = TempDir::new().unwrap();
        let err = NoteDocument::load(&dir.path().join("gone.md"), dir.path()).unwrap_err();
        assert!(matches!(err, Error::Filesystem { .. }));
    }
}
