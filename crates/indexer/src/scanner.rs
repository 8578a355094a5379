use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Options for discovering source documents
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Lowercase extensions (without dot) that may contain directives
    pub extensions: Vec<String>,

    /// Skip files larger than this
    pub max_file_size_bytes: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["c".to_string(), "h".to_string()],
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
        }
    }
}

/// Scanner for finding source documents that may hold placeholder directives
pub struct DocumentScanner {
    root: PathBuf,
    options: ScanOptions,
}

impl DocumentScanner {
    pub fn new(root: impl AsRef<Path>, options: ScanOptions) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            options,
        }
    }

    /// Scan the source tree (.gitignore aware). Results are sorted so that
    /// downstream planning never depends on walk order.
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true);
        builder.filter_entry(move |entry| !DocumentScanner::is_ignored_scope(entry.path(), &root));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > self.options.max_file_size_bytes {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                self.options.max_file_size_bytes
                            );
                            continue;
                        }
                    }

                    if !self.is_source_file(path) {
                        continue;
                    }

                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::info!("Found {} source documents", files.len());
        files
    }

    fn is_source_file(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        let ext = ext.to_lowercase();
        self.options
            .extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(&ext))
    }

    fn is_ignored_scope(path: &Path, root: &Path) -> bool {
        if let Ok(relative) = path.strip_prefix(root) {
            for component in relative.components() {
                if let std::path::Component::Normal(name) = component {
                    let lowered = name.to_string_lossy().to_lowercase();
                    if IGNORED_SCOPES.iter().any(|ignored| ignored == &lowered) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

const IGNORED_SCOPES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    ".cache",
    "build",
    "target",
    "__pycache__",
];

const MAX_FILE_SIZE_BYTES: u64 = 4 * 1_048_576;

#[cfg(test)]
mod tests {
    use super::{DocumentScanner, ScanOptions};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn finds_c_sources_in_sorted_order() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("rock_neo");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("player.c"), b"").unwrap();
        fs::write(src.join("cd.c"), b"").unwrap();
        fs::write(src.join("notes.md"), b"").unwrap();

        let files = DocumentScanner::new(temp.path(), ScanOptions::default()).scan();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["cd.c".to_string(), "player.c".to_string()]);
    }

    #[test]
    fn skips_build_directories_and_large_files() {
        let temp = tempdir().unwrap();
        let build = temp.path().join("build");
        fs::create_dir_all(&build).unwrap();
        fs::write(build.join("generated.c"), b"").unwrap();
        fs::write(temp.path().join("big.c"), vec![b'x'; 64]).unwrap();
        fs::write(temp.path().join("main.c"), b"int x;").unwrap();

        let options = ScanOptions {
            max_file_size_bytes: 32,
            ..ScanOptions::default()
        };
        let files = DocumentScanner::new(temp.path(), options).scan();

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("main.c"));
    }
}
