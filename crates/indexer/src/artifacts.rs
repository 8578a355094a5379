use crate::{IndexStats, IndexerError, Result};
use reconcile_protocol::paths::slash_relative;
use reconcile_protocol::{Artifact, ArtifactLayout, Identifier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What counts as an artifact file
#[derive(Debug, Clone)]
pub struct ArtifactScanOptions {
    /// Extension of routine files, without the dot
    pub extension: String,

    /// Prefix of correctly named routines (`func_`)
    pub routine_prefix: String,

    /// Prefixes the disassembler emits for routines it did not recognise
    /// (`D_`). Indexed so the engine can plan renames.
    pub alias_prefixes: Vec<String>,
}

impl Default for ArtifactScanOptions {
    fn default() -> Self {
        Self {
            extension: "s".to_string(),
            routine_prefix: "func_".to_string(),
            alias_prefixes: vec!["D_".to_string()],
        }
    }
}

/// Non-fatal problem found while indexing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum IndexWarning {
    /// More than one file resolves to the same identifier
    Duplicate {
        identifier: Identifier,
        paths: Vec<String>,
    },
}

impl fmt::Display for IndexWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexWarning::Duplicate { identifier, paths } => write!(
                f,
                "{identifier} resolves to {} files: {}",
                paths.len(),
                paths.join(", ")
            ),
        }
    }
}

/// Snapshot of every routine file under the artifact root, keyed by
/// identifier. Built once per run and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ArtifactIndex {
    routine_prefix: String,
    alias_prefixes: Vec<String>,
    extension: String,
    by_id: BTreeMap<Identifier, Vec<Artifact>>,
    warnings: Vec<IndexWarning>,
    stats: IndexStats,
}

impl ArtifactIndex {
    /// Walk `artifact_root` and index every routine file.
    ///
    /// Generated disassembly is usually excluded from version control, so
    /// this walk deliberately ignores `.gitignore`.
    pub fn build(
        project_root: &Path,
        artifact_root: &Path,
        options: &ArtifactScanOptions,
    ) -> Result<Self> {
        if !artifact_root.is_dir() {
            return Err(IndexerError::InvalidPath(format!(
                "artifact directory {} does not exist",
                artifact_root.display()
            )));
        }

        let mut stats = IndexStats::new();
        let mut artifacts = Vec::new();

        for entry in WalkDir::new(artifact_root)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("Failed to read artifact entry: {err}");
                    stats.add_error(err.to_string());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            stats.files_seen += 1;

            match Self::classify_file(project_root, entry.path(), options) {
                Some(artifact) => artifacts.push(artifact),
                None => {
                    stats.skipped += 1;
                    log::debug!("Skipping non-routine file {}", entry.path().display());
                }
            }
        }

        let index = Self::from_artifacts(options, artifacts, stats);
        log::info!(
            "Indexed {} identifiers ({} routine, {} alias, {} nested) under {}",
            index.len(),
            index.stats.routines,
            index.stats.aliases,
            index.stats.nested,
            artifact_root.display()
        );
        for warning in &index.warnings {
            log::warn!("Index warning: {warning}");
        }
        Ok(index)
    }

    /// Assemble an index from already-discovered artifacts.
    pub fn from_artifacts(
        options: &ArtifactScanOptions,
        artifacts: Vec<Artifact>,
        mut stats: IndexStats,
    ) -> Self {
        let mut by_id: BTreeMap<Identifier, Vec<Artifact>> = BTreeMap::new();
        for artifact in artifacts {
            if artifact.identifier.has_prefix(&options.routine_prefix) {
                stats.routines += 1;
            } else {
                stats.aliases += 1;
            }
            if artifact.layout == ArtifactLayout::Nested {
                stats.nested += 1;
            }
            by_id
                .entry(artifact.identifier.clone())
                .or_default()
                .push(artifact);
        }

        let mut warnings = Vec::new();
        for (identifier, entries) in &mut by_id {
            entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
            if entries.len() > 1 {
                warnings.push(IndexWarning::Duplicate {
                    identifier: identifier.clone(),
                    paths: entries.iter().map(|a| a.relative_path.clone()).collect(),
                });
            }
        }

        Self {
            routine_prefix: options.routine_prefix.clone(),
            alias_prefixes: options.alias_prefixes.clone(),
            extension: options.extension.clone(),
            by_id,
            warnings,
            stats,
        }
    }

    /// Turn a file path into an artifact when its name is `<id>.<ext>` with a
    /// known prefix.
    pub fn classify_file(
        project_root: &Path,
        path: &Path,
        options: &ArtifactScanOptions,
    ) -> Option<Artifact> {
        let ext = path.extension()?.to_str()?;
        if !ext.eq_ignore_ascii_case(&options.extension) {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let identifier = Identifier::parse(stem)?;
        let known = identifier.has_prefix(&options.routine_prefix)
            || options
                .alias_prefixes
                .iter()
                .any(|prefix| identifier.has_prefix(prefix));
        if !known {
            return None;
        }

        let parent = path.parent()?;
        let nested = parent
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name == stem);
        let (layout, unit) = if nested {
            (ArtifactLayout::Nested, parent.parent()?)
        } else {
            (ArtifactLayout::Flat, parent)
        };

        Some(Artifact {
            identifier,
            path: path.to_path_buf(),
            relative_path: slash_relative(project_root, path),
            unit_dir: slash_relative(project_root, unit),
            layout,
        })
    }

    /// Primary artifact for `id` (smallest relative path when duplicated).
    pub fn lookup(&self, id: &Identifier) -> Option<&Artifact> {
        self.by_id.get(id).and_then(|entries| entries.first())
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.by_id.contains_key(id)
    }

    /// Every file that resolves to `id`.
    pub fn artifacts_for(&self, id: &Identifier) -> &[Artifact] {
        self.by_id.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when `id` resolves to more than one file.
    pub fn is_ambiguous(&self, id: &Identifier) -> bool {
        self.artifacts_for(id).len() > 1
    }

    /// All artifacts, ordered by identifier then path.
    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.by_id.values().flatten()
    }

    /// Number of distinct identifiers.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn warnings(&self) -> &[IndexWarning] {
        &self.warnings
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    pub fn routine_prefix(&self) -> &str {
        &self.routine_prefix
    }

    pub fn alias_prefixes(&self) -> &[String] {
        &self.alias_prefixes
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Where a file for `id` would live next to `like`, keeping its layout.
    pub fn sibling_path(&self, like: &Artifact, id: &Identifier) -> PathBuf {
        let file_name = format!("{id}.{}", self.extension);
        match like.layout {
            ArtifactLayout::Flat => like
                .path
                .parent()
                .map(|dir| dir.join(&file_name))
                .unwrap_or_else(|| PathBuf::from(&file_name)),
            ArtifactLayout::Nested => like
                .path
                .parent()
                .and_then(Path::parent)
                .map(|unit| unit.join(id.as_str()).join(&file_name))
                .unwrap_or_else(|| PathBuf::from(&file_name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"glabel x\n").unwrap();
    }

    #[test]
    fn indexes_flat_and_nested_layouts() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let unit = root.join("asm").join("nonmatchings").join("cd");
        touch(&unit.join("func_8001B3E4.s"));
        touch(&unit.join("func_8001B644").join("func_8001B644.s"));

        let index =
            ArtifactIndex::build(root, &root.join("asm"), &ArtifactScanOptions::default()).unwrap();

        assert_eq!(index.len(), 2);
        let flat = index
            .lookup(&Identifier::parse("func_8001B3E4").unwrap())
            .unwrap();
        assert_eq!(flat.layout, ArtifactLayout::Flat);
        assert_eq!(flat.unit_dir, "asm/nonmatchings/cd");

        let nested = index
            .lookup(&Identifier::parse("func_8001B644").unwrap())
            .unwrap();
        assert_eq!(nested.layout, ArtifactLayout::Nested);
        assert_eq!(nested.unit_dir, "asm/nonmatchings/cd");
        assert_eq!(
            nested.relative_path,
            "asm/nonmatchings/cd/func_8001B644/func_8001B644.s"
        );
        assert!(index.warnings().is_empty());
    }

    #[test]
    fn ignores_files_that_are_not_routines() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let unit = root.join("asm").join("data");
        touch(&unit.join("Cd_read_comb.s"));
        touch(&unit.join("jtbl_80010000.s"));
        touch(&unit.join("func_80010000.c"));
        touch(&unit.join("D_80010000.s"));

        let index =
            ArtifactIndex::build(root, &root.join("asm"), &ArtifactScanOptions::default()).unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.contains(&Identifier::parse("D_80010000").unwrap()));
        assert_eq!(index.stats().skipped, 3);
        assert_eq!(index.stats().aliases, 1);
    }

    #[test]
    fn duplicates_are_reported_not_dropped() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let unit = root.join("asm").join("cd");
        touch(&unit.join("func_8001B3E4.s"));
        touch(&unit.join("func_8001B3E4").join("func_8001B3E4.s"));

        let index =
            ArtifactIndex::build(root, &root.join("asm"), &ArtifactScanOptions::default()).unwrap();
        let id = Identifier::parse("func_8001B3E4").unwrap();

        assert!(index.is_ambiguous(&id));
        assert_eq!(index.artifacts_for(&id).len(), 2);
        assert_eq!(
            index.warnings(),
            &[IndexWarning::Duplicate {
                identifier: id.clone(),
                paths: vec![
                    "asm/cd/func_8001B3E4.s".to_string(),
                    "asm/cd/func_8001B3E4/func_8001B3E4.s".to_string(),
                ],
            }]
        );
        assert_eq!(
            index.lookup(&id).unwrap().relative_path,
            "asm/cd/func_8001B3E4.s"
        );
    }

    #[test]
    fn missing_artifact_root_is_an_error() {
        let temp = tempdir().unwrap();
        let err = ArtifactIndex::build(
            temp.path(),
            &temp.path().join("asm"),
            &ArtifactScanOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IndexerError::InvalidPath(_)));
    }

    #[test]
    fn sibling_path_keeps_layout() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let unit = root.join("asm").join("cd");
        touch(&unit.join("D_8002ABE4.s"));
        touch(&unit.join("D_8002ABF0").join("D_8002ABF0.s"));
        let index =
            ArtifactIndex::build(root, &root.join("asm"), &ArtifactScanOptions::default()).unwrap();

        let flat = index
            .lookup(&Identifier::parse("D_8002ABE4").unwrap())
            .unwrap();
        let target = Identifier::parse("func_8002ABE4").unwrap();
        assert_eq!(
            index.sibling_path(flat, &target),
            unit.join("func_8002ABE4.s")
        );

        let nested = index
            .lookup(&Identifier::parse("D_8002ABF0").unwrap())
            .unwrap();
        let target = Identifier::parse("func_8002ABF0").unwrap();
        assert_eq!(
            index.sibling_path(nested, &target),
            unit.join("func_8002ABF0").join("func_8002ABF0.s")
        );
    }
}
