use crate::{EngineError, Result};
use reconcile_indexer::{ArtifactScanOptions, ScanOptions};
use reconcile_protocol::{is_valid_prefix, PathStyle, ADDRESS_WIDTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File looked up at the project root when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "asm-reconcile.toml";

/// One "wrong address range" substitution: an identifier whose address
/// starts with `from` may really be the routine whose address starts with
/// `to` (same low digits).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressShift {
    pub from: String,
    pub to: String,
}

impl AddressShift {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Required on-disk layout for routine files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutPolicy {
    /// Accept both layouts, plan nothing.
    #[default]
    Any,
    /// `<unit>/<id>.<ext>`
    Flat,
    /// `<unit>/<id>/<id>.<ext>`
    Nested,
}

/// Resolved configuration for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Macro name of the placeholder directive
    pub directive: String,

    /// Prefix of correctly named routines
    pub routine_prefix: String,

    /// Prefixes that should be renamed to `routine_prefix`
    pub alias_prefixes: Vec<String>,

    /// Extension of artifact files, without the dot
    pub artifact_extension: String,

    /// Source subtree, relative to the project root
    pub source_dir: PathBuf,

    /// Artifact subtree, relative to the project root
    pub artifact_dir: PathBuf,

    /// Extensions of documents that may hold directives
    pub source_extensions: Vec<String>,

    /// How directive paths are spelled
    pub path_style: PathStyle,

    /// Required artifact layout (layout migration is planned when not `any`)
    pub artifact_layout: LayoutPolicy,

    /// Plan removal of originals superseded by a layout copy
    pub remove_originals: bool,

    /// Comment out directives with no matching artifact instead of rejecting them
    pub comment_orphans: bool,

    /// Address corrections, tried in order
    pub address_shifts: Vec<AddressShift>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            directive: "INCLUDE_ASM".to_string(),
            routine_prefix: "func_".to_string(),
            alias_prefixes: vec!["D_".to_string()],
            artifact_extension: "s".to_string(),
            source_dir: PathBuf::from("src"),
            artifact_dir: PathBuf::from("asm"),
            source_extensions: vec!["c".to_string(), "h".to_string()],
            path_style: PathStyle::Directory,
            artifact_layout: LayoutPolicy::Any,
            remove_originals: false,
            comment_orphans: false,
            address_shifts: default_address_shifts(),
        }
    }
}

/// Ranges observed to be confused so far. Not exhaustive; projects override
/// them through `[[address_shifts]]`.
pub fn default_address_shifts() -> Vec<AddressShift> {
    vec![
        AddressShift::new("8002", "8001"),
        AddressShift::new("8003", "8001"),
        AddressShift::new("8004", "8001"),
        AddressShift::new("8001", "8003"),
    ]
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    directive: Option<String>,
    routine_prefix: Option<String>,
    alias_prefixes: Option<Vec<String>>,
    artifact_extension: Option<String>,
    source_dir: Option<PathBuf>,
    artifact_dir: Option<PathBuf>,
    source_extensions: Option<Vec<String>>,
    path_style: Option<PathStyle>,
    artifact_layout: Option<LayoutPolicy>,
    remove_originals: Option<bool>,
    comment_orphans: Option<bool>,
    address_shifts: Option<Vec<AddressShift>>,
}

impl ReconcileConfig {
    /// Parse a TOML document; absent keys keep their defaults. A present
    /// `address_shifts` table replaces the default table entirely.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text)
            .map_err(|err| EngineError::invalid_config(format!("TOML parse error: {err}")))?;
        let config = Self::from_raw(raw);
        config.validate().map_err(EngineError::invalid_config)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            EngineError::invalid_config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// `asm-reconcile.toml` under `project_root` when present, defaults
    /// otherwise.
    pub fn discover(project_root: &Path) -> Result<Self> {
        let path = project_root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            log::debug!("Loading configuration from {}", path.display());
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn from_raw(raw: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            directive: raw.directive.unwrap_or(defaults.directive),
            routine_prefix: raw.routine_prefix.unwrap_or(defaults.routine_prefix),
            alias_prefixes: raw.alias_prefixes.unwrap_or(defaults.alias_prefixes),
            artifact_extension: raw
                .artifact_extension
                .unwrap_or(defaults.artifact_extension),
            source_dir: raw.source_dir.unwrap_or(defaults.source_dir),
            artifact_dir: raw.artifact_dir.unwrap_or(defaults.artifact_dir),
            source_extensions: raw.source_extensions.unwrap_or(defaults.source_extensions),
            path_style: raw.path_style.unwrap_or(defaults.path_style),
            artifact_layout: raw.artifact_layout.unwrap_or(defaults.artifact_layout),
            remove_originals: raw.remove_originals.unwrap_or(defaults.remove_originals),
            comment_orphans: raw.comment_orphans.unwrap_or(defaults.comment_orphans),
            address_shifts: raw.address_shifts.unwrap_or(defaults.address_shifts),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.directive.is_empty()
            || !self
                .directive
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(format!(
                "directive must be a non-empty macro name, got {:?}",
                self.directive
            ));
        }

        if !is_valid_prefix(&self.routine_prefix) {
            return Err(format!(
                "routine_prefix {:?} must be letters/digits ending in '_'",
                self.routine_prefix
            ));
        }
        for alias in &self.alias_prefixes {
            if !is_valid_prefix(alias) {
                return Err(format!(
                    "alias prefix {alias:?} must be letters/digits ending in '_'"
                ));
            }
            if alias == &self.routine_prefix {
                return Err(format!("alias prefix {alias:?} equals routine_prefix"));
            }
        }

        if self.artifact_extension.is_empty() || self.artifact_extension.contains('.') {
            return Err(format!(
                "artifact_extension must be given without a dot, got {:?}",
                self.artifact_extension
            ));
        }

        if self.source_extensions.is_empty() {
            return Err("source_extensions must not be empty".to_string());
        }

        for (position, shift) in self.address_shifts.iter().enumerate() {
            let is_hex = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit());
            if !is_hex(&shift.from) || !is_hex(&shift.to) {
                return Err(format!(
                    "address_shifts[{position}]: from/to must be hex digits ({:?} -> {:?})",
                    shift.from, shift.to
                ));
            }
            if shift.from.len() != shift.to.len() || shift.from.len() > ADDRESS_WIDTH {
                return Err(format!(
                    "address_shifts[{position}]: from/to must have the same width, \
                     at most {ADDRESS_WIDTH} digits"
                ));
            }
            if shift.from == shift.to {
                return Err(format!(
                    "address_shifts[{position}]: from and to are both {:?}",
                    shift.from
                ));
            }
        }

        Ok(())
    }

    pub fn artifact_scan_options(&self) -> ArtifactScanOptions {
        ArtifactScanOptions {
            extension: self.artifact_extension.clone(),
            routine_prefix: self.routine_prefix.clone(),
            alias_prefixes: self.alias_prefixes.clone(),
        }
    }

    pub fn document_scan_options(&self) -> ScanOptions {
        ScanOptions {
            extensions: self
                .source_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            ..ScanOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ReconcileConfig::from_toml_str("").unwrap();
        assert_eq!(config.directive, "INCLUDE_ASM");
        assert_eq!(config.address_shifts, default_address_shifts());
        assert_eq!(config.artifact_layout, LayoutPolicy::Any);
    }

    #[test]
    fn explicit_shift_table_replaces_defaults() {
        let config = ReconcileConfig::from_toml_str(
            r#"
routine_prefix = "ROUTINE_"
path_style = "routine"

[[address_shifts]]
from = "8001"
to = "8003"
"#,
        )
        .unwrap();
        assert_eq!(config.routine_prefix, "ROUTINE_");
        assert_eq!(config.path_style, PathStyle::Routine);
        assert_eq!(
            config.address_shifts,
            vec![AddressShift::new("8001", "8003")]
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ReconcileConfig::from_toml_str("directve = \"INCLUDE_ASM\"").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn invalid_shift_rules_are_rejected() {
        for body in [
            "[[address_shifts]]\nfrom = \"8001\"\nto = \"803\"",
            "[[address_shifts]]\nfrom = \"80G1\"\nto = \"8003\"",
            "[[address_shifts]]\nfrom = \"8001\"\nto = \"8001\"",
            "[[address_shifts]]\nfrom = \"800100000\"\nto = \"800300000\"",
        ] {
            assert!(
                ReconcileConfig::from_toml_str(body).is_err(),
                "accepted invalid table: {body}"
            );
        }
    }

    #[test]
    fn alias_must_differ_from_routine_prefix() {
        let err = ReconcileConfig::from_toml_str("alias_prefixes = [\"func_\"]").unwrap_err();
        assert!(err.to_string().contains("equals routine_prefix"));
    }

    #[test]
    fn discover_falls_back_to_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config = ReconcileConfig::discover(temp.path()).unwrap();
        assert_eq!(config.routine_prefix, "func_");

        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "comment_orphans = true\n",
        )
        .unwrap();
        let config = ReconcileConfig::discover(temp.path()).unwrap();
        assert!(config.comment_orphans);
    }
}
