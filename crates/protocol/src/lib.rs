//! # Reconcile Protocol
//!
//! Value types shared by the indexer, the engine and the CLI. Everything here
//! is plain data: it derives `serde` and `schemars` so the CLI can emit JSON
//! reports and their schema.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod identifier;
pub mod paths;
mod plan;
mod report;

pub use identifier::{is_valid_prefix, Identifier, ADDRESS_WIDTH};
pub use plan::{CorrectiveAction, Finding, FindingKind, Plan, RejectReason, Rejection, ShiftRule};
pub use report::{
    ActionOutcome, ActionStatus, ExecutionReport, Mode, ReportSummary, SkipReason,
    REPORT_SCHEMA_VERSION,
};

/// Where a routine's file sits relative to its unit directory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactLayout {
    /// `<unit>/<id>.<ext>`
    Flat,
    /// `<unit>/<id>/<id>.<ext>`
    Nested,
}

/// One disassembled routine file discovered by the index scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Artifact {
    pub identifier: Identifier,

    /// Absolute (or root-joined) location on disk.
    pub path: PathBuf,

    /// Location relative to the project root, `/`-separated.
    pub relative_path: String,

    /// Directory grouping the routines of one source unit, relative to the
    /// project root, `/`-separated.
    pub unit_dir: String,

    pub layout: ArtifactLayout,
}

impl Artifact {
    /// Path a directive should name for this artifact under `style`.
    #[must_use]
    pub fn conventional_path(&self, style: PathStyle) -> String {
        style.render(&self.unit_dir, &self.identifier)
    }
}

/// How the path argument of a directive is spelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PathStyle {
    /// `INCLUDE_ASM("asm/nonmatchings/cd", func_8001B3E4);`
    #[default]
    Directory,
    /// `INCLUDE_ASM("asm/nonmatchings/cd/func_8001B3E4", func_8001B3E4);`
    Routine,
}

impl PathStyle {
    #[must_use]
    pub fn render(self, unit_dir: &str, identifier: &Identifier) -> String {
        match self {
            PathStyle::Directory => unit_dir.to_string(),
            PathStyle::Routine if unit_dir.is_empty() => identifier.to_string(),
            PathStyle::Routine => format!("{unit_dir}/{identifier}"),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PathStyle::Directory => "directory",
            PathStyle::Routine => "routine",
        }
    }
}

/// Byte range inside a placeholder's raw line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A directive found in a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Placeholder {
    pub document: PathBuf,

    /// 1-based line number.
    pub line: usize,

    /// Contents of the path string literal, as written.
    pub path: String,

    pub identifier: Identifier,

    /// Full line text without its terminator.
    pub raw: String,

    /// Location of the path literal contents within `raw`.
    pub path_span: Span,

    /// Location of the identifier argument within `raw`.
    pub identifier_span: Span,
}

impl Placeholder {
    /// `raw` with the path literal and identifier argument replaced. Spans
    /// are applied back to front so the earlier one stays valid.
    #[must_use]
    pub fn rewrite(&self, path: &str, identifier: &Identifier) -> String {
        let mut edits = [
            (self.path_span, path.to_string()),
            (self.identifier_span, identifier.to_string()),
        ];
        edits.sort_by_key(|(span, _)| std::cmp::Reverse(span.start));

        let mut line = self.raw.clone();
        for (span, replacement) in edits {
            line.replace_range(span.start..span.end, &replacement);
        }
        line
    }

    /// `document:line` for messages.
    #[must_use]
    pub fn location(&self) -> String {
        format!("{}:{}", self.document.display(), self.line)
    }
}
