use reconcile_engine::Snapshot;
use reconcile_indexer::ArtifactIndex;
use reconcile_protocol::paths::slash_relative;
use reconcile_protocol::{
    ActionStatus, Artifact, ArtifactLayout, CorrectiveAction, ExecutionReport, Mode, Plan,
    ReportSummary, REPORT_SCHEMA_VERSION,
};
use schemars::JsonSchema;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Serialize, JsonSchema)]
pub(crate) struct DocumentError {
    pub document: String,
    pub error: String,
}

/// Machine-readable result of `preview` and `commit`.
#[derive(Debug, Serialize, JsonSchema)]
pub(crate) struct RunOutput {
    pub schema_version: u32,
    pub root: String,
    pub mode: Mode,
    pub summary: ReportSummary,
    pub plan: Plan,
    pub execution: ExecutionReport,
    pub index_warnings: Vec<String>,
    pub read_errors: Vec<DocumentError>,
}

impl RunOutput {
    pub(crate) fn new(
        root: &Path,
        snapshot: &Snapshot,
        plan: Plan,
        execution: ExecutionReport,
    ) -> Self {
        let mut summary = ReportSummary::from_plan(&plan, Some(&execution));
        summary.documents = snapshot.documents.len();
        summary.artifacts = snapshot.index.len();
        summary.index_warnings = snapshot.index.warnings().len();
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            root: root.display().to_string(),
            mode: execution.mode,
            summary,
            plan,
            execution,
            index_warnings: snapshot
                .index
                .warnings()
                .iter()
                .map(ToString::to_string)
                .collect(),
            read_errors: snapshot
                .read_errors
                .iter()
                .map(|e| DocumentError {
                    document: slash_relative(root, &e.document),
                    error: e.error.clone(),
                })
                .collect(),
        }
    }

    /// Exit status 2: something could not be read or applied.
    pub(crate) fn is_partial(&self) -> bool {
        self.execution.has_failures() || !self.read_errors.is_empty()
    }
}

/// Machine-readable result of `index`.
#[derive(Debug, Serialize, JsonSchema)]
pub(crate) struct IndexOutput {
    pub schema_version: u32,
    pub root: String,
    pub identifiers: usize,
    pub artifacts: Vec<Artifact>,
    pub warnings: Vec<String>,
}

impl IndexOutput {
    pub(crate) fn new(root: &Path, index: &ArtifactIndex) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            root: root.display().to_string(),
            identifiers: index.len(),
            artifacts: index.iter().cloned().collect(),
            warnings: index.warnings().iter().map(ToString::to_string).collect(),
        }
    }
}

pub(crate) fn render_run(out: &RunOutput) -> String {
    let root = Path::new(&out.root);
    let s = &out.summary;
    let mut text = String::new();

    let title = match out.mode {
        Mode::Simulate => "Preview (nothing written)",
        Mode::Commit => "Commit",
    };
    let _ = writeln!(text, "{title}: {}", out.root);
    let _ = writeln!(
        text,
        "  documents: {}, artifacts: {}, index warnings: {}",
        s.documents, s.artifacts, s.index_warnings
    );
    let _ = writeln!(
        text,
        "  placeholders: {} (consistent {}, corrected {}, rejected {})",
        s.placeholders, s.consistent, s.corrected, s.rejected
    );
    let _ = writeln!(
        text,
        "  orphaned {}, collisions {}, conflicts {}",
        s.orphaned, s.collisions, s.conflicts
    );

    if !out.execution.outcomes.is_empty() {
        let _ = writeln!(text, "\nActions ({}):", out.execution.outcomes.len());
        for outcome in &out.execution.outcomes {
            let status = match &outcome.status {
                ActionStatus::Applied if out.mode.is_commit() => "applied".to_string(),
                ActionStatus::Applied => "would apply".to_string(),
                ActionStatus::Skipped { reason } => format!("skipped: {reason}"),
                ActionStatus::Failed { error } => format!("failed: {error}"),
            };
            let _ = writeln!(text, "  [{status}] {}", describe(root, &outcome.action));
        }
    }

    if !out.plan.rejected.is_empty() {
        let _ = writeln!(text, "\nRejected ({}):", out.plan.rejected.len());
        for rejection in &out.plan.rejected {
            let placeholder = &rejection.finding.placeholder;
            let _ = writeln!(
                text,
                "  {}:{} {}: {}",
                slash_relative(root, &placeholder.document),
                placeholder.line,
                placeholder.identifier,
                rejection.reason
            );
        }
    }

    if !out.index_warnings.is_empty() {
        let _ = writeln!(text, "\nIndex warnings:");
        for warning in &out.index_warnings {
            let _ = writeln!(text, "  {warning}");
        }
    }

    if !out.read_errors.is_empty() {
        let _ = writeln!(text, "\nUnreadable documents:");
        for error in &out.read_errors {
            let _ = writeln!(text, "  {}: {}", error.document, error.error);
        }
    }

    if let (Some(applied), Some(skipped), Some(failed)) = (s.applied, s.skipped, s.failed) {
        let verb = if out.mode.is_commit() { "applied" } else { "would apply" };
        let _ = writeln!(
            text,
            "\n{applied} {verb}, {skipped} skipped, {failed} failed"
        );
    }
    text
}

pub(crate) fn render_index(out: &IndexOutput) -> String {
    let root = Path::new(&out.root);
    let mut text = String::new();
    let _ = writeln!(
        text,
        "{} identifier(s), {} file(s) under {}",
        out.identifiers,
        out.artifacts.len(),
        out.root
    );
    for artifact in &out.artifacts {
        let _ = writeln!(
            text,
            "  {:<16} {:<6} {}",
            artifact.identifier.as_str(),
            match artifact.layout {
                ArtifactLayout::Flat => "flat",
                ArtifactLayout::Nested => "nested",
            },
            slash_relative(root, &artifact.path)
        );
    }
    for warning in &out.warnings {
        let _ = writeln!(text, "warning: {warning}");
    }
    text
}

fn describe(root: &Path, action: &CorrectiveAction) -> String {
    match action {
        CorrectiveAction::EditLine {
            document,
            line,
            before,
            after,
        } => format!(
            "{}:{line}\n      - {}\n      + {}",
            slash_relative(root, document),
            before.trim(),
            after.trim()
        ),
        CorrectiveAction::RenameArtifact { from, to } => format!(
            "rename {} -> {}",
            slash_relative(root, from),
            slash_relative(root, to)
        ),
        CorrectiveAction::CopyArtifact { from, to } => format!(
            "copy {} -> {}",
            slash_relative(root, from),
            slash_relative(root, to)
        ),
        CorrectiveAction::RemoveArtifact {
            path,
            superseded_by,
        } => format!(
            "remove {} (superseded by {})",
            slash_relative(root, path),
            slash_relative(root, superseded_by)
        ),
    }
}
