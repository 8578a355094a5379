use crate::{CorrectiveAction, FindingKind, Plan, RejectReason};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Whether the executor touches the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Simulate,
    Commit,
}

impl Mode {
    #[must_use]
    pub const fn is_commit(self) -> bool {
        matches!(self, Mode::Commit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "skip", rename_all = "snake_case")]
pub enum SkipReason {
    /// The `after` state is already present.
    AlreadyApplied,
    /// Neither `before` nor `after` matches what is on disk.
    Stale { found: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyApplied => f.write_str("already applied"),
            SkipReason::Stale { found } => write!(f, "stale: {found}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionStatus {
    Applied,
    Skipped { reason: SkipReason },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActionOutcome {
    pub action: CorrectiveAction,
    #[serde(flatten)]
    pub status: ActionStatus,
}

/// Per-action result of one executor pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionReport {
    pub mode: Mode,
    pub outcomes: Vec<ActionOutcome>,
}

impl ExecutionReport {
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, action: CorrectiveAction, status: ActionStatus) {
        self.outcomes.push(ActionOutcome { action, status });
    }

    #[must_use]
    pub fn applied(&self) -> usize {
        self.count(|s| matches!(s, ActionStatus::Applied))
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ActionStatus::Skipped { .. }))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ActionStatus::Failed { .. }))
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, pred: impl Fn(&ActionStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Headline numbers for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportSummary {
    pub documents: usize,
    pub artifacts: usize,
    pub index_warnings: usize,
    pub placeholders: usize,
    pub consistent: usize,
    pub corrected: usize,
    pub orphaned: usize,
    /// Rejected on a direct or second-order collision.
    pub collisions: usize,
    /// Rejected because another correction edits the same line or path.
    pub conflicts: usize,
    pub rejected: usize,
    pub actions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
}

impl ReportSummary {
    #[must_use]
    pub fn from_plan(plan: &Plan, execution: Option<&ExecutionReport>) -> Self {
        let rejected_where = |pred: fn(&RejectReason) -> bool| {
            plan.rejected.iter().filter(|r| pred(&r.reason)).count()
        };
        let orphaned = rejected_where(|r| matches!(r, RejectReason::NoMatchingArtifact))
            + plan
                .accepted
                .iter()
                .filter(|f| matches!(f.kind, FindingKind::Orphaned))
                .count();
        Self {
            placeholders: plan.placeholder_count(),
            consistent: plan.consistent.len(),
            corrected: plan
                .accepted
                .iter()
                .filter(|f| !matches!(f.kind, FindingKind::Orphaned))
                .count(),
            orphaned,
            collisions: rejected_where(RejectReason::is_collision),
            conflicts: rejected_where(|r| matches!(r, RejectReason::ConflictingAction { .. })),
            rejected: plan.rejected.len(),
            actions: plan.actions.len(),
            applied: execution.map(ExecutionReport::applied),
            skipped: execution.map(ExecutionReport::skipped),
            failed: execution.map(ExecutionReport::failed),
            ..Self::default()
        }
    }
}
