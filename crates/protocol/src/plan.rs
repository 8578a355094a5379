use crate::{Identifier, Placeholder};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which correction produced an `AddressShifted` target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ShiftRule {
    /// Alias prefix replaced by the routine prefix (`D_` -> `func_`).
    Prefix { from: String, to: String },
    /// Identifier spelled in the last segment of the directive path.
    PathImplied,
    /// Leading address digits substituted (`8001` -> `8003`).
    Address { from: String, to: String },
}

impl fmt::Display for ShiftRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShiftRule::Prefix { from, to } => write!(f, "prefix {from} -> {to}"),
            ShiftRule::PathImplied => f.write_str("identifier implied by path"),
            ShiftRule::Address { from, to } => write!(f, "address {from}.. -> {to}.."),
        }
    }
}

/// Classification of one placeholder against the artifact index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingKind {
    Consistent,
    AddressShifted { target: Identifier, rule: ShiftRule },
    PathMismatch { expected: String },
    /// The routine's file carries an alias prefix and must be renamed.
    Misnamed {
        artifact: PathBuf,
        source: Identifier,
        target: Identifier,
    },
    Orphaned,
    Collision { target: Identifier, reason: String },
}

impl FindingKind {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            FindingKind::Consistent => "consistent",
            FindingKind::AddressShifted { .. } => "address_shifted",
            FindingKind::PathMismatch { .. } => "path_mismatch",
            FindingKind::Misnamed { .. } => "misnamed",
            FindingKind::Orphaned => "orphaned",
            FindingKind::Collision { .. } => "collision",
        }
    }

    /// Identifier the placeholder should reference once its actions land.
    #[must_use]
    pub fn final_identifier<'a>(&'a self, claimed: &'a Identifier) -> Option<&'a Identifier> {
        match self {
            FindingKind::Consistent | FindingKind::PathMismatch { .. } => Some(claimed),
            FindingKind::AddressShifted { target, .. } | FindingKind::Misnamed { target, .. } => {
                Some(target)
            }
            FindingKind::Orphaned | FindingKind::Collision { .. } => None,
        }
    }
}

/// Classifier output: the finding plus the edits that would resolve it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Finding {
    pub placeholder: Placeholder,
    pub kind: FindingKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<CorrectiveAction>,
}

impl Finding {
    #[must_use]
    pub fn new(placeholder: Placeholder, kind: FindingKind) -> Self {
        Self {
            placeholder,
            kind,
            actions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_actions(mut self, actions: Vec<CorrectiveAction>) -> Self {
        self.actions = actions;
        self
    }

    #[must_use]
    pub fn is_consistent(&self) -> bool {
        matches!(self.kind, FindingKind::Consistent)
    }
}

/// A single planned mutation with the before/after state it expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CorrectiveAction {
    EditLine {
        document: PathBuf,
        line: usize,
        before: String,
        after: String,
    },
    RenameArtifact { from: PathBuf, to: PathBuf },
    CopyArtifact { from: PathBuf, to: PathBuf },
    /// Only planned on explicit opt-in, after `superseded_by` is in place.
    RemoveArtifact {
        path: PathBuf,
        superseded_by: PathBuf,
    },
}

impl CorrectiveAction {
    #[must_use]
    pub const fn is_destructive(&self) -> bool {
        matches!(self, CorrectiveAction::RemoveArtifact { .. })
    }

    /// Execution phase: file renames/copies, then removals, then text edits.
    #[must_use]
    pub const fn phase(&self) -> u8 {
        match self {
            CorrectiveAction::RenameArtifact { .. } | CorrectiveAction::CopyArtifact { .. } => 0,
            CorrectiveAction::RemoveArtifact { .. } => 1,
            CorrectiveAction::EditLine { .. } => 2,
        }
    }

    #[must_use]
    pub fn document(&self) -> Option<&Path> {
        match self {
            CorrectiveAction::EditLine { document, .. } => Some(document),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            CorrectiveAction::EditLine { .. } => "edit",
            CorrectiveAction::RenameArtifact { .. } => "rename",
            CorrectiveAction::CopyArtifact { .. } => "copy",
            CorrectiveAction::RemoveArtifact { .. } => "remove",
        }
    }
}

impl fmt::Display for CorrectiveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrectiveAction::EditLine {
                document,
                line,
                before,
                after,
            } => write!(
                f,
                "{}:{line}: `{}` -> `{}`",
                document.display(),
                before.trim(),
                after.trim()
            ),
            CorrectiveAction::RenameArtifact { from, to } => {
                write!(f, "rename {} -> {}", from.display(), to.display())
            }
            CorrectiveAction::CopyArtifact { from, to } => {
                write!(f, "copy {} -> {}", from.display(), to.display())
            }
            CorrectiveAction::RemoveArtifact {
                path,
                superseded_by,
            } => write!(
                f,
                "remove {} (superseded by {})",
                path.display(),
                superseded_by.display()
            ),
        }
    }
}

/// Why a finding was kept out of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    NoMatchingArtifact,
    Collision { target: Identifier, detail: String },
    /// Two or more distinct identifiers would end up as `target`.
    CollidingTargets {
        target: Identifier,
        sources: Vec<Identifier>,
    },
    ConflictingAction { detail: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoMatchingArtifact => f.write_str("no matching artifact"),
            RejectReason::Collision { target, detail } => {
                write!(f, "collision on {target}: {detail}")
            }
            RejectReason::CollidingTargets { target, sources } => {
                let sources: Vec<&str> = sources.iter().map(Identifier::as_str).collect();
                write!(
                    f,
                    "{target} would be reached from {} different identifiers ({})",
                    sources.len(),
                    sources.join(", ")
                )
            }
            RejectReason::ConflictingAction { detail } => write!(f, "conflicting action: {detail}"),
        }
    }
}

impl RejectReason {
    /// Direct or second-order collision on a target identifier.
    #[must_use]
    pub const fn is_collision(&self) -> bool {
        matches!(
            self,
            RejectReason::Collision { .. } | RejectReason::CollidingTargets { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Rejection {
    pub finding: Finding,
    pub reason: RejectReason,
}

/// Immutable output of the planner.
///
/// Every input placeholder lands in exactly one of `consistent`, `accepted`
/// or `rejected`. `actions` is ordered for application and free of
/// duplicates; it may also hold layout actions that no placeholder asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    pub actions: Vec<CorrectiveAction>,
    pub consistent: Vec<Placeholder>,
    pub accepted: Vec<Finding>,
    pub rejected: Vec<Rejection>,
}

impl Plan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.consistent.len() + self.accepted.len() + self.rejected.len()
    }

    /// Number of rejected findings whose classification was `kind`.
    #[must_use]
    pub fn rejected_with_label(&self, label: &str) -> usize {
        self.rejected
            .iter()
            .filter(|r| r.finding.kind.label() == label)
            .count()
    }

    #[must_use]
    pub fn has_destructive_actions(&self) -> bool {
        self.actions.iter().any(CorrectiveAction::is_destructive)
    }
}
