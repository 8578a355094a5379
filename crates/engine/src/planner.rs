//! Turns findings into an immutable plan.
//!
//! Each placeholder ends up in exactly one bucket: consistent, accepted or
//! rejected. A correction is rejected when it is ambiguous on its own
//! (collision), when two different identifiers would converge on the same
//! final identifier, or when its actions contradict another finding's
//! actions. Rejection never drops a finding from the plan.

use crate::config::{LayoutPolicy, ReconcileConfig};
use crate::layout::plan_layout;
use reconcile_indexer::ArtifactIndex;
use reconcile_protocol::{
    CorrectiveAction, Finding, FindingKind, Identifier, Placeholder, Plan, RejectReason, Rejection,
};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Planner {
    comment_orphans: bool,
    artifact_extension: String,
    layout: LayoutPolicy,
    remove_originals: bool,
}

impl Planner {
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            comment_orphans: config.comment_orphans,
            artifact_extension: config.artifact_extension.clone(),
            layout: config.artifact_layout,
            remove_originals: config.remove_originals,
        }
    }

    /// Plan placeholder corrections only.
    pub fn plan(&self, findings: Vec<Finding>) -> Plan {
        let mut findings = findings;
        findings.sort_by(by_location);

        let mut plan = Plan::default();
        let mut pending: Vec<Finding> = Vec::new();

        for finding in findings {
            match &finding.kind {
                FindingKind::Consistent => plan.consistent.push(finding.placeholder),
                FindingKind::Orphaned if self.comment_orphans => {
                    let edit = self.comment_out(&finding);
                    pending.push(finding.with_actions(vec![edit]));
                }
                FindingKind::Orphaned => plan.rejected.push(Rejection {
                    finding,
                    reason: RejectReason::NoMatchingArtifact,
                }),
                FindingKind::Collision { target, reason } => {
                    let reason = RejectReason::Collision {
                        target: target.clone(),
                        detail: reason.clone(),
                    };
                    plan.rejected.push(Rejection { finding, reason });
                }
                _ => pending.push(finding),
            }
        }

        let pending = reject_converging(pending, &plan.consistent, &mut plan.rejected);
        let accepted = reject_conflicting(pending, &mut plan.rejected);

        let mut seen = HashSet::new();
        for finding in &accepted {
            for action in &finding.actions {
                if seen.insert(action.clone()) {
                    plan.actions.push(action.clone());
                }
            }
        }
        plan.accepted = accepted;
        plan.rejected.sort_by(|a, b| by_location(&a.finding, &b.finding));
        sort_actions(&mut plan.actions);

        log::info!(
            "Planned {} action(s): {} consistent, {} accepted, {} rejected",
            plan.actions.len(),
            plan.consistent.len(),
            plan.accepted.len(),
            plan.rejected.len()
        );
        plan
    }

    /// Plan placeholder corrections plus the layout migration the
    /// configuration asks for.
    pub fn plan_with_layout(&self, findings: Vec<Finding>, index: &ArtifactIndex) -> Plan {
        let mut plan = self.plan(findings);
        let layout = plan_layout(index, self.layout, self.remove_originals);
        if layout.is_empty() {
            return plan;
        }

        let mut claimed_from: HashSet<PathBuf> = HashSet::new();
        let mut claimed_to: HashSet<PathBuf> = HashSet::new();
        for action in &plan.actions {
            if let Some((from, to)) = file_move(action) {
                claimed_from.insert(from.to_path_buf());
                claimed_to.insert(to.to_path_buf());
            }
        }

        let mut seen: HashSet<CorrectiveAction> = plan.actions.iter().cloned().collect();
        for action in layout {
            let touched = match &action {
                CorrectiveAction::CopyArtifact { from, to } => {
                    claimed_from.contains(from) || claimed_to.contains(to)
                }
                CorrectiveAction::RemoveArtifact { path, .. } => claimed_from.contains(path),
                _ => false,
            };
            if touched {
                log::warn!("Dropping layout action that overlaps a correction: {action}");
                continue;
            }
            if seen.insert(action.clone()) {
                plan.actions.push(action);
            }
        }

        sort_actions(&mut plan.actions);
        plan
    }

    fn comment_out(&self, finding: &Finding) -> CorrectiveAction {
        let placeholder = &finding.placeholder;
        let body = placeholder.raw.trim_start();
        let indent = &placeholder.raw[..placeholder.raw.len() - body.len()];
        CorrectiveAction::EditLine {
            document: placeholder.document.clone(),
            line: placeholder.line,
            before: placeholder.raw.clone(),
            after: format!(
                "{indent}// {body} // MISSING: {}.{}",
                placeholder.identifier, self.artifact_extension
            ),
        }
    }
}

/// Identifier whose artifact a finding currently relies on.
fn source_identifier(finding: &Finding) -> &Identifier {
    match &finding.kind {
        FindingKind::Misnamed { source, .. } => source,
        _ => &finding.placeholder.identifier,
    }
}

/// Reject every correction whose final identifier is also reached from a
/// different source identifier (by another correction or by a placeholder
/// that is already consistent).
fn reject_converging(
    pending: Vec<Finding>,
    consistent: &[Placeholder],
    rejected: &mut Vec<Rejection>,
) -> Vec<Finding> {
    let mut sources: BTreeMap<Identifier, BTreeSet<Identifier>> = BTreeMap::new();
    for placeholder in consistent {
        sources
            .entry(placeholder.identifier.clone())
            .or_default()
            .insert(placeholder.identifier.clone());
    }
    for finding in &pending {
        if let Some(target) = finding.kind.final_identifier(&finding.placeholder.identifier) {
            sources
                .entry(target.clone())
                .or_default()
                .insert(source_identifier(finding).clone());
        }
    }

    let mut kept = Vec::with_capacity(pending.len());
    for finding in pending {
        let target = finding
            .kind
            .final_identifier(&finding.placeholder.identifier)
            .cloned();
        let group = target.as_ref().and_then(|t| sources.get(t));
        match (target, group) {
            (Some(target), Some(group)) if group.len() > 1 => {
                log::debug!(
                    "{}: {target} reached from {} identifiers",
                    finding.placeholder.location(),
                    group.len()
                );
                let reason = RejectReason::CollidingTargets {
                    target,
                    sources: group.iter().cloned().collect(),
                };
                rejected.push(Rejection { finding, reason });
            }
            _ => kept.push(finding),
        }
    }
    kept
}

/// Reject findings whose actions disagree with another finding's actions:
/// two edits of one line with different results, or file moves sharing a
/// source or destination with different counterparts.
fn reject_conflicting(pending: Vec<Finding>, rejected: &mut Vec<Rejection>) -> Vec<Finding> {
    let mut edits: BTreeMap<(PathBuf, usize), BTreeSet<String>> = BTreeMap::new();
    let mut by_from: BTreeMap<PathBuf, BTreeSet<PathBuf>> = BTreeMap::new();
    let mut by_to: BTreeMap<PathBuf, BTreeSet<PathBuf>> = BTreeMap::new();

    for action in pending.iter().flat_map(|f| f.actions.iter()) {
        if let CorrectiveAction::EditLine {
            document,
            line,
            after,
            ..
        } = action
        {
            edits
                .entry((document.clone(), *line))
                .or_default()
                .insert(after.clone());
        }
        if let Some((from, to)) = file_move(action) {
            by_from
                .entry(from.to_path_buf())
                .or_default()
                .insert(to.to_path_buf());
            by_to
                .entry(to.to_path_buf())
                .or_default()
                .insert(from.to_path_buf());
        }
    }

    let conflict = |action: &CorrectiveAction| -> Option<String> {
        if let CorrectiveAction::EditLine { document, line, .. } = action {
            let afters = edits.get(&(document.clone(), *line))?;
            if afters.len() > 1 {
                return Some(format!(
                    "{}:{line} has {} different replacements",
                    document.display(),
                    afters.len()
                ));
            }
        }
        if let Some((from, to)) = file_move(action) {
            if by_from.get(from).is_some_and(|targets| targets.len() > 1) {
                return Some(format!("{} is moved to more than one place", from.display()));
            }
            if by_to.get(to).is_some_and(|sources| sources.len() > 1) {
                return Some(format!("{} is produced by more than one file", to.display()));
            }
        }
        None
    };

    let mut kept = Vec::with_capacity(pending.len());
    for finding in pending {
        match finding.actions.iter().find_map(&conflict) {
            Some(detail) => rejected.push(Rejection {
                finding,
                reason: RejectReason::ConflictingAction { detail },
            }),
            None => kept.push(finding),
        }
    }
    kept
}

fn file_move(action: &CorrectiveAction) -> Option<(&Path, &Path)> {
    match action {
        CorrectiveAction::RenameArtifact { from, to }
        | CorrectiveAction::CopyArtifact { from, to } => Some((from.as_path(), to.as_path())),
        _ => None,
    }
}

fn by_location(a: &Finding, b: &Finding) -> Ordering {
    (&a.placeholder.document, a.placeholder.line)
        .cmp(&(&b.placeholder.document, b.placeholder.line))
}

/// File operations by source path, then removals, then edits grouped by
/// document with lines descending.
fn sort_actions(actions: &mut [CorrectiveAction]) {
    actions.sort_by(|a, b| {
        a.phase()
            .cmp(&b.phase())
            .then_with(|| sort_key(a).cmp(&sort_key(b)))
    });
}

fn sort_key(action: &CorrectiveAction) -> (&Path, Reverse<usize>, &Path, &str) {
    match action {
        CorrectiveAction::EditLine {
            document,
            line,
            after,
            ..
        } => (document.as_path(), Reverse(*line), Path::new(""), after.as_str()),
        CorrectiveAction::RenameArtifact { from, to }
        | CorrectiveAction::CopyArtifact { from, to } => {
            (from.as_path(), Reverse(0), to.as_path(), action.label())
        }
        CorrectiveAction::RemoveArtifact {
            path,
            superseded_by,
        } => (path.as_path(), Reverse(0), superseded_by.as_path(), ""),
    }
}
