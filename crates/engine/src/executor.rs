//! Applies a plan to the filesystem, or simulates doing so.
//!
//! Simulation and commit run the same code. In simulate mode every file
//! operation lands in an in-memory overlay instead of on disk, so later
//! actions see the state earlier ones would have produced. Each action
//! re-checks its precondition at application time: an action whose `after`
//! state is already present is skipped as already applied, and one whose
//! `before` state is gone is skipped as stale. Applying the same plan twice
//! therefore changes nothing the second time.

use crate::lines::DocumentLines;
use reconcile_protocol::{ActionStatus, CorrectiveAction, ExecutionReport, Mode, Plan, SkipReason};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Filesystem view used while executing one plan.
struct Staging {
    mode: Mode,
    created: HashSet<PathBuf>,
    removed: HashSet<PathBuf>,
    /// Simulated file -> real file holding its bytes.
    origin: HashMap<PathBuf, PathBuf>,
}

impl Staging {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            created: HashSet::new(),
            removed: HashSet::new(),
            origin: HashMap::new(),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        if self.removed.contains(path) {
            return false;
        }
        self.created.contains(path) || path.is_file()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let real = self.origin.get(path).map(PathBuf::as_path).unwrap_or(path);
        fs::read(real)
    }

    fn real_source(&self, path: &Path) -> PathBuf {
        self.origin
            .get(path)
            .cloned()
            .unwrap_or_else(|| path.to_path_buf())
    }

    fn rename(&mut self, from: &Path, to: &Path) -> io::Result<()> {
        if self.mode.is_commit() {
            create_parent(to)?;
            fs::rename(from, to)?;
            prune_routine_dir(from);
            return Ok(());
        }
        let source = self.real_source(from);
        self.origin.remove(from);
        self.origin.insert(to.to_path_buf(), source);
        self.created.remove(from);
        self.removed.insert(from.to_path_buf());
        self.removed.remove(to);
        self.created.insert(to.to_path_buf());
        Ok(())
    }

    fn copy(&mut self, from: &Path, to: &Path) -> io::Result<()> {
        if self.mode.is_commit() {
            create_parent(to)?;
            return fs::copy(from, to).map(|_| ());
        }
        let source = self.real_source(from);
        self.origin.insert(to.to_path_buf(), source);
        self.removed.remove(to);
        self.created.insert(to.to_path_buf());
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> io::Result<()> {
        if self.mode.is_commit() {
            fs::remove_file(path)?;
            prune_routine_dir(path);
            return Ok(());
        }
        self.origin.remove(path);
        self.created.remove(path);
        self.removed.insert(path.to_path_buf());
        Ok(())
    }

    fn write_document(&self, path: &Path, text: &str) -> io::Result<()> {
        if self.mode.is_commit() {
            write_atomic(path, text.as_bytes())
        } else {
            Ok(())
        }
    }
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Drop the `<id>/` directory of a nested artifact once it is empty.
fn prune_routine_dir(file: &Path) {
    let (Some(parent), Some(stem)) = (file.parent(), file.file_stem()) else {
        return;
    };
    if parent.file_name() != Some(stem) {
        return;
    }
    match fs::remove_dir(parent) {
        Ok(()) => log::debug!("removed empty {}", parent.display()),
        Err(err) => log::debug!("kept {}: {err}", parent.display()),
    }
}

/// Write through a uniquely named sibling temp file and rename it into
/// place, so a crash leaves either the old or the new document. The
/// document keeps its permissions.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    if let Ok(metadata) = fs::metadata(path) {
        tmp.as_file().set_permissions(metadata.permissions())?;
    }
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Apply a plan's actions in order. Never aborts: every action gets an
/// outcome.
pub fn apply(plan: &Plan, mode: Mode) -> ExecutionReport {
    apply_actions(&plan.actions, mode)
}

fn apply_actions(actions: &[CorrectiveAction], mode: Mode) -> ExecutionReport {
    let mut staging = Staging::new(mode);
    let mut report = ExecutionReport::new(mode);

    let mut index = 0;
    while index < actions.len() {
        let action = &actions[index];
        if let Some(document) = action.document() {
            let end = actions[index..]
                .iter()
                .position(|a| a.document() != Some(document))
                .map_or(actions.len(), |offset| index + offset);
            apply_edits(&mut staging, document, &actions[index..end], &mut report);
            index = end;
            continue;
        }

        let status = apply_file_action(&mut staging, action);
        log_outcome(action, &status);
        report.record(action.clone(), status);
        index += 1;
    }

    log::info!(
        "{} finished: {} applied, {} skipped, {} failed",
        match mode {
            Mode::Simulate => "Preview",
            Mode::Commit => "Commit",
        },
        report.applied(),
        report.skipped(),
        report.failed()
    );
    report
}

fn apply_file_action(staging: &mut Staging, action: &CorrectiveAction) -> ActionStatus {
    match action {
        CorrectiveAction::RenameArtifact { from, to }
        | CorrectiveAction::CopyArtifact { from, to } => {
            let is_copy = matches!(action, CorrectiveAction::CopyArtifact { .. });
            match (staging.exists(from), staging.exists(to)) {
                (true, false) => {}
                (false, true) => return skipped(SkipReason::AlreadyApplied),
                (true, true) if is_copy => {
                    return match same_bytes(staging, from, to) {
                        Ok(true) => skipped(SkipReason::AlreadyApplied),
                        Ok(false) => stale(format!("{} exists with other contents", to.display())),
                        Err(err) => failed(err),
                    };
                }
                (true, true) => return stale(format!("{} already exists", to.display())),
                (false, false) => {
                    return stale(format!("neither {} nor {} exists", from.display(), to.display()))
                }
            }
            let result = if is_copy {
                staging.copy(from, to)
            } else {
                staging.rename(from, to)
            };
            result.map_or_else(failed, |()| ActionStatus::Applied)
        }
        CorrectiveAction::RemoveArtifact {
            path,
            superseded_by,
        } => {
            if !staging.exists(path) {
                return skipped(SkipReason::AlreadyApplied);
            }
            if !staging.exists(superseded_by) {
                return stale(format!("{} is missing", superseded_by.display()));
            }
            match same_bytes(staging, path, superseded_by) {
                Ok(true) => staging
                    .remove(path)
                    .map_or_else(failed, |()| ActionStatus::Applied),
                Ok(false) => stale(format!(
                    "{} differs from {}",
                    path.display(),
                    superseded_by.display()
                )),
                Err(err) => failed(err),
            }
        }
        CorrectiveAction::EditLine { .. } => failed(io::Error::other("edit outside document pass")),
    }
}

/// Apply one document's edits against a single read and write the result
/// once.
fn apply_edits(
    staging: &mut Staging,
    document: &Path,
    edits: &[CorrectiveAction],
    report: &mut ExecutionReport,
) {
    let text = match fs::read_to_string(document) {
        Ok(text) => text,
        Err(err) => {
            log::warn!("Cannot read {}: {err}", document.display());
            for edit in edits {
                report.record(edit.clone(), failed_with(&err));
            }
            return;
        }
    };

    let mut lines = DocumentLines::parse(&text);
    let first = report.outcomes.len();
    let mut changed = false;

    for edit in edits {
        let CorrectiveAction::EditLine {
            line, before, after, ..
        } = edit
        else {
            continue;
        };
        let status = match lines.get(*line) {
            Some(current) if current == before.as_str() => {
                lines.set(*line, after.clone());
                changed = true;
                ActionStatus::Applied
            }
            Some(current) if current == after.as_str() => skipped(SkipReason::AlreadyApplied),
            Some(current) => stale(current.to_string()),
            None => stale(format!("line {line} is past the end of the document")),
        };
        log_outcome(edit, &status);
        report.record(edit.clone(), status);
    }

    if !changed {
        return;
    }
    if let Err(err) = staging.write_document(document, &lines.render()) {
        log::error!("Failed to write {}: {err}", document.display());
        for outcome in &mut report.outcomes[first..] {
            if matches!(outcome.status, ActionStatus::Applied) {
                outcome.status = failed_with(&err);
            }
        }
    }
}

fn same_bytes(staging: &Staging, left: &Path, right: &Path) -> io::Result<bool> {
    Ok(staging.read(left)? == staging.read(right)?)
}

fn skipped(reason: SkipReason) -> ActionStatus {
    ActionStatus::Skipped { reason }
}

fn stale(found: String) -> ActionStatus {
    skipped(SkipReason::Stale { found })
}

fn failed(err: io::Error) -> ActionStatus {
    failed_with(&err)
}

fn failed_with(err: &io::Error) -> ActionStatus {
    ActionStatus::Failed {
        error: err.to_string(),
    }
}

fn log_outcome(action: &CorrectiveAction, status: &ActionStatus) {
    match status {
        ActionStatus::Applied => log::debug!("applied: {action}"),
        ActionStatus::Skipped { reason } => log::debug!("skipped ({reason}): {action}"),
        ActionStatus::Failed { error } => log::warn!("failed ({error}): {action}"),
    }
}
