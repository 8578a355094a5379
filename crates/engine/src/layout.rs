//! Layout migration between `<unit>/<id>.<ext>` and `<unit>/<id>/<id>.<ext>`.
//!
//! Migration copies first. Originals are only removed when the run opted in,
//! and each removal names the copy that supersedes it so the executor can
//! verify the bytes before deleting anything.

use crate::config::LayoutPolicy;
use reconcile_indexer::ArtifactIndex;
use reconcile_protocol::{Artifact, ArtifactLayout, CorrectiveAction};
use std::path::PathBuf;

pub fn plan_layout(
    index: &ArtifactIndex,
    policy: LayoutPolicy,
    remove_originals: bool,
) -> Vec<CorrectiveAction> {
    let wanted = match policy {
        LayoutPolicy::Any => return Vec::new(),
        LayoutPolicy::Flat => ArtifactLayout::Flat,
        LayoutPolicy::Nested => ArtifactLayout::Nested,
    };

    let mut actions = Vec::new();
    for artifact in index.iter() {
        if artifact.layout == wanted || !artifact.identifier.has_prefix(index.routine_prefix()) {
            continue;
        }

        let twin = index
            .artifacts_for(&artifact.identifier)
            .iter()
            .find(|other| other.layout == wanted && other.unit_dir == artifact.unit_dir);

        let destination = match twin {
            Some(existing) => existing.path.clone(),
            None => {
                let Some(to) = relocated_path(index, artifact, wanted) else {
                    log::warn!(
                        "Cannot derive {} location for {}",
                        layout_name(wanted),
                        artifact.relative_path
                    );
                    continue;
                };
                actions.push(CorrectiveAction::CopyArtifact {
                    from: artifact.path.clone(),
                    to: to.clone(),
                });
                to
            }
        };

        if remove_originals {
            actions.push(CorrectiveAction::RemoveArtifact {
                path: artifact.path.clone(),
                superseded_by: destination,
            });
        }
    }

    log::debug!(
        "Layout policy {} planned {} action(s)",
        layout_name(wanted),
        actions.len()
    );
    actions
}

fn relocated_path(
    index: &ArtifactIndex,
    artifact: &Artifact,
    wanted: ArtifactLayout,
) -> Option<PathBuf> {
    let file_name = format!("{}.{}", artifact.identifier, index.extension());
    let parent = artifact.path.parent()?;
    match wanted {
        ArtifactLayout::Nested => Some(parent.join(artifact.identifier.as_str()).join(file_name)),
        ArtifactLayout::Flat => Some(parent.parent()?.join(file_name)),
    }
}

const fn layout_name(layout: ArtifactLayout) -> &'static str {
    match layout {
        ArtifactLayout::Flat => "flat",
        ArtifactLayout::Nested => "nested",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reconcile_indexer::{ArtifactScanOptions, IndexStats};
    use std::path::Path;

    fn index_of(files: &[&str]) -> ArtifactIndex {
        let root = Path::new("/project");
        let options = ArtifactScanOptions::default();
        let artifacts = files
            .iter()
            .filter_map(|rel| ArtifactIndex::classify_file(root, &root.join(rel), &options))
            .collect();
        ArtifactIndex::from_artifacts(&options, artifacts, IndexStats::new())
    }

    #[test]
    fn any_plans_nothing() {
        let index = index_of(&["asm/cd/func_80010000.s"]);
        assert!(plan_layout(&index, LayoutPolicy::Any, true).is_empty());
    }

    #[test]
    fn nested_copies_flat_routines_and_keeps_originals() {
        let index = index_of(&[
            "asm/cd/func_80010000.s",
            "asm/cd/func_80010010/func_80010010.s",
            "asm/cd/D_80010020.s",
        ]);
        assert_eq!(
            plan_layout(&index, LayoutPolicy::Nested, false),
            vec![CorrectiveAction::CopyArtifact {
                from: PathBuf::from("/project/asm/cd/func_80010000.s"),
                to: PathBuf::from("/project/asm/cd/func_80010000/func_80010000.s"),
            }]
        );
    }

    #[test]
    fn removal_is_opt_in_and_names_its_replacement() {
        let index = index_of(&[
            "asm/cd/func_80010000.s",
            "asm/cd/func_80010010.s",
            "asm/cd/func_80010010/func_80010010.s",
        ]);
        let actions = plan_layout(&index, LayoutPolicy::Nested, true);
        assert_eq!(
            actions,
            vec![
                CorrectiveAction::CopyArtifact {
                    from: PathBuf::from("/project/asm/cd/func_80010000.s"),
                    to: PathBuf::from("/project/asm/cd/func_80010000/func_80010000.s"),
                },
                CorrectiveAction::RemoveArtifact {
                    path: PathBuf::from("/project/asm/cd/func_80010000.s"),
                    superseded_by: PathBuf::from("/project/asm/cd/func_80010000/func_80010000.s"),
                },
                CorrectiveAction::RemoveArtifact {
                    path: PathBuf::from("/project/asm/cd/func_80010010.s"),
                    superseded_by: PathBuf::from("/project/asm/cd/func_80010010/func_80010010.s"),
                },
            ]
        );
    }

    #[test]
    fn flat_policy_is_the_reverse_migration() {
        let index = index_of(&["asm/cd/func_80010010/func_80010010.s"]);
        assert_eq!(
            plan_layout(&index, LayoutPolicy::Flat, false),
            vec![CorrectiveAction::CopyArtifact {
                from: PathBuf::from("/project/asm/cd/func_80010010/func_80010010.s"),
                to: PathBuf::from("/project/asm/cd/func_80010010.s"),
            }]
        );
    }
}
