//! Placeholder classification.
//!
//! One ordered rule table, evaluated per placeholder against the immutable
//! artifact index:
//!
//! 1. routine identifier present: `Consistent`, or `PathMismatch` when the
//!    path is not the conventional one;
//! 2. correction candidates in fixed order (prefix normalisation, identifier
//!    implied by the path, address shifts in table order). The first one
//!    present in the index with a single file wins: `AddressShifted`, or
//!    `Collision` when the claimed identifier also has a file. When every
//!    candidate on file is ambiguous the result is `Collision`;
//! 3. file present only under an alias prefix: `Misnamed` (rename);
//! 4. anything else: `Orphaned`.
//!
//! Classification is a pure function of the placeholder, the index and the
//! configuration. It never depends on the order placeholders are visited.

use crate::config::{AddressShift, ReconcileConfig};
use reconcile_indexer::ArtifactIndex;
use reconcile_protocol::paths::{directive_paths_match, last_segment};
use reconcile_protocol::{
    Artifact, CorrectiveAction, Finding, FindingKind, Identifier, PathStyle, Placeholder,
    ShiftRule,
};

#[derive(Debug, Clone)]
pub struct Classifier {
    routine_prefix: String,
    alias_prefixes: Vec<String>,
    shifts: Vec<AddressShift>,
    path_style: PathStyle,
}

impl Classifier {
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            routine_prefix: config.routine_prefix.clone(),
            alias_prefixes: config.alias_prefixes.clone(),
            shifts: config.address_shifts.clone(),
            path_style: config.path_style,
        }
    }

    pub fn classify_all(
        &self,
        placeholders: &[Placeholder],
        index: &ArtifactIndex,
    ) -> Vec<Finding> {
        placeholders
            .iter()
            .map(|placeholder| self.classify(placeholder, index))
            .collect()
    }

    pub fn classify(&self, placeholder: &Placeholder, index: &ArtifactIndex) -> Finding {
        let claimed = &placeholder.identifier;

        if claimed.has_prefix(&self.routine_prefix) {
            if let Some(artifact) = index.lookup(claimed) {
                return self.check_path(placeholder, index, artifact);
            }
        }

        let mut ambiguous = None;
        for (candidate, rule) in self.candidates(placeholder) {
            let Some(artifact) = index.lookup(&candidate) else {
                continue;
            };

            let holders = index.artifacts_for(&candidate);
            if holders.len() > 1 {
                if ambiguous.is_none() {
                    let reason = format!(
                        "target resolves to {} files ({})",
                        holders.len(),
                        join_paths(holders)
                    );
                    ambiguous = Some((candidate, reason));
                }
                continue;
            }
            if let Some(existing) = index.lookup(claimed) {
                let reason = format!(
                    "{claimed} also exists at {}; correcting would leave two copies",
                    existing.relative_path
                );
                return collision(placeholder, candidate, reason);
            }

            let path = self.corrected_path(placeholder, &candidate, artifact);
            let actions = edit_line(placeholder, placeholder.rewrite(&path, &candidate));
            return Finding::new(
                placeholder.clone(),
                FindingKind::AddressShifted {
                    target: candidate,
                    rule,
                },
            )
            .with_actions(actions);
        }

        // Every candidate on file is ambiguous.
        if let Some((target, reason)) = ambiguous {
            return collision(placeholder, target, reason);
        }

        if let Some(source) = self.misnamed_source(claimed, index) {
            return self.plan_rename(placeholder, index, source);
        }

        Finding::new(placeholder.clone(), FindingKind::Orphaned)
    }

    /// Correction candidates in fixed priority order, all carrying the
    /// routine prefix and none equal to the claimed identifier.
    pub fn candidates(&self, placeholder: &Placeholder) -> Vec<(Identifier, ShiftRule)> {
        let claimed = &placeholder.identifier;
        let mut out: Vec<(Identifier, ShiftRule)> = Vec::new();
        let mut push = |candidate: Identifier, rule: ShiftRule| {
            if candidate != *claimed
                && candidate.has_prefix(&self.routine_prefix)
                && !out.iter().any(|(seen, _)| *seen == candidate)
            {
                out.push((candidate, rule));
            }
        };

        let is_alias = self.is_alias(claimed);
        let base = if is_alias {
            claimed.with_prefix(&self.routine_prefix)
        } else {
            Some(claimed.clone())
        };

        if let (true, Some(normalized)) = (is_alias, base.clone()) {
            push(
                normalized,
                ShiftRule::Prefix {
                    from: claimed.prefix().to_string(),
                    to: self.routine_prefix.clone(),
                },
            );
        }

        if let Some(implied) = last_segment(&placeholder.path).and_then(Identifier::parse) {
            push(implied, ShiftRule::PathImplied);
        }

        if let Some(base) = base {
            for shift in &self.shifts {
                if !base.address_starts_with(&shift.from) {
                    continue;
                }
                if let Some(shifted) = base.with_address_high_bits(&shift.to) {
                    push(
                        shifted,
                        ShiftRule::Address {
                            from: shift.from.clone(),
                            to: shift.to.clone(),
                        },
                    );
                }
            }
        }

        out
    }

    fn is_alias(&self, id: &Identifier) -> bool {
        self.alias_prefixes
            .iter()
            .any(|prefix| id.has_prefix(prefix))
    }

    fn check_path(
        &self,
        placeholder: &Placeholder,
        index: &ArtifactIndex,
        artifact: &Artifact,
    ) -> Finding {
        let matches_any = index
            .artifacts_for(&placeholder.identifier)
            .iter()
            .any(|a| {
                directive_paths_match(&placeholder.path, &a.conventional_path(self.path_style))
            });
        if matches_any {
            return Finding::new(placeholder.clone(), FindingKind::Consistent);
        }

        let expected = artifact.conventional_path(self.path_style);
        let actions = edit_line(
            placeholder,
            placeholder.rewrite(&expected, &placeholder.identifier),
        );
        Finding::new(placeholder.clone(), FindingKind::PathMismatch { expected })
            .with_actions(actions)
    }

    /// Keep the claimed spelling (with the identifier substituted) when it
    /// already names the right place; fall back to the conventional path.
    fn corrected_path(
        &self,
        placeholder: &Placeholder,
        target: &Identifier,
        artifact: &Artifact,
    ) -> String {
        let conventional = artifact.conventional_path(self.path_style);
        let substituted = placeholder
            .path
            .replace(placeholder.identifier.as_str(), target.as_str());
        if directive_paths_match(&substituted, &conventional) {
            substituted
        } else {
            conventional
        }
    }

    /// Identifier of a file that holds this routine under an alias prefix.
    fn misnamed_source<'a>(
        &self,
        claimed: &Identifier,
        index: &'a ArtifactIndex,
    ) -> Option<&'a Identifier> {
        if self.is_alias(claimed) {
            return index.lookup(claimed).map(|a| &a.identifier);
        }
        if !claimed.has_prefix(&self.routine_prefix) {
            return None;
        }
        self.alias_prefixes
            .iter()
            .filter_map(|prefix| claimed.with_prefix(prefix))
            .find_map(|alias| index.lookup(&alias))
            .map(|a| &a.identifier)
    }

    fn plan_rename(
        &self,
        placeholder: &Placeholder,
        index: &ArtifactIndex,
        source: &Identifier,
    ) -> Finding {
        let Some(target) = source.with_prefix(&self.routine_prefix) else {
            return Finding::new(placeholder.clone(), FindingKind::Orphaned);
        };

        let holders = index.artifacts_for(source);
        let Some(artifact) = holders.first() else {
            return Finding::new(placeholder.clone(), FindingKind::Orphaned);
        };
        if holders.len() > 1 {
            let reason = format!(
                "{source} resolves to {} files ({})",
                holders.len(),
                join_paths(holders)
            );
            return collision(placeholder, target, reason);
        }

        let to = index.sibling_path(artifact, &target);
        let mut actions = vec![CorrectiveAction::RenameArtifact {
            from: artifact.path.clone(),
            to,
        }];

        let renamed = Artifact {
            identifier: target.clone(),
            ..artifact.clone()
        };
        let path = self.corrected_path(placeholder, &target, &renamed);
        actions.extend(edit_line(placeholder, placeholder.rewrite(&path, &target)));

        Finding::new(
            placeholder.clone(),
            FindingKind::Misnamed {
                artifact: artifact.path.clone(),
                source: source.clone(),
                target,
            },
        )
        .with_actions(actions)
    }
}

fn collision(placeholder: &Placeholder, target: Identifier, reason: String) -> Finding {
    Finding::new(
        placeholder.clone(),
        FindingKind::Collision { target, reason },
    )
}

fn edit_line(placeholder: &Placeholder, after: String) -> Vec<CorrectiveAction> {
    if after == placeholder.raw {
        return Vec::new();
    }
    vec![CorrectiveAction::EditLine {
        document: placeholder.document.clone(),
        line: placeholder.line,
        before: placeholder.raw.clone(),
        after,
    }]
}

fn join_paths(artifacts: &[Artifact]) -> String {
    artifacts
        .iter()
        .map(|a| a.relative_path.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use reconcile_indexer::IndexStats;
    use reconcile_protocol::Span;
    use std::path::{Path, PathBuf};

    const ROOT: &str = "/project";

    fn config() -> ReconcileConfig {
        ReconcileConfig::default()
    }

    fn index_of(config: &ReconcileConfig, files: &[&str]) -> ArtifactIndex {
        let root = Path::new(ROOT);
        let options = config.artifact_scan_options();
        let artifacts = files
            .iter()
            .map(|rel| {
                ArtifactIndex::classify_file(root, &root.join(rel), &options)
                    .unwrap_or_else(|| panic!("{rel} is not an artifact"))
            })
            .collect();
        ArtifactIndex::from_artifacts(&options, artifacts, IndexStats::new())
    }

    fn placeholder(path: &str, id: &str) -> Placeholder {
        let raw = format!("INCLUDE_ASM(\"{path}\", {id});");
        let path_start = "INCLUDE_ASM(\"".len();
        let id_start = path_start + path.len() + "\", ".len();
        Placeholder {
            document: PathBuf::from(ROOT).join("src/cd.c"),
            line: 10,
            path: path.to_string(),
            identifier: Identifier::parse(id).unwrap(),
            raw,
            path_span: Span::new(path_start, path_start + path.len()),
            identifier_span: Span::new(id_start, id_start + id.len()),
        }
    }

    fn after_of(finding: &Finding) -> Option<&str> {
        finding.actions.iter().find_map(|action| match action {
            CorrectiveAction::EditLine { after, .. } => Some(after.as_str()),
            _ => None,
        })
    }

    #[test]
    fn consistent_when_identifier_and_path_agree() {
        let config = config();
        let index = index_of(&config, &["asm/nonmatchings/cd/func_8001B3E4.s"]);
        let finding = Classifier::new(&config).classify(
            &placeholder("config/../asm/nonmatchings/cd", "func_8001B3E4"),
            &index,
        );
        assert_eq!(finding.kind, FindingKind::Consistent);
        assert!(finding.actions.is_empty());
    }

    #[test]
    fn nested_layout_is_transparent() {
        let config = config();
        let index = index_of(
            &config,
            &["asm/nonmatchings/cd/func_8001B3E4/func_8001B3E4.s"],
        );
        let finding = Classifier::new(&config)
            .classify(&placeholder("asm/nonmatchings/cd", "func_8001B3E4"), &index);
        assert_eq!(finding.kind, FindingKind::Consistent);
    }

    #[test]
    fn path_mismatch_points_at_the_unit_directory() {
        let config = config();
        let index = index_of(&config, &["asm/nonmatchings/cd/func_8001B3E4.s"]);
        let finding = Classifier::new(&config)
            .classify(&placeholder("asm/nonmatchings", "func_8001B3E4"), &index);
        assert_eq!(
            finding.kind,
            FindingKind::PathMismatch {
                expected: "asm/nonmatchings/cd".to_string()
            }
        );
        assert_eq!(
            after_of(&finding),
            Some("INCLUDE_ASM(\"asm/nonmatchings/cd\", func_8001B3E4);")
        );
    }

    #[test]
    fn address_shift_scenario() {
        let config = ReconcileConfig {
            routine_prefix: "ROUTINE_".to_string(),
            alias_prefixes: Vec::new(),
            path_style: PathStyle::Routine,
            address_shifts: vec![AddressShift::new("8001", "8003")],
            ..ReconcileConfig::default()
        };
        let index = index_of(&config, &["asm/player/ROUTINE_80031234.s"]);
        let finding = Classifier::new(&config).classify(
            &placeholder("asm/player/ROUTINE_80011234", "ROUTINE_80011234"),
            &index,
        );

        assert_eq!(
            finding.kind,
            FindingKind::AddressShifted {
                target: Identifier::parse("ROUTINE_80031234").unwrap(),
                rule: ShiftRule::Address {
                    from: "8001".to_string(),
                    to: "8003".to_string()
                },
            }
        );
        assert_eq!(
            after_of(&finding),
            Some("INCLUDE_ASM(\"asm/player/ROUTINE_80031234\", ROUTINE_80031234);")
        );
    }

    #[test]
    fn shift_priority_follows_the_table_not_the_index() {
        let config = ReconcileConfig {
            address_shifts: vec![
                AddressShift::new("8002", "8001"),
                AddressShift::new("8002", "8003"),
            ],
            ..ReconcileConfig::default()
        };
        let index = index_of(&config, &["asm/a/func_80031234.s", "asm/b/func_80011234.s"]);
        let finding =
            Classifier::new(&config).classify(&placeholder("asm/b", "func_80021234"), &index);
        match finding.kind {
            FindingKind::AddressShifted { target, .. } => {
                assert_eq!(target.as_str(), "func_80011234");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn shifted_path_falls_back_to_conventional_location() {
        let config = config();
        let index = index_of(&config, &["asm/nonmatchings/player/func_80031234.s"]);
        let finding = Classifier::new(&config)
            .classify(&placeholder("asm/nonmatchings/cd", "func_80011234"), &index);
        assert_eq!(
            after_of(&finding),
            Some("INCLUDE_ASM(\"asm/nonmatchings/player\", func_80031234);")
        );
    }

    #[test]
    fn alias_placeholder_with_routine_file_is_a_prefix_shift() {
        let config = config();
        let index = index_of(&config, &["asm/cd/func_8002ABE4.s"]);
        let finding =
            Classifier::new(&config).classify(&placeholder("asm/cd", "D_8002ABE4"), &index);
        assert_eq!(
            finding.kind,
            FindingKind::AddressShifted {
                target: Identifier::parse("func_8002ABE4").unwrap(),
                rule: ShiftRule::Prefix {
                    from: "D_".to_string(),
                    to: "func_".to_string()
                },
            }
        );
    }

    #[test]
    fn alias_file_is_renamed() {
        let config = config();
        let index = index_of(&config, &["asm/cd/D_8002ABE4.s"]);
        let finding =
            Classifier::new(&config).classify(&placeholder("asm/cd", "D_8002ABE4"), &index);
        assert_eq!(
            finding.kind,
            FindingKind::Misnamed {
                artifact: PathBuf::from(ROOT).join("asm/cd/D_8002ABE4.s"),
                source: Identifier::parse("D_8002ABE4").unwrap(),
                target: Identifier::parse("func_8002ABE4").unwrap(),
            }
        );
        assert_eq!(
            finding.actions[0],
            CorrectiveAction::RenameArtifact {
                from: PathBuf::from(ROOT).join("asm/cd/D_8002ABE4.s"),
                to: PathBuf::from(ROOT).join("asm/cd/func_8002ABE4.s"),
            }
        );
        assert_eq!(
            after_of(&finding),
            Some("INCLUDE_ASM(\"asm/cd\", func_8002ABE4);")
        );
    }

    #[test]
    fn routine_placeholder_with_alias_file_renames_without_editing() {
        let config = config();
        let index = index_of(&config, &["asm/cd/D_8002ABE4.s"]);
        let finding =
            Classifier::new(&config).classify(&placeholder("asm/cd", "func_8002ABE4"), &index);
        assert!(matches!(finding.kind, FindingKind::Misnamed { .. }));
        assert_eq!(finding.actions.len(), 1);
    }

    #[test]
    fn both_alias_and_routine_files_collide() {
        let config = config();
        let index = index_of(&config, &["asm/cd/D_8002ABE4.s", "asm/cd/func_8002ABE4.s"]);
        let finding =
            Classifier::new(&config).classify(&placeholder("asm/cd", "D_8002ABE4"), &index);
        assert!(matches!(finding.kind, FindingKind::Collision { .. }));
        assert!(finding.actions.is_empty());
    }

    #[test]
    fn ambiguous_target_collides() {
        let config = config();
        let index = index_of(&config, &["asm/a/func_80031234.s", "asm/b/func_80031234.s"]);
        let finding =
            Classifier::new(&config).classify(&placeholder("asm/a", "func_80011234"), &index);
        match finding.kind {
            FindingKind::Collision { target, reason } => {
                assert_eq!(target.as_str(), "func_80031234");
                assert!(reason.contains("2 files"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ambiguous_candidate_yields_to_a_unique_one() {
        let config = ReconcileConfig {
            address_shifts: vec![
                AddressShift::new("8002", "8001"),
                AddressShift::new("8002", "8003"),
            ],
            ..ReconcileConfig::default()
        };
        let index = index_of(
            &config,
            &[
                "asm/a/func_80011234.s",
                "asm/b/func_80011234.s",
                "asm/c/func_80031234.s",
            ],
        );
        let finding =
            Classifier::new(&config).classify(&placeholder("asm/c", "func_80021234"), &index);
        assert_eq!(
            finding.kind,
            FindingKind::AddressShifted {
                target: Identifier::parse("func_80031234").unwrap(),
                rule: ShiftRule::Address {
                    from: "8002".to_string(),
                    to: "8003".to_string()
                },
            }
        );
        assert_eq!(
            after_of(&finding),
            Some("INCLUDE_ASM(\"asm/c\", func_80031234);")
        );
    }

    #[test]
    fn orphan_scenario() {
        let config = config();
        let index = index_of(&config, &["asm/cd/func_80031234.s"]);
        let finding =
            Classifier::new(&config).classify(&placeholder("asm/cd", "func_80059999"), &index);
        assert_eq!(finding.kind, FindingKind::Orphaned);
        assert!(finding.actions.is_empty());
    }

    #[test]
    fn identifier_implied_by_path_is_a_candidate() {
        let config = ReconcileConfig {
            path_style: PathStyle::Routine,
            ..ReconcileConfig::default()
        };
        let index = index_of(&config, &["asm/cd/func_8001B3E4.s"]);
        let site = placeholder("asm/cd/func_8001B3E4", "func_8001B3E0");
        let finding = Classifier::new(&config).classify(&site, &index);
        assert_eq!(
            finding.kind,
            FindingKind::AddressShifted {
                target: Identifier::parse("func_8001B3E4").unwrap(),
                rule: ShiftRule::PathImplied,
            }
        );
    }

    proptest! {
        #[test]
        fn proptest_classification_ignores_visit_order(
            low in proptest::collection::vec("[0-9A-F]{4}", 1..12),
            rotate in 0usize..12,
        ) {
            let config = config();
            let files: Vec<String> = low
                .iter()
                .step_by(2)
                .map(|l| format!("asm/cd/func_8003{l}.s"))
                .collect();
            let file_refs: Vec<&str> = files.iter().map(String::as_str).collect();
            let index = index_of(&config, &file_refs);
            let classifier = Classifier::new(&config);

            let placeholders: Vec<Placeholder> = low
                .iter()
                .map(|l| placeholder("asm/cd", &format!("func_8001{l}")))
                .collect();
            let forward = classifier.classify_all(&placeholders, &index);

            let mut rotated = placeholders.clone();
            let len = rotated.len();
            rotated.rotate_left(rotate % len);
            let backward = classifier.classify_all(&rotated, &index);

            for finding in &forward {
                let twin = backward
                    .iter()
                    .find(|f| f.placeholder == finding.placeholder)
                    .expect("same placeholder");
                prop_assert_eq!(finding, twin);
            }
        }
    }
}
