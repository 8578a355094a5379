//! # Reconcile Engine
//!
//! Keeps placeholder directives in source documents consistent with the
//! disassembled routine files they name.
//!
//! ## Pipeline
//!
//! ```text
//! Project root
//!     │
//!     ├──> ArtifactIndex (read-only snapshot)
//!     ├──> PlaceholderExtractor ──> Placeholders
//!     │
//!     ├──> Classifier ──> Findings (one per placeholder)
//!     ├──> Planner    ──> Plan (actions + rejections, immutable)
//!     │
//!     └──> Executor   ──> ExecutionReport (simulate or commit)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use reconcile_engine::{ReconcileConfig, Reconciler};
//! use reconcile_protocol::Mode;
//!
//! let root = std::path::Path::new("/path/to/project");
//! let reconciler = Reconciler::new(root, ReconcileConfig::discover(root)?)?;
//! let run = reconciler.run(Mode::Simulate)?;
//! println!("{} action(s) planned", run.plan.actions.len());
//! # Ok::<(), reconcile_engine::EngineError>(())
//! ```

mod classifier;
mod config;
mod error;
mod executor;
mod extractor;
mod layout;
mod lines;
mod planner;

pub use classifier::Classifier;
pub use config::{
    default_address_shifts, AddressShift, LayoutPolicy, ReconcileConfig, CONFIG_FILE_NAME,
};
pub use error::{EngineError, Result};
pub use executor::apply;
pub use extractor::PlaceholderExtractor;
pub use layout::plan_layout;
pub use planner::Planner;

use reconcile_indexer::{ArtifactIndex, DocumentScanner};
use reconcile_protocol::{ExecutionReport, Finding, Mode, Placeholder, Plan};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A source document that could not be read. Its placeholders are missing
/// from the snapshot; the rest of the run is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadError {
    pub document: PathBuf,
    pub error: String,
}

/// Everything a run reasons about, captured before any mutation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub index: ArtifactIndex,
    pub documents: Vec<PathBuf>,
    pub placeholders: Vec<Placeholder>,
    pub read_errors: Vec<ReadError>,
}

/// Output of a full pass.
#[derive(Debug, Clone)]
pub struct Run {
    pub snapshot: Snapshot,
    pub plan: Plan,
    pub report: ExecutionReport,
}

pub struct Reconciler {
    root: PathBuf,
    config: ReconcileConfig,
    extractor: PlaceholderExtractor,
    classifier: Classifier,
    planner: Planner,
}

impl Reconciler {
    pub fn new(root: impl AsRef<Path>, config: ReconcileConfig) -> Result<Self> {
        config.validate().map_err(EngineError::invalid_config)?;
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(EngineError::InvalidPath(format!(
                "project root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            extractor: PlaceholderExtractor::new(&config.directive)?,
            classifier: Classifier::new(&config),
            planner: Planner::new(&config),
            root,
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn build_index(&self) -> Result<ArtifactIndex> {
        let artifact_root = self.root.join(&self.config.artifact_dir);
        Ok(ArtifactIndex::build(
            &self.root,
            &artifact_root,
            &self.config.artifact_scan_options(),
        )?)
    }

    /// Index artifacts and extract placeholders. Reads only.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let index = self.build_index()?;

        let source_root = self.root.join(&self.config.source_dir);
        if !source_root.is_dir() {
            return Err(EngineError::InvalidPath(format!(
                "source directory {} does not exist",
                source_root.display()
            )));
        }
        let documents =
            DocumentScanner::new(&source_root, self.config.document_scan_options()).scan();

        let mut placeholders = Vec::new();
        let mut read_errors = Vec::new();
        for document in &documents {
            match std::fs::read_to_string(document) {
                Ok(text) => placeholders.extend(self.extractor.extract(document, &text)),
                Err(err) => {
                    log::warn!("Failed to read {}: {err}", document.display());
                    read_errors.push(ReadError {
                        document: document.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        log::info!(
            "Found {} placeholder(s) in {} document(s)",
            placeholders.len(),
            documents.len()
        );
        Ok(Snapshot {
            index,
            documents,
            placeholders,
            read_errors,
        })
    }

    pub fn classify(&self, snapshot: &Snapshot) -> Vec<Finding> {
        self.classifier
            .classify_all(&snapshot.placeholders, &snapshot.index)
    }

    pub fn plan(&self, snapshot: &Snapshot) -> Plan {
        self.planner
            .plan_with_layout(self.classify(snapshot), &snapshot.index)
    }

    pub fn apply(&self, plan: &Plan, mode: Mode) -> ExecutionReport {
        executor::apply(plan, mode)
    }

    /// Snapshot, plan and apply in one go.
    pub fn run(&self, mode: Mode) -> Result<Run> {
        let snapshot = self.snapshot()?;
        let plan = self.plan(&snapshot);
        let report = self.apply(&plan, mode);
        Ok(Run {
            snapshot,
            plan,
            report,
        })
    }
}
