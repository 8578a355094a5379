//! # Reconcile Indexer
//!
//! Read-only snapshots of a decompilation project.
//!
//! ## Pipeline
//!
//! ```text
//! Project root
//!     │
//!     ├──> Artifact tree (walkdir, not .gitignore aware)
//!     │      └─> ArtifactIndex: Identifier -> Artifact(s) + duplicate warnings
//!     │
//!     └──> Source tree (ignore, .gitignore aware)
//!            └─> Source documents, sorted
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use reconcile_indexer::{ArtifactIndex, ArtifactScanOptions};
//! use std::path::Path;
//!
//! let root = Path::new("/path/to/project");
//! let index = ArtifactIndex::build(root, &root.join("asm"), &ArtifactScanOptions::default())?;
//! println!("{} routines, {} warnings", index.len(), index.warnings().len());
//! # Ok::<(), reconcile_indexer::IndexerError>(())
//! ```

mod artifacts;
mod error;
mod scanner;
mod stats;

pub use artifacts::{ArtifactIndex, ArtifactScanOptions, IndexWarning};
pub use error::{IndexerError, Result};
pub use scanner::{DocumentScanner, ScanOptions};
pub use stats::IndexStats;
