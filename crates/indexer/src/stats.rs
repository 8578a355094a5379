use serde::{Deserialize, Serialize};

/// Counters collected while building an artifact index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Files visited under the artifact root
    pub files_seen: usize,

    /// Files indexed under the routine prefix
    pub routines: usize,

    /// Files indexed under an alias prefix
    pub aliases: usize,

    /// Files laid out as `<id>/<id>.<ext>`
    pub nested: usize,

    /// Files whose name did not parse as an identifier
    pub skipped: usize,

    /// Entries the walker could not read
    pub errors: Vec<String>,
}

impl IndexStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }
}
