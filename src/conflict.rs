use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::fsops;
use crate::model::ConflictReason;

/// Outcome of checking one proposed rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Proposed path equals the original.
    Unchanged,
    /// Target claimed for this batch.
    Pending,
    /// Rename blocked.
    Conflict(ConflictReason),
}

/// Tracks targets claimed by earlier candidates of the current batch.
///
/// Must be fed in candidate order: earlier claims block later duplicates.
pub struct ConflictDetector {
    root: PathBuf,
    /// Case-folded target -> original that claimed it.
    claimed: HashMap<String, String>,
    /// Case-folded path -> original of candidates staying where they are.
    kept: HashMap<String, String>,
}

impl ConflictDetector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            claimed: HashMap::new(),
            kept: HashMap::new(),
        }
    }

    /// Reserve `path` for a candidate that is not moving. Later proposals
    /// folding onto it are duplicates regardless of candidate order.
    pub fn keep(&mut self, path: &str) {
        self.kept.insert(fold(path), path.to_string());
    }

    /// Decide whether `original` may be renamed to `proposed` (both relative,
    /// slash-normalized).
    pub fn evaluate(&mut self, original: &str, proposed: &str) -> Result<Decision> {
        if proposed == original {
            self.keep(original);
            return Ok(Decision::Unchanged);
        }

        let key = fold(proposed);
        let taken_by = self.claimed.get(&key).or_else(|| self.kept.get(&key));
        if let Some(owner) = taken_by
            && owner != original
        {
            return Ok(Decision::Conflict(ConflictReason::DuplicateTarget));
        }

        let target = self.root.join(proposed);
        let existing = fsops::occupied(&target)
            .with_context(|| format!("failed to stat {}", target.display()))?;
        if let Some(meta) = existing {
            let source = self.root.join(original);
            let same = fsops::same_file(&source, &target).unwrap_or(false);
            if !same {
                let reason = if meta.is_dir() {
                    ConflictReason::ExistingDirectory
                } else {
                    ConflictReason::ExistingFile
                };
                return Ok(Decision::Conflict(reason));
            }
        }

        self.claimed.insert(key, original.to_string());
        Ok(Decision::Pending)
    }
}

fn fold(path: &str) -> String {
    path.to_lowercase()
}
