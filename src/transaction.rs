use anyhow::Result;
use std::io;
use std::path::{Path, PathBuf};

use crate::cancel::CancelToken;
use crate::error::ApplyError;
use crate::fsops;
use crate::ledger::{BatchMetadata, Ledger, LedgerEntry, Operation};
use crate::model::{Plan, ProposedEntry};

/// All-or-nothing rename batch.
///
/// Every successful rename is remembered so the batch can be reverted if a
/// later rename, cancellation, or the ledger append fails.
pub struct TransactionManager {
    root: PathBuf,
    cancel: CancelToken,
    applied: Vec<Operation>,
}

impl TransactionManager {
    pub fn new(root: impl Into<PathBuf>, cancel: CancelToken) -> Self {
        Self {
            root: root.into(),
            cancel,
            applied: Vec::new(),
        }
    }

    pub fn applied(&self) -> &[Operation] {
        &self.applied
    }

    /// Rename one planned entry. Returns `None` for a no-op.
    pub fn execute(&mut self, entry: &ProposedEntry) -> Result<Option<&Operation>> {
        self.cancel.check()?;
        let from = &entry.candidate.relative_path;
        let to = &entry.proposed_relative_path;
        if from == to {
            return Ok(None);
        }

        let src = self.root.join(from);
        let dst = self.root.join(to);
        if fsops::occupied(&dst)?.is_some() && !fsops::same_file(&src, &dst).unwrap_or(false) {
            return Err(ApplyError::DestinationExists(to.clone()).into());
        }
        fsops::ensure_parent(&dst)?;
        fsops::rename(&src, &dst)?;
        tracing::debug!(from = %from, to = %to, "renamed");

        self.applied.push(Operation {
            from: from.clone(),
            to: to.clone(),
        });
        Ok(self.applied.last())
    }

    /// Revert applied renames newest first. Entries that have already
    /// vanished are ignored; any other failure is reported after every
    /// reversal has been attempted.
    pub fn rollback(&mut self) -> Result<usize> {
        let applied = std::mem::take(&mut self.applied);
        let mut restored = 0;
        let mut first_error = None;
        for op in applied.iter().rev() {
            match revert(&self.root, op) {
                Ok(()) => restored += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    tracing::warn!(path = %op.to, "rollback source missing, skipping");
                }
                Err(err) => {
                    tracing::error!(from = %op.to, to = %op.from, error = %err, "rollback failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        tracing::warn!(restored, total = applied.len(), "batch rolled back");
        match first_error {
            Some(err) => Err(anyhow::Error::from(err).context("rollback incomplete")),
            None => Ok(restored),
        }
    }

    /// Record the batch in the ledger. A failed append reverts the batch.
    pub fn commit(mut self, ledger: &Ledger, metadata: BatchMetadata) -> Result<LedgerEntry> {
        let operations = std::mem::take(&mut self.applied);
        let entry = LedgerEntry::new(&self.root, operations, metadata);
        if let Err(err) = ledger.append(&entry) {
            self.applied = entry.operations;
            let performed = self.applied.len();
            if let Err(rollback_err) = self.rollback() {
                tracing::error!(error = %rollback_err, "rollback after ledger failure");
            }
            return Err(err
                .context("failed to record batch in ledger")
                .context(ApplyError::RolledBack(performed)));
        }
        tracing::info!(
            command = %entry.command(),
            operations = entry.operations.len(),
            "batch committed"
        );
        Ok(entry)
    }
}

fn revert(root: &Path, op: &Operation) -> io::Result<()> {
    std::fs::rename(root.join(&op.to), root.join(&op.from))
}

/// Apply every pending entry of `plan` as one batch, deepest paths first.
///
/// `on_applied` sees each rename as it lands. Returns `None` when nothing
/// had to be renamed; in that case the ledger is not touched.
pub fn apply_plan(
    plan: &Plan,
    ledger: &Ledger,
    metadata: BatchMetadata,
    cancel: &CancelToken,
    mut on_applied: impl FnMut(&Operation),
) -> Result<Option<LedgerEntry>> {
    if !plan.is_applicable() {
        return Err(ApplyError::Conflicts(plan.conflicts.len()).into());
    }

    let mut pending: Vec<&ProposedEntry> = plan.pending().collect();
    pending.sort_by(|a, b| b.candidate.depth.cmp(&a.candidate.depth));

    let mut txn = TransactionManager::new(ledger.working_dir(), cancel.clone());
    for entry in pending {
        match txn.execute(entry) {
            Ok(Some(op)) => on_applied(op),
            Ok(None) => {}
            Err(err) => {
                let performed = txn.applied().len();
                if let Err(rollback_err) = txn.rollback() {
                    tracing::error!(error = %rollback_err, "rollback after failed rename");
                }
                return Err(err.context(ApplyError::RolledBack(performed)));
            }
        }
    }

    if txn.applied().is_empty() {
        return Ok(None);
    }
    txn.commit(ledger, metadata).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{RegexMetadata, ReplaceMetadata};
    use crate::model::{Candidate, EntryStatus};
    use std::fs;

    fn pending(root: &Path, from: &str, to: &str) -> ProposedEntry {
        ProposedEntry {
            candidate: Candidate::new(root, from, false, 0),
            proposed_relative_path: to.to_string(),
            status: EntryStatus::Pending,
            conflict_reason: None,
            captures: Vec::new(),
        }
    }

    fn meta() -> BatchMetadata {
        BatchMetadata::Replace(ReplaceMetadata::default())
    }

    #[test]
    fn test_rollback_restores_in_reverse_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), "a").unwrap();
        let mut txn = TransactionManager::new(dir.path(), CancelToken::new());
        txn.execute(&pending(dir.path(), "a", "b")).unwrap();
        txn.execute(&pending(dir.path(), "b", "c")).unwrap();
        assert!(dir.path().join("c").exists());

        assert_eq!(txn.rollback().unwrap(), 2);
        assert!(dir.path().join("a").exists());
        assert!(!dir.path().join("c").exists());
    }

    #[test]
    fn test_destination_appearing_after_planning_aborts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), "a").unwrap();
        fs::write(dir.path().join("b"), "b").unwrap();
        let mut txn = TransactionManager::new(dir.path(), CancelToken::new());
        let err = txn.execute(&pending(dir.path(), "a", "b")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApplyError>(),
            Some(ApplyError::DestinationExists(_))
        ));
        assert_eq!(fs::read_to_string(dir.path().join("b")).unwrap(), "b");
    }

    #[test]
    fn test_cancelled_before_rename() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), "a").unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut txn = TransactionManager::new(dir.path(), cancel);
        assert!(txn.execute(&pending(dir.path(), "a", "b")).is_err());
        assert!(dir.path().join("a").exists());
    }

    #[test]
    fn test_cancel_midway_rolls_back_applied_renames() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for name in ["a1.txt", "a2.txt", "a3.txt"] {
            fs::write(root.join(name), name).unwrap();
        }
        let plan = Plan {
            entries: vec![
                pending(root, "a1.txt", "b1.txt"),
                pending(root, "a2.txt", "b2.txt"),
                pending(root, "a3.txt", "b3.txt"),
            ],
            total_candidates: 3,
            changed_count: 3,
            ..Plan::default()
        };
        let ledger = Ledger::for_dir(root);
        let cancel = CancelToken::new();
        let err = apply_plan(&plan, &ledger, meta(), &cancel, |_| cancel.cancel()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ApplyError>(),
            Some(ApplyError::RolledBack(1))
        ));
        assert!(err.chain().any(|cause| matches!(
            cause.downcast_ref::<ApplyError>(),
            Some(ApplyError::Cancelled)
        )));
        for name in ["a1.txt", "a2.txt", "a3.txt"] {
            assert_eq!(fs::read_to_string(root.join(name)).unwrap(), name);
        }
        assert!(!root.join("b1.txt").exists());
        assert!(!ledger.path().exists());
    }

    #[test]
    fn test_apply_plan_renames_children_before_parents() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("old/inner")).unwrap();
        fs::write(dir.path().join("old/inner/f.txt"), "f").unwrap();
        let root = dir.path();

        let mut parent = pending(root, "old", "new");
        parent.candidate = Candidate::new(root, "old", true, 0);
        let plan = Plan {
            entries: vec![
                parent,
                pending(root, "old/inner/f.txt", "old/inner/g.txt"),
            ],
            total_candidates: 2,
            changed_count: 2,
            ..Plan::default()
        };
        let ledger = Ledger::for_dir(root);
        let mut seen = Vec::new();
        let entry = apply_plan(&plan, &ledger, meta(), &CancelToken::new(), |op| {
            seen.push(op.from.clone())
        })
        .unwrap()
        .unwrap();

        assert_eq!(seen, vec!["old/inner/f.txt", "old"]);
        assert_eq!(entry.operations.len(), 2);
        assert!(root.join("new/inner/g.txt").exists());
        assert_eq!(ledger.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_ledger_append_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::create_dir(root.join(crate::ledger::LEDGER_FILE_NAME)).unwrap();

        let plan = Plan {
            entries: vec![pending(root, "a.txt", "b.txt")],
            total_candidates: 1,
            changed_count: 1,
            ..Plan::default()
        };
        let meta = BatchMetadata::Regex(RegexMetadata::default());
        let err = apply_plan(&plan, &Ledger::for_dir(root), meta, &CancelToken::new(), |_| {})
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApplyError>(),
            Some(ApplyError::RolledBack(1))
        ));
        assert!(root.join("a.txt").exists());
        assert!(!root.join("b.txt").exists());
    }

    #[test]
    fn test_plan_with_conflicts_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let plan = Plan {
            conflicts: vec![crate::model::Conflict {
                original_path: "a".into(),
                proposed_path: "b".into(),
                reason: crate::model::ConflictReason::ExistingFile,
            }],
            ..Plan::default()
        };
        let ledger = Ledger::for_dir(dir.path());
        let err = apply_plan(&plan, &ledger, meta(), &CancelToken::new(), |_| {}).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApplyError>(),
            Some(ApplyError::Conflicts(1))
        ));
    }

    #[test]
    fn test_empty_plan_leaves_no_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::for_dir(dir.path());
        let result =
            apply_plan(&Plan::default(), &ledger, meta(), &CancelToken::new(), |_| {}).unwrap();
        assert!(result.is_none());
        assert!(!ledger.path().exists());
    }
}
