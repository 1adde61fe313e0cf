use serde::{Deserialize, Serialize};

use crate::ledger::Command;
use crate::model::{ConflictReason, EntryStatus};

/// Structured event emitted during a command run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    CandidateListed {
        path: String,
        is_dir: bool,
        size: u64,
    },
    ListSummary {
        files: usize,
        directories: usize,
        total_bytes: u64,
    },
    EntryPlanned {
        original: String,
        proposed: String,
        status: EntryStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<ConflictReason>,
    },
    ConflictDetected {
        original: String,
        proposed: String,
        reason: ConflictReason,
    },
    Warning {
        message: String,
    },
    PlanBuilt {
        command: Command,
        total_candidates: usize,
        changed: usize,
        skipped: usize,
        conflicts: usize,
        dry_run: bool,
    },
    RenameApplied {
        batch_id: uuid::Uuid,
        from: String,
        to: String,
    },
    BatchCommitted {
        batch_id: uuid::Uuid,
        command: Command,
        operations: usize,
    },
    BatchRolledBack {
        batch_id: uuid::Uuid,
        error: String,
    },
    UndoCompleted {
        command: Command,
        operations: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
}
