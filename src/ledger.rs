use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::LedgerError;
use crate::fsops;

/// Ledger file name, one per working directory.
pub const LEDGER_FILE_NAME: &str = ".renamer";

/// A single rename performed by a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Operation {
    pub from: String,
    pub to: String,
}

/// Strategy that produced a batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Extension,
    Insert,
    Regex,
    Remove,
    Replace,
    Sequence,
    Ai,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extension => "extension",
            Self::Insert => "insert",
            Self::Regex => "regex",
            Self::Remove => "remove",
            Self::Replace => "replace",
            Self::Sequence => "sequence",
            Self::Ai => "ai",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct RegexMetadata {
    pub pattern: String,
    pub template: String,
    pub matched: usize,
    pub changed: usize,
    /// Capture groups per original path.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub match_groups: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtensionMetadata {
    pub source_extensions: Vec<String>,
    pub target_extension: String,
    pub total_candidates: usize,
    pub changed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct InsertMetadata {
    pub position: String,
    pub text: String,
    pub total_candidates: usize,
    pub changed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoveMetadata {
    pub tokens: Vec<String>,
    pub matches: BTreeMap<String, usize>,
    pub total_candidates: usize,
    pub changed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ReplaceMetadata {
    pub patterns: Vec<String>,
    pub replacement: String,
    pub matches: BTreeMap<String, usize>,
    pub total_candidates: usize,
    pub changed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct SequenceMetadata {
    pub start: u64,
    /// Width actually applied after auto-expansion.
    pub width: usize,
    pub placement: String,
    pub separator: String,
    pub prefix: String,
    pub suffix: String,
    pub total_candidates: usize,
    pub renamed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct AiMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_hash: Option<String>,
    pub batch_size: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Command-specific ledger payload. The variant determines `command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchMetadata {
    Extension(ExtensionMetadata),
    Insert(InsertMetadata),
    Regex(RegexMetadata),
    Remove(RemoveMetadata),
    Replace(ReplaceMetadata),
    Sequence(SequenceMetadata),
    Ai(AiMetadata),
}

impl BatchMetadata {
    pub fn command(&self) -> Command {
        match self {
            Self::Extension(_) => Command::Extension,
            Self::Insert(_) => Command::Insert,
            Self::Regex(_) => Command::Regex,
            Self::Remove(_) => Command::Remove,
            Self::Replace(_) => Command::Replace,
            Self::Sequence(_) => Command::Sequence,
            Self::Ai(_) => Command::Ai,
        }
    }

    /// Human-readable note printed after undoing a batch of this kind.
    pub fn undo_note(&self) -> Option<String> {
        match self {
            Self::Extension(meta) if !meta.source_extensions.is_empty() => Some(format!(
                "Restored extensions from {} to {}",
                meta.target_extension,
                meta.source_extensions.join(", ")
            )),
            Self::Extension(_) => None,
            Self::Insert(meta) => Some(format!("Removed inserted text {:?}", meta.text)),
            Self::Regex(meta) => Some(format!(
                "Reverted regex {} -> {}",
                meta.pattern, meta.template
            )),
            Self::Remove(meta) => Some(format!("Restored tokens: {}", meta.tokens.join(", "))),
            Self::Replace(meta) => Some(format!(
                "Reverted replacement of {} with {:?}",
                meta.patterns.join(", "),
                meta.replacement
            )),
            Self::Sequence(meta) => Some(format!(
                "Removed sequence numbers starting at {}",
                meta.start
            )),
            Self::Ai(meta) => meta
                .model
                .as_ref()
                .map(|model| format!("Reverted plan produced by {model}")),
        }
    }

    fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Extension(meta) => serde_json::to_value(meta),
            Self::Insert(meta) => serde_json::to_value(meta),
            Self::Regex(meta) => serde_json::to_value(meta),
            Self::Remove(meta) => serde_json::to_value(meta),
            Self::Replace(meta) => serde_json::to_value(meta),
            Self::Sequence(meta) => serde_json::to_value(meta),
            Self::Ai(meta) => serde_json::to_value(meta),
        }
    }

    fn from_value(command: Command, value: serde_json::Value) -> serde_json::Result<Self> {
        let value = if value.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            value
        };
        Ok(match command {
            Command::Extension => Self::Extension(serde_json::from_value(value)?),
            Command::Insert => Self::Insert(serde_json::from_value(value)?),
            Command::Regex => Self::Regex(serde_json::from_value(value)?),
            Command::Remove => Self::Remove(serde_json::from_value(value)?),
            Command::Replace => Self::Replace(serde_json::from_value(value)?),
            Command::Sequence => Self::Sequence(serde_json::from_value(value)?),
            Command::Ai => Self::Ai(serde_json::from_value(value)?),
        })
    }
}

/// One applied batch (one NDJSON line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Commit time (UTC).
    pub timestamp: DateTime<Utc>,
    pub working_dir: String,
    /// Renames in the order they were performed.
    pub operations: Vec<Operation>,
    pub metadata: BatchMetadata,
}

impl LedgerEntry {
    pub fn new(working_dir: &Path, operations: Vec<Operation>, metadata: BatchMetadata) -> Self {
        Self {
            timestamp: Utc::now(),
            working_dir: working_dir.display().to_string(),
            operations,
            metadata,
        }
    }

    pub fn command(&self) -> Command {
        self.metadata.command()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    timestamp: DateTime<Utc>,
    command: Command,
    working_dir: String,
    operations: Vec<Operation>,
    #[serde(default)]
    metadata: serde_json::Value,
}

impl Serialize for LedgerEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw = RawEntry {
            timestamp: self.timestamp,
            command: self.command(),
            working_dir: self.working_dir.clone(),
            operations: self.operations.clone(),
            metadata: self.metadata.to_value().map_err(S::Error::custom)?,
        };
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LedgerEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawEntry::deserialize(deserializer)?;
        let metadata =
            BatchMetadata::from_value(raw.command, raw.metadata).map_err(D::Error::custom)?;
        Ok(Self {
            timestamp: raw.timestamp,
            working_dir: raw.working_dir,
            operations: raw.operations,
            metadata,
        })
    }
}

/// Append-only ledger stored as NDJSON in a working directory.
#[derive(Debug, Clone)]
pub struct Ledger {
    working_dir: PathBuf,
    path: PathBuf,
}

impl Ledger {
    pub fn for_dir(working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        let path = working_dir.join(LEDGER_FILE_NAME);
        Self { working_dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Append an entry as one NDJSON line.
    ///
    /// A failed write or sync truncates the file back to its previous length,
    /// so the ledger never keeps a partial or unsynced record.
    pub fn append(&self, entry: &LedgerEntry) -> Result<()> {
        let mut record = serde_json::to_string(entry)?;
        record.push('\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open ledger {}", self.path.display()))?;
        let previous_len = file.metadata()?.len();
        write_record(&mut file, previous_len, record.as_bytes())
            .with_context(|| format!("failed to append to ledger {}", self.path.display()))?;
        tracing::debug!(
            command = %entry.command(),
            operations = entry.operations.len(),
            "ledger entry appended"
        );
        Ok(())
    }

    /// Read every entry. A missing ledger reads as empty.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read ledger {}", self.path.display()));
            }
        };
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str::<LedgerEntry>(line).map_err(|source| {
                    anyhow::Error::from(LedgerError::Corrupt {
                        line: idx + 1,
                        source,
                    })
                })
            })
            .collect()
    }

    /// Revert the newest entry and drop it from the ledger.
    ///
    /// If any reversal fails, the renames already reverted are re-applied and
    /// the ledger file is left untouched.
    pub fn undo(&self) -> Result<LedgerEntry> {
        let mut entries = self.entries()?;
        let last = entries.pop().ok_or(LedgerError::NoEntries)?;

        let mut reverted: Vec<&Operation> = Vec::new();
        for op in last.operations.iter().rev() {
            let source = self.working_dir.join(&op.to);
            let destination = self.working_dir.join(&op.from);
            let result = fsops::ensure_parent(&destination)
                .and_then(|()| fsops::rename(&source, &destination));
            if let Err(err) = result {
                tracing::warn!(from = %op.to, to = %op.from, "undo rename failed, restoring batch");
                for done in reverted.iter().rev() {
                    let back = fsops::rename(
                        &self.working_dir.join(&done.from),
                        &self.working_dir.join(&done.to),
                    );
                    if let Err(restore_err) = back {
                        tracing::error!(error = %restore_err, "failed to restore {}", done.to);
                    }
                }
                return Err(err);
            }
            reverted.push(op);
        }

        self.rewrite(&entries)?;
        tracing::info!(
            command = %last.command(),
            operations = last.operations.len(),
            "ledger entry undone"
        );
        Ok(last)
    }

    /// Replace the file with `entries`, or delete it when none remain.
    fn rewrite(&self, entries: &[LedgerEntry]) -> Result<()> {
        if entries.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err)
                    .with_context(|| format!("failed to remove ledger {}", self.path.display())),
                _ => Ok(()),
            };
        }
        let mut tmp = tempfile::NamedTempFile::new_in(&self.working_dir)?;
        for entry in entries {
            writeln!(tmp, "{}", serde_json::to_string(entry)?)?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to rewrite ledger {}", self.path.display()))?;
        Ok(())
    }
}

/// File-like sink a ledger record is appended to.
trait AppendTarget: Write {
    fn sync(&mut self) -> io::Result<()>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl AppendTarget for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.sync_all()
    }
}

fn write_record<T: AppendTarget>(
    target: &mut T,
    previous_len: u64,
    record: &[u8],
) -> io::Result<()> {
    let result = target.write_all(record).and_then(|()| target.sync());
    if let Err(err) = result {
        if let Err(truncate_err) = target.truncate(previous_len) {
            tracing::error!(error = %truncate_err, "failed to truncate ledger after write error");
        }
        return Err(err);
    }
    Ok(())
}
