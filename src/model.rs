use anyhow::{Context, Result, bail};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A filesystem entry under consideration for renaming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Slash-normalized path relative to the scope root; unique within a batch.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub is_dir: bool,
    /// Number of `/` separators in `relative_path`.
    pub depth: usize,
    pub size: u64,
    /// Suffix starting at the first non-leading `.` (empty for directories).
    pub extension: String,
}

impl Candidate {
    /// Build a candidate from a relative path under `root`.
    pub fn new(root: &Path, relative_path: &str, is_dir: bool, size: u64) -> Self {
        let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
        let extension = if is_dir {
            String::new()
        } else {
            split_extension(name).1.to_string()
        };
        Self {
            relative_path: relative_path.to_string(),
            absolute_path: root.join(relative_path),
            is_dir,
            depth: depth_of(relative_path),
            size,
            extension,
        }
    }

    /// Final path segment.
    pub fn name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }

    /// Name without `extension`.
    pub fn stem(&self) -> &str {
        let name = self.name();
        &name[..name.len() - self.extension.len()]
    }

    /// Relative directory containing this candidate, `None` at the scope root.
    pub fn parent(&self) -> Option<&str> {
        self.relative_path.rsplit_once('/').map(|(dir, _)| dir)
    }

    /// Relative path of a sibling called `name`.
    pub fn sibling(&self, name: &str) -> String {
        match self.parent() {
            Some(dir) => format!("{dir}/{name}"),
            None => name.to_string(),
        }
    }
}

/// Split `name` at its first non-leading dot: `archive.tar.gz` becomes
/// (`archive`, `.tar.gz`) while `.bashrc` has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.char_indices().skip(1).find(|(_, c)| *c == '.') {
        Some((idx, _)) => name.split_at(idx),
        None => (name, ""),
    }
}

/// Split `name` at its last non-leading dot: `archive.tar.gz` becomes
/// (`archive.tar`, `.gz`).
pub fn split_last_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Number of separators in a slash-normalized relative path.
pub fn depth_of(relative_path: &str) -> usize {
    relative_path.matches('/').count()
}

/// Convert a relative filesystem path to its slash-normalized form.
/// Returns `None` for paths that are not valid UTF-8 or that climb out of
/// the root.
pub fn to_slash(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Normalize a user-supplied relative target (`./a\\b` becomes `a/b`).
/// Absolute paths, `..` segments and empty results are rejected.
pub fn normalize_relative(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('/') || trimmed.starts_with('\\') {
        return None;
    }
    let mut parts = Vec::new();
    for part in trimmed.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => return None,
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Why a proposed rename cannot proceed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    DuplicateTarget,
    ExistingFile,
    ExistingDirectory,
    InvalidTemplate,
    SequenceGap,
}

impl ConflictReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DuplicateTarget => "duplicate_target",
            Self::ExistingFile => "existing_file",
            Self::ExistingDirectory => "existing_directory",
            Self::InvalidTemplate => "invalid_template",
            Self::SequenceGap => "sequence_gap",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Disposition of a single planned candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Will be renamed on apply.
    Pending,
    /// Proposed path is identical to the original.
    Unchanged,
    /// Blocked; always carries a reason.
    Skipped,
}

/// A blocked rename surfaced to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conflict {
    pub original_path: String,
    pub proposed_path: String,
    pub reason: ConflictReason,
}

/// One planning row.
#[derive(Debug, Clone, Serialize)]
pub struct ProposedEntry {
    pub candidate: Candidate,
    pub proposed_relative_path: String,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_reason: Option<ConflictReason>,
    /// Capture groups recorded for audit (regex strategy only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub captures: Vec<String>,
}

/// In-memory result of running candidates through a strategy and the
/// conflict detector. Never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    pub entries: Vec<ProposedEntry>,
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<String>,
    pub total_candidates: usize,
    pub changed_count: usize,
    pub skipped_count: usize,
}

impl Plan {
    /// A plan may only be applied when it carries no conflicts at all.
    pub fn is_applicable(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Entries that will be renamed on apply.
    pub fn pending(&self) -> impl Iterator<Item = &ProposedEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.status == EntryStatus::Pending)
    }
}

/// Externally generated rename plan (for example the output of a
/// text-generation model) consumed by the `ai` command.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalPlan {
    /// Model or tool that produced the plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Hash of the prompt that produced the plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_hash: Option<String>,
    /// Free-form warnings reported by the producer.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Proposed renames.
    pub items: Vec<PlanItem>,
}

/// A single proposed rename in an external plan.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlanItem {
    /// Current path, relative to the working directory.
    pub original: String,
    /// Proposed path, relative to the working directory.
    pub proposed: String,
    /// Position of this item in the proposed ordering, starting at 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    /// Producer notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ExternalPlan {
    /// Reject items with blank paths and originals listed more than once
    /// (compared case-insensitively).
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (idx, item) in self.items.iter().enumerate() {
            if item.original.trim().is_empty() {
                bail!("plan item {idx} has an empty original path");
            }
            if item.proposed.trim().is_empty() {
                bail!("plan item {idx} ({}) has an empty proposed path", item.original);
            }
            let key = normalize_relative(&item.original)
                .with_context(|| format!("plan item {idx} has an invalid original path"))?;
            if !seen.insert(key.to_lowercase()) {
                bail!("plan lists {} more than once", item.original);
            }
        }
        Ok(())
    }
}

/// Generate JSON Schema for external plans.
pub fn generate_schema() -> Result<String> {
    let schema = schemars::schema_for!(ExternalPlan);
    Ok(serde_json::to_string_pretty(&schema)?)
}

/// Load an external plan from a JSON file.
pub fn load_plan(path: &Path) -> Result<ExternalPlan> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open plan {}", path.display()))?;
    let reader = std::io::BufReader::new(file);
    let plan: ExternalPlan = serde_json::from_reader(reader)
        .with_context(|| format!("failed to parse plan {}", path.display()))?;
    plan.validate()?;
    Ok(plan)
}

/// Create an external plan from a JSON string.
pub fn from_json(json: &str) -> Result<ExternalPlan> {
    let plan: ExternalPlan = serde_json::from_str(json)?;
    plan.validate()?;
    Ok(plan)
}
