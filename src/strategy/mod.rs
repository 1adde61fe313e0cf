//! Naming strategies: each maps a candidate to a proposed name.

pub mod extension;
pub mod external;
pub mod insert;
pub mod regex;
pub mod remove;
pub mod replace;
pub mod sequence;

use crate::ledger::{BatchMetadata, Command};
use crate::model::{Candidate, ConflictReason, Plan};

pub use self::extension::ExtensionStrategy;
pub use self::external::ExternalPlanStrategy;
pub use self::insert::InsertStrategy;
pub use self::regex::RegexStrategy;
pub use self::remove::RemoveStrategy;
pub use self::replace::ReplaceStrategy;
pub use self::sequence::{Placement, SequenceConfig, SequenceStrategy};

/// A proposed target for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    /// New base name, or a full relative path when `relocate` is set.
    pub target: String,
    pub relocate: bool,
    pub captures: Vec<String>,
}

impl Proposal {
    /// Rename in place: `name` replaces the final path segment.
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            target: name.into(),
            relocate: false,
            captures: Vec::new(),
        }
    }

    /// Move to a path relative to the working directory.
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            target: path.into(),
            relocate: true,
            captures: Vec::new(),
        }
    }

    pub fn with_captures(mut self, captures: Vec<String>) -> Self {
        self.captures = captures;
        self
    }
}

/// What a strategy decided for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Rename(Proposal),
    /// The strategy does not apply; the candidate stays as is.
    NoMatch,
    /// This candidate alone is skipped; the batch continues.
    Reject {
        reason: ConflictReason,
        message: String,
    },
    /// A proposal that blocks the whole batch.
    Conflict {
        proposal: Proposal,
        reason: ConflictReason,
    },
}

/// Pluggable candidate -> name mapping driven by the planner.
///
/// `evaluate` is called once per candidate, in candidate order.
pub trait NamingStrategy {
    fn command(&self) -> Command;

    fn evaluate(&mut self, candidate: &Candidate) -> Evaluation;

    /// Warnings gathered while evaluating, reported after planning.
    fn warnings(&self) -> Vec<String> {
        Vec::new()
    }

    /// Ledger payload describing a batch built from `plan`.
    fn metadata(&self, plan: &Plan) -> BatchMetadata;
}
