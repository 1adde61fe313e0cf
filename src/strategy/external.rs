use std::collections::{HashMap, HashSet};

use crate::ledger::{AiMetadata, BatchMetadata, Command};
use crate::model::{Candidate, ConflictReason, ExternalPlan, Plan, normalize_relative};
use crate::strategy::{Evaluation, NamingStrategy, Proposal};

/// Follow a rename plan produced outside the tool.
///
/// Items are matched to candidates by normalized, case-folded original path.
/// Proposed paths are relative to the working directory and may move entries.
pub struct ExternalPlanStrategy {
    plan: ExternalPlan,
    by_original: HashMap<String, usize>,
    used: HashSet<usize>,
    next_sequence: u32,
}

impl ExternalPlanStrategy {
    pub fn new(plan: ExternalPlan) -> Self {
        let by_original = plan
            .items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| {
                normalize_relative(&item.original).map(|key| (key.to_lowercase(), idx))
            })
            .collect();
        Self {
            plan,
            by_original,
            used: HashSet::new(),
            next_sequence: 1,
        }
    }
}

impl NamingStrategy for ExternalPlanStrategy {
    fn command(&self) -> Command {
        Command::Ai
    }

    fn evaluate(&mut self, candidate: &Candidate) -> Evaluation {
        let key = candidate.relative_path.to_lowercase();
        let Some(&idx) = self.by_original.get(&key) else {
            return Evaluation::NoMatch;
        };
        self.used.insert(idx);
        let item = &self.plan.items[idx];
        let proposal = Proposal::path(item.proposed.trim());

        if let Some(sequence) = item.sequence {
            let expected = self.next_sequence;
            self.next_sequence = sequence.saturating_add(1);
            if sequence != expected {
                tracing::debug!(
                    path = %candidate.relative_path,
                    expected,
                    found = sequence,
                    "sequence gap in external plan"
                );
                return Evaluation::Conflict {
                    proposal,
                    reason: ConflictReason::SequenceGap,
                };
            }
        }
        Evaluation::Rename(proposal)
    }

    fn warnings(&self) -> Vec<String> {
        let mut warnings = self.plan.warnings.clone();
        for (idx, item) in self.plan.items.iter().enumerate() {
            if !self.used.contains(&idx) {
                warnings.push(format!(
                    "plan item {} does not match any candidate in scope",
                    item.original
                ));
            }
        }
        warnings
    }

    fn metadata(&self, plan: &Plan) -> BatchMetadata {
        BatchMetadata::Ai(AiMetadata {
            model: self.plan.model.clone(),
            prompt_hash: self.plan.prompt_hash.clone(),
            batch_size: plan.changed_count,
            warnings: self.plan.warnings.clone(),
        })
    }
}
