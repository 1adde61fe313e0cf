use anyhow::Result;
use std::path::PathBuf;

use crate::conflict::{ConflictDetector, Decision};
use crate::model::{
    Candidate, Conflict, ConflictReason, EntryStatus, Plan, ProposedEntry, normalize_relative,
};
use crate::strategy::{Evaluation, NamingStrategy, Proposal};

/// Builds a [`Plan`] by running candidates through a strategy and the
/// conflict detector. Never touches the filesystem beyond `stat`.
pub struct Planner {
    root: PathBuf,
}

impl Planner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn plan(
        &self,
        candidates: &[Candidate],
        strategy: &mut dyn NamingStrategy,
    ) -> Result<Plan> {
        let evaluations: Vec<Evaluation> = candidates
            .iter()
            .map(|candidate| strategy.evaluate(candidate))
            .collect();

        // Paths that stay put are reserved before any rename claims a target.
        let mut detector = ConflictDetector::new(&self.root);
        for (candidate, evaluation) in candidates.iter().zip(&evaluations) {
            if stays_in_place(candidate, evaluation) {
                detector.keep(&candidate.relative_path);
            }
        }

        let mut plan = Plan {
            total_candidates: candidates.len(),
            ..Plan::default()
        };
        for (candidate, evaluation) in candidates.iter().zip(evaluations) {
            let original = candidate.relative_path.as_str();
            let (proposal, forced) = match evaluation {
                Evaluation::NoMatch => {
                    plan.entries.push(entry(candidate, original, EntryStatus::Unchanged, None));
                    continue;
                }
                Evaluation::Reject { reason, message } => {
                    plan.warnings.push(format!("{original}: {message}"));
                    plan.entries.push(entry(
                        candidate,
                        original,
                        EntryStatus::Skipped,
                        Some(reason),
                    ));
                    continue;
                }
                Evaluation::Rename(proposal) => (proposal, None),
                Evaluation::Conflict { proposal, reason } => (proposal, Some(reason)),
            };

            let Some(target) = resolve_target(candidate, &proposal) else {
                reject(&mut plan, candidate, &proposal.target, ConflictReason::InvalidTemplate);
                continue;
            };
            if let Some(reason) = forced {
                reject(&mut plan, candidate, &target, reason);
                continue;
            }

            match detector.evaluate(original, &target)? {
                Decision::Unchanged => {
                    plan.entries.push(entry(candidate, &target, EntryStatus::Unchanged, None));
                }
                Decision::Pending => {
                    plan.changed_count += 1;
                    let mut pending = entry(candidate, &target, EntryStatus::Pending, None);
                    pending.captures = proposal.captures;
                    plan.entries.push(pending);
                }
                Decision::Conflict(reason) => reject(&mut plan, candidate, &target, reason),
            }
        }

        plan.skipped_count = plan
            .entries
            .iter()
            .filter(|entry| entry.status == EntryStatus::Skipped)
            .count();
        plan.warnings.extend(strategy.warnings());

        tracing::info!(
            command = %strategy.command(),
            candidates = plan.total_candidates,
            changed = plan.changed_count,
            skipped = plan.skipped_count,
            conflicts = plan.conflicts.len(),
            "plan built"
        );
        Ok(plan)
    }
}

fn stays_in_place(candidate: &Candidate, evaluation: &Evaluation) -> bool {
    match evaluation {
        Evaluation::NoMatch | Evaluation::Reject { .. } | Evaluation::Conflict { .. } => true,
        Evaluation::Rename(proposal) => resolve_target(candidate, proposal)
            .is_none_or(|target| target == candidate.relative_path),
    }
}

/// Turn a proposal into a relative path, or `None` when it cannot name an
/// entry (empty, `.`/`..`, or a separator in an in-place rename).
fn resolve_target(candidate: &Candidate, proposal: &Proposal) -> Option<String> {
    if proposal.relocate {
        return normalize_relative(&proposal.target);
    }
    let name = proposal.target.as_str();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return None;
    }
    Some(candidate.sibling(name))
}

fn entry(
    candidate: &Candidate,
    proposed: &str,
    status: EntryStatus,
    reason: Option<ConflictReason>,
) -> ProposedEntry {
    ProposedEntry {
        candidate: candidate.clone(),
        proposed_relative_path: proposed.to_string(),
        status,
        conflict_reason: reason,
        captures: Vec::new(),
    }
}

fn reject(plan: &mut Plan, candidate: &Candidate, proposed: &str, reason: ConflictReason) {
    tracing::debug!(path = %candidate.relative_path, proposed, %reason, "conflict");
    plan.conflicts.push(Conflict {
        original_path: candidate.relative_path.clone(),
        proposed_path: proposed.to_string(),
        reason,
    });
    plan.entries.push(entry(candidate, proposed, EntryStatus::Skipped, Some(reason)));
}
