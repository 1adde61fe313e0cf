use anyhow::{Result, bail};
use std::collections::BTreeMap;

use crate::ledger::{BatchMetadata, Command, RemoveMetadata};
use crate::model::{Candidate, Plan};
use crate::strategy::replace::{dedup_tokens, substitute};
use crate::strategy::{Evaluation, NamingStrategy, Proposal};

/// Strip tokens from names, one token after another.
///
/// A name that ends up empty is still proposed; the planner rejects it.
pub struct RemoveStrategy {
    tokens: Vec<String>,
    matches: BTreeMap<String, usize>,
    warnings: Vec<String>,
}

impl RemoveStrategy {
    pub fn new(args: &[String]) -> Result<Self> {
        let (tokens, warnings) = dedup_tokens(args, false);
        if tokens.is_empty() {
            bail!("at least one non-empty token is required");
        }
        Ok(Self {
            tokens,
            matches: BTreeMap::new(),
            warnings,
        })
    }
}

impl NamingStrategy for RemoveStrategy {
    fn command(&self) -> Command {
        Command::Remove
    }

    fn evaluate(&mut self, candidate: &Candidate) -> Evaluation {
        let name = candidate.name();
        let proposed = substitute(name, &self.tokens, "", &mut self.matches);
        if proposed == name {
            Evaluation::NoMatch
        } else {
            Evaluation::Rename(Proposal::name(proposed))
        }
    }

    fn warnings(&self) -> Vec<String> {
        self.warnings.clone()
    }

    fn metadata(&self, plan: &Plan) -> BatchMetadata {
        BatchMetadata::Remove(RemoveMetadata {
            tokens: self.tokens.clone(),
            matches: self.matches.clone(),
            total_candidates: plan.total_candidates,
            changed: plan.changed_count,
        })
    }
}
