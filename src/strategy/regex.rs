use std::collections::BTreeMap;

use crate::error::TemplateError;
use crate::ledger::{BatchMetadata, Command, RegexMetadata};
use crate::model::{Candidate, ConflictReason, Plan};
use crate::strategy::{Evaluation, NamingStrategy, Proposal};
use crate::template::TemplateEngine;

/// Rename by matching a pattern against each stem and rendering a
/// capture-group template. Extensions are kept.
pub struct RegexStrategy {
    engine: TemplateEngine,
    pattern: String,
    template: String,
    matched: usize,
}

impl RegexStrategy {
    pub fn new(pattern: &str, template: &str) -> Result<Self, TemplateError> {
        let engine = TemplateEngine::compile(pattern, template)?;
        Ok(Self {
            engine,
            pattern: pattern.to_string(),
            template: template.to_string(),
            matched: 0,
        })
    }

    /// Candidates whose stem matched the pattern so far.
    pub fn matched(&self) -> usize {
        self.matched
    }
}

impl NamingStrategy for RegexStrategy {
    fn command(&self) -> Command {
        Command::Regex
    }

    fn evaluate(&mut self, candidate: &Candidate) -> Evaluation {
        match self.engine.apply(candidate.stem()) {
            Ok(None) => Evaluation::NoMatch,
            Ok(Some(result)) => {
                self.matched += 1;
                let name = format!("{}{}", result.rendered, candidate.extension);
                Evaluation::Rename(Proposal::name(name).with_captures(result.groups))
            }
            Err(err) => Evaluation::Reject {
                reason: ConflictReason::InvalidTemplate,
                message: err.to_string(),
            },
        }
    }

    fn metadata(&self, plan: &Plan) -> BatchMetadata {
        let match_groups: BTreeMap<String, Vec<String>> = plan
            .pending()
            .filter(|entry| !entry.captures.is_empty())
            .map(|entry| {
                (
                    entry.candidate.relative_path.clone(),
                    entry.captures.clone(),
                )
            })
            .collect();
        BatchMetadata::Regex(RegexMetadata {
            pattern: self.pattern.clone(),
            template: self.template.clone(),
            matched: self.matched,
            changed: plan.changed_count,
            match_groups,
        })
    }
}
