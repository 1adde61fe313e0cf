use anyhow::{Result, bail};
use std::collections::BTreeMap;

use crate::ledger::{BatchMetadata, Command, ReplaceMetadata};
use crate::model::{Candidate, Plan};
use crate::strategy::{Evaluation, NamingStrategy, Proposal};

/// Literal substring replacement across the whole name.
pub struct ReplaceStrategy {
    patterns: Vec<String>,
    replacement: String,
    matches: BTreeMap<String, usize>,
    warnings: Vec<String>,
}

impl ReplaceStrategy {
    /// The last argument is the replacement; everything before it is a pattern.
    pub fn new(args: &[String]) -> Result<Self> {
        let Some((replacement, raw_patterns)) = args.split_last() else {
            bail!("provide at least one pattern and a replacement value");
        };
        let (patterns, warnings) = dedup_tokens(raw_patterns, true);
        if patterns.is_empty() {
            bail!("at least one non-empty pattern is required before the replacement");
        }
        Ok(Self {
            patterns,
            replacement: replacement.clone(),
            matches: BTreeMap::new(),
            warnings,
        })
    }
}

/// Drop blank tokens and repeats, preserving first-seen order.
pub(crate) fn dedup_tokens(raw: &[String], trim: bool) -> (Vec<String>, Vec<String>) {
    let mut tokens: Vec<String> = Vec::new();
    let mut warnings = Vec::new();
    for token in raw {
        if token.trim().is_empty() {
            continue;
        }
        let token = if trim { token.trim() } else { token.as_str() };
        if tokens.iter().any(|seen| seen == token) {
            warnings.push(format!("duplicate token {token:?} ignored"));
            continue;
        }
        tokens.push(token.to_string());
    }
    (tokens, warnings)
}

/// Replace every occurrence of each pattern in turn, tallying hits.
pub(crate) fn substitute(
    name: &str,
    patterns: &[String],
    replacement: &str,
    matches: &mut BTreeMap<String, usize>,
) -> String {
    let mut current = name.to_string();
    for pattern in patterns {
        let count = current.matches(pattern.as_str()).count();
        if count == 0 {
            continue;
        }
        current = current.replace(pattern.as_str(), replacement);
        *matches.entry(pattern.clone()).or_default() += count;
    }
    current
}

impl NamingStrategy for ReplaceStrategy {
    fn command(&self) -> Command {
        Command::Replace
    }

    fn evaluate(&mut self, candidate: &Candidate) -> Evaluation {
        let name = candidate.name();
        let proposed = substitute(name, &self.patterns, &self.replacement, &mut self.matches);
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
        BatchMetadata::Replace(ReplaceMetadata {
            patterns: self.patterns.clone(),
            replacement: self.replacement.clone(),
            matches: self.matches.clone(),
            total_candidates: plan.total_candidates,
            changed: plan.changed_count,
        })
    }
}
