use anyhow::{Result, bail};
use std::collections::HashSet;

use crate::ledger::{BatchMetadata, Command, ExtensionMetadata};
use crate::model::{Candidate, Plan, split_last_extension};
use crate::strategy::{Evaluation, NamingStrategy, Proposal};

/// Swap the final extension of matching entries for a target extension.
///
/// Source extensions compare case-insensitively; the target keeps the casing
/// the caller gave it, so `.JPG -> .jpg` is a real rename.
pub struct ExtensionStrategy {
    /// Lower-cased sources, first spelling wins.
    sources: Vec<String>,
    display: Vec<String>,
    target: String,
    warnings: Vec<String>,
}

impl ExtensionStrategy {
    /// `args` is one or more source extensions followed by the target.
    pub fn new(args: &[String]) -> Result<Self> {
        let Some((target, sources)) = args.split_last() else {
            bail!("at least one source extension and a target extension are required");
        };
        if sources.is_empty() {
            bail!("at least one source extension and a target extension are required");
        }
        let target = target.trim().to_string();
        validate_token("target", &target)?;

        let target_canonical = target.to_lowercase();
        let mut seen = HashSet::new();
        let mut canonical = Vec::new();
        let mut display = Vec::new();
        let mut warnings = Vec::new();
        for raw in sources {
            let token = raw.trim();
            validate_token("source", token)?;
            let canon = token.to_lowercase();
            if !seen.insert(canon.clone()) {
                warnings.push(format!("duplicate source extension {token} ignored"));
                continue;
            }
            if canon == target_canonical && token == target {
                warnings.push(format!("source extension {token} already matches the target"));
                continue;
            }
            canonical.push(canon);
            display.push(token.to_string());
        }
        if canonical.is_empty() {
            bail!(
                "all source extensions match the target extension; provide at least one distinct source extension"
            );
        }

        Ok(Self {
            sources: canonical,
            display,
            target,
            warnings,
        })
    }
}

fn validate_token(kind: &str, token: &str) -> Result<()> {
    if token.is_empty() {
        bail!("{kind} extension cannot be empty");
    }
    if !token.starts_with('.') {
        bail!("{kind} extension {token:?} must start with '.'");
    }
    if token.len() == 1 {
        bail!("{kind} extension {token:?} must include characters after '.'");
    }
    Ok(())
}

impl NamingStrategy for ExtensionStrategy {
    fn command(&self) -> Command {
        Command::Extension
    }

    fn evaluate(&mut self, candidate: &Candidate) -> Evaluation {
        let (base, ext) = split_last_extension(candidate.name());
        if ext.is_empty() || ext == self.target {
            return Evaluation::NoMatch;
        }
        let canonical = ext.to_lowercase();
        if canonical != self.target.to_lowercase() && !self.sources.contains(&canonical) {
            return Evaluation::NoMatch;
        }
        Evaluation::Rename(Proposal::name(format!("{base}{}", self.target)))
    }

    fn warnings(&self) -> Vec<String> {
        self.warnings.clone()
    }

    fn metadata(&self, plan: &Plan) -> BatchMetadata {
        BatchMetadata::Extension(ExtensionMetadata {
            source_extensions: self.display.clone(),
            target_extension: self.target.clone(),
            total_candidates: plan.total_candidates,
            changed: plan.changed_count,
        })
    }
}
