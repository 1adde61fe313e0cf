use anyhow::{Result, bail};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::ledger::{BatchMetadata, Command, SequenceMetadata};
use crate::model::{Candidate, ConflictReason, EntryStatus, Plan};
use crate::strategy::{Evaluation, NamingStrategy, Proposal};

const DEFAULT_WIDTH: usize = 3;

/// Where the number goes relative to the stem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    #[default]
    Prefix,
    Suffix,
}

impl Placement {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prefix => "prefix",
            Self::Suffix => "suffix",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceConfig {
    pub start: u64,
    /// Minimum zero-padded width; `None` uses the default of 3.
    pub width: Option<usize>,
    pub placement: Placement,
    pub separator: String,
    /// Text placed right before the number.
    pub number_prefix: String,
    /// Text placed right after the number.
    pub number_suffix: String,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            start: 1,
            width: None,
            placement: Placement::Prefix,
            separator: "_".to_string(),
            number_prefix: String::new(),
            number_suffix: String::new(),
        }
    }
}

impl SequenceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.start < 1 {
            bail!("start must be >= 1");
        }
        if self.width == Some(0) {
            bail!("width must be >= 1 when specified");
        }
        for (label, value) in [
            ("separator", &self.separator),
            ("number prefix", &self.number_prefix),
            ("number suffix", &self.number_suffix),
        ] {
            if value.contains(['/', '\\']) {
                bail!("{label} cannot contain path separators");
            }
        }
        Ok(())
    }
}

/// Number files in candidate order. Directories are left alone.
pub struct SequenceStrategy {
    config: SequenceConfig,
    /// `None` once the counter has run past `u64::MAX`.
    next: Option<u64>,
    applied_width: usize,
    warnings: Vec<String>,
}

impl SequenceStrategy {
    pub fn new(config: SequenceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            next: Some(config.start),
            applied_width: config.width.unwrap_or(DEFAULT_WIDTH),
            config,
            warnings: Vec::new(),
        })
    }

    fn format_number(&mut self, value: u64, path: &str) -> String {
        let requested = self.config.width.unwrap_or(DEFAULT_WIDTH);
        let digits = value.to_string().len();
        let width = requested.max(digits);
        if width > self.applied_width {
            if self.config.width.is_some() && self.warnings.is_empty() {
                self.warnings.push(format!(
                    "requested width {requested} expanded to {width} for {path}"
                ));
            }
            self.applied_width = width;
        }
        format!(
            "{}{value:0width$}{}",
            self.config.number_prefix, self.config.number_suffix
        )
    }
}

impl NamingStrategy for SequenceStrategy {
    fn command(&self) -> Command {
        Command::Sequence
    }

    fn evaluate(&mut self, candidate: &Candidate) -> Evaluation {
        if candidate.is_dir {
            return Evaluation::NoMatch;
        }
        let Some(value) = self.next else {
            return Evaluation::Reject {
                reason: ConflictReason::InvalidTemplate,
                message: "sequence number exceeds the largest supported value".to_string(),
            };
        };
        self.next = value.checked_add(1);
        let number = self.format_number(value, &candidate.relative_path);
        let stem = candidate.stem();
        let sep = &self.config.separator;
        let name = match self.config.placement {
            Placement::Prefix => format!("{number}{sep}{stem}{}", candidate.extension),
            Placement::Suffix => format!("{stem}{sep}{number}{}", candidate.extension),
        };
        Evaluation::Rename(Proposal::name(name))
    }

    fn warnings(&self) -> Vec<String> {
        self.warnings.clone()
    }

    fn metadata(&self, plan: &Plan) -> BatchMetadata {
        let files = plan
            .entries
            .iter()
            .filter(|entry| !entry.candidate.is_dir)
            .count();
        let skipped = plan
            .entries
            .iter()
            .filter(|entry| entry.status == EntryStatus::Skipped)
            .count();
        BatchMetadata::Sequence(SequenceMetadata {
            start: self.config.start,
            width: self.applied_width,
            placement: self.config.placement.as_str().to_string(),
            separator: self.config.separator.clone(),
            prefix: self.config.number_prefix.clone(),
            suffix: self.config.number_suffix.clone(),
            total_candidates: files,
            renamed: plan.changed_count,
            skipped,
        })
    }
}
