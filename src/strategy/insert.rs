use anyhow::{Result, bail};
use std::fmt;
use std::str::FromStr;

use crate::ledger::{BatchMetadata, Command, InsertMetadata};
use crate::model::{Candidate, ConflictReason, Plan, split_last_extension};
use crate::strategy::{Evaluation, NamingStrategy, Proposal};

/// Where text goes inside a stem, counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// `^` or `0`
    Start,
    /// `$`
    End,
    /// `^N` or `N`: after the first N characters.
    FromStart(usize),
    /// `N$` or `-N`: before the last N characters.
    FromEnd(usize),
}

impl Position {
    /// Character index for a stem of `len` characters, `None` when out of range.
    pub fn resolve(self, len: usize) -> Option<usize> {
        match self {
            Self::Start => Some(0),
            Self::End => Some(len),
            Self::FromStart(n) => (n <= len).then_some(n),
            Self::FromEnd(n) => len.checked_sub(n),
        }
    }
}

impl FromStr for Position {
    type Err = anyhow::Error;

    fn from_str(token: &str) -> Result<Self> {
        let token = token.trim();
        let parse = |digits: &str| -> Result<usize> {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                bail!("invalid position token {token:?}");
            }
            Ok(digits.parse()?)
        };
        Ok(match token {
            "" => bail!("position token cannot be empty"),
            "^" => Self::Start,
            "$" => Self::End,
            _ if token.starts_with('^') => Self::FromStart(parse(&token[1..])?),
            _ if token.ends_with('$') => Self::FromEnd(parse(&token[..token.len() - 1])?),
            _ if token.starts_with('-') => Self::FromEnd(parse(&token[1..])?),
            _ => match parse(token.strip_prefix('+').unwrap_or(token))? {
                0 => Self::Start,
                n => Self::FromStart(n),
            },
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("^"),
            Self::End => f.write_str("$"),
            Self::FromStart(n) => write!(f, "^{n}"),
            Self::FromEnd(n) => write!(f, "{n}$"),
        }
    }
}

/// Insert fixed text at a position within each stem.
pub struct InsertStrategy {
    position: Position,
    text: String,
}

impl InsertStrategy {
    pub fn new(position: &str, text: &str) -> Result<Self> {
        let position: Position = position.parse()?;
        if text.is_empty() {
            bail!("insert text cannot be empty");
        }
        if text.contains(['/', '\\']) {
            bail!("insert text must not contain path separators");
        }
        if text.chars().any(char::is_control) {
            bail!("insert text must not contain control characters");
        }
        Ok(Self {
            position,
            text: text.to_string(),
        })
    }
}

impl NamingStrategy for InsertStrategy {
    fn command(&self) -> Command {
        Command::Insert
    }

    fn evaluate(&mut self, candidate: &Candidate) -> Evaluation {
        let (stem, ext) = if candidate.is_dir {
            (candidate.name(), "")
        } else {
            split_last_extension(candidate.name())
        };
        let len = stem.chars().count();
        let Some(index) = self.position.resolve(len) else {
            return Evaluation::Reject {
                reason: ConflictReason::InvalidTemplate,
                message: format!(
                    "position {} out of range for {len}-character stem of {}",
                    self.position, candidate.relative_path
                ),
            };
        };
        let split = stem
            .char_indices()
            .nth(index)
            .map(|(byte, _)| byte)
            .unwrap_or(stem.len());
        let (head, tail) = stem.split_at(split);
        Evaluation::Rename(Proposal::name(format!("{head}{}{tail}{ext}", self.text)))
    }

    fn metadata(&self, plan: &Plan) -> BatchMetadata {
        BatchMetadata::Insert(InsertMetadata {
            position: self.position.to_string(),
            text: self.text.clone(),
            total_candidates: plan.total_candidates,
            changed: plan.changed_count,
        })
    }
}
