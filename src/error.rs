use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while compiling or rendering a capture-group template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("invalid regex pattern: {0}")]
    Pattern(String),
    #[error("dangling @ at end of template")]
    DanglingAt,
    #[error("invalid placeholder at offset {0}")]
    InvalidPlaceholder(usize),
    #[error("invalid placeholder index @{0}")]
    InvalidIndex(String),
    #[error("template references @{group} but pattern only defines {available} groups")]
    GroupOutOfRange { group: usize, available: usize },
    #[error("template references @{0} but the pattern did not produce that group")]
    UndefinedPlaceholder(usize),
}

/// Errors specific to the rename ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no ledger entries available")]
    NoEntries,
    #[error("invalid ledger line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that abort a batch before or during apply.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("{0} conflict(s) detected; resolve them before applying")]
    Conflicts(usize),
    #[error("operation cancelled")]
    Cancelled,
    #[error("destination appeared after planning: {0}")]
    DestinationExists(String),
    #[error("batch rolled back after {0} rename(s)")]
    RolledBack(usize),
}

/// Errors describing an unusable scope.
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("working directory {0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("extensions string contains empty token")]
    EmptyExtension,
    #[error("extension {0:?} must start with '.'")]
    MissingDot(String),
}
