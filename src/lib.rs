//! Batch renaming: candidate enumeration, naming strategies, conflict-aware
//! planning, transactional apply and an undoable ledger.

pub mod cancel;
pub mod cli;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fsops;
pub mod ledger;
pub mod model;
pub mod planner;
pub mod reporter;
pub mod scope;
pub mod strategy;
pub mod template;
pub mod transaction;
