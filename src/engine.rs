use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::cancel::CancelToken;
use crate::cli::{ApplyArgs, Cli, Command, ScopeArgs};
use crate::error::ApplyError;
use crate::events::Event;
use crate::exit_codes::exit;
use crate::ledger::Ledger;
use crate::model::{self, Plan};
use crate::planner::Planner;
use crate::reporter::Reporter;
use crate::scope::{self, Scope};
use crate::strategy::{
    ExtensionStrategy, ExternalPlanStrategy, InsertStrategy, NamingStrategy, RegexStrategy,
    RemoveStrategy, ReplaceStrategy, SequenceConfig, SequenceStrategy,
};
use crate::transaction;

/// Run a parsed command line and return the process exit code.
pub fn run(cli: Cli, cancel: &CancelToken) -> Result<i32> {
    let json = cli.json;
    let scope = &cli.scope;
    match cli.command {
        Command::List => list(scope, json, cancel),
        Command::Undo => undo(scope, json),
        Command::Schema => schema(),
        Command::Regex(args) => {
            let mut strategy = RegexStrategy::new(&args.pattern, &args.template)?;
            rename(scope, &args.apply, &mut strategy, json, cancel)
        }
        Command::Replace(args) => {
            let mut strategy = ReplaceStrategy::new(&args.args)?;
            rename(scope, &args.apply, &mut strategy, json, cancel)
        }
        Command::Remove(args) => {
            let mut strategy = RemoveStrategy::new(&args.tokens)?;
            rename(scope, &args.apply, &mut strategy, json, cancel)
        }
        Command::Extension(args) => {
            let mut strategy = ExtensionStrategy::new(&args.args)?;
            rename(scope, &args.apply, &mut strategy, json, cancel)
        }
        Command::Insert(args) => {
            let mut strategy = InsertStrategy::new(&args.position, &args.text)?;
            rename(scope, &args.apply, &mut strategy, json, cancel)
        }
        Command::Sequence(args) => {
            let mut strategy = SequenceStrategy::new(SequenceConfig {
                start: args.start,
                width: args.width,
                placement: args.placement,
                separator: args.separator,
                number_prefix: args.number_prefix,
                number_suffix: args.number_suffix,
            })?;
            rename(scope, &args.apply, &mut strategy, json, cancel)
        }
        Command::Ai(args) => {
            let plan = model::load_plan(&args.plan).context("failed to load rename plan")?;
            let mut strategy = ExternalPlanStrategy::new(plan);
            rename(scope, &args.apply, &mut strategy, json, cancel)
        }
    }
}

fn build_scope(args: &ScopeArgs) -> Result<Scope> {
    let root = scope::resolve_working_dir(args.path.as_deref())?;
    let mut scope = Scope::new(root);
    scope.recursive = args.recursive;
    scope.include_directories = args.include_dirs;
    scope.include_hidden = args.hidden;
    scope.max_depth = args.max_depth;
    if let Some(raw) = &args.extensions {
        scope.extensions = scope::parse_extensions(raw)?;
    }
    Ok(scope)
}

pub fn list(args: &ScopeArgs, json: bool, cancel: &CancelToken) -> Result<i32> {
    let mut reporter = Reporter::new(json);
    let scope = build_scope(args)?;
    let candidates = scope::enumerate(&scope, cancel)?;

    let mut files = 0;
    let mut directories = 0;
    let mut total_bytes = 0;
    for candidate in &candidates {
        if candidate.is_dir {
            directories += 1;
        } else {
            files += 1;
            total_bytes += candidate.size;
        }
        reporter.record(Event::CandidateListed {
            path: candidate.relative_path.clone(),
            is_dir: candidate.is_dir,
            size: candidate.size,
        });
    }
    reporter.record(Event::ListSummary {
        files,
        directories,
        total_bytes,
    });
    Ok(exit::SUCCESS)
}

/// Plan `strategy` over the scope, preview it, and apply it when confirmed.
pub fn rename(
    args: &ScopeArgs,
    apply: &ApplyArgs,
    strategy: &mut dyn NamingStrategy,
    json: bool,
    cancel: &CancelToken,
) -> Result<i32> {
    let mut reporter = Reporter::new(json);
    let scope = build_scope(args)?;
    let candidates = scope::enumerate(&scope, cancel)?;
    let plan = Planner::new(&scope.root).plan(&candidates, strategy)?;
    report_plan(&mut reporter, strategy, &plan, apply.dry_run);

    if !plan.is_applicable() {
        return Ok(exit::CONFLICTS);
    }
    if apply.dry_run || plan.changed_count == 0 {
        return Ok(exit::SUCCESS);
    }
    if !apply.yes && !confirm(plan.changed_count)? {
        eprintln!("aborted; nothing renamed");
        return Ok(exit::SUCCESS);
    }

    let ledger = Ledger::for_dir(&scope.root);
    let metadata = strategy.metadata(&plan);
    let batch_id = uuid::Uuid::new_v4();
    let result = transaction::apply_plan(&plan, &ledger, metadata, cancel, |op| {
        reporter.record(Event::RenameApplied {
            batch_id,
            from: op.from.clone(),
            to: op.to.clone(),
        });
    });

    match result {
        Ok(Some(entry)) => {
            reporter.record(Event::BatchCommitted {
                batch_id,
                command: entry.command(),
                operations: entry.operations.len(),
            });
            tracing::info!(summary = %reporter.summary(), "batch finished");
            Ok(exit::SUCCESS)
        }
        Ok(None) => Ok(exit::SUCCESS),
        Err(err) if matches!(err.downcast_ref::<ApplyError>(), Some(ApplyError::RolledBack(_))) => {
            tracing::error!(error = %format!("{err:#}"), "apply failed");
            reporter.record(Event::BatchRolledBack {
                batch_id,
                error: format!("{err:#}"),
            });
            Ok(exit::TRANSACTIONAL_FAILURE)
        }
        Err(err) => Err(err),
    }
}

fn report_plan(reporter: &mut Reporter, strategy: &dyn NamingStrategy, plan: &Plan, dry_run: bool) {
    for entry in &plan.entries {
        reporter.record(Event::EntryPlanned {
            original: entry.candidate.relative_path.clone(),
            proposed: entry.proposed_relative_path.clone(),
            status: entry.status,
            reason: entry.conflict_reason,
        });
    }
    for conflict in &plan.conflicts {
        reporter.record(Event::ConflictDetected {
            original: conflict.original_path.clone(),
            proposed: conflict.proposed_path.clone(),
            reason: conflict.reason,
        });
    }
    for warning in &plan.warnings {
        reporter.record(Event::Warning {
            message: warning.clone(),
        });
    }
    reporter.record(Event::PlanBuilt {
        command: strategy.command(),
        total_candidates: plan.total_candidates,
        changed: plan.changed_count,
        skipped: plan.skipped_count,
        conflicts: plan.conflicts.len(),
        dry_run,
    });
}

fn confirm(count: usize) -> Result<bool> {
    eprint!("Apply {count} rename(s)? [y/N] ");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub fn undo(args: &ScopeArgs, json: bool) -> Result<i32> {
    let mut reporter = Reporter::new(json);
    let root: PathBuf = scope::resolve_working_dir(args.path.as_deref())?;
    let entry = Ledger::for_dir(&root).undo()?;
    reporter.record(Event::UndoCompleted {
        command: entry.command(),
        operations: entry.operations.len(),
        note: entry.metadata.undo_note(),
    });
    Ok(exit::SUCCESS)
}

pub fn schema() -> Result<i32> {
    println!("{}", model::generate_schema()?);
    Ok(exit::SUCCESS)
}
