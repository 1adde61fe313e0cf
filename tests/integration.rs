use anyhow::Result;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

use renamer::cancel::CancelToken;
use renamer::cli::{ApplyArgs, ScopeArgs};
use renamer::error::{ApplyError, LedgerError};
use renamer::ledger::{BatchMetadata, LEDGER_FILE_NAME, Ledger};
use renamer::model::{self, ConflictReason};
use renamer::planner::Planner;
use renamer::scope::{self, Scope};
use renamer::strategy::{
    ExtensionStrategy, ExternalPlanStrategy, NamingStrategy, RegexStrategy, ReplaceStrategy,
    SequenceConfig, SequenceStrategy,
};
use renamer::transaction;

fn scope_args(root: &Path) -> ScopeArgs {
    ScopeArgs {
        path: Some(root.to_path_buf()),
        ..ScopeArgs::default()
    }
}

fn yes() -> ApplyArgs {
    ApplyArgs {
        dry_run: false,
        yes: true,
    }
}

fn apply(root: &Path, strategy: &mut dyn NamingStrategy) -> Result<i32> {
    renamer::engine::rename(&scope_args(root), &yes(), strategy, false, &CancelToken::new())
}

fn names(root: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(root)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<_>>()?;
    names.sort();
    Ok(names)
}

#[test]
fn test_regex_apply_then_undo() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    for name in ["alpha-123.log", "beta-456.log", "gamma-789.log"] {
        fs::write(root.join(name), name)?;
    }

    let mut strategy = RegexStrategy::new(r"^(\w+)-(\d+)", "@2_@1")?;
    let code = renamer::engine::rename(
        &scope_args(root),
        &yes(),
        &mut strategy,
        false,
        &CancelToken::new(),
    )?;
    assert_eq!(code, 0);
    assert_eq!(
        names(root)?,
        vec![LEDGER_FILE_NAME, "123_alpha.log", "456_beta.log", "789_gamma.log"]
    );
    assert_eq!(fs::read_to_string(root.join("456_beta.log"))?, "beta-456.log");

    let ledger = Ledger::for_dir(root);
    let entries = ledger.entries()?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operations.len(), 3);
    let BatchMetadata::Regex(meta) = &entries[0].metadata else {
        panic!("expected regex metadata");
    };
    assert_eq!(meta.matched, 3);
    assert_eq!(meta.match_groups["alpha-123.log"], vec!["alpha", "123"]);

    let line = fs::read_to_string(ledger.path())?;
    let value: serde_json::Value = serde_json::from_str(line.trim())?;
    assert_eq!(value["command"], json!("regex"));
    assert_eq!(value["metadata"]["template"], json!("@2_@1"));

    let code = renamer::engine::undo(&scope_args(root), false)?;
    assert_eq!(code, 0);
    assert_eq!(
        names(root)?,
        vec!["alpha-123.log", "beta-456.log", "gamma-789.log"]
    );
    assert!(!ledger.path().exists());

    let err = renamer::engine::undo(&scope_args(root), false).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LedgerError>(),
        Some(LedgerError::NoEntries)
    ));
    Ok(())
}

#[test]
fn test_dry_run_touches_nothing() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    fs::write(root.join("draft one.txt"), "x")?;

    let mut strategy = ReplaceStrategy::new(&["draft ".to_string(), String::new()])?;
    let apply = ApplyArgs {
        dry_run: true,
        yes: false,
    };
    let cancel = CancelToken::new();
    let code = renamer::engine::rename(&scope_args(root), &apply, &mut strategy, true, &cancel)?;
    assert_eq!(code, 0);
    assert_eq!(names(root)?, vec!["draft one.txt"]);
    Ok(())
}

#[test]
fn test_conflicts_block_apply() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    fs::write(root.join("a-1.txt"), "a")?;
    fs::write(root.join("b-1.txt"), "b")?;

    let mut strategy = RegexStrategy::new(r"^\w-(\d)$", "file@1")?;
    let code = apply(root, &mut strategy)?;
    assert_eq!(code, 2);
    assert_eq!(names(root)?, vec!["a-1.txt", "b-1.txt"]);
    Ok(())
}

#[test]
fn test_failed_rename_rolls_back_whole_batch() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    fs::write(root.join("a.txt"), "a")?;
    fs::write(root.join("b.txt"), "b")?;

    let candidates = scope::enumerate(&Scope::new(root), &CancelToken::new())?;
    let mut strategy = ReplaceStrategy::new(&[".txt".to_string(), ".md".to_string()])?;
    let plan = Planner::new(root).plan(&candidates, &mut strategy)?;
    assert_eq!(plan.changed_count, 2);

    // b.md shows up between planning and apply.
    fs::write(root.join("b.md"), "intruder")?;

    let ledger = Ledger::for_dir(root);
    let err = transaction::apply_plan(
        &plan,
        &ledger,
        strategy.metadata(&plan),
        &CancelToken::new(),
        |_| {},
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ApplyError>(),
        Some(ApplyError::RolledBack(1))
    ));
    assert_eq!(names(root)?, vec!["a.txt", "b.md", "b.txt"]);
    assert!(!ledger.path().exists());
    Ok(())
}

#[test]
fn test_unwritable_ledger_reports_transactional_failure() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    fs::write(root.join("x.jpeg"), "x")?;
    fs::create_dir(root.join(LEDGER_FILE_NAME))?;

    let mut strategy = ExtensionStrategy::new(&[".jpeg".to_string(), ".jpg".to_string()])?;
    let code = apply(root, &mut strategy)?;
    assert_eq!(code, 3);
    assert!(root.join("x.jpeg").exists());
    assert!(!root.join("x.jpg").exists());
    Ok(())
}

#[test]
fn test_directories_renamed_after_their_contents() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    fs::create_dir_all(root.join("old/deeper"))?;
    fs::write(root.join("old/old.txt"), "1")?;
    fs::write(root.join("old/deeper/old.txt"), "2")?;

    let mut args = scope_args(root);
    args.recursive = true;
    args.include_dirs = true;
    let mut strategy = ReplaceStrategy::new(&["old".to_string(), "new".to_string()])?;
    let code = renamer::engine::rename(&args, &yes(), &mut strategy, false, &CancelToken::new())?;
    assert_eq!(code, 0);
    assert!(root.join("new/new.txt").exists());
    assert!(root.join("new/deeper/new.txt").exists());
    assert!(!root.join("old").exists());

    let entries = Ledger::for_dir(root).entries()?;
    let froms: Vec<&str> = entries[0]
        .operations
        .iter()
        .map(|op| op.from.as_str())
        .collect();
    assert_eq!(froms, vec!["old/deeper/old.txt", "old/old.txt", "old"]);

    renamer::engine::undo(&args, false)?;
    assert!(root.join("old/old.txt").exists());
    assert!(root.join("old/deeper/old.txt").exists());
    assert!(!root.join("new").exists());
    Ok(())
}

#[test]
fn test_case_only_extension_rename() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    fs::write(root.join("Photo.JPG"), "p")?;

    let mut strategy = ExtensionStrategy::new(&[".JPG".to_string(), ".jpg".to_string()])?;
    let code = apply(root, &mut strategy)?;
    assert_eq!(code, 0);
    assert_eq!(names(root)?, vec![LEDGER_FILE_NAME, "Photo.jpg"]);
    Ok(())
}

#[test]
fn test_sequence_numbers_files_in_order() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    for name in ["b.png", "a.png", "c.png"] {
        fs::write(root.join(name), name)?;
    }
    let mut strategy = SequenceStrategy::new(SequenceConfig::default())?;
    apply(root, &mut strategy)?;
    assert_eq!(
        names(root)?,
        vec![LEDGER_FILE_NAME, "001_a.png", "002_b.png", "003_c.png"]
    );
    Ok(())
}

#[test]
fn test_external_plan_moves_files() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    fs::write(root.join("IMG_001.jpg"), "1")?;
    fs::write(root.join("IMG_002.jpg"), "2")?;

    let plan = model::from_json(
        &json!({
            "model": "test-model",
            "items": [
                { "original": "IMG_001.jpg", "proposed": "trips/beach.jpg", "sequence": 1 },
                { "original": "IMG_002.jpg", "proposed": "trips/sunset.jpg", "sequence": 2 }
            ]
        })
        .to_string(),
    )?;
    let mut strategy = ExternalPlanStrategy::new(plan);
    let code = apply(root, &mut strategy)?;
    assert_eq!(code, 0);
    assert_eq!(fs::read_to_string(root.join("trips/sunset.jpg"))?, "2");

    let entries = Ledger::for_dir(root).entries()?;
    let BatchMetadata::Ai(meta) = &entries[0].metadata else {
        panic!("expected ai metadata");
    };
    assert_eq!(meta.model.as_deref(), Some("test-model"));
    assert_eq!(meta.batch_size, 2);

    renamer::engine::undo(&scope_args(root), false)?;
    assert!(root.join("IMG_001.jpg").exists());
    assert!(root.join("IMG_002.jpg").exists());
    Ok(())
}

#[test]
fn test_external_plan_sequence_gap_conflicts() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    fs::write(root.join("a.txt"), "a")?;
    fs::write(root.join("b.txt"), "b")?;

    let plan = model::from_json(
        &json!({
            "items": [
                { "original": "a.txt", "proposed": "one.txt", "sequence": 1 },
                { "original": "b.txt", "proposed": "three.txt", "sequence": 3 }
            ]
        })
        .to_string(),
    )?;
    let candidates = scope::enumerate(&Scope::new(root), &CancelToken::new())?;
    let mut strategy = ExternalPlanStrategy::new(plan);
    let built = Planner::new(root).plan(&candidates, &mut strategy)?;
    assert_eq!(built.conflicts.len(), 1);
    assert_eq!(built.conflicts[0].reason, ConflictReason::SequenceGap);
    Ok(())
}

#[test]
fn test_undo_only_reverts_latest_batch() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    fs::write(root.join("report.txt"), "r")?;

    let mut first = ReplaceStrategy::new(&["report".to_string(), "summary".to_string()])?;
    apply(root, &mut first)?;
    let mut second = ExtensionStrategy::new(&[".txt".to_string(), ".md".to_string()])?;
    apply(root, &mut second)?;
    assert!(root.join("summary.md").exists());
    assert_eq!(Ledger::for_dir(root).entries()?.len(), 2);

    renamer::engine::undo(&scope_args(root), false)?;
    assert!(root.join("summary.txt").exists());
    assert_eq!(Ledger::for_dir(root).entries()?.len(), 1);
    Ok(())
}
