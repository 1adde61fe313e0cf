use bytesize::ByteSize;

use crate::events::Event;
use crate::model::EntryStatus;

/// Reporter aggregates events and produces human or JSON output on stdout.
pub struct Reporter {
    events: Vec<Event>,
    json_mode: bool,
}

impl Reporter {
    pub fn new(json_mode: bool) -> Self {
        Self {
            events: Vec::new(),
            json_mode,
        }
    }

    pub fn record(&mut self, event: Event) {
        if self.json_mode {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{}", line);
            }
        } else if let Some(line) = render(&event) {
            println!("{}", line);
        }
        self.events.push(event);
    }

    pub fn summary(&self) -> String {
        let renamed = self
            .events
            .iter()
            .filter(|event| matches!(event, Event::RenameApplied { .. }))
            .count();
        let warnings = self
            .events
            .iter()
            .filter(|event| matches!(event, Event::Warning { .. }))
            .count();
        format!("{renamed} renamed, {warnings} warning(s)")
    }
}

/// Human rendering of an event; `None` for events that only matter in JSON.
fn render(event: &Event) -> Option<String> {
    Some(match event {
        Event::CandidateListed { path, is_dir, size } => {
            if *is_dir {
                format!("{:>10}  {path}/", "-")
            } else {
                format!("{:>10}  {path}", ByteSize::b(*size).to_string())
            }
        }
        Event::ListSummary {
            files,
            directories,
            total_bytes,
        } => format!(
            "{files} file(s), {directories} dir(s), {} total",
            ByteSize::b(*total_bytes)
        ),
        Event::EntryPlanned {
            original,
            proposed,
            status,
            reason,
        } => match (status, reason) {
            (EntryStatus::Pending, _) => format!("  {original} -> {proposed}"),
            (EntryStatus::Skipped, Some(reason)) => {
                format!("! {original} -> {proposed} ({reason})")
            }
            _ => return None,
        },
        Event::ConflictDetected { .. } => return None,
        Event::Warning { message } => format!("warning: {message}"),
        Event::PlanBuilt {
            command,
            total_candidates,
            changed,
            skipped,
            conflicts,
            dry_run,
        } => {
            let mut line = format!(
                "{command}: {changed} of {total_candidates} candidate(s) to rename, {skipped} skipped"
            );
            if *conflicts > 0 {
                line.push_str(&format!(", {conflicts} conflict(s)"));
            }
            if *dry_run {
                line.push_str(" (dry run)");
            }
            line
        }
        Event::RenameApplied { .. } => return None,
        Event::BatchCommitted {
            command,
            operations,
            ..
        } => format!("{command}: renamed {operations} item(s)"),
        Event::BatchRolledBack { error, .. } => format!("rolled back: {error}"),
        Event::UndoCompleted {
            command,
            operations,
            note,
        } => {
            let mut line = format!("undo {command}: restored {operations} item(s)");
            if let Some(note) = note {
                line.push_str(&format!("\n{note}"));
            }
            line
        }
    })
}
