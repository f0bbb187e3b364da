use clap::Subcommand;

use cadence_core::{Config, ScheduleDb, SessionLink, TimeTracker};

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start tracking against a habit occurrence or a task
    Start {
        /// Habit occurrence ID
        #[arg(long, conflicts_with = "task")]
        occurrence: Option<String>,
        /// Task ID
        #[arg(long)]
        task: Option<String>,
    },
    /// Pause the session (defaults to the active one)
    Pause {
        #[arg(long)]
        session: Option<i64>,
    },
    /// Resume the session (defaults to the active one)
    Resume {
        #[arg(long)]
        session: Option<i64>,
    },
    /// Stop the session, fixing its end and completing a linked occurrence
    Stop {
        #[arg(long)]
        session: Option<i64>,
    },
    /// Cancel the session, erasing it entirely
    Cancel {
        #[arg(long)]
        session: Option<i64>,
    },
    /// Print the active session, if any
    Status,
}

fn resolve_session(tracker: &TimeTracker, session: Option<i64>) -> Result<i64, Box<dyn std::error::Error>> {
    match session {
        Some(id) => Ok(id),
        None => tracker
            .get_any_active()?
            .map(|s| s.id)
            .ok_or_else(|| "no active session".into()),
    }
}

pub fn run(action: TimerAction) -> CliResult {
    let db = ScheduleDb::open()?;
    let tracker = TimeTracker::new(&db);

    match action {
        TimerAction::Start { occurrence, task } => {
            let link = match (occurrence, task) {
                (Some(id), None) => SessionLink::HabitOccurrence(id),
                (None, Some(id)) => SessionLink::Task(id),
                _ => return Err("provide exactly one of --occurrence or --task".into()),
            };
            // One globally active session, enforced here at the
            // interaction layer.
            let config = Config::load().unwrap_or_default();
            if config.tracker.single_active_session {
                if let Some(active) = tracker.get_any_active()? {
                    return Err(format!(
                        "session {} is already active; stop or cancel it first",
                        active.id
                    )
                    .into());
                }
            }
            print_json(&tracker.start(link)?)?;
        }
        TimerAction::Pause { session } => {
            let id = resolve_session(&tracker, session)?;
            print_json(&tracker.pause(id)?)?;
        }
        TimerAction::Resume { session } => {
            let id = resolve_session(&tracker, session)?;
            print_json(&tracker.resume(id)?)?;
        }
        TimerAction::Stop { session } => {
            let id = resolve_session(&tracker, session)?;
            print_json(&tracker.stop(id)?)?;
        }
        TimerAction::Cancel { session } => {
            let id = resolve_session(&tracker, session)?;
            tracker.cancel(id)?;
            println!("{{\"cancelled\": {id}}}");
        }
        TimerAction::Status => {
            print_json(&tracker.get_any_active()?)?;
        }
    }
    Ok(())
}
