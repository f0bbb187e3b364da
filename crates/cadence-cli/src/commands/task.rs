use clap::Subcommand;

use cadence_core::{EntityRef, Planner, ScheduleDb, Task, TaskState};

use super::{parse_instant, print_json, CliResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a task
    Add {
        /// Task title
        title: String,
        /// Scheduled start instant (RFC3339)
        #[arg(long)]
        at: Option<String>,
        /// Deadline (RFC3339)
        #[arg(long)]
        deadline: Option<String>,
    },
    /// List all tasks
    List,
    /// Set or move a task's scheduled instant and re-scan for conflicts
    Schedule {
        /// Task ID
        id: String,
        /// Scheduled start instant (RFC3339)
        at: String,
    },
    /// Mark a task done
    Done {
        /// Task ID
        id: String,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },
}

pub fn run(action: TaskAction) -> CliResult {
    let db = ScheduleDb::open()?;

    match action {
        TaskAction::Add { title, at, deadline } => {
            let mut task = Task::new(title);
            task.scheduled_at = at.as_deref().map(parse_instant).transpose()?;
            task.deadline = deadline.as_deref().map(parse_instant).transpose()?;
            db.create_task(&task)?;
            print_json(&task)?;
        }
        TaskAction::List => {
            print_json(&db.list_tasks()?)?;
        }
        TaskAction::Schedule { id, at } => {
            let mut task = db
                .get_task(&id)?
                .ok_or_else(|| format!("task '{id}' not found"))?;
            task.scheduled_at = Some(parse_instant(&at)?);
            task.updated_at = chrono::Utc::now();
            db.update_task(&task)?;

            let conflicts = Planner::new(&db).detect_conflicts(&EntityRef::task(&id))?;
            print_json(&serde_json::json!({
                "task": task,
                "conflicts": conflicts,
            }))?;
        }
        TaskAction::Done { id } => {
            let mut task = db
                .get_task(&id)?
                .ok_or_else(|| format!("task '{id}' not found"))?;
            if matches!(task.state, TaskState::Planned | TaskState::Paused) {
                task.transition(TaskState::InProgress)?;
            }
            task.transition(TaskState::Done)?;
            db.update_task(&task)?;
            print_json(&task)?;
        }
        TaskAction::Delete { id } => {
            db.delete_task(&id)?;
            println!("{{\"deleted\": \"{id}\"}}");
        }
    }
    Ok(())
}
