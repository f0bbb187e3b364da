use clap::Subcommand;

use cadence_core::{CalendarEvent, ScheduleDb};

use super::{parse_instant, print_json, CliResult};

#[derive(Subcommand)]
pub enum EventAction {
    /// Create a calendar event
    Add {
        /// Event title
        title: String,
        /// Start instant (RFC3339)
        start: String,
        /// End instant (RFC3339)
        end: String,
    },
    /// List all events
    List,
    /// Delete an event
    Delete {
        /// Event ID
        id: String,
    },
}

pub fn run(action: EventAction) -> CliResult {
    let db = ScheduleDb::open()?;

    match action {
        EventAction::Add { title, start, end } => {
            let start = parse_instant(&start)?;
            let end = parse_instant(&end)?;
            if end <= start {
                return Err(format!("end ({end}) must be greater than start ({start})").into());
            }
            let event = CalendarEvent::new(title, start, end);
            db.create_event(&event)?;
            print_json(&event)?;
        }
        EventAction::List => {
            print_json(&db.list_events()?)?;
        }
        EventAction::Delete { id } => {
            db.delete_event(&id)?;
            println!("{{\"deleted\": \"{id}\"}}");
        }
    }
    Ok(())
}
