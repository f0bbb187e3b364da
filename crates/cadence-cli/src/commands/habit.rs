use clap::Subcommand;

use cadence_core::{Habit, Planner, ScheduleDb, SkipReason};

use super::{parse_date_or_today, parse_time, print_json, CliResult};

#[derive(Subcommand)]
pub enum HabitAction {
    /// Create a habit
    Add {
        /// Habit name
        name: String,
        /// Recurrence weekdays, 0=Sun..6=Sat, comma-separated (e.g. "1,3,5")
        #[arg(long, default_value = "0,1,2,3,4,5,6")]
        days: String,
        /// Start time of day (HH:MM)
        #[arg(long)]
        start: String,
        /// End time of day (HH:MM)
        #[arg(long)]
        end: String,
    },
    /// List all habits
    List,
    /// Generate pending occurrences over a date range
    Generate {
        /// Habit ID
        habit_id: String,
        /// First date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        from: Option<String>,
        /// Last date (YYYY-MM-DD), defaults to `from`
        #[arg(long)]
        to: Option<String>,
    },
    /// List occurrences on a date
    Occurrences {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Adjust an occurrence's time-of-day window and re-scan for conflicts
    Adjust {
        /// Occurrence ID
        id: String,
        /// New start time (HH:MM)
        #[arg(long)]
        start: Option<String>,
        /// New end time (HH:MM)
        #[arg(long)]
        end: Option<String>,
    },
    /// Skip an occurrence with a categorical reason
    Skip {
        /// Occurrence ID
        id: String,
        /// Reason: illness, travel, workload, fatigue, weather, other
        #[arg(long)]
        reason: String,
        /// Optional note (max 500 characters)
        #[arg(long)]
        note: Option<String>,
    },
}

pub fn run(action: HabitAction) -> CliResult {
    let db = ScheduleDb::open()?;
    let planner = Planner::new(&db);

    match action {
        HabitAction::Add {
            name,
            days,
            start,
            end,
        } => {
            let days: Vec<u8> = days
                .split(',')
                .filter(|s| !s.is_empty())
                .map(|s| s.trim().parse::<u8>())
                .collect::<Result<_, _>>()?;
            let habit = Habit::new(name, days, parse_time(&start)?, parse_time(&end)?)?;
            db.create_habit(&habit)?;
            print_json(&habit)?;
        }
        HabitAction::List => {
            print_json(&db.list_habits()?)?;
        }
        HabitAction::Generate { habit_id, from, to } => {
            let from = parse_date_or_today(from.as_deref())?;
            let to = match to.as_deref() {
                Some(s) => parse_date_or_today(Some(s))?,
                None => from,
            };
            let created = planner.generate_occurrences(&habit_id, from, to)?;
            print_json(&created)?;
        }
        HabitAction::Occurrences { date } => {
            let date = parse_date_or_today(date.as_deref())?;
            print_json(&db.occurrences_on(date, None)?)?;
        }
        HabitAction::Adjust { id, start, end } => {
            let start = start.as_deref().map(parse_time).transpose()?;
            let end = end.as_deref().map(parse_time).transpose()?;
            let (occurrence, conflicts) = planner.adjust_occurrence_time(&id, start, end)?;
            print_json(&serde_json::json!({
                "occurrence": occurrence,
                "conflicts": conflicts,
            }))?;
        }
        HabitAction::Skip { id, reason, note } => {
            let reason = SkipReason::parse(&reason)
                .ok_or_else(|| format!("unknown skip reason '{reason}'"))?;
            let occurrence = planner.skip_occurrence(&id, reason, note)?;
            print_json(&occurrence)?;
        }
    }
    Ok(())
}
