use clap::{Subcommand, ValueEnum};

use cadence_core::{EntityKind, EntityRef, Planner, ScheduleDb};

use super::{parse_date_or_today, print_json, CliResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Task,
    HabitOccurrence,
    Event,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Task => EntityKind::Task,
            KindArg::HabitOccurrence => EntityKind::HabitOccurrence,
            KindArg::Event => EntityKind::Event,
        }
    }
}

#[derive(Subcommand)]
pub enum ConflictsAction {
    /// All distinct conflicts on a calendar day
    Day {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Conflicts involving one entity
    Check {
        /// Entity kind
        kind: KindArg,
        /// Entity ID
        id: String,
    },
    /// Propose a reordering for a day's conflicts; writes only with --apply
    Reorder {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Apply the proposal after printing it
        #[arg(long)]
        apply: bool,
    },
}

pub fn run(action: ConflictsAction) -> CliResult {
    let db = ScheduleDb::open()?;
    let planner = Planner::new(&db);

    match action {
        ConflictsAction::Day { date } => {
            let date = parse_date_or_today(date.as_deref())?;
            print_json(&planner.conflicts_for_day(date)?)?;
        }
        ConflictsAction::Check { kind, id } => {
            let target = EntityRef::new(id, kind.into());
            print_json(&planner.detect_conflicts(&target)?)?;
        }
        ConflictsAction::Reorder { date, apply } => {
            let date = parse_date_or_today(date.as_deref())?;
            let conflicts = planner.conflicts_for_day(date)?;
            let proposal = planner.build_reordering_proposal(&conflicts)?;
            print_json(&proposal)?;
            if apply {
                let applied = planner.apply_reordering(&proposal)?;
                println!("{{\"applied\": {applied}}}");
            }
        }
    }
    Ok(())
}
