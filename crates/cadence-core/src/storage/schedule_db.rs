//! SQLite-based storage for habits, occurrences, tasks, events and
//! tracking sessions.
//!
//! Instants are stored as RFC3339 text, dates as `YYYY-MM-DD`, times-of-day
//! as `HH:MM`. Occurrence outcomes are stored in flat columns and re-checked
//! against the status invariants on every write.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json;

use super::{data_dir, migrations};
use crate::error::{CoreError, DatabaseError, Result};
use crate::schedule::{
    CalendarEvent, EntityKind, EntityRef, Habit, HabitOccurrence, OutcomeRow, ScheduleEntity,
    Task, TaskState, TimeWindow,
};
use crate::timer::{SessionLink, TrackingSession};

// === Helper Functions ===

/// Parse datetime from RFC3339 string with fallback to current time.
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_optional_datetime(dt_str: Option<String>) -> Option<DateTime<Utc>> {
    dt_str
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Strict conversion error for a malformed stored value.
fn conversion_err(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_date_strict(idx: usize, s: &str) -> std::result::Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| conversion_err(idx, e))
}

fn parse_time_strict(idx: usize, s: &str) -> std::result::Result<NaiveTime, rusqlite::Error> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| conversion_err(idx, e))
}

fn format_time(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn row_to_task(row: &rusqlite::Row) -> std::result::Result<Task, rusqlite::Error> {
    let state_str: String = row.get(5)?;
    let state = TaskState::parse(&state_str).unwrap_or_default();

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        scheduled_at: parse_optional_datetime(row.get(3)?),
        deadline: parse_optional_datetime(row.get(4)?),
        state,
        created_at: parse_datetime_fallback(&row.get::<_, String>(6)?),
        updated_at: parse_datetime_fallback(&row.get::<_, String>(7)?),
        completed_at: parse_optional_datetime(row.get(8)?),
    })
}

fn row_to_event(row: &rusqlite::Row) -> std::result::Result<CalendarEvent, rusqlite::Error> {
    Ok(CalendarEvent {
        id: row.get(0)?,
        title: row.get(1)?,
        start_time: parse_datetime_fallback(&row.get::<_, String>(2)?),
        end_time: parse_datetime_fallback(&row.get::<_, String>(3)?),
        created_at: parse_datetime_fallback(&row.get::<_, String>(4)?),
    })
}

fn row_to_habit(row: &rusqlite::Row) -> std::result::Result<Habit, rusqlite::Error> {
    let days_json: String = row.get(2)?;
    let days: Vec<u8> = serde_json::from_str(&days_json).unwrap_or_default();

    Ok(Habit {
        id: row.get(0)?,
        name: row.get(1)?,
        days,
        start_time: parse_time_strict(3, &row.get::<_, String>(3)?)?,
        end_time: parse_time_strict(4, &row.get::<_, String>(4)?)?,
        created_at: parse_datetime_fallback(&row.get::<_, String>(5)?),
    })
}

fn row_to_occurrence(
    row: &rusqlite::Row,
) -> std::result::Result<HabitOccurrence, rusqlite::Error> {
    let outcome_row = OutcomeRow {
        status: row.get(6)?,
        done_substatus: row.get(7)?,
        not_done_substatus: row.get(8)?,
        skip_reason: row.get(9)?,
        skip_note: row.get(10)?,
        completion_percentage: row.get(11)?,
    };
    let outcome = outcome_row
        .into_outcome()
        .map_err(|e| conversion_err(6, e))?;

    Ok(HabitOccurrence {
        id: row.get(0)?,
        habit_id: row.get(1)?,
        habit_name: row.get(2)?,
        date: parse_date_strict(3, &row.get::<_, String>(3)?)?,
        start_time: parse_time_strict(4, &row.get::<_, String>(4)?)?,
        end_time: parse_time_strict(5, &row.get::<_, String>(5)?)?,
        outcome,
        system_adjusted: row.get::<_, i32>(12)? != 0,
        created_at: parse_datetime_fallback(&row.get::<_, String>(13)?),
        updated_at: parse_datetime_fallback(&row.get::<_, String>(14)?),
    })
}

fn row_to_session(row: &rusqlite::Row) -> std::result::Result<TrackingSession, rusqlite::Error> {
    let occurrence_id: Option<String> = row.get(1)?;
    let task_id: Option<String> = row.get(2)?;
    let link = match (occurrence_id, task_id) {
        (Some(id), None) => SessionLink::HabitOccurrence(id),
        (None, Some(id)) => SessionLink::Task(id),
        _ => {
            return Err(conversion_err(
                1,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "session must link exactly one of occurrence/task",
                ),
            ))
        }
    };

    Ok(TrackingSession {
        id: row.get(0)?,
        link,
        started_at: parse_datetime_fallback(&row.get::<_, String>(3)?),
        ended_at: parse_optional_datetime(row.get(4)?),
        paused_total_secs: row.get(5)?,
        pause_started_at: parse_optional_datetime(row.get(6)?),
    })
}

const OCCURRENCE_COLUMNS: &str = "id, habit_id, habit_name, date, start_time, end_time,
            status, done_substatus, not_done_substatus, skip_reason, skip_note,
            completion_percentage, system_adjusted, created_at, updated_at";

const SESSION_COLUMNS: &str =
    "id, occurrence_id, task_id, started_at, ended_at, paused_total_secs, pause_started_at";

/// SQLite database for cadence.
///
/// Holds every persistent domain table; one open connection per process.
pub struct ScheduleDb {
    conn: Connection,
}

impl ScheduleDb {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/cadence/cadence.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("cadence.db");
        let conn = Connection::open(&path).map_err(|source| DatabaseError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        let db = Self { conn };
        db.migrate()
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(db)
    }

    fn migrate(&self) -> std::result::Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS habits (
                id         TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                days       TEXT NOT NULL DEFAULT '[]',
                start_time TEXT NOT NULL,
                end_time   TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS habit_occurrences (
                id                    TEXT PRIMARY KEY,
                habit_id              TEXT NOT NULL,
                habit_name            TEXT NOT NULL DEFAULT '',
                date                  TEXT NOT NULL,
                start_time            TEXT NOT NULL,
                end_time              TEXT NOT NULL,
                status                TEXT NOT NULL DEFAULT 'PENDING',
                done_substatus        TEXT,
                not_done_substatus    TEXT,
                skip_reason           TEXT,
                skip_note             TEXT,
                completion_percentage INTEGER,
                created_at            TEXT NOT NULL,
                updated_at            TEXT NOT NULL,
                UNIQUE(habit_id, date)
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id           TEXT PRIMARY KEY,
                title        TEXT NOT NULL,
                description  TEXT,
                scheduled_at TEXT,
                deadline     TEXT,
                state        TEXT NOT NULL DEFAULT 'PLANNED',
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE TABLE IF NOT EXISTS events (
                id         TEXT PRIMARY KEY,
                title      TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time   TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tracking_sessions (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                occurrence_id     TEXT,
                task_id           TEXT,
                started_at        TEXT NOT NULL,
                ended_at          TEXT,
                paused_total_secs INTEGER NOT NULL DEFAULT 0,
                pause_started_at  TEXT,
                CHECK ((occurrence_id IS NULL) != (task_id IS NULL))
            );

            CREATE INDEX IF NOT EXISTS idx_occurrences_date ON habit_occurrences(date);
            CREATE INDEX IF NOT EXISTS idx_tasks_scheduled_at ON tasks(scheduled_at);
            CREATE INDEX IF NOT EXISTS idx_events_window ON events(start_time, end_time);
            CREATE INDEX IF NOT EXISTS idx_sessions_open ON tracking_sessions(ended_at);",
        )?;

        migrations::migrate(&self.conn)?;

        Ok(())
    }

    /// Run `f` inside a single all-or-nothing transaction.
    pub fn with_transaction<T, E>(
        &self,
        f: impl FnOnce(&Self) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT;")?;
                Ok(value)
            }
            Err(err) => {
                let _ = self.conn.execute_batch("ROLLBACK;");
                Err(err)
            }
        }
    }

    // === Habit CRUD ===

    /// Create a new habit.
    pub fn create_habit(&self, habit: &Habit) -> std::result::Result<(), rusqlite::Error> {
        let days_json = serde_json::to_string(&habit.days).unwrap();
        self.conn.execute(
            "INSERT INTO habits (id, name, days, start_time, end_time, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                habit.id,
                habit.name,
                days_json,
                format_time(habit.start_time),
                format_time(habit.end_time),
                habit.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a habit by ID.
    pub fn get_habit(&self, id: &str) -> std::result::Result<Option<Habit>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, days, start_time, end_time, created_at FROM habits WHERE id = ?1",
        )?;
        stmt.query_row(params![id], row_to_habit).optional()
    }

    /// List all habits.
    pub fn list_habits(&self) -> std::result::Result<Vec<Habit>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, days, start_time, end_time, created_at
             FROM habits ORDER BY created_at ASC",
        )?;
        let habits = stmt.query_map([], row_to_habit)?;
        habits.collect()
    }

    /// Delete a habit and its occurrences.
    pub fn delete_habit(&self, id: &str) -> std::result::Result<(), rusqlite::Error> {
        self.conn.execute(
            "DELETE FROM habit_occurrences WHERE habit_id = ?1",
            params![id],
        )?;
        self.conn
            .execute("DELETE FROM habits WHERE id = ?1", params![id])?;
        Ok(())
    }

    // === HabitOccurrence CRUD ===

    /// Create an occurrence. The outcome columns are consistency-checked
    /// before the write.
    pub fn create_occurrence(&self, occurrence: &HabitOccurrence) -> Result<()> {
        let outcome = OutcomeRow::from_outcome(&occurrence.outcome);
        outcome.validate().map_err(CoreError::Validation)?;

        self.conn.execute(
            "INSERT INTO habit_occurrences (
                id, habit_id, habit_name, date, start_time, end_time,
                status, done_substatus, not_done_substatus, skip_reason, skip_note,
                completion_percentage, system_adjusted, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                occurrence.id,
                occurrence.habit_id,
                occurrence.habit_name,
                format_date(occurrence.date),
                format_time(occurrence.start_time),
                format_time(occurrence.end_time),
                outcome.status,
                outcome.done_substatus,
                outcome.not_done_substatus,
                outcome.skip_reason,
                outcome.skip_note,
                outcome.completion_percentage,
                occurrence.system_adjusted as i32,
                occurrence.created_at.to_rfc3339(),
                occurrence.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get an occurrence by ID.
    pub fn get_occurrence(
        &self,
        id: &str,
    ) -> std::result::Result<Option<HabitOccurrence>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OCCURRENCE_COLUMNS} FROM habit_occurrences WHERE id = ?1"
        ))?;
        stmt.query_row(params![id], row_to_occurrence).optional()
    }

    /// Update an occurrence. The outcome columns are consistency-checked
    /// before the write.
    pub fn update_occurrence(&self, occurrence: &HabitOccurrence) -> Result<()> {
        let outcome = OutcomeRow::from_outcome(&occurrence.outcome);
        outcome.validate().map_err(CoreError::Validation)?;

        self.conn.execute(
            "UPDATE habit_occurrences
             SET habit_name = ?1, date = ?2, start_time = ?3, end_time = ?4,
                 status = ?5, done_substatus = ?6, not_done_substatus = ?7,
                 skip_reason = ?8, skip_note = ?9, completion_percentage = ?10,
                 system_adjusted = ?11, updated_at = ?12
             WHERE id = ?13",
            params![
                occurrence.habit_name,
                format_date(occurrence.date),
                format_time(occurrence.start_time),
                format_time(occurrence.end_time),
                outcome.status,
                outcome.done_substatus,
                outcome.not_done_substatus,
                outcome.skip_reason,
                outcome.skip_note,
                outcome.completion_percentage,
                occurrence.system_adjusted as i32,
                occurrence.updated_at.to_rfc3339(),
                occurrence.id,
            ],
        )?;
        Ok(())
    }

    /// Delete an occurrence.
    pub fn delete_occurrence(&self, id: &str) -> std::result::Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM habit_occurrences WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// List occurrences on a date, optionally excluding one id.
    pub fn occurrences_on(
        &self,
        date: NaiveDate,
        exclude: Option<&str>,
    ) -> std::result::Result<Vec<HabitOccurrence>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OCCURRENCE_COLUMNS} FROM habit_occurrences
             WHERE date = ?1 AND id != ?2
             ORDER BY start_time ASC"
        ))?;
        let rows = stmt.query_map(
            params![format_date(date), exclude.unwrap_or("")],
            row_to_occurrence,
        )?;
        rows.collect()
    }

    /// Whether an occurrence already exists for (habit, date).
    pub fn occurrence_exists(
        &self,
        habit_id: &str,
        date: NaiveDate,
    ) -> std::result::Result<bool, rusqlite::Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM habit_occurrences WHERE habit_id = ?1 AND date = ?2",
            params![habit_id, format_date(date)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // === Task CRUD ===

    /// Create a new task.
    pub fn create_task(&self, task: &Task) -> std::result::Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO tasks (id, title, description, scheduled_at, deadline, state,
                                created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                task.id,
                task.title,
                task.description,
                task.scheduled_at.map(|dt| dt.to_rfc3339()),
                task.deadline.map(|dt| dt.to_rfc3339()),
                task.state.as_str(),
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
                task.completed_at.map(|dt| dt.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Get a task by ID.
    pub fn get_task(&self, id: &str) -> std::result::Result<Option<Task>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, description, scheduled_at, deadline, state,
                    created_at, updated_at, completed_at
             FROM tasks WHERE id = ?1",
        )?;
        stmt.query_row(params![id], row_to_task).optional()
    }

    /// List all tasks.
    pub fn list_tasks(&self) -> std::result::Result<Vec<Task>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, description, scheduled_at, deadline, state,
                    created_at, updated_at, completed_at
             FROM tasks ORDER BY created_at ASC",
        )?;
        let tasks = stmt.query_map([], row_to_task)?;
        tasks.collect()
    }

    /// Update an existing task.
    pub fn update_task(&self, task: &Task) -> std::result::Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE tasks
             SET title = ?1, description = ?2, scheduled_at = ?3, deadline = ?4,
                 state = ?5, updated_at = ?6, completed_at = ?7
             WHERE id = ?8",
            params![
                task.title,
                task.description,
                task.scheduled_at.map(|dt| dt.to_rfc3339()),
                task.deadline.map(|dt| dt.to_rfc3339()),
                task.state.as_str(),
                task.updated_at.to_rfc3339(),
                task.completed_at.map(|dt| dt.to_rfc3339()),
                task.id,
            ],
        )?;
        Ok(())
    }

    /// Delete a task.
    pub fn delete_task(&self, id: &str) -> std::result::Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Tasks whose scheduled instant falls within `[start, end)`,
    /// optionally excluding one id. Unscheduled tasks never match.
    pub fn tasks_scheduled_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<&str>,
    ) -> std::result::Result<Vec<Task>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, description, scheduled_at, deadline, state,
                    created_at, updated_at, completed_at
             FROM tasks
             WHERE scheduled_at IS NOT NULL
               AND scheduled_at >= ?1 AND scheduled_at < ?2
               AND id != ?3
             ORDER BY scheduled_at ASC",
        )?;
        let rows = stmt.query_map(
            params![start.to_rfc3339(), end.to_rfc3339(), exclude.unwrap_or("")],
            row_to_task,
        )?;
        rows.collect()
    }

    // === CalendarEvent CRUD ===

    /// Create a new event.
    pub fn create_event(&self, event: &CalendarEvent) -> std::result::Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO events (id, title, start_time, end_time, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.id,
                event.title,
                event.start_time.to_rfc3339(),
                event.end_time.to_rfc3339(),
                event.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get an event by ID.
    pub fn get_event(
        &self,
        id: &str,
    ) -> std::result::Result<Option<CalendarEvent>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, start_time, end_time, created_at FROM events WHERE id = ?1",
        )?;
        stmt.query_row(params![id], row_to_event).optional()
    }

    /// List all events.
    pub fn list_events(&self) -> std::result::Result<Vec<CalendarEvent>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, start_time, end_time, created_at
             FROM events ORDER BY start_time ASC",
        )?;
        let events = stmt.query_map([], row_to_event)?;
        events.collect()
    }

    /// Update an event.
    pub fn update_event(&self, event: &CalendarEvent) -> std::result::Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE events SET title = ?1, start_time = ?2, end_time = ?3 WHERE id = ?4",
            params![
                event.title,
                event.start_time.to_rfc3339(),
                event.end_time.to_rfc3339(),
                event.id,
            ],
        )?;
        Ok(())
    }

    /// Delete an event.
    pub fn delete_event(&self, id: &str) -> std::result::Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM events WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Events intersecting `[start, end)`, optionally excluding one id.
    pub fn events_overlapping(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<&str>,
    ) -> std::result::Result<Vec<CalendarEvent>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, start_time, end_time, created_at
             FROM events
             WHERE start_time < ?2 AND end_time > ?1 AND id != ?3
             ORDER BY start_time ASC",
        )?;
        let rows = stmt.query_map(
            params![start.to_rfc3339(), end.to_rfc3339(), exclude.unwrap_or("")],
            row_to_event,
        )?;
        rows.collect()
    }

    // === Entity dispatch ===

    /// Resolve an entity reference into a [`ScheduleEntity`].
    pub fn fetch_entity(
        &self,
        entity: &EntityRef,
    ) -> std::result::Result<Option<ScheduleEntity>, rusqlite::Error> {
        Ok(match entity.kind {
            EntityKind::Task => self.get_task(&entity.id)?.map(ScheduleEntity::Task),
            EntityKind::HabitOccurrence => self
                .get_occurrence(&entity.id)?
                .map(ScheduleEntity::HabitOccurrence),
            EntityKind::Event => self.get_event(&entity.id)?.map(ScheduleEntity::Event),
        })
    }

    /// Overwrite an entity's window following its kind's native
    /// representation (see [`ScheduleEntity::apply_window`]). For
    /// occurrences only the times-of-day move (the date is fixed) and
    /// `system_adjusted` records whether the write came from an accepted
    /// reordering.
    ///
    /// Returns false when the entity no longer exists.
    pub fn set_entity_window(
        &self,
        entity_ref: &EntityRef,
        window: &TimeWindow,
        system_adjusted: bool,
    ) -> Result<bool> {
        let Some(mut entity) = self.fetch_entity(entity_ref)? else {
            return Ok(false);
        };
        entity.apply_window(window);

        let now = Utc::now();
        match &mut entity {
            ScheduleEntity::Task(task) => {
                task.updated_at = now;
                self.update_task(task)?;
            }
            ScheduleEntity::HabitOccurrence(occurrence) => {
                occurrence.system_adjusted = system_adjusted;
                occurrence.updated_at = now;
                self.update_occurrence(occurrence)?;
            }
            ScheduleEntity::Event(event) => {
                self.update_event(event)?;
            }
        }
        Ok(true)
    }

    // === Tracking sessions ===

    /// Insert a new active session for a link.
    pub fn insert_session(
        &self,
        link: &SessionLink,
        started_at: DateTime<Utc>,
    ) -> std::result::Result<TrackingSession, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO tracking_sessions (occurrence_id, task_id, started_at)
             VALUES (?1, ?2, ?3)",
            params![
                link.occurrence_id(),
                link.task_id(),
                started_at.to_rfc3339(),
            ],
        )?;
        Ok(TrackingSession {
            id: self.conn.last_insert_rowid(),
            link: link.clone(),
            started_at,
            ended_at: None,
            paused_total_secs: 0,
            pause_started_at: None,
        })
    }

    /// Get a session by ID.
    pub fn get_session(
        &self,
        id: i64,
    ) -> std::result::Result<Option<TrackingSession>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM tracking_sessions WHERE id = ?1"
        ))?;
        stmt.query_row(params![id], row_to_session).optional()
    }

    /// Persist a session's mutable fields.
    pub fn update_session(
        &self,
        session: &TrackingSession,
    ) -> std::result::Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE tracking_sessions
             SET ended_at = ?1, paused_total_secs = ?2, pause_started_at = ?3
             WHERE id = ?4",
            params![
                session.ended_at.map(|dt| dt.to_rfc3339()),
                session.paused_total_secs,
                session.pause_started_at.map(|dt| dt.to_rfc3339()),
                session.id,
            ],
        )?;
        Ok(())
    }

    /// Delete a session. Returns false when it did not exist.
    pub fn delete_session(&self, id: i64) -> std::result::Result<bool, rusqlite::Error> {
        let changed = self
            .conn
            .execute("DELETE FROM tracking_sessions WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// The active (un-ended) session for a link, if any.
    pub fn active_session_for(
        &self,
        link: &SessionLink,
    ) -> std::result::Result<Option<TrackingSession>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM tracking_sessions
             WHERE ended_at IS NULL
               AND ((occurrence_id IS NOT NULL AND occurrence_id = ?1)
                 OR (task_id IS NOT NULL AND task_id = ?2))
             LIMIT 1"
        ))?;
        stmt.query_row(
            params![link.occurrence_id(), link.task_id()],
            row_to_session,
        )
        .optional()
    }

    /// Any active session, regardless of link.
    pub fn any_active_session(
        &self,
    ) -> std::result::Result<Option<TrackingSession>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM tracking_sessions
             WHERE ended_at IS NULL
             ORDER BY started_at DESC LIMIT 1"
        ))?;
        stmt.query_row([], row_to_session).optional()
    }
}
