use crate::domain::models::{SessionHistoryEntry, SessionOrigin, SessionOutcome, SessionType};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

pub trait SessionHistoryRepository: Send + Sync {
    fn record(&self, entry: &SessionHistoryEntry) -> Result<(), InfraError>;
    fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SessionHistoryEntry>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteSessionHistoryRepository {
    db_path: PathBuf,
}

impl SqliteSessionHistoryRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

type HistoryRow = (String, String, String, u32, String, String, String);

fn entry_from_row(row: HistoryRow) -> Result<SessionHistoryEntry, InfraError> {
    let (session_id, session_type, origin, duration_minutes, started_at, ended_at, outcome) = row;
    Ok(SessionHistoryEntry {
        session_type: SessionType::parse(&session_type).ok_or_else(|| {
            InfraError::InvalidConfig(format!("invalid session_history.session_type '{session_type}'"))
        })?,
        origin: SessionOrigin::parse(&origin).ok_or_else(|| {
            InfraError::InvalidConfig(format!("invalid session_history.origin '{origin}'"))
        })?,
        outcome: SessionOutcome::parse(&outcome).ok_or_else(|| {
            InfraError::InvalidConfig(format!("invalid session_history.outcome '{outcome}'"))
        })?,
        started_at: parse_timestamp(&started_at, "started_at")?,
        ended_at: parse_timestamp(&ended_at, "ended_at")?,
        duration_minutes,
        session_id,
    })
}

fn parse_timestamp(raw: &str, field: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| {
            InfraError::InvalidConfig(format!("invalid session_history.{field} '{raw}': {error}"))
        })
}

impl SessionHistoryRepository for SqliteSessionHistoryRepository {
    fn record(&self, entry: &SessionHistoryEntry) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO session_history
               (session_id, session_type, origin, duration_minutes, started_at, ended_at, outcome)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(session_id) DO UPDATE SET
               ended_at = excluded.ended_at,
               outcome = excluded.outcome",
            params![
                entry.session_id,
                entry.session_type.as_str(),
                entry.origin.as_str(),
                entry.duration_minutes,
                entry.started_at.to_rfc3339(),
                entry.ended_at.to_rfc3339(),
                entry.outcome.as_str(),
            ],
        )?;
        Ok(())
    }

    fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SessionHistoryEntry>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT session_id, session_type, origin, duration_minutes, started_at, ended_at, outcome
             FROM session_history
             ORDER BY started_at ASC",
        )?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<Result<Vec<HistoryRow>, _>>()?;

        // Filtered after parsing: stored offsets may differ from UTC.
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let entry = entry_from_row(row)?;
            if entry.started_at >= start && entry.started_at <= end {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionHistoryRepository {
    entries: Mutex<Vec<SessionHistoryEntry>>,
}

impl SessionHistoryRepository for InMemorySessionHistoryRepository {
    fn record(&self, entry: &SessionHistoryEntry) -> Result<(), InfraError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("session history lock poisoned: {error}")))?;
        entries.retain(|existing| existing.session_id != entry.session_id);
        entries.push(entry.clone());
        Ok(())
    }

    fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SessionHistoryEntry>, InfraError> {
        let entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("session history lock poisoned: {error}")))?;
        let mut selected = entries
            .iter()
            .filter(|entry| entry.started_at >= start && entry.started_at <= end)
            .cloned()
            .collect::<Vec<_>>();
        selected.sort_by_key(|entry| entry.started_at);
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_DB: AtomicUsize = AtomicUsize::new(0);

    struct TempDatabase {
        dir: PathBuf,
        path: PathBuf,
    }

    impl TempDatabase {
        fn new() -> Self {
            let sequence = NEXT_DB.fetch_add(1, Ordering::Relaxed);
            let dir = std::env::temp_dir().join(format!(
                "focusroom-history-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&dir).expect("create temp dir");
            let path = dir.join("history.sqlite");
            initialize_database(&path).expect("initialize database");
            Self { dir, path }
        }
    }

    impl Drop for TempDatabase {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn entry(id: &str, started_at: &str, outcome: SessionOutcome) -> SessionHistoryEntry {
        let started_at = fixed_time(started_at);
        SessionHistoryEntry {
            session_id: id.to_string(),
            session_type: SessionType::Focus,
            origin: if id.starts_with("local-") {
                SessionOrigin::Local
            } else {
                SessionOrigin::Remote
            },
            duration_minutes: 25,
            started_at,
            ended_at: started_at + Duration::minutes(25),
            outcome,
        }
    }

    fn exercise(repository: &dyn SessionHistoryRepository) {
        repository
            .record(&entry("sess-1", "2026-02-16T09:00:00Z", SessionOutcome::Completed))
            .expect("record first");
        repository
            .record(&entry("local-1771232400000", "2026-02-16T10:00:00Z", SessionOutcome::Stopped))
            .expect("record second");
        repository
            .record(&entry("sess-3", "2026-02-18T09:00:00Z", SessionOutcome::Completed))
            .expect("record third");

        let listed = repository
            .list_between(
                fixed_time("2026-02-16T00:00:00Z"),
                fixed_time("2026-02-17T00:00:00Z"),
            )
            .expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].session_id, "sess-1");
        assert_eq!(listed[1].origin, SessionOrigin::Local);
        assert_eq!(listed[1].outcome, SessionOutcome::Stopped);
    }

    #[test]
    fn sqlite_repository_records_and_filters_by_window() {
        let database = TempDatabase::new();
        let repository = SqliteSessionHistoryRepository::new(&database.path);
        exercise(&repository);
    }

    #[test]
    fn in_memory_repository_records_and_filters_by_window() {
        let repository = InMemorySessionHistoryRepository::default();
        exercise(&repository);
    }

    #[test]
    fn recording_same_session_twice_keeps_latest_outcome() {
        let database = TempDatabase::new();
        let repository = SqliteSessionHistoryRepository::new(&database.path);
        repository
            .record(&entry("sess-9", "2026-02-16T09:00:00Z", SessionOutcome::Stopped))
            .expect("record stopped");
        repository
            .record(&entry("sess-9", "2026-02-16T09:00:00Z", SessionOutcome::Completed))
            .expect("record completed");
        let listed = repository
            .list_between(
                fixed_time("2026-02-16T00:00:00Z"),
                fixed_time("2026-02-17T00:00:00Z"),
            )
            .expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].outcome, SessionOutcome::Completed);
    }
}
