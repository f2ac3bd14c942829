//! # Reminder Store
//!
//! Durable repository of reminders on a single sqlite connection.
//! Every owner-facing query is filtered by owner; status changes go through
//! compare-and-set so racing timer firings and cancel requests resolve to
//! whichever write lands first.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 2.0.0: Compare-and-set transitions, recurring reminders, history queries
//! - 1.0.0: Initial reminders table with add/list/delete

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use sqlite::{Connection, State, Statement, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::error::{ReminderError, ReminderResult};
use crate::features::reminders::model::{NewReminder, Reminder, ReminderId, ReminderStatus};

/// Schema version written by this build
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS reminders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        payload TEXT NOT NULL,
        due_at TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        recurrence_interval INTEGER,
        last_fired_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_reminders_owner_status_due
        ON reminders (owner, status, due_at);
    CREATE INDEX IF NOT EXISTS idx_reminders_status_due
        ON reminders (status, due_at);
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL,
        applied_at TEXT NOT NULL
    );
";

const COLUMNS: &str =
    "id, owner, payload, due_at, status, recurrence_interval, last_fired_at, created_at";

/// Expected and new `last_fired_at` for a recurring firing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredAt {
    /// Value the row must still hold
    pub previous: Option<DateTime<Utc>>,
    /// Value to write
    pub next: DateTime<Utc>,
}

/// A compare-and-set status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub expected: ReminderStatus,
    pub new_status: ReminderStatus,
    pub fired_at: Option<FiredAt>,
}

impl StatusChange {
    pub fn to(expected: ReminderStatus, new_status: ReminderStatus) -> Self {
        StatusChange {
            expected,
            new_status,
            fired_at: None,
        }
    }

    pub fn with_fired_at(mut self, previous: Option<DateTime<Utc>>, next: DateTime<Utc>) -> Self {
        self.fired_at = Some(FiredAt { previous, next });
        self
    }
}

/// Format a timestamp the way it is stored (UTC, millisecond precision,
/// lexicographically ordered)
fn to_db_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn from_db_time(id: ReminderId, raw: &str) -> ReminderResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ReminderError::CorruptRow {
            id,
            reason: format!("bad timestamp {raw:?}: {e}"),
        })
}

fn optional_text(value: &Option<DateTime<Utc>>) -> Value {
    match value {
        Some(dt) => Value::String(to_db_time(dt)),
        None => Value::Null,
    }
}

#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the store at `path`
    pub async fn new(path: &str) -> ReminderResult<Self> {
        let connection = sqlite::open(path)?;
        let database = Self::from_connection(connection)?;
        info!("Reminder store opened at {path}");
        Ok(database)
    }

    /// Throwaway store, used by tests and dry runs
    pub fn in_memory() -> ReminderResult<Self> {
        Self::from_connection(sqlite::open(":memory:")?)
    }

    fn from_connection(connection: Connection) -> ReminderResult<Self> {
        connection.execute("PRAGMA journal_mode = WAL;")?;
        connection.execute(SCHEMA)?;
        Self::ensure_schema_version(&connection)?;
        Ok(Database {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn ensure_schema_version(connection: &Connection) -> ReminderResult<()> {
        let mut statement = connection.prepare("SELECT MAX(version) FROM schema_version")?;
        let current = match statement.next()? {
            State::Row => match statement.read::<Value, _>(0)? {
                Value::Integer(v) => Some(v),
                _ => None,
            },
            State::Done => None,
        };
        drop(statement);

        if current.map_or(true, |v| v < SCHEMA_VERSION) {
            let mut insert = connection
                .prepare("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")?;
            insert.bind((1, SCHEMA_VERSION))?;
            insert.bind((2, to_db_time(&Utc::now()).as_str()))?;
            insert.next()?;
            info!("Reminder schema at version {SCHEMA_VERSION}");
        }
        Ok(())
    }

    /// Current schema version recorded in the store
    pub async fn schema_version(&self) -> ReminderResult<Option<i64>> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare("SELECT MAX(version) FROM schema_version")?;
        if let State::Row = statement.next()? {
            if let Value::Integer(v) = statement.read::<Value, _>(0)? {
                return Ok(Some(v));
            }
        }
        Ok(None)
    }

    /// Persist a new pending reminder and return it as stored
    pub async fn create(&self, new: &NewReminder, created_at: DateTime<Utc>) -> ReminderResult<Reminder> {
        new.validate()?;
        let connection = self.connection.lock().await;

        let created = to_db_time(&created_at);
        let mut insert = connection.prepare(
            "INSERT INTO reminders
                (owner, payload, due_at, status, recurrence_interval, last_fired_at, created_at, updated_at)
             VALUES (?, ?, ?, 'pending', ?, NULL, ?, ?)",
        )?;
        insert.bind((1, new.owner.as_str()))?;
        insert.bind((2, new.payload.as_str()))?;
        insert.bind((3, to_db_time(&new.due_at).as_str()))?;
        insert.bind((
            4,
            match new.recurrence_interval {
                Some(minutes) => Value::Integer(i64::from(minutes)),
                None => Value::Null,
            },
        ))?;
        insert.bind((5, created.as_str()))?;
        insert.bind((6, created.as_str()))?;
        insert.next()?;
        drop(insert);

        let mut rowid = connection.prepare("SELECT last_insert_rowid()")?;
        rowid.next()?;
        let id = ReminderId(rowid.read::<i64, _>(0)?);
        drop(rowid);

        let reminder = Self::select_by_id(&connection, id)?.ok_or(ReminderError::NotFound(id))?;
        info!(
            "Created reminder {} for owner {} due {}{}",
            id,
            reminder.owner,
            to_db_time(&reminder.due_at),
            reminder
                .recurrence_interval
                .map(|m| format!(" (every {m}min)"))
                .unwrap_or_default()
        );
        Ok(reminder)
    }

    /// Fetch one reminder within an owner's scope
    pub async fn get(&self, owner: &str, id: ReminderId) -> ReminderResult<Reminder> {
        let connection = self.connection.lock().await;
        match Self::select_by_id(&connection, id)? {
            Some(reminder) if reminder.owner == owner => Ok(reminder),
            _ => Err(ReminderError::NotFound(id)),
        }
    }

    /// Fetch one reminder regardless of owner (scheduler use only)
    pub async fn get_unscoped(&self, id: ReminderId) -> ReminderResult<Reminder> {
        let connection = self.connection.lock().await;
        Self::select_by_id(&connection, id)?.ok_or(ReminderError::NotFound(id))
    }

    /// Pending reminders of one owner, soonest first
    pub async fn list_pending(&self, owner: &str) -> ReminderResult<Vec<Reminder>> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(format!(
            "SELECT {COLUMNS} FROM reminders
             WHERE owner = ? AND status = 'pending'
             ORDER BY due_at ASC, id ASC"
        ))?;
        statement.bind((1, owner))?;
        Self::collect(&mut statement)
    }

    /// Pending reminders of one owner due in `[from, to)`, soonest first
    pub async fn list_pending_between(
        &self,
        owner: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ReminderResult<Vec<Reminder>> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(format!(
            "SELECT {COLUMNS} FROM reminders
             WHERE owner = ? AND status = 'pending' AND due_at >= ? AND due_at < ?
             ORDER BY due_at ASC, id ASC"
        ))?;
        statement.bind((1, owner))?;
        statement.bind((2, to_db_time(&from).as_str()))?;
        statement.bind((3, to_db_time(&to).as_str()))?;
        Self::collect(&mut statement)
    }

    /// Terminal reminders of one owner, most recent first
    pub async fn list_history(&self, owner: &str, limit: usize) -> ReminderResult<Vec<Reminder>> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(format!(
            "SELECT {COLUMNS} FROM reminders
             WHERE owner = ? AND status != 'pending'
             ORDER BY due_at DESC, id DESC
             LIMIT ?"
        ))?;
        statement.bind((1, owner))?;
        statement.bind((2, i64::try_from(limit).unwrap_or(i64::MAX)))?;
        Self::collect(&mut statement)
    }

    /// Every pending recurring reminder across owners, for startup recovery
    pub async fn list_all_recurring_pending(&self) -> ReminderResult<Vec<Reminder>> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(format!(
            "SELECT {COLUMNS} FROM reminders
             WHERE status = 'pending' AND recurrence_interval IS NOT NULL
             ORDER BY due_at ASC, id ASC"
        ))?;
        Self::collect(&mut statement)
    }

    /// Every pending reminder across owners, for startup recovery
    pub async fn list_all_pending(&self) -> ReminderResult<Vec<Reminder>> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(format!(
            "SELECT {COLUMNS} FROM reminders
             WHERE status = 'pending'
             ORDER BY due_at ASC, id ASC"
        ))?;
        Self::collect(&mut statement)
    }

    /// Compare-and-set status change.
    ///
    /// Fails with `Conflict` when the stored status is not `change.expected`,
    /// and with `OccurrenceConflict` when a firing's expected `last_fired_at`
    /// no longer matches. The check and the write happen under one lock.
    pub async fn transition(&self, id: ReminderId, change: StatusChange) -> ReminderResult<Reminder> {
        let connection = self.connection.lock().await;
        let current = Self::select_by_id(&connection, id)?.ok_or(ReminderError::NotFound(id))?;

        if current.status != change.expected {
            debug!(
                "Reminder {id} transition to {} rejected: status is {}",
                change.new_status, current.status
            );
            return Err(ReminderError::Conflict {
                id,
                expected: change.expected,
                actual: current.status,
            });
        }

        let last_fired_at = match change.fired_at {
            Some(fired) => {
                if current.last_fired_at != fired.previous {
                    return Err(ReminderError::OccurrenceConflict { id });
                }
                if fired.next < current.due_at || fired.previous.is_some_and(|p| fired.next < p) {
                    return Err(ReminderError::validation(
                        "last_fired_at",
                        "firing instants must not move backwards",
                    ));
                }
                Some(fired.next)
            }
            None => current.last_fired_at,
        };

        let mut update = connection.prepare(
            "UPDATE reminders
             SET status = ?, last_fired_at = ?, updated_at = ?
             WHERE id = ? AND status = ?",
        )?;
        update.bind((1, change.new_status.as_str()))?;
        update.bind((2, optional_text(&last_fired_at)))?;
        update.bind((3, to_db_time(&Utc::now()).as_str()))?;
        update.bind((4, id.0))?;
        update.bind((5, change.expected.as_str()))?;
        update.next()?;
        drop(update);

        debug!(
            "Reminder {id}: {} -> {}",
            change.expected, change.new_status
        );
        Self::select_by_id(&connection, id)?.ok_or(ReminderError::NotFound(id))
    }

    fn select_by_id(connection: &Connection, id: ReminderId) -> ReminderResult<Option<Reminder>> {
        let mut statement =
            connection.prepare(format!("SELECT {COLUMNS} FROM reminders WHERE id = ?"))?;
        statement.bind((1, id.0))?;
        match statement.next()? {
            State::Row => Ok(Some(Self::read_row(&statement)?)),
            State::Done => Ok(None),
        }
    }

    fn collect(statement: &mut Statement<'_>) -> ReminderResult<Vec<Reminder>> {
        let mut reminders = Vec::new();
        while let State::Row = statement.next()? {
            reminders.push(Self::read_row(statement)?);
        }
        Ok(reminders)
    }

    fn read_row(statement: &Statement<'_>) -> ReminderResult<Reminder> {
        let id = ReminderId(statement.read::<i64, _>(0)?);
        let status_raw = statement.read::<String, _>(4)?;
        let status = status_raw
            .parse::<ReminderStatus>()
            .map_err(|e| ReminderError::CorruptRow {
                id,
                reason: e.to_string(),
            })?;

        let recurrence_interval = match statement.read::<Value, _>(5)? {
            Value::Integer(minutes) => Some(u32::try_from(minutes).map_err(|_| {
                ReminderError::CorruptRow {
                    id,
                    reason: format!("bad recurrence interval {minutes}"),
                }
            })?),
            _ => None,
        };

        let last_fired_at = match statement.read::<Value, _>(6)? {
            Value::String(raw) => Some(from_db_time(id, &raw)?),
            _ => None,
        };

        Ok(Reminder {
            id,
            owner: statement.read::<String, _>(1)?,
            payload: statement.read::<String, _>(2)?,
            due_at: from_db_time(id, &statement.read::<String, _>(3)?)?,
            status,
            recurrence_interval,
            last_fired_at,
            created_at: from_db_time(id, &statement.read::<String, _>(7)?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, h, m, 0).unwrap()
    }

    async fn seed(db: &Database, owner: &str, due: DateTime<Utc>, interval: Option<u32>) -> Reminder {
        let new = NewReminder::new(owner, format!("task at {due}"), due, interval).unwrap();
        db.create(&new, at(8, 0)).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_scoped_by_owner() {
        let db = Database::in_memory().unwrap();
        let created = seed(&db, "alice", at(10, 0), None).await;

        assert_eq!(created.status, ReminderStatus::Pending);
        assert_eq!(created.due_at, at(10, 0));
        assert_eq!(created.last_fired_at, None);

        let fetched = db.get("alice", created.id).await.unwrap();
        assert_eq!(fetched, created);

        assert!(matches!(
            db.get("bob", created.id).await,
            Err(ReminderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_interval() {
        let db = Database::in_memory().unwrap();
        let new = NewReminder {
            owner: "alice".to_string(),
            payload: "x".to_string(),
            due_at: at(10, 0),
            recurrence_interval: Some(90),
        };
        assert!(matches!(
            db.create(&new, at(8, 0)).await,
            Err(ReminderError::Validation { .. })
        ));
        assert!(db.list_all_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_pending_ordered_and_scoped() {
        let db = Database::in_memory().unwrap();
        let late = seed(&db, "alice", at(18, 0), None).await;
        let early = seed(&db, "alice", at(9, 30), None).await;
        seed(&db, "bob", at(7, 0), None).await;

        let ids: Vec<_> = db
            .list_pending("alice")
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![early.id, late.id]);
    }

    #[tokio::test]
    async fn test_recovery_queries_span_owners() {
        let db = Database::in_memory().unwrap();
        seed(&db, "alice", at(9, 0), Some(5)).await;
        seed(&db, "bob", at(8, 0), Some(10)).await;
        seed(&db, "bob", at(11, 0), None).await;

        let recurring = db.list_all_recurring_pending().await.unwrap();
        assert_eq!(recurring.len(), 2);
        assert_eq!(recurring[0].owner, "bob");
        let all = db.list_all_pending().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all.iter().filter(|r| !r.is_recurring()).count(), 1);
        assert_eq!(all[0].due_at, at(8, 0));
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let db = Database::in_memory().unwrap();
        let r = seed(&db, "alice", at(10, 0), None).await;

        let cancelled = db
            .transition(r.id, StatusChange::to(ReminderStatus::Pending, ReminderStatus::Cancelled))
            .await
            .unwrap();
        assert_eq!(cancelled.status, ReminderStatus::Cancelled);

        let lost = db
            .transition(r.id, StatusChange::to(ReminderStatus::Pending, ReminderStatus::Delivered))
            .await;
        assert!(matches!(
            lost,
            Err(ReminderError::Conflict {
                actual: ReminderStatus::Cancelled,
                ..
            })
        ));
        assert_eq!(
            db.get("alice", r.id).await.unwrap().status,
            ReminderStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_firing_guards_last_fired_at() {
        let db = Database::in_memory().unwrap();
        let r = seed(&db, "alice", at(10, 0), Some(5)).await;
        let fire = StatusChange::to(ReminderStatus::Pending, ReminderStatus::Pending);

        let first = db
            .transition(r.id, fire.with_fired_at(None, at(10, 0)))
            .await
            .unwrap();
        assert_eq!(first.last_fired_at, Some(at(10, 0)));
        assert_eq!(first.status, ReminderStatus::Pending);

        // A second writer that still believes nothing fired loses
        assert!(matches!(
            db.transition(r.id, fire.with_fired_at(None, at(10, 1))).await,
            Err(ReminderError::OccurrenceConflict { .. })
        ));

        // Going backwards is refused
        assert!(db
            .transition(r.id, fire.with_fired_at(Some(at(10, 0)), at(9, 59)))
            .await
            .is_err());

        let second = db
            .transition(r.id, fire.with_fired_at(Some(at(10, 0)), at(10, 5)))
            .await
            .unwrap();
        assert_eq!(second.last_fired_at, Some(at(10, 5)));
    }

    #[tokio::test]
    async fn test_history_and_day_range() {
        let db = Database::in_memory().unwrap();
        let a = seed(&db, "alice", at(9, 0), None).await;
        let b = seed(&db, "alice", at(12, 0), None).await;
        let tomorrow = seed(&db, "alice", at(9, 0) + Duration::days(1), None).await;

        db.transition(a.id, StatusChange::to(ReminderStatus::Pending, ReminderStatus::Delivered))
            .await
            .unwrap();

        let today = db
            .list_pending_between("alice", at(0, 0), at(0, 0) + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(today.iter().map(|r| r.id).collect::<Vec<_>>(), vec![b.id]);

        let history = db.list_history("alice", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, a.id);
        assert_eq!(history[0].status, ReminderStatus::Delivered);
        assert!(db.list_pending("alice").await.unwrap().iter().any(|r| r.id == tomorrow.id));
    }

    #[tokio::test]
    async fn test_schema_version_recorded() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.schema_version().await.unwrap(), Some(SCHEMA_VERSION));
    }
}
