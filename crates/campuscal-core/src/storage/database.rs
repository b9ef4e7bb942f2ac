//! SQLite-backed local cache.
//!
//! Provides persistent storage for:
//! - Remote catalog tables (organizations, channels, subscriptions)
//! - Calendar events, including legacy month-only rows
//! - Key-value store for application state (sync state, credentials)
//!
//! Every table is keyed by remote id and written with upsert ("replace on
//! conflict") semantics. Readers can watch a table's revision counter and
//! re-read when it moves.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Statement};
use tokio::sync::watch;

use super::{data_dir, migrations};
use crate::calendar::{EventRecord, EventSchedule};
use crate::error::{CoreError, DatabaseError};
use crate::remote::{Channel, Organization, Subscription};

/// Cache tables that readers can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTable {
    Organizations,
    Channels,
    Subscriptions,
    Events,
}

impl CacheTable {
    pub const ALL: [CacheTable; 4] = [
        CacheTable::Organizations,
        CacheTable::Channels,
        CacheTable::Subscriptions,
        CacheTable::Events,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CacheTable::Organizations => "organizations",
            CacheTable::Channels => "channels",
            CacheTable::Subscriptions => "subscriptions",
            CacheTable::Events => "events",
        }
    }

    fn index(self) -> usize {
        match self {
            CacheTable::Organizations => 0,
            CacheTable::Channels => 1,
            CacheTable::Subscriptions => 2,
            CacheTable::Events => 3,
        }
    }
}

/// A type stored in one of the cache tables.
pub trait CacheRow: Sized {
    const TABLE: CacheTable;
    /// `INSERT OR REPLACE` statement for one row.
    const UPSERT: &'static str;
    const SELECT_ALL: &'static str;
    const DELETE_BY_ID: &'static str;

    fn id(&self) -> &str;
    fn bind_upsert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

fn conversion_error(
    col: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, Type::Text, err.into())
}

fn parse_timestamp(col: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(col, e))
}

fn parse_date(col: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    raw.map(|s| s.parse::<NaiveDate>().map_err(|e| conversion_error(col, e)))
        .transpose()
}

impl CacheRow for Organization {
    const TABLE: CacheTable = CacheTable::Organizations;
    const UPSERT: &'static str = "INSERT OR REPLACE INTO organizations (id, name, description, logo_url)
         VALUES (?1, ?2, ?3, ?4)";
    const SELECT_ALL: &'static str =
        "SELECT id, name, description, logo_url FROM organizations ORDER BY id";
    const DELETE_BY_ID: &'static str = "DELETE FROM organizations WHERE id = ?1";

    fn id(&self) -> &str {
        &self.id
    }

    fn bind_upsert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![self.id, self.name, self.description, self.logo_url])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Organization {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            logo_url: row.get(3)?,
        })
    }
}

impl CacheRow for Channel {
    const TABLE: CacheTable = CacheTable::Channels;
    const UPSERT: &'static str = "INSERT OR REPLACE INTO channels (id, organization_id, name, description)
         VALUES (?1, ?2, ?3, ?4)";
    const SELECT_ALL: &'static str =
        "SELECT id, organization_id, name, description FROM channels ORDER BY id";
    const DELETE_BY_ID: &'static str = "DELETE FROM channels WHERE id = ?1";

    fn id(&self) -> &str {
        &self.id
    }

    fn bind_upsert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![
            self.id,
            self.organization_id,
            self.name,
            self.description
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Channel {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
        })
    }
}

impl CacheRow for Subscription {
    const TABLE: CacheTable = CacheTable::Subscriptions;
    const UPSERT: &'static str = "INSERT OR REPLACE INTO subscriptions (id, user_id, channel_id, created_at)
         VALUES (?1, ?2, ?3, ?4)";
    const SELECT_ALL: &'static str =
        "SELECT id, user_id, channel_id, created_at FROM subscriptions ORDER BY id";
    const DELETE_BY_ID: &'static str = "DELETE FROM subscriptions WHERE id = ?1";

    fn id(&self) -> &str {
        &self.id
    }

    fn bind_upsert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![
            self.id,
            self.user_id,
            self.channel_id,
            self.created_at.to_rfc3339()
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_at: String = row.get(3)?;
        Ok(Subscription {
            id: row.get(0)?,
            user_id: row.get(1)?,
            channel_id: row.get(2)?,
            created_at: parse_timestamp(3, &created_at)?,
        })
    }
}

impl CacheRow for EventRecord {
    const TABLE: CacheTable = CacheTable::Events;
    const UPSERT: &'static str = "INSERT OR REPLACE INTO events
         (id, title, description, start_date, end_date, month_index, visible, event_type, updated_at, location, channel_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";
    const SELECT_ALL: &'static str = "SELECT id, title, description, start_date, end_date, month_index,
                visible, event_type, updated_at, location, channel_id
         FROM events ORDER BY id";
    const DELETE_BY_ID: &'static str = "DELETE FROM events WHERE id = ?1";

    fn id(&self) -> &str {
        &self.id
    }

    fn bind_upsert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        let (start, end, month_index) = match self.schedule {
            EventSchedule::Dated { start, end } => {
                (Some(start.to_string()), Some(end.to_string()), None)
            }
            EventSchedule::LegacyMonth { month } => (None, None, Some(month)),
        };
        stmt.execute(params![
            self.id,
            self.title,
            self.description,
            start,
            end,
            month_index,
            self.visible,
            self.event_type.as_str(),
            self.updated_at.to_rfc3339(),
            self.location,
            self.channel_id,
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let id: String = row.get(0)?;
        let start = parse_date(3, row.get(3)?)?;
        let end = parse_date(4, row.get(4)?)?;
        let month_index: Option<u32> = row.get(5)?;
        let schedule =
            EventSchedule::from_parts(&id, start, end, month_index).map_err(|e| conversion_error(3, e))?;
        let event_type: String = row.get(7)?;
        let updated_at: String = row.get(8)?;

        Ok(EventRecord {
            title: row.get(1)?,
            description: row.get(2)?,
            schedule,
            visible: row.get(6)?,
            event_type: event_type.parse().map_err(|e: String| conversion_error(7, e))?,
            updated_at: parse_timestamp(8, &updated_at)?,
            location: row.get(9)?,
            channel_id: row.get(10)?,
            id,
        })
    }
}

/// Local cache database.
///
/// Constructed explicitly and shared by `Arc`; the connection sits behind a
/// mutex that is never held across an `.await`.
pub struct Database {
    conn: Mutex<Connection>,
    revisions: [watch::Sender<u64>; 4],
}

impl Database {
    /// Open the database at `~/.config/campuscal/campuscal.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created or the
    /// database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("campuscal.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            revisions: std::array::from_fn(|_| watch::channel(0).0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self, table: CacheTable) {
        self.revisions[table.index()].send_modify(|rev| *rev += 1);
    }

    /// Revision counter of `table`; it moves on every write.
    pub fn watch(&self, table: CacheTable) -> watch::Receiver<u64> {
        self.revisions[table.index()].subscribe()
    }

    /// Observe a table as a stream of full snapshots.
    pub fn observe<T: CacheRow>(self: &Arc<Self>) -> CacheWatch<T> {
        CacheWatch {
            db: Arc::clone(self),
            rx: self.watch(T::TABLE),
            _row: PhantomData,
        }
    }

    // === Generic table operations ===

    pub fn upsert<T: CacheRow>(&self, row: &T) -> Result<(), DatabaseError> {
        {
            let conn = self.lock();
            let mut stmt = conn.prepare_cached(T::UPSERT)?;
            row.bind_upsert(&mut stmt)?;
        }
        self.bump(T::TABLE);
        Ok(())
    }

    /// Upsert `rows` in one transaction. Returns the number of rows written.
    pub fn upsert_many<T: CacheRow>(&self, rows: &[T]) -> Result<usize, DatabaseError> {
        {
            let mut conn = self.lock();
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(T::UPSERT)?;
                for row in rows {
                    row.bind_upsert(&mut stmt)?;
                }
            }
            tx.commit()?;
        }
        tracing::debug!(table = T::TABLE.name(), count = rows.len(), "upserted rows");
        self.bump(T::TABLE);
        Ok(rows.len())
    }

    pub fn list_all<T: CacheRow>(&self) -> Result<Vec<T>, DatabaseError> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(T::SELECT_ALL)?;
        let rows = stmt.query_map([], |row| T::from_row(row))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| DatabaseError::CorruptRow {
                table: T::TABLE.name(),
                message: e.to_string(),
            })?);
        }
        Ok(out)
    }

    /// Delete by id. Returns whether a row existed.
    pub fn delete_by_id<T: CacheRow>(&self, id: &str) -> Result<bool, DatabaseError> {
        let deleted = self.lock().execute(T::DELETE_BY_ID, params![id])?;
        if deleted > 0 {
            self.bump(T::TABLE);
        }
        Ok(deleted > 0)
    }

    // === Catalog ===

    pub fn upsert_organizations(&self, rows: &[Organization]) -> Result<usize, DatabaseError> {
        self.upsert_many(rows)
    }

    pub fn list_organizations(&self) -> Result<Vec<Organization>, DatabaseError> {
        self.list_all()
    }

    pub fn upsert_channels(&self, rows: &[Channel]) -> Result<usize, DatabaseError> {
        self.upsert_many(rows)
    }

    pub fn list_channels(&self) -> Result<Vec<Channel>, DatabaseError> {
        self.list_all()
    }

    pub fn upsert_subscriptions(&self, rows: &[Subscription]) -> Result<usize, DatabaseError> {
        self.upsert_many(rows)
    }

    pub fn list_subscriptions(&self) -> Result<Vec<Subscription>, DatabaseError> {
        self.list_all()
    }

    /// Remove the cached subscription of `user_id` to `channel_id`.
    pub fn delete_subscription_for_channel(
        &self,
        user_id: &str,
        channel_id: &str,
    ) -> Result<bool, DatabaseError> {
        let deleted = self.lock().execute(
            "DELETE FROM subscriptions WHERE user_id = ?1 AND channel_id = ?2",
            params![user_id, channel_id],
        )?;
        if deleted > 0 {
            self.bump(CacheTable::Subscriptions);
        }
        Ok(deleted > 0)
    }

    // === Events ===

    pub fn upsert_event(&self, event: &EventRecord) -> Result<(), DatabaseError> {
        self.upsert(event)
    }

    /// All cached events. A row that cannot be decoded is skipped and
    /// logged so one bad event does not hide the rest.
    pub fn list_events(&self) -> Result<Vec<EventRecord>, DatabaseError> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(EventRecord::SELECT_ALL)?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            Ok((id, EventRecord::from_row(row)))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, record) = row?;
            match record {
                Ok(record) => out.push(record),
                Err(e) => tracing::warn!(table = "events", id = %id, "skipping corrupt row: {e}"),
            }
        }
        Ok(out)
    }

    pub fn get_event(&self, id: &str) -> Result<Option<EventRecord>, DatabaseError> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, title, description, start_date, end_date, month_index,
                    visible, event_type, updated_at, location, channel_id
             FROM events WHERE id = ?1",
        )?;
        Ok(stmt
            .query_row(params![id], |row| EventRecord::from_row(row))
            .optional()?)
    }

    /// Hide or show an event without deleting it.
    pub fn set_event_visible(&self, id: &str, visible: bool) -> Result<bool, DatabaseError> {
        let updated = self.lock().execute(
            "UPDATE events SET visible = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, visible, Utc::now().to_rfc3339()],
        )?;
        if updated > 0 {
            self.bump(CacheTable::Events);
        }
        Ok(updated > 0)
    }

    pub fn delete_event(&self, id: &str) -> Result<bool, DatabaseError> {
        self.delete_by_id::<EventRecord>(id)
    }

    // === Key-value store ===

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
        Ok(stmt
            .query_row(params![key], |row| row.get::<_, String>(0))
            .optional()?)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.lock().execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), DatabaseError> {
        self.lock()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Continuous read-all over one cache table.
pub struct CacheWatch<T> {
    db: Arc<Database>,
    rx: watch::Receiver<u64>,
    _row: PhantomData<fn() -> T>,
}

impl<T: CacheRow> CacheWatch<T> {
    /// Current contents of the table.
    pub fn snapshot(&self) -> Result<Vec<T>, DatabaseError> {
        self.db.list_all()
    }

    /// Wait for the next write, then read the table again.
    ///
    /// Returns `None` once the database has been dropped.
    pub async fn next_snapshot(&mut self) -> Option<Result<Vec<T>, DatabaseError>> {
        self.rx.changed().await.ok()?;
        Some(self.db.list_all())
    }
}
