use crate::app_dirs::AppDirs;
use crate::clock::{Clock, SystemClock};
use crate::walk::{DailyStats, Walk, WalkId};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

const WALK_COLUMNS: &str =
    "id, start_time, end_time, total_steps, distance_meters, is_active, date";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("walk #{0} is still in progress")]
    WalkAlreadyActive(WalkId),
}

/// Emitted to subscribers after every successful write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Inserted(WalkId),
    Updated(WalkId),
    Deleted(WalkId),
    Cleared,
}

/// Persistence contract for walk records.
///
/// Implementations must keep at most one walk active at a time and notify
/// every live subscriber after each write.
pub trait WalkStore {
    /// Insert a new active walk with zero totals.
    /// Fails with [`StoreError::WalkAlreadyActive`] while another walk is active.
    fn start_walk(&self) -> Result<Walk, StoreError>;

    /// Finalize the active walk. `Ok(None)` when nothing is active.
    fn stop_walk(
        &self,
        total_steps: i64,
        distance_meters: f64,
    ) -> Result<Option<Walk>, StoreError>;

    fn active_walk(&self) -> Result<Option<Walk>, StoreError>;

    /// Every walk, newest start time first
    fn all_walks(&self) -> Result<Vec<Walk>, StoreError>;

    /// Walks whose calendar date lies in `start..=end`, newest first
    fn walks_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Walk>, StoreError>;

    fn walk_by_id(&self, id: WalkId) -> Result<Option<Walk>, StoreError>;

    /// Per-date totals of completed walks in `start..=end`, newest date first
    fn daily_stats(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyStats>, StoreError>;

    fn delete_walk(&self, id: WalkId) -> Result<bool, StoreError>;

    fn delete_all_walks(&self) -> Result<(), StoreError>;

    fn subscribe(&self) -> Receiver<StoreChange>;

    /// History view: all walks except the one in progress
    fn completed_walks(&self) -> Result<Vec<Walk>, StoreError> {
        Ok(self
            .all_walks()?
            .into_iter()
            .filter(|w| !w.is_active)
            .collect())
    }

    /// Finalize a walk left active by a process that never stopped it,
    /// keeping whatever totals were stored.
    fn close_orphaned_walk(&self) -> Result<Option<Walk>, StoreError> {
        match self.active_walk()? {
            Some(orphan) => {
                log::warn!("closing orphaned walk #{}", orphan.id);
                self.stop_walk(orphan.total_steps as i64, orphan.distance_meters)
            }
            None => Ok(None),
        }
    }
}

/// SQLite-backed walk store
pub struct SqliteWalkStore {
    conn: Connection,
    clock: Box<dyn Clock>,
    watchers: RefCell<Vec<Sender<StoreChange>>>,
}

impl std::fmt::Debug for SqliteWalkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteWalkStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteWalkStore {
    /// Open the database at the default state location
    pub fn open_default() -> Result<Self, StoreError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("stepeeeasy.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        log::debug!("opening walk database at {}", path.display());
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self {
            conn,
            clock: Box::new(SystemClock),
            watchers: RefCell::new(Vec::new()),
        })
    }

    /// Replace the clock used for start/end timestamps
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Box::new(clock);
        self
    }

    fn notify(&self, change: StoreChange) {
        self.watchers
            .borrow_mut()
            .retain(|tx| tx.send(change).is_ok());
    }

    fn query_walks<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<Walk>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, walk_from_row)?;

        let mut walks = Vec::new();
        for walk in rows {
            walks.push(walk?);
        }
        Ok(walks)
    }

    pub fn watch_active_walk(&self) -> Result<LiveQuery<Option<Walk>>, StoreError> {
        LiveQuery::<Option<Walk>>::active_walk(self)
    }

    pub fn watch_all_walks(&self) -> Result<LiveQuery<Vec<Walk>>, StoreError> {
        LiveQuery::<Vec<Walk>>::all_walks(self)
    }

    pub fn watch_walks_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<LiveQuery<Vec<Walk>>, StoreError> {
        LiveQuery::<Vec<Walk>>::walks_by_date_range(self, start, end)
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS walks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            start_time INTEGER NOT NULL,
            end_time INTEGER,
            total_steps INTEGER NOT NULL DEFAULT 0,
            distance_meters REAL NOT NULL DEFAULT 0,
            is_active BOOLEAN NOT NULL DEFAULT 0,
            date TEXT NOT NULL
        )
        "#,
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_walks_date ON walks(date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_walks_start_time ON walks(start_time)",
        [],
    )?;

    // at most one row may carry is_active = 1
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_walks_single_active ON walks(is_active) WHERE is_active = 1",
        [],
    )?;

    Ok(())
}

fn timestamp_from_millis(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Local>> {
    Local.timestamp_millis_opt(ms).single().ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(
            idx,
            "timestamp".to_string(),
            rusqlite::types::Type::Integer,
        )
    })
}

fn walk_from_row(row: &Row<'_>) -> rusqlite::Result<Walk> {
    let start_ms: i64 = row.get(1)?;
    let end_ms: Option<i64> = row.get(2)?;
    let date_str: String = row.get(6)?;
    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|_| {
        rusqlite::Error::InvalidColumnType(6, "date".to_string(), rusqlite::types::Type::Text)
    })?;
    let steps: i64 = row.get(3)?;

    Ok(Walk {
        id: row.get(0)?,
        start_time: timestamp_from_millis(1, start_ms)?,
        end_time: end_ms.map(|ms| timestamp_from_millis(2, ms)).transpose()?,
        total_steps: steps.max(0) as u64,
        distance_meters: row.get(4)?,
        is_active: row.get(5)?,
        date,
    })
}

impl WalkStore for SqliteWalkStore {
    fn start_walk(&self) -> Result<Walk, StoreError> {
        let tx = self.conn.unchecked_transaction()?;

        let active: Option<WalkId> = tx
            .query_row("SELECT id FROM walks WHERE is_active = 1 LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(id) = active {
            return Err(StoreError::WalkAlreadyActive(id));
        }

        let now = self.clock.now();
        let date = now.date_naive();
        tx.execute(
            r#"
            INSERT INTO walks (start_time, end_time, total_steps, distance_meters, is_active, date)
            VALUES (?1, NULL, 0, 0.0, 1, ?2)
            "#,
            params![now.timestamp_millis(), date.format(DATE_FORMAT).to_string()],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        log::info!("walk #{id} started");
        self.notify(StoreChange::Inserted(id));

        Ok(Walk {
            id,
            // round-trip through millis so the returned walk equals a re-read
            start_time: timestamp_from_millis(1, now.timestamp_millis())?,
            end_time: None,
            total_steps: 0,
            distance_meters: 0.0,
            is_active: true,
            date,
        })
    }

    fn stop_walk(
        &self,
        total_steps: i64,
        distance_meters: f64,
    ) -> Result<Option<Walk>, StoreError> {
        if total_steps < 0 {
            return Err(StoreError::InvalidArgument(
                "Step count cannot be negative".to_string(),
            ));
        }
        if !distance_meters.is_finite() || distance_meters < 0.0 {
            return Err(StoreError::InvalidArgument(
                "Distance cannot be negative".to_string(),
            ));
        }

        let tx = self.conn.unchecked_transaction()?;
        let active: Option<WalkId> = tx
            .query_row("SELECT id FROM walks WHERE is_active = 1 LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(id) = active else {
            return Ok(None);
        };

        let end = self.clock.now();
        tx.execute(
            r#"
            UPDATE walks
            SET end_time = ?1, total_steps = ?2, distance_meters = ?3, is_active = 0
            WHERE id = ?4
            "#,
            params![end.timestamp_millis(), total_steps, distance_meters, id],
        )?;
        tx.commit()?;

        log::info!("walk #{id} stopped: {total_steps} steps, {distance_meters:.1} m");
        self.notify(StoreChange::Updated(id));

        self.walk_by_id(id)
    }

    fn active_walk(&self) -> Result<Option<Walk>, StoreError> {
        let walk = self
            .conn
            .query_row(
                &format!("SELECT {WALK_COLUMNS} FROM walks WHERE is_active = 1 LIMIT 1"),
                [],
                walk_from_row,
            )
            .optional()?;
        Ok(walk)
    }

    fn all_walks(&self) -> Result<Vec<Walk>, StoreError> {
        self.query_walks(
            &format!("SELECT {WALK_COLUMNS} FROM walks ORDER BY start_time DESC, id DESC"),
            [],
        )
    }

    fn walks_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Walk>, StoreError> {
        self.query_walks(
            &format!(
                "SELECT {WALK_COLUMNS} FROM walks WHERE date BETWEEN ?1 AND ?2 ORDER BY start_time DESC, id DESC"
            ),
            params![
                start.format(DATE_FORMAT).to_string(),
                end.format(DATE_FORMAT).to_string()
            ],
        )
    }

    fn walk_by_id(&self, id: WalkId) -> Result<Option<Walk>, StoreError> {
        let walk = self
            .conn
            .query_row(
                &format!("SELECT {WALK_COLUMNS} FROM walks WHERE id = ?1"),
                [id],
                walk_from_row,
            )
            .optional()?;
        Ok(walk)
    }

    fn daily_stats(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyStats>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                date,
                SUM(total_steps) as steps,
                SUM(distance_meters) as distance,
                COUNT(*) as walks
            FROM walks
            WHERE is_active = 0 AND date BETWEEN ?1 AND ?2
            GROUP BY date
            ORDER BY date DESC
            "#,
        )?;

        let rows = stmt.query_map(
            params![
                start.format(DATE_FORMAT).to_string(),
                end.format(DATE_FORMAT).to_string()
            ],
            |row| {
                let date_str: String = row.get(0)?;
                let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        0,
                        "date".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?;
                let steps: i64 = row.get(1)?;
                let walks: i64 = row.get(3)?;
                Ok(DailyStats {
                    date,
                    total_steps: steps.max(0) as u64,
                    total_distance_meters: row.get(2)?,
                    walk_count: walks.max(0) as u32,
                })
            },
        )?;

        let mut stats = Vec::new();
        for day in rows {
            stats.push(day?);
        }
        Ok(stats)
    }

    fn delete_walk(&self, id: WalkId) -> Result<bool, StoreError> {
        let deleted = self.conn.execute("DELETE FROM walks WHERE id = ?1", [id])? > 0;
        if deleted {
            self.notify(StoreChange::Deleted(id));
        }
        Ok(deleted)
    }

    fn delete_all_walks(&self) -> Result<(), StoreError> {
        let n = self.conn.execute("DELETE FROM walks", [])?;
        log::info!("deleted {n} walks");
        self.notify(StoreChange::Cleared);
        Ok(())
    }

    fn subscribe(&self) -> Receiver<StoreChange> {
        let (tx, rx) = mpsc::channel();
        self.watchers.borrow_mut().push(tx);
        rx
    }
}

type Fetch<T> = Box<dyn Fn(&dyn WalkStore) -> Result<T, StoreError>>;

/// A query result that is re-run whenever the store reports a write.
///
/// Changes are pushed into a channel by the store; the holder picks them up
/// with [`LiveQuery::refresh`] from its own loop.
pub struct LiveQuery<T> {
    changes: Receiver<StoreChange>,
    fetch: Fetch<T>,
    current: T,
}

impl<T> LiveQuery<T> {
    pub fn new<F>(store: &dyn WalkStore, fetch: F) -> Result<Self, StoreError>
    where
        F: Fn(&dyn WalkStore) -> Result<T, StoreError> + 'static,
    {
        // subscribe first so a write between the two calls is not missed
        let changes = store.subscribe();
        let current = fetch(store)?;
        Ok(Self {
            changes,
            fetch: Box::new(fetch),
            current,
        })
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    /// Re-run the query if any change arrived since the last call.
    /// Returns whether the value was refreshed.
    pub fn refresh(&mut self, store: &dyn WalkStore) -> Result<bool, StoreError> {
        let pending = self.changes.try_iter().count();
        if pending == 0 {
            return Ok(false);
        }
        self.current = (self.fetch)(store)?;
        Ok(true)
    }
}

impl LiveQuery<Option<Walk>> {
    pub fn active_walk(store: &dyn WalkStore) -> Result<Self, StoreError> {
        Self::new(store, |s| s.active_walk())
    }
}

impl LiveQuery<Vec<Walk>> {
    pub fn all_walks(store: &dyn WalkStore) -> Result<Self, StoreError> {
        Self::new(store, |s| s.all_walks())
    }

    pub fn completed_walks(store: &dyn WalkStore) -> Result<Self, StoreError> {
        Self::new(store, |s| s.completed_walks())
    }

    pub fn walks_by_date_range(
        store: &dyn WalkStore,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self, StoreError> {
        Self::new(store, move |s| s.walks_by_date_range(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use assert_matches::assert_matches;
    use chrono::Duration;

    fn start() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 10, 29, 9, 0, 0).unwrap()
    }

    fn create_test_store() -> (SqliteWalkStore, ManualClock) {
        let clock = ManualClock::new(start());
        let store = SqliteWalkStore::open_in_memory()
            .unwrap()
            .with_clock(clock.clone());
        (store, clock)
    }

    #[test]
    fn test_start_walk_creates_active_zeroed_walk() {
        let (store, _) = create_test_store();
        let walk = store.start_walk().unwrap();

        assert!(walk.is_active);
        assert_eq!(walk.total_steps, 0);
        assert_eq!(walk.distance_meters, 0.0);
        assert_eq!(walk.end_time, None);
        assert_eq!(walk.date, start().date_naive());
        assert_eq!(store.active_walk().unwrap(), Some(walk));
    }

    #[test]
    fn test_second_active_walk_is_rejected() {
        let (store, _) = create_test_store();
        let first = store.start_walk().unwrap();

        assert_matches!(
            store.start_walk(),
            Err(StoreError::WalkAlreadyActive(id)) if id == first.id
        );
        assert_eq!(store.all_walks().unwrap().len(), 1);
    }

    #[test]
    fn test_unique_index_backs_single_active() {
        let (store, _) = create_test_store();
        store.start_walk().unwrap();
        let result = store.conn.execute(
            "INSERT INTO walks (start_time, total_steps, distance_meters, is_active, date) VALUES (0, 0, 0, 1, '2025-10-29')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_stop_walk_finalizes() {
        let (store, clock) = create_test_store();
        let started = store.start_walk().unwrap();
        clock.advance(Duration::seconds(1800));

        let stopped = store.stop_walk(5432, 4087.58).unwrap().unwrap();
        assert_eq!(stopped.id, started.id);
        assert!(!stopped.is_active);
        assert_eq!(stopped.total_steps, 5432);
        assert!((stopped.distance_meters - 4087.58).abs() < 1e-9);
        assert_eq!(stopped.duration_seconds(), 1800);
        assert!(store.active_walk().unwrap().is_none());

        // a new walk may start once the previous one is stopped
        assert!(store.start_walk().is_ok());
    }

    #[test]
    fn test_stop_without_active_walk_changes_nothing() {
        let (store, _) = create_test_store();
        store.start_walk().unwrap();
        store.stop_walk(10, 7.5).unwrap();
        let before = store.all_walks().unwrap();

        assert_eq!(store.stop_walk(99, 1.0).unwrap(), None);
        assert_eq!(store.all_walks().unwrap(), before);
    }

    #[test]
    fn test_stop_rejects_negative_values() {
        let (store, _) = create_test_store();
        store.start_walk().unwrap();

        assert_matches!(store.stop_walk(-1, 0.0), Err(StoreError::InvalidArgument(_)));
        assert_matches!(store.stop_walk(0, -0.5), Err(StoreError::InvalidArgument(_)));
        assert_matches!(store.stop_walk(0, f64::NAN), Err(StoreError::InvalidArgument(_)));
        assert!(store.active_walk().unwrap().is_some());
    }

    #[test]
    fn test_all_walks_newest_first() {
        let (store, clock) = create_test_store();
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(store.start_walk().unwrap().id);
            clock.advance(Duration::minutes(10));
            store.stop_walk(100, 75.0).unwrap();
            clock.advance(Duration::hours(1));
        }

        let order: Vec<WalkId> = store.all_walks().unwrap().iter().map(|w| w.id).collect();
        assert_eq!(order, vec![ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let (store, clock) = create_test_store();
        for _ in 0..4 {
            store.start_walk().unwrap();
            store.stop_walk(1, 0.7).unwrap();
            clock.advance(Duration::days(1));
        }
        let d0 = start().date_naive();
        let d1 = d0 + Duration::days(1);
        let d2 = d0 + Duration::days(2);

        let walks = store.walks_by_date_range(d1, d2).unwrap();
        let dates: Vec<NaiveDate> = walks.iter().map(|w| w.date).collect();
        assert_eq!(dates, vec![d2, d1]);

        assert_eq!(store.walks_by_date_range(d0, d0).unwrap().len(), 1);
    }

    #[test]
    fn test_completed_walks_excludes_active() {
        let (store, _) = create_test_store();
        store.start_walk().unwrap();
        store.stop_walk(5, 3.0).unwrap();
        store.start_walk().unwrap();

        assert_eq!(store.all_walks().unwrap().len(), 2);
        let completed = store.completed_walks().unwrap();
        assert_eq!(completed.len(), 1);
        assert!(!completed[0].is_active);
    }

    #[test]
    fn test_daily_stats_groups_completed_walks() {
        let (store, clock) = create_test_store();
        store.start_walk().unwrap();
        store.stop_walk(1000, 750.0).unwrap();
        clock.advance(Duration::hours(2));
        store.start_walk().unwrap();
        store.stop_walk(500, 375.0).unwrap();
        clock.advance(Duration::days(1));
        store.start_walk().unwrap();
        store.stop_walk(200, 150.0).unwrap();
        store.start_walk().unwrap();

        let d0 = start().date_naive();
        let stats = store.daily_stats(d0, d0 + Duration::days(1)).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].date, d0 + Duration::days(1));
        assert_eq!(stats[0].walk_count, 1);
        assert_eq!(stats[1].total_steps, 1500);
        assert_eq!(stats[1].walk_count, 2);
        assert!((stats[1].total_distance_meters - 1125.0).abs() < 1e-9);
    }

    #[test]
    fn test_delete_all_walks() {
        let (store, _) = create_test_store();
        store.start_walk().unwrap();
        store.stop_walk(3, 2.0).unwrap();
        store.start_walk().unwrap();

        store.delete_all_walks().unwrap();
        assert!(store.all_walks().unwrap().is_empty());
        assert!(store.active_walk().unwrap().is_none());
    }

    #[test]
    fn test_delete_walk_by_id() {
        let (store, _) = create_test_store();
        let w = store.start_walk().unwrap();
        store.stop_walk(3, 2.0).unwrap();

        assert!(store.delete_walk(w.id).unwrap());
        assert!(!store.delete_walk(w.id).unwrap());
        assert_eq!(store.walk_by_id(w.id).unwrap(), None);
    }

    #[test]
    fn test_close_orphaned_walk() {
        let (store, _) = create_test_store();
        assert_eq!(store.close_orphaned_walk().unwrap(), None);

        let w = store.start_walk().unwrap();
        let closed = store.close_orphaned_walk().unwrap().unwrap();
        assert_eq!(closed.id, w.id);
        assert!(!closed.is_active);
        assert!(store.active_walk().unwrap().is_none());
    }

    #[test]
    fn test_subscribers_see_changes() {
        let (store, _) = create_test_store();
        let rx = store.subscribe();

        let w = store.start_walk().unwrap();
        store.stop_walk(1, 0.5).unwrap();
        store.delete_all_walks().unwrap();

        let changes: Vec<StoreChange> = rx.try_iter().collect();
        assert_eq!(
            changes,
            vec![
                StoreChange::Inserted(w.id),
                StoreChange::Updated(w.id),
                StoreChange::Cleared
            ]
        );
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let (store, _) = create_test_store();
        drop(store.subscribe());
        store.start_walk().unwrap();
        assert!(store.watchers.borrow().is_empty());
    }

    #[test]
    fn test_live_queries_refresh_on_write() {
        let (store, _) = create_test_store();
        let mut active = store.watch_active_walk().unwrap();
        let mut all = store.watch_all_walks().unwrap();
        assert_eq!(*active.current(), None);

        assert!(!all.refresh(&store).unwrap());

        let w = store.start_walk().unwrap();
        assert!(active.refresh(&store).unwrap());
        assert_eq!(active.current().as_ref().map(|w| w.id), Some(w.id));
        assert!(all.refresh(&store).unwrap());
        assert_eq!(all.current().len(), 1);

        store.stop_walk(12, 9.0).unwrap();
        assert!(active.refresh(&store).unwrap());
        assert_eq!(*active.current(), None);
        assert!(!active.refresh(&store).unwrap());
    }

    #[test]
    fn test_live_date_range_tracks_writes() {
        let (store, clock) = create_test_store();
        let d0 = start().date_naive();
        let d1 = d0 + Duration::days(1);
        let mut range = store.watch_walks_by_date_range(d0, d0).unwrap();
        assert!(range.current().is_empty());

        let inside = store.start_walk().unwrap();
        assert!(range.refresh(&store).unwrap());
        assert_eq!(range.current().len(), 1);
        assert!(range.current()[0].is_active);

        store.stop_walk(300, 215.0).unwrap();
        assert!(range.refresh(&store).unwrap());
        assert_eq!(range.current().len(), 1);
        assert_eq!(range.current()[0].id, inside.id);
        assert_eq!(range.current()[0].total_steps, 300);
        assert!(!range.current()[0].is_active);

        // a walk on the next day wakes the view but is not part of it
        clock.advance(Duration::days(1));
        let outside = store.start_walk().unwrap();
        store.stop_walk(50, 36.0).unwrap();
        assert_eq!(outside.date, d1);
        assert!(range.refresh(&store).unwrap());
        let ids: Vec<WalkId> = range.current().iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![inside.id]);
        assert_eq!(range.current()[0].total_steps, 300);

        store.delete_walk(inside.id).unwrap();
        assert!(range.refresh(&store).unwrap());
        assert!(range.current().is_empty());
        assert!(!range.refresh(&store).unwrap());
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("walks.db");
        {
            let store = SqliteWalkStore::open(&path).unwrap();
            store.start_walk().unwrap();
            store.stop_walk(42, 31.6).unwrap();
        }
        let store = SqliteWalkStore::open(&path).unwrap();
        let walks = store.all_walks().unwrap();
        assert_eq!(walks.len(), 1);
        assert_eq!(walks[0].total_steps, 42);
    }
}
