//! SQLite-based local session history.
//!
//! History persistence is off the critical path: the service records
//! terminated sessions here best-effort, and the CLI reads them back for
//! `focusguard history`. A small key-value table lets one-shot callers (the
//! CLI) persist the serialized timer between invocations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{CoreError, StorageError};
use crate::session::Session;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HistoryStats {
    pub total_sessions: u64,
    pub completed_sessions: u64,
    pub cancelled_sessions: u64,
    pub total_focus_secs: u64,
}

/// SQLite database for finished sessions.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/focusguard/focusguard.db`, creating
    /// the schema if needed.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("focusguard.db");
        let conn = Connection::open(&path).map_err(|source| StorageError::OpenFailed {
            path,
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                device_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                planned_secs INTEGER NOT NULL,
                actual_secs INTEGER,
                completed INTEGER NOT NULL,
                mode TEXT NOT NULL,
                blocked_count INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Insert a terminated session. Unterminated sessions are a caller bug
    /// and are rejected.
    pub fn insert_session(&self, session: &Session) -> Result<(), CoreError> {
        if !session.is_finished() {
            return Err(StorageError::QueryFailed(
                "refusing to persist an unfinished session".into(),
            )
            .into());
        }
        self.conn
            .execute(
                "INSERT OR REPLACE INTO sessions
                 (id, user_id, device_id, started_at, ended_at, planned_secs,
                  actual_secs, completed, mode, blocked_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    session.id,
                    session.user_id,
                    session.device_id,
                    session.start_time.to_rfc3339(),
                    session.end_time.map(|t| t.to_rfc3339()),
                    session.planned_duration_secs as i64,
                    session.actual_duration_secs.map(|s| s as i64),
                    session.was_completed as i64,
                    session.mode,
                    session.blocked_items.len() as i64,
                ],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Most recent sessions, newest first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<HistoryRow>, CoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, started_at, ended_at, planned_secs, actual_secs, completed, mode
                 FROM sessions ORDER BY started_at DESC LIMIT ?1",
            )
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(HistoryRow {
                    id: row.get(0)?,
                    started_at: row.get::<_, String>(1)?,
                    ended_at: row.get::<_, Option<String>>(2)?,
                    planned_secs: row.get::<_, i64>(3)? as u64,
                    actual_secs: row.get::<_, Option<i64>>(4)?.map(|s| s as u64),
                    completed: row.get::<_, i64>(5)? != 0,
                    mode: row.get(6)?,
                })
            })
            .map_err(StorageError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(rows)
    }

    pub fn stats(&self) -> Result<HistoryStats, CoreError> {
        let (total, completed, focus_secs): (i64, i64, i64) = self
            .conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(completed), 0),
                        COALESCE(SUM(actual_secs), 0)
                 FROM sessions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(StorageError::from)?;
        Ok(HistoryStats {
            total_sessions: total as u64,
            completed_sessions: completed as u64,
            cancelled_sessions: (total - completed) as u64,
            total_focus_secs: focus_secs as u64,
        })
    }

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, CoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(StorageError::from(other)),
            })?;
        Ok(value)
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }
}

/// Flat row for history listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRow {
    pub id: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub planned_secs: u64,
    pub actual_secs: Option<u64>,
    pub completed: bool,
    pub mode: String,
}

impl HistoryRow {
    pub fn started_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.started_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}
