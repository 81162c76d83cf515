//! SQLite-backed collection log.
//!
//! Provides persistent storage for:
//! - Caught creatures, grouped by the catch that saved them
//! - Completed work sessions
//! - Collection statistics

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::data_dir;
use crate::encounter::Category;
use crate::error::{CoreError, DatabaseError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaughtRecord {
    pub id: i64,
    pub catch_id: i64,
    pub name: String,
    pub caught_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub total_caught: u64,
    pub unique_species: u64,
    pub total_experience: u64,
    pub work_sessions: u64,
    pub focus_minutes: u64,
    pub today_work_sessions: u64,
}

/// SQLite database for the caught collection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/taskdex/taskdex.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("taskdex.db");
        Ok(Self::open_at(&path)?)
    }

    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS catches (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                experience  INTEGER NOT NULL,
                caught_at   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS caught (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                catch_id    INTEGER NOT NULL REFERENCES catches(id),
                name        TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS work_sessions (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                duration_min INTEGER NOT NULL,
                category     TEXT NOT NULL,
                success      INTEGER NOT NULL,
                completed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_caught_catch_id ON caught(catch_id);
            CREATE INDEX IF NOT EXISTS idx_work_sessions_completed_at ON work_sessions(completed_at);",
        )?;
        Ok(())
    }

    /// Record one confirmed catch. Returns the catch id.
    ///
    /// # Errors
    /// Returns an error if the insert fails; nothing is written then.
    pub fn record_caught(&self, names: &[String], experience: u32) -> Result<i64, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO catches (experience, caught_at) VALUES (?1, ?2)",
            params![experience, Utc::now().to_rfc3339()],
        )?;
        let catch_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare("INSERT INTO caught (catch_id, name) VALUES (?1, ?2)")?;
            for name in names {
                stmt.execute(params![catch_id, name])?;
            }
        }
        tx.commit()?;
        Ok(catch_id)
    }

    /// Record a finished work phase.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_work_session(
        &self,
        duration_min: u32,
        category: Category,
        success: bool,
    ) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO work_sessions (duration_min, category, success, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                duration_min,
                category.as_str(),
                success,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Every caught creature, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn collection(&self) -> Result<Vec<CaughtRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT caught.id, caught.catch_id, caught.name, catches.caught_at
             FROM caught JOIN catches ON catches.id = caught.catch_id
             ORDER BY caught.id",
        )?;
        let rows = stmt.query_map([], |row| {
            let caught_at: String = row.get(3)?;
            Ok(CaughtRecord {
                id: row.get(0)?,
                catch_id: row.get(1)?,
                name: row.get(2)?,
                caught_at: DateTime::parse_from_rfc3339(&caught_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_default(),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// # Errors
    /// Returns an error if any query fails.
    pub fn stats(&self) -> Result<CollectionStats, DatabaseError> {
        let (total_caught, unique_species): (u64, u64) = self.conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT name) FROM caught",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let total_experience: u64 = self.conn.query_row(
            "SELECT COALESCE(SUM(experience), 0) FROM catches",
            [],
            |row| row.get(0),
        )?;
        let (work_sessions, focus_minutes): (u64, u64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_min), 0) FROM work_sessions WHERE success = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let today_work_sessions: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM work_sessions WHERE success = 1 AND completed_at >= ?1",
            params![format!("{today}T00:00:00+00:00")],
            |row| row.get(0),
        )?;
        Ok(CollectionStats {
            total_caught,
            unique_species,
            total_experience,
            work_sessions,
            focus_minutes,
            today_work_sessions,
        })
    }
}
