use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::StoreError;
use crate::models::ScoredWorkout;
use crate::personal_best::{PbCategory, PersonalBestRecord, PersonalBestStore};

/// SQLite-backed store for scored workouts and personal bests
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Create or open a database at the specified path
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        db.init_schema()?;
        debug!(path = %path.display(), "Opened workout database");
        Ok(db)
    }

    /// Open a private in-memory database
    pub fn in_memory() -> Result<Self, StoreError> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    /// Initialize database schema with tables and indexes
    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;

        // WAL for concurrent readers while a writer holds the lock
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS workouts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                source TEXT NOT NULL,
                achieved_at TEXT NOT NULL,

                total_time_seconds REAL NOT NULL,
                total_distance_metres REAL NOT NULL,
                effort_points INTEGER NOT NULL,
                zone TEXT NOT NULL,
                legacy_score REAL NOT NULL,
                confidence INTEGER NOT NULL,
                category TEXT,
                is_personal_best BOOLEAN NOT NULL DEFAULT FALSE,

                -- Full scored record as JSON
                payload TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS personal_bests (
                user_id TEXT NOT NULL,
                category TEXT NOT NULL,
                time_seconds REAL NOT NULL,
                achieved_at TEXT NOT NULL,
                workout_id TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, category)
            );

            CREATE INDEX IF NOT EXISTS idx_workouts_user_date ON workouts (user_id, achieved_at);
            CREATE INDEX IF NOT EXISTS idx_workouts_category ON workouts (user_id, category)
                WHERE category IS NOT NULL;
            "#,
        )?;

        Ok(())
    }

    /// Insert or replace a scored workout
    pub fn save_workout(&self, workout: &ScoredWorkout) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(workout).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        self.conn()?.execute(
            r#"
            INSERT OR REPLACE INTO workouts (
                id, user_id, source, achieved_at, total_time_seconds, total_distance_metres,
                effort_points, zone, legacy_score, confidence, category, is_personal_best, payload
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                workout.id,
                workout.user_id,
                workout.source.as_str(),
                workout.achieved_at,
                workout.total_time_seconds(),
                workout.total_distance_metres(),
                workout.effort.effort_points,
                workout.effort.zone.as_str(),
                workout.effort.legacy_score,
                workout.measurement.confidence,
                workout.category.map(|c| c.as_str()),
                workout.is_personal_best,
                payload,
            ],
        )?;

        debug!(workout_id = %workout.id, "Saved workout");
        Ok(())
    }

    /// Flag a stored workout as the one that set a personal best
    pub fn mark_personal_best(&self, workout_id: &str) -> Result<(), StoreError> {
        let updated = self.conn()?.execute(
            "UPDATE workouts SET is_personal_best = TRUE WHERE id = ?1",
            params![workout_id],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("workouts.{}", workout_id)));
        }
        Ok(())
    }

    /// Fetch a workout by id
    pub fn get_workout(&self, workout_id: &str) -> Result<Option<ScoredWorkout>, StoreError> {
        let row: Option<(String, bool)> = self
            .conn()?
            .query_row(
                "SELECT payload, is_personal_best FROM workouts WHERE id = ?1",
                params![workout_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(payload, is_personal_best)| decode_workout(&payload, is_personal_best))
            .transpose()
    }

    /// Workouts for a user, most recent first
    pub fn list_workouts(&self, user_id: &str, limit: usize) -> Result<Vec<ScoredWorkout>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT payload, is_personal_best FROM workouts
            WHERE user_id = ?1
            ORDER BY achieved_at DESC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![user_id, limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        })?;

        let mut workouts = Vec::new();
        for row in rows {
            let (payload, is_personal_best) = row?;
            workouts.push(decode_workout(&payload, is_personal_best)?);
        }
        Ok(workouts)
    }
}

impl PersonalBestStore for Database {
    fn current_best(
        &self,
        user_id: &str,
        category: PbCategory,
    ) -> Result<Option<PersonalBestRecord>, StoreError> {
        let record = self
            .conn()?
            .query_row(
                r#"
                SELECT user_id, category, time_seconds, achieved_at, workout_id
                FROM personal_bests WHERE user_id = ?1 AND category = ?2
                "#,
                params![user_id, category.as_str()],
                row_to_personal_best,
            )
            .optional()?;
        Ok(record)
    }

    fn replace_if_faster(&self, candidate: &PersonalBestRecord) -> Result<bool, StoreError> {
        // Single statement: the comparison and the write cannot interleave
        // with another writer for the same key.
        let changed = self.conn()?.execute(
            r#"
            INSERT INTO personal_bests (user_id, category, time_seconds, achieved_at, workout_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (user_id, category) DO UPDATE SET
                time_seconds = excluded.time_seconds,
                achieved_at = excluded.achieved_at,
                workout_id = excluded.workout_id,
                updated_at = CURRENT_TIMESTAMP
            WHERE excluded.time_seconds < personal_bests.time_seconds
            "#,
            params![
                candidate.user_id,
                candidate.category.as_str(),
                candidate.time_seconds,
                candidate.achieved_at,
                candidate.workout_id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<PersonalBestRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, category, time_seconds, achieved_at, workout_id
            FROM personal_bests WHERE user_id = ?1
            "#,
        )?;
        let mut records = stmt
            .query_map(params![user_id], row_to_personal_best)?
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|record| record.category);
        Ok(records)
    }
}

fn row_to_personal_best(row: &Row) -> rusqlite::Result<PersonalBestRecord> {
    let category: String = row.get(1)?;
    let category = category
        .parse::<PbCategory>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;
    let achieved_at: DateTime<Utc> = row.get(3)?;

    Ok(PersonalBestRecord {
        user_id: row.get(0)?,
        category,
        time_seconds: row.get(2)?,
        achieved_at,
        workout_id: row.get(4)?,
    })
}

fn decode_workout(payload: &str, is_personal_best: bool) -> Result<ScoredWorkout, StoreError> {
    let mut workout: ScoredWorkout =
        serde_json::from_str(payload).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    workout.is_personal_best = is_personal_best;
    Ok(workout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(workout_id: &str, time: f64) -> PersonalBestRecord {
        PersonalBestRecord {
            user_id: "athlete-1".to_string(),
            category: PbCategory::M2000,
            time_seconds: time,
            achieved_at: Utc.with_ymd_and_hms(2026, 2, 14, 6, 30, 0).unwrap(),
            workout_id: workout_id.to_string(),
        }
    }

    #[test]
    fn test_conditional_upsert() {
        let db = Database::in_memory().unwrap();

        assert!(db.replace_if_faster(&record("w1", 420.0)).unwrap());
        assert!(!db.replace_if_faster(&record("w2", 420.0)).unwrap());
        assert!(!db.replace_if_faster(&record("w3", 431.2)).unwrap());
        assert!(db.replace_if_faster(&record("w4", 415.5)).unwrap());

        let best = db.current_best("athlete-1", PbCategory::M2000).unwrap().unwrap();
        assert_eq!(best.workout_id, "w4");
        assert_eq!(best.time_seconds, 415.5);
        assert_eq!(best.achieved_at, record("w4", 415.5).achieved_at);
    }

    #[test]
    fn test_missing_record() {
        let db = Database::in_memory().unwrap();
        assert!(db.current_best("nobody", PbCategory::Marathon).unwrap().is_none());
        assert!(db.list_for_user("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_mark_unknown_workout() {
        let db = Database::in_memory().unwrap();
        assert!(matches!(
            db.mark_personal_best("missing"),
            Err(StoreError::NotFound(_))
        ));
    }
}
