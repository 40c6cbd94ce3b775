//! SQLite-backed departure history.
//!
//! One append-only `departures` table with a unique index on
//! `(line, scheduled, stop_id)`. Inserts that hit the index are skipped row by
//! row; every other failure rolls back the whole batch.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::departure::{DepartureRecord, TRACKED_LINE_PREFIXES};
use crate::error::StoreError;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS departures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    line TEXT,
    line_name TEXT,
    destination TEXT,
    operator TEXT,
    platform TEXT,
    scheduled TEXT,
    estimated TEXT,
    delay_min REAL,
    realtime INTEGER NOT NULL DEFAULT 0,
    stop_id TEXT,
    fetched_at TEXT
)
"#;

const CREATE_UNIQUE_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS unique_departure ON departures (line, scheduled, stop_id)";

const INSERT_DEPARTURE: &str = r#"
INSERT INTO departures
    (line, line_name, destination, operator, platform, scheduled, estimated,
     delay_min, realtime, stop_id, fetched_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (line, scheduled, stop_id) DO NOTHING
"#;

/// Formats an instant the way it is stored: fixed-width RFC 3339 in UTC, so
/// equal instants always compare equal in the unique index.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Row restriction shared by the grouped queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartureFilter {
    /// Line code prefixes to keep. Empty keeps every line.
    pub prefixes: Vec<String>,
    pub stop_id: Option<String>,
}

impl Default for DepartureFilter {
    fn default() -> Self {
        Self::tracked_lines()
    }
}

impl DepartureFilter {
    /// Trains, light rail, metro and S-prefixed lines, at every stop.
    pub fn tracked_lines() -> Self {
        Self {
            prefixes: TRACKED_LINE_PREFIXES.iter().map(|p| p.to_string()).collect(),
            stop_id: None,
        }
    }

    pub fn at_stop(mut self, stop_id: impl Into<String>) -> Self {
        self.stop_id = Some(stop_id.into());
        self
    }

    /// Builds the `WHERE` body and the values to bind, in placeholder order.
    ///
    /// `GLOB` is used for prefixes because `LIKE` ignores ASCII case.
    fn where_clause(&self) -> (String, Vec<String>) {
        let mut clauses = vec!["line IS NOT NULL".to_string()];
        let mut binds = Vec::new();

        if !self.prefixes.is_empty() {
            let globs = vec!["line GLOB ?"; self.prefixes.len()].join(" OR ");
            clauses.push(format!("({globs})"));
            binds.extend(self.prefixes.iter().map(|p| format!("{p}*")));
        }

        if let Some(stop_id) = &self.stop_id {
            clauses.push("stop_id = ?".to_string());
            binds.push(stop_id.clone());
        }

        (clauses.join(" AND "), binds)
    }
}

/// Aggregate row for one line code.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct LineGroupRow {
    pub line: String,
    pub avg_delay: Option<f64>,
    pub total_trips: i64,
    pub delayed_trips: i64,
}

/// Aggregate row for one (line code, line name) pair.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct LineNameGroupRow {
    pub line: String,
    pub line_name: Option<String>,
    pub avg_delay: Option<f64>,
    pub total_trips: i64,
    pub delayed_trips: i64,
}

/// Aggregate row for one hour of the day.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct HourGroupRow {
    pub hour: i64,
    pub avg_delay: Option<f64>,
    pub total_trips: i64,
}

/// Handle to the departure table. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct DepartureStore {
    pool: SqlitePool,
}

impl DepartureStore {
    /// Opens (creating if needed) the database at `url` and ensures the table
    /// and its unique index exist.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every connection to `:memory:` is its own database; keep exactly one.
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:").await
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_UNIQUE_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Inserts `records` in one transaction and returns how many were new.
    ///
    /// # Errors
    ///
    /// Any failure other than a duplicate key rolls back the whole batch.
    pub async fn insert_batch(&self, records: &[DepartureRecord]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for r in records {
            let result = sqlx::query(INSERT_DEPARTURE)
                .bind(&r.line)
                .bind(r.line_name.as_deref())
                .bind(r.destination.as_deref())
                .bind(r.operator.as_deref())
                .bind(r.platform.as_deref())
                .bind(format_timestamp(r.scheduled))
                .bind(r.estimated.map(format_timestamp))
                .bind(r.delay_min)
                .bind(r.realtime)
                .bind(&r.stop_id)
                .bind(format_timestamp(r.fetched_at))
                .execute(&mut *tx)
                .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        debug!(
            batch = records.len(),
            inserted,
            duplicates = records.len() as u64 - inserted,
            "Departure batch committed"
        );
        Ok(inserted)
    }

    /// Number of stored departures.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM departures")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Average delay, trip count and delayed-trip count (delay > 1 min) per
    /// line, worst average first and null averages last.
    pub async fn query_grouped_by_line(
        &self,
        filter: &DepartureFilter,
    ) -> Result<Vec<LineGroupRow>, StoreError> {
        let (where_sql, binds) = filter.where_clause();
        let sql = format!(
            r#"
            SELECT line,
                   AVG(delay_min) AS avg_delay,
                   COUNT(id) AS total_trips,
                   COALESCE(SUM(CASE WHEN delay_min > 1 THEN 1 ELSE 0 END), 0) AS delayed_trips
            FROM departures
            WHERE {where_sql}
            GROUP BY line
            ORDER BY avg_delay IS NULL, avg_delay DESC, line
            "#
        );

        let mut query = sqlx::query_as::<_, LineGroupRow>(&sql);
        for value in binds {
            query = query.bind(value);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Same metrics as [`query_grouped_by_line`](Self::query_grouped_by_line)
    /// but split by line name as well.
    pub async fn query_grouped_by_line_and_name(
        &self,
        filter: &DepartureFilter,
    ) -> Result<Vec<LineNameGroupRow>, StoreError> {
        let (where_sql, binds) = filter.where_clause();
        let sql = format!(
            r#"
            SELECT line,
                   line_name,
                   AVG(delay_min) AS avg_delay,
                   COUNT(id) AS total_trips,
                   COALESCE(SUM(CASE WHEN delay_min > 1 THEN 1 ELSE 0 END), 0) AS delayed_trips
            FROM departures
            WHERE {where_sql}
            GROUP BY line, line_name
            HAVING COUNT(id) > 0
            ORDER BY avg_delay IS NULL, avg_delay DESC, line, line_name
            "#
        );

        let mut query = sqlx::query_as::<_, LineNameGroupRow>(&sql);
        for value in binds {
            query = query.bind(value);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Average delay and trip count per hour of day, with the scheduled time
    /// shifted to `offset` before bucketing.
    pub async fn query_grouped_by_hour(
        &self,
        filter: &DepartureFilter,
        offset: FixedOffset,
    ) -> Result<Vec<HourGroupRow>, StoreError> {
        let (where_sql, binds) = filter.where_clause();
        let sql = format!(
            r#"
            SELECT CAST(strftime('%H', scheduled, ?) AS INTEGER) AS hour,
                   AVG(delay_min) AS avg_delay,
                   COUNT(id) AS total_trips
            FROM departures
            WHERE scheduled IS NOT NULL AND {where_sql}
            GROUP BY hour
            ORDER BY hour
            "#
        );
        let modifier = format!("{:+} minutes", offset.local_minus_utc() / 60);

        let mut query = sqlx::query_as::<_, HourGroupRow>(&sql).bind(modifier);
        for value in binds {
            query = query.bind(value);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }
}
