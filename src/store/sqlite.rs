//! SQLite-backed capsule store.
//!
//! Tags are stored as a JSON array in a TEXT column and matched with
//! `json_each`, so overlap and containment stay inside a single query.

use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{audit_timestamp, Capsule, CapsuleFilter, CapsulePatch, CapsuleQuery, CapsuleStore, NewCapsule};
use crate::error::{McpError, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS capsules (
    id         TEXT PRIMARY KEY NOT NULL,
    content    TEXT NOT NULL,
    tags       TEXT NOT NULL DEFAULT '[]',
    timestamp  INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_capsules_timestamp ON capsules (timestamp DESC);
";

const COLUMNS: &str = "id, content, tags, timestamp, created_at";

/// Capsule store over a single SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        register_functions(&conn)?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!(path = %path.display(), "opened capsule database");
        Ok(Self::from_connection(conn))
    }

    /// Open an existing database file without write access.
    ///
    /// Mutating calls fail with the store error reported by SQLite.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;
        register_functions(&conn)?;
        tracing::info!(path = %path.display(), "opened capsule database read-only");
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        register_functions(&conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("SQLite mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Install the scalar functions the queries below rely on.
///
/// SQLite's built-in `lower()` folds ASCII only; `unicode_lower(text)` folds
/// like `str::to_lowercase`.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

/// Raw column values before the tag array is decoded.
struct CapsuleRow {
    id: String,
    content: String,
    tags: String,
    timestamp: i64,
    created_at: String,
}

impl CapsuleRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            content: row.get("content")?,
            tags: row.get("tags")?,
            timestamp: row.get("timestamp")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_capsule(self) -> Result<Capsule> {
        let tags: Vec<String> = serde_json::from_str(&self.tags).map_err(|e| McpError::Store {
            message: format!("corrupt tags for capsule {}: {}", self.id, e),
        })?;
        Ok(Capsule {
            id: self.id,
            content: self.content,
            tags,
            timestamp: self.timestamp,
            created_at: self.created_at,
        })
    }
}

/// Render a filter as a WHERE clause plus its bind values.
fn where_clause(filter: &CapsuleFilter) -> (String, Vec<Value>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut binds: Vec<Value> = Vec::new();

    if let Some(needle) = &filter.content_contains {
        conditions.push("instr(unicode_lower(content), ?) > 0".to_string());
        binds.push(Value::Text(needle.to_lowercase()));
    }

    if let Some(any) = &filter.tags_any {
        let placeholders = vec!["?"; any.len()].join(", ");
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM json_each(capsules.tags) WHERE json_each.value IN ({placeholders}))"
        ));
        binds.extend(any.iter().cloned().map(Value::Text));
    }

    if let Some(all) = &filter.tags_all {
        for tag in all {
            conditions.push(
                "EXISTS (SELECT 1 FROM json_each(capsules.tags) WHERE json_each.value = ?)"
                    .to_string(),
            );
            binds.push(Value::Text(tag.clone()));
        }
    }

    if let Some(since) = filter.since {
        conditions.push("timestamp >= ?".to_string());
        binds.push(Value::Integer(since));
    }

    if conditions.is_empty() {
        (String::new(), binds)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), binds)
    }
}

fn to_sql_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn fetch_by_id(conn: &Connection, id: &str) -> Result<Option<Capsule>> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM capsules WHERE id = ?1"),
            params![id],
            CapsuleRow::from_row,
        )
        .optional()?;
    row.map(CapsuleRow::into_capsule).transpose()
}

impl CapsuleStore for SqliteStore {
    fn insert(&self, capsule: NewCapsule) -> Result<Capsule> {
        let record = Capsule {
            id: uuid::Uuid::new_v4().to_string(),
            content: capsule.content,
            tags: capsule.tags,
            timestamp: capsule.timestamp,
            created_at: audit_timestamp(),
        };
        let tags = serde_json::to_string(&record.tags)?;

        self.lock().execute(
            "INSERT INTO capsules (id, content, tags, timestamp, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![record.id, record.content, tags, record.timestamp, record.created_at],
        )?;
        Ok(record)
    }

    fn select(&self, query: &CapsuleQuery) -> Result<Vec<Capsule>> {
        let (clause, mut binds) = where_clause(&query.filter);
        let sql = format!(
            "SELECT {COLUMNS} FROM capsules{clause} ORDER BY timestamp DESC, id ASC LIMIT ? OFFSET ?"
        );
        // SQLite treats a negative LIMIT as unbounded
        binds.push(Value::Integer(query.limit.map_or(-1, to_sql_int)));
        binds.push(Value::Integer(to_sql_int(query.offset)));

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(binds), CapsuleRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(CapsuleRow::into_capsule).collect()
    }

    fn count(&self, filter: &CapsuleFilter) -> Result<usize> {
        let (clause, binds) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM capsules{clause}");
        let count: i64 = self
            .lock()
            .query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn update_by_id(&self, id: &str, patch: CapsulePatch) -> Result<Option<Capsule>> {
        let tags = patch.tags.as_ref().map(serde_json::to_string).transpose()?;

        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE capsules
             SET content = COALESCE(?2, content),
                 tags = COALESCE(?3, tags)
             WHERE id = ?1",
            params![id, patch.content, tags],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        fetch_by_id(&conn, id)
    }

    fn delete_by_id(&self, id: &str) -> Result<bool> {
        let changed = self
            .lock()
            .execute("DELETE FROM capsules WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}
